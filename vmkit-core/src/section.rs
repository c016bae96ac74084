/// The tag byte of an image section record (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SectionKind {
    None = 0,
    Code = 1,
    Data = 2,
    Zeros = 3,
    Debug = 4,
    Comment = 5,
}

/// A malformed section tag byte was encountered while reading an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown section tag {0}")]
pub struct UnknownSectionTag(pub u8);

impl TryFrom<u8> for SectionKind {
    type Error = UnknownSectionTag;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => Self::None,
            1 => Self::Code,
            2 => Self::Data,
            3 => Self::Zeros,
            4 => Self::Debug,
            5 => Self::Comment,
            other => return Err(UnknownSectionTag(other)),
        })
    }
}

/// A single image section: a tagged, contiguous, load-addressed blob
/// (spec.md §3, §6). `Zeros` carries only a length — its bytes are never
/// materialized. `None` terminates a stream or marks a placeholder with no
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    None,
    Code { addr: u32, bytes: Vec<u8> },
    Data { addr: u32, bytes: Vec<u8> },
    Zeros { addr: u32, len: u32 },
    Debug { addr: u32, bytes: Vec<u8> },
    Comment { addr: u32, bytes: Vec<u8> },
}

impl Section {
    #[must_use]
    pub const fn kind(&self) -> SectionKind {
        match self {
            Self::None => SectionKind::None,
            Self::Code { .. } => SectionKind::Code,
            Self::Data { .. } => SectionKind::Data,
            Self::Zeros { .. } => SectionKind::Zeros,
            Self::Debug { .. } => SectionKind::Debug,
            Self::Comment { .. } => SectionKind::Comment,
        }
    }

    #[must_use]
    pub const fn addr(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Code { addr, .. }
            | Self::Data { addr, .. }
            | Self::Zeros { addr, .. }
            | Self::Debug { addr, .. }
            | Self::Comment { addr, .. } => *addr,
        }
    }

    /// Byte length of the section's payload in the addressed memory range.
    /// For `Code`/`Data`/`Debug`/`Comment` this is the blob length; for
    /// `Zeros` it is the stored length; `None` has no extent.
    #[must_use]
    pub fn len(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Code { bytes, .. }
            | Self::Data { bytes, .. }
            | Self::Debug { bytes, .. }
            | Self::Comment { bytes, .. } => bytes.len() as u32,
            Self::Zeros { len, .. } => *len,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{Section, SectionKind};

    #[test]
    fn kind_roundtrips_through_tag_byte() {
        for kind in [
            SectionKind::None,
            SectionKind::Code,
            SectionKind::Data,
            SectionKind::Zeros,
            SectionKind::Debug,
            SectionKind::Comment,
        ] {
            let tag = kind as u8;
            assert_eq!(SectionKind::try_from(tag).unwrap() as u8, tag);
        }
    }

    #[test]
    fn zeros_section_has_no_bytes_but_reports_its_length() {
        let s = Section::Zeros {
            addr: 0x4000,
            len: 64,
        };
        assert_eq!(s.len(), 64);
        assert_eq!(s.kind(), SectionKind::Zeros);
    }
}
