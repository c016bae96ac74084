//! Codec for the vmkit image format: a stream of length-prefixed section
//! records (spec.md §6) produced by `vmkit-link` and consumed by
//! `vmkit-machine`'s loader.
//!
//! Each record is a one-byte type tag, a four-byte load address, a
//! four-byte data length, all little-endian, followed by a body for every
//! kind except `Zeros` and `None`: `Code`/`Data` carry the bytes the loader
//! writes into physical memory, `Debug`/`Comment` carry bytes the driver
//! reads back out for disassembly and stack-trace annotation but the
//! loader never maps into memory. `Zeros` carries its length only. The
//! stream ends at EOF; a header that starts mid-truncation is an error
//! rather than a silent short read.

use std::io::{self, Read, Write};

use vmkit_core::{Section, SectionKind, UnknownSectionTag};

const HEADER_LEN: usize = 1 + 4 + 4;

/// An image stream could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("truncated section header after {sections_read} section(s)")]
    TruncatedHeader { sections_read: usize },
    #[error("truncated section body after {sections_read} section(s): wanted {wanted} bytes, got {got}")]
    TruncatedBody {
        sections_read: usize,
        wanted: u32,
        got: usize,
    },
    #[error("section {index}: {source}")]
    UnknownTag {
        index: usize,
        #[source]
        source: UnknownSectionTag,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reads every section from a byte stream until EOF.
///
/// # Errors
/// Returns [`ImageError`] on a malformed tag byte or a header/body that is
/// truncated partway through (spec.md §6: "malformed header or truncation
/// is a load error").
pub fn read_sections(mut r: impl Read) -> Result<Vec<Section>, ImageError> {
    let mut sections = Vec::new();
    let mut header = [0u8; HEADER_LEN];

    loop {
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = r.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        if filled != HEADER_LEN {
            return Err(ImageError::TruncatedHeader {
                sections_read: sections.len(),
            });
        }

        let tag = header[0];
        let addr = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
        let len = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);

        let kind = SectionKind::try_from(tag).map_err(|source| ImageError::UnknownTag {
            index: sections.len(),
            source,
        })?;

        let section = match kind {
            SectionKind::None => Section::None,
            SectionKind::Zeros => Section::Zeros { addr, len },
            SectionKind::Code | SectionKind::Data | SectionKind::Debug | SectionKind::Comment => {
                let mut bytes = vec![0u8; len as usize];
                r.read_exact(&mut bytes).map_err(|_| ImageError::TruncatedBody {
                    sections_read: sections.len(),
                    wanted: len,
                    got: 0,
                })?;
                match kind {
                    SectionKind::Code => Section::Code { addr, bytes },
                    SectionKind::Data => Section::Data { addr, bytes },
                    SectionKind::Debug => Section::Debug { addr, bytes },
                    SectionKind::Comment => Section::Comment { addr, bytes },
                    SectionKind::None | SectionKind::Zeros => unreachable!(),
                }
            }
        };
        sections.push(section);
    }

    Ok(sections)
}

/// Writes a stream of sections in wire format.
///
/// # Errors
/// Returns the underlying [`io::Error`] on a write failure.
pub fn write_sections(mut w: impl Write, sections: &[Section]) -> io::Result<()> {
    for section in sections {
        w.write_all(&[section.kind() as u8])?;
        w.write_all(&section.addr().to_le_bytes())?;
        w.write_all(&section.len().to_le_bytes())?;
        match section {
            Section::Code { bytes, .. }
            | Section::Data { bytes, .. }
            | Section::Debug { bytes, .. }
            | Section::Comment { bytes, .. } => w.write_all(bytes)?,
            Section::None | Section::Zeros { .. } => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read_sections, write_sections};
    use vmkit_core::Section;

    fn sample() -> Vec<Section> {
        vec![
            Section::Code {
                addr: 0x6000,
                bytes: vec![0x01, 0x02, 0x03, 0x04],
            },
            Section::Data {
                addr: 0x7000,
                bytes: vec![0xAA, 0xBB],
            },
            Section::Zeros {
                addr: 0x7100,
                len: 64,
            },
            Section::Debug {
                addr: 0x6000,
                bytes: b"main.start+0".to_vec(),
            },
        ]
    }

    #[test]
    fn roundtrips_a_mixed_section_stream() {
        let sections = sample();
        let mut buf = Vec::new();
        write_sections(&mut buf, &sections).unwrap();
        let read_back = read_sections(buf.as_slice()).unwrap();
        assert_eq!(read_back, sections);
    }

    #[test]
    fn empty_stream_reads_as_no_sections() {
        let sections = read_sections(&[][..]).unwrap();
        assert!(sections.is_empty());
    }

    #[test]
    fn truncated_header_is_an_error() {
        let mut buf = Vec::new();
        write_sections(&mut buf, &sample()).unwrap();
        buf.truncate(buf.len() - 3);
        let err = read_sections(buf.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            super::ImageError::TruncatedHeader { .. } | super::ImageError::TruncatedBody { .. }
        ));
    }

    #[test]
    fn unknown_tag_byte_is_rejected() {
        let mut buf = vec![0xFFu8];
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        let err = read_sections(buf.as_slice()).unwrap_err();
        assert!(matches!(err, super::ImageError::UnknownTag { index: 0, .. }));
    }

    #[test]
    fn zeros_section_carries_no_body_bytes_on_the_wire() {
        let sections = vec![Section::Zeros {
            addr: 0x1000,
            len: 4096,
        }];
        let mut buf = Vec::new();
        write_sections(&mut buf, &sections).unwrap();
        assert_eq!(buf.len(), super::HEADER_LEN);
    }
}
