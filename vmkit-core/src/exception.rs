/// The exception taxonomy (spec.md §7). Every variant carries the index of
/// the core that raised it; synchronous faults also carry the address or
/// word that caused them, device interrupts carry their code and argument.
///
/// `Halt` is a sentinel requesting simulation stop, not an error to the
/// user — callers should check [`Exception::is_halt`] before reporting a
/// run as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Exception {
    #[error("core {core}: out-of-range access at {addr:#010x}")]
    OutOfRange { core: u8, addr: u32 },

    #[error("core {core}: unaligned word access at {addr:#010x}")]
    Align { core: u8, addr: u32 },

    #[error("core {core}: page miss translating {addr:#010x}")]
    PageMiss { core: u8, addr: u32 },

    #[error("core {core}: page fault (permission denied) at {addr:#010x}")]
    PageFault { core: u8, addr: u32 },

    #[error("core {core}: privileged instruction in user mode")]
    Privilege { core: u8 },

    #[error("core {core}: invalid opcode in word {word:#010x}")]
    InvalidOp { core: u8, word: u32 },

    #[error("core {core}: interrupt {code} (arg {arg:#x})")]
    Interrupt { core: u8, code: u8, arg: u32 },

    #[error("core {core}: halt")]
    Halt { core: u8 },
}

impl Exception {
    /// The core that raised this exception.
    #[must_use]
    pub const fn core(&self) -> u8 {
        match self {
            Self::OutOfRange { core, .. }
            | Self::Align { core, .. }
            | Self::PageMiss { core, .. }
            | Self::PageFault { core, .. }
            | Self::Privilege { core }
            | Self::InvalidOp { core, .. }
            | Self::Interrupt { core, .. }
            | Self::Halt { core } => *core,
        }
    }

    /// The argument word posted to a handler when this exception is
    /// dispatched through the interrupt controller. Zero for variants that
    /// carry none.
    #[must_use]
    pub const fn arg(&self) -> u32 {
        match self {
            Self::OutOfRange { addr, .. }
            | Self::Align { addr, .. }
            | Self::PageMiss { addr, .. }
            | Self::PageFault { addr, .. } => *addr,
            Self::InvalidOp { word, .. } => *word,
            Self::Interrupt { arg, .. } => *arg,
            Self::Privilege { .. } | Self::Halt { .. } => 0,
        }
    }

    /// The fixed fault code used to post a *synchronous* fault to a core's
    /// interrupt controller (spec.md §4.3 step 4). Device interrupts carry
    /// their own code already; `Halt` is never posted.
    #[must_use]
    pub const fn fault_code(&self) -> Option<u8> {
        match self {
            Self::OutOfRange { .. } => Some(1),
            Self::Align { .. } => Some(2),
            Self::PageMiss { .. } => Some(3),
            Self::PageFault { .. } => Some(4),
            Self::Privilege { .. } => Some(5),
            Self::InvalidOp { .. } => Some(6),
            Self::Interrupt { code, .. } => Some(*code),
            Self::Halt { .. } => None,
        }
    }

    /// Whether this exception is the halt sentinel, i.e. a normal exit
    /// rather than a fault to be reported.
    #[must_use]
    pub const fn is_halt(&self) -> bool {
        matches!(self, Self::Halt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::Exception;

    #[test]
    fn halt_is_not_a_fault_code() {
        let e = Exception::Halt { core: 0 };
        assert!(e.is_halt());
        assert_eq!(e.fault_code(), None);
    }

    #[test]
    fn synchronous_faults_carry_their_address_as_arg() {
        let e = Exception::PageFault {
            core: 2,
            addr: 0x1234,
        };
        assert_eq!(e.arg(), 0x1234);
        assert_eq!(e.fault_code(), Some(4));
        assert_eq!(e.core(), 2);
    }
}
