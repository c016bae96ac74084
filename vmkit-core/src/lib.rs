//! Shared primitive types for the vmkit machine and compiler toolchain.
//!
//! This crate is the lowest layer of the workspace: every other crate
//! depends on it, and it depends on nothing but `thiserror`. It carries the
//! machine word size, the reserved physical page layout, the fault
//! taxonomy, the image section record, and the symbol fixup kinds that the
//! IR and linker pass between each other.

mod exception;
mod fixup;
mod section;

pub use exception::Exception;
pub use fixup::FixupKind;
pub use section::{Section, SectionKind};

/// A machine word. Unsigned 32-bit, little-endian on the wire.
pub type Word = u32;

/// Size in bytes of a physical/virtual page.
pub const PAGE_SIZE: u32 = 4096;

/// Page 0 is the null guard and is never addressable.
pub const PAGE_NULL: u32 = 0;
/// Page 1 holds the per-core interrupt descriptor table (§6 page layout).
pub const PAGE_INTERRUPT: u32 = 1;
/// Page 2 holds system information (page count, core count).
pub const PAGE_SYSINFO: u32 = 2;
/// Page 3 is the basic I/O MMIO page (ticker, serial/console, ROM control).
pub const PAGE_IO_BASIC: u32 = 3;
/// Page 4 is the screen text MMIO page.
pub const PAGE_SCREEN_TEXT: u32 = 4;
/// Page 5 is the screen color MMIO page.
pub const PAGE_SCREEN_COLOR: u32 = 5;
/// Number of pages reserved for fixed-purpose use before general RAM.
pub const RESERVED_PAGES: u32 = 6;

/// Number of general-purpose registers per core, including the three
/// distinguished registers SP, RET and PC.
pub const NUM_REGS: usize = 8;

/// Register indices. `R0` is hardwired to zero by the ISA (arithmetic
/// immediate loads target it as a source of zero); the rest are general
/// purpose except for the three distinguished registers.
pub mod reg {
    /// Hardwired zero register.
    pub const R0: u32 = 0;
    pub const R1: u32 = 1;
    pub const R2: u32 = 2;
    pub const R3: u32 = 3;
    pub const R4: u32 = 4;
    /// Stack pointer.
    pub const SP: u32 = 5;
    /// Return address.
    pub const RET: u32 = 6;
    /// Program counter.
    pub const PC: u32 = 7;

    /// Resolves a register name (as used by the assembler/disassembler and
    /// error messages) to its index, or `None` if unrecognized.
    #[must_use]
    pub fn by_name(name: &str) -> Option<u32> {
        Some(match name {
            "r0" => R0,
            "r1" => R1,
            "r2" => R2,
            "r3" => R3,
            "r4" => R4,
            "r5" | "sp" => SP,
            "r6" | "ret" => RET,
            "r7" | "pc" => PC,
            _ => return None,
        })
    }

    /// Canonical display name for a register index, used by the disassembler.
    #[must_use]
    pub fn name(index: u32) -> &'static str {
        match index {
            R0 => "r0",
            R1 => "r1",
            R2 => "r2",
            R3 => "r3",
            R4 => "r4",
            SP => "sp",
            RET => "ret",
            PC => "pc",
            _ => "r?",
        }
    }
}

/// Byte size of a register-sized value, i.e. one machine word.
pub const REG_SIZE: i32 = 4;

/// Byte layout of the interrupt frame pushed onto the kernel stack on entry
/// to an interrupt handler (spec.md §3).
pub mod int_frame {
    pub const SAVED_SP: u32 = 0;
    pub const SAVED_RET: u32 = 4;
    pub const ARG: u32 = 8;
    pub const CODE: u32 = 12;
    pub const SAVED_RING: u32 = 13;
    pub const SIZE: u32 = 16;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_name_roundtrip() {
        for idx in 0..NUM_REGS as u32 {
            let name = reg::name(idx);
            assert_eq!(reg::by_name(name), Some(idx));
        }
    }

    #[test]
    fn aliases_agree() {
        assert_eq!(reg::by_name("sp"), Some(reg::SP));
        assert_eq!(reg::by_name("r5"), Some(reg::SP));
        assert_eq!(reg::by_name("ret"), Some(reg::RET));
        assert_eq!(reg::by_name("pc"), Some(reg::PC));
    }
}
