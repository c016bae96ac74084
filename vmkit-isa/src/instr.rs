use core::fmt;

use vmkit_core::reg;

use crate::opcode::{Opcode, UnknownOpcode};
use crate::{
    encode_bare, encode_i, encode_j, encode_r, encode_reg1, field_disp26, field_imm, field_opcode,
    field_rd, field_rs1, field_rs2,
};

/// A 32-bit instruction word does not decode to a known instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown opcode in word {word:#010x}: {source}")]
    UnknownOpcode { word: u32, source: UnknownOpcode },
}

/// A fully decoded instruction. Each variant names its operands by role
/// (`rd`/`rs1`/`rs2`/register index) rather than by bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `rd = rs1 + rs2` (carry-out recorded by the core, not here).
    Add { rd: u32, rs1: u32, rs2: u32 },
    /// `rd = rs1 + rs2 + carry_in`.
    Addc { rd: u32, rs1: u32, rs2: u32 },
    /// `rd = rs1 - rs2` (borrow-out recorded by the core).
    Sub { rd: u32, rs1: u32, rs2: u32 },
    /// `rd = rs1 - rs2 - borrow_in`.
    Subb { rd: u32, rs1: u32, rs2: u32 },
    And { rd: u32, rs1: u32, rs2: u32 },
    Or { rd: u32, rs1: u32, rs2: u32 },
    Xor { rd: u32, rs1: u32, rs2: u32 },
    Nor { rd: u32, rs1: u32, rs2: u32 },
    /// `rd = (rs1 as i32) < (rs2 as i32) ? 1 : 0`.
    Slt { rd: u32, rs1: u32, rs2: u32 },
    /// `rd = (rs1 as u32) < (rs2 as u32) ? 1 : 0`.
    Sltu { rd: u32, rs1: u32, rs2: u32 },

    /// `rt = rs1 + sign_ext(imm)`.
    Addi { rt: u32, rs1: u32, imm: i16 },
    /// `rt = rs1 + (imm << 16)` — high half of a symbol/constant load.
    Addui { rt: u32, rs1: u32, imm: u16 },
    /// `rt = rs1 | zero_ext(imm)` — low half of a symbol/constant load.
    Ori { rt: u32, rs1: u32, imm: u16 },
    Andi { rt: u32, rs1: u32, imm: u16 },
    Xori { rt: u32, rs1: u32, imm: u16 },

    /// `rt = word[rs1 + sign_ext(disp)]`.
    Lw { rt: u32, rs1: u32, disp: i16 },
    /// `rt = sign_ext(byte[rs1 + sign_ext(disp)])`.
    Lb { rt: u32, rs1: u32, disp: i16 },
    /// `rt = zero_ext(byte[rs1 + sign_ext(disp)])`.
    Lbu { rt: u32, rs1: u32, disp: i16 },
    /// `word[rs1 + sign_ext(disp)] = rt`.
    Sw { rt: u32, rs1: u32, disp: i16 },
    /// `byte[rs1 + sign_ext(disp)] = rt as u8`.
    Sb { rt: u32, rs1: u32, disp: i16 },

    /// `if rs1 == rs2 { pc += disp * 4 }` (disp relative to the instruction after this one).
    Beq { rs1: u32, rs2: u32, disp: i32 },
    Bne { rs1: u32, rs2: u32, disp: i32 },

    /// `pc += disp * 4`.
    J { disp: i32 },
    /// `ret = pc; pc += disp * 4`.
    Jal { disp: i32 },
    /// `pc = rs`, absolute.
    Jr { rs: u32 },

    /// Enter the kernel via the fast syscall path.
    Syscall,
    /// Return from an interrupt; traps unless the core is in ring 0.
    Iret,
    /// Set the active page-table-base register from `rs`; ring 0 only.
    SetTable { rs: u32 },
    /// Set the current ring from `rs`; ring 0 only.
    SetRing { rs: u32 },

    /// Stop the simulation.
    Halt,
}

impl Instruction {
    /// Encodes this instruction back into its 32-bit wire form. Inverse of
    /// [`Self::decode`].
    #[must_use]
    pub fn encode(&self) -> u32 {
        match *self {
            Self::Add { rd, rs1, rs2 } => encode_r(Opcode::Add, rd, rs1, rs2),
            Self::Addc { rd, rs1, rs2 } => encode_r(Opcode::Addc, rd, rs1, rs2),
            Self::Sub { rd, rs1, rs2 } => encode_r(Opcode::Sub, rd, rs1, rs2),
            Self::Subb { rd, rs1, rs2 } => encode_r(Opcode::Subb, rd, rs1, rs2),
            Self::And { rd, rs1, rs2 } => encode_r(Opcode::And, rd, rs1, rs2),
            Self::Or { rd, rs1, rs2 } => encode_r(Opcode::Or, rd, rs1, rs2),
            Self::Xor { rd, rs1, rs2 } => encode_r(Opcode::Xor, rd, rs1, rs2),
            Self::Nor { rd, rs1, rs2 } => encode_r(Opcode::Nor, rd, rs1, rs2),
            Self::Slt { rd, rs1, rs2 } => encode_r(Opcode::Slt, rd, rs1, rs2),
            Self::Sltu { rd, rs1, rs2 } => encode_r(Opcode::Sltu, rd, rs1, rs2),

            Self::Addi { rt, rs1, imm } => encode_i(Opcode::Addi, rt, rs1, imm as u16),
            Self::Addui { rt, rs1, imm } => encode_i(Opcode::Addui, rt, rs1, imm),
            Self::Ori { rt, rs1, imm } => encode_i(Opcode::Ori, rt, rs1, imm),
            Self::Andi { rt, rs1, imm } => encode_i(Opcode::Andi, rt, rs1, imm),
            Self::Xori { rt, rs1, imm } => encode_i(Opcode::Xori, rt, rs1, imm),

            Self::Lw { rt, rs1, disp } => encode_i(Opcode::Lw, rt, rs1, disp as u16),
            Self::Lb { rt, rs1, disp } => encode_i(Opcode::Lb, rt, rs1, disp as u16),
            Self::Lbu { rt, rs1, disp } => encode_i(Opcode::Lbu, rt, rs1, disp as u16),
            Self::Sw { rt, rs1, disp } => encode_i(Opcode::Sw, rt, rs1, disp as u16),
            Self::Sb { rt, rs1, disp } => encode_i(Opcode::Sb, rt, rs1, disp as u16),

            Self::Beq { rs1, rs2, disp } => encode_i(Opcode::Beq, rs1, rs2, disp as u16),
            Self::Bne { rs1, rs2, disp } => encode_i(Opcode::Bne, rs1, rs2, disp as u16),

            Self::J { disp } => encode_j(Opcode::J, disp),
            Self::Jal { disp } => encode_j(Opcode::Jal, disp),
            Self::Jr { rs } => encode_reg1(Opcode::Jr, rs),

            Self::Syscall => encode_bare(Opcode::Syscall),
            Self::Iret => encode_bare(Opcode::Iret),
            Self::SetTable { rs } => encode_reg1(Opcode::SetTable, rs),
            Self::SetRing { rs } => encode_reg1(Opcode::SetRing, rs),
            Self::Halt => encode_bare(Opcode::Halt),
        }
    }

    /// Decodes a 32-bit instruction word.
    ///
    /// # Errors
    /// Returns [`DecodeError::UnknownOpcode`] if the top 6 bits name no
    /// [`Opcode`].
    pub fn decode(word: u32) -> Result<Self, DecodeError> {
        let op = Opcode::try_from(field_opcode(word)).map_err(|source| {
            DecodeError::UnknownOpcode {
                word,
                source,
            }
        })?;
        let rd = field_rd(word);
        let rs1 = field_rs1(word);
        let rs2 = field_rs2(word);
        let imm = field_imm(word);

        Ok(match op {
            Opcode::Add => Self::Add { rd, rs1, rs2 },
            Opcode::Addc => Self::Addc { rd, rs1, rs2 },
            Opcode::Sub => Self::Sub { rd, rs1, rs2 },
            Opcode::Subb => Self::Subb { rd, rs1, rs2 },
            Opcode::And => Self::And { rd, rs1, rs2 },
            Opcode::Or => Self::Or { rd, rs1, rs2 },
            Opcode::Xor => Self::Xor { rd, rs1, rs2 },
            Opcode::Nor => Self::Nor { rd, rs1, rs2 },
            Opcode::Slt => Self::Slt { rd, rs1, rs2 },
            Opcode::Sltu => Self::Sltu { rd, rs1, rs2 },

            Opcode::Addi => Self::Addi {
                rt: rd,
                rs1,
                imm: imm as i16,
            },
            Opcode::Addui => Self::Addui { rt: rd, rs1, imm },
            Opcode::Ori => Self::Ori { rt: rd, rs1, imm },
            Opcode::Andi => Self::Andi { rt: rd, rs1, imm },
            Opcode::Xori => Self::Xori { rt: rd, rs1, imm },

            Opcode::Lw => Self::Lw {
                rt: rd,
                rs1,
                disp: imm as i16,
            },
            Opcode::Lb => Self::Lb {
                rt: rd,
                rs1,
                disp: imm as i16,
            },
            Opcode::Lbu => Self::Lbu {
                rt: rd,
                rs1,
                disp: imm as i16,
            },
            Opcode::Sw => Self::Sw {
                rt: rd,
                rs1,
                disp: imm as i16,
            },
            Opcode::Sb => Self::Sb {
                rt: rd,
                rs1,
                disp: imm as i16,
            },

            Opcode::Beq => Self::Beq {
                rs1: rd,
                rs2: rs1,
                disp: imm as i16 as i32,
            },
            Opcode::Bne => Self::Bne {
                rs1: rd,
                rs2: rs1,
                disp: imm as i16 as i32,
            },

            Opcode::J => Self::J {
                disp: field_disp26(word),
            },
            Opcode::Jal => Self::Jal {
                disp: field_disp26(word),
            },
            Opcode::Jr => Self::Jr { rs: rd },

            Opcode::Syscall => Self::Syscall,
            Opcode::Iret => Self::Iret,
            Opcode::SetTable => Self::SetTable { rs: rd },
            Opcode::SetRing => Self::SetRing { rs: rd },
            Opcode::Halt => Self::Halt,
        })
    }

    /// Whether executing this instruction outside ring 0 raises
    /// `Exception::Privilege`.
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::Syscall | Self::Iret | Self::SetTable { .. } | Self::SetRing { .. }
        )
    }
}

fn r(index: u32) -> &'static str {
    reg::name(index)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Add { rd, rs1, rs2 } => write!(f, "add {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Self::Addc { rd, rs1, rs2 } => write!(f, "addc {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Self::Sub { rd, rs1, rs2 } => write!(f, "sub {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Self::Subb { rd, rs1, rs2 } => write!(f, "subb {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Self::And { rd, rs1, rs2 } => write!(f, "and {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Self::Or { rd, rs1, rs2 } => write!(f, "or {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Self::Xor { rd, rs1, rs2 } => write!(f, "xor {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Self::Nor { rd, rs1, rs2 } => write!(f, "nor {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Self::Slt { rd, rs1, rs2 } => write!(f, "slt {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Self::Sltu { rd, rs1, rs2 } => write!(f, "sltu {}, {}, {}", r(rd), r(rs1), r(rs2)),

            Self::Addi { rt, rs1, imm } => write!(f, "addi {}, {}, {}", r(rt), r(rs1), imm),
            Self::Addui { rt, rs1, imm } => write!(f, "addui {}, {}, {:#06x}", r(rt), r(rs1), imm),
            Self::Ori { rt, rs1, imm } => write!(f, "ori {}, {}, {:#06x}", r(rt), r(rs1), imm),
            Self::Andi { rt, rs1, imm } => write!(f, "andi {}, {}, {:#06x}", r(rt), r(rs1), imm),
            Self::Xori { rt, rs1, imm } => write!(f, "xori {}, {}, {:#06x}", r(rt), r(rs1), imm),

            Self::Lw { rt, rs1, disp } => write!(f, "lw {}, {}({})", r(rt), disp, r(rs1)),
            Self::Lb { rt, rs1, disp } => write!(f, "lb {}, {}({})", r(rt), disp, r(rs1)),
            Self::Lbu { rt, rs1, disp } => write!(f, "lbu {}, {}({})", r(rt), disp, r(rs1)),
            Self::Sw { rt, rs1, disp } => write!(f, "sw {}, {}({})", r(rt), disp, r(rs1)),
            Self::Sb { rt, rs1, disp } => write!(f, "sb {}, {}({})", r(rt), disp, r(rs1)),

            Self::Beq { rs1, rs2, disp } => write!(f, "beq {}, {}, {}", r(rs1), r(rs2), disp),
            Self::Bne { rs1, rs2, disp } => write!(f, "bne {}, {}, {}", r(rs1), r(rs2), disp),

            Self::J { disp } => write!(f, "j {disp}"),
            Self::Jal { disp } => write!(f, "jal {disp}"),
            Self::Jr { rs } => write!(f, "jr {}", r(rs)),

            Self::Syscall => write!(f, "syscall"),
            Self::Iret => write!(f, "iret"),
            Self::SetTable { rs } => write!(f, "settable {}", r(rs)),
            Self::SetRing { rs } => write!(f, "setring {}", r(rs)),
            Self::Halt => write!(f, "halt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Instruction;

    fn roundtrip(instr: Instruction) {
        let word = instr.encode();
        assert_eq!(Instruction::decode(word).unwrap(), instr);
    }

    #[test]
    fn register_arithmetic_roundtrips() {
        roundtrip(Instruction::Add { rd: 1, rs1: 2, rs2: 3 });
        roundtrip(Instruction::Addc { rd: 1, rs1: 2, rs2: 3 });
        roundtrip(Instruction::Sub { rd: 4, rs1: 5, rs2: 6 });
        roundtrip(Instruction::Subb { rd: 4, rs1: 5, rs2: 6 });
        roundtrip(Instruction::Sltu { rd: 0, rs1: 1, rs2: 2 });
    }

    #[test]
    fn immediate_arithmetic_roundtrips() {
        roundtrip(Instruction::Addi { rt: 1, rs1: 2, imm: -5 });
        roundtrip(Instruction::Addui { rt: 1, rs1: 0, imm: 0xBEEF });
        roundtrip(Instruction::Ori { rt: 1, rs1: 0, imm: 0x00CE });
    }

    #[test]
    fn symbol_load_pair_reassembles_the_address() {
        let target: u32 = 0x1234_5678;
        let (high, low) = vmkit_core::FixupKind::split_absolute(target);
        let hi_instr = Instruction::Addui { rt: 1, rs1: 0, imm: high };
        let lo_instr = Instruction::Ori { rt: 1, rs1: 1, imm: low };
        roundtrip(hi_instr);
        roundtrip(lo_instr);
        let reassembled = ((high as u32) << 16) | (low as u32);
        assert_eq!(reassembled, target);
    }

    #[test]
    fn memory_ops_roundtrip_with_negative_displacement() {
        roundtrip(Instruction::Lw { rt: 1, rs1: 5, disp: -8 });
        roundtrip(Instruction::Lb { rt: 1, rs1: 5, disp: -1 });
        roundtrip(Instruction::Lbu { rt: 1, rs1: 5, disp: -1 });
        roundtrip(Instruction::Sw { rt: 1, rs1: 5, disp: 12 });
        roundtrip(Instruction::Sb { rt: 1, rs1: 5, disp: 12 });
    }

    #[test]
    fn lb_and_lbu_decode_to_distinct_variants() {
        let lb = Instruction::Lb { rt: 1, rs1: 0, disp: 0 };
        let lbu = Instruction::Lbu { rt: 1, rs1: 0, disp: 0 };
        assert_ne!(lb.encode(), lbu.encode());
    }

    #[test]
    fn branches_and_jumps_roundtrip() {
        roundtrip(Instruction::Beq { rs1: 1, rs2: 2, disp: -3 });
        roundtrip(Instruction::Bne { rs1: 1, rs2: 2, disp: 3 });
        roundtrip(Instruction::J { disp: -100 });
        roundtrip(Instruction::Jal { disp: 100 });
        roundtrip(Instruction::Jr { rs: 6 });
    }

    #[test]
    fn privileged_ops_roundtrip_and_are_flagged() {
        roundtrip(Instruction::Syscall);
        roundtrip(Instruction::Iret);
        roundtrip(Instruction::SetTable { rs: 1 });
        roundtrip(Instruction::SetRing { rs: 1 });

        assert!(Instruction::Syscall.is_privileged());
        assert!(Instruction::Iret.is_privileged());
        assert!(!Instruction::Add { rd: 0, rs1: 0, rs2: 0 }.is_privileged());
    }

    #[test]
    fn halt_roundtrips_and_is_not_privileged() {
        roundtrip(Instruction::Halt);
        assert!(!Instruction::Halt.is_privileged());
    }

    #[test]
    fn disassembly_text_matches_mnemonic() {
        let text = Instruction::Add { rd: 1, rs1: 2, rs2: 3 }.to_string();
        assert_eq!(text, "add r1, r2, r3");
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        // 0x3E names no `Opcode` variant (0x3F is `Halt`, the highest
        // assigned value).
        let word = 0x3E << 26;
        assert!(Instruction::decode(word).is_err());
    }
}
