use vmkit_core::{reg, FixupKind, REG_SIZE};
use vmkit_ir::{AddrRef, Block, ByteLit, IrInstr, Ref, SymbolRef, VarRef};
use vmkit_isa::Instruction;

/// Loads a var's value into `reg`, honoring the pre-/post-shift addressing
/// convention: `is_arg` selects `[SP-offset]` (the caller's view, before
/// the callee's prologue shifts `SP`), otherwise `[SP+frame_size-offset]`
/// (every other use). Mirrors `loadArg`/`loadVar` in `pl/codegen/reg_swap.go`.
pub fn load_var(block: &mut Block, dst: u32, v: &VarRef, frame_size: i32, is_arg: bool) {
    let disp = if is_arg {
        -v.offset as i16
    } else {
        (frame_size - v.offset) as i16
    };
    let instr = match v.size {
        0 => return,
        1 if v.unsigned_byte => Instruction::Lbu {
            rt: dst,
            rs1: reg::SP,
            disp,
        },
        1 => Instruction::Lb {
            rt: dst,
            rs1: reg::SP,
            disp,
        },
        _ => Instruction::Lw {
            rt: dst,
            rs1: reg::SP,
            disp,
        },
    };
    block.push(IrInstr::plain(instr));
}

pub fn save_var(block: &mut Block, src: u32, v: &VarRef, frame_size: i32, is_arg: bool) {
    let disp = if is_arg {
        -v.offset as i16
    } else {
        (frame_size - v.offset) as i16
    };
    let instr = match v.size {
        0 => return,
        1 => Instruction::Sb {
            rt: src,
            rs1: reg::SP,
            disp,
        },
        _ => Instruction::Sw {
            rt: src,
            rs1: reg::SP,
            disp,
        },
    };
    block.push(IrInstr::plain(instr));
}

/// Loads an absolute address into `reg` via the two-instruction
/// `addui`+`ori` sequence, tagged for the linker to patch
/// (`loadSym` in `pl/codegen/reg_swap.go`).
pub fn load_sym(block: &mut Block, dst: u32, pkg: &str, name: &str) {
    block.push(IrInstr::tagged(
        Instruction::Addui {
            rt: dst,
            rs1: reg::R0,
            imm: 0,
        },
        SymbolRef {
            pkg: pkg.to_string(),
            name: name.to_string(),
            kind: FixupKind::FillHigh,
        },
    ));
    block.push(IrInstr::tagged(
        Instruction::Ori {
            rt: dst,
            rs1: dst,
            imm: 0,
        },
        SymbolRef {
            pkg: pkg.to_string(),
            name: name.to_string(),
            kind: FixupKind::FillLow,
        },
    ));
}

/// Loads a constant 32-bit value into `reg`, using a single `ori` when the
/// value fits in 16 bits and the two-instruction `addui`+`ori` sequence
/// otherwise (`loadUint32` in the original).
pub fn load_uint32(block: &mut Block, dst: u32, v: u32) {
    let high = v >> 16;
    if high != 0 {
        block.push(IrInstr::plain(Instruction::Addui {
            rt: dst,
            rs1: reg::R0,
            imm: high as u16,
        }));
        block.push(IrInstr::plain(Instruction::Ori {
            rt: dst,
            rs1: dst,
            imm: v as u16,
        }));
    } else {
        block.push(IrInstr::plain(Instruction::Ori {
            rt: dst,
            rs1: reg::R0,
            imm: v as u16,
        }));
    }
}

/// Loads a byte literal, constructing negative values via `addui`+`ori`
/// (spec.md §9 supplemented feature, `loadRef` on `*byt` in the original).
fn load_byte_lit(block: &mut Block, dst: u32, b: ByteLit) {
    if b.unsigned {
        block.push(IrInstr::plain(Instruction::Ori {
            rt: dst,
            rs1: reg::R0,
            imm: u16::from(b.value),
        }));
        return;
    }
    let signed = b.value as i8;
    if signed >= 0 {
        block.push(IrInstr::plain(Instruction::Ori {
            rt: dst,
            rs1: reg::R0,
            imm: u16::from(signed as u8),
        }));
    } else {
        block.push(IrInstr::plain(Instruction::Addui {
            rt: dst,
            rs1: reg::R0,
            imm: 0xffff,
        }));
        block.push(IrInstr::plain(Instruction::Ori {
            rt: dst,
            rs1: dst,
            imm: (i32::from(signed) as u32 & 0xffff) as u16,
        }));
    }
}

/// Loads `r`'s *value* into `reg` (`loadRef` in `pl/codegen/reg_swap.go`).
pub fn load_ref(block: &mut Block, dst: u32, r: &Ref, frame_size: i32, is_arg: bool) {
    match r {
        Ref::Var(v) => load_var(block, dst, v, frame_size, is_arg),
        Ref::Number(n) => load_uint32(block, dst, *n as u32),
        Ref::Byte(b) => load_byte_lit(block, dst, *b),
        Ref::Func(d) => load_sym(block, dst, &d.pkg, &d.name),
        Ref::FuncSym(s) => load_sym(block, dst, &s.pkg, &s.name),
        Ref::HeapSym(h) => {
            if h.size == 0 {
                return;
            }
            load_sym(block, dst, &h.pkg, &h.name);
            let instr = if h.size == 1 {
                if h.unsigned_byte {
                    Instruction::Lbu {
                        rt: dst,
                        rs1: dst,
                        disp: 0,
                    }
                } else {
                    Instruction::Lb {
                        rt: dst,
                        rs1: dst,
                        disp: 0,
                    }
                }
            } else {
                Instruction::Lw {
                    rt: dst,
                    rs1: dst,
                    disp: 0,
                }
            };
            block.push(IrInstr::plain(instr));
        }
        Ref::AddrRef(a) => load_addr_ref_value(block, dst, a, frame_size, is_arg),
    }
}

fn load_addr_ref_value(block: &mut Block, dst: u32, a: &AddrRef, frame_size: i32, is_arg: bool) {
    if a.size == 0 {
        return;
    }
    load_ref(block, dst, &a.base, frame_size, is_arg);
    let instr = if a.size == 1 {
        if a.unsigned_byte {
            Instruction::Lbu {
                rt: dst,
                rs1: dst,
                disp: a.offset as i16,
            }
        } else {
            Instruction::Lb {
                rt: dst,
                rs1: dst,
                disp: a.offset as i16,
            }
        }
    } else {
        Instruction::Lw {
            rt: dst,
            rs1: dst,
            disp: a.offset as i16,
        }
    };
    block.push(IrInstr::plain(instr));
}

/// Saves `reg`'s value into `r` (`saveRef` in the original).
///
/// # Panics
/// If `r` is a constant reference (`Number`/`Byte`) — those are read-only
/// (`zeroRef`/`loadRef`'s "constant references are read only" panic in
/// `glang/codegen/zero.go`).
pub fn save_ref(block: &mut Block, src: u32, r: &Ref, tmp: u32, frame_size: i32, is_arg: bool) {
    assert!(!r.is_constant(), "constant references are read only");
    match r {
        Ref::Var(v) => save_var(block, src, v, frame_size, is_arg),
        Ref::HeapSym(h) => {
            if h.size == 0 {
                return;
            }
            load_sym(block, tmp, &h.pkg, &h.name);
            let instr = if h.size == 1 {
                Instruction::Sb {
                    rt: src,
                    rs1: tmp,
                    disp: 0,
                }
            } else {
                Instruction::Sw {
                    rt: src,
                    rs1: tmp,
                    disp: 0,
                }
            };
            block.push(IrInstr::plain(instr));
        }
        Ref::AddrRef(a) => {
            if a.size == 0 {
                return;
            }
            load_ref(block, tmp, &a.base, frame_size, is_arg);
            let instr = if a.size == 1 {
                Instruction::Sb {
                    rt: src,
                    rs1: tmp,
                    disp: a.offset as i16,
                }
            } else {
                Instruction::Sw {
                    rt: src,
                    rs1: tmp,
                    disp: a.offset as i16,
                }
            };
            block.push(IrInstr::plain(instr));
        }
        Ref::Func(_) | Ref::FuncSym(_) => panic!("function symbols are read only"),
        Ref::Number(_) | Ref::Byte(_) => unreachable!("checked above"),
    }
}

/// Computes the address a [`Ref`] lives at and materializes it into `reg`
/// (`loadAddr` in the original — `Var`/`AddrRef`/`HeapSym` are the only
/// addressable variants).
///
/// # Panics
/// If `r` is not addressable.
pub fn load_addr(block: &mut Block, dst: u32, r: &Ref, frame_size: i32, is_arg: bool) {
    match r {
        Ref::Var(v) => {
            let disp = if is_arg {
                -v.offset
            } else {
                frame_size - v.offset
            };
            block.push(IrInstr::plain(Instruction::Addi {
                rt: dst,
                rs1: reg::SP,
                imm: disp as i16,
            }));
        }
        Ref::HeapSym(h) => load_sym(block, dst, &h.pkg, &h.name),
        Ref::AddrRef(a) => {
            assert!(a.is_addressable(), "addr-ref not addressable");
            load_ref(block, dst, &a.base, frame_size, is_arg);
            if a.offset != 0 {
                block.push(IrInstr::plain(Instruction::Addi {
                    rt: dst,
                    rs1: dst,
                    imm: a.offset as i16,
                }));
            }
        }
        Ref::FuncSym(_) | Ref::Func(_) | Ref::Number(_) | Ref::Byte(_) => {
            panic!("{r} is not addressable")
        }
    }
}

/// Zeroes `size` bytes at the address already loaded in `addr_reg`, either
/// inline (small, register-sized) or via a call to the `rt.memClear`
/// runtime helper (`zeroAddr` in `glang/codegen/zero.go`).
pub fn zero_addr(block: &mut Block, addr_reg: u32, size: i32, reg_size_align: bool, scratch: u32) {
    match () {
        () if size < REG_SIZE => {
            for i in 0..size {
                block.push(IrInstr::plain(Instruction::Sb {
                    rt: reg::R0,
                    rs1: addr_reg,
                    disp: i as i16,
                }));
            }
        }
        () if size == REG_SIZE && reg_size_align => {
            block.push(IrInstr::plain(Instruction::Sw {
                rt: reg::R0,
                rs1: addr_reg,
                disp: 0,
            }));
        }
        () if size == 2 * REG_SIZE && reg_size_align => {
            block.push(IrInstr::plain(Instruction::Sw {
                rt: reg::R0,
                rs1: addr_reg,
                disp: 0,
            }));
            block.push(IrInstr::plain(Instruction::Sw {
                rt: reg::R0,
                rs1: addr_reg,
                disp: REG_SIZE as i16,
            }));
        }
        () => {
            load_uint32(block, scratch, size as u32);
            emit_runtime_call(block, "memClear");
        }
    }
}

/// Tags a `jal` to a named function in `pkg` (spec.md §4.7 `FillLink`).
pub fn emit_call(block: &mut Block, pkg: &str, name: &str) {
    block.push(IrInstr::tagged(
        Instruction::Jal { disp: 0 },
        SymbolRef {
            pkg: pkg.to_string(),
            name: name.to_string(),
            kind: FixupKind::FillLink,
        },
    ));
}

/// Tags a `jal` to one of the hand-built runtime helpers in the `rt`
/// package (spec.md §4.6 "implemented via a calling stub `memCopy`").
/// Arguments are expected to already sit in the fixed registers the
/// helper reads (`r1`=dest, `r2`=src/len, `r3`=len) by convention.
pub fn emit_runtime_call(block: &mut Block, helper: &str) {
    emit_call(block, crate::builtins::RT_PKG, helper);
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmkit_ir::VarRef;

    #[test]
    fn byte_var_loads_as_lb_or_lbu_per_flag() {
        let mut block = Block::new();
        let signed = VarRef::new("b", 1, false, false);
        load_var(&mut block, 1, &signed, 16, false);
        assert!(matches!(block.instrs[0].instr, Instruction::Lb { .. }));

        let mut block = Block::new();
        let unsigned = VarRef::new("b", 1, false, true);
        load_var(&mut block, 1, &unsigned, 16, false);
        assert!(matches!(block.instrs[0].instr, Instruction::Lbu { .. }));
    }

    #[test]
    fn arg_addressing_uses_negative_unshifted_offset() {
        let mut block = Block::new();
        let v = VarRef {
            name: "a".into(),
            size: 4,
            reg_size_align: true,
            offset: 8,
            unsigned_byte: false,
        };
        load_var(&mut block, 1, &v, 32, true);
        match block.instrs[0].instr {
            Instruction::Lw { disp, .. } => assert_eq!(disp, -8),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn negative_byte_literal_uses_addui_then_ori() {
        let mut block = Block::new();
        load_byte_lit(
            &mut block,
            1,
            ByteLit {
                value: (-5i8) as u8,
                unsigned: false,
            },
        );
        assert_eq!(block.instrs.len(), 2);
        assert!(matches!(block.instrs[0].instr, Instruction::Addui { .. }));
        assert!(matches!(block.instrs[1].instr, Instruction::Ori { .. }));
    }

    #[test]
    fn symbol_load_tags_both_instructions() {
        let mut block = Block::new();
        load_sym(&mut block, 1, "main", "f");
        assert_eq!(block.instrs.len(), 2);
        assert_eq!(
            block.instrs[0].sym.as_ref().unwrap().kind,
            FixupKind::FillHigh
        );
        assert_eq!(
            block.instrs[1].sym.as_ref().unwrap().kind,
            FixupKind::FillLow
        );
    }
}
