//! Hand-built runtime helpers the generator calls into rather than lowering
//! from typed AST — there is no source text for these, so they are
//! assembled directly as [`vmkit_ir::Function`]s (`rt.memCopy`/`rt.memClear`
//! in the original's runtime support package).

use vmkit_core::reg;
use vmkit_ir::{Block, IrInstr, Package};
use vmkit_isa::Instruction;
use vmkit_tast::types::{FuncType, Type};
use std::rc::Rc;

/// Package name the hand-built helpers live under; call sites reference
/// them as ordinary `FillLink` symbol jumps, same as any other function.
pub const RT_PKG: &str = "rt";

/// Exit status a `halt` reached via a failed bounds check or other internal
/// invariant violation reports (`rt.panic`'s effect in the original,
/// reduced here to "the convention the driver's exit code reads off
/// `r6`/`RET` when the core halts" — see DESIGN.md).
pub const PANIC_EXIT_CODE: u32 = 2;

/// `rt.memCopy(dest r1, src r2, len r3)`: copies `len` bytes one at a time.
/// Used by codegen whenever a value larger than a register must move
/// between two addressable locations (`g8/codegen/copy.go`'s `copyRef`).
fn build_mem_copy() -> vmkit_ir::Function {
    let sig = Rc::new(FuncType::new(vec![], vec![]));
    let mut f = vmkit_ir::Function::new("memCopy", sig);

    let header = f.entry();
    let after = f.new_block();
    let body = f.new_block();

    // header: if len != 0 goto body, else fall through to after
    f.block_mut(header).term = Some(vmkit_ir::Terminator::Branch {
        cond_reg: reg::R3,
        target: body,
    });

    // body: r4 = byte[r2]; byte[r1] = r4; r1++; r2++; r3--; goto header
    {
        let b = f.block_mut(body);
        b.push(IrInstr::plain(Instruction::Lbu {
            rt: reg::R4,
            rs1: reg::R2,
            disp: 0,
        }));
        b.push(IrInstr::plain(Instruction::Sb {
            rt: reg::R4,
            rs1: reg::R1,
            disp: 0,
        }));
        b.push(IrInstr::plain(Instruction::Addi {
            rt: reg::R1,
            rs1: reg::R1,
            imm: 1,
        }));
        b.push(IrInstr::plain(Instruction::Addi {
            rt: reg::R2,
            rs1: reg::R2,
            imm: 1,
        }));
        b.push(IrInstr::plain(Instruction::Addi {
            rt: reg::R3,
            rs1: reg::R3,
            imm: -1,
        }));
        b.term = Some(vmkit_ir::Terminator::Jump(header));
    }

    f.block_mut(after).push(IrInstr::plain(Instruction::Jr { rs: reg::RET }));
    f
}

/// `rt.memClear(dest r1, len r2)`: zeroes `len` bytes one at a time.
fn build_mem_clear() -> vmkit_ir::Function {
    let sig = Rc::new(FuncType::new(vec![], vec![]));
    let mut f = vmkit_ir::Function::new("memClear", sig);

    let header = f.entry();
    let after = f.new_block();
    let body = f.new_block();

    f.block_mut(header).term = Some(vmkit_ir::Terminator::Branch {
        cond_reg: reg::R2,
        target: body,
    });

    {
        let b = f.block_mut(body);
        b.push(IrInstr::plain(Instruction::Sb {
            rt: reg::R0,
            rs1: reg::R1,
            disp: 0,
        }));
        b.push(IrInstr::plain(Instruction::Addi {
            rt: reg::R1,
            rs1: reg::R1,
            imm: 1,
        }));
        b.push(IrInstr::plain(Instruction::Addi {
            rt: reg::R2,
            rs1: reg::R2,
            imm: -1,
        }));
        b.term = Some(vmkit_ir::Terminator::Jump(header));
    }

    f.block_mut(after).push(IrInstr::plain(Instruction::Jr { rs: reg::RET }));
    f
}

/// `halt` with `RET` preloaded to [`PANIC_EXIT_CODE`] — what a failed bounds
/// check or a "constant references are read only" style invariant jumps to
/// (`rt.panic` in the original; here inlined rather than called, since it
/// never returns and every call site would immediately halt anyway).
pub fn emit_panic(block: &mut Block) {
    block.push(IrInstr::plain(Instruction::Ori {
        rt: reg::RET,
        rs1: reg::R0,
        imm: PANIC_EXIT_CODE as u16,
    }));
    block.push(IrInstr::plain(Instruction::Halt));
}

/// Builds the `rt` package, always linked in regardless of whether the
/// compiled program uses aggregates large enough to need it (dead-code
/// stripping of unused helpers is left to the linker's reachability pass,
/// spec.md §4.7, not implemented here — see DESIGN.md).
#[must_use]
pub fn build_runtime_package() -> Package {
    let mut pkg = Package::new(RT_PKG);
    pkg.declare_func("memCopy");
    pkg.declare_func("memClear");
    pkg.define_func("memCopy", build_mem_copy());
    pkg.define_func("memClear", build_mem_clear());
    pkg
}

#[must_use]
pub fn void_sig() -> Rc<FuncType> {
    Rc::new(FuncType::new(vec![], vec![]))
}

#[must_use]
pub fn is_exit_builtin(name: &str) -> bool {
    name == "exit"
}

#[must_use]
pub fn exit_arg_type() -> Type {
    Type::Int
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_package_declares_both_helpers() {
        let pkg = build_runtime_package();
        assert!(pkg.has_func("memCopy"));
        assert!(pkg.has_func("memClear"));
    }
}
