//! Bounds-checked array/slice indexing and slice construction, ported from
//! `pl/index.go`. The ISA has no multiply instruction, so a compile-time-
//! constant element stride is realized via an unrolled double-and-add
//! sequence rather than a single `mul` (see DESIGN.md).

use vmkit_core::reg;
use vmkit_ir::{AddrRef, Ref, VarRef};
use vmkit_isa::Instruction;
use vmkit_tast::expr::Expr;
use vmkit_tast::types::Type;

use crate::builder::FuncBuilder;
use crate::builtins::emit_panic;
use crate::error::Result;
use crate::refs;

/// `acc = src * constant`, built from `src` via repeated doubling
/// (`double-and-add`) since the ISA's closed opcode set has no multiply.
fn mul_by_const(b: &mut FuncBuilder, src: u32, constant: i32) -> u32 {
    let acc = b.regs.alloc();
    b.emit(Instruction::Ori { rt: acc, rs1: reg::R0, imm: 0 });
    if constant == 0 {
        return acc;
    }
    let pow = b.regs.alloc();
    b.emit(Instruction::Add { rd: pow, rs1: src, rs2: reg::R0 });

    let mut c = constant as u32;
    loop {
        if c & 1 == 1 {
            b.emit(Instruction::Add { rd: acc, rs1: acc, rs2: pow });
        }
        c >>= 1;
        if c == 0 {
            break;
        }
        b.emit(Instruction::Add { rd: pow, rs1: pow, rs2: pow });
    }
    b.regs.free(pow);
    acc
}

/// Emits `if !(idx <u bound) { panic }` — a single unsigned comparison
/// catches both a negative index (which wraps to a huge unsigned value)
/// and an out-of-range one (spec.md §8 "negative index... out-of-range...
/// triggers a panic call"). `panic_block` is created before `after` so the
/// false (out-of-bounds) path, which falls through rather than branches,
/// lands on the panic — the same shape as the sibling [`emit_le_check`].
fn emit_bounds_check(b: &mut FuncBuilder, idx: u32, bound: u32) {
    let ok = b.regs.alloc();
    b.emit(Instruction::Sltu { rd: ok, rs1: idx, rs2: bound });
    let panic_block = b.new_block();
    let after = b.new_block();

    b.func.block_mut(b.cur).term = Some(vmkit_ir::Terminator::Branch {
        cond_reg: ok,
        target: after,
    });
    b.regs.free(ok);

    b.set_block(panic_block);
    emit_panic(b.func.block_mut(b.cur));

    b.set_block(after);
}

/// The address and element type `array[index]` reads/writes through,
/// after a bounds check against the array's (compile-time, for
/// `Type::Array`) or slice's (runtime, for `Type::Slice`) length.
pub fn lower_index(b: &mut FuncBuilder, array: &Expr, index: &Expr, elem_ty: &Type) -> Result<Ref> {
    let stride = elem_ty.size_aligned();
    let idx = b.lower_rvalue(index)?;

    let (base_ptr, bound) = match array.ty() {
        Type::Array { len, .. } => {
            let place = b.lower_place(array)?;
            let base = b.regs.alloc();
            refs::load_addr(b.func.block_mut(b.cur), base, &place, b.frame_size, false);
            let bound = b.regs.alloc();
            refs::load_uint32(b.func.block_mut(b.cur), bound, *len);
            (base, bound)
        }
        Type::Slice(_) => {
            let place = b.lower_place(array)?;
            let var = match &place {
                Ref::Var(v) => v.clone(),
                other => panic!("slice value must live in a plain local, got {other:?}"),
            };
            let (base_field, len_field) = slice_fields(&var);
            let base = b.regs.alloc();
            refs::load_var(b.func.block_mut(b.cur), base, &base_field, b.frame_size, false);
            let bound = b.regs.alloc();
            refs::load_var(b.func.block_mut(b.cur), bound, &len_field, b.frame_size, false);
            (base, bound)
        }
        other => panic!("{other} is not indexable"),
    };

    emit_bounds_check(b, idx, bound);
    b.regs.free(bound);

    let offset_reg = mul_by_const(b, idx, stride);
    b.regs.free(idx);
    b.emit(Instruction::Add { rd: base_ptr, rs1: base_ptr, rs2: offset_reg });
    b.regs.free(offset_reg);

    let var = spill_ptr(b, base_ptr);
    b.regs.free(base_ptr);
    Ok(Ref::AddrRef(AddrRef::new(
        Ref::Var(var),
        elem_ty.size(),
        0,
        elem_ty.byte_is_unsigned(),
        elem_ty.reg_size_align(),
    )))
}

/// Splits an 8-byte `{base, len}` slice variable into its two adjacent
/// 4-byte halves within the same frame slot. `base` and `len` are plain
/// sibling `VarRef`s, not a pointer indirection through `var` — `var`
/// itself is never loaded as a value, only as a naming anchor for the
/// two offsets.
fn slice_fields(var: &VarRef) -> (VarRef, VarRef) {
    let base = VarRef {
        name: format!("{}.base", var.name),
        size: 4,
        reg_size_align: true,
        offset: var.offset - 4,
        unsigned_byte: false,
    };
    let len = VarRef {
        name: format!("{}.len", var.name),
        size: 4,
        reg_size_align: true,
        offset: var.offset,
        unsigned_byte: false,
    };
    (base, len)
}

fn spill_ptr(b: &mut FuncBuilder, r: u32) -> VarRef {
    let var = b.locals.alloc("<idxptr>", &Type::Pointer(Box::new(Type::Void)));
    refs::save_var(b.func.block_mut(b.cur), r, &var, b.frame_size, false);
    var
}

/// `array[lo:hi]`: builds a fresh two-word `{base, len}` record (spec.md
/// §4.6 "slicing produces a two-word record"). Absent bounds default to
/// `0` and the source's length; both ends are bounds-checked together as
/// `0 <= lo <= hi <= len` (spec.md §8's testable property).
pub fn lower_slice(
    b: &mut FuncBuilder,
    array: &Expr,
    lo: Option<&Expr>,
    hi: Option<&Expr>,
    ty: &Type,
) -> Result<Ref> {
    let elem_ty = match ty {
        Type::Slice(e) => e.as_ref().clone(),
        other => panic!("slice expression has non-slice type {other}"),
    };
    let stride = elem_ty.size_aligned();

    let (base_ptr, len) = match array.ty() {
        Type::Array { len, .. } => {
            let place = b.lower_place(array)?;
            let base = b.regs.alloc();
            refs::load_addr(b.func.block_mut(b.cur), base, &place, b.frame_size, false);
            (base, *len)
        }
        other => panic!("slicing {other} is not supported"),
    };

    let lo_reg = match lo {
        Some(e) => b.lower_rvalue(e)?,
        None => {
            let r = b.regs.alloc();
            b.emit(Instruction::Ori { rt: r, rs1: reg::R0, imm: 0 });
            r
        }
    };
    let hi_reg = match hi {
        Some(e) => b.lower_rvalue(e)?,
        None => {
            let r = b.regs.alloc();
            refs::load_uint32(b.func.block_mut(b.cur), r, len);
            r
        }
    };

    // `0 <= lo <= hi <= len` (spec.md §8): `lo` is a register already,
    // so the only checks needed are `lo <=u hi` and `hi <=u len`.
    emit_le_check(b, lo_reg, hi_reg);
    let len_bound = b.regs.alloc();
    refs::load_uint32(b.func.block_mut(b.cur), len_bound, len);
    emit_le_check(b, hi_reg, len_bound);
    b.regs.free(len_bound);

    let slice_len = b.regs.alloc();
    b.emit(Instruction::Sub { rd: slice_len, rs1: hi_reg, rs2: lo_reg });
    b.regs.free(hi_reg);

    let lo_off = mul_by_const(b, lo_reg, stride);
    b.regs.free(lo_reg);
    b.emit(Instruction::Add { rd: base_ptr, rs1: base_ptr, rs2: lo_off });
    b.regs.free(lo_off);

    let var = b.locals.alloc("<slice>", ty);
    let (base_field, len_field) = slice_fields(&var);
    refs::save_var(b.func.block_mut(b.cur), base_ptr, &base_field, b.frame_size, false);
    refs::save_var(b.func.block_mut(b.cur), slice_len, &len_field, b.frame_size, false);
    b.regs.free(base_ptr);
    b.regs.free(slice_len);

    Ok(Ref::Var(var))
}

/// `a <=u b`, branching to a panic when false (used for the slice-end vs
/// length check, where `hi <=u len` is the valid condition, the mirror
/// image of [`emit_bounds_check`]'s strict `<`).
fn emit_le_check(b: &mut FuncBuilder, a: u32, bound: u32) {
    let gt = b.regs.alloc();
    b.emit(Instruction::Sltu { rd: gt, rs1: bound, rs2: a });
    let ok_block = b.new_block();
    let panic_block = b.new_block();
    let after = b.new_block();

    b.func.block_mut(b.cur).term = Some(vmkit_ir::Terminator::Branch {
        cond_reg: gt,
        target: panic_block,
    });
    b.regs.free(gt);

    b.set_block(panic_block);
    emit_panic(b.func.block_mut(b.cur));

    b.set_block(ok_block);
    b.func.block_mut(b.cur).term = Some(vmkit_ir::Terminator::Jump(after));

    b.set_block(after);
}
