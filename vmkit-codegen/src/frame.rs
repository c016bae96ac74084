use vmkit_core::REG_SIZE;
use vmkit_ir::VarRef;
use vmkit_tast::types::{FuncType, Type};

/// The retaddr/args/rets portion of a frame, computed purely from a
/// signature (`makeFuncSig` + the `Var`s `fillFuncs` attaches to a
/// function's own args/rets in the original `glang/pkg.go`). Both the
/// callee's prologue and every call site recompute this independently
/// from the same [`FuncType`], so caller and callee always agree on
/// offsets without the caller needing to see the callee's body.
#[derive(Debug, Clone)]
pub struct FrameLayout {
    pub retaddr: VarRef,
    pub args: Vec<VarRef>,
    pub rets: Vec<VarRef>,
    /// Total bytes consumed by retaddr + args + rets; the callee's local
    /// variables are allocated starting here.
    pub header_size: i32,
}

fn round_up4(n: i32) -> i32 {
    (n + 3) & !3
}

/// Mirrors `pl/codegen/var.go NewVar` allocation order: retaddr first (the
/// original's `loadRetAddr`/`saveRetAddr` reserve a dedicated slot), then
/// one `Var` per argument, then one per return value — each offset is the
/// running total *after* adding that var's (possibly alignment-rounded)
/// size, so `[SP+frame_size-offset]` lands within the frame.
#[must_use]
pub fn frame_layout_for_sig(sig: &FuncType) -> FrameLayout {
    let mut offset = 0;

    offset += REG_SIZE;
    let retaddr = VarRef {
        name: "<retaddr>".into(),
        size: REG_SIZE,
        reg_size_align: true,
        offset,
        unsigned_byte: false,
    };

    let mut args = Vec::with_capacity(sig.args.len());
    for a in &sig.args {
        offset += alloc_size(&a.ty);
        args.push(VarRef {
            name: a.name.clone(),
            size: a.ty.size(),
            reg_size_align: a.ty.reg_size_align(),
            offset,
            unsigned_byte: a.ty.byte_is_unsigned(),
        });
    }

    let mut rets = Vec::with_capacity(sig.rets.len());
    for r in &sig.rets {
        offset += alloc_size(&r.ty);
        rets.push(VarRef {
            name: r.name.clone(),
            size: r.ty.size(),
            reg_size_align: r.ty.reg_size_align(),
            offset,
            unsigned_byte: r.ty.byte_is_unsigned(),
        });
    }

    FrameLayout {
        retaddr,
        args,
        rets,
        header_size: offset,
    }
}

fn alloc_size(ty: &Type) -> i32 {
    if ty.reg_size_align() {
        round_up4(ty.size())
    } else {
        ty.size()
    }
}

/// Bump allocator for a function's local variables, continuing from the
/// signature's `header_size`.
#[derive(Debug, Clone)]
pub struct LocalAlloc {
    offset: i32,
}

impl LocalAlloc {
    #[must_use]
    pub fn new(header_size: i32) -> Self {
        Self { offset: header_size }
    }

    pub fn alloc(&mut self, name: impl Into<String>, ty: &Type) -> VarRef {
        self.offset += alloc_size(ty);
        VarRef {
            name: name.into(),
            size: ty.size(),
            reg_size_align: ty.reg_size_align(),
            offset: self.offset,
            unsigned_byte: ty.byte_is_unsigned(),
        }
    }

    /// A raw temp of a fixed byte size (used for the hand-built runtime
    /// helpers, which have no [`Type`] to allocate from).
    pub fn alloc_raw(&mut self, name: impl Into<String>, size: i32, reg_size_align: bool) -> VarRef {
        self.offset += if reg_size_align { round_up4(size) } else { size };
        VarRef {
            name: name.into(),
            size,
            reg_size_align,
            offset: self.offset,
            unsigned_byte: false,
        }
    }

    #[must_use]
    pub fn frame_size(&self) -> i32 {
        round_up4(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmkit_tast::types::{Arg, FuncType, Type};

    fn arg(name: &str, ty: Type) -> Arg {
        Arg {
            name: name.to_string(),
            ty,
        }
    }

    #[test]
    fn args_then_rets_grow_offsets_monotonically() {
        let sig = FuncType::new(
            vec![arg("a", Type::Int), arg("b", Type::Byte { signed: true })],
            vec![arg("", Type::Int)],
        );
        let layout = frame_layout_for_sig(&sig);
        assert!(layout.retaddr.offset < layout.args[0].offset);
        assert!(layout.args[0].offset < layout.args[1].offset);
        assert!(layout.args[1].offset < layout.rets[0].offset);
        assert_eq!(layout.header_size, layout.rets[0].offset);
    }

    #[test]
    fn locals_continue_past_the_signature_header() {
        let sig = FuncType::new(vec![arg("a", Type::Int)], vec![]);
        let layout = frame_layout_for_sig(&sig);
        let mut locals = LocalAlloc::new(layout.header_size);
        let v = locals.alloc("x", &Type::Int);
        assert!(v.offset > layout.header_size);
    }
}
