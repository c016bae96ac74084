use vmkit_core::reg;
use vmkit_ir::Ref;
use vmkit_isa::Instruction;
use vmkit_tast::expr::{BinOp, Expr, UnOp};
use vmkit_tast::stmt::Stmt;
use vmkit_tast::types::Type;

use crate::builder::FuncBuilder;
use crate::builtins;
use crate::error::{CodegenError, Result};
use crate::refs;

impl<'a> FuncBuilder<'a> {
    /// Lowers a statement list in its own lexical scope (`{ ... }` blocks,
    /// `if`/`for` bodies).
    pub fn lower_block(&mut self, stmts: &[Stmt]) -> Result<()> {
        self.push_scope();
        for s in stmts {
            self.lower_stmt(s)?;
        }
        self.pop_scope();
        Ok(())
    }

    pub fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDecl(v) => {
                let var = self.declare_local(&v.name, &v.ty);
                match &v.init {
                    Some(init) => self.lower_init(&Ref::Var(var), init)?,
                    None => self.zero_place(&Ref::Var(var))?,
                }
            }
            Stmt::Assign { lhs, rhs } => {
                let dest = self.lower_place(lhs)?;
                self.lower_init(&dest, rhs)?;
            }
            Stmt::ExprStmt(e) => {
                self.lower_expr_discard(e)?;
            }
            Stmt::Return(value) => {
                if let Some(e) = value {
                    let rets = self.frame.rets.clone();
                    assert_eq!(rets.len(), 1, "call-site returns are single-value only");
                    let dest = Ref::Var(rets[0].clone());
                    self.lower_init(&dest, e)?;
                }
                self.jump_to_exit();
            }
            Stmt::If { cond, then_body, else_body } => {
                self.lower_if(cond, then_body, else_body)?;
            }
            Stmt::For { init, cond, iter, body } => {
                self.lower_for(init.as_deref(), cond.as_ref(), iter.as_deref(), body)?;
            }
            Stmt::Block(b) => self.lower_block(b)?,
        }
        Ok(())
    }

    fn lower_if(&mut self, cond: &Expr, then_body: &[Stmt], else_body: &[Stmt]) -> Result<()> {
        let cond_reg = self.lower_rvalue(cond)?;
        // `else_block` is created first so it is the physical fallthrough:
        // `Branch` takes the explicit `target` when `cond_reg` is nonzero
        // and otherwise falls through to whichever block comes next in
        // layout order, so the false path must land here, not on `then_block`.
        let else_block = self.new_block();
        let then_block = self.new_block();
        let join = self.new_block();

        self.func.block_mut(self.cur).term = Some(vmkit_ir::Terminator::Branch {
            cond_reg,
            target: then_block,
        });
        self.regs.free(cond_reg);

        self.set_block(else_block);
        self.lower_block(else_body)?;
        if self.func.block_mut(self.cur).term.is_none() {
            self.func.block_mut(self.cur).term = Some(vmkit_ir::Terminator::Jump(join));
        }

        self.set_block(then_block);
        self.lower_block(then_body)?;
        if self.func.block_mut(self.cur).term.is_none() {
            self.func.block_mut(self.cur).term = Some(vmkit_ir::Terminator::Jump(join));
        }

        self.set_block(join);
        Ok(())
    }

    /// `for init; cond; iter { body }` lowers to a header block testing
    /// `cond` (defaulting to always-true), the body, the `iter` step, and a
    /// back edge — spec.md §4.6's description of the original's `for` shape.
    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        iter: Option<&Stmt>,
        body: &[Stmt],
    ) -> Result<()> {
        self.push_scope();
        if let Some(init) = init {
            self.lower_stmt(init)?;
        }

        let header = self.new_block();
        // `after` is created before `body_block` so it is the physical
        // fallthrough of the header's `Branch`: a false condition must fall
        // through to the loop exit, not into the body (mirroring
        // `build_mem_copy`'s `after`/`body` ordering in builtins.rs).
        let after = self.new_block();
        let body_block = self.new_block();

        self.func.block_mut(self.cur).term = Some(vmkit_ir::Terminator::Jump(header));

        self.set_block(header);
        match cond {
            Some(e) => {
                let r = self.lower_rvalue(e)?;
                self.func.block_mut(self.cur).term = Some(vmkit_ir::Terminator::Branch {
                    cond_reg: r,
                    target: body_block,
                });
                self.regs.free(r);
            }
            None => {
                self.func.block_mut(self.cur).term = Some(vmkit_ir::Terminator::Jump(body_block));
            }
        }

        self.set_block(body_block);
        self.lower_block(body)?;
        if let Some(iter) = iter {
            self.lower_stmt(iter)?;
        }
        if self.func.block_mut(self.cur).term.is_none() {
            self.func.block_mut(self.cur).term = Some(vmkit_ir::Terminator::Jump(header));
        }

        self.set_block(after);
        self.pop_scope();
        Ok(())
    }

    /// Lowers `dest = expr`, picking scalar assignment (through a register)
    /// or a whole-value copy depending on `dest`'s size, mirroring
    /// `copyRef`/`zeroRef` dispatch in `g8/codegen/copy.go`.
    fn lower_init(&mut self, dest: &Ref, expr: &Expr) -> Result<()> {
        if dest.is_constant() {
            panic!("constant references are read only");
        }
        if dest.size() > vmkit_core::REG_SIZE {
            return self.lower_aggregate_init(dest, expr);
        }
        let r = self.lower_rvalue(expr)?;
        let tmp = self.regs.alloc();
        refs::save_ref(self.func.block_mut(self.cur), r, dest, tmp, self.frame_size, false);
        self.regs.free(tmp);
        self.regs.free(r);
        Ok(())
    }

    fn lower_aggregate_init(&mut self, dest: &Ref, expr: &Expr) -> Result<()> {
        let src = self.lower_place(expr)?;
        self.copy_place(dest, &src, dest.size())
    }

    fn zero_place(&mut self, dest: &Ref) -> Result<()> {
        if vmkit_ir::can_be_zero(dest) {
            return Ok(());
        }
        if dest.size() <= vmkit_core::REG_SIZE {
            let tmp = self.regs.alloc();
            self.emit(Instruction::Ori { rt: tmp, rs1: reg::R0, imm: 0 });
            refs::save_ref(self.func.block_mut(self.cur), tmp, dest, reg::R1, self.frame_size, false);
            self.regs.free(tmp);
            return Ok(());
        }
        let addr = self.regs.alloc();
        refs::load_addr(self.func.block_mut(self.cur), addr, dest, self.frame_size, false);
        let reg_align = dest.reg_size_align();
        let scratch = self.regs.alloc();
        refs::zero_addr(self.func.block_mut(self.cur), addr, dest.size(), reg_align, scratch);
        self.regs.free(scratch);
        self.regs.free(addr);
        Ok(())
    }

    /// Copies `size` bytes from `src` to `dest`, both addressable, either
    /// inline (register-sized) or via `rt.memCopy` (`copyRef` in
    /// `g8/codegen/copy.go`).
    fn copy_place(&mut self, dest: &Ref, src: &Ref, size: i32) -> Result<()> {
        if size <= vmkit_core::REG_SIZE && dest.can_via_reg() && src.can_via_reg() {
            let r = self.regs.alloc();
            refs::load_ref(self.func.block_mut(self.cur), r, src, self.frame_size, false);
            let tmp = self.regs.alloc();
            refs::save_ref(self.func.block_mut(self.cur), r, dest, tmp, self.frame_size, false);
            self.regs.free(tmp);
            self.regs.free(r);
            return Ok(());
        }
        let d = reg::R1;
        let s = reg::R2;
        let n = reg::R3;
        refs::load_addr(self.func.block_mut(self.cur), d, dest, self.frame_size, false);
        refs::load_addr(self.func.block_mut(self.cur), s, src, self.frame_size, false);
        refs::load_uint32(self.func.block_mut(self.cur), n, size as u32);
        refs::emit_runtime_call(self.func.block_mut(self.cur), "memCopy");
        Ok(())
    }

    /// Evaluates `e` purely for its side effects (a bare call statement).
    fn lower_expr_discard(&mut self, e: &Expr) -> Result<()> {
        if e.ty().size() <= vmkit_core::REG_SIZE {
            let r = self.lower_rvalue(e)?;
            self.regs.free(r);
        } else {
            let _ = self.lower_place(e)?;
        }
        Ok(())
    }

    /// Lowers a scalar-valued expression into a freshly allocated register
    /// and returns it. Caller frees the register once done.
    pub fn lower_rvalue(&mut self, e: &Expr) -> Result<u32> {
        match e {
            Expr::IntLit { value, .. } => {
                let r = self.regs.alloc();
                refs::load_uint32(self.func.block_mut(self.cur), r, *value as u32);
                Ok(r)
            }
            Expr::ByteLit { value, ty } => {
                let r = self.regs.alloc();
                let unsigned = ty.byte_is_unsigned();
                refs::load_ref(
                    self.func.block_mut(self.cur),
                    r,
                    &Ref::Byte(vmkit_ir::ByteLit { value: *value, unsigned }),
                    self.frame_size,
                    false,
                );
                Ok(r)
            }
            Expr::BoolLit(b) => {
                let r = self.regs.alloc();
                refs::load_uint32(self.func.block_mut(self.cur), r, u32::from(*b));
                Ok(r)
            }
            Expr::Ident { name, .. } => {
                if let Some(call_exit) = self.as_exit_builtin_name(name) {
                    let _ = call_exit;
                }
                let rf = self.resolve(name)?;
                let r = self.regs.alloc();
                refs::load_ref(self.func.block_mut(self.cur), r, &rf, self.frame_size, false);
                Ok(r)
            }
            Expr::Unary { op, expr, .. } => self.lower_unary(*op, expr),
            Expr::Binary { op, lhs, rhs, .. } => self.lower_binary(*op, lhs, rhs),
            Expr::AddrOf { expr, .. } => {
                let place = self.lower_place(expr)?;
                let r = self.regs.alloc();
                refs::load_addr(self.func.block_mut(self.cur), r, &place, self.frame_size, false);
                Ok(r)
            }
            Expr::Deref { .. } | Expr::Index { .. } | Expr::Field { .. } => {
                let place = self.lower_place(e)?;
                let r = self.regs.alloc();
                refs::load_ref(self.func.block_mut(self.cur), r, &place, self.frame_size, false);
                Ok(r)
            }
            Expr::Call { func, args, ty } => self.lower_call(func, args, ty, None),
            Expr::MethodCall { receiver, name, args, ty } => {
                self.lower_method_call(receiver, name, args, ty)
            }
        }
    }

    fn as_exit_builtin_name<'n>(&self, name: &'n str) -> Option<&'n str> {
        if builtins::is_exit_builtin(name) {
            Some(name)
        } else {
            None
        }
    }

    fn lower_unary(&mut self, op: UnOp, expr: &Expr) -> Result<u32> {
        let r = self.lower_rvalue(expr)?;
        match op {
            UnOp::Neg => {
                let zero = self.regs.alloc();
                self.emit(Instruction::Ori { rt: zero, rs1: reg::R0, imm: 0 });
                self.emit(Instruction::Sub { rd: r, rs1: zero, rs2: r });
                self.regs.free(zero);
            }
            UnOp::Not => {
                self.emit(Instruction::Xori { rt: r, rs1: r, imm: 1 });
            }
        }
        Ok(r)
    }

    /// Arithmetic maps directly onto register-register opcodes; comparisons
    /// lower to the `slt`/`sltu`/`xor` sequences the ISA's closed opcode set
    /// requires (no native `le`/`ge`/`eq`/`ne`): `Eq` is `xor` then
    /// `sltu 1,result` inverted via `xori`, `Lt`/`Gt` use `slt` with operand
    /// order swapped for `Gt`, and `Le`/`Ge` invert the opposite strict
    /// comparison.
    fn lower_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<u32> {
        let l = self.lower_rvalue(lhs)?;
        let r = self.lower_rvalue(rhs)?;
        let unsigned = matches!(lhs.ty(), Type::Uint | Type::Pointer(_))
            || matches!(rhs.ty(), Type::Uint | Type::Pointer(_));

        match op {
            BinOp::Add => self.emit(Instruction::Add { rd: l, rs1: l, rs2: r }),
            BinOp::Sub => self.emit(Instruction::Sub { rd: l, rs1: l, rs2: r }),
            BinOp::And => self.emit(Instruction::And { rd: l, rs1: l, rs2: r }),
            BinOp::Or => self.emit(Instruction::Or { rd: l, rs1: l, rs2: r }),
            BinOp::Xor => self.emit(Instruction::Xor { rd: l, rs1: l, rs2: r }),
            BinOp::Eq => {
                self.emit(Instruction::Xor { rd: l, rs1: l, rs2: r });
                self.emit(Instruction::Sltu { rd: l, rs1: reg::R0, rs2: l });
                self.emit(Instruction::Xori { rt: l, rs1: l, imm: 1 });
            }
            BinOp::Ne => {
                self.emit(Instruction::Xor { rd: l, rs1: l, rs2: r });
                self.emit(Instruction::Sltu { rd: l, rs1: reg::R0, rs2: l });
            }
            BinOp::Lt => self.emit(slt(unsigned, l, l, r)),
            BinOp::Gt => self.emit(slt(unsigned, l, r, l)),
            BinOp::Le => {
                self.emit(slt(unsigned, l, r, l));
                self.emit(Instruction::Xori { rt: l, rs1: l, imm: 1 });
            }
            BinOp::Ge => {
                self.emit(slt(unsigned, l, l, r));
                self.emit(Instruction::Xori { rt: l, rs1: l, imm: 1 });
            }
        }
        self.regs.free(r);
        Ok(l)
    }

    /// Resolves a call target, addressable place (lvalue) or runtime value
    /// (rvalue) for an expression restricted by the front end to
    /// `Ident`/`Index`/`Field`/`Deref` (spec.md §4.6).
    pub fn lower_place(&mut self, e: &Expr) -> Result<Ref> {
        match e {
            Expr::Ident { name, .. } => self.resolve(name),
            Expr::Field { base, name, ty } => self.lower_field(base, name, ty),
            Expr::Index { array, index, has_colon: false, ty, .. } => {
                let index = index.as_ref().expect("non-slicing index always has an index expr");
                crate::index::lower_index(self, array, index, ty)
            }
            Expr::Index { array, index, index_end, has_colon: true, ty } => crate::index::lower_slice(
                self,
                array,
                index.as_deref(),
                index_end.as_deref(),
                ty,
            ),
            Expr::Deref { expr, ty } => {
                let base = self.lower_rvalue(expr)?;
                let var = self.spill_to_temp(base, &Type::Pointer(Box::new(ty.clone())));
                self.regs.free(base);
                Ok(Ref::AddrRef(vmkit_ir::AddrRef::new(
                    Ref::Var(var),
                    ty.size(),
                    0,
                    ty.byte_is_unsigned(),
                    ty.reg_size_align(),
                )))
            }
            other => panic!("{other:?} is not addressable"),
        }
    }

    fn lower_field(&mut self, base: &Expr, name: &str, ty: &Type) -> Result<Ref> {
        let struct_ty = match base.ty() {
            Type::Struct(s) => s.clone(),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Struct(s) => s.clone(),
                other => panic!("field access on non-struct pointer {other}"),
            },
            other => panic!("field access on non-struct type {other}"),
        };
        let field = struct_ty.field(name).ok_or_else(|| CodegenError::NoSuchField {
            pkg: self.pkg_name.clone(),
            func: self.func_name.clone(),
            ty: struct_ty.name.clone(),
            field: name.to_string(),
        })?;
        let base_ref = if matches!(base.ty(), Type::Pointer(_)) {
            let r = self.lower_rvalue(base)?;
            let var = self.spill_to_temp(r, base.ty());
            self.regs.free(r);
            Ref::Var(var)
        } else {
            self.lower_place(base)?
        };
        Ok(Ref::AddrRef(vmkit_ir::AddrRef::new(
            base_ref,
            field.ty.size(),
            field.offset,
            field.ty.byte_is_unsigned(),
            field.ty.reg_size_align(),
        )))
    }

    /// Materializes a register value into a fresh stack temp so it can be
    /// used as an [`vmkit_ir::AddrRef`] base (pointer dereference, field
    /// access through a pointer) — `Ref` has no "value currently in a
    /// register" variant, matching spec.md §4.5's closed set.
    fn spill_to_temp(&mut self, r: u32, ty: &Type) -> vmkit_ir::VarRef {
        let var = self.locals.alloc("<tmp>", ty);
        refs::save_var(self.func.block_mut(self.cur), r, &var, self.frame_size, false);
        var
    }

    fn lower_call(&mut self, func: &Expr, args: &[Expr], ty: &Type, receiver: Option<&Expr>) -> Result<u32> {
        let name = match func {
            Expr::Ident { name, .. } => name.clone(),
            other => panic!("indirect calls are not supported: {other:?}"),
        };

        if builtins::is_exit_builtin(&name) {
            assert_eq!(args.len(), 1, "exit takes exactly one argument");
            let r = self.lower_rvalue(&args[0])?;
            self.emit(Instruction::Add { rd: reg::RET, rs1: reg::R0, rs2: r });
            self.regs.free(r);
            self.emit(Instruction::Halt);
            return Ok(reg::RET);
        }

        let target_sig = self.resolve(&name).ok().and_then(|r| match r {
            Ref::FuncSym(s) => Some((s.pkg, s.name, s.sig)),
            Ref::Func(d) => Some((d.pkg, d.name, d.sig)),
            _ => None,
        });
        let Some((target_pkg, target_name, sig)) = target_sig else {
            return Err(CodegenError::UndefinedFunction {
                pkg: self.pkg_name.clone(),
                func: self.func_name.clone(),
                name,
            });
        };

        let layout = crate::frame::frame_layout_for_sig(&sig);
        let callee_args: &[vmkit_ir::VarRef] = if receiver.is_some() {
            &layout.args[1..]
        } else {
            &layout.args[..]
        };
        for (slot, expr) in callee_args.iter().zip(args.iter()) {
            self.store_call_arg(slot, expr)?;
        }
        if let Some(recv) = receiver {
            // A bond method's hidden first argument is the receiver's
            // address: already the value itself when `recv` is a pointer,
            // otherwise the address of the addressable struct place.
            let r = if matches!(recv.ty(), Type::Pointer(_)) {
                self.lower_rvalue(recv)?
            } else {
                let place = self.lower_place(recv)?;
                let r = self.regs.alloc();
                refs::load_addr(self.func.block_mut(self.cur), r, &place, self.frame_size, false);
                r
            };
            refs::save_var(self.func.block_mut(self.cur), r, &layout.args[0], self.frame_size, true);
            self.regs.free(r);
        }

        refs::emit_call(self.func.block_mut(self.cur), &target_pkg, &target_name);

        if ty.size() == 0 {
            let r = self.regs.alloc();
            self.emit(Instruction::Ori { rt: r, rs1: reg::R0, imm: 0 });
            return Ok(r);
        }
        assert_eq!(layout.rets.len(), 1, "multi-value returns are not usable as call expressions");
        let r = self.regs.alloc();
        refs::load_var(self.func.block_mut(self.cur), r, &layout.rets[0], self.frame_size, true);
        Ok(r)
    }

    fn store_call_arg(&mut self, slot: &vmkit_ir::VarRef, expr: &Expr) -> Result<()> {
        if slot.size <= vmkit_core::REG_SIZE {
            let r = self.lower_rvalue(expr)?;
            refs::save_var(self.func.block_mut(self.cur), r, slot, self.frame_size, true);
            self.regs.free(r);
        } else {
            let src = self.lower_place(expr)?;
            self.copy_place(&Ref::Var(slot.clone()), &src, slot.size)?;
        }
        Ok(())
    }

    /// `recv.name(args)` resolves to a call to the `"{struct}:{method}"`
    /// function with `recv`'s address passed as the hidden first argument
    /// (GLOSSARY "bond function"; `fillMethods` in `glang/pkg.go`).
    fn lower_method_call(&mut self, receiver: &Expr, name: &str, args: &[Expr], ty: &Type) -> Result<u32> {
        let struct_ty = match receiver.ty() {
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Struct(s) => s.clone(),
                other => {
                    return Err(CodegenError::NotAMethod {
                        pkg: self.pkg_name.clone(),
                        func: self.func_name.clone(),
                        name: format!("{other}.{name}"),
                    })
                }
            },
            Type::Struct(s) => s.clone(),
            other => {
                return Err(CodegenError::NotAMethod {
                    pkg: self.pkg_name.clone(),
                    func: self.func_name.clone(),
                    name: format!("{other}.{name}"),
                })
            }
        };
        let bond_name = format!("{}:{}", struct_ty.name, name);
        let func_expr = Expr::Ident {
            name: bond_name,
            ty: Type::Void,
        };
        self.lower_call(&func_expr, args, ty, Some(receiver))
    }
}

fn slt(unsigned: bool, rd: u32, rs1: u32, rs2: u32) -> Instruction {
    if unsigned {
        Instruction::Sltu { rd, rs1, rs2 }
    } else {
        Instruction::Slt { rd, rs1, rs2 }
    }
}
