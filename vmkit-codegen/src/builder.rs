use std::collections::HashMap;
use std::rc::Rc;

use vmkit_core::reg;
use vmkit_ir::{BlockId, Function, Ref, VarRef};
use vmkit_tast::decl::FuncDecl;
use vmkit_tast::stmt::Stmt;
use vmkit_tast::types::{FuncType, Type};

use crate::error::{CodegenError, Result};
use crate::frame::{frame_layout_for_sig, FrameLayout, LocalAlloc};

/// Every symbol declared anywhere in the program, keyed by `(pkg, name)` —
/// built once, before any function body is lowered, so mutually recursive
/// functions (in the same or different packages) resolve without a forward
/// declaration pass (spec.md §9 two-pass package build, extended across
/// packages for cross-package calls).
#[derive(Debug, Default)]
pub struct Declarations {
    pub funcs: HashMap<(String, String), Rc<FuncType>>,
    /// size, unsigned-byte-flag
    pub vars: HashMap<(String, String), (i32, bool)>,
}

impl Declarations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_func(&mut self, pkg: &str, name: &str, sig: Rc<FuncType>) {
        self.funcs.insert((pkg.to_string(), name.to_string()), sig);
    }

    pub fn declare_var(&mut self, pkg: &str, name: &str, ty: &Type) {
        self.vars.insert(
            (pkg.to_string(), name.to_string()),
            (ty.size(), ty.byte_is_unsigned()),
        );
    }

    #[must_use]
    pub fn func(&self, pkg: &str, name: &str) -> Option<Rc<FuncType>> {
        self.funcs.get(&(pkg.to_string(), name.to_string())).cloned()
    }

    #[must_use]
    pub fn var(&self, pkg: &str, name: &str) -> Option<(i32, bool)> {
        self.vars.get(&(pkg.to_string(), name.to_string())).copied()
    }
}

/// A tiny round-robin pool over the four scratch registers (`r1`-`r4`):
/// expression evaluation never allocates more than this many live values at
/// once in the programs this front end accepts, so no real allocator is
/// needed (spec.md §9 design note trades a register allocator for this
/// fixed pool — see DESIGN.md). Running out panics; it would indicate a
/// front end accepting expressions deeper than this generator supports.
#[derive(Debug, Default)]
pub struct RegPool {
    free: Vec<u32>,
}

impl RegPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            free: vec![reg::R4, reg::R3, reg::R2, reg::R1],
        }
    }

    pub fn alloc(&mut self) -> u32 {
        self.free.pop().expect("expression nesting exceeded the scratch register pool")
    }

    pub fn free(&mut self, r: u32) {
        debug_assert!(!self.free.contains(&r));
        self.free.push(r);
    }
}

/// Per-function lowering context: the [`Function`] under construction, the
/// block currently being appended to, lexical scoping for locals, and the
/// resolved declarations of the whole program for symbol lookups that
/// escape the current function.
pub struct FuncBuilder<'a> {
    pub pkg_name: String,
    pub func_name: String,
    pub decls: &'a Declarations,
    pub pkg_consts: &'a HashMap<String, (i64, bool)>,
    pub pkg_vars: &'a HashMap<String, Type>,
    pub pkg_funcs: &'a HashMap<String, Rc<FuncType>>,
    pub func: Function,
    pub cur: BlockId,
    pub locals: LocalAlloc,
    pub scopes: Vec<HashMap<String, Ref>>,
    pub frame: FrameLayout,
    pub frame_size: i32,
    pub regs: RegPool,
    pub exit_block: BlockId,
}

impl<'a> FuncBuilder<'a> {
    #[must_use]
    pub fn new(
        pkg_name: &str,
        decl: &FuncDecl,
        frame_size: i32,
        decls: &'a Declarations,
        pkg_consts: &'a HashMap<String, (i64, bool)>,
        pkg_vars: &'a HashMap<String, Type>,
        pkg_funcs: &'a HashMap<String, Rc<FuncType>>,
    ) -> Self {
        let frame = frame_layout_for_sig(&decl.sig);
        let mut func = Function::new(&decl.name, decl.sig.clone());
        func.is_test = decl.is_test;
        func.frame_size = frame_size;
        let entry = func.entry();
        let exit_block = func.new_block();
        let body_entry = func.new_block();

        let mut scope = HashMap::new();
        for (name, var) in decl.arg_names.iter().zip(frame.args.iter()) {
            if !name.is_empty() {
                scope.insert(name.clone(), Ref::Var(var.clone()));
            }
        }

        let mut b = Self {
            pkg_name: pkg_name.to_string(),
            func_name: decl.name.clone(),
            decls,
            pkg_consts,
            pkg_vars,
            pkg_funcs,
            func,
            cur: entry,
            locals: LocalAlloc::new(frame.header_size),
            scopes: vec![scope],
            frame,
            frame_size,
            regs: RegPool::new(),
            exit_block,
        };

        // Prologue: shift SP to reserve this function's whole frame, then
        // stash the return address `jal` left in `RET` (spec.md §9 calling
        // convention: the caller never moves its own SP, only the callee
        // does, so every offset this function's own body computes lands on
        // exactly the bytes the caller addressed before the call).
        b.emit(vmkit_isa::Instruction::Addi {
            rt: reg::SP,
            rs1: reg::SP,
            imm: (-frame_size) as i16,
        });
        crate::refs::save_var(b.func.block_mut(entry), reg::RET, &b.frame.retaddr.clone(), frame_size, false);
        b.func.block_mut(entry).term = Some(vmkit_ir::Terminator::Jump(body_entry));
        b.cur = body_entry;

        // Epilogue, built now so every `return` only needs to jump here.
        let saved_cur = b.cur;
        b.cur = exit_block;
        crate::refs::load_var(b.func.block_mut(exit_block), reg::RET, &b.frame.retaddr.clone(), frame_size, false);
        b.emit(vmkit_isa::Instruction::Addi {
            rt: reg::SP,
            rs1: reg::SP,
            imm: frame_size as i16,
        });
        b.emit(vmkit_isa::Instruction::Jr { rs: reg::RET });
        b.cur = saved_cur;

        b
    }

    /// Jumps the current block to the shared epilogue (every `return`
    /// statement's lowering ends with this).
    pub fn jump_to_exit(&mut self) {
        self.func.block_mut(self.cur).term = Some(vmkit_ir::Terminator::Jump(self.exit_block));
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        assert!(!self.scopes.is_empty(), "popped the function's root scope");
    }

    pub fn declare_local(&mut self, name: &str, ty: &Type) -> VarRef {
        let v = self.locals.alloc(name, ty);
        self.scopes
            .last_mut()
            .expect("root scope always present")
            .insert(name.to_string(), Ref::Var(v.clone()));
        v
    }

    /// Resolves a bare identifier against local scope (innermost first),
    /// then this package's consts/vars/funcs, then a dotted `pkg.name`
    /// qualifies an explicit cross-package reference. Mirrors the
    /// declare-before-lower ordering `fillConsts`/`fillVars`/`fillFuncAlias`
    /// /`fillFuncs` establishes in the original `glang/pkg.go`.
    pub fn resolve(&self, name: &str) -> Result<Ref> {
        if let Some((pkg, sym)) = name.split_once('.') {
            if let Some(sig) = self.decls.func(pkg, sym) {
                return Ok(Ref::FuncSym(vmkit_ir::FuncSym {
                    pkg: pkg.to_string(),
                    name: sym.to_string(),
                    sig,
                }));
            }
            if let Some((size, unsigned_byte)) = self.decls.var(pkg, sym) {
                return Ok(Ref::HeapSym(vmkit_ir::HeapSym {
                    pkg: pkg.to_string(),
                    name: sym.to_string(),
                    size,
                    unsigned_byte,
                }));
            }
            return Err(CodegenError::UndefinedSymbol {
                pkg: self.pkg_name.clone(),
                func: self.func_name.clone(),
                name: name.to_string(),
            });
        }

        for scope in self.scopes.iter().rev() {
            if let Some(r) = scope.get(name) {
                return Ok(r.clone());
            }
        }
        if let Some((value, is_byte)) = self.pkg_consts.get(name) {
            return Ok(if *is_byte {
                Ref::Byte(vmkit_ir::ByteLit {
                    value: *value as u8,
                    unsigned: *value >= 0,
                })
            } else {
                Ref::Number(*value)
            });
        }
        if let Some(ty) = self.pkg_vars.get(name) {
            return Ok(Ref::HeapSym(vmkit_ir::HeapSym {
                pkg: self.pkg_name.clone(),
                name: name.to_string(),
                size: ty.size(),
                unsigned_byte: ty.byte_is_unsigned(),
            }));
        }
        if let Some(sig) = self.pkg_funcs.get(name) {
            return Ok(Ref::FuncSym(vmkit_ir::FuncSym {
                pkg: self.pkg_name.clone(),
                name: name.to_string(),
                sig: sig.clone(),
            }));
        }
        Err(CodegenError::UndefinedSymbol {
            pkg: self.pkg_name.clone(),
            func: self.func_name.clone(),
            name: name.to_string(),
        })
    }

    pub fn emit(&mut self, instr: vmkit_isa::Instruction) {
        self.func.block_mut(self.cur).push(vmkit_ir::IrInstr::plain(instr));
    }

    pub fn emit_tagged(&mut self, instr: vmkit_isa::Instruction, sym: vmkit_ir::SymbolRef) {
        self.func.block_mut(self.cur).push(vmkit_ir::IrInstr::tagged(instr, sym));
    }

    pub fn new_block(&mut self) -> BlockId {
        self.func.new_block()
    }

    pub fn set_block(&mut self, id: BlockId) {
        self.cur = id;
    }

    /// Recomputes and records the function's final local-allocation frame
    /// size (called once lowering finishes, after every [`Self::declare_local`]
    /// has run) — kept in sync with the prescan in [`crate::pkg::prescan_frame_size`].
    pub fn finish(mut self) -> Function {
        self.func.frame_size = self.frame_size;
        self.func
    }
}

/// Walks a function body purely to size its stack frame, without emitting
/// any code — run once before the real lowering pass so every instruction
/// that pass emits can bake in the final `frame_size` immediately (spec.md
/// §4.5 "a frame-size slot filled after register allocation", generalized
/// here to "after local declaration sizing").
#[must_use]
pub fn prescan_frame_size(sig: &FuncType, body: &[Stmt]) -> i32 {
    let header = frame_layout_for_sig(sig).header_size;
    let mut locals = LocalAlloc::new(header);
    walk_vardecls(body, &mut locals);
    locals.frame_size()
}

fn walk_vardecls(stmts: &[Stmt], locals: &mut LocalAlloc) {
    for s in stmts {
        match s {
            Stmt::VarDecl(v) => {
                locals.alloc(&v.name, &v.ty);
            }
            Stmt::If { then_body, else_body, .. } => {
                walk_vardecls(then_body, locals);
                walk_vardecls(else_body, locals);
            }
            Stmt::For { init, body, .. } => {
                if let Some(init) = init {
                    walk_vardecls(std::slice::from_ref(init.as_ref()), locals);
                }
                walk_vardecls(body, locals);
            }
            Stmt::Block(b) => walk_vardecls(b, locals),
            Stmt::Assign { .. } | Stmt::ExprStmt(_) | Stmt::Return(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmkit_tast::decl::arg;

    #[test]
    fn prescan_counts_locals_in_nested_blocks() {
        let sig = FuncType::new(vec![], vec![]);
        let body = vec![Stmt::If {
            cond: vmkit_tast::expr::Expr::BoolLit(true),
            then_body: vec![Stmt::VarDecl(vmkit_tast::stmt::VarDecl {
                name: "x".into(),
                ty: Type::Int,
                init: None,
            })],
            else_body: vec![],
        }];
        let header = frame_layout_for_sig(&sig).header_size;
        assert!(prescan_frame_size(&sig, &body) > header);
    }

    #[test]
    fn reg_pool_round_trips() {
        let mut pool = RegPool::new();
        let a = pool.alloc();
        let b = pool.alloc();
        assert_ne!(a, b);
        pool.free(a);
        pool.free(b);
    }

    #[test]
    #[allow(unused)]
    fn arg_helper_exists_for_tests() {
        let _ = arg("x", Type::Int);
    }
}
