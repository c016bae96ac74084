//! Two-pass semantic analysis: a declare pass builds a signature table
//! across every package being compiled together (mirroring
//! `vmkit_codegen::pkg::declare_all`'s own two-pass shape), then a build
//! pass walks each package's bodies against that table, producing fully
//! typed [`vmkit_tast::decl::Pkg`] values.

use std::collections::HashMap;
use std::rc::Rc;

use vmkit_tast::decl::{
    ConstDecl as TConstDecl, FuncAliasDecl as TFuncAliasDecl, FuncDecl as TFuncDecl, GlobalVarDecl, Pkg,
};
use vmkit_tast::expr::{BinOp as TBinOp, Expr as TExpr, UnOp as TUnOp};
use vmkit_tast::stmt::{Stmt as TStmt, VarDecl as TVarDecl};
use vmkit_tast::types::{Arg, Field as TField, FuncType, StructType, Type};

use crate::ast;
use crate::diag::Diagnostics;
use crate::pos::Pos;

type Key = (String, String);

#[derive(Default)]
struct Declarations {
    pkg_names: Vec<String>,
    structs: HashMap<Key, Rc<StructType>>,
    funcs: HashMap<Key, Rc<FuncType>>,
    consts: HashMap<Key, (Type, i64)>,
    vars: HashMap<Key, Type>,
}

impl Declarations {
    fn is_pkg(&self, name: &str) -> bool {
        self.pkg_names.iter().any(|p| p == name)
    }
}

/// Checks a whole compilation unit (every file, possibly spanning several
/// packages, compiled together so cross-package references resolve) and
/// returns one fully typed [`Pkg`] per package in first-seen order.
#[must_use]
pub fn check_program(files: Vec<(String, ast::File)>) -> (Vec<Pkg>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut order: Vec<String> = Vec::new();
    let mut by_pkg: HashMap<String, Vec<ast::File>> = HashMap::new();
    for (_path, file) in files {
        if !by_pkg.contains_key(&file.pkg_name) {
            order.push(file.pkg_name.clone());
        }
        by_pkg.entry(file.pkg_name.clone()).or_default().push(file);
    }

    let mut decls = Declarations {
        pkg_names: order.clone(),
        ..Declarations::default()
    };

    resolve_structs(&order, &by_pkg, &mut decls, &mut diags);
    declare_consts_vars_funcs(&order, &by_pkg, &mut decls, &mut diags);
    resolve_aliases_later(&order, &by_pkg, &decls, &mut diags);

    let mut pkgs = Vec::new();
    for pkg_name in &order {
        let files = &by_pkg[pkg_name];
        pkgs.push(build_package(pkg_name, files, &decls, &mut diags));
    }
    (pkgs, diags)
}

fn resolve_type(cur_pkg: &str, t: &ast::TypeExpr, structs: &HashMap<Key, Rc<StructType>>) -> Option<Type> {
    match &t.kind {
        ast::TypeExprKind::Name(n) => match n.as_str() {
            "int" => Some(Type::Int),
            "uint" => Some(Type::Uint),
            "byte" => Some(Type::Byte { signed: true }),
            "u8" => Some(Type::Byte { signed: false }),
            "bool" => Some(Type::Bool),
            "void" => Some(Type::Void),
            other => {
                let key = match other.split_once('.') {
                    Some((pkg, name)) => (pkg.to_string(), name.to_string()),
                    None => (cur_pkg.to_string(), other.to_string()),
                };
                structs.get(&key).cloned().map(Type::Struct)
            }
        },
        ast::TypeExprKind::Pointer(inner) => {
            resolve_type(cur_pkg, inner, structs).map(|t| Type::Pointer(Box::new(t)))
        }
        ast::TypeExprKind::Array { elem, len } => {
            resolve_type(cur_pkg, elem, structs).map(|t| Type::Array { elem: Box::new(t), len: *len as u32 })
        }
        ast::TypeExprKind::Slice(elem) => resolve_type(cur_pkg, elem, structs).map(|t| Type::Slice(Box::new(t))),
    }
}

/// Builds every struct type in the whole program via a fixpoint: a struct
/// can be built as soon as every named struct type its fields mention is
/// already built, so declaration order within and across packages does
/// not matter. A struct left over after no round makes progress is
/// either unknown or part of a cycle.
fn resolve_structs(
    order: &[String],
    by_pkg: &HashMap<String, Vec<ast::File>>,
    decls: &mut Declarations,
    diags: &mut Diagnostics,
) {
    let mut pending: Vec<(String, ast::StructDecl)> = Vec::new();
    for pkg in order {
        for file in &by_pkg[pkg] {
            for d in &file.decls {
                if let ast::Decl::Struct(s) = d {
                    pending.push((pkg.clone(), s.clone()));
                }
            }
        }
    }

    loop {
        let mut progress = false;
        let mut still_pending = Vec::new();
        for (pkg, s) in pending {
            match try_build_struct(&pkg, &s, &decls.structs) {
                Some(st) => {
                    decls.structs.insert((pkg.clone(), s.name.clone()), Rc::new(st));
                    progress = true;
                }
                None => still_pending.push((pkg, s)),
            }
        }
        pending = still_pending;
        if pending.is_empty() || !progress {
            break;
        }
    }

    for (pkg, s) in pending {
        diags.push(
            s.pos.clone(),
            format!("struct {}.{} has an unresolved or cyclic field type", pkg, s.name),
        );
    }
}

fn try_build_struct(pkg: &str, s: &ast::StructDecl, structs: &HashMap<Key, Rc<StructType>>) -> Option<StructType> {
    let mut fields = Vec::new();
    let mut offset = 0i32;
    for f in &s.fields {
        let ty = resolve_type(pkg, &f.ty, structs)?;
        if ty.reg_size_align() {
            offset = (offset + 3) & !3;
        }
        fields.push(TField {
            name: f.name.clone(),
            ty: ty.clone(),
            offset,
        });
        offset += ty.size();
    }
    let size = (offset + 3) & !3;
    Some(StructType {
        name: s.name.clone(),
        fields,
        size,
    })
}

fn declare_consts_vars_funcs(
    order: &[String],
    by_pkg: &HashMap<String, Vec<ast::File>>,
    decls: &mut Declarations,
    diags: &mut Diagnostics,
) {
    for pkg in order {
        for file in &by_pkg[pkg] {
            for d in &file.decls {
                match d {
                    ast::Decl::Const(c) => {
                        let ty = resolve_type(pkg, &c.ty, &decls.structs).unwrap_or_else(|| {
                            diags.push(c.pos.clone(), format!("unknown type for const {}", c.name));
                            Type::Int
                        });
                        decls.consts.insert((pkg.clone(), c.name.clone()), (ty, c.value));
                    }
                    ast::Decl::Var(v) => {
                        let ty = resolve_type(pkg, &v.ty, &decls.structs).unwrap_or_else(|| {
                            diags.push(v.pos.clone(), format!("unknown type for var {}", v.name));
                            Type::Int
                        });
                        decls.vars.insert((pkg.clone(), v.name.clone()), ty);
                    }
                    ast::Decl::Func(f) => {
                        declare_func(pkg, f, decls, diags);
                    }
                    ast::Decl::FuncAlias(_) => {} // resolved once every func is declared
                }
            }
        }
    }
}

fn declare_func(pkg: &str, f: &ast::FuncDecl, decls: &mut Declarations, diags: &mut Diagnostics) {
    let params: Vec<Arg> = f
        .params
        .iter()
        .map(|p| Arg {
            name: p.name.clone(),
            ty: resolve_type(pkg, &p.ty, &decls.structs).unwrap_or_else(|| {
                diags.push(f.pos.clone(), format!("unknown parameter type in {}", f.name));
                Type::Int
            }),
        })
        .collect();
    let rets: Vec<Arg> = match &f.ret {
        Some(t) => vec![Arg {
            name: String::new(),
            ty: resolve_type(pkg, t, &decls.structs).unwrap_or(Type::Int),
        }],
        None => Vec::new(),
    };

    if let Some(recv) = &f.receiver {
        let recv_ty = resolve_type(pkg, &recv.ty, &decls.structs).unwrap_or_else(|| {
            diags.push(f.pos.clone(), format!("unknown receiver type for method {}", f.name));
            Type::Void
        });
        let struct_name = match &recv_ty {
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Struct(s) => s.name.clone(),
                _ => {
                    diags.push(f.pos.clone(), "receiver must be a pointer to a struct".to_string());
                    return;
                }
            },
            _ => {
                diags.push(f.pos.clone(), "receiver must be a pointer to a struct".to_string());
                return;
            }
        };
        let sig = FuncType::bond(
            Arg {
                name: recv.name.clone(),
                ty: recv_ty,
            },
            params,
            rets,
        );
        let composite = format!("{struct_name}:{}", f.name);
        decls.funcs.insert((pkg.to_string(), composite), Rc::new(sig));
    } else {
        let sig = FuncType::new(params, rets);
        decls.funcs.insert((pkg.to_string(), f.name.clone()), Rc::new(sig));
    }
}

fn resolve_aliases_later(
    order: &[String],
    by_pkg: &HashMap<String, Vec<ast::File>>,
    decls: &Declarations,
    diags: &mut Diagnostics,
) {
    for pkg in order {
        for file in &by_pkg[pkg] {
            for d in &file.decls {
                if let ast::Decl::FuncAlias(a) = d {
                    if decls.funcs.get(&(a.of_pkg.clone(), a.of_name.clone())).is_none() {
                        diags.push(
                            a.pos.clone(),
                            format!("alias target {}.{} is not declared", a.of_pkg, a.of_name),
                        );
                    }
                }
            }
        }
    }
}

struct FuncCtx<'a> {
    cur_pkg: &'a str,
    decls: &'a Declarations,
    scopes: Vec<HashMap<String, Type>>,
}

impl<'a> FuncCtx<'a> {
    fn new(cur_pkg: &'a str, decls: &'a Declarations) -> Self {
        Self {
            cur_pkg,
            decls,
            scopes: vec![HashMap::new()],
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare_local(&mut self, name: &str, ty: Type) {
        self.scopes.last_mut().expect("at least one scope").insert(name.to_string(), ty);
    }

    fn lookup_local(&self, name: &str) -> Option<Type> {
        self.scopes.iter().rev().find_map(|s| s.get(name).cloned())
    }

    /// Local scope, then package const, then package var, then package
    /// func — the order `FuncBuilder::resolve` uses in the lowering
    /// crate.
    fn resolve_ident(&self, name: &str) -> Option<(String, Type)> {
        if let Some(ty) = self.lookup_local(name) {
            return Some((name.to_string(), ty));
        }
        self.resolve_pkg_qualified(self.cur_pkg, name)
    }

    fn resolve_pkg_qualified(&self, pkg: &str, name: &str) -> Option<(String, Type)> {
        let key = (pkg.to_string(), name.to_string());
        if let Some((ty, _)) = self.decls.consts.get(&key) {
            return Some((name.to_string(), ty.clone()));
        }
        if let Some(ty) = self.decls.vars.get(&key) {
            return Some((name.to_string(), ty.clone()));
        }
        if let Some(sig) = self.decls.funcs.get(&key) {
            return Some((name.to_string(), Type::Func(sig.clone())));
        }
        None
    }

    /// Finds a method `name` on a struct type, trying the current package
    /// first (where most methods live) and then every other package, so a
    /// struct type imported from elsewhere can still be called on.
    fn resolve_method(&self, struct_name: &str, name: &str) -> Option<Rc<FuncType>> {
        let composite = format!("{struct_name}:{name}");
        if let Some(sig) = self.decls.funcs.get(&(self.cur_pkg.to_string(), composite.clone())) {
            return Some(sig.clone());
        }
        self.decls
            .pkg_names
            .iter()
            .find_map(|p| self.decls.funcs.get(&(p.clone(), composite.clone())).cloned())
    }
}

const EXIT_BUILTIN: &str = "exit";

fn build_package(pkg_name: &str, files: &[ast::File], decls: &Declarations, diags: &mut Diagnostics) -> Pkg {
    let mut pkg = Pkg::new(pkg_name);

    for file in files {
        for d in &file.decls {
            match d {
                ast::Decl::Struct(s) => {
                    if let Some(st) = decls.structs.get(&(pkg_name.to_string(), s.name.clone())) {
                        pkg.structs.push(st.clone());
                    }
                }
                ast::Decl::Const(c) => {
                    if let Some((ty, value)) = decls.consts.get(&(pkg_name.to_string(), c.name.clone())) {
                        pkg.consts.push(TConstDecl {
                            name: c.name.clone(),
                            ty: ty.clone(),
                            value: *value,
                        });
                    }
                }
                ast::Decl::Var(v) => {
                    if let Some(ty) = decls.vars.get(&(pkg_name.to_string(), v.name.clone())) {
                        pkg.vars.push(GlobalVarDecl {
                            name: v.name.clone(),
                            ty: ty.clone(),
                        });
                    }
                }
                ast::Decl::FuncAlias(a) => {
                    if let Some(sig) = decls.funcs.get(&(a.of_pkg.clone(), a.of_name.clone())) {
                        pkg.func_aliases.push(TFuncAliasDecl {
                            name: a.name.clone(),
                            sig: sig.clone(),
                            of_pkg: a.of_pkg.clone(),
                            of_name: a.of_name.clone(),
                        });
                    }
                }
                ast::Decl::Func(f) => {
                    let built = build_func(pkg_name, f, decls, diags);
                    if f.receiver.is_some() {
                        pkg.methods.push(built);
                    } else {
                        pkg.funcs.push(built);
                    }
                }
            }
        }
    }

    pkg
}

fn build_func(pkg_name: &str, f: &ast::FuncDecl, decls: &Declarations, diags: &mut Diagnostics) -> TFuncDecl {
    let mut ctx = FuncCtx::new(pkg_name, decls);

    let mut arg_names = Vec::new();
    let (sig, struct_name) = if let Some(recv) = &f.receiver {
        let recv_ty = resolve_type(pkg_name, &recv.ty, &decls.structs).unwrap_or(Type::Void);
        let struct_name = match &recv_ty {
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Struct(s) => Some(s.name.clone()),
                _ => None,
            },
            _ => None,
        };
        ctx.declare_local(&recv.name, recv_ty.clone());
        arg_names.push(recv.name.clone());
        let params: Vec<Arg> = f
            .params
            .iter()
            .map(|p| {
                let ty = resolve_type(pkg_name, &p.ty, &decls.structs).unwrap_or(Type::Int);
                ctx.declare_local(&p.name, ty.clone());
                arg_names.push(p.name.clone());
                Arg { name: p.name.clone(), ty }
            })
            .collect();
        let rets = ret_args(pkg_name, &f.ret, &decls.structs);
        let sig = FuncType::bond(Arg { name: recv.name.clone(), ty: recv_ty }, params, rets);
        (sig, struct_name)
    } else {
        let params: Vec<Arg> = f
            .params
            .iter()
            .map(|p| {
                let ty = resolve_type(pkg_name, &p.ty, &decls.structs).unwrap_or(Type::Int);
                ctx.declare_local(&p.name, ty.clone());
                arg_names.push(p.name.clone());
                Arg { name: p.name.clone(), ty }
            })
            .collect();
        let rets = ret_args(pkg_name, &f.ret, &decls.structs);
        (FuncType::new(params, rets), None)
    };

    let name = match &struct_name {
        Some(s) => format!("{s}:{}", f.name),
        None => f.name.clone(),
    };

    let body = lower_block(&f.body, &mut ctx, diags);

    TFuncDecl {
        name,
        sig: Rc::new(sig),
        arg_names,
        body,
        is_test: f.is_test,
    }
}

fn ret_args(pkg_name: &str, ret: &Option<ast::TypeExpr>, structs: &HashMap<Key, Rc<StructType>>) -> Vec<Arg> {
    match ret {
        Some(t) => vec![Arg {
            name: String::new(),
            ty: resolve_type(pkg_name, t, structs).unwrap_or(Type::Int),
        }],
        None => Vec::new(),
    }
}

fn lower_block(stmts: &[ast::Stmt], ctx: &mut FuncCtx, diags: &mut Diagnostics) -> Vec<TStmt> {
    ctx.push_scope();
    let out = stmts.iter().map(|s| lower_stmt(s, ctx, diags)).collect();
    ctx.pop_scope();
    out
}

fn lower_stmt(stmt: &ast::Stmt, ctx: &mut FuncCtx, diags: &mut Diagnostics) -> TStmt {
    match stmt {
        ast::Stmt::VarDecl { name, ty, init, pos } => {
            let lowered_init = init.as_ref().map(|e| lower_expr(e, ctx, diags));
            let declared_ty = match ty {
                Some(t) => resolve_type(ctx.cur_pkg, t, &ctx.decls.structs).unwrap_or_else(|| {
                    diags.push(pos.clone(), format!("unknown type for var {name}"));
                    Type::Int
                }),
                None => lowered_init
                    .as_ref()
                    .map(|e| e.ty().clone())
                    .unwrap_or_else(|| {
                        diags.push(pos.clone(), format!("cannot infer type for var {name} with no initializer"));
                        Type::Int
                    }),
            };
            ctx.declare_local(name, declared_ty.clone());
            TStmt::VarDecl(TVarDecl {
                name: name.clone(),
                ty: declared_ty,
                init: lowered_init,
            })
        }
        ast::Stmt::Assign { lhs, rhs, .. } => TStmt::Assign {
            lhs: lower_expr(lhs, ctx, diags),
            rhs: lower_expr(rhs, ctx, diags),
        },
        ast::Stmt::ExprStmt(e) => TStmt::ExprStmt(lower_expr(e, ctx, diags)),
        ast::Stmt::Return { value, .. } => TStmt::Return(value.as_ref().map(|e| lower_expr(e, ctx, diags))),
        ast::Stmt::If { cond, then_body, else_body, .. } => TStmt::If {
            cond: lower_expr(cond, ctx, diags),
            then_body: lower_block(then_body, ctx, diags),
            else_body: lower_block(else_body, ctx, diags),
        },
        ast::Stmt::For { init, cond, iter, body, .. } => {
            ctx.push_scope();
            let init = init.as_ref().map(|s| Box::new(lower_stmt(s, ctx, diags)));
            let cond = cond.as_ref().map(|e| lower_expr(e, ctx, diags));
            let iter = iter.as_ref().map(|s| Box::new(lower_stmt(s, ctx, diags)));
            let body = lower_block(body, ctx, diags);
            ctx.pop_scope();
            TStmt::For { init, cond, iter, body }
        }
        ast::Stmt::Block(b) => TStmt::Block(lower_block(b, ctx, diags)),
    }
}

fn lower_expr(expr: &ast::Expr, ctx: &mut FuncCtx, diags: &mut Diagnostics) -> TExpr {
    match expr {
        ast::Expr::IntLit(v, _) => TExpr::IntLit { value: *v, ty: Type::Int },
        ast::Expr::ByteLit(b, _) => TExpr::ByteLit { value: *b, ty: Type::Byte { signed: true } },
        ast::Expr::BoolLit(b, _) => TExpr::BoolLit(*b),
        ast::Expr::Ident(name, pos) => lower_ident(name, pos, ctx, diags),
        ast::Expr::Unary { op, expr, pos } => {
            let inner = lower_expr(expr, ctx, diags);
            let (top, ty) = match op {
                ast::UnOp::Neg => (TUnOp::Neg, inner.ty().clone()),
                ast::UnOp::Not => (TUnOp::Not, Type::Bool),
            };
            let _ = pos;
            TExpr::Unary { op: top, expr: Box::new(inner), ty }
        }
        ast::Expr::Binary { op, lhs, rhs, pos } => {
            let lhs_t = lower_expr(lhs, ctx, diags);
            let rhs_t = lower_expr(rhs, ctx, diags);
            let top = map_binop(*op);
            let ty = match top {
                TBinOp::Eq | TBinOp::Ne | TBinOp::Lt | TBinOp::Le | TBinOp::Gt | TBinOp::Ge => Type::Bool,
                _ => lhs_t.ty().clone(),
            };
            if lhs_t.ty() != rhs_t.ty() && !matches!(top, TBinOp::Eq | TBinOp::Ne | TBinOp::Lt | TBinOp::Le | TBinOp::Gt | TBinOp::Ge) {
                diags.push(pos.clone(), format!("mismatched operand types {} and {}", lhs_t.ty(), rhs_t.ty()));
            }
            TExpr::Binary { op: top, lhs: Box::new(lhs_t), rhs: Box::new(rhs_t), ty }
        }
        ast::Expr::Index { array, index, pos } => {
            let arr = lower_expr(array, ctx, diags);
            let idx = lower_expr(index, ctx, diags);
            let elem_ty = element_type(arr.ty(), pos, diags);
            TExpr::Index {
                array: Box::new(arr),
                index: Some(Box::new(idx)),
                index_end: None,
                has_colon: false,
                ty: elem_ty,
            }
        }
        ast::Expr::Slice { array, lo, hi, pos } => {
            let arr = lower_expr(array, ctx, diags);
            let elem_ty = element_type(arr.ty(), pos, diags);
            let lo = lo.as_ref().map(|e| Box::new(lower_expr(e, ctx, diags)));
            let hi = hi.as_ref().map(|e| Box::new(lower_expr(e, ctx, diags)));
            TExpr::Index {
                array: Box::new(arr),
                index: lo,
                index_end: hi,
                has_colon: true,
                ty: Type::Slice(Box::new(elem_ty)),
            }
        }
        ast::Expr::AddrOf { expr, .. } => {
            let inner = lower_expr(expr, ctx, diags);
            let ty = Type::Pointer(Box::new(inner.ty().clone()));
            TExpr::AddrOf { expr: Box::new(inner), ty }
        }
        ast::Expr::Deref { expr, pos } => {
            let inner = lower_expr(expr, ctx, diags);
            let ty = match inner.ty() {
                Type::Pointer(t) => t.as_ref().clone(),
                other => {
                    diags.push(pos.clone(), format!("cannot dereference non-pointer type {other}"));
                    Type::Int
                }
            };
            TExpr::Deref { expr: Box::new(inner), ty }
        }
        ast::Expr::Field { base, name, pos } => lower_field(base, name, pos, ctx, diags),
        ast::Expr::Call { func, args, pos } => lower_call(func, args, pos, ctx, diags),
    }
}

fn lower_ident(name: &str, pos: &Pos, ctx: &mut FuncCtx, diags: &mut Diagnostics) -> TExpr {
    match ctx.resolve_ident(name) {
        Some((name, ty)) => TExpr::Ident { name, ty },
        None => {
            diags.push(pos.clone(), format!("undeclared name {name}"));
            TExpr::Ident { name: name.to_string(), ty: Type::Int }
        }
    }
}

fn map_binop(op: ast::BinOp) -> TBinOp {
    match op {
        ast::BinOp::Add => TBinOp::Add,
        ast::BinOp::Sub => TBinOp::Sub,
        ast::BinOp::And => TBinOp::And,
        ast::BinOp::Or => TBinOp::Or,
        ast::BinOp::Xor => TBinOp::Xor,
        ast::BinOp::Eq => TBinOp::Eq,
        ast::BinOp::Ne => TBinOp::Ne,
        ast::BinOp::Lt => TBinOp::Lt,
        ast::BinOp::Le => TBinOp::Le,
        ast::BinOp::Gt => TBinOp::Gt,
        ast::BinOp::Ge => TBinOp::Ge,
    }
}

fn element_type(container: &Type, pos: &Pos, diags: &mut Diagnostics) -> Type {
    match container {
        Type::Array { elem, .. } => elem.as_ref().clone(),
        Type::Slice(elem) => elem.as_ref().clone(),
        other => {
            diags.push(pos.clone(), format!("cannot index into type {other}"));
            Type::Int
        }
    }
}

fn lower_field(base: &ast::Expr, name: &str, pos: &Pos, ctx: &mut FuncCtx, diags: &mut Diagnostics) -> TExpr {
    if let ast::Expr::Ident(pkg_name, _) = base {
        if ctx.decls.is_pkg(pkg_name) && ctx.lookup_local(pkg_name).is_none() {
            return match ctx.resolve_pkg_qualified(pkg_name, name) {
                Some((_, ty)) => TExpr::Ident { name: format!("{pkg_name}.{name}"), ty },
                None => {
                    diags.push(pos.clone(), format!("{pkg_name}.{name} is not declared"));
                    TExpr::Ident { name: format!("{pkg_name}.{name}"), ty: Type::Int }
                }
            };
        }
    }

    let lowered_base = lower_expr(base, ctx, diags);
    let struct_ty = match lowered_base.ty() {
        Type::Struct(s) => Some(s.clone()),
        Type::Pointer(inner) => match inner.as_ref() {
            Type::Struct(s) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    };
    match struct_ty.as_ref().and_then(|s| s.field(name)) {
        Some(field) => TExpr::Field {
            base: Box::new(lowered_base),
            name: name.to_string(),
            ty: field.ty.clone(),
        },
        None => {
            diags.push(pos.clone(), format!("no such field {name}"));
            TExpr::Field { base: Box::new(lowered_base), name: name.to_string(), ty: Type::Int }
        }
    }
}

fn lower_call(func: &ast::Expr, args: &[ast::Expr], pos: &Pos, ctx: &mut FuncCtx, diags: &mut Diagnostics) -> TExpr {
    if let ast::Expr::Ident(name, _) = func {
        if name == EXIT_BUILTIN {
            let lowered_args: Vec<TExpr> = args.iter().map(|a| lower_expr(a, ctx, diags)).collect();
            let sig = Rc::new(FuncType::new(vec![Arg { name: "code".into(), ty: Type::Int }], vec![]));
            return TExpr::Call {
                func: Box::new(TExpr::Ident { name: EXIT_BUILTIN.to_string(), ty: Type::Func(sig) }),
                args: lowered_args,
                ty: Type::Void,
            };
        }
    }

    if let ast::Expr::Field { base, name, pos: field_pos } = func {
        if let ast::Expr::Ident(pkg_name, _) = base.as_ref() {
            if ctx.decls.is_pkg(pkg_name) && ctx.lookup_local(pkg_name).is_none() {
                let lowered_args: Vec<TExpr> = args.iter().map(|a| lower_expr(a, ctx, diags)).collect();
                return match ctx.resolve_pkg_qualified(pkg_name, name) {
                    Some((_, Type::Func(sig))) => {
                        let ty = sig.ret_types().into_iter().next().unwrap_or(Type::Void);
                        TExpr::Call {
                            func: Box::new(TExpr::Ident { name: format!("{pkg_name}.{name}"), ty: Type::Func(sig.clone()) }),
                            args: lowered_args,
                            ty,
                        }
                    }
                    _ => {
                        diags.push(field_pos.clone(), format!("{pkg_name}.{name} is not a function"));
                        TExpr::Call {
                            func: Box::new(TExpr::Ident { name: format!("{pkg_name}.{name}"), ty: Type::Int }),
                            args: lowered_args,
                            ty: Type::Void,
                        }
                    }
                };
            }
        }

        let receiver = lower_expr(base, ctx, diags);
        let struct_name = match receiver.ty() {
            Type::Struct(s) => Some(s.name.clone()),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Struct(s) => Some(s.name.clone()),
                _ => None,
            },
            _ => None,
        };
        let lowered_args: Vec<TExpr> = args.iter().map(|a| lower_expr(a, ctx, diags)).collect();
        let sig = struct_name.as_deref().and_then(|s| ctx.resolve_method(s, name));
        return match sig {
            Some(sig) => {
                let ty = sig.ret_types().into_iter().next().unwrap_or(Type::Void);
                TExpr::MethodCall {
                    receiver: Box::new(receiver),
                    name: name.clone(),
                    args: lowered_args,
                    ty,
                }
            }
            None => {
                diags.push(field_pos.clone(), format!("no such method {name}"));
                TExpr::MethodCall { receiver: Box::new(receiver), name: name.clone(), args: lowered_args, ty: Type::Void }
            }
        };
    }

    if let ast::Expr::Ident(name, ident_pos) = func {
        let lowered_args: Vec<TExpr> = args.iter().map(|a| lower_expr(a, ctx, diags)).collect();
        return match ctx.resolve_ident(name) {
            Some((name, Type::Func(sig))) => {
                let ty = sig.ret_types().into_iter().next().unwrap_or(Type::Void);
                TExpr::Call { func: Box::new(TExpr::Ident { name, ty: Type::Func(sig) }), args: lowered_args, ty }
            }
            _ => {
                diags.push(ident_pos.clone(), format!("{name} is not a function"));
                TExpr::Call { func: Box::new(TExpr::Ident { name: name.clone(), ty: Type::Int }), args: lowered_args, ty: Type::Void }
            }
        };
    }

    diags.push(pos.clone(), "expression is not callable".to_string());
    TExpr::Call { func: Box::new(lower_expr(func, ctx, diags)), args: args.iter().map(|a| lower_expr(a, ctx, diags)).collect(), ty: Type::Void }
}
