//! Untyped parse tree — what [`crate::parser::Parser`] produces and
//! [`crate::sema`] consumes. Kept separate from `vmkit_tast` so the parser
//! never has to know a type before it has seen one (spec.md §3: the code
//! generator only ever sees fully typed AST; this is the stage before
//! that).

use crate::pos::Pos;

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    Name(String),
    Pointer(Box<TypeExpr>),
    Array { elem: Box<TypeExpr>, len: i64 },
    Slice(Box<TypeExpr>),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<Field>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub value: i64,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub pos: Pos,
}

/// `func (recv *T) name(params) ret { body }` — `recv` is `Some` exactly
/// when this is a method.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Param>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    pub is_test: bool,
    pub pos: Pos,
}

/// `func g = pkg.f` — a bodyless redirect to an already-declared function.
#[derive(Debug, Clone)]
pub struct FuncAliasDecl {
    pub name: String,
    pub of_pkg: String,
    pub of_name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Struct(StructDecl),
    Const(ConstDecl),
    Var(VarDecl),
    Func(FuncDecl),
    FuncAlias(FuncAliasDecl),
}

#[derive(Debug, Clone)]
pub struct File {
    pub pkg_name: String,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    VarDecl { name: String, ty: Option<TypeExpr>, init: Option<Expr>, pos: Pos },
    Assign { lhs: Expr, rhs: Expr, pos: Pos },
    ExprStmt(Expr),
    Return { value: Option<Expr>, pos: Pos },
    If { cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>, pos: Pos },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        iter: Option<Box<Stmt>>,
        body: Vec<Stmt>,
        pos: Pos,
    },
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(String, Pos),
    IntLit(i64, Pos),
    ByteLit(u8, Pos),
    BoolLit(bool, Pos),
    Unary { op: UnOp, expr: Box<Expr>, pos: Pos },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr>, pos: Pos },
    Index { array: Box<Expr>, index: Box<Expr>, pos: Pos },
    Slice { array: Box<Expr>, lo: Option<Box<Expr>>, hi: Option<Box<Expr>>, pos: Pos },
    Call { func: Box<Expr>, args: Vec<Expr>, pos: Pos },
    /// `recv.name(args)` — only distinguished from a plain field access at
    /// sema time, once the receiver's type is known.
    Field { base: Box<Expr>, name: String, pos: Pos },
    AddrOf { expr: Box<Expr>, pos: Pos },
    Deref { expr: Box<Expr>, pos: Pos },
}

impl Expr {
    #[must_use]
    pub fn pos(&self) -> &Pos {
        match self {
            Self::Ident(_, p)
            | Self::IntLit(_, p)
            | Self::ByteLit(_, p)
            | Self::BoolLit(_, p)
            | Self::Unary { pos: p, .. }
            | Self::Binary { pos: p, .. }
            | Self::Index { pos: p, .. }
            | Self::Slice { pos: p, .. }
            | Self::Call { pos: p, .. }
            | Self::Field { pos: p, .. }
            | Self::AddrOf { pos: p, .. }
            | Self::Deref { pos: p, .. } => p,
        }
    }
}
