use crate::expr::Expr;
use crate::types::Type;

/// A local variable declaration (`var a [4]int`, `x := 1+2`).
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    pub init: Option<Expr>,
}

/// A statement in a function body. `For`/`If` carry fully-typed
/// sub-statements rather than raw AST, matching spec.md §4.6's
/// description of the lowering each produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl(VarDecl),
    /// `lhs = rhs`. `lhs` is restricted by the front end to an
    /// addressable expression (`Ident`, `Index`, `Field`, `Deref`).
    Assign { lhs: Expr, rhs: Expr },
    ExprStmt(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// `for init; cond; iter { body }`. Any of `init`/`cond`/`iter` may be
    /// absent (`for { }` is an infinite loop, `cond` defaulting to true).
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        iter: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
}
