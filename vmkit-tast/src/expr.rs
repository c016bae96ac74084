use crate::types::Type;

/// Binary operators the front end can produce (arithmetic, bitwise,
/// comparison). Codegen maps these directly onto ISA register-arithmetic
/// or branch opcodes.
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

/// A typed expression node. Every variant carries the type the semantic
/// pass inferred for it; the code generator only reads it, matching
/// spec.md §3 "the code generator only reads [typed AST]; it never
/// mutates typed AST."
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A reference to a declared symbol (local, global, function, or
    /// const) by name.
    Ident { name: String, ty: Type },
    IntLit { value: i64, ty: Type },
    ByteLit { value: u8, ty: Type },
    BoolLit(bool),
    Unary {
        op: UnOp,
        expr: Box<Expr>,
        ty: Type,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: Type,
    },
    /// `array[index]` (no colon) or `array[index:index_end]` (slicing);
    /// `has_colon` distinguishes the two per the original `tast.IndexExpr`.
    Index {
        array: Box<Expr>,
        index: Option<Box<Expr>>,
        index_end: Option<Box<Expr>>,
        has_colon: bool,
        ty: Type,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        ty: Type,
    },
    /// A method call with an explicit receiver: `recv.name(args)`, where
    /// `recv`'s address is passed as the implicit bond argument.
    MethodCall {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        ty: Type,
    },
    Field {
        base: Box<Expr>,
        name: String,
        ty: Type,
    },
    AddrOf { expr: Box<Expr>, ty: Type },
    Deref { expr: Box<Expr>, ty: Type },
}

impl Expr {
    #[must_use]
    pub fn ty(&self) -> &Type {
        match self {
            Self::Ident { ty, .. }
            | Self::IntLit { ty, .. }
            | Self::ByteLit { ty, .. }
            | Self::Unary { ty, .. }
            | Self::Binary { ty, .. }
            | Self::Index { ty, .. }
            | Self::Call { ty, .. }
            | Self::MethodCall { ty, .. }
            | Self::Field { ty, .. }
            | Self::AddrOf { ty, .. }
            | Self::Deref { ty, .. } => ty,
            Self::BoolLit(_) => &Type::Bool,
        }
    }
}
