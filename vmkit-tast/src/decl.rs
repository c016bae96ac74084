use crate::stmt::Stmt;
use crate::types::{Arg, FuncType, StructType, Type};
use std::rc::Rc;

/// A package-level constant (spec.md §3 "declarations (consts...)").
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub ty: Type,
    pub value: i64,
}

/// A package-level variable, optionally zero-initialized.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVarDecl {
    pub name: String,
    pub ty: Type,
}

/// A function or method definition (`tast.Func` in the original). Whether
/// this is a method is recorded on `sig.is_bond`; `receiver` names the
/// parameter the implicit pointer binds to when it is.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub sig: Rc<FuncType>,
    /// Names of `sig.args`, in order (including the receiver, if `is_bond`).
    pub arg_names: Vec<String>,
    pub body: Vec<Stmt>,
    /// Test functions (per the build's naming convention, see
    /// `Package::is_test_name`) are collected into the package's shuffled
    /// test list instead of being callable directly.
    pub is_test: bool,
}

impl FuncDecl {
    #[must_use]
    pub fn is_method(&self) -> bool {
        self.sig.is_bond
    }

    /// The struct type a method is declared on, if this is one.
    #[must_use]
    pub fn receiver_struct(&self) -> Option<Rc<StructType>> {
        if !self.is_method() {
            return None;
        }
        match &self.sig.args.first()?.ty {
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Struct(s) => Some(s.clone()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A function alias (`func g = pkg.f`): a declared symbol whose body
/// lives in another, already-defined, function.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncAliasDecl {
    pub name: String,
    pub sig: Rc<FuncType>,
    pub of_pkg: String,
    pub of_name: String,
}

/// Top-level declaration union, for error reporting and diagnostics that
/// need to name "the thing that failed" generically.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Const(ConstDecl),
    Var(GlobalVarDecl),
    Struct(Rc<StructType>),
    Func(FuncDecl),
    FuncAlias(FuncAliasDecl),
}

/// A fully type-checked package (`tast.Pkg` in the original): the
/// complete set of declarations the code generator lowers, grouped by
/// kind exactly as the original groups them.
#[derive(Debug, Clone, Default)]
pub struct Pkg {
    pub name: String,
    pub consts: Vec<ConstDecl>,
    pub structs: Vec<Rc<StructType>>,
    pub vars: Vec<GlobalVarDecl>,
    pub func_aliases: Vec<FuncAliasDecl>,
    pub funcs: Vec<FuncDecl>,
    pub methods: Vec<FuncDecl>,
}

impl Pkg {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// All functions and methods together — the set the code generator
    /// assigns IR functions to, in this order (functions, then methods),
    /// matching `buildFuncs(b, res.Funcs); buildFuncs(b, res.Methods)` in
    /// the original `glang/pkg.go`.
    #[must_use]
    pub fn all_funcs(&self) -> impl Iterator<Item = &FuncDecl> {
        self.funcs.iter().chain(self.methods.iter())
    }

    #[must_use]
    pub fn has_main(&self) -> bool {
        self.funcs.iter().any(|f| f.name == "main")
    }

    #[must_use]
    pub fn tests(&self) -> Vec<&FuncDecl> {
        self.funcs.iter().filter(|f| f.is_test).collect()
    }
}

#[must_use]
pub fn arg(name: impl Into<String>, ty: Type) -> Arg {
    Arg {
        name: name.into(),
        ty,
    }
}
