use std::collections::HashMap;

use crate::function::Function;

/// Whether a declared symbol names a function or a variable (`link/pkg.go`
/// `Symbol.Type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Func,
    Var,
}

/// A package-level global variable. `init` is `None` for a zero-initialized
/// global (emitted as a `Zeros` section by the linker) and `Some` for one
/// with a compile-time-known initial value (emitted as `Data`).
#[derive(Debug, Clone)]
pub struct GlobalVar {
    pub name: String,
    pub size: i32,
    pub init: Option<Vec<u8>>,
}

/// The compiling object of a package (`link.Pkg` in the original): every
/// symbol it declares, plus the definitions (functions, variables) filled
/// in once lowering completes. A symbol must be declared before it is
/// defined — the two-pass shape spec.md §9 calls out so mutually-recursive
/// functions resolve without a forward-declaration pass.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub name: String,
    symbols: HashMap<String, SymbolKind>,
    funcs: HashMap<String, Function>,
    vars: HashMap<String, GlobalVar>,
    /// Declaration order, for deterministic layout by the linker.
    order: Vec<String>,
}

impl Package {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn declare(&mut self, name: &str, kind: SymbolKind) {
        assert!(!name.is_empty(), "empty symbol name");
        assert!(
            self.symbols.insert(name.to_string(), kind).is_none(),
            "symbol {name} redeclared in package {}",
            self.name
        );
        self.order.push(name.to_string());
    }

    pub fn declare_func(&mut self, name: &str) {
        self.declare(name, SymbolKind::Func);
    }

    pub fn declare_var(&mut self, name: &str) {
        self.declare(name, SymbolKind::Var);
    }

    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<SymbolKind> {
        self.symbols.get(name).copied()
    }

    #[must_use]
    pub fn has_func(&self, name: &str) -> bool {
        matches!(self.symbol(name), Some(SymbolKind::Func))
    }

    pub fn define_func(&mut self, name: &str, f: Function) {
        assert_eq!(
            self.symbol(name),
            Some(SymbolKind::Func),
            "{name} is not a declared function in {}",
            self.name
        );
        self.funcs.insert(name.to_string(), f);
    }

    pub fn define_var(&mut self, name: &str, v: GlobalVar) {
        assert_eq!(
            self.symbol(name),
            Some(SymbolKind::Var),
            "{name} is not a declared variable in {}",
            self.name
        );
        self.vars.insert(name.to_string(), v);
    }

    #[must_use]
    pub fn func(&self, name: &str) -> Option<&Function> {
        self.funcs.get(name)
    }

    pub fn func_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.funcs.get_mut(name)
    }

    #[must_use]
    pub fn var(&self, name: &str) -> Option<&GlobalVar> {
        self.vars.get(name)
    }

    /// Every function this package defines, in declaration order.
    pub fn funcs_in_order(&self) -> impl Iterator<Item = &Function> {
        self.order
            .iter()
            .filter_map(|name| self.funcs.get(name))
    }

    /// Every variable this package defines, in declaration order.
    pub fn vars_in_order(&self) -> impl Iterator<Item = &GlobalVar> {
        self.order.iter().filter_map(|name| self.vars.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use vmkit_tast::types::FuncType;

    #[test]
    #[should_panic(expected = "redeclared")]
    fn redeclaring_a_symbol_panics() {
        let mut p = Package::new("main");
        p.declare_func("f");
        p.declare_func("f");
    }

    #[test]
    fn declare_then_define_round_trips() {
        let mut p = Package::new("main");
        p.declare_func("f");
        p.define_func("f", Function::new("f", Rc::new(FuncType::new(vec![], vec![]))));
        assert!(p.has_func("f"));
        assert!(p.func("f").is_some());
    }
}
