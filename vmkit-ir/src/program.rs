use std::collections::HashMap;

use crate::package::Package;

/// The whole compiling program: every package the linker will lay out
/// together into one image (spec.md §4.5). Populated in topological
/// dependency order and read-only once lowering finishes (spec.md §5).
#[derive(Debug, Clone, Default)]
pub struct Program {
    packages: HashMap<String, Package>,
    order: Vec<String>,
}

impl Program {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_package(&mut self, pkg: Package) {
        let name = pkg.name.clone();
        assert!(
            !self.packages.contains_key(&name),
            "package {name} added twice"
        );
        self.order.push(name.clone());
        self.packages.insert(name, pkg);
    }

    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn packages_in_order(&self) -> impl Iterator<Item = &Package> {
        self.order.iter().filter_map(|name| self.packages.get(name))
    }
}
