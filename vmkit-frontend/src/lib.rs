//! Lexer, recursive-descent parser and a small two-pass semantic
//! analysis turning source text into the typed AST `vmkit-codegen`
//! consumes. A real but intentionally small front end: enough surface
//! to exercise every `vmkit-codegen`/`vmkit-ir` feature, not a general
//! systems-language compiler.

mod ast;
mod diag;
mod lexer;
mod parser;
mod pos;
mod sema;

pub use diag::Diagnostic;
pub use pos::Pos;

use std::rc::Rc;
use vmkit_tast::decl::{FuncDecl, Pkg};
use vmkit_tast::types::FuncType;

/// Wraps [`compile_program`] for callers that want `?` instead of
/// checking an empty-diagnostics list by hand.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{} diagnostic(s), first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Diagnostics(Vec<Diagnostic>),
}

/// Same as [`compile_program`] but fails the whole compilation on any
/// diagnostic, for callers that don't want to drive partial recovery
/// themselves.
pub fn compile_program_checked(sources: &[Source]) -> Result<Vec<Pkg>, CompileError> {
    let (pkgs, diags) = compile_program(sources);
    if diags.is_empty() {
        log::debug!("compiled {} package(s) cleanly", pkgs.len());
        Ok(pkgs)
    } else {
        log::warn!("compilation produced {} diagnostic(s)", diags.len());
        Err(CompileError::Diagnostics(diags))
    }
}

/// One source file as handed to [`compile_program`]: a name (used in
/// diagnostics) and its contents.
pub struct Source<'a> {
    pub file: String,
    pub text: &'a str,
}

impl<'a> Source<'a> {
    #[must_use]
    pub fn new(file: impl Into<String>, text: &'a str) -> Self {
        Self { file: file.into(), text }
    }
}

/// Parses and type-checks every source file together so cross-package
/// references resolve, returning one typed package per distinct
/// `package` name in first-seen order. Diagnostics from every stage
/// (lexical, syntactic, semantic) are merged; an empty diagnostic list
/// means the packages are safe to hand to `vmkit_codegen::build_program`.
#[must_use]
pub fn compile_program(sources: &[Source]) -> (Vec<Pkg>, Vec<Diagnostic>) {
    log::trace!("parsing {} source file(s)", sources.len());
    let mut diags = diag::Diagnostics::new();
    let mut files = Vec::with_capacity(sources.len());
    for src in sources {
        let (file, file_diags) = parser::parse_file(&src.file, src.text);
        diags.extend(file_diags);
        files.push((src.file.clone(), file));
    }
    let (pkgs, sema_diags) = sema::check_program(files);
    diags.extend(sema_diags);
    (pkgs, diags.into_vec())
}

/// Compiles a single bare function body (`-bare` CLI mode, spec.md §9):
/// the whole input is the statement list a `func main() { ... }` would
/// contain, with no `package`/`func` wrapper in the source text. Wraps it
/// in a synthetic one-function package named `main` so the rest of the
/// pipeline (linking, running) doesn't need a separate code path.
#[must_use]
pub fn compile_bare_func(file: &str, src: &str) -> (Pkg, Vec<Diagnostic>) {
    let (body, parse_diags) = parser::parse_bare_func(file, src);
    let mut diags = diag::Diagnostics::new();
    diags.extend(parse_diags);

    let ast_file = ast::File {
        pkg_name: "main".to_string(),
        decls: vec![ast::Decl::Func(ast::FuncDecl {
            name: "main".to_string(),
            receiver: None,
            params: Vec::new(),
            ret: None,
            body,
            is_test: false,
            pos: pos::Pos::new(file.to_string(), 1, 1),
        })],
    };
    let (mut pkgs, sema_diags) = sema::check_program(vec![(file.to_string(), ast_file)]);
    diags.extend(sema_diags);
    let pkg = pkgs.pop().unwrap_or_else(|| Pkg::new("main"));
    (pkg, diags.into_vec())
}

/// `main`'s signature as the front end always declares it: no
/// parameters, no return value.
#[must_use]
pub fn main_sig() -> Rc<FuncType> {
    Rc::new(FuncType::new(Vec::new(), Vec::new()))
}

#[must_use]
pub fn has_main(pkg: &Pkg) -> bool {
    pkg.has_main()
}

#[must_use]
pub fn find_main(pkg: &Pkg) -> Option<&FuncDecl> {
    pkg.funcs.iter().find(|f| f.name == "main")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_index_store_then_exit_compiles_clean() {
        let src = "package main\n\nfunc main() {\n\tvar a [4]int\n\ta[2] = 42\n\texit(a[2])\n}\n";
        let (pkgs, diags) = compile_program(&[Source::new("main.vk", src)]);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(pkgs.len(), 1);
        assert!(pkgs[0].has_main());
    }

    #[test]
    fn undeclared_name_is_reported_but_does_not_abort_the_pass() {
        let src = "package main\n\nfunc main() {\n\texit(missing)\n}\n";
        let (_pkgs, diags) = compile_program(&[Source::new("main.vk", src)]);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn two_packages_resolve_a_cross_package_call() {
        let a = "package a\n\nfunc f() int {\n\treturn 7\n}\n";
        let b = "package b\n\nfunc main() {\n\texit(a.f())\n}\n";
        let (pkgs, diags) = compile_program(&[Source::new("a.vk", a), Source::new("b.vk", b)]);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(pkgs.len(), 2);
    }

    #[test]
    fn method_call_resolves_to_the_struct_colon_method_name() {
        let src = concat!(
            "package main\n\n",
            "struct Point {\n\tx int\n\ty int\n}\n\n",
            "func (p *Point) sum() int {\n\treturn p.x + p.y\n}\n\n",
            "func main() {\n\tvar pt Point\n\texit(pt.sum())\n}\n",
        );
        let (pkgs, diags) = compile_program(&[Source::new("main.vk", src)]);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(pkgs[0].methods.len(), 1);
        assert_eq!(pkgs[0].methods[0].name, "Point:sum");
    }

    #[test]
    fn bare_func_mode_wraps_the_body_in_a_synthetic_main() {
        let (pkg, diags) = compile_bare_func("bare.vk", "exit(1)\n");
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert!(pkg.has_main());
    }
}
