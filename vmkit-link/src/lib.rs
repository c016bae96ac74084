//! Turns a compiled [`vmkit_ir::Program`] into the section stream
//! `vmkit-image` can write and `vmkit-machine` can load: final addresses for
//! every function and global (`layout`), every deferred fixup patched in
//! (`fixup`), and the image's `Code`/`Data`/`Zeros`/`Debug` sections emitted
//! (`image`) — the three-step pipeline spec.md §4.7 describes, grounded on
//! the original `link/pkg.go`'s declare/define symbol table and the
//! structured resolve-then-patch shape of the workspace's own ELF loader.

mod error;
mod fixup;
mod image;
mod layout;

pub use error::{LinkError, Result};
pub use layout::CODE_BASE;

/// Name of the package-level trampoline the linker records as the initial
/// PC for a normal run. Mirrors `vmkit_codegen::START_FUNC` — duplicated as
/// a string constant rather than a dependency so this crate only needs to
/// agree on the name, not link against the crate that builds the function.
pub const START_FUNC: &str = "<start>";
/// Entry point used instead of [`START_FUNC`] when linking a package to run
/// its tests rather than its `main`.
pub const TEST_START_FUNC: &str = "<teststart>";

/// Which package's trampoline becomes the program's entry point, and
/// whether that means its `main` or its test list (spec.md §6 `-ntest`).
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub entry_pkg: String,
    pub run_tests: bool,
}

impl LinkOptions {
    #[must_use]
    pub fn new(entry_pkg: impl Into<String>, run_tests: bool) -> Self {
        Self {
            entry_pkg: entry_pkg.into(),
            run_tests,
        }
    }

    fn entry_func(&self) -> &'static str {
        if self.run_tests {
            TEST_START_FUNC
        } else {
            START_FUNC
        }
    }
}

/// Links a whole program into an ordered list of image sections.
///
/// # Errors
/// Any [`LinkError`]: an undeclared entry package or function, an
/// unresolved symbol reference, a fixup whose instruction shape doesn't
/// match its kind, a branch displacement that overflows the ISA's 26-bit
/// signed field, or a local intra-function jump overflow surfaced while
/// finalizing a function's blocks (spec.md §4.7: "unresolved symbol,
/// duplicate symbol, or displacement overflow are link errors").
pub fn link(program: &vmkit_ir::Program, options: &LinkOptions) -> Result<Vec<vmkit_core::Section>> {
    log::debug!(
        "linking program: entry package {:?}, {}",
        options.entry_pkg,
        if options.run_tests { "running tests" } else { "running main" }
    );

    let mut laid_out = layout::build(program, &options.entry_pkg, options.entry_func())?;
    fixup::patch(&mut laid_out.funcs, &laid_out.func_addr, &laid_out.var_addr)?;
    let sections = image::build_sections(&laid_out);

    log::info!(
        "linked {} function(s) into {} byte(s) of code, entry at {:#06x}",
        laid_out.funcs.len(),
        laid_out.code_len,
        CODE_BASE
    );
    Ok(sections)
}
