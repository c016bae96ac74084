//! Lowers a type-checked package (`vmkit_tast::decl::Pkg`) into the
//! `vmkit_ir` model the linker consumes: one IR function per source
//! function or method, the `init`/`start`/test-list trampolines, and the
//! hand-assembled `rt` runtime helper package every program links against
//! (spec.md §4.6).
//!
//! The calling convention, register discipline and control-flow lowering
//! are ported from the original's `pl/codegen/reg_swap.go`, `pl/index.go`,
//! `glang/codegen/zero.go` and `g8/codegen/copy.go`; package-level build
//! order follows `glang/pkg.go`'s `buildPkg` (see [`pkg::build_program`]).

mod builder;
mod builtins;
mod config;
mod error;
mod frame;
mod index;
mod lower;
mod pkg;
mod refs;

pub use builder::{Declarations, FuncBuilder};
pub use builtins::{build_runtime_package, PANIC_EXIT_CODE, RT_PKG};
pub use config::{CodegenConfig, DEFAULT_TEST_SHUFFLE_SEED};
pub use error::{CodegenError, Result, MAX_TESTS};
pub use pkg::{build_program, INIT_FUNC, START_FUNC, TEST_START_FUNC};
