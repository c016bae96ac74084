//! `Program`/`Package`/`Function`/`Block`/`Instruction`/`Ref` IR model
//! (spec.md §4.5) that `vmkit-codegen` lowers typed AST into and
//! `vmkit-link` consumes to produce an image.
//!
//! Unlike a classic three-address IR, a [`Function`]'s [`Block`]s already
//! hold real [`vmkit_isa::Instruction`]s: the code generator emits machine
//! code directly as it walks typed AST (matching the original's
//! `codegen.Block.inst(asm.xxx)` shape), using a handful of scratch
//! registers and the [`reference::Ref`] abstraction to decide what to
//! emit. What remains genuinely deferred to link time is exactly the
//! cross-symbol address a [`block::SymbolRef`] names — local control flow
//! is resolved once a function's blocks are ordered, by
//! [`Function::finalize`].

mod block;
mod function;
mod package;
mod program;
mod reference;

pub use block::{Block, BlockId, IrInstr, SymbolRef, Terminator};
pub use function::{FinalizeError, FinalizedFunc, Function};
pub use package::{GlobalVar, Package, SymbolKind};
pub use program::Program;
pub use reference::{
    can_be_zero, AddrRef, ByteLit, FuncDefRef, FuncSym, HeapSym, Ref, VarRef,
};
