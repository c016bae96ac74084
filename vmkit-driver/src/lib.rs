//! Library half of the `vmkit` driver: everything `main` needs other than
//! process setup (argv parsing happens in `main` too, but the pipeline
//! itself lives here) so `tests/pipeline.rs` can drive a full
//! compile-link-run cycle without spawning the `vmkit` binary.

pub mod cli;
pub mod disasm;
pub mod irdump;
pub mod pipeline;
