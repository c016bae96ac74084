//! `vmkit` CLI: compiles, links, loads and runs a vmkit program
//! (spec.md §6). Wiring style grounded on
//! `mathisbot-beskar-os/kernel/src/main.rs` (`kmain` as a thin driver over
//! library-level orchestration) and `bootimage-builder`'s `clap` +
//! `anyhow` host-tool combination; flags themselves come from the
//! original `cmd/g8/main.go`. The pipeline itself lives in `vmkit_driver`'s
//! library target so integration tests can drive it without spawning this
//! binary.

mod logging;

use clap::Parser;
use vmkit_driver::{cli::Args, pipeline};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let outcome = pipeline::run_pipeline(&args)?;
    std::process::exit(outcome.exit_code);
}
