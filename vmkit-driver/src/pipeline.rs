//! Orchestrates one CLI invocation: read, compile, lower, (optionally) run
//! a package's tests, link, run. Exposed as a function rather than folded
//! into `main` so `tests/pipeline.rs` can exercise it directly without
//! spawning a process, mirroring the original's `CompileAndTestSingle`
//! (compile *and* execute a package's tests in one step, failing the whole
//! invocation if they don't pass) followed by a separate `runImage` of the
//! resulting program.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use rand::RngCore;

use vmkit_codegen::CodegenConfig;
use vmkit_core::{reg, Exception};
use vmkit_frontend::Source;
use vmkit_link::LinkOptions;
use vmkit_machine::{Machine, MachineConfig};

use crate::{disasm, irdump};

pub struct RunOutcome {
    /// Process exit code `main` should return.
    pub exit_code: i32,
}

pub fn run_pipeline(args: &crate::cli::Args) -> Result<RunOutcome> {
    if args.golike {
        log::debug!("-golike accepted for compatibility; the front end has only one grammar");
    }

    let path: &Path = args.input.as_path();
    let src = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path.display().to_string();

    let pkgs = if args.bare {
        let (pkg, diags) = vmkit_frontend::compile_bare_func(&file_name, &src);
        if !diags.is_empty() {
            report_diagnostics(&diags);
            return Ok(RunOutcome { exit_code: 1 });
        }
        vec![pkg]
    } else {
        let (pkgs, diags) = vmkit_frontend::compile_program(&[Source::new(file_name.as_str(), &src)]);
        if !diags.is_empty() {
            report_diagnostics(&diags);
            return Ok(RunOutcome { exit_code: 1 });
        }
        pkgs
    };

    let entry_pkg = pkgs
        .iter()
        .find(|p| p.has_main())
        .or_else(|| pkgs.last())
        .map(|p| p.name.clone())
        .context("no package to compile")?;
    let entry_tests = pkgs
        .iter()
        .find(|p| p.name == entry_pkg)
        .map(|p| p.tests().len())
        .unwrap_or(0);

    let seed = args.seed.unwrap_or_else(|| {
        let drawn = OsRng.next_u64();
        log::info!("test shuffle seed: {drawn:#018x} (pass --seed {drawn} to replay this run)");
        drawn
    });
    let config = CodegenConfig {
        test_shuffle_seed: Some(seed),
    };

    let program = vmkit_codegen::build_program(&pkgs, &config)
        .with_context(|| "lowering to IR")?;

    if args.ir {
        println!("{}", irdump::dump(&program));
    }

    if entry_tests > 0 {
        log::info!("running {entry_tests} test(s) in package {entry_pkg:?}");
        let test_sections = vmkit_link::link(&program, &LinkOptions::new(entry_pkg.as_str(), true))
            .with_context(|| "linking test image")?;
        if args.dasm {
            print!("{}", disasm::disassemble(&test_sections));
        }
        let mut test_machine = Machine::new(MachineConfig::default());
        test_machine
            .load_sections(&test_sections)
            .with_context(|| "loading test image")?;
        let (ncycle, exc) = test_machine.run(args.ncycle_test);
        match exc {
            Some(Exception::Halt { .. }) if test_machine.core(0).reg(reg::RET) == 0 => {
                log::info!("tests passed ({ncycle} cycle(s))");
            }
            Some(Exception::Halt { .. }) => {
                eprintln!(
                    "tests FAILED: halted with exit code {} ({ncycle} cycle(s))",
                    test_machine.core(0).reg(reg::RET)
                );
                return Ok(RunOutcome { exit_code: 1 });
            }
            Some(other) => {
                eprintln!("tests FAILED: {other}");
                print_stack_trace(&test_sections, test_machine.core(0).reg(reg::PC));
                return Ok(RunOutcome { exit_code: 1 });
            }
            None => {
                eprintln!("tests FAILED: did not finish within {} cycle(s)", args.ncycle_test);
                return Ok(RunOutcome { exit_code: 1 });
            }
        }
    }

    let sections = vmkit_link::link(&program, &LinkOptions::new(entry_pkg.as_str(), false))
        .with_context(|| "linking program image")?;

    if args.dasm {
        print!("{}", disasm::disassemble(&sections));
    }

    if sections.iter().all(vmkit_core::Section::is_empty) {
        println!("(the image is empty)");
        return Ok(RunOutcome { exit_code: 0 });
    }

    let mut machine = Machine::new(MachineConfig::default());
    machine
        .load_sections(&sections)
        .with_context(|| "loading program image")?;

    let (ncycle, exc) = machine.run(args.ncycle);
    println!("({ncycle} cycles)");
    match exc {
        Some(Exception::Halt { .. }) => {
            let status = machine.core(0).reg(reg::RET);
            Ok(RunOutcome {
                exit_code: status as i32,
            })
        }
        Some(other) => {
            println!("{other}");
            print_stack_trace(&sections, machine.core(0).reg(reg::PC));
            Ok(RunOutcome { exit_code: 1 })
        }
        None => {
            println!("(end of time)");
            Ok(RunOutcome { exit_code: 0 })
        }
    }
}

fn report_diagnostics(diags: &[vmkit_frontend::Diagnostic]) {
    for d in diags {
        eprintln!("{d}");
    }
}

/// Prints the faulting frame, symbolicated from the image's `Debug`
/// sections (spec.md §6: a stack trace "derived from the image's Debug
/// sections"). `pc` is the core's program counter after the fault, which
/// the CPU has already rolled back to the faulting instruction's address
/// (spec.md §4.3).
fn print_stack_trace(sections: &[vmkit_core::Section], pc: u32) {
    if let Some(name) = disasm::symbolicate(sections, pc) {
        eprintln!("  at {name} ({pc:#010x})");
    } else {
        eprintln!("  at {pc:#010x} (no debug info)");
    }
}
