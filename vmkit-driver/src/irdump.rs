//! Textual IR dump for `--ir`, in the spirit of the original's
//! `printIRLog` (there, a pre-rendered byte buffer produced during
//! compilation; here, rendered on demand from the already-built
//! [`vmkit_ir::Program`] since nothing in this workspace buffers one
//! during lowering).

use std::fmt::Write as _;

use vmkit_ir::{Program, Terminator};

#[must_use]
pub fn dump(program: &Program) -> String {
    let mut out = String::new();
    for pkg in program.packages_in_order() {
        let _ = writeln!(out, "package {}", pkg.name);
        for var in pkg.vars_in_order() {
            let _ = writeln!(out, "  var {} size={}", var.name, var.size);
        }
        for func in pkg.funcs_in_order() {
            let _ = writeln!(out, "  func {}", func.name);
            for (i, block) in func.blocks.iter().enumerate() {
                let _ = writeln!(out, "    block{i}:");
                for instr in &block.instrs {
                    match &instr.sym {
                        Some(sym) => {
                            let _ = writeln!(
                                out,
                                "      {}  ; fixup {:?} -> {}.{}",
                                instr.instr, sym.kind, sym.pkg, sym.name
                            );
                        }
                        None => {
                            let _ = writeln!(out, "      {}", instr.instr);
                        }
                    }
                }
                match block.term {
                    None => {}
                    Some(Terminator::Fallthrough) => {
                        let _ = writeln!(out, "      ; falls through");
                    }
                    Some(Terminator::Jump(target)) => {
                        let _ = writeln!(out, "      ; jump -> block{}", target.0);
                    }
                    Some(Terminator::Branch { cond_reg, target }) => {
                        let _ = writeln!(
                            out,
                            "      ; branch {} -> block{}",
                            vmkit_core::reg::name(cond_reg),
                            target.0
                        );
                    }
                }
            }
        }
    }
    out
}
