//! Address assignment: walks a [`Program`] once to give every function and
//! global variable a final load address, laying code ahead of data ahead of
//! bss (spec.md §4.7 step 1).
//!
//! Functions are visited entry-package-first so the chosen entry point's own
//! code lands at [`CODE_BASE`] — `vmkit-machine`'s loader sets every core's
//! initial PC to the address of the image's first `Code` section, so the
//! function placed first in that section's bytes is the one that runs on
//! boot (see `Machine::load_sections`, not a dependency of this crate but
//! the convention this layout exists to satisfy).

use std::collections::HashMap;

use vmkit_ir::{Function, IrInstr, Package, Program};

use crate::error::{LinkError, Result};

/// Address the first function's code is placed at. Must match
/// `vmkit_machine::cpu::INIT_PC`; duplicated here rather than taken as a
/// dependency so this crate stays free of the runtime it feeds.
pub const CODE_BASE: u32 = 0x1000;

const ALIGN: u32 = 4;

fn align_up(v: u32, align: u32) -> u32 {
    (v + align - 1) & !(align - 1)
}

/// One function, finalized and placed at its final address, still carrying
/// the symbol-tagged instructions [`crate::fixup::patch`] has yet to fill
/// in.
pub(crate) struct LaidOutFunc {
    pub(crate) pkg: String,
    pub(crate) name: String,
    pub(crate) addr: u32,
    pub(crate) code: Vec<IrInstr>,
}

pub(crate) struct Layout {
    pub(crate) funcs: Vec<LaidOutFunc>,
    pub(crate) func_addr: HashMap<(String, String), u32>,
    pub(crate) var_addr: HashMap<(String, String), u32>,
    pub(crate) code_len: u32,
    pub(crate) data_bytes: Vec<u8>,
    pub(crate) data_base: u32,
    pub(crate) zeros_base: u32,
    pub(crate) zeros_len: u32,
}

pub(crate) fn build(program: &Program, entry_pkg: &str, entry_func: &str) -> Result<Layout> {
    let order = ordered_funcs(program, entry_pkg, entry_func)?;

    let mut funcs = Vec::with_capacity(order.len());
    let mut func_addr = HashMap::with_capacity(order.len());
    let mut cursor = CODE_BASE;
    for (pkg, f) in order {
        let finalized = f.finalize()?;
        let word_len = finalized.code.len() as u32;
        func_addr.insert((pkg.name.clone(), f.name.clone()), cursor);
        funcs.push(LaidOutFunc {
            pkg: pkg.name.clone(),
            name: f.name.clone(),
            addr: cursor,
            code: finalized.code,
        });
        cursor += word_len * 4;
    }
    let code_len = cursor - CODE_BASE;

    let (var_addr, data_bytes, data_base, zeros_base, zeros_len) = layout_vars(program, cursor);

    Ok(Layout {
        funcs,
        func_addr,
        var_addr,
        code_len,
        data_bytes,
        data_base,
        zeros_base,
        zeros_len,
    })
}

/// Every function in the program, in emission order: the entry package's
/// entry function first, then the rest of that package's own functions,
/// then every other package (the always-present `rt` helper package among
/// them) in the order [`Program::add_package`] received them.
fn ordered_funcs<'a>(
    program: &'a Program,
    entry_pkg: &str,
    entry_func: &str,
) -> Result<Vec<(&'a Package, &'a Function)>> {
    let entry_package = program
        .package(entry_pkg)
        .ok_or_else(|| LinkError::UnknownEntryPackage(entry_pkg.to_string()))?;
    let entry = entry_package
        .func(entry_func)
        .ok_or_else(|| LinkError::MissingEntryFunction {
            pkg: entry_pkg.to_string(),
            func: entry_func.to_string(),
        })?;

    let mut order = vec![(entry_package, entry)];
    for f in entry_package.funcs_in_order() {
        if f.name != entry_func {
            order.push((entry_package, f));
        }
    }
    for pkg in program.packages_in_order() {
        if pkg.name == entry_pkg {
            continue;
        }
        for f in pkg.funcs_in_order() {
            order.push((pkg, f));
        }
    }
    Ok(order)
}

/// Lays out every global variable after the code: variables with a
/// compile-time initializer form one contiguous `Data` blob, zero-init
/// variables one contiguous `Zeros` run (spec.md §4.7 step 3's `Data`/
/// `Zeros` split). Every `vmkit-codegen`-built program declares its globals
/// with no initializer today, so in practice this always produces an empty
/// `Data` blob and one `Zeros` run — the `Data` path stays in place for a
/// front end that someday compiles a global with a constant initializer.
fn layout_vars(
    program: &Program,
    code_end: u32,
) -> (HashMap<(String, String), u32>, Vec<u8>, u32, u32, u32) {
    let mut var_addr = HashMap::new();
    let mut data_bytes = Vec::new();
    let data_base = align_up(code_end, ALIGN);

    for pkg in program.packages_in_order() {
        for v in pkg.vars_in_order() {
            if let Some(init) = &v.init {
                while data_bytes.len() as u32 % ALIGN != 0 {
                    data_bytes.push(0);
                }
                var_addr.insert((pkg.name.clone(), v.name.clone()), data_base + data_bytes.len() as u32);
                data_bytes.extend_from_slice(init);
            }
        }
    }

    let zeros_base = align_up(data_base + data_bytes.len() as u32, ALIGN);
    let mut zeros_len = 0u32;
    for pkg in program.packages_in_order() {
        for v in pkg.vars_in_order() {
            if v.init.is_none() {
                zeros_len = align_up(zeros_len, ALIGN);
                var_addr.insert((pkg.name.clone(), v.name.clone()), zeros_base + zeros_len);
                zeros_len += v.size.max(0) as u32;
            }
        }
    }

    (var_addr, data_bytes, data_base, zeros_base, zeros_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use vmkit_ir::Package as IrPackage;
    use vmkit_tast::types::FuncType;

    fn void_func(name: &str) -> Function {
        Function::new(name, Rc::new(FuncType::new(vec![], vec![])))
    }

    fn pkg_with(name: &str, func_names: &[&str]) -> IrPackage {
        let mut p = IrPackage::new(name);
        for n in func_names {
            p.declare_func(n);
            p.define_func(n, void_func(n));
        }
        p
    }

    #[test]
    fn entry_function_is_laid_out_first() {
        let mut program = Program::new();
        program.add_package(pkg_with("rt", &["memCopy"]));
        program.add_package(pkg_with("main", &["<start>", "main", "<init>"]));

        let layout = build(&program, "main", "<start>").unwrap();
        assert_eq!(layout.funcs[0].pkg, "main");
        assert_eq!(layout.funcs[0].name, "<start>");
        assert_eq!(layout.funcs[0].addr, CODE_BASE);
    }

    #[test]
    fn unknown_entry_package_is_reported() {
        let program = Program::new();
        let err = build(&program, "nope", "<start>").unwrap_err();
        assert!(matches!(err, LinkError::UnknownEntryPackage(_)));
    }

    #[test]
    fn missing_entry_function_is_reported() {
        let mut program = Program::new();
        program.add_package(pkg_with("main", &["main"]));
        let err = build(&program, "main", "<start>").unwrap_err();
        assert!(matches!(err, LinkError::MissingEntryFunction { .. }));
    }
}
