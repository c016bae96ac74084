//! Section emission: turns a patched [`crate::layout::Layout`] into the
//! stream of image sections `vmkit-image` writes to disk (spec.md §4.7 step
//! 3). One `Code` section carries every function's encoded words back to
//! back; a `Debug` section per function records its `pkg.name` for the
//! driver's stack-trace annotation (spec.md §6 "exceptions are printed with
//! a stack trace derived from the image's Debug sections" — the exact
//! record format is this crate's call, since neither spec.md nor the
//! original package carries one forward; see DESIGN.md).

use vmkit_core::Section;

use crate::layout::{Layout, CODE_BASE};

pub(crate) fn build_sections(layout: &Layout) -> Vec<Section> {
    let mut code_bytes = Vec::with_capacity(layout.code_len as usize);
    let mut debug_sections = Vec::with_capacity(layout.funcs.len());

    for f in &layout.funcs {
        for instr in &f.code {
            code_bytes.extend_from_slice(&instr.instr.encode().to_le_bytes());
        }
        debug_sections.push(Section::Debug {
            addr: f.addr,
            bytes: format!("{}.{}", f.pkg, f.name).into_bytes(),
        });
    }

    let mut sections = vec![Section::Code {
        addr: CODE_BASE,
        bytes: code_bytes,
    }];

    if !layout.data_bytes.is_empty() {
        sections.push(Section::Data {
            addr: layout.data_base,
            bytes: layout.data_bytes.clone(),
        });
    }
    if layout.zeros_len > 0 {
        sections.push(Section::Zeros {
            addr: layout.zeros_base,
            len: layout.zeros_len,
        });
    }

    sections.extend(debug_sections);
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;
    use std::rc::Rc;
    use vmkit_ir::{Function, Program};
    use vmkit_tast::types::FuncType;

    #[test]
    fn code_section_is_first_and_starts_at_code_base() {
        let mut program = Program::new();
        let mut pkg = vmkit_ir::Package::new("main");
        pkg.declare_func("<start>");
        pkg.define_func(
            "<start>",
            Function::new("<start>", Rc::new(FuncType::new(vec![], vec![]))),
        );
        program.add_package(pkg);

        let layout = layout::build(&program, "main", "<start>").unwrap();
        let sections = build_sections(&layout);
        match &sections[0] {
            Section::Code { addr, .. } => assert_eq!(*addr, CODE_BASE),
            other => panic!("expected Code first, got {other:?}"),
        }
    }
}
