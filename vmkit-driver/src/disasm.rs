//! Image disassembly for `-d`, grounded on the original `dasm.DumpImage`:
//! walk the `Code` sections word by word, decoding each one, and label the
//! start of every function using the `Debug` sections `vmkit-link` emits
//! (spec.md §6 "exceptions are printed with a stack trace derived from the
//! image's Debug sections" — the same sections double as disassembly
//! labels here).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use vmkit_core::Section;
use vmkit_isa::Instruction;

fn debug_labels(sections: &[Section]) -> BTreeMap<u32, String> {
    let mut labels = BTreeMap::new();
    for section in sections {
        if let Section::Debug { addr, bytes } = section {
            labels.insert(*addr, String::from_utf8_lossy(bytes).into_owned());
        }
    }
    labels
}

#[must_use]
pub fn disassemble(sections: &[Section]) -> String {
    let labels = debug_labels(sections);
    let mut out = String::new();

    for section in sections {
        let (base, bytes) = match section {
            Section::Code { addr, bytes } => (*addr, bytes),
            _ => continue,
        };
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            let addr = base + (i as u32) * 4;
            if let Some(label) = labels.get(&addr) {
                let _ = writeln!(out, "{label}:");
            }
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            match Instruction::decode(word) {
                Ok(instr) => {
                    let _ = writeln!(out, "  {addr:#010x}:  {instr}");
                }
                Err(e) => {
                    let _ = writeln!(out, "  {addr:#010x}:  <{e}>");
                }
            }
        }
    }
    out
}

/// Finds the innermost function (by highest label address not after `pc`)
/// an address falls in, for stack-trace annotation.
#[must_use]
pub fn symbolicate(sections: &[Section], pc: u32) -> Option<String> {
    let labels = debug_labels(sections);
    labels.range(..=pc).next_back().map(|(_, name)| name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disassembles_a_two_instruction_code_section_with_a_label() {
        let sections = vec![
            Section::Code {
                addr: 0x1000,
                bytes: [
                    Instruction::Ori { rt: 1, rs1: 0, imm: 7 }.encode(),
                    Instruction::Halt.encode(),
                ]
                .iter()
                .flat_map(|w| w.to_le_bytes())
                .collect(),
            },
            Section::Debug {
                addr: 0x1000,
                bytes: b"main.<start>".to_vec(),
            },
        ];
        let text = disassemble(&sections);
        assert!(text.contains("main.<start>:"));
        assert!(text.contains("ori r1, r0, 0x0007"));
        assert!(text.contains("halt"));
    }

    #[test]
    fn symbolicate_finds_the_enclosing_function() {
        let sections = vec![
            Section::Debug {
                addr: 0x1000,
                bytes: b"main.f".to_vec(),
            },
            Section::Debug {
                addr: 0x1020,
                bytes: b"main.g".to_vec(),
            },
        ];
        assert_eq!(symbolicate(&sections, 0x1010), Some("main.f".to_string()));
        assert_eq!(symbolicate(&sections, 0x1020), Some("main.g".to_string()));
        assert_eq!(symbolicate(&sections, 0x0fff), None);
    }
}
