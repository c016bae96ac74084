//! Fixup resolution: walks every laid-out function's instructions and
//! patches the ones carrying a [`vmkit_ir::SymbolRef`] (spec.md §4.7 step
//! 2). Each kind targets a specific instruction shape the code generator is
//! trusted to have emitted consistently — [`refs::load_sym`] always pairs
//! `FillHigh` with an `addui` and `FillLow` with an `ori`,
//! [`pkg::emit_jal`]/`build_alias_thunk` always pair `FillLink` with a
//! `jal`/`j` — so a shape mismatch here means a code generator bug, not a
//! user-reachable condition, and is still reported rather than panicked on.

use std::collections::HashMap;

use vmkit_core::FixupKind;
use vmkit_isa::Instruction;

use crate::error::{LinkError, Result};
use crate::layout::LaidOutFunc;

pub(crate) fn patch(
    funcs: &mut [LaidOutFunc],
    func_addr: &HashMap<(String, String), u32>,
    var_addr: &HashMap<(String, String), u32>,
) -> Result<()> {
    for entry in funcs.iter_mut() {
        let base_word = entry.addr / 4;
        for (i, instr) in entry.code.iter_mut().enumerate() {
            let Some(sym) = instr.sym.clone() else {
                continue;
            };
            let key = (sym.pkg.clone(), sym.name.clone());
            let target = func_addr
                .get(&key)
                .or_else(|| var_addr.get(&key))
                .copied()
                .ok_or_else(|| LinkError::UnresolvedSymbol {
                    pkg: entry.pkg.clone(),
                    func: entry.name.clone(),
                    target_pkg: sym.pkg.clone(),
                    target_name: sym.name.clone(),
                })?;

            match sym.kind {
                FixupKind::FillHigh => {
                    let (high, _) = FixupKind::split_absolute(target);
                    match &mut instr.instr {
                        Instruction::Addui { imm, .. } => *imm = high,
                        _ => return Err(shape_mismatch(entry, sym.kind)),
                    }
                }
                FixupKind::FillLow => {
                    let (_, low) = FixupKind::split_absolute(target);
                    match &mut instr.instr {
                        Instruction::Ori { imm, .. } => *imm = low,
                        _ => return Err(shape_mismatch(entry, sym.kind)),
                    }
                }
                FixupKind::FillLink => {
                    let next_word = base_word + i as u32 + 1;
                    let disp = i64::from(target / 4) - i64::from(next_word);
                    if !(-(1i64 << 25)..(1i64 << 25)).contains(&disp) {
                        return Err(LinkError::DisplacementOverflow {
                            pkg: entry.pkg.clone(),
                            func: entry.name.clone(),
                            target_pkg: sym.pkg.clone(),
                            target_name: sym.name.clone(),
                            disp,
                        });
                    }
                    match &mut instr.instr {
                        Instruction::Jal { disp: d } | Instruction::J { disp: d } => {
                            *d = disp as i32;
                        }
                        _ => return Err(shape_mismatch(entry, sym.kind)),
                    }
                }
            }
        }
    }
    Ok(())
}

fn shape_mismatch(entry: &LaidOutFunc, kind: FixupKind) -> LinkError {
    LinkError::FixupShapeMismatch {
        pkg: entry.pkg.clone(),
        func: entry.name.clone(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmkit_core::reg;
    use vmkit_ir::{IrInstr, SymbolRef};

    fn sym(pkg: &str, name: &str, kind: FixupKind) -> SymbolRef {
        SymbolRef {
            pkg: pkg.to_string(),
            name: name.to_string(),
            kind,
        }
    }

    #[test]
    fn high_low_pair_patches_to_the_target_address() {
        let mut funcs = vec![LaidOutFunc {
            pkg: "main".into(),
            name: "f".into(),
            addr: 0x1000,
            code: vec![
                IrInstr::tagged(
                    Instruction::Addui { rt: reg::R1, rs1: reg::R0, imm: 0 },
                    sym("main", "g", FixupKind::FillHigh),
                ),
                IrInstr::tagged(
                    Instruction::Ori { rt: reg::R1, rs1: reg::R1, imm: 0 },
                    sym("main", "g", FixupKind::FillLow),
                ),
            ],
        }];
        let mut func_addr = HashMap::new();
        func_addr.insert(("main".to_string(), "g".to_string()), 0x1234_5678);

        patch(&mut funcs, &func_addr, &HashMap::new()).unwrap();

        match funcs[0].code[0].instr {
            Instruction::Addui { imm, .. } => assert_eq!(imm, 0x1234),
            other => panic!("expected Addui, got {other:?}"),
        }
        match funcs[0].code[1].instr {
            Instruction::Ori { imm, .. } => assert_eq!(imm, 0x5678),
            other => panic!("expected Ori, got {other:?}"),
        }
    }

    #[test]
    fn fill_link_computes_a_pc_relative_word_displacement() {
        let mut funcs = vec![LaidOutFunc {
            pkg: "main".into(),
            name: "f".into(),
            addr: 0x1000,
            code: vec![IrInstr::tagged(
                Instruction::Jal { disp: 0 },
                sym("main", "g", FixupKind::FillLink),
            )],
        }];
        let mut func_addr = HashMap::new();
        func_addr.insert(("main".to_string(), "g".to_string()), 0x1000 + 4 * 10);

        patch(&mut funcs, &func_addr, &HashMap::new()).unwrap();

        match funcs[0].code[0].instr {
            Instruction::Jal { disp } => assert_eq!(disp, 9),
            other => panic!("expected Jal, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_symbol_is_reported() {
        let mut funcs = vec![LaidOutFunc {
            pkg: "main".into(),
            name: "f".into(),
            addr: 0x1000,
            code: vec![IrInstr::tagged(
                Instruction::Jal { disp: 0 },
                sym("main", "missing", FixupKind::FillLink),
            )],
        }];
        let err = patch(&mut funcs, &HashMap::new(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, LinkError::UnresolvedSymbol { .. }));
    }

    #[test]
    fn displacement_overflow_is_reported_not_truncated() {
        let mut funcs = vec![LaidOutFunc {
            pkg: "main".into(),
            name: "f".into(),
            addr: 0x1000,
            code: vec![IrInstr::tagged(
                Instruction::Jal { disp: 0 },
                sym("main", "far", FixupKind::FillLink),
            )],
        }];
        let mut func_addr = HashMap::new();
        func_addr.insert(("main".to_string(), "far".to_string()), 0xF000_0000);

        let err = patch(&mut funcs, &func_addr, &HashMap::new()).unwrap_err();
        assert!(matches!(err, LinkError::DisplacementOverflow { .. }));
    }
}
