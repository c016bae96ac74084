use std::rc::Rc;

use vmkit_isa::Instruction;
use vmkit_tast::types::FuncType;

use crate::block::{Block, BlockId, IrInstr, Terminator};

/// Error finalizing a function's blocks into a flat instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FinalizeError {
    #[error("local jump displacement {0} out of the 26-bit signed range")]
    DisplacementOverflow(i64),
}

/// A function's flattened body, ready for the linker: one instruction
/// stream with every intra-function branch already resolved, plus the
/// frame size register allocation computed (spec.md §4.5 `Function` "a
/// frame-size slot filled after register allocation").
#[derive(Debug, Clone)]
pub struct FinalizedFunc {
    pub code: Vec<IrInstr>,
    pub frame_size: i32,
}

/// A function: typed signature, basic blocks, and (once allocated) the
/// frame size every `Var`'s offset is relative to.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub sig: Rc<FuncType>,
    pub blocks: Vec<Block>,
    pub frame_size: i32,
    pub is_test: bool,
}

impl Function {
    #[must_use]
    pub fn new(name: impl Into<String>, sig: Rc<FuncType>) -> Self {
        Self {
            name: name.into(),
            sig,
            blocks: vec![Block::new()],
            frame_size: 0,
            is_test: false,
        }
    }

    #[must_use]
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn new_block(&mut self) -> BlockId {
        self.blocks.push(Block::new());
        BlockId((self.blocks.len() - 1) as u32)
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    /// Flattens `blocks` into one instruction stream, resolving every
    /// `Terminator` into a real `j`/`beq`/`bne` with its displacement
    /// computed against final block order (spec.md §4.6 control
    /// structures are lowered to blocks first, then linearized here).
    ///
    /// # Errors
    /// [`FinalizeError::DisplacementOverflow`] if a local jump's computed
    /// displacement does not fit the ISA's 26-bit signed field — this
    /// should not happen for any function a real frame-size budget would
    /// allow, but is reported rather than silently truncated, matching
    /// spec.md §4.7's treatment of the symbol-level case.
    pub fn finalize(&self) -> Result<FinalizedFunc, FinalizeError> {
        let mut starts = Vec::with_capacity(self.blocks.len());
        let mut cursor = 0u32;
        for block in &self.blocks {
            starts.push(cursor);
            cursor += block.instrs.len() as u32;
            if matches!(
                block.term,
                Some(Terminator::Jump(_)) | Some(Terminator::Branch { .. })
            ) {
                cursor += 1;
            }
        }

        let mut code = Vec::with_capacity(cursor as usize);
        for (i, block) in self.blocks.iter().enumerate() {
            code.extend(block.instrs.iter().cloned());
            match block.term {
                None | Some(Terminator::Fallthrough) => {}
                Some(Terminator::Jump(target)) => {
                    let next = starts[i] + block.instrs.len() as u32 + 1;
                    let disp = branch_disp(next, starts[target.0 as usize])?;
                    code.push(IrInstr::plain(Instruction::J { disp }));
                }
                Some(Terminator::Branch { cond_reg, target }) => {
                    let next = starts[i] + block.instrs.len() as u32 + 1;
                    let disp = branch_disp(next, starts[target.0 as usize])?;
                    code.push(IrInstr::plain(Instruction::Bne {
                        rs1: cond_reg,
                        rs2: vmkit_core::reg::R0,
                        disp,
                    }));
                }
            }
        }

        Ok(FinalizedFunc {
            code,
            frame_size: self.frame_size,
        })
    }
}

/// `disp` is relative to the instruction *after* the branch (the PC has
/// already been incremented by the time the CPU evaluates it, spec.md
/// §4.3 step 2).
fn branch_disp(next_instr_word: u32, target_word: u32) -> Result<i32, FinalizeError> {
    let disp = i64::from(target_word) - i64::from(next_instr_word);
    if !(-(1 << 25)..(1 << 25)).contains(&disp) {
        return Err(FinalizeError::DisplacementOverflow(disp));
    }
    Ok(disp as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmkit_tast::types::FuncType;

    fn sig() -> Rc<FuncType> {
        Rc::new(FuncType::new(vec![], vec![]))
    }

    #[test]
    fn fallthrough_blocks_emit_no_extra_instruction() {
        let mut f = Function::new("f", sig());
        f.block_mut(BlockId(0)).term = Some(Terminator::Fallthrough);
        let next = f.new_block();
        f.block_mut(next).term = None;
        let finalized = f.finalize().unwrap();
        assert!(finalized.code.is_empty());
    }

    #[test]
    fn unconditional_jump_computes_a_back_edge_displacement() {
        let mut f = Function::new("f", sig());
        let header = f.entry();
        let body = f.new_block();
        f.block_mut(body).term = Some(Terminator::Jump(header));
        let finalized = f.finalize().unwrap();
        assert_eq!(finalized.code.len(), 1);
        match finalized.code[0].instr {
            Instruction::J { disp } => assert_eq!(disp, -1),
            other => panic!("expected J, got {other:?}"),
        }
    }

    #[test]
    fn branch_targets_a_later_block_with_a_forward_displacement() {
        let mut f = Function::new("f", sig());
        let header = f.entry();
        let body = f.new_block();
        let after = f.new_block();
        f.block_mut(header).term = Some(Terminator::Branch {
            cond_reg: 1,
            target: body,
        });
        f.block_mut(body).term = Some(Terminator::Jump(after));
        let finalized = f.finalize().unwrap();
        assert_eq!(finalized.code.len(), 2);
        match finalized.code[0].instr {
            Instruction::Bne { disp, .. } => assert_eq!(disp, 0),
            other => panic!("expected Bne, got {other:?}"),
        }
    }
}
