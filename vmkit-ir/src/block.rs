use vmkit_core::FixupKind;
use vmkit_isa::Instruction;

/// A deferred cross-symbol reference an emitted instruction carries
/// (spec.md §3: "a (package, symbol, fixup-kind) triple resolved at link
/// time").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRef {
    pub pkg: String,
    pub name: String,
    pub kind: FixupKind,
}

/// One emitted machine instruction, optionally tagged with the symbol
/// reference the linker must patch into it before the image is final
/// (spec.md §4.5 "Each IR instruction may carry a symbol reference").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrInstr {
    pub instr: Instruction,
    pub sym: Option<SymbolRef>,
}

impl IrInstr {
    #[must_use]
    pub fn plain(instr: Instruction) -> Self {
        Self { instr, sym: None }
    }

    #[must_use]
    pub fn tagged(instr: Instruction, sym: SymbolRef) -> Self {
        Self {
            instr,
            sym: Some(sym),
        }
    }
}

/// Index of a [`Block`] within its owning [`crate::Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

/// How control leaves a block once its instructions run (spec.md §4.5:
/// "terminator info (fallthrough, unconditional jump, conditional jump on
/// a boolean temp)"). Resolved into real `j`/`beq`/`bne` instructions by
/// [`crate::Function::finalize`] once block order (and therefore every
/// local displacement) is fixed — intra-function control flow never needs
/// a linker fixup, only calls to named functions do (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// Falls into the block placed immediately after this one; no
    /// instruction is emitted. Valid only when that is in fact the next
    /// block in the function's `blocks` vector.
    Fallthrough,
    /// Unconditionally transfers to `target`, wherever it is laid out.
    Jump(BlockId),
    /// Branches to `target` when `cond_reg` holds a nonzero value (a
    /// "boolean temp"); otherwise falls through to the next block.
    Branch { cond_reg: u32, target: BlockId },
}

/// A basic block: straight-line instructions plus how control leaves it.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub instrs: Vec<IrInstr>,
    pub term: Option<Terminator>,
}

impl Block {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instr: IrInstr) {
        self.instrs.push(instr);
    }
}
