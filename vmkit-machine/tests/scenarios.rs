//! End-to-end scenarios from spec.md §8.

use vmkit_core::{Exception, Section};
use vmkit_isa::Instruction;
use vmkit_machine::vmu::{translate, AccessKind, Pte};
use vmkit_machine::{Machine, MachineConfig};

fn code_section(addr: u32, instrs: &[Instruction]) -> Section {
    Section::Code {
        addr,
        bytes: instrs.iter().flat_map(|i| i.encode().to_le_bytes()).collect(),
    }
}

#[test]
fn scenario_1_halt_after_two_cycles() {
    let mut m = Machine::new(MachineConfig::default());
    m.load_sections(&[code_section(
        vmkit_machine::cpu::INIT_PC,
        &[
            Instruction::Ori { rt: 1, rs1: 0, imm: 7 },
            Instruction::Halt,
        ],
    )])
    .unwrap();
    let (n, err) = m.run(0);
    assert_eq!(n, 2);
    assert!(matches!(err, Some(Exception::Halt { .. })));
    assert_eq!(m.core(0).reg(1), 7);
}

#[test]
fn scenario_2_little_endian_word_and_byte_readback() {
    let mut m = Machine::new(MachineConfig::default());
    m.memory_mut().write_word(0, 0x1000, 0xdead_beef).unwrap();
    assert_eq!(m.memory().read_word(0, 0x1000).unwrap(), 0xdead_beef);
    assert_eq!(m.memory().read_byte(0, 0x1000).unwrap(), 0xef);
}

#[test]
fn scenario_3_user_write_page_faults_kernel_write_succeeds() {
    let mut mem = vmkit_machine::PhysicalMemory::new(64);
    let table_base = 0x3000;
    let va = 0x1_0000;
    let frame = 2;
    let pte = Pte::new(frame, true, false, false);
    mem.write_word(0, table_base + 4 * (va >> 12), pte.raw())
        .unwrap();

    let err = translate(&mem, 0, table_base, va, AccessKind::Write, 1).unwrap_err();
    assert!(matches!(err, Exception::PageFault { .. }));

    translate(&mem, 0, table_base, va, AccessKind::Write, 0).unwrap();
}

#[test]
fn scenario_4_interrupt_frame_round_trip() {
    let mut m = Machine::new(MachineConfig::default());
    m.configure_interrupts(0x100, 0x8000, 0x200, 0x9000).unwrap();
    // A bare ring-0 program that never touches memory itself; the
    // interrupt is delivered on the very first tick.
    m.load_sections(&[code_section(vmkit_machine::cpu::INIT_PC, &[Instruction::Halt])])
        .unwrap();

    m.core_mut(0).enable_interrupts();
    m.core_mut(0).issue_interrupt(5);

    m.tick().unwrap();
    assert_eq!(m.core(0).reg(vmkit_core::reg::PC), 0x100);
    assert_eq!(m.core(0).reg(vmkit_core::reg::SP), 0x8000);
    assert_eq!(m.core(0).ring(), 0);

    // The frame landed at [0x7ff0..0x8000): saved SP, saved RET, arg,
    // code, saved ring.
    let base = 0x8000 - 16u32;
    let expected_sp = vmkit_machine::DEFAULT_SP_BASE + vmkit_machine::DEFAULT_SP_STRIDE;
    assert_eq!(m.memory().read_word(0, base).unwrap(), expected_sp);
    assert_eq!(m.memory().read_byte(0, base + 13).unwrap(), 0);
}
