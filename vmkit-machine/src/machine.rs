use vmkit_core::{Exception, Section, PAGE_SIZE, RESERVED_PAGES};

use crate::cpu::Cpu;
use crate::device::Device;
use crate::interrupt::InterruptController;
use crate::memory::PhysicalMemory;

/// Default stack pointer base and per-core stride, mirroring the original
/// `NewMachine`'s `DefaultSPBase`/`DefaultSPStride`.
pub const DEFAULT_SP_BASE: u32 = 0x2_0000;
pub const DEFAULT_SP_STRIDE: u32 = 0x2000;

/// Configuration for [`Machine::new`] — both fields are explicit values
/// threaded through rather than ambient state (spec.md §9 "ambient state"
/// design note).
#[derive(Debug, Clone, Copy)]
pub struct MachineConfig {
    pub mem_pages: u32,
    pub ncore: u8,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            mem_pages: 4096,
            ncore: 1,
        }
    }
}

/// A loading error produced when an image references memory the machine
/// was not configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("section at {addr:#010x} (len {len}) does not fit in {npages} pages")]
pub struct LoadError {
    pub addr: u32,
    pub len: u32,
    pub npages: u32,
}

/// Errors from decoding and loading a raw image stream in one step.
#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error(transparent)]
    Image(#[from] vmkit_image::ImageError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// A multicore simulated machine (spec.md §4.4): shared physical memory,
/// one [`Cpu`] per core, and a fixed list of devices ticked before the
/// cores each simulation step. There is no parallelism between cores —
/// they advance in index order, one instruction each, every tick.
pub struct Machine {
    mem: PhysicalMemory,
    cores: Vec<Cpu>,
    devices: Vec<Box<dyn Device>>,
    debug: Vec<Section>,
}

impl Machine {
    #[must_use]
    pub fn new(config: MachineConfig) -> Self {
        let mut mem = PhysicalMemory::new(config.mem_pages.max(RESERVED_PAGES));
        let cores: Vec<Cpu> = (0..config.ncore).map(Cpu::new).collect();

        let npages = mem.npages();
        let ncore = config.ncore;
        let _ = mem.write_word(0, vmkit_core::PAGE_SYSINFO * PAGE_SIZE, npages);
        let _ = mem.write_word(0, vmkit_core::PAGE_SYSINFO * PAGE_SIZE + 4, u32::from(ncore));

        let mut machine = Self {
            mem,
            cores,
            devices: Vec::new(),
            debug: Vec::new(),
        };
        machine.set_sp(DEFAULT_SP_BASE, DEFAULT_SP_STRIDE);
        machine
    }

    #[must_use]
    pub fn ncore(&self) -> usize {
        self.cores.len()
    }

    #[must_use]
    pub fn memory(&self) -> &PhysicalMemory {
        &self.mem
    }

    #[must_use]
    pub fn memory_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.mem
    }

    #[must_use]
    pub fn core(&self, index: usize) -> &Cpu {
        &self.cores[index]
    }

    #[must_use]
    pub fn core_mut(&mut self, index: usize) -> &mut Cpu {
        &mut self.cores[index]
    }

    /// Registers a device to be ticked, in order, before the cores each
    /// simulation step.
    pub fn add_device(&mut self, device: Box<dyn Device>) {
        self.devices.push(device);
    }

    /// Configures every core's interrupt descriptor with the same
    /// handler/syscall entry points. A real kernel image would instead
    /// write these words itself during `init`; this is a convenience for
    /// tests and simple programs that never install a kernel.
    ///
    /// # Errors
    /// Propagates any [`Exception`] raised while writing the descriptor.
    pub fn configure_interrupts(
        &mut self,
        handler_pc: u32,
        handler_sp: u32,
        syscall_pc: u32,
        syscall_sp: u32,
    ) -> Result<(), Exception> {
        for index in 0..self.cores.len() as u8 {
            InterruptController::configure(
                &mut self.mem,
                index,
                handler_pc,
                handler_sp,
                syscall_pc,
                syscall_sp,
            )?;
        }
        Ok(())
    }

    /// Sets every core's initial PC (used by the loader after finding the
    /// entry point, spec.md §4.7 step 4).
    pub fn set_pc(&mut self, pc: u32) {
        for cpu in &mut self.cores {
            cpu.set_pc(pc);
        }
    }

    /// Sets each core's stack pointer to `base + (index + 1) * stride`, so
    /// stacks don't overlap.
    pub fn set_sp(&mut self, base: u32, stride: u32) {
        for (i, cpu) in self.cores.iter_mut().enumerate() {
            cpu.set_sp(base + (i as u32 + 1) * stride);
        }
    }

    /// Writes a section's payload into physical memory; `Debug`/`Comment`
    /// sections are retained for the driver's disassembly/stack-trace
    /// output instead of being mapped (spec.md §6).
    ///
    /// # Errors
    /// Returns [`LoadError`] if any section falls outside configured
    /// memory.
    pub fn load_sections(&mut self, sections: &[Section]) -> Result<(), LoadError> {
        for section in sections {
            match section {
                Section::None => {}
                Section::Code { addr, bytes } | Section::Data { addr, bytes } => {
                    self.write_bytes(*addr, bytes)?;
                }
                Section::Zeros { addr, len } => {
                    self.write_bytes(*addr, &vec![0u8; *len as usize])?;
                }
                Section::Debug { .. } | Section::Comment { .. } => {
                    self.debug.push(section.clone());
                }
            }
        }

        if let Some(entry) = sections.iter().find_map(|s| match s {
            Section::Code { addr, .. } => Some(*addr),
            _ => None,
        }) {
            self.set_pc(entry);
        }

        Ok(())
    }

    fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), LoadError> {
        let npages = self.mem.npages();
        if !bytes.is_empty() {
            let last = addr as u64 + bytes.len() as u64 - 1;
            if last >= u64::from(npages) * u64::from(PAGE_SIZE) {
                return Err(LoadError {
                    addr,
                    len: bytes.len() as u32,
                    npages,
                });
            }
        }
        for (i, byte) in bytes.iter().enumerate() {
            // Writes below page 0 never happen (addr is a u32, page 0 is
            // addressable as ordinary memory at the storage level; the
            // null-guard property is enforced by programs never mapping
            // virtual address 0, not by the loader).
            let _ = self.mem.write_byte(0, addr + i as u32, *byte);
        }
        Ok(())
    }

    /// Retained `Debug`/`Comment` sections from the last load, for
    /// disassembly annotation and stack traces.
    #[must_use]
    pub fn debug_sections(&self) -> &[Section] {
        &self.debug
    }

    /// Decodes an image stream (spec.md §6) and loads every section.
    /// Mirrors the original's `LoadImage`/`LoadImageBytes`.
    ///
    /// # Errors
    /// [`ImageLoadError::Image`] on a malformed stream,
    /// [`ImageLoadError::Load`] if a decoded section falls outside
    /// configured memory.
    pub fn load_image(&mut self, r: impl std::io::Read) -> Result<(), ImageLoadError> {
        let sections = vmkit_image::read_sections(r).map_err(ImageLoadError::Image)?;
        self.load_sections(&sections).map_err(ImageLoadError::Load)
    }

    /// Advances the simulation by one tick: every device once, then every
    /// core once, in index order (spec.md §4.4). The first unhandled
    /// exception from any core stops the tick and is returned.
    ///
    /// # Errors
    /// The first synchronous fault or `Halt` raised by any core.
    pub fn tick(&mut self) -> Result<(), Exception> {
        for device in &mut self.devices {
            device.tick(&mut self.mem, &mut self.cores);
        }
        for cpu in &mut self.cores {
            cpu.tick(&mut self.mem)?;
        }
        Ok(())
    }

    /// Runs up to `nticks` ticks (0 = unlimited), stopping at the first
    /// exception. Returns the number of ticks simulated (including the one
    /// that raised the exception, if any — mirrors the original `Run`,
    /// which increments its counter before checking the tick's result)
    /// and, if the run did not run to completion, the exception that
    /// stopped it.
    pub fn run(&mut self, nticks: usize) -> (usize, Option<Exception>) {
        let mut n = 0;
        loop {
            if nticks != 0 && n >= nticks {
                return (n, None);
            }
            let result = self.tick();
            n += 1;
            if let Err(e) = result {
                return (n, Some(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmkit_isa::Instruction;

    fn halt_program() -> Vec<Section> {
        vec![Section::Code {
            addr: crate::cpu::INIT_PC,
            bytes: [
                Instruction::Ori { rt: 1, rs1: 0, imm: 7 }.encode(),
                Instruction::Halt.encode(),
            ]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect(),
        }]
    }

    #[test]
    fn halt_program_runs_two_ticks_then_halts() {
        let mut m = Machine::new(MachineConfig::default());
        m.load_sections(&halt_program()).unwrap();
        let (n, err) = m.run(100);
        assert_eq!(n, 2);
        assert!(matches!(err, Some(Exception::Halt { .. })));
        assert_eq!(m.core(0).reg(1), 7);
    }

    #[test]
    fn unlimited_run_stops_at_first_exception() {
        let mut m = Machine::new(MachineConfig::default());
        m.load_sections(&halt_program()).unwrap();
        let (n, err) = m.run(0);
        assert_eq!(n, 2);
        assert!(err.unwrap().is_halt());
    }

    #[test]
    fn load_out_of_range_section_is_an_error() {
        let mut m = Machine::new(MachineConfig {
            mem_pages: 2,
            ncore: 1,
        });
        let sections = vec![Section::Data {
            addr: 0x10_0000,
            bytes: vec![1, 2, 3],
        }];
        assert!(m.load_sections(&sections).is_err());
    }
}
