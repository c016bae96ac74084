use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cpu::Cpu;
use crate::memory::PhysicalMemory;

/// Something that observes/mutates a fixed MMIO page once per machine tick
/// and may raise interrupts on cores (spec.md §4.4). Devices never touch
/// memory outside the page they were constructed with; control/status
/// bytes are read and written directly through [`PhysicalMemory`], the
/// same way the simulated CPU would — there is no separate MMIO
/// interception layer, matching the original's devices holding a direct
/// pointer into their page.
pub trait Device {
    fn tick(&mut self, mem: &mut PhysicalMemory, cores: &mut [Cpu]);
}

/// Byte offsets within the basic I/O page (spec.md §4.4). Laid out as one
/// small register block per device: the ticker's enable byte, then the
/// serial/console byte-output protocol (a data byte plus a ready flag the
/// device clears once consumed), then the ROM command block.
pub mod basic_io {
    pub const TICKER_ENABLE: u32 = 0x00;

    pub const SERIAL_DATA: u32 = 0x10;
    pub const SERIAL_READY: u32 = 0x14;

    pub const CONSOLE_DATA: u32 = 0x20;
    pub const CONSOLE_READY: u32 = 0x24;

    pub const ROM_COMMAND: u32 = 0x30;
    pub const ROM_RESULT: u32 = 0x34;
}

/// Raises a pseudo-random periodic interrupt on core 0 (spec.md §4.4), the
/// only clock-like source of asynchronous work in the machine. Disabled
/// unless the `TICKER_ENABLE` byte in the I/O page is nonzero.
pub struct Ticker {
    code: u8,
    rng: StdRng,
    countdown: u32,
    period_max: u32,
}

impl Ticker {
    #[must_use]
    pub fn new(code: u8, seed: u64, period_max: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let countdown = rng.gen_range(1..=period_max.max(1));
        Self {
            code,
            rng,
            countdown,
            period_max: period_max.max(1),
        }
    }
}

impl Device for Ticker {
    fn tick(&mut self, mem: &mut PhysicalMemory, cores: &mut [Cpu]) {
        let page = vmkit_core::PAGE_IO_BASIC * vmkit_core::PAGE_SIZE;
        let enabled = mem
            .read_byte(0, page + basic_io::TICKER_ENABLE)
            .unwrap_or(0)
            != 0;
        if !enabled {
            return;
        }

        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.countdown = self.rng.gen_range(1..=self.period_max);
            if let Some(core0) = cores.first_mut() {
                core0.issue_interrupt(self.code);
            }
        }
    }
}

/// Writes bytes a program stores to `SERIAL_DATA` (once `SERIAL_READY` is
/// set) to a caller-supplied writer, then clears the ready flag. Mirrors
/// the original's `serial`/`console` pair: both forward to the same
/// embedder-supplied writer, distinguished only by which page offsets they
/// watch, so `Console` below reuses this implementation with a different
/// offset pair.
pub struct ByteSink {
    data_offset: u32,
    ready_offset: u32,
    output: Box<dyn Write + Send>,
}

impl ByteSink {
    #[must_use]
    pub fn new(data_offset: u32, ready_offset: u32, output: Box<dyn Write + Send>) -> Self {
        Self {
            data_offset,
            ready_offset,
            output,
        }
    }

    #[must_use]
    pub fn serial(output: Box<dyn Write + Send>) -> Self {
        Self::new(basic_io::SERIAL_DATA, basic_io::SERIAL_READY, output)
    }

    #[must_use]
    pub fn console(output: Box<dyn Write + Send>) -> Self {
        Self::new(basic_io::CONSOLE_DATA, basic_io::CONSOLE_READY, output)
    }
}

impl Device for ByteSink {
    fn tick(&mut self, mem: &mut PhysicalMemory, _cores: &mut [Cpu]) {
        let page = vmkit_core::PAGE_IO_BASIC * vmkit_core::PAGE_SIZE;
        let ready = mem.read_byte(0, page + self.ready_offset).unwrap_or(0);
        if ready == 0 {
            return;
        }
        if let Ok(byte) = mem.read_byte(0, page + self.data_offset) {
            let _ = self.output.write_all(&[byte]);
        }
        let _ = mem.write_byte(0, page + self.ready_offset, 0);
    }
}

/// Read-only file blob pageable into memory on MMIO request. Out of scope
/// for a full filesystem (spec.md §1 names ROM-mounted filesystem as an
/// external collaborator); this carries just enough to page in the raw
/// bytes a command names, matching the amount of behavior the rest of the
/// machine actually depends on.
pub struct Rom {
    blob: Vec<u8>,
}

impl Rom {
    #[must_use]
    pub fn new(blob: Vec<u8>) -> Self {
        Self { blob }
    }
}

impl Device for Rom {
    fn tick(&mut self, mem: &mut PhysicalMemory, _cores: &mut [Cpu]) {
        let page = vmkit_core::PAGE_IO_BASIC * vmkit_core::PAGE_SIZE;
        let Ok(cmd) = mem.read_word(0, page + basic_io::ROM_COMMAND) else {
            return;
        };
        if cmd == 0 {
            return;
        }
        // cmd encodes a 1-based byte offset into the blob; result is that
        // byte, zero-extended, or 0 past the end.
        let offset = (cmd - 1) as usize;
        let result = u32::from(self.blob.get(offset).copied().unwrap_or(0));
        let _ = mem.write_word(0, page + basic_io::ROM_RESULT, result);
        let _ = mem.write_word(0, page + basic_io::ROM_COMMAND, 0);
    }
}

/// Surfaces the screen text/color pages to the embedder. Out of scope as a
/// rendered device (spec.md §1): this only exposes the raw page contents,
/// it performs no per-tick work of its own.
pub struct Screen;

impl Device for Screen {
    fn tick(&mut self, _mem: &mut PhysicalMemory, _cores: &mut [Cpu]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmkit_core::{PAGE_IO_BASIC, PAGE_SIZE};

    #[test]
    fn ticker_eventually_raises_its_code_on_core_zero() {
        let mut mem = PhysicalMemory::new(8);
        mem.write_byte(0, PAGE_IO_BASIC * PAGE_SIZE + basic_io::TICKER_ENABLE, 1)
            .unwrap();
        let mut ticker = Ticker::new(0x10, 42, 4);
        let mut cores = vec![Cpu::new(0)];

        let mut fired = false;
        for _ in 0..64 {
            ticker.tick(&mut mem, &mut cores);
            // Interrupt pending is private; use issue/poll behavior
            // indirectly by re-issuing and checking no panic occurs. The
            // countdown-based firing is exercised directly instead.
            if ticker.countdown == ticker.period_max {
                fired = true;
            }
        }
        assert!(fired);
    }

    #[test]
    fn byte_sink_forwards_ready_bytes_and_clears_the_flag() {
        let mut mem = PhysicalMemory::new(8);
        let base = PAGE_IO_BASIC * PAGE_SIZE;
        mem.write_byte(0, base + basic_io::SERIAL_DATA, b'X').unwrap();
        mem.write_byte(0, base + basic_io::SERIAL_READY, 1).unwrap();

        let buf: Vec<u8> = Vec::new();
        let mut sink = ByteSink::serial(Box::new(buf));
        let mut cores = vec![Cpu::new(0)];
        sink.tick(&mut mem, &mut cores);

        assert_eq!(mem.read_byte(0, base + basic_io::SERIAL_READY).unwrap(), 0);
    }

    #[test]
    fn rom_answers_a_byte_offset_command() {
        let mut mem = PhysicalMemory::new(8);
        let base = PAGE_IO_BASIC * PAGE_SIZE;
        let mut rom = Rom::new(vec![0xAA, 0xBB, 0xCC]);
        mem.write_word(0, base + basic_io::ROM_COMMAND, 2).unwrap();
        let mut cores = vec![Cpu::new(0)];
        rom.tick(&mut mem, &mut cores);
        assert_eq!(mem.read_word(0, base + basic_io::ROM_RESULT).unwrap(), 0xBB);
        assert_eq!(mem.read_word(0, base + basic_io::ROM_COMMAND).unwrap(), 0);
    }
}
