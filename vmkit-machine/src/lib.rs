//! Simulated multi-core CPU, paged memory and devices for the vmkit
//! machine (spec.md §4).
//!
//! Layering mirrors the data flow: [`memory`] is flat physical RAM,
//! [`vmu`] translates virtual addresses through it, [`cpu`] is one core
//! that fetches/decodes/executes through the VMU, [`device`] is the
//! per-tick MMIO participants, and [`machine`] ties cores and devices
//! together into the simulation loop the driver runs.

pub mod cpu;
pub mod device;
pub mod interrupt;
pub mod memory;
pub mod vmu;

mod machine;

pub use cpu::Cpu;
pub use device::Device;
pub use machine::{
    ImageLoadError, LoadError, Machine, MachineConfig, DEFAULT_SP_BASE, DEFAULT_SP_STRIDE,
};
pub use memory::PhysicalMemory;
pub use vmu::{translate, AccessKind, Pte};
