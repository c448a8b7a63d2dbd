//! Mapper implementations.
//!
//! A mapper owns the cartridge's [`MemoryMap`]. Boards with control
//! registers claim $8000-$FFFF with a [`CpuPort::Mapper`] setter; the system
//! bus forwards those writes to [`Mapper::write_register`], which switches
//! banks by replacing window slots.

mod axrom;
mod cnrom;
mod mmc1;
mod mmc3;
mod nrom;
mod uxrom;

use emu_core::{InterruptSource, MemoryError, Value};

use crate::{CartridgeError, CartridgeImage, CpuPort, MemoryMap, Mirroring};

pub use axrom::AxRom;
pub use cnrom::CnRom;
pub use mmc1::Mmc1;
pub use mmc3::Mmc3;
pub use nrom::Nrom;
pub use uxrom::UxRom;

pub trait Mapper {
    /// Board name, e.g. `"MMC1"`.
    fn name(&self) -> &'static str;

    fn memory(&self) -> &MemoryMap;

    fn memory_mut(&mut self) -> &mut MemoryMap;

    /// A CPU write that hit the mapper's setter range. `cpu_cycle` is the
    /// CPU cycle count at the time of the write.
    fn write_register(&mut self, addr: u16, value: u8, cpu_cycle: u64)
    -> Result<(), MemoryError>;

    /// The PPU drove `addr` onto its address bus during PPU cycle
    /// `ppu_cycle`. Boards that count scanlines watch A12 here.
    fn observe_ppu_address(&mut self, _addr: u16, _ppu_cycle: u64) {}

    fn mirroring(&self) -> Mirroring {
        self.memory().mirroring()
    }

    /// Register values for the debugger, by name.
    fn registers(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }
}

/// Build the mapper for `image`. `irq` is handed to boards that can
/// interrupt the CPU and dropped otherwise.
pub fn create(image: &CartridgeImage, irq: InterruptSource) -> Result<Box<dyn Mapper>, CartridgeError> {
    let map = MemoryMap::new(image)?;
    let mapper: Box<dyn Mapper> = match image.mapper {
        0 => Box::new(Nrom::new(map)),
        1 => Box::new(Mmc1::new(map)?),
        2 => Box::new(UxRom::new(map)?),
        3 => Box::new(CnRom::new(map)),
        4 => Box::new(Mmc3::new(map, irq)?),
        7 => Box::new(AxRom::new(map)?),
        n => return Err(CartridgeError::UnsupportedMapper(n)),
    };
    let memory = mapper.memory();
    log::info!(
        "{}: {}K PRG, {}K CHR {}, {:?}",
        mapper.name(),
        memory.prg_pages() * 8,
        memory.chr_pages(),
        if memory.chr_is_ram() { "RAM" } else { "ROM" },
        memory.mirroring(),
    );
    Ok(mapper)
}

/// Claim the register window for a board with control registers.
fn claim_registers(map: &mut MemoryMap) {
    map.cpu.add_setter(0x8000, 0xFFFF, CpuPort::Mapper);
}

/// The value that reaches a board without bus-conflict protection: the
/// CPU and the ROM drive the data bus together.
fn bus_conflict(map: &MemoryMap, addr: u16, value: u8) -> Result<u8, MemoryError> {
    Ok(value & map.rom_byte(addr)?)
}
