use emu_core::MemoryError;

use super::Mapper;
use crate::MemoryMap;

/// NROM (mapper 0): no bank switching.
///
/// 16K of PRG is mirrored across $8000-$FFFF; 32K fills it. Nametables
/// follow the header for the life of the cartridge.
pub struct Nrom {
    map: MemoryMap,
}

impl Nrom {
    #[must_use]
    pub fn new(map: MemoryMap) -> Self {
        Self { map }
    }
}

impl Mapper for Nrom {
    fn name(&self) -> &'static str {
        "NROM"
    }

    fn memory(&self) -> &MemoryMap {
        &self.map
    }

    fn memory_mut(&mut self) -> &mut MemoryMap {
        &mut self.map
    }

    fn write_register(&mut self, addr: u16, value: u8, _cpu_cycle: u64) -> Result<(), MemoryError> {
        log::warn!("NROM has no registers; write ${value:02X} to ${addr:04X} ignored");
        Ok(())
    }
}
