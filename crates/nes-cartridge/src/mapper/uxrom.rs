use emu_core::{MemoryError, Value};

use super::{Mapper, bus_conflict, claim_registers};
use crate::MemoryMap;

/// `UxROM` (mapper 2): switchable 16K at $8000, last 16K fixed at $C000.
pub struct UxRom {
    map: MemoryMap,
    bank: u8,
}

impl UxRom {
    pub fn new(mut map: MemoryMap) -> Result<Self, MemoryError> {
        claim_registers(&mut map);
        let last = (map.prg_pages() / 2).saturating_sub(1);
        map.map_prg(0, 2, 0)?;
        map.map_prg(2, 2, last)?;
        Ok(Self { map, bank: 0 })
    }
}

impl Mapper for UxRom {
    fn name(&self) -> &'static str {
        "UxROM"
    }

    fn memory(&self) -> &MemoryMap {
        &self.map
    }

    fn memory_mut(&mut self) -> &mut MemoryMap {
        &mut self.map
    }

    fn write_register(&mut self, addr: u16, value: u8, _cpu_cycle: u64) -> Result<(), MemoryError> {
        self.bank = bus_conflict(&self.map, addr, value)? & 0x0F;
        log::trace!("UxROM: PRG bank {}", self.bank);
        self.map.map_prg(0, 2, usize::from(self.bank))
    }

    fn registers(&self) -> Vec<(&'static str, Value)> {
        vec![("bank", self.bank.into())]
    }
}
