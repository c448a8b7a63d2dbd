use emu_core::{MemoryError, Value};

use super::{Mapper, bus_conflict, claim_registers};
use crate::{MemoryMap, Mirroring};

/// `AxROM` (mapper 7): 32K PRG switching and single-screen mirroring.
///
/// Bits 0-2 select the PRG bank, bit 4 the nametable page.
pub struct AxRom {
    map: MemoryMap,
    bank: u8,
}

impl AxRom {
    pub fn new(mut map: MemoryMap) -> Result<Self, MemoryError> {
        claim_registers(&mut map);
        map.map_prg(0, 4, 0)?;
        map.set_mirroring(Mirroring::SingleScreenLower)?;
        Ok(Self { map, bank: 0 })
    }
}

impl Mapper for AxRom {
    fn name(&self) -> &'static str {
        "AxROM"
    }

    fn memory(&self) -> &MemoryMap {
        &self.map
    }

    fn memory_mut(&mut self) -> &mut MemoryMap {
        &mut self.map
    }

    fn write_register(&mut self, addr: u16, value: u8, _cpu_cycle: u64) -> Result<(), MemoryError> {
        let value = bus_conflict(&self.map, addr, value)?;
        self.bank = value & 0x07;
        self.map.map_prg(0, 4, usize::from(self.bank))?;
        self.map.set_mirroring(if value & 0x10 == 0 {
            Mirroring::SingleScreenLower
        } else {
            Mirroring::SingleScreenUpper
        })
    }

    fn registers(&self) -> Vec<(&'static str, Value)> {
        vec![("bank", self.bank.into())]
    }
}
