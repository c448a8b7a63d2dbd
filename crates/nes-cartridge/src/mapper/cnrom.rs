use emu_core::{MemoryError, Value};

use super::{Mapper, bus_conflict, claim_registers};
use crate::MemoryMap;

/// CNROM (mapper 3): fixed PRG, one register selecting an 8K CHR bank.
pub struct CnRom {
    map: MemoryMap,
    chr_bank: u8,
}

impl CnRom {
    #[must_use]
    pub fn new(mut map: MemoryMap) -> Self {
        claim_registers(&mut map);
        Self { map, chr_bank: 0 }
    }
}

impl Mapper for CnRom {
    fn name(&self) -> &'static str {
        "CNROM"
    }

    fn memory(&self) -> &MemoryMap {
        &self.map
    }

    fn memory_mut(&mut self) -> &mut MemoryMap {
        &mut self.map
    }

    fn write_register(&mut self, addr: u16, value: u8, _cpu_cycle: u64) -> Result<(), MemoryError> {
        self.chr_bank = bus_conflict(&self.map, addr, value)? & 0x03;
        log::trace!("CNROM: CHR bank {}", self.chr_bank);
        self.map.map_chr(0, 8, usize::from(self.chr_bank))
    }

    fn registers(&self) -> Vec<(&'static str, Value)> {
        vec![("chr_bank", self.chr_bank.into())]
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn selects_8k_chr() {
        let map = MemoryMap::new(&image(3, open_prg(PRG_16K), numbered_chr(32))).expect("valid");
        let mut cnrom = CnRom::new(map);
        cnrom.write_register(0x8000, 2, 0).expect("mapped");
        assert_eq!(cnrom.memory().chr_window(0), Some(16));
        assert_eq!(cnrom.memory().chr_window(7), Some(23));
        assert_eq!(cnrom.memory().prg_window(0), Some(0));
    }

    #[test]
    fn bank_wraps_at_chr_size() {
        let map = MemoryMap::new(&image(3, open_prg(PRG_16K), numbered_chr(16))).expect("valid");
        let mut cnrom = CnRom::new(map);
        cnrom.write_register(0xFFFF, 3, 0).expect("mapped");
        assert_eq!(cnrom.memory().chr_window(0), Some(8));
    }
}
