use emu_core::{MemoryError, Value};

use super::{Mapper, claim_registers};
use crate::{MemoryMap, Mirroring};

/// MMC1 (mapper 1), also known as `SxROM`.
///
/// Registers are loaded serially: five writes shift bit 0 in LSB-first,
/// and the fifth commits the value to the register selected by address
/// bits 13-14 of that write. A write with bit 7 set clears the shift
/// register and sets PRG mode 2 (first bank at $8000, $C000 switchable).
///
/// - Control ($8000): mirroring (0-1), PRG mode (2-3), CHR mode (4).
///   Mirroring 2 lays the nametables out as A,B,A,B and 3 as B,A,B,A.
/// - CHR bank 0 ($A000), CHR bank 1 ($C000)
/// - PRG bank ($E000): bank (0-3), PRG-RAM disable (4)
pub struct Mmc1 {
    map: MemoryMap,
    shift: u8,
    shift_count: u8,
    control: u8,
    chr_bank_0: u8,
    chr_bank_1: u8,
    prg_bank: u8,
    last_write_cycle: Option<u64>,
}

/// PRG mode 2 with everything else cleared.
const RESET_CONTROL: u8 = 0x08;

impl Mmc1 {
    pub fn new(mut map: MemoryMap) -> Result<Self, MemoryError> {
        claim_registers(&mut map);
        let mut mmc1 = Self {
            map,
            shift: 0,
            shift_count: 0,
            control: RESET_CONTROL,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
            last_write_cycle: None,
        };
        mmc1.update_banks()?;
        Ok(mmc1)
    }

    fn update_banks(&mut self) -> Result<(), MemoryError> {
        let map = &mut self.map;

        map.set_mirroring(match self.control & 0x03 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::SwappedVertical,
        })?;

        let prg = usize::from(self.prg_bank & 0x0F);
        match (self.control >> 2) & 0x03 {
            0 | 1 => map.map_prg(0, 4, prg >> 1)?,
            2 => {
                map.map_prg(0, 2, 0)?;
                map.map_prg(2, 2, prg)?;
            }
            _ => {
                let last = (map.prg_pages() / 2).saturating_sub(1);
                map.map_prg(0, 2, prg)?;
                map.map_prg(2, 2, last)?;
            }
        }

        if self.control & 0x10 == 0 {
            map.map_chr(0, 8, usize::from(self.chr_bank_0 >> 1))?;
        } else {
            map.map_chr(0, 4, usize::from(self.chr_bank_0))?;
            map.map_chr(4, 4, usize::from(self.chr_bank_1))?;
        }

        let ram_enabled = self.prg_bank & 0x10 == 0;
        map.set_prg_ram_access(ram_enabled, ram_enabled);
        Ok(())
    }
}

impl Mapper for Mmc1 {
    fn name(&self) -> &'static str {
        "MMC1"
    }

    fn memory(&self) -> &MemoryMap {
        &self.map
    }

    fn memory_mut(&mut self) -> &mut MemoryMap {
        &mut self.map
    }

    fn write_register(&mut self, addr: u16, value: u8, cpu_cycle: u64) -> Result<(), MemoryError> {
        // Read-modify-write instructions write twice on adjacent cycles;
        // the serial port only sees the first.
        let consecutive = self
            .last_write_cycle
            .is_some_and(|last| cpu_cycle == last + 1);
        self.last_write_cycle = Some(cpu_cycle);
        if consecutive {
            log::warn!("MMC1: write ${value:02X} to ${addr:04X} on consecutive cycle ignored");
            return Ok(());
        }

        if value & 0x80 != 0 {
            self.shift = 0;
            self.shift_count = 0;
            self.control = (self.control & !0x0C) | RESET_CONTROL;
            return self.update_banks();
        }

        self.shift |= (value & 1) << self.shift_count;
        self.shift_count += 1;
        if self.shift_count < 5 {
            return Ok(());
        }

        let data = self.shift;
        self.shift = 0;
        self.shift_count = 0;
        match (addr >> 13) & 0x03 {
            0 => self.control = data,
            1 => self.chr_bank_0 = data,
            2 => self.chr_bank_1 = data,
            _ => self.prg_bank = data,
        }
        log::trace!("MMC1: ${addr:04X} <- {data:05b}");
        self.update_banks()
    }

    fn registers(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("control", self.control.into()),
            ("chr_bank_0", self.chr_bank_0.into()),
            ("chr_bank_1", self.chr_bank_1.into()),
            ("prg_bank", self.prg_bank.into()),
            ("shift", self.shift.into()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn mmc1(prg_pages: usize, chr_pages: usize) -> Mmc1 {
        let chr = if chr_pages == 0 {
            Vec::new()
        } else {
            numbered_chr(chr_pages)
        };
        Mmc1::new(MemoryMap::new(&image(1, numbered_prg(prg_pages), chr)).expect("valid"))
            .expect("valid")
    }

    /// Serially load `value` into the register at `addr`, spacing writes
    /// two cycles apart.
    fn load(mmc1: &mut Mmc1, addr: u16, value: u8, cycle: &mut u64) {
        for bit in 0..5 {
            mmc1.write_register(addr, (value >> bit) & 1, *cycle)
                .expect("mapped");
            *cycle += 2;
        }
    }

    #[test]
    fn powers_up_with_first_bank_fixed() {
        let mut mmc1 = mmc1(16, 0);
        assert_eq!(mmc1.control, RESET_CONTROL);
        assert_eq!(mmc1.memory().prg_window(0), Some(0));
        assert_eq!(mmc1.memory().prg_window(1), Some(1));

        let mut cycle = 0;
        load(&mut mmc1, 0xE000, 0x03, &mut cycle);
        assert_eq!(mmc1.memory().prg_window(0), Some(0));
        assert_eq!(mmc1.memory().prg_window(2), Some(6));
        assert_eq!(mmc1.memory().prg_window(3), Some(7));
    }

    #[test]
    fn vertical_mirroring_alternates_pages() {
        let mut mmc1 = mmc1(16, 0);
        let mut cycle = 0;
        load(&mut mmc1, 0x8000, 0x0E, &mut cycle);
        assert_eq!(mmc1.mirroring(), Mirroring::Vertical);
        assert_eq!(mmc1.memory().nametables(), [Some(0), Some(1), Some(0), Some(1)]);
    }

    #[test]
    fn horizontal_mirroring_swaps_pages() {
        let mut mmc1 = mmc1(16, 0);
        let mut cycle = 0;
        load(&mut mmc1, 0x8000, 0x0F, &mut cycle);
        assert_eq!(mmc1.mirroring(), Mirroring::SwappedVertical);
        assert_eq!(mmc1.memory().nametables(), [Some(1), Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn last_write_selects_register() {
        let mut mmc1 = mmc1(16, 0);
        let mut cycle = 0;
        for bit in 0..4 {
            mmc1.write_register(0x8000, (0x05 >> bit) & 1, cycle)
                .expect("mapped");
            cycle += 2;
        }
        mmc1.write_register(0xE000, 0, cycle).expect("mapped");
        assert_eq!(mmc1.prg_bank, 0x05);
        assert_eq!(mmc1.control, RESET_CONTROL);
        assert_eq!(mmc1.memory().prg_window(2), Some(10));
    }

    #[test]
    fn prg_modes() {
        let mut mmc1 = mmc1(16, 0);
        let mut cycle = 0;
        load(&mut mmc1, 0xE000, 0x03, &mut cycle);

        // Mode 0: 32K at $8000, low bit of the bank ignored.
        load(&mut mmc1, 0x8000, 0x00, &mut cycle);
        assert_eq!(
            (0..4).map(|w| mmc1.memory().prg_window(w)).collect::<Vec<_>>(),
            vec![Some(4), Some(5), Some(6), Some(7)]
        );

        // Mode 2: first bank fixed at $8000, switchable $C000.
        load(&mut mmc1, 0x8000, 0x08, &mut cycle);
        assert_eq!(mmc1.memory().prg_window(0), Some(0));
        assert_eq!(mmc1.memory().prg_window(2), Some(6));
    }

    #[test]
    fn reset_bit_makes_high_slot_switchable() {
        let mut mmc1 = mmc1(16, 0);
        let mut cycle = 0;
        load(&mut mmc1, 0xE000, 0x05, &mut cycle);
        // Mode 3 with vertical mirroring: $8000 follows the bank.
        load(&mut mmc1, 0x8000, 0x0E, &mut cycle);
        assert_eq!(mmc1.memory().prg_window(0), Some(10));
        assert_eq!(mmc1.memory().prg_window(2), Some(14));

        mmc1.write_register(0x8000, 1, cycle).expect("mapped");
        mmc1.write_register(0x8000, 0x80, cycle + 2).expect("mapped");
        assert_eq!(mmc1.shift_count, 0);
        assert_eq!((mmc1.control >> 2) & 0x03, 2);
        assert_eq!(mmc1.mirroring(), Mirroring::Vertical);
        assert_eq!(
            (0..4).map(|w| mmc1.memory().prg_window(w)).collect::<Vec<_>>(),
            vec![Some(0), Some(1), Some(10), Some(11)]
        );

        cycle += 4;
        load(&mut mmc1, 0xE000, 0x02, &mut cycle);
        assert_eq!(mmc1.memory().prg_window(0), Some(0));
        assert_eq!(mmc1.memory().prg_window(2), Some(4));
        assert_eq!(mmc1.memory().prg_window(3), Some(5));
    }

    #[test]
    fn chr_modes() {
        let mut mmc1 = mmc1(4, 32);
        let mut cycle = 0;
        load(&mut mmc1, 0xA000, 0x03, &mut cycle);
        // 8K mode: bank 3 >> 1 = 1.
        assert_eq!(mmc1.memory().chr_window(0), Some(8));

        load(&mut mmc1, 0x8000, 0x1C, &mut cycle);
        load(&mut mmc1, 0xC000, 0x05, &mut cycle);
        assert_eq!(mmc1.memory().chr_window(0), Some(12));
        assert_eq!(mmc1.memory().chr_window(4), Some(20));
    }

    #[test]
    fn consecutive_cycle_writes_are_ignored() {
        let mut mmc1 = mmc1(16, 0);
        mmc1.write_register(0x8000, 1, 100).expect("mapped");
        mmc1.write_register(0x8000, 1, 101).expect("mapped");
        assert_eq!(mmc1.shift_count, 1);
        mmc1.write_register(0x8000, 1, 103).expect("mapped");
        assert_eq!(mmc1.shift_count, 2);
    }

    #[test]
    fn prg_ram_disable_bit() {
        let mut mmc1 = mmc1(16, 0);
        let memory = mmc1.memory_mut();
        memory.cpu.poke(&mut memory.banks, 0x6000, 0x42).expect("in range");
        let mut cycle = 0;
        load(&mut mmc1, 0xE000, 0x10, &mut cycle);
        assert_eq!(mmc1.memory().cpu.peek(&mmc1.memory().banks, 0x6000), Ok(Some(0)));
        load(&mut mmc1, 0xE000, 0x00, &mut cycle);
        assert_eq!(mmc1.memory().cpu.peek(&mmc1.memory().banks, 0x6000), Ok(Some(0x42)));
    }
}
