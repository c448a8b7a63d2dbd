use emu_core::{InterruptSource, MemoryError, Value};

use super::{Mapper, claim_registers};
use crate::{MemoryMap, Mirroring};

/// PPU cycles A12 must stay low before a rising edge clocks the counter.
/// Filters the rapid toggling between sprite pattern fetches.
const A12_LOW_CYCLES: u64 = 10;

/// MMC3 (mapper 4), also known as `TxROM`.
///
/// - PRG: four 8K windows; $E000 is always the last bank, and bit 6 of the
///   bank select swaps which of $8000/$C000 holds the second-to-last bank.
/// - CHR: two 2K and four 1K windows; bit 7 of the bank select swaps the
///   halves of the pattern table space.
/// - IRQ: a scanline counter clocked by rising edges of PPU A12.
pub struct Mmc3 {
    map: MemoryMap,
    /// $8000: bits 0-2 target register, bit 6 PRG mode, bit 7 CHR mode.
    bank_select: u8,
    /// R0-R7, written via $8001.
    registers: [u8; 8],
    four_screen: bool,
    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq: InterruptSource,
    a12: bool,
    a12_low_since: u64,
}

impl Mmc3 {
    pub fn new(mut map: MemoryMap, irq: InterruptSource) -> Result<Self, MemoryError> {
        claim_registers(&mut map);
        let four_screen = map.mirroring() == Mirroring::FourScreen;
        let mut mmc3 = Self {
            map,
            bank_select: 0,
            registers: [0, 2, 4, 5, 6, 7, 0, 1],
            four_screen,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq,
            a12: false,
            a12_low_since: 0,
        };
        mmc3.update_banks()?;
        Ok(mmc3)
    }

    fn update_banks(&mut self) -> Result<(), MemoryError> {
        let map = &mut self.map;
        let r = self.registers.map(usize::from);
        let second_last = map.prg_pages().saturating_sub(2);
        let last = map.prg_pages().saturating_sub(1);

        let (low, high) = if self.bank_select & 0x40 == 0 {
            (r[6], second_last)
        } else {
            (second_last, r[6])
        };
        map.map_prg(0, 1, low)?;
        map.map_prg(1, 1, r[7])?;
        map.map_prg(2, 1, high)?;
        map.map_prg(3, 1, last)?;

        // R0/R1 ignore their low bit: 2K banks.
        let (two_k, one_k) = if self.bank_select & 0x80 == 0 {
            (0, 4)
        } else {
            (4, 0)
        };
        map.map_chr(two_k, 2, r[0] >> 1)?;
        map.map_chr(two_k + 2, 2, r[1] >> 1)?;
        for (i, &bank) in r[2..6].iter().enumerate() {
            map.map_chr(one_k + i, 1, bank)?;
        }
        Ok(())
    }

    fn clock_counter(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.irq.request();
        }
    }
}

impl Mapper for Mmc3 {
    fn name(&self) -> &'static str {
        "MMC3"
    }

    fn memory(&self) -> &MemoryMap {
        &self.map
    }

    fn memory_mut(&mut self) -> &mut MemoryMap {
        &mut self.map
    }

    fn write_register(&mut self, addr: u16, value: u8, _cpu_cycle: u64) -> Result<(), MemoryError> {
        let even = addr & 1 == 0;
        match (addr & 0xE000, even) {
            (0x8000, true) => {
                self.bank_select = value;
                self.update_banks()
            }
            (0x8000, false) => {
                self.registers[usize::from(self.bank_select & 0x07)] = value;
                log::trace!("MMC3: R{} = {value}", self.bank_select & 0x07);
                self.update_banks()
            }
            (0xA000, true) => {
                if self.four_screen {
                    return Ok(());
                }
                self.map.set_mirroring(if value & 1 == 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                })
            }
            (0xA000, false) => {
                let enabled = value & 0x80 != 0;
                let writable = enabled && value & 0x40 == 0;
                self.map.set_prg_ram_access(enabled, writable);
                Ok(())
            }
            (0xC000, true) => {
                self.irq_latch = value;
                Ok(())
            }
            (0xC000, false) => {
                self.irq_counter = 0;
                self.irq_reload = true;
                Ok(())
            }
            (0xE000, true) => {
                self.irq_enabled = false;
                self.irq.ack();
                Ok(())
            }
            (0xE000, false) => {
                self.irq_enabled = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn observe_ppu_address(&mut self, addr: u16, ppu_cycle: u64) {
        let a12 = addr & 0x1000 != 0;
        if a12 && !self.a12 {
            if ppu_cycle.saturating_sub(self.a12_low_since) >= A12_LOW_CYCLES {
                self.clock_counter();
            }
        } else if !a12 && self.a12 {
            self.a12_low_since = ppu_cycle;
        }
        self.a12 = a12;
    }

    fn registers(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("bank_select", self.bank_select.into()),
            ("r6", self.registers[6].into()),
            ("r7", self.registers[7].into()),
            ("irq_latch", self.irq_latch.into()),
            ("irq_counter", self.irq_counter.into()),
            ("irq_enabled", self.irq_enabled.into()),
        ]
    }
}
