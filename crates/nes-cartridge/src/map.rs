//! Bank-level composition of the CPU and PPU address spaces.
//!
//! The CPU space is three top-level 8K slots below $6000 (internal RAM,
//! PPU registers, then I/O and expansion) followed by a nested cartridge space:
//! PRG-RAM at $6000 and four 8K PRG windows at $8000-$FFFF. The PPU space is
//! eight 1K CHR windows, four 1K nametable slots and their mirror at
//! $3000-$3FFF, with palette RAM shadowed over $3F00-$3FFF.
//!
//! Every bank lives in one [`BankArena`]; mappers switch banks by pointing
//! window slots at different arena entries.

use emu_core::MemoryError;
use emu_core::memory::{AddressSpace, BankArena, BankId, MemoryUnit, Route, Slot};

use crate::{CartridgeError, CartridgeImage, Mirroring};

pub const PRG_PAGE: usize = 0x2000;
pub const CHR_PAGE: usize = 0x0400;
const PRG_RAM_SIZE: usize = 0x2000;
const INTERNAL_RAM_SIZE: usize = 0x0800;

const CART_SLOT: usize = 3;
const PRG_WINDOWS: usize = 4;
const CHR_WINDOWS: usize = 8;
const NAMETABLE_SLOT: usize = CHR_WINDOWS;
const NAMETABLE_MIRROR_SLOT: usize = NAMETABLE_SLOT + 4;

/// Ports reachable from the CPU address space through shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuPort {
    Ppu,
    Apu,
    Controller,
    OamDma,
    Mapper,
}

/// Ports reachable from the PPU address space through shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuPort {
    Palette,
}

#[derive(Debug, Clone)]
pub struct MemoryMap {
    pub banks: BankArena,
    pub cpu: AddressSpace<CpuPort>,
    pub ppu: AddressSpace<PpuPort>,
    prg: Vec<BankId>,
    chr: Vec<BankId>,
    ciram: [BankId; 4],
    prg_ram: BankId,
    chr_is_ram: bool,
    mirroring: Mirroring,
}

impl MemoryMap {
    /// Lay out banks for `image` with the first 32K of PRG, the first 8K
    /// of CHR and the header's mirroring visible.
    pub fn new(image: &CartridgeImage) -> Result<Self, CartridgeError> {
        if image.prg_rom.is_empty() {
            return Err(CartridgeError::InvalidImage("no PRG ROM".to_string()));
        }
        check_alignment("PRG ROM", image.prg_rom.len(), PRG_PAGE)?;
        check_alignment("CHR ROM", image.chr_rom.len(), CHR_PAGE)?;

        let mut banks = BankArena::new();

        let ram = banks.insert(MemoryUnit::repeated(
            MemoryUnit::ram(INTERNAL_RAM_SIZE),
            0x2000,
        ));
        let ppu_regs = banks.insert(MemoryUnit::repeated(MemoryUnit::ram(8), 0x2000));
        let io = banks.insert(MemoryUnit::rom(vec![0; 0x2000]));
        let prg_ram = banks.insert(MemoryUnit::protected(PRG_RAM_SIZE));

        let prg = banks.insert_rom_banks(&image.prg_rom, PRG_PAGE);
        let chr_is_ram = image.has_chr_ram();
        let chr = if chr_is_ram {
            (0..CHR_WINDOWS)
                .map(|_| banks.insert(MemoryUnit::ram(CHR_PAGE)))
                .collect()
        } else {
            banks.insert_rom_banks(&image.chr_rom, CHR_PAGE)
        };
        let ciram = [(); 4].map(|()| banks.insert(MemoryUnit::ram(0x400)));

        let mut cart_slots = vec![Slot::Bank(prg_ram)];
        cart_slots.extend((0..PRG_WINDOWS).map(|i| Slot::Bank(prg[i % prg.len()])));
        let cart = AddressSpace::new(cart_slots, &banks);
        let cpu = AddressSpace::new(
            vec![
                Slot::Bank(ram),
                Slot::Bank(ppu_regs),
                Slot::Bank(io),
                Slot::Nested(cart),
            ],
            &banks,
        );

        let mut ppu_slots: Vec<Slot<PpuPort>> = (0..CHR_WINDOWS)
            .map(|i| Slot::Bank(chr[i % chr.len()]))
            .collect();
        ppu_slots.extend((0..8).map(|i| Slot::Bank(ciram[i % 4])));
        let mut ppu = AddressSpace::new(ppu_slots, &banks);
        ppu.add_shadow(0x3F00, 0x3FFF, PpuPort::Palette);

        let mut map = Self {
            banks,
            cpu,
            ppu,
            prg,
            chr,
            ciram,
            prg_ram,
            chr_is_ram,
            mirroring: image.mirroring,
        };
        map.set_mirroring(image.mirroring)?;
        Ok(map)
    }

    /// Number of 8K PRG ROM banks.
    #[must_use]
    pub fn prg_pages(&self) -> usize {
        self.prg.len()
    }

    /// Number of 1K CHR banks (ROM or RAM).
    #[must_use]
    pub fn chr_pages(&self) -> usize {
        self.chr.len()
    }

    #[must_use]
    pub fn chr_is_ram(&self) -> bool {
        self.chr_is_ram
    }

    #[must_use]
    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    /// Show a `pages` x 8K PRG bank in the windows starting at `window`
    /// (0 = $8000 .. 3 = $E000). `bank` counts in units of the bank size
    /// and wraps at the ROM size.
    pub fn map_prg(&mut self, window: usize, pages: usize, bank: usize) -> Result<(), MemoryError> {
        let first = wrap_bank(bank, pages, self.prg.len());
        let cart = nested_cart(&mut self.cpu)?;
        for i in 0..pages {
            let id = self.prg[(first + i) % self.prg.len()];
            cart.replace_slot(1 + window + i, id, &self.banks)?;
        }
        Ok(())
    }

    /// Show a `pages` x 1K CHR bank in the windows starting at `window`
    /// (0 = $0000 .. 7 = $1C00).
    pub fn map_chr(&mut self, window: usize, pages: usize, bank: usize) -> Result<(), MemoryError> {
        let first = wrap_bank(bank, pages, self.chr.len());
        for i in 0..pages {
            let id = self.chr[(first + i) % self.chr.len()];
            self.ppu.replace_slot(window + i, id, &self.banks)?;
        }
        Ok(())
    }

    /// Point the four nametable slots (and their $3000 mirror) at CIRAM.
    pub fn set_mirroring(&mut self, mirroring: Mirroring) -> Result<(), MemoryError> {
        let layout = match mirroring {
            Mirroring::Horizontal => [0, 0, 1, 1],
            Mirroring::Vertical => [0, 1, 0, 1],
            Mirroring::SingleScreenLower => [0; 4],
            Mirroring::SingleScreenUpper => [1; 4],
            Mirroring::FourScreen => [0, 1, 2, 3],
            Mirroring::SwappedVertical => [1, 0, 1, 0],
        };
        for (i, &page) in layout.iter().enumerate() {
            let id = self.ciram[page];
            self.ppu.replace_slot(NAMETABLE_SLOT + i, id, &self.banks)?;
            self.ppu
                .replace_slot(NAMETABLE_MIRROR_SLOT + i, id, &self.banks)?;
        }
        if mirroring != self.mirroring {
            log::trace!("mirroring {:?} -> {mirroring:?}", self.mirroring);
        }
        self.mirroring = mirroring;
        Ok(())
    }

    /// Enable or disable reads and writes of PRG-RAM.
    pub fn set_prg_ram_access(&mut self, read: bool, write: bool) {
        self.banks.get_mut(self.prg_ram).set_access(read, write);
    }

    /// The ROM byte the CPU would read at `addr`, ignoring getters. Used
    /// for bus conflicts.
    pub fn rom_byte(&self, addr: u16) -> Result<u8, MemoryError> {
        Ok(self.cpu.peek(&self.banks, addr)?.unwrap_or(0xFF))
    }

    /// Index of the 8K PRG bank in window `window`.
    #[must_use]
    pub fn prg_window(&self, window: usize) -> Option<usize> {
        let Some(Slot::Nested(cart)) = self.cpu.slot(CART_SLOT) else {
            return None;
        };
        bank_position(&self.prg, cart.slot(1 + window)?)
    }

    /// Index of the 1K CHR bank in window `window`.
    #[must_use]
    pub fn chr_window(&self, window: usize) -> Option<usize> {
        bank_position(&self.chr, self.ppu.slot(window)?)
    }

    /// CIRAM page behind each of the four nametables.
    #[must_use]
    pub fn nametables(&self) -> [Option<usize>; 4] {
        std::array::from_fn(|i| {
            self.ppu
                .slot(NAMETABLE_SLOT + i)
                .and_then(|slot| bank_position(&self.ciram, slot))
        })
    }

    /// Route a PPU-space read, with the address folded to 14 bits.
    pub fn ppu_route_read(&self, addr: u16) -> Result<Route<PpuPort>, MemoryError> {
        self.ppu.route_read(addr & 0x3FFF)
    }

    pub fn ppu_route_write(&self, addr: u16) -> Result<Route<PpuPort>, MemoryError> {
        self.ppu.route_write(addr & 0x3FFF)
    }
}

fn check_alignment(what: &'static str, size: usize, unit: usize) -> Result<(), CartridgeError> {
    if size.is_multiple_of(unit) {
        Ok(())
    } else {
        Err(CartridgeError::BankAlignment { what, size, unit })
    }
}

/// First page of `bank` (in units of `pages`) after masking to the ROM.
fn wrap_bank(bank: usize, pages: usize, total: usize) -> usize {
    let count = (total / pages).max(1);
    (bank % count) * pages
}

fn nested_cart(cpu: &mut AddressSpace<CpuPort>) -> Result<&mut AddressSpace<CpuPort>, MemoryError> {
    let slots = cpu.slot_count();
    cpu.nested_mut(CART_SLOT).ok_or(MemoryError::NoSuchSlot {
        slot: CART_SLOT,
        slots,
    })
}

fn bank_position<P>(ids: &[BankId], slot: &Slot<P>) -> Option<usize> {
    match slot {
        Slot::Bank(id) => ids.iter().position(|b| b == id),
        Slot::Nested(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_prg(pages: usize) -> Vec<u8> {
        (0..pages)
            .flat_map(|p| std::iter::repeat_n(p as u8, PRG_PAGE))
            .collect()
    }

    #[test]
    fn sixteen_k_prg_is_mirrored() {
        let map = MemoryMap::new(&CartridgeImage::new(0, numbered_prg(2), vec![0; 0x2000]))
            .expect("valid map");
        assert_eq!(map.cpu.size(), 0x10000);
        assert_eq!(map.rom_byte(0x8000), Ok(0));
        assert_eq!(map.rom_byte(0xA000), Ok(1));
        assert_eq!(map.rom_byte(0xC000), Ok(0));
        assert_eq!(map.rom_byte(0xFFFF), Ok(1));
    }

    #[test]
    fn internal_ram_mirrors_every_2k() {
        let mut map = MemoryMap::new(&CartridgeImage::new(0, numbered_prg(2), Vec::new()))
            .expect("valid map");
        map.cpu
            .poke(&mut map.banks, 0x0012, 0x5A)
            .expect("in range");
        for mirror in [0x0812, 0x1012, 0x1812] {
            assert_eq!(map.cpu.peek(&map.banks, mirror), Ok(Some(0x5A)));
        }
    }

    #[test]
    fn prg_ram_honours_access_bits() {
        let mut map = MemoryMap::new(&CartridgeImage::new(0, numbered_prg(2), Vec::new()))
            .expect("valid map");
        map.cpu.poke(&mut map.banks, 0x6000, 0x11).expect("in range");
        map.set_prg_ram_access(true, false);
        map.cpu.poke(&mut map.banks, 0x6000, 0x22).expect("in range");
        assert_eq!(map.cpu.peek(&map.banks, 0x6000), Ok(Some(0x11)));
        map.set_prg_ram_access(false, false);
        assert_eq!(map.cpu.peek(&map.banks, 0x6000), Ok(Some(0)));
    }

    #[test]
    fn map_prg_masks_bank_numbers() {
        let mut map = MemoryMap::new(&CartridgeImage::new(1, numbered_prg(8), Vec::new()))
            .expect("valid map");
        map.map_prg(0, 2, 5).expect("valid window");
        assert_eq!(map.prg_window(0), Some(2));
        assert_eq!(map.prg_window(1), Some(3));
        map.map_prg(0, 4, 1).expect("valid window");
        assert_eq!(
            (0..4).map(|w| map.prg_window(w)).collect::<Vec<_>>(),
            vec![Some(4), Some(5), Some(6), Some(7)]
        );
        assert!(map.map_prg(3, 2, 0).is_err());
    }

    #[test]
    fn mirroring_layouts() {
        let mut map = MemoryMap::new(&CartridgeImage::new(0, numbered_prg(2), Vec::new()))
            .expect("valid map");
        assert_eq!(map.nametables(), [Some(0), Some(0), Some(1), Some(1)]);
        map.set_mirroring(Mirroring::Vertical).expect("valid");
        assert_eq!(map.nametables(), [Some(0), Some(1), Some(0), Some(1)]);
        map.set_mirroring(Mirroring::SingleScreenUpper).expect("valid");
        assert_eq!(map.nametables(), [Some(1); 4]);
        assert_eq!(map.mirroring(), Mirroring::SingleScreenUpper);
        map.set_mirroring(Mirroring::SwappedVertical).expect("valid");
        assert_eq!(map.nametables(), [Some(1), Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn nametable_mirror_and_palette_shadow() {
        let mut map = MemoryMap::new(&CartridgeImage::new(0, numbered_prg(2), Vec::new()))
            .expect("valid map");
        map.set_mirroring(Mirroring::Vertical).expect("valid");
        map.ppu.poke(&mut map.banks, 0x2405, 0x77).expect("in range");
        assert_eq!(map.ppu.peek(&map.banks, 0x2C05), Ok(Some(0x77)));
        assert_eq!(map.ppu.peek(&map.banks, 0x3405), Ok(Some(0x77)));
        assert_eq!(
            map.ppu_route_read(0x3F10),
            Ok(Route::Port(PpuPort::Palette, 0x3F10))
        );
        assert_eq!(
            map.ppu_route_read(0x7F10),
            Ok(Route::Port(PpuPort::Palette, 0x3F10))
        );
    }

    #[test]
    fn chr_ram_is_writable_and_chr_rom_is_not() {
        let mut ram = MemoryMap::new(&CartridgeImage::new(0, numbered_prg(2), Vec::new()))
            .expect("valid map");
        assert!(ram.chr_is_ram());
        ram.ppu.poke(&mut ram.banks, 0x1234, 0x99).expect("in range");
        assert_eq!(ram.ppu.peek(&ram.banks, 0x1234), Ok(Some(0x99)));

        let mut rom = MemoryMap::new(&CartridgeImage::new(0, numbered_prg(2), vec![0x42; 0x2000]))
            .expect("valid map");
        rom.ppu.poke(&mut rom.banks, 0x1234, 0x99).expect("in range");
        assert_eq!(rom.ppu.peek(&rom.banks, 0x1234), Ok(Some(0x42)));
    }

    #[test]
    fn misaligned_rom_is_rejected() {
        let err = MemoryMap::new(&CartridgeImage::new(0, vec![0; 0x3000], Vec::new()))
            .expect_err("misaligned");
        assert!(matches!(err, CartridgeError::BankAlignment { .. }));
    }
}
