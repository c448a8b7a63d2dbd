//! NES PPU (2C02), timing level.
//!
//! Steps one dot at a time through 341 dots x 262 scanlines and keeps the
//! externally visible behaviour: the `VBlank` flag and NMI output, the CPU
//! register file at $2000-$2007, VRAM access through the cartridge's PPU
//! address space, OAM, and the address the PPU would drive during
//! rendering fetches. No pixels are produced.
//!
//! ## Scanline layout
//! - 0-239: visible scanlines
//! - 240: post-render (idle)
//! - 241-260: `VBlank`
//! - 261: pre-render

use emu_core::memory::Route;
use emu_core::{InterruptSource, MemoryError, Observable, Value};
use nes_cartridge::{MemoryMap, PpuPort};

pub const DOTS_PER_LINE: u16 = 341;
pub const LINES_PER_FRAME: u16 = 262;
const VBLANK_LINE: u16 = 241;
const PRE_RENDER_LINE: u16 = LINES_PER_FRAME - 1;

const STATUS_VBLANK: u8 = 0x80;
const CTRL_NMI: u8 = 0x80;

/// PPU 2C02.
pub struct Ppu {
    palette: [u8; 32],
    oam: [u8; 256],

    // Registers
    ctrl: u8,
    mask: u8,
    status: u8,
    oam_addr: u8,

    // Loopy scroll/address registers
    v: u16,
    t: u16,
    fine_x: u8,
    w: bool,

    /// Data read buffer ($2007).
    read_buffer: u8,

    scanline: u16,
    dot: u16,
    frame_odd: bool,
    frame: u64,
    cycles: u64,
    /// Address on the PPU bus during the last dot.
    address: u16,

    nmi: InterruptSource,
}

impl Ppu {
    /// A PPU at the start of a frame, driving the CPU's NMI line through
    /// `nmi`.
    #[must_use]
    pub fn new(nmi: InterruptSource) -> Self {
        Self {
            palette: [0; 32],
            oam: [0; 256],
            ctrl: 0,
            mask: 0,
            status: 0,
            oam_addr: 0,
            v: 0,
            t: 0,
            fine_x: 0,
            w: false,
            read_buffer: 0,
            scanline: 0,
            dot: 0,
            frame_odd: false,
            frame: 0,
            cycles: 0,
            address: 0,
            nmi,
        }
    }

    /// One PPU dot.
    pub fn step(&mut self) {
        self.cycles += 1;
        let rendering = self.rendering_enabled();
        self.address = self.fetch_address(rendering);

        match self.scanline {
            0..=239 | PRE_RENDER_LINE => {
                if self.scanline == PRE_RENDER_LINE && self.dot == 1 {
                    // Clear VBlank, sprite 0 hit and overflow.
                    self.status &= 0x1F;
                    self.update_nmi();
                }
                if rendering {
                    self.scroll_step();
                }
            }
            VBLANK_LINE if self.dot == 1 => {
                self.status |= STATUS_VBLANK;
                self.update_nmi();
            }
            _ => {}
        }

        // Odd frames drop the last dot of the pre-render line when
        // rendering.
        if self.scanline == PRE_RENDER_LINE && self.dot == 339 && self.frame_odd && rendering {
            self.dot = 340;
        }

        self.dot += 1;
        if self.dot >= DOTS_PER_LINE {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline > PRE_RENDER_LINE {
                self.scanline = 0;
                self.frame_odd = !self.frame_odd;
                self.frame += 1;
            }
        }
    }

    /// Address the PPU drove during the last dot: pattern, nametable or
    /// (outside rendering) the current VRAM address.
    #[must_use]
    pub fn address_bus(&self) -> u16 {
        self.address
    }

    fn fetch_address(&self, rendering: bool) -> u16 {
        let on_render_line = self.scanline < 240 || self.scanline == PRE_RENDER_LINE;
        if !rendering || !on_render_line {
            return self.v & 0x3FFF;
        }
        let nametable = 0x2000 | (self.v & 0x0FFF);
        let fine_y = (self.v >> 12) & 0x07;
        match self.dot {
            1..=256 | 321..=336 if (self.dot - 1) % 8 >= 4 => {
                (u16::from(self.ctrl & 0x10) << 8) | fine_y
            }
            257..=320 if (self.dot - 257) % 8 >= 4 => self.sprite_table(),
            _ => nametable,
        }
    }

    fn sprite_table(&self) -> u16 {
        if self.ctrl & 0x20 != 0 {
            // 8x16 sprites pick their table per tile; the common layout
            // puts them at $1000.
            0x1000
        } else {
            u16::from(self.ctrl & 0x08) << 9
        }
    }

    fn scroll_step(&mut self) {
        match self.dot {
            1..=255 | 321..=336 if self.dot.is_multiple_of(8) => self.increment_x(),
            256 => {
                self.increment_x();
                self.increment_y();
            }
            257 => self.copy_horizontal(),
            280..=304 if self.scanline == PRE_RENDER_LINE => self.copy_vertical(),
            _ => {}
        }
    }

    // === Scrolling ===

    fn increment_x(&mut self) {
        if self.v & 0x001F == 31 {
            self.v &= !0x001F;
            self.v ^= 0x0400; // Switch horizontal nametable
        } else {
            self.v += 1;
        }
    }

    fn increment_y(&mut self) {
        if self.v & 0x7000 == 0x7000 {
            self.v &= !0x7000;
            let mut coarse_y = (self.v & 0x03E0) >> 5;
            if coarse_y == 29 {
                coarse_y = 0;
                self.v ^= 0x0800; // Switch vertical nametable
            } else if coarse_y == 31 {
                coarse_y = 0;
            } else {
                coarse_y += 1;
            }
            self.v = (self.v & !0x03E0) | (coarse_y << 5);
        } else {
            self.v += 0x1000; // Increment fine Y
        }
    }

    fn copy_horizontal(&mut self) {
        // v: ....A .....EDCBA = t: ....A .....EDCBA
        self.v = (self.v & !0x041F) | (self.t & 0x041F);
    }

    fn copy_vertical(&mut self) {
        // v: GHIA.BC DEF..... = t: GHIA.BC DEF.....
        self.v = (self.v & !0x7BE0) | (self.t & 0x7BE0);
    }

    // === Register access (CPU side) ===

    /// CPU read from a PPU register ($2000-$2007 mirrored).
    pub fn cpu_read(&mut self, reg: u16, map: &MemoryMap) -> Result<u8, MemoryError> {
        Ok(match reg & 0x07 {
            // $2002 - PPUSTATUS
            2 => {
                let result = (self.status & 0xE0) | (self.read_buffer & 0x1F);
                self.status &= !STATUS_VBLANK;
                self.update_nmi();
                self.w = false;
                result
            }
            // $2004 - OAMDATA
            4 => self.oam[usize::from(self.oam_addr)],
            // $2007 - PPUDATA
            7 => {
                let addr = self.v & 0x3FFF;
                let result = if addr >= 0x3F00 {
                    // Palette reads bypass the buffer; the buffer gets the
                    // nametable byte underneath.
                    self.read_buffer = self.vram_read(map, addr & 0x2FFF)?;
                    self.vram_read(map, addr)?
                } else {
                    let buffered = self.read_buffer;
                    self.read_buffer = self.vram_read(map, addr)?;
                    buffered
                };
                self.increment_vram_addr();
                result
            }
            _ => 0, // Write-only registers
        })
    }

    /// CPU write to a PPU register ($2000-$2007 mirrored).
    pub fn cpu_write(&mut self, reg: u16, value: u8, map: &mut MemoryMap) -> Result<(), MemoryError> {
        match reg & 0x07 {
            // $2000 - PPUCTRL
            0 => {
                self.ctrl = value;
                self.t = (self.t & !0x0C00) | (u16::from(value & 0x03) << 10);
                self.update_nmi();
            }
            // $2001 - PPUMASK
            1 => self.mask = value,
            // $2003 - OAMADDR
            3 => self.oam_addr = value,
            // $2004 - OAMDATA
            4 => {
                self.oam[usize::from(self.oam_addr)] = value;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            // $2005 - PPUSCROLL
            5 => {
                if self.w {
                    self.t = (self.t & !0x73E0)
                        | (u16::from(value & 0x07) << 12)
                        | (u16::from(value >> 3) << 5);
                } else {
                    self.t = (self.t & !0x001F) | (u16::from(value) >> 3);
                    self.fine_x = value & 0x07;
                }
                self.w = !self.w;
            }
            // $2006 - PPUADDR
            6 => {
                if self.w {
                    self.t = (self.t & 0xFF00) | u16::from(value);
                    self.v = self.t;
                } else {
                    self.t = (self.t & 0x00FF) | (u16::from(value & 0x3F) << 8);
                }
                self.w = !self.w;
            }
            // $2007 - PPUDATA
            7 => {
                self.vram_write(map, self.v & 0x3FFF, value)?;
                self.increment_vram_addr();
            }
            _ => {}
        }
        Ok(())
    }

    // === PPU memory access ===

    fn vram_read(&self, map: &MemoryMap, addr: u16) -> Result<u8, MemoryError> {
        Ok(match map.ppu_route_read(addr)? {
            Route::Bank(id, offset) => map.banks.get(id).get_byte(offset),
            Route::Port(PpuPort::Palette, addr) => self.palette[palette_index(addr)],
        })
    }

    fn vram_write(&mut self, map: &mut MemoryMap, addr: u16, value: u8) -> Result<(), MemoryError> {
        match map.ppu_route_write(addr)? {
            Route::Bank(id, offset) => map.banks.get_mut(id).set_byte(offset, value),
            Route::Port(PpuPort::Palette, addr) => {
                self.palette[palette_index(addr)] = value & 0x3F;
            }
        }
        Ok(())
    }

    fn increment_vram_addr(&mut self) {
        let step = if self.ctrl & 0x04 != 0 { 32 } else { 1 };
        self.v = self.v.wrapping_add(step) & 0x7FFF;
    }

    fn rendering_enabled(&self) -> bool {
        self.mask & 0x18 != 0
    }

    fn update_nmi(&mut self) {
        self.nmi
            .set(self.status & STATUS_VBLANK != 0 && self.ctrl & CTRL_NMI != 0);
    }

    // === Observation ===

    #[must_use]
    pub fn oam(&self) -> &[u8; 256] {
        &self.oam
    }

    #[must_use]
    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    #[must_use]
    pub fn dot(&self) -> u16 {
        self.dot
    }

    /// Completed frames.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Dots executed since power-on.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub fn in_vblank(&self) -> bool {
        self.status & STATUS_VBLANK != 0
    }
}

impl Observable for Ppu {
    fn query(&self, path: &str) -> Option<Value> {
        let value = match path {
            "scanline" => self.scanline.into(),
            "dot" => self.dot.into(),
            "frame" => self.frame.into(),
            "ctrl" => self.ctrl.into(),
            "mask" => self.mask.into(),
            "status" => self.status.into(),
            "oam_addr" => self.oam_addr.into(),
            "v" => self.v.into(),
            "t" => self.t.into(),
            "fine_x" => self.fine_x.into(),
            "vblank" => self.in_vblank().into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> Vec<String> {
        [
            "scanline", "dot", "frame", "ctrl", "mask", "status", "oam_addr", "v", "t", "fine_x",
            "vblank",
        ]
        .iter()
        .map(ToString::to_string)
        .collect()
    }
}

/// Palette RAM index for a $3F00-$3FFF address. Entries $10/$14/$18/$1C
/// mirror $00/$04/$08/$0C.
fn palette_index(addr: u16) -> usize {
    let index = usize::from(addr & 0x1F);
    if index & 0x13 == 0x10 {
        index & 0x0F
    } else {
        index
    }
}
