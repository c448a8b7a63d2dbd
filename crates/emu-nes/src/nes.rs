//! Top-level NES system.
//!
//! The master clock ticks at 21,477,272 Hz (NTSC crystal). Components
//! derive their timing from this:
//! - PPU: crystal / 4 = 5,369,318 Hz (steps when `master_clock` % 4 == 0)
//! - CPU: crystal / 12 = 1,789,773 Hz (steps when `master_clock` % 12 == 0)
//!
//! One frame = 341 PPU dots x 262 scanlines = 89,342 PPU cycles.
//! In crystal ticks: 89,342 x 4 = 357,368.
//!
//! Each PPU step is followed by the mapper's view of the PPU address bus
//! and an NMI sample. An NMI edge seen on the PPU step that shares a
//! sub-cycle with the CPU is acted on at once, ahead of the CPU's own
//! poll. While OAM DMA runs, the CPU slot goes to the DMA unit instead.

use emu_core::{Observable, Value};
use mos_6502::Mos6502;
use nes_cartridge::{CartridgeImage, TvSystem, create, parse_ines};

use crate::apu::Apu;
use crate::bus::NesBus;
use crate::config::{NesConfig, NesRegion};
use crate::controller::NesButton;
use crate::dma::OamDma;
use crate::ppu::Ppu;
use crate::NesError;

/// Crystal divisors.
const PPU_DIVISOR: u64 = 4;
const CPU_DIVISOR: u64 = 12;

/// NES system.
pub struct Nes {
    cpu: Mos6502,
    bus: NesBus,
    dma: OamDma,
    /// Master clock: counts crystal ticks.
    master_clock: u64,
    /// CPU slots elapsed, including those given to DMA.
    cpu_cycle: u64,
}

impl Nes {
    /// Create a new NES from the given configuration.
    pub fn new(config: &NesConfig) -> Result<Self, NesError> {
        let image = parse_ines(&config.rom_data)?;
        let supported = config.region == NesRegion::Ntsc
            && matches!(image.tv_system, TvSystem::Ntsc | TvSystem::Multi);
        if !supported {
            return Err(NesError::UnsupportedRegion {
                region: config.region,
                cartridge: image.tv_system,
            });
        }
        Self::from_image(&image)
    }

    /// Create a new NES from a parsed cartridge. The CPU starts in its
    /// reset sequence.
    pub fn from_image(image: &CartridgeImage) -> Result<Self, NesError> {
        let mut cpu = Mos6502::new();
        let cartridge = create(image, cpu.irq_source())?;
        let ppu = Ppu::new(cpu.nmi_source());
        let apu = Apu::new(cpu.irq_source());
        let bus = NesBus::new(cartridge, ppu, apu);
        cpu.reset();

        Ok(Self {
            cpu,
            bus,
            dma: OamDma::new(),
            master_clock: 0,
            cpu_cycle: 0,
        })
    }

    /// Advance the master clock by one crystal tick.
    pub fn tick(&mut self) -> Result<(), NesError> {
        let phase = self.master_clock % CPU_DIVISOR;
        if phase.is_multiple_of(PPU_DIVISOR) {
            self.step_ppu(phase == 0);
        }
        if phase == 0 {
            self.step_cpu()?;
        }
        self.master_clock += 1;
        Ok(())
    }

    /// Advance one CPU cycle (twelve crystal ticks).
    pub fn step(&mut self) -> Result<(), NesError> {
        for _ in 0..CPU_DIVISOR {
            self.tick()?;
        }
        Ok(())
    }

    /// Step until the current instruction (and any DMA stall) completes.
    pub fn step_instruction(&mut self) -> Result<(), NesError> {
        loop {
            self.step()?;
            if self.cpu.is_instruction_complete() && !self.dma.is_active() {
                return Ok(());
            }
        }
    }

    /// Step until the PPU finishes the current frame.
    pub fn run_frame(&mut self) -> Result<(), NesError> {
        let frame = self.bus.ppu.frame();
        while self.bus.ppu.frame() == frame {
            self.step()?;
        }
        Ok(())
    }

    fn step_ppu(&mut self, cpu_phase: bool) {
        self.bus.ppu.step();
        let addr = self.bus.ppu.address_bus();
        let ppu_cycle = self.bus.ppu.cycles();
        self.bus.cartridge.observe_ppu_address(addr, ppu_cycle);

        if self.cpu.sample_nmi() && cpu_phase {
            self.cpu.detect_interrupts();
        }
    }

    fn step_cpu(&mut self) -> Result<(), NesError> {
        self.bus.set_cpu_cycle(self.cpu_cycle);
        if let Some(page) = self.bus.take_oam_dma() {
            self.dma.start(page, !self.cpu_cycle.is_multiple_of(2));
        }

        if self.dma.is_active() {
            self.dma.step(&mut self.bus);
        } else {
            self.cpu.tick(&mut self.bus)?;
        }
        if let Some(fault) = self.bus.take_fault() {
            return Err(fault.into());
        }

        self.bus.apu.step();
        self.cpu_cycle += 1;
        Ok(())
    }

    /// Press or release a button on controller 1.
    pub fn set_button(&mut self, button: NesButton, pressed: bool) {
        self.bus.controller1.set_button(button, pressed);
    }

    /// Press or release a button on controller 2.
    pub fn set_button_p2(&mut self, button: NesButton, pressed: bool) {
        self.bus.controller2.set_button(button, pressed);
    }

    /// Reference to the CPU.
    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    /// Mutable reference to the CPU.
    pub fn cpu_mut(&mut self) -> &mut Mos6502 {
        &mut self.cpu
    }

    /// Reference to the bus.
    #[must_use]
    pub fn bus(&self) -> &NesBus {
        &self.bus
    }

    /// Mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut NesBus {
        &mut self.bus
    }

    /// Master clock tick count (crystal ticks).
    #[must_use]
    pub fn master_clock(&self) -> u64 {
        self.master_clock
    }

    /// CPU cycles elapsed, including DMA stalls.
    #[must_use]
    pub fn cpu_cycles(&self) -> u64 {
        self.cpu_cycle
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.bus.ppu.frame()
    }

    #[must_use]
    pub fn dma_active(&self) -> bool {
        self.dma.is_active()
    }

    /// A read-only inspection handle over the whole system.
    #[must_use]
    pub fn debugger(&self) -> Debugger<'_> {
        Debugger { nes: self }
    }
}

/// Inspection handle returned by [`Nes::debugger`]. Queries never change
/// emulation state.
pub struct Debugger<'a> {
    nes: &'a Nes,
}

impl Debugger<'_> {
    /// Read banked memory at `addr`. `None` for I/O ports, which cannot be
    /// read without side effects.
    #[must_use]
    pub fn peek(&self, addr: u16) -> Option<u8> {
        self.nes.bus.peek(addr).ok().flatten()
    }
}

impl Observable for Debugger<'_> {
    fn query(&self, path: &str) -> Option<Value> {
        let nes = self.nes;
        if let Some(rest) = path.strip_prefix("cpu.") {
            nes.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("ppu.") {
            nes.bus.ppu.query(rest)
        } else if let Some(rest) = path.strip_prefix("apu.") {
            nes.bus.apu.query(rest)
        } else if let Some(rest) = path.strip_prefix("mapper.") {
            let cartridge = &nes.bus.cartridge;
            match rest {
                "name" => Some(cartridge.name().into()),
                "mirroring" => Some(format!("{:?}", cartridge.mirroring()).into()),
                _ => cartridge
                    .registers()
                    .into_iter()
                    .find(|(name, _)| *name == rest)
                    .map(|(_, value)| value),
            }
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest)
                .and_then(|addr| self.peek(addr))
                .map(Value::U8)
        } else {
            match path {
                "master_clock" => Some(nes.master_clock.into()),
                "cpu_cycle" => Some(nes.cpu_cycle.into()),
                "frame_count" => Some(nes.frame_count().into()),
                "dma.active" => Some(nes.dma.is_active().into()),
                "dma.remaining" => Some(nes.dma.remaining().into()),
                "controller1" => Some(nes.bus.controller1.buttons().into()),
                "controller2" => Some(nes.bus.controller2.buttons().into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> Vec<String> {
        let nes = self.nes;
        let prefixed = |prefix: &str, paths: Vec<String>| {
            paths
                .into_iter()
                .map(|path| format!("{prefix}.{path}"))
                .collect::<Vec<_>>()
        };

        let mut paths = prefixed("cpu", nes.cpu.query_paths());
        paths.extend(prefixed("ppu", nes.bus.ppu.query_paths()));
        paths.extend(prefixed("apu", nes.bus.apu.query_paths()));
        paths.push("mapper.name".to_string());
        paths.push("mapper.mirroring".to_string());
        paths.extend(
            nes.bus
                .cartridge
                .registers()
                .into_iter()
                .map(|(name, _)| format!("mapper.{name}")),
        );
        paths.extend(
            [
                "memory.<address>",
                "master_clock",
                "cpu_cycle",
                "frame_count",
                "dma.active",
                "dma.remaining",
                "controller1",
                "controller2",
            ]
            .iter()
            .map(ToString::to_string),
        );
        paths
    }
}

/// Parse `0x1234`, `$1234` or decimal.
fn parse_address(text: &str) -> Option<u16> {
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'))
    {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::Bus;

    /// 32K NROM with `program` at $8000 and the reset vector pointing at it.
    fn make_nes(program: &[u8]) -> Nes {
        let mut prg = vec![0xEA; 0x8000];
        prg[..program.len()].copy_from_slice(program);
        prg[0x7FFC] = 0x00;
        prg[0x7FFD] = 0x80;
        Nes::from_image(&CartridgeImage::new(0, prg, vec![0; 0x2000])).expect("valid image")
    }

    fn run_cycles(nes: &mut Nes, cycles: u64) {
        for _ in 0..cycles {
            nes.step().expect("running");
        }
    }

    #[test]
    fn master_clock_advances() {
        let mut nes = make_nes(&[]);
        assert_eq!(nes.master_clock(), 0);
        nes.tick().expect("running");
        assert_eq!(nes.master_clock(), 1);
        assert_eq!(nes.cpu_cycles(), 1);
        nes.step().expect("running");
        assert_eq!(nes.master_clock(), 13);
        assert_eq!(nes.cpu_cycles(), 2);
    }

    #[test]
    fn three_ppu_dots_per_cpu_cycle() {
        let mut nes = make_nes(&[]);
        run_cycles(&mut nes, 100);
        assert_eq!(nes.bus().ppu.cycles(), 300);
    }

    #[test]
    fn reset_sequence_reaches_vector() {
        let mut nes = make_nes(&[]);
        run_cycles(&mut nes, 7);
        assert_eq!(nes.cpu().pc(), 0x8000);
        assert!(nes.cpu().is_instruction_complete());
    }

    #[test]
    fn run_frame_covers_one_frame_of_ticks() {
        let mut nes = make_nes(&[]);
        nes.run_frame().expect("running");
        assert_eq!(nes.frame_count(), 1);
        // 89,342 dots is 29,780.67 CPU cycles; stepping stops at the first
        // whole CPU cycle past the frame boundary.
        assert_eq!(nes.cpu_cycles(), 29_781);
    }

    #[test]
    fn oam_dma_stalls_the_cpu() {
        // LDA #$02 ; STA $4014 ; NOP
        let mut nes = make_nes(&[0xA9, 0x02, 0x8D, 0x14, 0x40, 0xEA]);
        for i in 0..=255u8 {
            nes.bus_mut().write(0x0200 + u16::from(i), !i);
        }
        run_cycles(&mut nes, 7);
        nes.step_instruction().expect("LDA");
        nes.step_instruction().expect("STA");
        assert!(!nes.dma_active());

        let start = nes.cpu_cycles();
        let odd = !start.is_multiple_of(2);
        nes.step().expect("running");
        assert!(nes.dma_active());
        let pc = nes.cpu().pc();
        while nes.dma_active() {
            assert_eq!(nes.cpu().pc(), pc, "CPU is suspended");
            nes.step().expect("running");
        }
        assert_eq!(nes.cpu_cycles() - start, if odd { 513 } else { 512 });
        assert_eq!(nes.bus().ppu.oam()[0], 0xFF);
        assert_eq!(nes.bus().ppu.oam()[0x80], 0x7F);
        assert_eq!(nes.bus().ppu.oam()[0xFF], 0x00);
    }

    #[test]
    fn unimplemented_opcode_halts_with_error() {
        let mut nes = make_nes(&[0x02]);
        run_cycles(&mut nes, 7);
        let err = nes.step().expect_err("JAM halts");
        assert!(matches!(err, NesError::Cpu(_)));
        assert!(nes.step().is_err(), "stays halted");
    }

    #[test]
    fn debugger_reads_state_without_side_effects() {
        let mut nes = make_nes(&[]);
        run_cycles(&mut nes, 7);
        let debugger = nes.debugger();
        assert_eq!(debugger.query("cpu.pc"), Some(Value::U16(0x8000)));
        assert_eq!(debugger.query("mapper.name"), Some(Value::from("NROM")));
        assert_eq!(debugger.query("memory.$FFFD"), Some(Value::U8(0x80)));
        assert_eq!(debugger.query("memory.0x2002"), None);
        assert_eq!(debugger.query("cpu_cycle"), Some(Value::U64(7)));
        assert!(
            debugger
                .query_paths()
                .iter()
                .any(|path| path == "ppu.scanline")
        );
    }

    #[test]
    fn parse_address_formats() {
        assert_eq!(parse_address("0x6000"), Some(0x6000));
        assert_eq!(parse_address("$C000"), Some(0xC000));
        assert_eq!(parse_address("256"), Some(256));
        assert_eq!(parse_address("zz"), None);
    }
}
