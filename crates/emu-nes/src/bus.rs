//! NES bus: CPU address routing.
//!
//! Implements `emu_core::Bus` for the NES on top of the cartridge's CPU
//! address space. Internal RAM, PRG-RAM and PRG-ROM are banks in that
//! space; the PPU registers, APU, controllers and the OAM DMA trigger are
//! shadow ports installed here.
//!
//! A routing failure means the memory map itself is broken. The access
//! reads as 0 and the fault is held until the scheduler collects it.

use emu_core::memory::Route;
use emu_core::{Bus, MemoryError};
use nes_cartridge::{CpuPort, Mapper};

use crate::apu::Apu;
use crate::controller::Controller;
use crate::ppu::Ppu;

/// The NES bus, implementing `emu_core::Bus`.
pub struct NesBus {
    pub ppu: Ppu,
    pub apu: Apu,
    pub cartridge: Box<dyn Mapper>,
    /// Controller 1 ($4016).
    pub controller1: Controller,
    /// Controller 2 ($4017 reads).
    pub controller2: Controller,
    /// OAM DMA pending page (set when $4014 is written).
    oam_dma_page: Option<u8>,
    /// CPU cycle stamped on mapper register writes.
    cpu_cycle: u64,
    fault: Option<MemoryError>,
}

impl NesBus {
    /// Wire the I/O ports into the cartridge's CPU space.
    #[must_use]
    pub fn new(mut cartridge: Box<dyn Mapper>, ppu: Ppu, apu: Apu) -> Self {
        let cpu = &mut cartridge.memory_mut().cpu;
        cpu.add_shadow(0x2000, 0x3FFF, CpuPort::Ppu);
        cpu.add_getter(0x4016, 0x4017, CpuPort::Controller);
        cpu.add_getter(0x4000, 0x4015, CpuPort::Apu);
        cpu.add_setter(0x4014, 0x4014, CpuPort::OamDma);
        cpu.add_setter(0x4016, 0x4016, CpuPort::Controller);
        cpu.add_setter(0x4000, 0x4017, CpuPort::Apu);

        Self {
            ppu,
            apu,
            cartridge,
            controller1: Controller::new(),
            controller2: Controller::new(),
            oam_dma_page: None,
            cpu_cycle: 0,
            fault: None,
        }
    }

    /// Read banked memory without side effects. `None` for I/O ports.
    pub fn peek(&self, addr: u16) -> Result<Option<u8>, MemoryError> {
        let memory = self.cartridge.memory();
        memory.cpu.peek(&memory.banks, addr)
    }

    pub(crate) fn set_cpu_cycle(&mut self, cycle: u64) {
        self.cpu_cycle = cycle;
    }

    pub(crate) fn take_oam_dma(&mut self) -> Option<u8> {
        self.oam_dma_page.take()
    }

    pub(crate) fn take_fault(&mut self) -> Option<MemoryError> {
        self.fault.take()
    }

    fn try_read(&mut self, addr: u16) -> Result<u8, MemoryError> {
        let memory = self.cartridge.memory();
        Ok(match memory.cpu.route_read(addr)? {
            Route::Bank(id, offset) => memory.banks.get(id).get_byte(offset),
            Route::Port(CpuPort::Ppu, addr) => self.ppu.cpu_read(addr, memory)?,
            // Upper bits are open bus; $40 is what the last address byte
            // leaves on most boards.
            Route::Port(CpuPort::Controller, 0x4016) => self.controller1.read() | 0x40,
            Route::Port(CpuPort::Controller, _) => self.controller2.read() | 0x40,
            Route::Port(CpuPort::Apu, addr) => self.apu.read(addr),
            Route::Port(CpuPort::OamDma | CpuPort::Mapper, _) => 0,
        })
    }

    fn try_write(&mut self, addr: u16, value: u8) -> Result<(), MemoryError> {
        let route = self.cartridge.memory().cpu.route_write(addr)?;
        match route {
            Route::Bank(id, offset) => {
                self.cartridge
                    .memory_mut()
                    .banks
                    .get_mut(id)
                    .set_byte(offset, value);
            }
            Route::Port(CpuPort::Ppu, addr) => {
                self.ppu.cpu_write(addr, value, self.cartridge.memory_mut())?;
            }
            Route::Port(CpuPort::OamDma, _) => self.oam_dma_page = Some(value),
            Route::Port(CpuPort::Controller, _) => {
                self.controller1.write(value);
                self.controller2.write(value);
            }
            Route::Port(CpuPort::Apu, addr) => self.apu.write(addr, value),
            Route::Port(CpuPort::Mapper, addr) => {
                self.cartridge.write_register(addr, value, self.cpu_cycle)?;
            }
        }
        Ok(())
    }

    fn record(&mut self, err: MemoryError) {
        log::error!("bus fault: {err}");
        self.fault.get_or_insert(err);
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.try_read(addr).unwrap_or_else(|err| {
            self.record(err);
            0
        })
    }

    fn write(&mut self, addr: u16, value: u8) {
        if let Err(err) = self.try_write(addr, value) {
            self.record(err);
        }
    }
}
