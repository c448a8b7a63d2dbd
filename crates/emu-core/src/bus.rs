//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding and routing to the appropriate device. Every
/// call is one bus cycle: callers that need cycle accuracy must not issue
/// reads or writes the hardware would not.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);
}

/// One recorded bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(u16, u8),
    Write(u16, u8),
}

/// Flat 64 KiB RAM bus for tests.
///
/// Every access is appended to a log so tests can check the exact bus
/// trace an instruction produces.
pub struct SimpleBus {
    memory: Box<[u8; 0x10000]>,
    log: Vec<Access>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: Box::new([0; 0x10000]),
            log: Vec::new(),
        }
    }

    /// Copy `data` into memory starting at `address`, wrapping at $FFFF.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        let mut addr = address;
        for &byte in data {
            self.memory[addr as usize] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    /// Read without recording an access.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    /// Write without recording an access.
    pub fn poke(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
    }

    /// Accesses recorded since the last [`clear_log`](Self::clear_log).
    #[must_use]
    pub fn log(&self) -> &[Access] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> u8 {
        let value = self.memory[address as usize];
        self.log.push(Access::Read(address, value));
        value
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
        self.log.push(Access::Write(address, value));
    }
}
