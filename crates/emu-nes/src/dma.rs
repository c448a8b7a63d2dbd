//! OAM DMA.
//!
//! A write to $4014 copies page `$XX00-$XXFF` to the PPU's OAM data port.
//! While the copy runs the CPU is stalled: each CPU cycle either reads a
//! source byte or writes the previous one to $2004. A transfer that starts
//! on an odd CPU cycle spends one extra cycle aligning first.

use emu_core::Bus;

const OAM_DATA: u16 = 0x2004;

#[derive(Debug, Default, Clone)]
pub struct OamDma {
    page: u8,
    /// Next source byte to read.
    index: u16,
    remaining: u16,
    /// An alignment cycle is still owed.
    align: bool,
    /// A byte has been read and is waiting to be written.
    holding: Option<u8>,
}

impl OamDma {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin copying `page`. `odd_cycle` is the parity of the CPU cycle the
    /// transfer starts on.
    pub fn start(&mut self, page: u8, odd_cycle: bool) {
        self.page = page;
        self.index = 0;
        self.align = odd_cycle;
        self.holding = None;
        self.remaining = 512 + u16::from(odd_cycle);
        log::trace!(
            "OAM DMA from ${page:02X}00, {} cycles",
            self.remaining
        );
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Cycles left in the stall.
    #[must_use]
    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    /// One stalled CPU cycle.
    pub fn step<B: Bus>(&mut self, bus: &mut B) {
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;

        if self.align {
            self.align = false;
        } else if let Some(value) = self.holding.take() {
            bus.write(OAM_DATA, value);
        } else {
            let addr = (u16::from(self.page) << 8) | self.index;
            self.holding = Some(bus.read(addr));
            self.index += 1;
        }
    }
}
