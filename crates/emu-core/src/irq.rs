//! Shared interrupt lines.
//!
//! A line is a signed counter: each asserting source decrements it once and
//! increments it again when acknowledged. The line is asserted while the
//! counter is negative, so independent sources can hold it low together
//! without one source's acknowledgement cancelling another's request.

use std::cell::Cell;
use std::rc::Rc;

/// An interrupt input (IRQ or NMI) owned by the CPU.
#[derive(Debug, Clone, Default)]
pub struct InterruptLine {
    level: Rc<Cell<i32>>,
}

impl InterruptLine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while at least one source holds the line.
    #[must_use]
    pub fn is_asserted(&self) -> bool {
        self.level.get() < 0
    }

    /// Raw counter value, for inspection.
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level.get()
    }

    /// Create a new independent source driving this line.
    #[must_use]
    pub fn source(&self) -> InterruptSource {
        InterruptSource {
            level: Rc::clone(&self.level),
            requested: false,
        }
    }
}

/// One producer's handle on an [`InterruptLine`].
///
/// Each handle remembers whether it is currently asserting, and only
/// touches the shared counter on its own transitions.
#[derive(Debug)]
pub struct InterruptSource {
    level: Rc<Cell<i32>>,
    requested: bool,
}

impl InterruptSource {
    /// Assert the line. Idempotent while already requested.
    pub fn request(&mut self) {
        if !self.requested {
            self.requested = true;
            self.level.set(self.level.get() - 1);
        }
    }

    /// Release the line. Idempotent while not requested.
    pub fn ack(&mut self) {
        if self.requested {
            self.requested = false;
            self.level.set(self.level.get() + 1);
        }
    }

    /// Drive the line to match `asserted`.
    pub fn set(&mut self, asserted: bool) {
        if asserted {
            self.request();
        } else {
            self.ack();
        }
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested
    }
}

impl Drop for InterruptSource {
    fn drop(&mut self) {
        self.ack();
    }
}
