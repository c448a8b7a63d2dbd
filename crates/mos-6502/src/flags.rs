//! Processor status register (P).
//!
//! Only the six real flags are stored. The break bit and the always-one bit
//! exist solely in the byte pushed to the stack.

/// Carry.
pub const C: u8 = 0x01;
/// Zero.
pub const Z: u8 = 0x02;
/// Interrupt disable. Masks IRQ, never NMI.
pub const I: u8 = 0x04;
/// Decimal mode. Stored and pushed, but the 2A03 has no BCD unit.
pub const D: u8 = 0x08;
/// Break. Only meaningful in a pushed status byte.
pub const B: u8 = 0x10;
/// Unused. Always 1 in a pushed status byte.
pub const U: u8 = 0x20;
/// Overflow.
pub const V: u8 = 0x40;
/// Negative.
pub const N: u8 = 0x80;

const STORED: u8 = C | Z | I | D | V | N;

/// Processor status register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(u8);

impl Status {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Status restored from a stack byte (PLP, RTI). B and U are dropped.
    #[must_use]
    pub const fn from_pulled(value: u8) -> Self {
        Self(value & STORED)
    }

    /// The byte PHP/BRK push (`brk == true`) or IRQ/NMI push (`brk == false`).
    #[must_use]
    pub const fn to_pushed(self, brk: bool) -> u8 {
        if brk { self.0 | U | B } else { self.0 | U }
    }

    /// Flags as they would read if pushed by an interrupt.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.to_pushed(false)
    }

    #[must_use]
    pub const fn is_set(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u8) {
        self.0 |= flag & STORED;
    }

    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    pub fn set_if(&mut self, flag: u8, condition: bool) {
        if condition {
            self.set(flag);
        } else {
            self.clear(flag);
        }
    }

    /// Update N and Z from a result.
    pub fn update_nz(&mut self, value: u8) {
        self.set_if(N, value & 0x80 != 0);
        self.set_if(Z, value == 0);
    }
}
