//! NES controller (joypad) emulation.
//!
//! The NES controller is a serial shift register accessed via $4016/$4017.
//! Writing bit 0 = 1 to $4016 enables strobe (continuously reloads).
//! Writing bit 0 = 0 latches the current button state.
//! Each read returns one bit and shifts the register right.

/// Standard pad buttons, in shift-out order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NesButton {
    A,
    B,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
}

impl NesButton {
    /// Bit position in the shift register.
    #[must_use]
    pub const fn bit(self) -> u8 {
        self as u8
    }
}

/// NES controller state.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    /// Current button state (bit per button).
    buttons: u8,
    /// Latched shift register.
    shift_register: u8,
    /// Strobe mode: when true, shift register continuously reloads.
    strobe: bool,
}

impl Controller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, button: NesButton, pressed: bool) {
        if pressed {
            self.buttons |= 1 << button.bit();
        } else {
            self.buttons &= !(1 << button.bit());
        }
        if self.strobe {
            self.shift_register = self.buttons;
        }
    }

    /// Read $4016/$4017: bit 0 of the shift register, then shift right.
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            return self.buttons & 1;
        }
        let result = self.shift_register & 1;
        // After all 8 bits are shifted out, reads return 1.
        self.shift_register = (self.shift_register >> 1) | 0x80;
        result
    }

    /// Write $4016: bit 0 controls strobe.
    pub fn write(&mut self, value: u8) {
        let strobe = value & 1 != 0;
        if self.strobe && !strobe {
            self.shift_register = self.buttons;
        }
        self.strobe = strobe;
    }

    /// Current button state byte (for observation).
    #[must_use]
    pub fn buttons(&self) -> u8 {
        self.buttons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_out_buttons_in_order() {
        let mut pad = Controller::new();
        pad.set_button(NesButton::A, true);
        pad.set_button(NesButton::Start, true);
        pad.set_button(NesButton::Right, true);
        pad.write(1);
        pad.write(0);

        let bits: Vec<u8> = (0..8).map(|_| pad.read()).collect();
        assert_eq!(bits, [1, 0, 0, 1, 0, 0, 0, 1]);
        assert_eq!(pad.read(), 1, "reads after the eighth return 1");
    }

    #[test]
    fn strobe_high_always_reports_a() {
        let mut pad = Controller::new();
        pad.write(1);
        assert_eq!(pad.read(), 0);
        pad.set_button(NesButton::A, true);
        assert_eq!(pad.read(), 1);
        assert_eq!(pad.read(), 1);
    }

    #[test]
    fn release_clears_bit() {
        let mut pad = Controller::new();
        pad.set_button(NesButton::B, true);
        pad.set_button(NesButton::B, false);
        assert_eq!(pad.buttons(), 0);
    }
}
