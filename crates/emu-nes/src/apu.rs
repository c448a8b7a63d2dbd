//! NES APU (2A03 audio), timing level.
//!
//! Keeps the parts of the APU that the CPU can observe: register latches,
//! the length counters reported by $4015, and the frame sequencer with its
//! IRQ. No samples are generated.
//!
//! The frame counter divides CPU cycles into quarter-frame and half-frame
//! events. In 4-step mode the last step raises the frame IRQ unless
//! inhibited by $4017 bit 6.

use emu_core::{InterruptSource, Observable, Value};

/// Length counter load values, indexed by the top 5 bits of the register write.
const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96,
    22, 192, 24, 72, 26, 16, 28, 32, 30,
];

// NTSC frame counter step boundaries (CPU cycles).
const FOUR_STEP_SEQUENCE: [u16; 4] = [7457, 14913, 22371, 29829];
const FIVE_STEP_SEQUENCE: [u16; 5] = [7457, 14913, 22371, 29829, 37281];

/// Length counter: counts down at half-frame rate.
#[derive(Debug, Default, Clone)]
struct LengthCounter {
    counter: u8,
    halt: bool,
    enabled: bool,
}

impl LengthCounter {
    fn clock(&mut self) {
        if !self.halt && self.counter > 0 {
            self.counter -= 1;
        }
    }

    fn active(&self) -> bool {
        self.counter > 0
    }

    fn load(&mut self, index: u8) {
        if self.enabled {
            self.counter = LENGTH_TABLE[usize::from(index)];
        }
    }

    /// Disabling clears the counter.
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.counter = 0;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameCounterMode {
    FourStep,
    FiveStep,
}

/// NES APU.
pub struct Apu {
    /// $4000-$4013 as last written.
    registers: [u8; 0x14],
    /// Pulse 1, pulse 2, triangle, noise.
    lengths: [LengthCounter; 4],
    /// DMC enable bit from $4015.
    dmc_enabled: bool,

    frame_mode: FrameCounterMode,
    frame_counter: u16,
    frame_step: u8,
    frame_irq_inhibit: bool,
    frame_irq_flag: bool,
    irq: InterruptSource,
}

impl Apu {
    #[must_use]
    pub fn new(irq: InterruptSource) -> Self {
        Self {
            registers: [0; 0x14],
            lengths: Default::default(),
            dmc_enabled: false,
            frame_mode: FrameCounterMode::FourStep,
            frame_counter: 0,
            frame_step: 0,
            frame_irq_inhibit: false,
            frame_irq_flag: false,
            irq,
        }
    }

    /// Read an APU register. Only $4015 is readable.
    pub fn read(&mut self, addr: u16) -> u8 {
        if addr != 0x4015 {
            return 0;
        }
        let mut status = 0u8;
        for (bit, length) in self.lengths.iter().enumerate() {
            if length.active() {
                status |= 1 << bit;
            }
        }
        if self.frame_irq_flag {
            status |= 0x40;
        }
        // Reading $4015 acknowledges the frame IRQ.
        self.set_frame_irq(false);
        status
    }

    /// Write an APU register ($4000-$4013, $4015, $4017).
    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000..=0x4013 => {
                self.registers[usize::from(addr - 0x4000)] = value;
                match addr {
                    // Length counter halt: bit 5 (bit 7 for the triangle).
                    0x4000 => self.lengths[0].halt = value & 0x20 != 0,
                    0x4004 => self.lengths[1].halt = value & 0x20 != 0,
                    0x4008 => self.lengths[2].halt = value & 0x80 != 0,
                    0x400C => self.lengths[3].halt = value & 0x20 != 0,
                    // Length counter load: top 5 bits.
                    0x4003 => self.lengths[0].load(value >> 3),
                    0x4007 => self.lengths[1].load(value >> 3),
                    0x400B => self.lengths[2].load(value >> 3),
                    0x400F => self.lengths[3].load(value >> 3),
                    _ => {}
                }
            }
            0x4015 => {
                for (bit, length) in self.lengths.iter_mut().enumerate() {
                    length.set_enabled(value & (1 << bit) != 0);
                }
                self.dmc_enabled = value & 0x10 != 0;
            }
            0x4017 => {
                self.frame_mode = if value & 0x80 != 0 {
                    FrameCounterMode::FiveStep
                } else {
                    FrameCounterMode::FourStep
                };
                self.frame_irq_inhibit = value & 0x40 != 0;
                if self.frame_irq_inhibit {
                    self.set_frame_irq(false);
                }
                self.frame_counter = 0;
                self.frame_step = 0;
                // 5-step mode clocks immediately.
                if self.frame_mode == FrameCounterMode::FiveStep {
                    self.clock_half_frame();
                }
            }
            _ => {}
        }
    }

    /// Tick the APU one CPU cycle.
    pub fn step(&mut self) {
        self.frame_counter += 1;

        match self.frame_mode {
            FrameCounterMode::FourStep => {
                if self.frame_counter >= FOUR_STEP_SEQUENCE[usize::from(self.frame_step)] {
                    match self.frame_step {
                        1 => self.clock_half_frame(),
                        3 => {
                            self.clock_half_frame();
                            if !self.frame_irq_inhibit {
                                self.set_frame_irq(true);
                            }
                            self.frame_counter = 0;
                        }
                        _ => {}
                    }
                    self.frame_step = (self.frame_step + 1) % 4;
                }
            }
            FrameCounterMode::FiveStep => {
                if self.frame_counter >= FIVE_STEP_SEQUENCE[usize::from(self.frame_step)] {
                    match self.frame_step {
                        1 => self.clock_half_frame(),
                        4 => {
                            self.clock_half_frame();
                            self.frame_counter = 0;
                        }
                        _ => {}
                    }
                    self.frame_step = (self.frame_step + 1) % 5;
                }
            }
        }
    }

    /// Half-frame: clock length counters.
    fn clock_half_frame(&mut self) {
        for length in &mut self.lengths {
            length.clock();
        }
    }

    fn set_frame_irq(&mut self, raised: bool) {
        if raised != self.frame_irq_flag {
            log::trace!("APU frame IRQ {}", if raised { "raised" } else { "cleared" });
        }
        self.frame_irq_flag = raised;
        self.irq.set(raised);
    }

    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.frame_irq_flag
    }
}

impl Observable for Apu {
    fn query(&self, path: &str) -> Option<Value> {
        let length = |i: usize| Some(Value::from(self.lengths[i].counter));
        match path {
            "pulse1.length" => length(0),
            "pulse2.length" => length(1),
            "triangle.length" => length(2),
            "noise.length" => length(3),
            "dmc.enabled" => Some(self.dmc_enabled.into()),
            "frame_counter.mode" => {
                let mode: u8 = match self.frame_mode {
                    FrameCounterMode::FourStep => 0,
                    FrameCounterMode::FiveStep => 1,
                };
                Some(mode.into())
            }
            "frame_counter.irq" => Some(self.frame_irq_flag.into()),
            _ => path
                .strip_prefix("reg.")
                .and_then(|hex| u16::from_str_radix(hex.trim_start_matches('$'), 16).ok())
                .and_then(|addr| addr.checked_sub(0x4000))
                .and_then(|offset| self.registers.get(usize::from(offset)))
                .map(|&value| value.into()),
        }
    }

    fn query_paths(&self) -> Vec<String> {
        [
            "pulse1.length",
            "pulse2.length",
            "triangle.length",
            "noise.length",
            "dmc.enabled",
            "frame_counter.mode",
            "frame_counter.irq",
            "reg.<$4000-$4013>",
        ]
        .iter()
        .map(ToString::to_string)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::InterruptLine;

    fn apu() -> (Apu, InterruptLine) {
        let line = InterruptLine::new();
        (Apu::new(line.source()), line)
    }

    #[test]
    fn status_register_reflects_length() {
        let (mut apu, _line) = apu();

        // Enable pulse 1 and triangle
        apu.write(0x4015, 0x05);
        apu.write(0x4003, 0x01 << 3); // length index 1 = 254
        apu.write(0x4008, 0xFF);
        apu.write(0x400B, 0x01 << 3);

        let status = apu.read(0x4015);
        assert!(status & 0x01 != 0, "Pulse 1 length should be active");
        assert!(status & 0x04 != 0, "Triangle length should be active");
        assert!(status & 0x02 == 0, "Pulse 2 length should be inactive");
        assert!(status & 0x08 == 0, "Noise length should be inactive");
        assert_eq!(apu.query("triangle.length"), Some(Value::U8(254)));
    }

    #[test]
    fn disable_channel_clears_length() {
        let (mut apu, _line) = apu();
        apu.write(0x4015, 0x01);
        apu.write(0x4003, 0x01 << 3);
        assert!(apu.read(0x4015) & 0x01 != 0);

        apu.write(0x4015, 0x00);
        assert!(apu.read(0x4015) & 0x01 == 0, "Length should be cleared");
    }

    #[test]
    fn frame_irq_in_four_step_mode() {
        let (mut apu, line) = apu();
        apu.write(0x4017, 0x00);

        for _ in 0..29828 {
            apu.step();
        }
        assert!(!line.is_asserted());
        apu.step();
        assert!(apu.irq_pending());
        assert!(line.is_asserted());

        // $4015 read reports and acknowledges.
        assert_eq!(apu.read(0x4015) & 0x40, 0x40);
        assert!(!line.is_asserted());
        assert_eq!(apu.read(0x4015) & 0x40, 0);
    }

    #[test]
    fn inhibit_blocks_and_clears_frame_irq() {
        let (mut apu, line) = apu();
        for _ in 0..29829 {
            apu.step();
        }
        assert!(line.is_asserted());
        apu.write(0x4017, 0x40);
        assert!(!line.is_asserted());

        for _ in 0..40_000 {
            apu.step();
        }
        assert!(!line.is_asserted());
    }

    #[test]
    fn no_irq_in_five_step_mode() {
        let (mut apu, line) = apu();
        apu.write(0x4017, 0x80);
        for _ in 0..40_000 {
            apu.step();
        }
        assert!(!apu.irq_pending());
        assert!(!line.is_asserted());
    }

    #[test]
    fn halt_flag_freezes_length() {
        let (mut apu, _line) = apu();
        apu.write(0x4015, 0x01);
        apu.write(0x4000, 0x20);
        apu.write(0x4003, 0x18); // index 3 = 2
        apu.write(0x4017, 0x80); // immediate half-frame clock
        assert_eq!(apu.query("pulse1.length"), Some(Value::U8(2)));

        apu.write(0x4000, 0x00);
        apu.write(0x4017, 0x80);
        assert_eq!(apu.query("pulse1.length"), Some(Value::U8(1)));
    }

    #[test]
    fn register_latches_are_queryable() {
        let (mut apu, _line) = apu();
        apu.write(0x4002, 0xFD);
        assert_eq!(apu.query("reg.$4002"), Some(Value::U8(0xFD)));
        assert_eq!(apu.query("reg.4020"), None);
    }
}
