//! Cycle-stepped Ricoh 2A03 CPU core.
//!
//! The 2A03 is an NMOS 6502 with the decimal-mode adder disconnected. Each
//! `tick()` performs exactly one bus access, so reads and writes land on
//! the same cycle they would on hardware. The common undocumented opcodes
//! are emulated; JAM and the unstable ones halt the core with an error.

mod alu;
mod cpu;
mod decode;
mod error;
pub mod flags;
mod registers;

pub use cpu::{Interrupt, Mos6502};
pub use decode::{Instruction, Mode, decode};
pub use error::CpuError;
pub use flags::Status;
pub use registers::Registers;
