//! Cycle-accurate NES core.
//!
//! The NES master clock ticks at 21,477,272 Hz (NTSC crystal). The PPU
//! ticks at crystal/4 (5,369,318 Hz) and the CPU at crystal/12
//! (1,789,773 Hz), giving a 3:1 PPU:CPU ratio.
//!
//! One frame = 341 PPU dots × 262 scanlines = 89,342 PPU cycles.

mod apu;
mod bus;
mod config;
mod controller;
mod dma;
mod error;
mod nes;
pub mod ppu;

pub use apu::Apu;
pub use bus::NesBus;
pub use config::{NesConfig, NesRegion};
pub use controller::{Controller, NesButton};
pub use dma::OamDma;
pub use error::NesError;
pub use nes::{Debugger, Nes};
pub use ppu::Ppu;
