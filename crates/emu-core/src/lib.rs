//! Core traits and types for cycle-accurate emulation.
//!
//! Components talk to memory through [`Bus`], expose their state through
//! [`Observable`], and share interrupt lines through [`InterruptLine`].
//! The [`memory`] module provides the banked address-space model that
//! cartridge mappers rewire at run time.

mod bus;
mod error;
mod irq;
pub mod memory;
mod observable;

pub use bus::{Access, Bus, SimpleBus};
pub use error::MemoryError;
pub use irq::{InterruptLine, InterruptSource};
pub use observable::{Observable, Value};
