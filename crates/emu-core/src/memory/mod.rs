//! Banked memory model.
//!
//! Physical storage lives in a [`BankArena`] as [`MemoryUnit`]s addressed by
//! [`BankId`] handles. An [`AddressSpace`] is an ordered list of slots, each
//! holding a bank handle or a nested space, plus shadow ranges that divert
//! matching addresses to a port (memory-mapped I/O). Bank switching swaps
//! the handle in a slot; nothing is copied.

mod arena;
mod space;
mod unit;

pub use arena::{BankArena, BankId};
pub use space::{AddressSpace, Route, Slot};
pub use unit::MemoryUnit;
