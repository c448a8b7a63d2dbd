use thiserror::Error;

/// Address-space composition errors.
///
/// These indicate a mis-built memory map, never a condition the running
/// program can cause on correctly composed hardware.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("address ${addr:04X} is outside a {size:#X}-byte address space")]
    OutOfBounds { addr: u16, size: usize },

    #[error("slot {slot} holds {expected:#X} bytes; replacement bank has {actual:#X}")]
    SlotSizeMismatch {
        slot: usize,
        expected: usize,
        actual: usize,
    },

    #[error("slot {slot} does not exist (space has {slots} slots)")]
    NoSuchSlot { slot: usize, slots: usize },

    #[error("bank {index} requested from a collection of {count}")]
    NoSuchBank { index: usize, count: usize },
}
