use emu_core::MemoryError;
use thiserror::Error;

/// Reasons a cartridge cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartridgeError {
    #[error("invalid iNES image: {0}")]
    InvalidImage(String),

    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u16),

    #[error("{what} size {size:#X} is not a multiple of {unit:#X}")]
    BankAlignment {
        what: &'static str,
        size: usize,
        unit: usize,
    },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
