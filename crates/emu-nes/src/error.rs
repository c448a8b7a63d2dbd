use emu_core::MemoryError;
use mos_6502::CpuError;
use nes_cartridge::{CartridgeError, TvSystem};
use thiserror::Error;

use crate::NesRegion;

/// Fatal emulation errors. None of these can be resumed from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NesError {
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),

    #[error("{region:?} timing is not supported (cartridge built for {cartridge:?})")]
    UnsupportedRegion {
        region: NesRegion,
        cartridge: TvSystem,
    },

    #[error("memory map fault: {0}")]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Cpu(#[from] CpuError),
}
