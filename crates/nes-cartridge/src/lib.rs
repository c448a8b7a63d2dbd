//! NES cartridge support.
//!
//! [`parse_ines`] turns an iNES file into a [`CartridgeImage`]; [`create`]
//! builds the matching [`Mapper`], which owns the cartridge's banks and the
//! CPU- and PPU-visible address spaces in a [`MemoryMap`].

mod error;
mod image;
mod map;
pub mod mapper;

pub use error::CartridgeError;
pub use image::{CartridgeImage, Mirroring, TvSystem, parse_ines};
pub use map::{CpuPort, MemoryMap, PpuPort};
pub use mapper::{Mapper, create};
