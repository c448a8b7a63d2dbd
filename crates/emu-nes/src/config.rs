//! NES configuration.

/// Video region the console is built for. Only NTSC timing is emulated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NesRegion {
    /// NTSC: 262 scanlines, CPU at crystal/12.
    #[default]
    Ntsc,
    /// Rejected by [`Nes::new`](crate::Nes::new).
    Pal,
}

/// NES configuration.
#[derive(Debug, Clone, Default)]
pub struct NesConfig {
    /// iNES file contents.
    pub rom_data: Vec<u8>,
    /// Video region. Defaults to NTSC.
    pub region: NesRegion,
}

impl NesConfig {
    #[must_use]
    pub fn new(rom_data: Vec<u8>) -> Self {
        Self {
            rom_data,
            region: NesRegion::Ntsc,
        }
    }
}
