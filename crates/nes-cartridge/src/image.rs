//! iNES / NES 2.0 image parsing.

use crate::CartridgeError;

const HEADER_LEN: usize = 16;
const TRAINER_LEN: usize = 512;
const PRG_UNIT: usize = 16 * 1024;
const CHR_UNIT: usize = 8 * 1024;

/// Nametable mirroring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleScreenLower,
    SingleScreenUpper,
    FourScreen,
    /// Pages 1, 0, 1, 0: the MMC1 horizontal decode.
    SwappedVertical,
}

/// Television system the cartridge was built for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TvSystem {
    #[default]
    Ntsc,
    Pal,
    /// Runs on either.
    Multi,
    Dendy,
}

/// A parsed cartridge: raw ROM contents plus the board description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeImage {
    pub prg_rom: Vec<u8>,
    /// Empty when the board carries CHR RAM instead.
    pub chr_rom: Vec<u8>,
    pub mapper: u16,
    pub mirroring: Mirroring,
    pub battery: bool,
    pub tv_system: TvSystem,
}

impl CartridgeImage {
    /// An image with the given ROM contents and defaults elsewhere
    /// (horizontal mirroring, NTSC, no battery).
    #[must_use]
    pub fn new(mapper: u16, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        Self {
            prg_rom,
            chr_rom,
            mapper,
            mirroring: Mirroring::Horizontal,
            battery: false,
            tv_system: TvSystem::Ntsc,
        }
    }

    #[must_use]
    pub fn with_mirroring(mut self, mirroring: Mirroring) -> Self {
        self.mirroring = mirroring;
        self
    }

    #[must_use]
    pub fn has_chr_ram(&self) -> bool {
        self.chr_rom.is_empty()
    }
}

/// Parse an iNES file (1.0 or 2.0 header).
pub fn parse_ines(data: &[u8]) -> Result<CartridgeImage, CartridgeError> {
    if data.len() < HEADER_LEN {
        return Err(CartridgeError::InvalidImage(format!(
            "file too short ({} bytes)",
            data.len()
        )));
    }
    if &data[0..4] != b"NES\x1a" {
        return Err(CartridgeError::InvalidImage(
            "missing NES\\x1A magic".to_string(),
        ));
    }

    let flags6 = data[6];
    let flags7 = data[7];
    let nes2 = flags7 & 0x0C == 0x08;

    let mut mapper = u16::from(flags6 >> 4) | u16::from(flags7 & 0xF0);
    let mut prg_units = usize::from(data[4]);
    let mut chr_units = usize::from(data[5]);
    let tv_system = if nes2 {
        mapper |= u16::from(data[8] & 0x0F) << 8;
        let msb = data[9];
        if msb & 0x0F == 0x0F || msb & 0xF0 == 0xF0 {
            return Err(CartridgeError::InvalidImage(
                "exponent-multiplier ROM sizes are not supported".to_string(),
            ));
        }
        prg_units |= usize::from(msb & 0x0F) << 8;
        chr_units |= usize::from(msb >> 4) << 8;
        match data[12] & 0x03 {
            0 => TvSystem::Ntsc,
            1 => TvSystem::Pal,
            2 => TvSystem::Multi,
            _ => TvSystem::Dendy,
        }
    } else if data[9] & 0x01 != 0 {
        TvSystem::Pal
    } else {
        TvSystem::Ntsc
    };

    let mirroring = if flags6 & 0x08 != 0 {
        Mirroring::FourScreen
    } else if flags6 & 0x01 != 0 {
        Mirroring::Vertical
    } else {
        Mirroring::Horizontal
    };

    let prg_start = HEADER_LEN + if flags6 & 0x04 != 0 { TRAINER_LEN } else { 0 };
    let prg_len = prg_units * PRG_UNIT;
    let chr_start = prg_start + prg_len;
    let chr_len = chr_units * CHR_UNIT;

    if prg_len == 0 {
        return Err(CartridgeError::InvalidImage("no PRG ROM".to_string()));
    }
    if data.len() < chr_start + chr_len {
        return Err(CartridgeError::InvalidImage(format!(
            "expected {} bytes, got {}",
            chr_start + chr_len,
            data.len()
        )));
    }

    let image = CartridgeImage {
        prg_rom: data[prg_start..chr_start].to_vec(),
        chr_rom: data[chr_start..chr_start + chr_len].to_vec(),
        mapper,
        mirroring,
        battery: flags6 & 0x02 != 0,
        tv_system,
    };
    log::debug!(
        "iNES{}: mapper {}, PRG {}K, CHR {}K{}, {:?}",
        if nes2 { " 2.0" } else { "" },
        image.mapper,
        prg_len / 1024,
        chr_len / 1024,
        if image.has_chr_ram() { " (RAM)" } else { "" },
        image.mirroring,
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ines(prg_banks: u8, chr_banks: u8, flags6: u8, flags7: u8) -> Vec<u8> {
        let mut data = vec![0u8; 16];
        data[0..4].copy_from_slice(b"NES\x1a");
        data[4] = prg_banks;
        data[5] = chr_banks;
        data[6] = flags6;
        data[7] = flags7;
        if flags6 & 0x04 != 0 {
            data.extend(std::iter::repeat_n(0xEE, 512));
        }
        for bank in 0..prg_banks {
            data.extend(std::iter::repeat_n(bank, PRG_UNIT));
        }
        data.extend(std::iter::repeat_n(0xCC, usize::from(chr_banks) * CHR_UNIT));
        data
    }

    #[test]
    fn parses_nrom_header() {
        let image = parse_ines(&make_ines(2, 1, 0x01, 0x00)).expect("valid image");
        assert_eq!(image.mapper, 0);
        assert_eq!(image.prg_rom.len(), 2 * PRG_UNIT);
        assert_eq!(image.chr_rom.len(), CHR_UNIT);
        assert_eq!(image.mirroring, Mirroring::Vertical);
        assert_eq!(image.tv_system, TvSystem::Ntsc);
        assert!(!image.battery);
        assert_eq!(image.prg_rom[PRG_UNIT], 1);
    }

    #[test]
    fn mapper_number_combines_both_nibbles() {
        let image = parse_ines(&make_ines(1, 0, 0x42, 0x10)).expect("valid image");
        assert_eq!(image.mapper, 0x14);
        assert!(image.battery);
        assert!(image.has_chr_ram());
    }

    #[test]
    fn trainer_is_skipped() {
        let image = parse_ines(&make_ines(1, 0, 0x04, 0x00)).expect("valid image");
        assert_eq!(image.prg_rom[0], 0);
        assert_eq!(image.prg_rom.len(), PRG_UNIT);
    }

    #[test]
    fn four_screen_overrides_mirroring_bit() {
        let image = parse_ines(&make_ines(1, 1, 0x09, 0x00)).expect("valid image");
        assert_eq!(image.mirroring, Mirroring::FourScreen);
    }

    #[test]
    fn nes2_header_extends_mapper_and_region() {
        let mut data = make_ines(1, 1, 0x10, 0x28);
        data[8] = 0x01;
        data[12] = 0x01;
        let image = parse_ines(&data).expect("valid image");
        assert_eq!(image.mapper, 0x121);
        assert_eq!(image.tv_system, TvSystem::Pal);
    }

    #[test]
    fn ines1_pal_flag() {
        let mut data = make_ines(1, 1, 0x00, 0x00);
        data[9] = 0x01;
        assert_eq!(parse_ines(&data).expect("valid").tv_system, TvSystem::Pal);
    }

    #[test]
    fn rejects_bad_magic_and_truncation() {
        let mut data = make_ines(1, 1, 0, 0);
        data[3] = 0;
        assert!(matches!(
            parse_ines(&data),
            Err(CartridgeError::InvalidImage(_))
        ));

        let mut data = make_ines(2, 1, 0, 0);
        data.truncate(16 + PRG_UNIT);
        assert!(matches!(
            parse_ines(&data),
            Err(CartridgeError::InvalidImage(_))
        ));

        assert!(parse_ines(b"NES").is_err());
    }
}
