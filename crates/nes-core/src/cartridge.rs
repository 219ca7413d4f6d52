//! Cartridge image loading
//!
//! Only the fixed NROM geometry is supported: 16 or 32 KiB of PRG-ROM at
//! `$8000-$FFFF` and one 8 KiB pattern-table bank. Images without CHR-ROM
//! get 8 KiB of CHR-RAM instead.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// iNES header size
pub const HEADER_SIZE: usize = 16;

/// Trainer block size, present when flags 6 bit 2 is set
pub const TRAINER_SIZE: usize = 512;

/// PRG-ROM bank unit (header byte 4)
pub const PRG_BANK_SIZE: usize = 16 * 1024;

/// CHR-ROM bank unit (header byte 5)
pub const CHR_BANK_SIZE: usize = 8 * 1024;

const MAGIC: [u8; 4] = *b"NES\x1A";

/// iNES header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InesHeader {
    /// PRG ROM size in 16KB units
    pub prg_rom_banks: u8,
    /// CHR ROM size in 8KB units
    pub chr_rom_banks: u8,
    /// Flags 6
    pub flags_6: u8,
    /// Flags 7
    pub flags_7: u8,
}

impl InesHeader {
    /// Parse an iNES header from bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CartridgeError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[0..4] != MAGIC {
            return Err(CartridgeError::BadMagic);
        }

        Ok(Self {
            prg_rom_banks: bytes[4],
            chr_rom_banks: bytes[5],
            flags_6: bytes[6],
            flags_7: bytes[7],
        })
    }

    /// Get the mapper number from flags
    pub fn mapper_number(&self) -> u8 {
        (self.flags_6 >> 4) | (self.flags_7 & 0xF0)
    }

    /// Check if trainer is present
    pub fn has_trainer(&self) -> bool {
        (self.flags_6 & 0x04) != 0
    }

    pub fn prg_rom_size(&self) -> usize {
        self.prg_rom_banks as usize * PRG_BANK_SIZE
    }

    pub fn chr_rom_size(&self) -> usize {
        self.chr_rom_banks as usize * CHR_BANK_SIZE
    }
}

/// Cartridge error types
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("missing iNES magic")]
    BadMagic,
    #[error("image truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("PRG-ROM must be 1 or 2 banks of 16 KiB, header says {0}")]
    PrgSize(u8),
    #[error("mapper {0} is not supported (NROM only)")]
    UnsupportedMapper(u8),
    #[error("failed to read ROM file: {0}")]
    Io(#[from] std::io::Error),
}

/// Cartridge structure
#[derive(Debug, Clone)]
pub struct Cartridge {
    header: InesHeader,
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
}

impl Cartridge {
    /// Build an NROM cartridge straight from PRG and CHR data
    ///
    /// An empty `chr_rom` is replaced by 8 KiB of CHR-RAM.
    pub fn new(prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        let header = InesHeader {
            prg_rom_banks: (prg_rom.len() / PRG_BANK_SIZE) as u8,
            chr_rom_banks: (chr_rom.len() / CHR_BANK_SIZE) as u8,
            flags_6: 0,
            flags_7: 0,
        };
        let chr_is_ram = chr_rom.is_empty();
        let chr = if chr_is_ram { vec![0; CHR_BANK_SIZE] } else { chr_rom };
        Self {
            header,
            prg_rom,
            chr,
            chr_is_ram,
        }
    }

    /// Parse an iNES image
    pub fn from_bytes(rom_data: &[u8]) -> Result<Self, CartridgeError> {
        let header = InesHeader::parse(rom_data)?;
        if header.mapper_number() != 0 {
            return Err(CartridgeError::UnsupportedMapper(header.mapper_number()));
        }
        if !(1..=2).contains(&header.prg_rom_banks) {
            return Err(CartridgeError::PrgSize(header.prg_rom_banks));
        }

        let prg_start = HEADER_SIZE + if header.has_trainer() { TRAINER_SIZE } else { 0 };
        let chr_start = prg_start + header.prg_rom_size();
        let end = chr_start + header.chr_rom_size();
        if rom_data.len() < end {
            return Err(CartridgeError::Truncated {
                expected: end,
                actual: rom_data.len(),
            });
        }

        let mut cartridge = Self::new(
            rom_data[prg_start..chr_start].to_vec(),
            rom_data[chr_start..end].to_vec(),
        );
        cartridge.header = header;
        debug!(
            prg = cartridge.prg_rom.len(),
            chr = cartridge.chr.len(),
            chr_ram = cartridge.chr_is_ram,
            "parsed iNES image"
        );
        Ok(cartridge)
    }

    /// Read and parse an iNES file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CartridgeError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn header(&self) -> &InesHeader {
        &self.header
    }

    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    /// Pattern-table backing store (CHR-ROM or CHR-RAM)
    pub fn chr(&self) -> &[u8] {
        &self.chr
    }

    pub(crate) fn chr_mut(&mut self) -> &mut [u8] {
        &mut self.chr
    }

    /// Whether the pattern tables accept writes
    pub fn chr_is_ram(&self) -> bool {
        self.chr_is_ram
    }

    /// Offset into PRG-ROM for a CPU address in `$8000-$FFFF`
    ///
    /// A 16 KiB image is mirrored into `$C000-$FFFF`.
    pub(crate) fn prg_offset(&self, address: u16) -> Option<usize> {
        if self.prg_rom.is_empty() {
            return None;
        }
        Some((address as usize - 0x8000) % self.prg_rom.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(prg_banks: u8, chr_banks: u8, flags_6: u8) -> Vec<u8> {
        let mut rom = Vec::new();
        rom.extend_from_slice(&MAGIC);
        rom.push(prg_banks);
        rom.push(chr_banks);
        rom.push(flags_6);
        rom.extend_from_slice(&[0u8; 9]);
        if flags_6 & 0x04 != 0 {
            rom.extend_from_slice(&[0xEE; TRAINER_SIZE]);
        }
        rom.extend(std::iter::repeat(0xAA).take(prg_banks as usize * PRG_BANK_SIZE));
        rom.extend(std::iter::repeat(0x55).take(chr_banks as usize * CHR_BANK_SIZE));
        rom
    }

    #[test]
    fn test_header_parsing() {
        let rom = image(2, 1, 0);
        let header = InesHeader::parse(&rom).unwrap();
        assert_eq!(header.prg_rom_banks, 2);
        assert_eq!(header.chr_rom_banks, 1);
        assert_eq!(header.mapper_number(), 0);
    }

    #[test]
    fn test_cartridge_from_rom() {
        let cart = Cartridge::from_bytes(&image(1, 1, 0)).unwrap();
        assert_eq!(cart.prg_rom().len(), PRG_BANK_SIZE);
        assert_eq!(cart.chr().len(), CHR_BANK_SIZE);
        assert!(cart.prg_rom().iter().all(|&b| b == 0xAA));
        assert!(cart.chr().iter().all(|&b| b == 0x55));
        assert!(!cart.chr_is_ram());
    }

    #[test]
    fn test_trainer_is_skipped() {
        let cart = Cartridge::from_bytes(&image(1, 1, 0x04)).unwrap();
        assert_eq!(cart.prg_rom()[0], 0xAA);
    }

    #[test]
    fn test_missing_chr_becomes_ram() {
        let cart = Cartridge::from_bytes(&image(1, 0, 0)).unwrap();
        assert!(cart.chr_is_ram());
        assert_eq!(cart.chr().len(), CHR_BANK_SIZE);
    }

    #[test]
    fn test_rejects_bad_images() {
        assert!(matches!(
            Cartridge::from_bytes(b"NOPE"),
            Err(CartridgeError::Truncated { .. })
        ));

        let mut rom = image(1, 1, 0);
        rom[0] = b'X';
        assert!(matches!(Cartridge::from_bytes(&rom), Err(CartridgeError::BadMagic)));

        let rom = image(1, 1, 0x10);
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::UnsupportedMapper(1))
        ));

        let mut rom = image(1, 1, 0);
        rom.truncate(HEADER_SIZE + 100);
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_rejects_prg_outside_nrom_geometry() {
        assert!(matches!(
            Cartridge::from_bytes(&image(0, 1, 0)),
            Err(CartridgeError::PrgSize(0))
        ));
        assert!(matches!(
            Cartridge::from_bytes(&image(4, 1, 0)),
            Err(CartridgeError::PrgSize(4))
        ));
        let cart = Cartridge::from_bytes(&image(2, 1, 0)).unwrap();
        assert_eq!(cart.prg_rom().len(), 2 * PRG_BANK_SIZE);
    }

    #[test]
    fn test_prg_mirroring() {
        let mut prg = vec![0; PRG_BANK_SIZE];
        prg[0x0123] = 0x42;
        let cart = Cartridge::new(prg, vec![0; CHR_BANK_SIZE]);
        assert_eq!(cart.prg_offset(0x8123), Some(0x0123));
        assert_eq!(cart.prg_offset(0xC123), Some(0x0123));

        let cart = Cartridge::new(vec![0; 2 * PRG_BANK_SIZE], vec![0; CHR_BANK_SIZE]);
        assert_eq!(cart.prg_offset(0xC123), Some(0x4123));
    }
}
