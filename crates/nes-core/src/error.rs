//! Error taxonomy for the emulation core
//!
//! Every fallible CPU, PPU and bus operation surfaces one of these as a
//! typed result; the session driver decides whether to halt or continue.

use thiserror::Error;

/// Opcode byte that has no entry in the opcode table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode ${opcode:02X} at ${pc:04X}")]
    UnknownOpcode { opcode: u8, pc: u16 },
}

/// Memory region that rejects writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    PrgRom,
    ChrRom,
    ExpansionRom,
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Region::PrgRom => "PRG-ROM",
            Region::ChrRom => "CHR-ROM",
            Region::ExpansionRom => "expansion ROM",
        };
        f.write_str(name)
    }
}

/// Address decoding failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("address ${addr:04X} is outside the decoded range")]
    OutOfRange { addr: u16 },
    #[error("write to read-only {region} at ${addr:04X}")]
    ReadOnly { addr: u16, region: Region },
}

/// Components used before the session was fully wired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("no cartridge inserted")]
    NoCartridge,
}

/// Geometry arguments outside the hardware's tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("nametable coordinate ({x}, {y}) outside 32x30")]
    Coordinate { x: u8, y: u8 },
    #[error("palette entry {palette}:{index} outside 8x4")]
    Palette { palette: u8, index: u8 },
    #[error("pattern row {row} outside 0..8")]
    PatternRow { row: u8 },
}

/// Umbrella error returned from every `step()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NesError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
