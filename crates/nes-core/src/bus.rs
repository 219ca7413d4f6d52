//! Memory bus and mapping
//!
//! The CPU memory map:
//! $0000-$07FF - 2KB Internal RAM
//! $0800-$1FFF - RAM mirroring (repeats every $0800 bytes)
//! $2000-$2007 - PPU registers
//! $2008-$3FFF - PPU register mirroring (every 8 bytes)
//! $4000-$401F - APU and I/O registers ($4014 OAM DMA, $4016/$4017 controllers)
//! $4020-$5FFF - Expansion ROM (read-only)
//! $6000-$7FFF - Expansion RAM
//! $8000-$FFFF - Cartridge PRG ROM (read-only, 16KB images mirrored)
//!
//! The PPU memory map:
//! $0000-$1FFF - Pattern tables (CHR-ROM, or CHR-RAM when the image has none)
//! $2000-$2FFF - Four nametables with their attribute tables
//! $3000-$3EFF - Mirror of $2000-$2EFF
//! $3F00-$3F1F - Palette RAM
//! $3F20-$3FFF - Palette mirroring

use tracing::debug;

use crate::cartridge::Cartridge;
use crate::controller::{Controller, InputSource};
use crate::error::{BusError, NesError, Region, SetupError, ValidationError};
use crate::ppu::registers::{Mask, PpuRegisters};

/// RAM size in bytes
pub const RAM_SIZE: usize = 2048;

/// APU/IO register window size
pub const IO_SIZE: usize = 32;

/// $4020-$5FFF
pub const EXPANSION_ROM_SIZE: usize = 0x6000 - 0x4020;

/// $6000-$7FFF
pub const EXPANSION_RAM_SIZE: usize = 0x2000;

/// Tile grid plus 64-byte attribute table
pub const NAMETABLE_SIZE: usize = 0x400;

/// Tile grid width in tiles
pub const NAMETABLE_COLUMNS: u8 = 32;

/// Tile grid height in tiles
pub const NAMETABLE_ROWS: u8 = 30;

const ATTRIBUTE_OFFSET: usize = 960;

/// Memory bus structure
///
/// Owns every byte of memory and the PPU register file; CPU and PPU only
/// reach state through it.
#[derive(Debug)]
pub struct Bus {
    ram: [u8; RAM_SIZE],
    io: [u8; IO_SIZE],
    expansion_rom: Vec<u8>,
    expansion_ram: Vec<u8>,
    cartridge: Option<Cartridge>,
    nametables: [[u8; NAMETABLE_SIZE]; 4],
    palette: [u8; 32],
    pub(crate) ppu: PpuRegisters,
    controllers: [Controller; 2],
    nmi_line: bool,
    irq_line: bool,
}

impl Bus {
    /// Create a new bus with no cartridge
    pub fn new() -> Self {
        Self {
            ram: [0; RAM_SIZE],
            io: [0; IO_SIZE],
            expansion_rom: vec![0; EXPANSION_ROM_SIZE],
            expansion_ram: vec![0; EXPANSION_RAM_SIZE],
            cartridge: None,
            nametables: [[0; NAMETABLE_SIZE]; 4],
            palette: [0; 32],
            ppu: PpuRegisters::default(),
            controllers: [Controller::new(), Controller::new()],
            nmi_line: false,
            irq_line: false,
        }
    }

    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        debug!(
            prg = cartridge.prg_rom().len(),
            chr = cartridge.chr().len(),
            "cartridge inserted"
        );
        self.cartridge = Some(cartridge);
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    /// Contents of the read-only expansion area at $4020-$5FFF
    pub fn load_expansion_rom(&mut self, data: &[u8]) {
        let len = data.len().min(EXPANSION_ROM_SIZE);
        self.expansion_rom[..len].copy_from_slice(&data[..len]);
    }

    /// PPU register file, read-only view
    pub fn ppu_registers(&self) -> &PpuRegisters {
        &self.ppu
    }

    pub fn set_input(&mut self, port: usize, source: Box<dyn InputSource>) {
        self.controllers[port & 1].set_source(source);
    }

    /// Read a byte from CPU address space
    pub fn read_cpu(&mut self, address: u16) -> Result<u8, NesError> {
        let value = match address {
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize],
            0x2000..=0x3FFF => self.read_ppu_register(address & 0x0007)?,
            0x4016 => self.controllers[0].read(),
            0x4017 => self.controllers[1].read(),
            0x4000..=0x401F => self.io[(address - 0x4000) as usize],
            0x4020..=0x5FFF => self.expansion_rom[(address - 0x4020) as usize],
            0x6000..=0x7FFF => self.expansion_ram[(address - 0x6000) as usize],
            0x8000..=0xFFFF => self.read_prg(address)?,
        };
        Ok(value)
    }

    /// Write a byte to CPU address space
    pub fn write_cpu(&mut self, address: u16, value: u8) -> Result<(), NesError> {
        match address {
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize] = value,
            0x2000..=0x3FFF => self.write_ppu_register(address & 0x0007, value)?,
            0x4000..=0x401F => {
                self.io[(address - 0x4000) as usize] = value;
                match address {
                    0x4014 => self.ppu.dma_page = Some(value),
                    0x4016 => {
                        for pad in &mut self.controllers {
                            pad.write_strobe(value);
                        }
                    }
                    _ => {}
                }
            }
            0x4020..=0x5FFF => {
                return Err(BusError::ReadOnly {
                    addr: address,
                    region: Region::ExpansionRom,
                }
                .into())
            }
            0x6000..=0x7FFF => self.expansion_ram[(address - 0x6000) as usize] = value,
            0x8000..=0xFFFF => {
                return Err(BusError::ReadOnly {
                    addr: address,
                    region: Region::PrgRom,
                }
                .into())
            }
        }
        Ok(())
    }

    /// Read CPU address space without side effects
    ///
    /// PPU registers answer with the open-bus latch (PPUSTATUS with its
    /// live flags), controller ports with the next bit without advancing.
    pub fn peek_cpu(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize],
            0x2000..=0x3FFF => match address & 0x0007 {
                2 => (self.ppu.status.bits() & 0xE0) | (self.ppu.open_bus & 0x1F),
                _ => self.ppu.open_bus,
            },
            0x4016 => self.controllers[0].peek(),
            0x4017 => self.controllers[1].peek(),
            0x4000..=0x401F => self.io[(address - 0x4000) as usize],
            0x4020..=0x5FFF => self.expansion_rom[(address - 0x4020) as usize],
            0x6000..=0x7FFF => self.expansion_ram[(address - 0x6000) as usize],
            0x8000..=0xFFFF => self
                .cartridge
                .as_ref()
                .and_then(|cart| cart.prg_offset(address).map(|i| cart.prg_rom()[i]))
                .unwrap_or(0),
        }
    }

    /// Little-endian word at `address`, used for interrupt vectors
    pub fn read_cpu_word(&mut self, address: u16) -> Result<u16, NesError> {
        let lo = self.read_cpu(address)?;
        let hi = self.read_cpu(address.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn read_prg(&self, address: u16) -> Result<u8, NesError> {
        let cart = self.cartridge.as_ref().ok_or(SetupError::NoCartridge)?;
        let offset = cart
            .prg_offset(address)
            .ok_or(BusError::OutOfRange { addr: address })?;
        Ok(cart.prg_rom()[offset])
    }

    fn read_ppu_register(&mut self, register: u16) -> Result<u8, NesError> {
        let value = match register {
            2 => self.ppu.read_status(),
            4 => self.ppu.oam[self.ppu.oam_addr as usize],
            7 => {
                let address = self.ppu.v & 0x3FFF;
                let value = if address >= 0x3F00 {
                    // Palette reads bypass the buffer, which picks up the
                    // nametable byte underneath instead
                    self.ppu.read_buffer = self.read_ppu(address - 0x1000)?;
                    self.read_ppu(address)?
                } else {
                    let buffered = self.ppu.read_buffer;
                    self.ppu.read_buffer = self.read_ppu(address)?;
                    buffered
                };
                self.ppu.increment_vram_addr();
                value
            }
            _ => return Ok(self.ppu.open_bus),
        };
        self.ppu.open_bus = value;
        Ok(value)
    }

    fn write_ppu_register(&mut self, register: u16, value: u8) -> Result<(), NesError> {
        self.ppu.open_bus = value;
        match register {
            0 => self.ppu.write_ctrl(value),
            1 => self.ppu.mask = Mask::from_bits_retain(value),
            2 => {}
            3 => self.ppu.oam_addr = value,
            4 => {
                self.ppu.oam[self.ppu.oam_addr as usize] = value;
                self.ppu.oam_addr = self.ppu.oam_addr.wrapping_add(1);
            }
            5 => self.ppu.write_scroll(value),
            6 => self.ppu.write_addr(value),
            _ => {
                self.write_ppu(self.ppu.v & 0x3FFF, value)?;
                self.ppu.increment_vram_addr();
            }
        }
        Ok(())
    }

    /// Read a byte from PPU address space
    pub fn read_ppu(&self, address: u16) -> Result<u8, NesError> {
        match address {
            0x0000..=0x1FFF => {
                let cart = self.cartridge.as_ref().ok_or(SetupError::NoCartridge)?;
                cart.chr()
                    .get(address as usize)
                    .copied()
                    .ok_or_else(|| BusError::OutOfRange { addr: address }.into())
            }
            0x2000..=0x3EFF => {
                let (table, offset) = nametable_slot(address);
                Ok(self.nametables[table][offset])
            }
            0x3F00..=0x3FFF => Ok(self.palette[(address & 0x1F) as usize]),
            _ => Err(BusError::OutOfRange { addr: address }.into()),
        }
    }

    /// Write a byte to PPU address space
    pub fn write_ppu(&mut self, address: u16, value: u8) -> Result<(), NesError> {
        match address {
            0x0000..=0x1FFF => {
                let cart = self.cartridge.as_mut().ok_or(SetupError::NoCartridge)?;
                if !cart.chr_is_ram() {
                    return Err(BusError::ReadOnly {
                        addr: address,
                        region: Region::ChrRom,
                    }
                    .into());
                }
                let slot = cart
                    .chr_mut()
                    .get_mut(address as usize)
                    .ok_or(BusError::OutOfRange { addr: address })?;
                *slot = value;
            }
            0x2000..=0x3EFF => {
                let (table, offset) = nametable_slot(address);
                self.nametables[table][offset] = value;
            }
            0x3F00..=0x3FFF => {
                let index = (address & 0x1F) as usize;
                self.palette[index] = value;
                // Entry 0 of each background palette is shared with the
                // matching sprite palette
                if index & 0x03 == 0 {
                    self.palette[index ^ 0x10] = value;
                }
            }
            _ => return Err(BusError::OutOfRange { addr: address }.into()),
        }
        Ok(())
    }

    /// Tile index at column `x`, row `y` of `nametable`
    pub fn tile_index(&self, nametable: u8, x: u8, y: u8) -> Result<u8, ValidationError> {
        check_coordinate(x, y)?;
        let offset = y as usize * NAMETABLE_COLUMNS as usize + x as usize;
        Ok(self.nametables[(nametable & 3) as usize][offset])
    }

    /// 2-bit palette number covering tile (`x`, `y`)
    pub fn attribute(&self, nametable: u8, x: u8, y: u8) -> Result<u8, ValidationError> {
        check_coordinate(x, y)?;
        let offset = ATTRIBUTE_OFFSET + (y as usize / 4) * 8 + x as usize / 4;
        let byte = self.nametables[(nametable & 3) as usize][offset];
        let shift = ((y & 0x02) << 1) | (x & 0x02);
        Ok((byte >> shift) & 0x03)
    }

    /// Colour index stored for `palette` (0-3 background, 4-7 sprite)
    pub fn palette_entry(&self, palette: u8, index: u8) -> Result<u8, ValidationError> {
        if palette >= 8 || index >= 4 {
            return Err(ValidationError::Palette { palette, index });
        }
        Ok(self.palette[(palette * 4 + index) as usize])
    }

    /// Backdrop colour at $3F00
    pub fn backdrop(&self) -> u8 {
        self.palette[0]
    }

    /// One bit plane of one row of a tile
    pub fn tile_pattern(&self, table: u8, tile: u8, row: u8, high_plane: bool) -> Result<u8, NesError> {
        if row >= 8 {
            return Err(ValidationError::PatternRow { row }.into());
        }
        let plane = if high_plane { 8 } else { 0 };
        let address = (((table & 1) as u16) << 12) | ((tile as u16) << 4) | plane | row as u16;
        self.read_ppu(address)
    }

    /// Level of the PPU's NMI output as seen by the CPU
    pub fn signal_nmi(&mut self, active: bool) {
        self.nmi_line = active;
    }

    pub fn nmi_line(&self) -> bool {
        self.nmi_line
    }

    /// Level-triggered IRQ input for expansion devices
    pub fn set_irq(&mut self, active: bool) {
        self.irq_line = active;
    }

    pub fn irq_line(&self) -> bool {
        self.irq_line
    }

    /// Copy a latched OAM DMA page into primary OAM, if one is pending
    pub fn run_oam_dma(&mut self) -> Result<bool, NesError> {
        let Some(page) = self.ppu.dma_page.take() else {
            return Ok(false);
        };
        let base = (page as u16) << 8;
        for i in 0..=0xFFu16 {
            let value = self.read_cpu(base | i)?;
            let slot = self.ppu.oam_addr.wrapping_add(i as u8);
            self.ppu.oam[slot as usize] = value;
        }
        debug!(page, "OAM DMA");
        Ok(true)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

fn check_coordinate(x: u8, y: u8) -> Result<(), ValidationError> {
    if x >= NAMETABLE_COLUMNS || y >= NAMETABLE_ROWS {
        return Err(ValidationError::Coordinate { x, y });
    }
    Ok(())
}

/// $2000-$3EFF to (nametable, offset)
fn nametable_slot(address: u16) -> (usize, usize) {
    let relative = (address & 0x0FFF) as usize;
    (relative / NAMETABLE_SIZE, relative % NAMETABLE_SIZE)
}
