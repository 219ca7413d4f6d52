//! Background tile fetch and shift-register pipeline

use tracing::trace;

use crate::bus::Bus;
use crate::error::NesError;

/// Latches filled by the 8-dot fetch cycle and the 16-bit shifters they
/// reload
#[derive(Debug, Clone, Default)]
pub struct BackgroundPipeline {
    next_tile: u8,
    next_palette: u8,
    next_lo: u8,
    next_hi: u8,
    pattern_lo: u16,
    pattern_hi: u16,
    attribute_lo: u16,
    attribute_hi: u16,
}

impl BackgroundPipeline {
    pub fn shift(&mut self) {
        self.pattern_lo <<= 1;
        self.pattern_hi <<= 1;
        self.attribute_lo <<= 1;
        self.attribute_hi <<= 1;
    }

    /// Move the fetched tile into the low byte of each shifter
    pub fn reload(&mut self) {
        self.pattern_lo = (self.pattern_lo & 0xFF00) | self.next_lo as u16;
        self.pattern_hi = (self.pattern_hi & 0xFF00) | self.next_hi as u16;
        let lo = if self.next_palette & 0b01 != 0 { 0xFF } else { 0x00 };
        let hi = if self.next_palette & 0b10 != 0 { 0xFF } else { 0x00 };
        self.attribute_lo = (self.attribute_lo & 0xFF00) | lo;
        self.attribute_hi = (self.attribute_hi & 0xFF00) | hi;
    }

    /// One step of the fetch cycle; `phase` is `(dot - 1) % 8`
    pub fn fetch(&mut self, bus: &mut Bus, phase: u16) -> Result<(), NesError> {
        match phase {
            0 => {
                self.reload();
                self.next_tile = fetch_tile(bus)?;
            }
            2 => self.next_palette = fetch_palette(bus)?,
            4 => self.next_lo = fetch_pattern(bus, self.next_tile, false)?,
            6 => self.next_hi = fetch_pattern(bus, self.next_tile, true)?,
            7 => bus.ppu.increment_x(),
            _ => {}
        }
        Ok(())
    }

    /// 2-bit pixel and palette number under the fine-X tap
    pub fn pixel(&self, fine_x: u8) -> (u8, u8) {
        let mux = 0x8000u16 >> fine_x;
        let bit = |reg: u16| (reg & mux != 0) as u8;
        let pixel = (bit(self.pattern_hi) << 1) | bit(self.pattern_lo);
        let palette = (bit(self.attribute_hi) << 1) | bit(self.attribute_lo);
        (pixel, palette)
    }
}

fn fetch_tile(bus: &mut Bus) -> Result<u8, NesError> {
    let regs = &bus.ppu;
    match bus.tile_index(regs.nametable(), regs.coarse_x(), regs.coarse_y()) {
        Ok(tile) => Ok(tile),
        Err(err) => {
            // Coarse Y 30/31 reads the attribute table as tiles
            trace!(%err, "nametable fetch outside the tile grid");
            bus.read_ppu(regs.tile_address())
        }
    }
}

fn fetch_palette(bus: &mut Bus) -> Result<u8, NesError> {
    let regs = &bus.ppu;
    let (x, y) = (regs.coarse_x(), regs.coarse_y());
    match bus.attribute(regs.nametable(), x, y) {
        Ok(palette) => Ok(palette),
        Err(err) => {
            trace!(%err, "attribute fetch outside the tile grid");
            let v = regs.v;
            let address = 0x23C0 | (v & 0x0C00) | ((v >> 4) & 0x38) | ((v >> 2) & 0x07);
            let byte = bus.read_ppu(address)?;
            let shift = ((y & 0x02) << 1) | (x & 0x02);
            Ok((byte >> shift) & 0x03)
        }
    }
}

fn fetch_pattern(bus: &mut Bus, tile: u8, high_plane: bool) -> Result<u8, NesError> {
    let regs = &bus.ppu;
    bus.tile_pattern(regs.ctrl.background_table(), tile, regs.fine_y(), high_plane)
}
