//! Sprite evaluation, pattern fetch and per-slot output units

use crate::bus::Bus;
use crate::error::NesError;

/// Sprites drawn per scanline
pub const MAX_SPRITES: usize = 8;

/// Attribute bit 5: draw behind opaque background
pub const PRIORITY_BEHIND: u8 = 0x20;
const FLIP_HORIZONTAL: u8 = 0x40;
const FLIP_VERTICAL: u8 = 0x80;

/// One of the eight sprite output units
#[derive(Debug, Clone, Copy, Default)]
pub struct SpriteSlot {
    pub pattern_lo: u8,
    pub pattern_hi: u8,
    pub attributes: u8,
    /// Dots left before the sprite starts shifting out
    pub x: u8,
    pub active: bool,
}

/// Opaque sprite pixel picked by `SpriteUnit::pixel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpritePixel {
    pub pixel: u8,
    /// Palette 4-7
    pub palette: u8,
    pub behind_background: bool,
    pub sprite_zero: bool,
}

/// Secondary OAM plus the eight output slots
#[derive(Debug, Clone)]
pub struct SpriteUnit {
    secondary: [u8; MAX_SPRITES * 4],
    found: usize,
    sprite_zero_found: bool,
    slots: [SpriteSlot; MAX_SPRITES],
    sprite_zero_in_slots: bool,
    /// Sprite height latched when evaluation starts, used again by fetch
    height: u8,
}

impl Default for SpriteUnit {
    fn default() -> Self {
        Self {
            secondary: [0xFF; MAX_SPRITES * 4],
            found: 0,
            sprite_zero_found: false,
            slots: [SpriteSlot::default(); MAX_SPRITES],
            sprite_zero_in_slots: false,
            height: 8,
        }
    }
}

impl SpriteUnit {
    /// Forget the previous line's evaluation
    ///
    /// Runs at dot 1 of every visible line, rendering or not.
    pub fn start_line(&mut self) {
        self.found = 0;
        self.sprite_zero_found = false;
    }

    /// Dots 1-64: one secondary OAM byte is set to $FF every other dot
    pub fn clear_step(&mut self, dot: u16) {
        if dot % 2 == 0 {
            let index = (dot / 2 - 1) as usize;
            if let Some(byte) = self.secondary.get_mut(index) {
                *byte = 0xFF;
            }
        }
    }

    /// Dots 65-256: test one primary OAM entry every other dot
    ///
    /// Entries past the eighth match are dropped; the overflow flag is not
    /// modelled.
    pub fn evaluate_step(&mut self, oam: &[u8; 256], dot: u16, scanline: u16, height: u8) {
        if dot % 2 == 0 {
            return;
        }
        let n = ((dot - 65) / 2) as usize;
        if n == 0 {
            self.height = height;
        }
        if n >= 64 || self.found >= MAX_SPRITES {
            return;
        }
        let entry = &oam[n * 4..n * 4 + 4];
        if in_range(entry[0], scanline, self.height) {
            self.secondary[self.found * 4..self.found * 4 + 4].copy_from_slice(entry);
            if n == 0 {
                self.sprite_zero_found = true;
            }
            self.found += 1;
        }
    }

    /// Sprites copied into secondary OAM so far on this line
    pub fn found(&self) -> usize {
        self.found
    }

    /// Dots 257-320: load one slot every 8 dots from secondary OAM
    pub fn fetch_step(&mut self, bus: &Bus, dot: u16, scanline: u16) -> Result<(), NesError> {
        if (dot - 257) % 8 != 0 {
            return Ok(());
        }
        let index = ((dot - 257) / 8) as usize;
        if index == 0 {
            self.sprite_zero_in_slots = self.sprite_zero_found;
        }
        if index >= self.found {
            self.slots[index] = SpriteSlot::default();
            return Ok(());
        }

        let entry = &self.secondary[index * 4..index * 4 + 4];
        let (y, tile, attributes, x) = (entry[0], entry[1], entry[2], entry[3]);
        let ctrl = bus.ppu.ctrl;
        let height = self.height;

        let mut row = scanline.wrapping_sub(y as u16) as u8;
        if row >= height {
            self.slots[index] = SpriteSlot::default();
            return Ok(());
        }
        if attributes & FLIP_VERTICAL != 0 {
            row = height - 1 - row;
        }
        let (table, tile) = if height == 16 {
            let base = tile & 0xFE;
            (tile & 1, if row >= 8 { base + 1 } else { base })
        } else {
            (ctrl.sprite_table(), tile)
        };
        let row = row & 0x07;

        let mut lo = bus.tile_pattern(table, tile, row, false)?;
        let mut hi = bus.tile_pattern(table, tile, row, true)?;
        if attributes & FLIP_HORIZONTAL != 0 {
            lo = lo.reverse_bits();
            hi = hi.reverse_bits();
        }

        self.slots[index] = SpriteSlot {
            pattern_lo: lo,
            pattern_hi: hi,
            attributes,
            x,
            active: true,
        };
        Ok(())
    }

    /// Dots 2-257: count down X, then shift patterns out
    pub fn shift(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| s.active) {
            if slot.x > 0 {
                slot.x -= 1;
            } else {
                slot.pattern_lo <<= 1;
                slot.pattern_hi <<= 1;
            }
        }
    }

    /// First opaque sprite pixel at the current dot, in OAM order
    pub fn pixel(&self) -> Option<SpritePixel> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.active && s.x == 0)
            .find_map(|(i, s)| {
                let pixel = ((s.pattern_hi >> 7) << 1) | (s.pattern_lo >> 7);
                (pixel != 0).then(|| SpritePixel {
                    pixel,
                    palette: 4 + (s.attributes & 0x03),
                    behind_background: s.attributes & PRIORITY_BEHIND != 0,
                    sprite_zero: i == 0 && self.sprite_zero_in_slots,
                })
            })
    }

    /// Drop every loaded slot
    ///
    /// Nothing is drawn on the pre-render line, so the first visible line
    /// never sees slots left over from the previous frame.
    pub fn clear_slots(&mut self) {
        self.slots = [SpriteSlot::default(); MAX_SPRITES];
        self.sprite_zero_in_slots = false;
        self.found = 0;
        self.sprite_zero_found = false;
    }
}

fn in_range(y: u8, scanline: u16, height: u8) -> bool {
    let diff = scanline as i32 - y as i32;
    (0..height as i32).contains(&diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{Cartridge, PRG_BANK_SIZE};

    fn evaluate(unit: &mut SpriteUnit, oam: &[u8; 256], scanline: u16, height: u8) {
        unit.start_line();
        for dot in 1..=64 {
            unit.clear_step(dot);
        }
        for dot in 65..=256 {
            unit.evaluate_step(oam, dot, scanline, height);
        }
    }

    #[test]
    fn test_never_more_than_eight() {
        let mut oam = [0xFFu8; 256];
        for i in 0..12 {
            oam[i * 4] = 10;
            oam[i * 4 + 3] = i as u8;
        }
        let mut unit = SpriteUnit::default();
        evaluate(&mut unit, &oam, 12, 8);
        assert_eq!(unit.found(), 8);
        // First eight in OAM order
        assert_eq!(unit.secondary[7 * 4 + 3], 7);
    }

    #[test]
    fn test_range_check_uses_height() {
        let mut oam = [0xFFu8; 256];
        oam[0] = 100;
        let mut unit = SpriteUnit::default();
        evaluate(&mut unit, &oam, 108, 8);
        assert_eq!(unit.found(), 0);
        evaluate(&mut unit, &oam, 108, 16);
        assert_eq!(unit.found(), 1);
        assert!(unit.sprite_zero_found);
    }

    #[test]
    fn test_fetch_applies_flips() {
        let mut bus = Bus::new();
        bus.insert_cartridge(Cartridge::new(vec![0; PRG_BANK_SIZE], Vec::new()));
        // Tile 1, row 7, low plane
        bus.write_ppu(0x0010 + 7, 0b1100_0000).unwrap();

        let mut oam = [0xFFu8; 256];
        oam[0..4].copy_from_slice(&[20, 1, FLIP_VERTICAL | FLIP_HORIZONTAL | 0x01, 5]);
        let mut unit = SpriteUnit::default();
        evaluate(&mut unit, &oam, 20, 8);
        for dot in 257..=320 {
            unit.fetch_step(&bus, dot, 20).unwrap();
        }

        let slot = unit.slots[0];
        assert!(slot.active);
        assert_eq!(slot.pattern_lo, 0b0000_0011);
        assert_eq!(slot.x, 5);
        assert!(!unit.slots[1].active);
    }

    fn bus() -> Bus {
        let mut bus = Bus::new();
        bus.insert_cartridge(Cartridge::new(vec![0; PRG_BANK_SIZE], Vec::new()));
        bus
    }

    fn fetch(unit: &mut SpriteUnit, bus: &Bus, scanline: u16) {
        for dot in 257..=320 {
            unit.fetch_step(bus, dot, scanline).unwrap();
        }
    }

    #[test]
    fn test_fetch_keeps_height_from_evaluation() {
        let bus = bus();
        let mut oam = [0xFFu8; 256];
        oam[0..4].copy_from_slice(&[10, 0x10, FLIP_VERTICAL, 0]);
        let mut unit = SpriteUnit::default();
        // Row 9 of an 8x16 sprite; PPUCTRL on the bus still says 8x8
        evaluate(&mut unit, &oam, 19, 16);
        fetch(&mut unit, &bus, 19);
        assert!(unit.slots[0].active);
    }

    #[test]
    fn test_out_of_range_entry_fetches_empty_slot() {
        let bus = bus();
        let mut unit = SpriteUnit::default();
        // Stale $FF entry counted as found
        unit.found = 1;
        fetch(&mut unit, &bus, 19);
        assert!(!unit.slots[0].active);

        unit.secondary[0..4].copy_from_slice(&[11, 0x01, FLIP_VERTICAL, 0]);
        unit.found = 1;
        fetch(&mut unit, &bus, 19);
        assert!(!unit.slots[0].active);
    }

    #[test]
    fn test_start_line_forgets_previous_evaluation() {
        let mut oam = [0xFFu8; 256];
        oam[0] = 11;
        let mut unit = SpriteUnit::default();
        evaluate(&mut unit, &oam, 18, 8);
        assert_eq!(unit.found(), 1);
        unit.start_line();
        assert_eq!(unit.found(), 0);
        assert!(!unit.sprite_zero_found);
    }

    #[test]
    fn test_clear_slots_empties_output() {
        let mut unit = SpriteUnit::default();
        unit.slots[0] = SpriteSlot {
            pattern_lo: 0xFF,
            attributes: 0,
            x: 0,
            active: true,
            ..SpriteSlot::default()
        };
        unit.sprite_zero_in_slots = true;
        assert!(unit.pixel().is_some());
        unit.clear_slots();
        assert_eq!(unit.pixel(), None);
        assert!(!unit.sprite_zero_in_slots);
    }

    #[test]
    fn test_pixel_after_countdown() {
        let mut unit = SpriteUnit::default();
        unit.slots[0] = SpriteSlot {
            pattern_lo: 0x80,
            pattern_hi: 0x00,
            attributes: 0x22,
            x: 1,
            active: true,
        };
        unit.sprite_zero_in_slots = true;
        assert_eq!(unit.pixel(), None);
        unit.shift();
        assert_eq!(
            unit.pixel(),
            Some(SpritePixel {
                pixel: 1,
                palette: 6,
                behind_background: true,
                sprite_zero: true,
            })
        );
        unit.shift();
        assert_eq!(unit.pixel(), None);
    }
}
