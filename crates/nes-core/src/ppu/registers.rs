//! PPU register file: the CPU-visible registers plus the internal
//! scroll/address latches (`v`, `t`, `x`, `w`)

use bitflags::bitflags;

bitflags! {
    /// PPUCTRL (`$2000`)
    ///
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// V P H B S I N N
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Control: u8 {
        /// Base nametable select
        const NAMETABLE        = 0b0000_0011;
        /// VRAM increment per PPUDATA access: 0 = +1, 1 = +32
        const INCREMENT_32     = 0b0000_0100;
        /// Sprite pattern table for 8x8 sprites
        const SPRITE_TABLE     = 0b0000_1000;
        const BACKGROUND_TABLE = 0b0001_0000;
        const SPRITE_SIZE_16   = 0b0010_0000;
        const MASTER_SLAVE     = 0b0100_0000;
        /// Assert NMI while VBlank is set
        const GENERATE_NMI     = 0b1000_0000;
    }
}

impl Control {
    pub fn vram_increment(self) -> u16 {
        if self.contains(Control::INCREMENT_32) {
            32
        } else {
            1
        }
    }

    /// Pattern table index (0 or 1) used for 8x8 sprites
    pub fn sprite_table(self) -> u8 {
        self.contains(Control::SPRITE_TABLE) as u8
    }

    pub fn background_table(self) -> u8 {
        self.contains(Control::BACKGROUND_TABLE) as u8
    }

    pub fn sprite_height(self) -> u8 {
        if self.contains(Control::SPRITE_SIZE_16) {
            16
        } else {
            8
        }
    }

    pub fn nmi_enabled(self) -> bool {
        self.contains(Control::GENERATE_NMI)
    }
}

bitflags! {
    /// PPUMASK (`$2001`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Mask: u8 {
        const GRAYSCALE         = 0b0000_0001;
        /// Show background in the leftmost 8 pixels
        const SHOW_BG_LEFT      = 0b0000_0010;
        /// Show sprites in the leftmost 8 pixels
        const SHOW_SPRITES_LEFT = 0b0000_0100;
        const SHOW_BACKGROUND   = 0b0000_1000;
        const SHOW_SPRITES      = 0b0001_0000;
        const EMPHASIZE_RED     = 0b0010_0000;
        const EMPHASIZE_GREEN   = 0b0100_0000;
        const EMPHASIZE_BLUE    = 0b1000_0000;
    }
}

impl Mask {
    pub fn rendering_enabled(self) -> bool {
        self.intersects(Mask::SHOW_BACKGROUND | Mask::SHOW_SPRITES)
    }
}

bitflags! {
    /// PPUSTATUS (`$2002`); the low five bits read back as open bus
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        const SPRITE_OVERFLOW = 0b0010_0000;
        const SPRITE_ZERO_HIT = 0b0100_0000;
        const VBLANK          = 0b1000_0000;
    }
}

// Loopy register layout: yyy NN YYYYY XXXXX
const COARSE_X: u16 = 0x001F;
const COARSE_Y: u16 = 0x03E0;
const NAMETABLE_X: u16 = 0x0400;
const NAMETABLE_Y: u16 = 0x0800;
const FINE_Y: u16 = 0x7000;

/// Everything the CPU can reach through `$2000-$2007` and `$4014`
#[derive(Debug, Clone)]
pub struct PpuRegisters {
    pub ctrl: Control,
    pub mask: Mask,
    pub status: Status,
    pub oam_addr: u8,
    /// Primary OAM: 64 sprites of Y, tile, attributes, X
    pub oam: [u8; 256],
    /// Current VRAM address
    pub v: u16,
    /// Temporary VRAM address / top-left scroll position
    pub t: u16,
    /// Fine X scroll
    pub x: u8,
    /// First/second write toggle shared by $2005 and $2006
    pub w: bool,
    /// Delayed PPUDATA read value
    pub read_buffer: u8,
    /// Last value driven onto the PPU data bus
    pub open_bus: u8,
    /// Page latched by a $4014 write, consumed by the next PPU step
    pub dma_page: Option<u8>,
}

impl Default for PpuRegisters {
    fn default() -> Self {
        Self {
            ctrl: Control::empty(),
            mask: Mask::empty(),
            status: Status::empty(),
            oam_addr: 0,
            oam: [0; 256],
            v: 0,
            t: 0,
            x: 0,
            w: false,
            read_buffer: 0,
            open_bus: 0,
            dma_page: None,
        }
    }
}

impl PpuRegisters {
    /// NMI line level: enabled and in VBlank
    pub fn nmi_asserted(&self) -> bool {
        self.ctrl.nmi_enabled() && self.status.contains(Status::VBLANK)
    }

    pub fn write_ctrl(&mut self, value: u8) {
        self.ctrl = Control::from_bits_retain(value);
        self.t = (self.t & !(NAMETABLE_X | NAMETABLE_Y)) | (((value & 0x03) as u16) << 10);
    }

    /// $2002 read: clears VBlank and the write toggle
    pub fn read_status(&mut self) -> u8 {
        let value = (self.status.bits() & 0xE0) | (self.open_bus & 0x1F);
        self.status.remove(Status::VBLANK);
        self.w = false;
        value
    }

    pub fn write_scroll(&mut self, value: u8) {
        if !self.w {
            self.t = (self.t & !COARSE_X) | (value >> 3) as u16;
            self.x = value & 0x07;
        } else {
            self.t = (self.t & !(FINE_Y | COARSE_Y))
                | (((value & 0x07) as u16) << 12)
                | (((value & 0xF8) as u16) << 2);
        }
        self.w = !self.w;
    }

    pub fn write_addr(&mut self, value: u8) {
        if !self.w {
            self.t = (self.t & 0x00FF) | (((value & 0x3F) as u16) << 8);
        } else {
            self.t = (self.t & 0xFF00) | value as u16;
            self.v = self.t;
        }
        self.w = !self.w;
    }

    pub fn increment_vram_addr(&mut self) {
        self.v = self.v.wrapping_add(self.ctrl.vram_increment()) & 0x7FFF;
    }

    /// Nametable-space address of the tile `v` points at
    pub fn tile_address(&self) -> u16 {
        0x2000 | (self.v & 0x0FFF)
    }

    pub fn coarse_x(&self) -> u8 {
        (self.v & COARSE_X) as u8
    }

    pub fn coarse_y(&self) -> u8 {
        ((self.v & COARSE_Y) >> 5) as u8
    }

    pub fn fine_y(&self) -> u8 {
        ((self.v & FINE_Y) >> 12) as u8
    }

    pub fn nametable(&self) -> u8 {
        ((self.v >> 10) & 0x03) as u8
    }

    /// Coarse X increment with horizontal nametable switch
    pub fn increment_x(&mut self) {
        if self.v & COARSE_X == 31 {
            self.v &= !COARSE_X;
            self.v ^= NAMETABLE_X;
        } else {
            self.v += 1;
        }
    }

    /// Fine Y increment, carrying into coarse Y and the vertical nametable
    pub fn increment_y(&mut self) {
        if self.v & FINE_Y != FINE_Y {
            self.v += 0x1000;
            return;
        }
        self.v &= !FINE_Y;
        let mut y = (self.v & COARSE_Y) >> 5;
        if y == 29 {
            y = 0;
            self.v ^= NAMETABLE_Y;
        } else if y == 31 {
            y = 0;
        } else {
            y += 1;
        }
        self.v = (self.v & !COARSE_Y) | (y << 5);
    }

    pub fn copy_horizontal(&mut self) {
        let bits = COARSE_X | NAMETABLE_X;
        self.v = (self.v & !bits) | (self.t & bits);
    }

    pub fn copy_vertical(&mut self) {
        let bits = FINE_Y | NAMETABLE_Y | COARSE_Y;
        self.v = (self.v & !bits) | (self.t & bits);
    }
}
