//! PPU (Picture Processing Unit) implementation
//!
//! The PPU runs as a dot/scanline state machine, three dots per CPU cycle.
//! Key timing:
//! - 341 dots per scanline, 262 scanlines per frame
//! - Scanlines 0-239 are visible, 240 is idle, 241-260 are VBlank
//! - Scanline 261 is the pre-render line
//!
//! Registers and memory live on the [`Bus`]; this type owns only the
//! counters, the pixel pipelines and the frame being drawn.

pub mod background;
pub mod palette;
pub mod registers;
pub mod sprites;

use tracing::trace;

use crate::bus::Bus;
use crate::error::NesError;
use crate::frame::FrameBuffer;

use self::background::BackgroundPipeline;
use self::registers::{Mask, Status};
use self::sprites::{SpritePixel, SpriteUnit};

/// Dots per scanline
pub const DOTS_PER_SCANLINE: u16 = 341;
/// Scanlines per frame, including VBlank and pre-render
pub const SCANLINES_PER_FRAME: u16 = 262;
/// First VBlank scanline
pub const VBLANK_SCANLINE: u16 = 241;
/// Idle line on which the finished frame is handed out
pub const POST_RENDER_SCANLINE: u16 = 240;
pub const PRE_RENDER_SCANLINE: u16 = 261;

/// PPU dot/scanline state machine
#[derive(Debug, Clone)]
pub struct Ppu {
    dot: u16,
    scanline: u16,
    background: BackgroundPipeline,
    sprites: SpriteUnit,
    frame: FrameBuffer,
    /// Set once the current frame has been handed out
    rendered: bool,
    frame_count: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            dot: 0,
            scanline: 0,
            background: BackgroundPipeline::default(),
            sprites: SpriteUnit::default(),
            frame: FrameBuffer::new(),
            rendered: false,
            frame_count: 0,
        }
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    /// Frames completed since power-up
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frame currently being drawn
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Advance by `dots` PPU dots
    ///
    /// A pending OAM DMA runs first. Returns a copy of the frame when the
    /// post-render line was reached during this call.
    pub fn step(&mut self, bus: &mut Bus, dots: u32) -> Result<Option<FrameBuffer>, NesError> {
        bus.run_oam_dma()?;

        let mut completed = None;
        for _ in 0..dots {
            if let Some(frame) = self.tick(bus)? {
                completed = Some(frame);
            }
        }
        Ok(completed)
    }

    fn tick(&mut self, bus: &mut Bus) -> Result<Option<FrameBuffer>, NesError> {
        let mut completed = None;
        let rendering = bus.ppu.mask.rendering_enabled();

        match self.scanline {
            0..=239 => {
                if self.dot == 1 {
                    self.sprites.start_line();
                }
                if rendering {
                    self.run_pipeline(bus, false)?;
                }
                if (1..=256).contains(&self.dot) {
                    self.composite(bus)?;
                }
            }
            POST_RENDER_SCANLINE => {
                if !self.rendered {
                    self.rendered = true;
                    trace!(frame = self.frame_count, "frame complete");
                    completed = Some(self.frame.clone());
                }
            }
            VBLANK_SCANLINE if self.dot == 1 => {
                bus.ppu.status.insert(Status::VBLANK);
            }
            PRE_RENDER_SCANLINE => {
                if self.dot == 1 {
                    bus.ppu
                        .status
                        .remove(Status::VBLANK | Status::SPRITE_ZERO_HIT | Status::SPRITE_OVERFLOW);
                    self.sprites.clear_slots();
                    self.rendered = false;
                }
                if rendering {
                    self.run_pipeline(bus, true)?;
                }
            }
            _ => {}
        }

        bus.signal_nmi(bus.ppu.nmi_asserted());
        self.advance();
        Ok(completed)
    }

    fn advance(&mut self) {
        self.dot += 1;
        if self.dot < DOTS_PER_SCANLINE {
            return;
        }
        self.dot = 0;
        self.scanline += 1;
        if self.scanline == SCANLINES_PER_FRAME {
            self.scanline = 0;
            self.frame_count += 1;
        }
    }

    /// Fetches, shifts and scroll updates shared by visible and pre-render
    /// lines
    fn run_pipeline(&mut self, bus: &mut Bus, pre_render: bool) -> Result<(), NesError> {
        let dot = self.dot;

        if (1..=64).contains(&dot) {
            self.sprites.clear_step(dot);
        }
        if !pre_render && (65..=256).contains(&dot) {
            let height = bus.ppu.ctrl.sprite_height();
            self.sprites
                .evaluate_step(&bus.ppu.oam, dot, self.scanline, height);
        }

        if (2..=257).contains(&dot) || (322..=337).contains(&dot) {
            self.background.shift();
        }
        if !pre_render && (2..=257).contains(&dot) {
            self.sprites.shift();
        }
        if (1..=257).contains(&dot) || (321..=337).contains(&dot) {
            self.background.fetch(bus, (dot - 1) % 8)?;
        }

        match dot {
            256 => bus.ppu.increment_y(),
            257 => bus.ppu.copy_horizontal(),
            280..=304 if pre_render => bus.ppu.copy_vertical(),
            _ => {}
        }

        if (257..=320).contains(&dot) {
            self.sprites.fetch_step(bus, dot, self.scanline)?;
        }
        Ok(())
    }

    /// Pick the pixel at (dot - 1, scanline) and write it to the frame
    fn composite(&mut self, bus: &mut Bus) -> Result<(), NesError> {
        let x = self.dot - 1;
        let mask = bus.ppu.mask;
        let left_edge = x < 8;

        let (bg_pixel, bg_palette) = if mask.contains(Mask::SHOW_BACKGROUND)
            && (!left_edge || mask.contains(Mask::SHOW_BG_LEFT))
        {
            self.background.pixel(bus.ppu.x)
        } else {
            (0, 0)
        };
        let sprite = if mask.contains(Mask::SHOW_SPRITES)
            && (!left_edge || mask.contains(Mask::SHOW_SPRITES_LEFT))
        {
            self.sprites.pixel()
        } else {
            None
        };

        let color = match (bg_pixel, sprite) {
            (0, None) => bus.backdrop(),
            (0, Some(s)) => sprite_color(bus, s)?,
            (_, None) => bus.palette_entry(bg_palette, bg_pixel)?,
            (_, Some(s)) => {
                if s.sprite_zero && x != 255 {
                    bus.ppu.status.insert(Status::SPRITE_ZERO_HIT);
                }
                if s.behind_background {
                    bus.palette_entry(bg_palette, bg_pixel)?
                } else {
                    sprite_color(bus, s)?
                }
            }
        };

        let rgba = palette::rgba(color, mask.contains(Mask::GRAYSCALE));
        self.frame
            .set_pixel(x as usize, self.scanline as usize, rgba);
        Ok(())
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

fn sprite_color(bus: &Bus, sprite: SpritePixel) -> Result<u8, NesError> {
    Ok(bus.palette_entry(sprite.palette, sprite.pixel)?)
}
