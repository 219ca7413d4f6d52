//! PPU tests for the NES emulator

use nes_core::bus::Bus;
use nes_core::cartridge::{Cartridge, PRG_BANK_SIZE};
use nes_core::ppu::palette::rgba;
use nes_core::ppu::registers::Status;
use nes_core::ppu::{Ppu, DOTS_PER_SCANLINE, SCANLINES_PER_FRAME};

const FRAME_DOTS: u32 = DOTS_PER_SCANLINE as u32 * SCANLINES_PER_FRAME as u32;

fn dots_to(scanline: u16, dot: u16) -> u32 {
    scanline as u32 * DOTS_PER_SCANLINE as u32 + dot as u32
}

/// Bus with an NROM cartridge carrying CHR-RAM
fn bus() -> Bus {
    let mut bus = Bus::new();
    bus.insert_cartridge(Cartridge::new(vec![0; PRG_BANK_SIZE], Vec::new()));
    bus
}

fn write(bus: &mut Bus, address: u16, value: u8) {
    bus.write_cpu(address, value).unwrap();
}

fn set_vram_address(bus: &mut Bus, address: u16) {
    write(bus, 0x2006, (address >> 8) as u8);
    write(bus, 0x2006, address as u8);
}

fn fill_vram(bus: &mut Bus, address: u16, bytes: &[u8]) {
    set_vram_address(bus, address);
    for byte in bytes {
        write(bus, 0x2007, *byte);
    }
}

fn status(bus: &Bus) -> Status {
    bus.ppu_registers().status
}

/// Tile 1 solid colour 3, nametable 0 filled with it, scroll at 0,0
fn solid_background(bus: &mut Bus) {
    fill_vram(bus, 0x0010, &[0xFF; 16]);
    fill_vram(bus, 0x2000, &[0x01; 960]);
    fill_vram(bus, 0x3F00, &[0x0F, 0x00, 0x00, 0x16]);
    fill_vram(bus, 0x3F10, &[0x0F, 0x00, 0x00, 0x2A]);
    write(bus, 0x2000, 0x00);
    write(bus, 0x2005, 0x00);
    write(bus, 0x2005, 0x00);
}

fn set_sprite(bus: &mut Bus, index: u8, y: u8, tile: u8, attributes: u8, x: u8) {
    write(bus, 0x2003, index * 4);
    for byte in [y, tile, attributes, x] {
        write(bus, 0x2004, byte);
    }
}

#[test]
fn test_vblank_set_and_cleared_on_schedule() {
    let mut bus = bus();
    let mut ppu = Ppu::new();

    ppu.step(&mut bus, dots_to(241, 1)).unwrap();
    assert!(!status(&bus).contains(Status::VBLANK));
    ppu.step(&mut bus, 1).unwrap();
    assert!(status(&bus).contains(Status::VBLANK));

    ppu.step(&mut bus, dots_to(261, 1) - dots_to(241, 2)).unwrap();
    assert!(status(&bus).contains(Status::VBLANK));
    ppu.step(&mut bus, 1).unwrap();
    assert!(!status(&bus).contains(Status::VBLANK));
}

#[test]
fn test_status_read_clears_vblank_and_toggle() {
    let mut bus = bus();
    let mut ppu = Ppu::new();
    ppu.step(&mut bus, dots_to(241, 2)).unwrap();

    // Leave the toggle half-way through a PPUADDR pair
    write(&mut bus, 0x2006, 0x21);
    let value = bus.read_cpu(0x2002).unwrap();
    assert_eq!(value & 0x80, 0x80);
    assert!(!status(&bus).contains(Status::VBLANK));
    assert!(!bus.ppu_registers().w);

    // The next pair starts from the high byte again
    set_vram_address(&mut bus, 0x2345);
    assert_eq!(bus.ppu_registers().v, 0x2345);
}

#[test]
fn test_palette_entry_zero_aliasing() {
    let mut bus = bus();
    fill_vram(&mut bus, 0x3F04, &[0x21]);
    fill_vram(&mut bus, 0x3F18, &[0x12]);
    assert_eq!(bus.read_ppu(0x3F14).unwrap(), 0x21);
    assert_eq!(bus.read_ppu(0x3F08).unwrap(), 0x12);
    // Mirrors every 32 bytes up to $3FFF
    assert_eq!(bus.read_ppu(0x3FF4).unwrap(), 0x21);
}

#[test]
fn test_ppudata_read_is_buffered() {
    let mut bus = bus();
    fill_vram(&mut bus, 0x2400, &[0xAA, 0xBB]);
    set_vram_address(&mut bus, 0x2400);
    // First read returns the stale buffer
    bus.read_cpu(0x2007).unwrap();
    assert_eq!(bus.read_cpu(0x2007).unwrap(), 0xAA);
    assert_eq!(bus.read_cpu(0x2007).unwrap(), 0xBB);

    // Palette reads are immediate
    fill_vram(&mut bus, 0x3F01, &[0x2C]);
    set_vram_address(&mut bus, 0x3F01);
    assert_eq!(bus.read_cpu(0x2007).unwrap(), 0x2C);
}

#[test]
fn test_oam_dma_copies_page_on_next_step() {
    let mut bus = bus();
    for i in 0..=0xFFu16 {
        write(&mut bus, 0x0300 + i, 0xFF - i as u8);
    }
    write(&mut bus, 0x4014, 0x03);
    let mut ppu = Ppu::new();
    ppu.step(&mut bus, 1).unwrap();

    write(&mut bus, 0x2003, 0x05);
    assert_eq!(bus.read_cpu(0x2004).unwrap(), 0xFA);
    assert_eq!(bus.ppu_registers().oam[0xFF], 0x00);
}

#[test]
fn test_background_and_sprite_rendering() {
    let mut bus = bus();
    solid_background(&mut bus);
    set_sprite(&mut bus, 0, 10, 0x01, 0x00, 20);
    write(&mut bus, 0x2001, 0x1E);

    let mut ppu = Ppu::new();
    // The first frame starts mid-setup; the pre-render line loads the scroll
    ppu.step(&mut bus, FRAME_DOTS).unwrap();

    ppu.step(&mut bus, dots_to(11, 0)).unwrap();
    assert!(!status(&bus).contains(Status::SPRITE_ZERO_HIT));
    ppu.step(&mut bus, DOTS_PER_SCANLINE as u32).unwrap();
    assert!(status(&bus).contains(Status::SPRITE_ZERO_HIT));

    let frame = ppu
        .step(&mut bus, dots_to(240, 1) - dots_to(12, 0))
        .unwrap()
        .unwrap();
    assert_eq!(frame.pixel(0, 0), rgba(0x16, false));
    assert_eq!(frame.pixel(100, 100), rgba(0x16, false));
    // Sprite Y is one less than the first line it covers
    assert_eq!(frame.pixel(20, 10), rgba(0x16, false));
    assert_eq!(frame.pixel(20, 11), rgba(0x2A, false));
    assert_eq!(frame.pixel(27, 18), rgba(0x2A, false));
    assert_eq!(frame.pixel(28, 18), rgba(0x16, false));
}

#[test]
fn test_sprite_behind_background() {
    let mut bus = bus();
    solid_background(&mut bus);
    set_sprite(&mut bus, 0, 10, 0x01, 0x20, 20);
    write(&mut bus, 0x2001, 0x1E);

    let mut ppu = Ppu::new();
    ppu.step(&mut bus, FRAME_DOTS).unwrap();
    let frame = ppu.step(&mut bus, dots_to(240, 1)).unwrap().unwrap();
    assert_eq!(frame.pixel(20, 11), rgba(0x16, false));
    // Hidden sprite 0 still registers a hit
    assert!(status(&bus).contains(Status::SPRITE_ZERO_HIT));
}

#[test]
fn test_only_eight_sprites_per_line() {
    let mut bus = bus();
    solid_background(&mut bus);
    for i in 0..10 {
        set_sprite(&mut bus, i, 50, 0x01, 0x00, i * 16);
    }
    // Sprites only, including the left edge
    write(&mut bus, 0x2001, 0x14);

    let mut ppu = Ppu::new();
    ppu.step(&mut bus, FRAME_DOTS).unwrap();
    let frame = ppu.step(&mut bus, dots_to(240, 1)).unwrap().unwrap();

    let sprite = rgba(0x2A, false);
    let backdrop = rgba(0x0F, false);
    for i in 0..8 {
        assert_eq!(frame.pixel(i * 16, 51), sprite, "sprite {i}");
    }
    assert_eq!(frame.pixel(128, 51), backdrop);
    assert_eq!(frame.pixel(144, 51), backdrop);
}

#[test]
fn test_left_column_clipping() {
    let mut bus = bus();
    solid_background(&mut bus);
    // Background on, left 8 pixels hidden
    write(&mut bus, 0x2001, 0x08);

    let mut ppu = Ppu::new();
    ppu.step(&mut bus, FRAME_DOTS).unwrap();
    let frame = ppu.step(&mut bus, dots_to(240, 1)).unwrap().unwrap();
    assert_eq!(frame.pixel(7, 100), rgba(0x0F, false));
    assert_eq!(frame.pixel(8, 100), rgba(0x16, false));
}

#[test]
fn test_sprite_size_switch_between_evaluation_and_fetch() {
    let mut bus = bus();
    // Tiles $10/$11 solid for the 8x16 sprite
    fill_vram(&mut bus, 0x0100, &[0xFF; 32]);
    solid_background(&mut bus);
    set_sprite(&mut bus, 0, 10, 0x10, 0x80, 20);
    write(&mut bus, 0x2000, 0x20);
    write(&mut bus, 0x2001, 0x1E);

    let mut ppu = Ppu::new();
    ppu.step(&mut bus, FRAME_DOTS).unwrap();
    ppu.step(&mut bus, dots_to(19, 257)).unwrap();
    // Back to 8x8 after line 19 was evaluated as 8x16
    write(&mut bus, 0x2000, 0x00);
    ppu.step(&mut bus, 8).unwrap();
    let frame = ppu
        .step(&mut bus, dots_to(240, 1) - dots_to(19, 265))
        .unwrap()
        .unwrap();

    // Line 20 still gets the tall sprite's row; later lines use 8x8
    assert_eq!(frame.pixel(20, 20), rgba(0x2A, false));
    assert_eq!(frame.pixel(20, 21), rgba(0x16, false));
}

#[test]
fn test_rendering_reenabled_mid_line() {
    let mut bus = bus();
    solid_background(&mut bus);
    set_sprite(&mut bus, 0, 11, 0x01, 0x80, 20);
    write(&mut bus, 0x2001, 0x1E);

    let mut ppu = Ppu::new();
    ppu.step(&mut bus, FRAME_DOTS).unwrap();
    ppu.step(&mut bus, dots_to(19, 0)).unwrap();
    // Rendering off across dot 1 of line 19
    write(&mut bus, 0x2001, 0x00);
    ppu.step(&mut bus, 10).unwrap();
    write(&mut bus, 0x2001, 0x1E);
    let frame = ppu
        .step(&mut bus, dots_to(240, 1) - dots_to(19, 10))
        .unwrap()
        .unwrap();

    // The sprite covers lines 12-19 and nothing stale follows it
    assert_eq!(frame.pixel(20, 15), rgba(0x2A, false));
    assert_eq!(frame.pixel(20, 20), rgba(0x16, false));
}
