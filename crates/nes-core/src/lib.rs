//! NES Core - Pure Rust NES emulator library
//!
//! This crate provides the emulation engine for a Nintendo Entertainment
//! System: the 2A03 CPU, the 2C02 PPU and the bus that wires them to RAM,
//! VRAM and an NROM cartridge. Frame output and controller input go
//! through the [`frame::Renderer`] and [`controller::InputSource`] traits;
//! nothing here touches a window, a file system path or global state
//! beyond [`cartridge::Cartridge::load`].

#![forbid(unsafe_code)]

/// Error taxonomy shared by every component
pub mod error;
/// CPU module containing the 2A03 (6502 variant) implementation
pub mod cpu;
/// Memory bus and mapping
pub mod bus;
/// PPU (Picture Processing Unit) implementation
pub mod ppu;
/// Controller ports and the input seam
pub mod controller;
/// iNES images and NROM cartridges
pub mod cartridge;
/// Frame buffer and the renderer seam
pub mod frame;
/// Session configuration
pub mod config;
/// nestest-style trace output
pub mod trace;
/// Integration module for complete NES system
pub mod system;

pub use config::{EmulatorConfig, ErrorPolicy};
pub use error::NesError;
pub use system::NesSystem;
