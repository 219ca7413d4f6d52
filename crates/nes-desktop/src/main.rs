//! NES Desktop - Desktop NES emulator with minifb rendering
//!
//! This is a desktop frontend for the NES emulator core that uses:
//! - minifb for window creation, blitting and keyboard input

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use minifb::{Key, Scale, Window, WindowOptions};
use nes_core::cartridge::Cartridge;
use nes_core::controller::{Button, ButtonState, InputSource};
use nes_core::frame::{FrameBuffer, Renderer, HEIGHT, WIDTH};
use nes_core::{EmulatorConfig, ErrorPolicy, NesSystem};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// NES Emulator Desktop App
#[derive(Parser, Debug)]
#[command(name = "nes-desktop")]
#[command(about = "A NES emulator desktop app", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Screen scale factor (1, 2, 4 or 8)
    #[arg(short, long, default_value = "2")]
    scale: usize,

    /// Log step errors and keep going instead of stopping
    #[arg(long)]
    continue_on_error: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

/// Keyboard layout: Z/X for A/B, right shift for Select, Enter for Start
const KEYMAP: [(Key, Button); 8] = [
    (Key::Z, Button::A),
    (Key::X, Button::B),
    (Key::RightShift, Button::Select),
    (Key::Enter, Button::Start),
    (Key::Up, Button::Up),
    (Key::Down, Button::Down),
    (Key::Left, Button::Left),
    (Key::Right, Button::Right),
];

/// Button state written by the window loop and read by controller port 1
#[derive(Debug, Clone, Default)]
struct Keyboard(Rc<Cell<ButtonState>>);

impl Keyboard {
    fn poll(&self, window: &Window) {
        let state = KEYMAP
            .iter()
            .filter(|(key, _)| window.is_key_down(*key))
            .fold(ButtonState::default(), |state, (_, button)| state.with(*button));
        self.0.set(state);
    }
}

impl InputSource for Keyboard {
    fn is_pressed(&self, button: Button) -> bool {
        self.0.get().is_pressed(button)
    }
}

/// Blits each completed frame into the window
struct WindowRenderer {
    window: Window,
}

impl Renderer for WindowRenderer {
    fn render(&mut self, frame: &FrameBuffer) {
        if let Err(err) = self
            .window
            .update_with_buffer(&frame.to_rgb32(), WIDTH, HEIGHT)
        {
            warn!(%err, "window update failed");
        }
    }
}

fn window_scale(scale: usize) -> Scale {
    match scale {
        0 | 1 => Scale::X1,
        2 | 3 => Scale::X2,
        4..=7 => Scale::X4,
        _ => Scale::X8,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cartridge = Cartridge::load(&args.rom)
        .with_context(|| format!("failed to load {}", args.rom.display()))?;
    info!(
        prg = cartridge.prg_rom().len(),
        chr = cartridge.chr().len(),
        "loaded cartridge"
    );

    let mut config = EmulatorConfig::default();
    if args.continue_on_error {
        config = config.with_error_policy(ErrorPolicy::LogAndContinue);
    }
    let mut system = NesSystem::with_config(config);
    system.insert_cartridge(cartridge);

    let keyboard = Keyboard::default();
    system.set_controller(0, Box::new(keyboard.clone()));
    system.reset().context("reset failed")?;

    let mut window = Window::new(
        "NES Emulator",
        WIDTH,
        HEIGHT,
        WindowOptions {
            resize: false,
            scale: window_scale(args.scale),
            ..WindowOptions::default()
        },
    )
    .context("failed to create window")?;
    window.set_target_fps(60);
    let mut renderer = WindowRenderer { window };

    info!("press ESC or close the window to exit");
    while renderer.window.is_open() && !renderer.window.is_key_down(Key::Escape) {
        keyboard.poll(&renderer.window);
        system.run_frames(1, &mut renderer)?;
    }

    info!(frames = system.frame_count(), "emulator closed");
    Ok(())
}
