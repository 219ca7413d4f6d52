//! NES CLI - Headless runner for the NES emulator core
//!
//! Runs a ROM for a number of frames or instructions, optionally writing a
//! nestest-format trace and a PNG of the last frame.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use nes_core::cartridge::Cartridge;
use nes_core::frame::{FrameBuffer, LastFrame, HEIGHT, WIDTH};
use nes_core::{EmulatorConfig, ErrorPolicy, NesSystem};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// NES Emulator CLI
#[derive(Parser, Debug)]
#[command(name = "nes-cli")]
#[command(about = "A headless NES emulator runner", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Number of frames to run
    #[arg(short, long, default_value = "60")]
    frames: u64,

    /// Run this many instructions instead of whole frames
    #[arg(short, long)]
    instructions: Option<u64>,

    /// Write a nestest-format trace line per instruction (stdout when no file
    /// is given)
    #[arg(short, long, num_args = 0..=1, default_missing_value = "-")]
    trace: Option<String>,

    /// Start execution here instead of the reset vector (hex, e.g. C000)
    #[arg(long, value_parser = parse_hex_u16)]
    start_pc: Option<u16>,

    /// Save the last completed frame as a PNG
    #[arg(short, long)]
    screenshot: Option<PathBuf>,

    /// Dump CPU state after execution
    #[arg(short = 'c', long)]
    dump_cpu: bool,

    /// Dump PPU state after execution
    #[arg(short = 'p', long)]
    dump_ppu: bool,

    /// Log step errors and keep going instead of stopping
    #[arg(long)]
    continue_on_error: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches('$');
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address {s:?}: {e}"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
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
        chr_ram = cartridge.chr_is_ram(),
        "loaded cartridge"
    );

    let config = EmulatorConfig {
        start_pc: args.start_pc,
        error_policy: if args.continue_on_error {
            ErrorPolicy::LogAndContinue
        } else {
            ErrorPolicy::Halt
        },
        max_frames: None,
    };
    let mut system = NesSystem::with_config(config);
    system.insert_cartridge(cartridge);
    system.reset().context("reset failed")?;

    let mut trace = match args.trace.as_deref() {
        None => None,
        Some("-") => Some(Box::new(io::stdout().lock()) as Box<dyn Write>),
        Some(path) => Some(Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {path}"))?,
        )) as Box<dyn Write>),
    };

    let last_frame = if args.instructions.is_some() || trace.is_some() {
        let limit = args.instructions.unwrap_or(u64::MAX);
        run_instructions(&mut system, limit, args.frames, &mut trace)?
    } else {
        let mut renderer = LastFrame::default();
        let frames = system.run_frames(args.frames, &mut renderer)?;
        info!(frames, "run complete");
        renderer.frame
    };

    if let Some(out) = trace.as_mut() {
        out.flush()?;
    }

    if let Some(path) = &args.screenshot {
        match &last_frame {
            Some(frame) => {
                save_png(frame, path)?;
                info!(path = %path.display(), "screenshot saved");
            }
            None => warn!("no frame completed, screenshot skipped"),
        }
    }

    if args.dump_cpu {
        dump_cpu_state(&system);
    }
    if args.dump_ppu {
        dump_ppu_state(&system);
    }
    Ok(())
}

/// Step instruction by instruction, tracing each one
///
/// Stops after `limit` instructions or `frames` completed frames, whichever
/// comes first.
fn run_instructions(
    system: &mut NesSystem,
    limit: u64,
    frames: u64,
    trace: &mut Option<Box<dyn Write>>,
) -> Result<Option<FrameBuffer>> {
    let mut last_frame = None;
    let mut completed = 0;
    for _ in 0..limit {
        if let Some(out) = trace.as_mut() {
            match system.trace_line() {
                Ok(line) => writeln!(out, "{line}")?,
                Err(err) => writeln!(out, "{:04X}  {err}", system.cpu().registers().pc)?,
            }
        }
        match system.step() {
            Ok((_, Some(frame))) => {
                last_frame = Some(frame);
                completed += 1;
                if completed >= frames {
                    break;
                }
            }
            Ok((_, None)) => {}
            Err(err) if system.config().error_policy == ErrorPolicy::LogAndContinue => {
                warn!(%err, "step failed, continuing");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(last_frame)
}

fn save_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), WIDTH as u32, HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(frame.pixels())?;
    Ok(())
}

fn dump_cpu_state(system: &NesSystem) {
    let cpu = system.cpu();
    let regs = cpu.registers();

    println!("\nCPU State:");
    println!("  A:    ${:02X}", regs.a);
    println!("  X:    ${:02X}", regs.x);
    println!("  Y:    ${:02X}", regs.y);
    println!("  PC:   ${:04X}", regs.pc);
    println!("  SP:   ${:02X}", regs.s);
    println!("  P:    ${:02X} ({:?})", regs.p.bits(), regs.p);
    println!("  Cycles: {}", cpu.total_cycles());
}

fn dump_ppu_state(system: &NesSystem) {
    let ppu = system.ppu();
    let regs = system.bus().ppu_registers();

    println!("\nPPU State:");
    println!("  Scanline: {}", ppu.scanline());
    println!("  Dot:      {}", ppu.dot());
    println!("  Frames:   {}", ppu.frame_count());
    println!("  CTRL:     ${:02X}", regs.ctrl.bits());
    println!("  MASK:     ${:02X}", regs.mask.bits());
    println!("  STATUS:   ${:02X} ({:?})", regs.status.bits(), regs.status);
    println!("  v: ${:04X}  t: ${:04X}  x: {}  w: {}", regs.v, regs.t, regs.x, regs.w);
}
