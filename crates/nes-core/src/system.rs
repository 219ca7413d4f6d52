//! NES System Integration
//!
//! This module wires CPU, PPU and Bus into a session and drives them in
//! lock-step: one CPU instruction, then three PPU dots per CPU cycle.

use tracing::{debug, warn};

use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::config::{EmulatorConfig, ErrorPolicy};
use crate::controller::InputSource;
use crate::cpu::Cpu;
use crate::error::NesError;
use crate::frame::{FrameBuffer, Renderer};
use crate::ppu::Ppu;
use crate::trace;

/// PPU dots per CPU cycle (NTSC)
pub const DOTS_PER_CYCLE: u32 = 3;

/// Cycles charged for an instruction that failed under `LogAndContinue`
const FAILED_STEP_CYCLES: u32 = 2;

/// NES System - owns every component of one emulation session
#[derive(Debug)]
pub struct NesSystem {
    cpu: Cpu,
    ppu: Ppu,
    bus: Bus,
    config: EmulatorConfig,
    /// Frames handed to a renderer
    frame_count: u64,
}

impl NesSystem {
    /// Create a new NES system with no cartridge
    pub fn new() -> Self {
        Self::with_config(EmulatorConfig::default())
    }

    pub fn with_config(config: EmulatorConfig) -> Self {
        let mut cpu = Cpu::new();
        cpu.set_start_pc(config.start_pc);
        Self {
            cpu,
            ppu: Ppu::new(),
            bus: Bus::new(),
            config,
            frame_count: 0,
        }
    }

    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        self.bus.insert_cartridge(cartridge);
    }

    /// Reset the CPU and run the reset sequence
    ///
    /// PPU state and memory are left alone.
    pub fn reset(&mut self) -> Result<(), NesError> {
        self.cpu.reset();
        self.step()?;
        Ok(())
    }

    /// Step the system by one CPU instruction (or reset/interrupt entry)
    ///
    /// Returns the cycles used and the frame completed during this step,
    /// if any.
    pub fn step(&mut self) -> Result<(u8, Option<FrameBuffer>), NesError> {
        let cycles = self.cpu.step(&mut self.bus)?;
        let frame = self
            .ppu
            .step(&mut self.bus, cycles as u32 * DOTS_PER_CYCLE)?;
        Ok((cycles, frame))
    }

    /// Run until the PPU completes a frame
    pub fn run_frame(&mut self) -> Result<FrameBuffer, NesError> {
        loop {
            match self.step() {
                Ok((_, Some(frame))) => return Ok(frame),
                Ok((_, None)) => {}
                Err(err) => self.recover(err)?,
            }
        }
    }

    /// Run `frames` frames, handing each to `renderer`
    ///
    /// The count is capped by `EmulatorConfig::max_frames`. Returns the
    /// number of frames rendered.
    pub fn run_frames(
        &mut self,
        frames: u64,
        renderer: &mut impl Renderer,
    ) -> Result<u64, NesError> {
        let limit = self.config.frame_limit(frames);
        for _ in 0..limit {
            let frame = self.run_frame()?;
            renderer.render(&frame);
            self.frame_count += 1;
        }
        debug!(frames = limit, total = self.frame_count, "frames rendered");
        Ok(limit)
    }

    /// Apply the error policy to a failed step
    ///
    /// Setup errors always halt: nothing useful can run without a
    /// cartridge.
    fn recover(&mut self, err: NesError) -> Result<(), NesError> {
        match (self.config.error_policy, err) {
            (ErrorPolicy::LogAndContinue, NesError::Setup(_)) | (ErrorPolicy::Halt, _) => Err(err),
            (ErrorPolicy::LogAndContinue, _) => {
                warn!(%err, pc = self.cpu.registers().pc, "step failed, continuing");
                self.ppu
                    .step(&mut self.bus, FAILED_STEP_CYCLES * DOTS_PER_CYCLE)?;
                Ok(())
            }
        }
    }

    /// nestest-format line for the instruction about to run
    pub fn trace_line(&self) -> Result<String, NesError> {
        trace::trace_line(&self.cpu, &self.bus, &self.ppu)
    }

    /// Attach an input source to controller port 0 or 1
    pub fn set_controller(&mut self, port: usize, source: Box<dyn InputSource>) {
        self.bus.set_input(port, source);
    }

    pub fn total_cycles(&self) -> u64 {
        self.cpu.total_cycles()
    }

    /// Frames handed out by `run_frames`
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }
}

impl Default for NesSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::PRG_BANK_SIZE;
    use crate::error::SetupError;

    /// 16K image that loops on JMP $C000 with the reset vector at $C000
    fn looping_cartridge() -> Cartridge {
        let mut prg = vec![0xEA; PRG_BANK_SIZE];
        prg[0..3].copy_from_slice(&[0x4C, 0x00, 0xC0]);
        prg[0x3FFC] = 0x00;
        prg[0x3FFD] = 0xC0;
        Cartridge::new(prg, Vec::new())
    }

    #[test]
    fn test_reset_runs_vector_and_ppu() {
        let mut system = NesSystem::new();
        system.insert_cartridge(looping_cartridge());
        system.reset().unwrap();
        assert_eq!(system.cpu().registers().pc, 0xC000);
        assert_eq!(system.total_cycles(), 7);
        assert_eq!((system.ppu().scanline(), system.ppu().dot()), (0, 21));
    }

    #[test]
    fn test_reset_without_cartridge_fails() {
        let mut system = NesSystem::new();
        assert_eq!(
            system.reset(),
            Err(NesError::Setup(SetupError::NoCartridge))
        );
    }

    #[test]
    fn test_start_pc_override() {
        let config = EmulatorConfig::default().with_start_pc(0xC000);
        let mut system = NesSystem::with_config(config);
        system.insert_cartridge(Cartridge::new(vec![0xEA; PRG_BANK_SIZE], Vec::new()));
        system.reset().unwrap();
        assert_eq!(system.cpu().registers().pc, 0xC000);
    }

    #[test]
    fn test_setup_error_halts_under_any_policy() {
        let config = EmulatorConfig::default().with_error_policy(ErrorPolicy::LogAndContinue);
        let mut system = NesSystem::with_config(config);
        assert!(system.run_frame().is_err());
    }
}
