//! CPU module - 2A03 (6502 variant) implementation
//!
//! The NES uses a modified 6502 CPU without decimal mode. Each `step()`
//! either services a pending reset/interrupt or runs one whole instruction
//! and reports the cycles it took.

pub mod addressing;
pub mod instructions;
pub mod opcodes;
pub mod registers;

use tracing::{debug, trace};

use crate::bus::Bus;
use crate::error::{DecodeError, NesError};

pub use addressing::Instruction;
pub use opcodes::{AddressingMode, Mnemonic, OpcodeEntry, Timing};
pub use registers::{CpuRegisters, StatusFlags};

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles spent by the reset sequence and by interrupt entry
pub const INTERRUPT_CYCLES: u8 = 7;

/// 2A03 CPU
#[derive(Debug, Clone)]
pub struct Cpu {
    regs: CpuRegisters,
    reset_pending: bool,
    /// NMI line level seen at the previous step, for edge detection
    nmi_previous: bool,
    nmi_pending: bool,
    /// Entry point used instead of the reset vector
    start_pc: Option<u16>,
    total_cycles: u64,
}

impl Cpu {
    /// Create a CPU with a reset pending
    pub fn new() -> Self {
        Self {
            regs: CpuRegisters::default(),
            reset_pending: true,
            nmi_previous: false,
            nmi_pending: false,
            start_pc: None,
            total_cycles: 0,
        }
    }

    /// Request a reset; it runs on the next `step()`
    pub fn reset(&mut self) {
        self.reset_pending = true;
    }

    /// Override the reset vector (e.g. $C000 for nestest automation)
    pub fn set_start_pc(&mut self, pc: Option<u16>) {
        self.start_pc = pc;
    }

    pub fn registers(&self) -> &CpuRegisters {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut CpuRegisters {
        &mut self.regs
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Run one reset, interrupt entry or instruction
    pub fn step(&mut self, bus: &mut Bus) -> Result<u8, NesError> {
        let cycles = self.step_inner(bus)?;
        self.total_cycles += cycles as u64;
        Ok(cycles)
    }

    fn step_inner(&mut self, bus: &mut Bus) -> Result<u8, NesError> {
        if self.reset_pending {
            return self.run_reset(bus);
        }

        let line = bus.nmi_line();
        if line && !self.nmi_previous {
            self.nmi_pending = true;
        }
        self.nmi_previous = line;

        if self.nmi_pending {
            self.nmi_pending = false;
            trace!("NMI");
            self.interrupt(bus, NMI_VECTOR)?;
            return Ok(INTERRUPT_CYCLES);
        }

        if bus.irq_line() && !self.regs.p.contains(StatusFlags::INTERRUPT) {
            trace!("IRQ");
            self.interrupt(bus, IRQ_VECTOR)?;
            return Ok(INTERRUPT_CYCLES);
        }

        let ins = match self.fetch(bus) {
            Ok(ins) => ins,
            Err(err) => {
                // The opcode fetch already moved past the bad byte
                self.regs.pc = self.regs.pc.wrapping_add(1);
                return Err(err);
            }
        };
        trace!(
            pc = ins.pc,
            mnemonic = %ins.entry.mnemonic,
            "execute"
        );
        self.regs.pc = ins.next_pc();
        let extra = instructions::execute(&mut self.regs, bus, &ins)?;
        Ok(ins.entry.cycles + extra)
    }

    fn run_reset(&mut self, bus: &mut Bus) -> Result<u8, NesError> {
        self.regs = CpuRegisters::default();
        self.regs.pc = match self.start_pc {
            Some(pc) => pc,
            None => bus.read_cpu_word(RESET_VECTOR)?,
        };
        self.regs.p.insert(StatusFlags::INTERRUPT);
        self.reset_pending = false;
        self.nmi_pending = false;
        self.nmi_previous = bus.nmi_line();
        debug!(pc = self.regs.pc, "CPU reset");
        Ok(INTERRUPT_CYCLES)
    }

    /// Push PC and status (B clear), set I, jump through `vector`
    fn interrupt(&mut self, bus: &mut Bus, vector: u16) -> Result<(), NesError> {
        let pc = self.regs.pc;
        instructions::push_word(&mut self.regs, bus, pc)?;
        let p = self.regs.p.pushed(false);
        instructions::push(&mut self.regs, bus, p)?;
        self.regs.p.insert(StatusFlags::INTERRUPT);
        self.regs.pc = bus.read_cpu_word(vector)?;
        Ok(())
    }

    /// Fetch, decode and resolve the instruction at PC without executing it
    pub fn fetch(&self, bus: &mut Bus) -> Result<Instruction, NesError> {
        let pc = self.regs.pc;
        let opcode = bus.read_cpu(pc)?;
        let entry = opcodes::decode(opcode).ok_or(DecodeError::UnknownOpcode { opcode, pc })?;

        let mut operands = [0u8; 2];
        for i in 0..entry.mode.operand_len() {
            operands[i as usize] = bus.read_cpu(pc.wrapping_add(1 + i))?;
        }

        let next_pc = pc.wrapping_add(entry.byte_len());
        let resolved = addressing::resolve(entry.mode, operands, next_pc, &self.regs, |addr| {
            bus.read_cpu(addr)
        })?;

        Ok(Instruction {
            entry,
            pc,
            operands,
            address: resolved.address,
            page_crossed: resolved.page_crossed,
        })
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bus with `program` in RAM at $0600 and the CPU started there
    fn setup(program: &[u8]) -> (Cpu, Bus) {
        let mut bus = Bus::new();
        for (i, byte) in program.iter().enumerate() {
            bus.write_cpu(0x0600 + i as u16, *byte).unwrap();
        }
        let mut cpu = Cpu::new();
        cpu.set_start_pc(Some(0x0600));
        assert_eq!(cpu.step(&mut bus).unwrap(), INTERRUPT_CYCLES);
        (cpu, bus)
    }

    #[test]
    fn test_cpu_reset() {
        let (cpu, _) = setup(&[]);
        let regs = cpu.registers();
        assert_eq!(regs.pc, 0x0600);
        assert_eq!(regs.s, 0xFD);
        assert_eq!(regs.p.bits(), 0x24);
        assert_eq!(cpu.total_cycles(), 7);
    }

    #[test]
    fn test_reset_without_cartridge_fails() {
        let mut bus = Bus::new();
        let mut cpu = Cpu::new();
        assert!(matches!(cpu.step(&mut bus), Err(NesError::Setup(_))));
    }

    #[test]
    fn test_unknown_opcode() {
        let (mut cpu, mut bus) = setup(&[0x02]);
        assert_eq!(
            cpu.step(&mut bus),
            Err(NesError::Decode(DecodeError::UnknownOpcode { opcode: 0x02, pc: 0x0600 }))
        );
        assert_eq!(cpu.registers().pc, 0x0601);
    }

    #[test]
    fn test_lda_immediate() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x80]);
        assert_eq!(cpu.step(&mut bus).unwrap(), 2);
        assert_eq!(cpu.registers().a, 0x80);
        assert!(cpu.registers().p.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_page_penalty_only_for_reads() {
        // LDX #$01; LDA $02FF,X; STA $02FF,X
        let (mut cpu, mut bus) = setup(&[0xA2, 0x01, 0xBD, 0xFF, 0x02, 0x9D, 0xFF, 0x02]);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.step(&mut bus).unwrap(), 5);
        assert_eq!(cpu.step(&mut bus).unwrap(), 5);
    }

    #[test]
    fn test_branch_cycles() {
        // BNE +2 (taken, same page); BEQ (not taken)
        let (mut cpu, mut bus) = setup(&[0xD0, 0x00, 0xF0, 0x00]);
        assert_eq!(cpu.step(&mut bus).unwrap(), 3);
        assert_eq!(cpu.registers().pc, 0x0602);
        assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    }

    #[test]
    fn test_branch_page_cross() {
        let mut bus = Bus::new();
        // BNE -4 from $0700 lands on $06FE
        bus.write_cpu(0x0700, 0xD0).unwrap();
        bus.write_cpu(0x0701, 0xFC).unwrap();
        let mut cpu = Cpu::new();
        cpu.set_start_pc(Some(0x0700));
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.step(&mut bus).unwrap(), 4);
        assert_eq!(cpu.registers().pc, 0x06FE);
    }

    #[test]
    fn test_jsr_rts_round_trip() {
        // JSR $0610; ... $0610: RTS
        let mut program = vec![0x20, 0x10, 0x06, 0xEA];
        program.resize(0x10, 0xEA);
        program.push(0x60);
        let (mut cpu, mut bus) = setup(&program);
        assert_eq!(cpu.step(&mut bus).unwrap(), 6);
        assert_eq!(cpu.registers().pc, 0x0610);
        assert_eq!(bus.read_cpu(0x01FD).unwrap(), 0x06);
        assert_eq!(bus.read_cpu(0x01FC).unwrap(), 0x02);
        assert_eq!(cpu.step(&mut bus).unwrap(), 6);
        assert_eq!(cpu.registers().pc, 0x0603);
        assert_eq!(cpu.registers().s, 0xFD);
    }

    #[test]
    fn test_php_sets_break_on_stack_only() {
        // PHP; PLA
        let (mut cpu, mut bus) = setup(&[0x08, 0x68]);
        cpu.step(&mut bus).unwrap();
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().a, 0x34);
        assert_eq!(cpu.registers().p.bits() & 0x10, 0);
    }

    #[test]
    fn test_nmi_on_rising_edge_only() {
        let mut cpu = Cpu::new();
        cpu.set_start_pc(Some(0x0600));
        let mut bus = Bus::new();
        bus.insert_cartridge(crate::cartridge::Cartridge::new(
            {
                let mut prg = vec![0xEA; crate::cartridge::PRG_BANK_SIZE];
                prg[0x3FFA] = 0x00;
                prg[0x3FFB] = 0x90;
                prg
            },
            vec![0; crate::cartridge::CHR_BANK_SIZE],
        ));
        cpu.step(&mut bus).unwrap();
        bus.signal_nmi(true);
        assert_eq!(cpu.step(&mut bus).unwrap(), INTERRUPT_CYCLES);
        assert_eq!(cpu.registers().pc, 0x9000);
        assert_eq!(bus.read_cpu(0x01FB).unwrap(), 0x24);
        assert!(cpu.registers().p.contains(StatusFlags::INTERRUPT));

        // Line still high: no second NMI
        assert_eq!(cpu.step(&mut bus).unwrap(), 2);
        assert_eq!(cpu.registers().pc, 0x9001);
    }

    #[test]
    fn test_irq_masked_by_interrupt_flag() {
        let mut bus = Bus::new();
        let mut prg = vec![0xEA; crate::cartridge::PRG_BANK_SIZE];
        prg[0x3FFE] = 0x00;
        prg[0x3FFF] = 0xA0;
        bus.insert_cartridge(crate::cartridge::Cartridge::new(prg, Vec::new()));
        bus.write_cpu(0x0600, 0xEA).unwrap();
        bus.write_cpu(0x0601, 0x58).unwrap(); // CLI
        let mut cpu = Cpu::new();
        cpu.set_start_pc(Some(0x0600));
        cpu.step(&mut bus).unwrap();

        bus.set_irq(true);
        assert_eq!(cpu.step(&mut bus).unwrap(), 2); // NOP, I still set
        assert_eq!(cpu.step(&mut bus).unwrap(), 2); // CLI
        assert_eq!(cpu.step(&mut bus).unwrap(), INTERRUPT_CYCLES);
        assert_eq!(cpu.registers().pc, 0xA000);
    }

    #[test]
    fn test_brk_pushes_pc_plus_two() {
        let mut bus = Bus::new();
        let mut prg = vec![0xEA; crate::cartridge::PRG_BANK_SIZE];
        prg[0x3FFE] = 0x34;
        prg[0x3FFF] = 0x82;
        bus.insert_cartridge(crate::cartridge::Cartridge::new(prg, Vec::new()));
        bus.write_cpu(0x0600, 0x00).unwrap();
        let mut cpu = Cpu::new();
        cpu.set_start_pc(Some(0x0600));
        cpu.step(&mut bus).unwrap();

        assert_eq!(cpu.step(&mut bus).unwrap(), 7);
        assert_eq!(cpu.registers().pc, 0x8234);
        assert_eq!(bus.read_cpu(0x01FD).unwrap(), 0x06);
        assert_eq!(bus.read_cpu(0x01FC).unwrap(), 0x02);
        assert_eq!(bus.read_cpu(0x01FB).unwrap(), 0x34);
    }
}
