//! nestest-style execution trace
//!
//! ```text
//! C000  4C F5 C5  JMP $C5F5                       A:00 X:00 Y:00 P:24 SP:FD PPU:  0, 21 CYC:7
//! ```
//!
//! Every memory access goes through [`Bus::peek_cpu`], so producing a line
//! never changes emulator state.

use std::convert::Infallible;
use std::fmt::Write;

use crate::bus::Bus;
use crate::cpu::addressing::{self, Resolved};
use crate::cpu::opcodes::{self, AddressingMode, Mnemonic, OpcodeEntry};
use crate::cpu::{Cpu, CpuRegisters};
use crate::error::{DecodeError, NesError};
use crate::ppu::Ppu;

/// Instruction at the current PC, formatted for the trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    pub pc: u16,
    /// Opcode plus operand bytes
    pub bytes: Vec<u8>,
    pub official: bool,
    /// Mnemonic and operand text with memory annotations
    pub text: String,
}

/// Decode and annotate the instruction at `regs.pc`
pub fn disassemble(bus: &Bus, regs: &CpuRegisters) -> Result<Disassembly, NesError> {
    let pc = regs.pc;
    let opcode = bus.peek_cpu(pc);
    let entry = opcodes::decode(opcode).ok_or(DecodeError::UnknownOpcode { opcode, pc })?;

    let bytes: Vec<u8> = (0..entry.byte_len())
        .map(|i| bus.peek_cpu(pc.wrapping_add(i)))
        .collect();
    let mut operands = [0u8; 2];
    for (slot, byte) in operands.iter_mut().zip(bytes.iter().skip(1)) {
        *slot = *byte;
    }

    let next_pc = pc.wrapping_add(entry.byte_len());
    let peek = |addr: u16| Ok::<u8, Infallible>(bus.peek_cpu(addr));
    let resolved = match addressing::resolve(entry.mode, operands, next_pc, regs, peek) {
        Ok(resolved) => resolved,
        Err(never) => match never {},
    };

    Ok(Disassembly {
        pc,
        bytes,
        official: entry.official,
        text: operand_text(bus, regs, entry, operands, resolved),
    })
}

fn operand_text(
    bus: &Bus,
    regs: &CpuRegisters,
    entry: &OpcodeEntry,
    operands: [u8; 2],
    resolved: Resolved,
) -> String {
    let mnemonic = entry.mnemonic;
    let zp = operands[0];
    let word = u16::from_le_bytes(operands);
    let address = resolved.address.unwrap_or(0);
    let value = bus.peek_cpu(address);

    let operand = match entry.mode {
        AddressingMode::Implied => String::new(),
        AddressingMode::Accumulator => "A".to_string(),
        AddressingMode::Immediate => format!("#${zp:02X}"),
        AddressingMode::ZeroPage => format!("${zp:02X} = {value:02X}"),
        AddressingMode::ZeroPageX => format!("${zp:02X},X @ {address:02X} = {value:02X}"),
        AddressingMode::ZeroPageY => format!("${zp:02X},Y @ {address:02X} = {value:02X}"),
        AddressingMode::Absolute if matches!(mnemonic, Mnemonic::JMP | Mnemonic::JSR) => {
            format!("${word:04X}")
        }
        AddressingMode::Absolute => format!("${word:04X} = {value:02X}"),
        AddressingMode::AbsoluteX => format!("${word:04X},X @ {address:04X} = {value:02X}"),
        AddressingMode::AbsoluteY => format!("${word:04X},Y @ {address:04X} = {value:02X}"),
        AddressingMode::Relative => format!("${address:04X}"),
        AddressingMode::IndexedIndirect => {
            let pointer = zp.wrapping_add(regs.x);
            format!("(${zp:02X},X) @ {pointer:02X} = {address:04X} = {value:02X}")
        }
        AddressingMode::IndirectIndexed => {
            let base = address.wrapping_sub(regs.y as u16);
            format!("(${zp:02X}),Y = {base:04X} @ {address:04X} = {value:02X}")
        }
        AddressingMode::Indirect => format!("(${word:04X}) = {address:04X}"),
    };

    if operand.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{mnemonic} {operand}")
    }
}

/// One full trace line for the instruction about to execute
pub fn trace_line(cpu: &Cpu, bus: &Bus, ppu: &Ppu) -> Result<String, NesError> {
    let regs = cpu.registers();
    let dis = disassemble(bus, regs)?;

    let mut hex = String::new();
    for (i, byte) in dis.bytes.iter().enumerate() {
        if i > 0 {
            hex.push(' ');
        }
        let _ = write!(hex, "{byte:02X}");
    }
    let prefix = if dis.official { ' ' } else { '*' };

    Ok(format!(
        "{:04X}  {:<9}{}{:<32}{} PPU:{:>3},{:>3} CYC:{}",
        dis.pc,
        hex,
        prefix,
        dis.text,
        regs,
        ppu.scanline(),
        ppu.dot(),
        cpu.total_cycles()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regs_at(pc: u16) -> CpuRegisters {
        CpuRegisters {
            pc,
            ..CpuRegisters::default()
        }
    }

    fn load(bus: &mut Bus, at: u16, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            bus.write_cpu(at + i as u16, *b).unwrap();
        }
    }

    #[test]
    fn test_zero_page_annotation() {
        let mut bus = Bus::new();
        load(&mut bus, 0x0600, &[0x86, 0x10]);
        bus.write_cpu(0x0010, 0x7F).unwrap();
        let dis = disassemble(&bus, &regs_at(0x0600)).unwrap();
        assert_eq!(dis.text, "STX $10 = 7F");
        assert_eq!(dis.bytes, vec![0x86, 0x10]);
    }

    #[test]
    fn test_indirect_modes() {
        let mut bus = Bus::new();
        load(&mut bus, 0x0600, &[0xB1, 0x89]);
        load(&mut bus, 0x0089, &[0x00, 0x03]);
        bus.write_cpu(0x0300, 0x89).unwrap();
        let dis = disassemble(&bus, &regs_at(0x0600)).unwrap();
        assert_eq!(dis.text, "LDA ($89),Y = 0300 @ 0300 = 89");

        load(&mut bus, 0x0610, &[0x6C, 0xFF, 0x02]);
        bus.write_cpu(0x02FF, 0x7E).unwrap();
        bus.write_cpu(0x0200, 0xDB).unwrap();
        let dis = disassemble(&bus, &regs_at(0x0610)).unwrap();
        assert_eq!(dis.text, "JMP ($02FF) = DB7E");
    }

    #[test]
    fn test_illegal_opcode_is_marked() {
        let mut bus = Bus::new();
        load(&mut bus, 0x0600, &[0xA7, 0x20]);
        let dis = disassemble(&bus, &regs_at(0x0600)).unwrap();
        assert!(!dis.official);
        assert_eq!(dis.text, "LAX $20 = 00");
    }

    #[test]
    fn test_jam_is_a_decode_error() {
        let mut bus = Bus::new();
        load(&mut bus, 0x0600, &[0x02]);
        let err = disassemble(&bus, &regs_at(0x0600)).unwrap_err();
        assert_eq!(
            err,
            NesError::Decode(DecodeError::UnknownOpcode {
                opcode: 0x02,
                pc: 0x0600
            })
        );
    }
}
