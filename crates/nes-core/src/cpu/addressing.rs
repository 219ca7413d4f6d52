//! Effective-address resolution

use super::opcodes::{AddressingMode, OpcodeEntry};
use super::registers::CpuRegisters;

/// One decoded instruction, alive for a single fetch-decode-execute pass
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub entry: &'static OpcodeEntry,
    /// Address of the opcode byte
    pub pc: u16,
    /// Operand bytes; unused slots are zero
    pub operands: [u8; 2],
    /// Resolved effective address, `None` for implied/accumulator/immediate
    pub address: Option<u16>,
    pub page_crossed: bool,
}

impl Instruction {
    /// 16-bit little-endian operand
    pub fn word(&self) -> u16 {
        u16::from_le_bytes(self.operands)
    }

    /// Address of the instruction that follows this one
    pub fn next_pc(&self) -> u16 {
        self.pc.wrapping_add(self.entry.byte_len())
    }
}

/// Effective address plus page-cross flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub address: Option<u16>,
    pub page_crossed: bool,
}

impl Resolved {
    const NONE: Self = Self {
        address: None,
        page_crossed: false,
    };

    fn at(address: u16) -> Self {
        Self {
            address: Some(address),
            page_crossed: false,
        }
    }

    fn indexed(base: u16, address: u16) -> Self {
        Self {
            address: Some(address),
            page_crossed: crosses_page(base, address),
        }
    }
}

pub fn crosses_page(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}

/// Read a 16-bit pointer from the zero page, wrapping at $FF
fn zero_page_pointer<E>(
    zp: u8,
    read: &mut impl FnMut(u16) -> Result<u8, E>,
) -> Result<u16, E> {
    let lo = read(zp as u16)?;
    let hi = read(zp.wrapping_add(1) as u16)?;
    Ok(u16::from_le_bytes([lo, hi]))
}

/// Resolve the effective address of `mode`
///
/// `next_pc` is the address of the following instruction, which relative
/// branches are measured from. Pointer fetches go through `read`, so the
/// same code serves execution (bus reads) and tracing (side-effect-free
/// peeks).
pub fn resolve<E>(
    mode: AddressingMode,
    operands: [u8; 2],
    next_pc: u16,
    regs: &CpuRegisters,
    mut read: impl FnMut(u16) -> Result<u8, E>,
) -> Result<Resolved, E> {
    let word = u16::from_le_bytes(operands);
    let zp = operands[0];

    let resolved = match mode {
        AddressingMode::Implied | AddressingMode::Accumulator | AddressingMode::Immediate => {
            Resolved::NONE
        }
        AddressingMode::ZeroPage => Resolved::at(zp as u16),
        AddressingMode::ZeroPageX => Resolved::at(zp.wrapping_add(regs.x) as u16),
        AddressingMode::ZeroPageY => Resolved::at(zp.wrapping_add(regs.y) as u16),
        AddressingMode::Absolute => Resolved::at(word),
        AddressingMode::AbsoluteX => Resolved::indexed(word, word.wrapping_add(regs.x as u16)),
        AddressingMode::AbsoluteY => Resolved::indexed(word, word.wrapping_add(regs.y as u16)),
        AddressingMode::Relative => {
            let target = next_pc.wrapping_add(zp as i8 as u16);
            Resolved::indexed(next_pc, target)
        }
        AddressingMode::IndexedIndirect => {
            Resolved::at(zero_page_pointer(zp.wrapping_add(regs.x), &mut read)?)
        }
        AddressingMode::IndirectIndexed => {
            let base = zero_page_pointer(zp, &mut read)?;
            Resolved::indexed(base, base.wrapping_add(regs.y as u16))
        }
        AddressingMode::Indirect => {
            // The high byte is fetched without carrying into the next page
            let hi_addr = (word & 0xFF00) | (word.wrapping_add(1) & 0x00FF);
            let lo = read(word)?;
            let hi = read(hi_addr)?;
            Resolved::at(u16::from_le_bytes([lo, hi]))
        }
    };
    Ok(resolved)
}
