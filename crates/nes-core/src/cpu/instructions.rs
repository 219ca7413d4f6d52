//! Instruction semantics
//!
//! `execute` is the single dispatch point over every mnemonic. ALU helpers
//! are free functions over the register file so they can be tested on their
//! own.

use super::addressing::{crosses_page, Instruction};
use super::opcodes::{AddressingMode, Mnemonic};
use super::registers::{CpuRegisters, StatusFlags};
use super::IRQ_VECTOR;
use crate::bus::Bus;
use crate::error::NesError;

/// Magic constant ORed into A by the unstable XAA/LXA pair
const UNSTABLE_MAGIC: u8 = 0xEE;

pub fn adc(regs: &mut CpuRegisters, value: u8) {
    let a = regs.a;
    let sum = a as u16 + value as u16 + regs.carry_bit() as u16;
    let result = sum as u8;
    regs.p.set(StatusFlags::CARRY, sum > 0xFF);
    // Overflow when both inputs share a sign the result does not
    regs.p
        .set(StatusFlags::OVERFLOW, !(a ^ value) & (a ^ result) & 0x80 != 0);
    regs.a = result;
    regs.p.update_zn(result);
}

/// Subtract with borrow (borrow = !C); decimal mode is ignored
pub fn sbc(regs: &mut CpuRegisters, value: u8) {
    adc(regs, !value);
}

pub fn compare(regs: &mut CpuRegisters, register: u8, value: u8) {
    regs.p.set(StatusFlags::CARRY, register >= value);
    regs.p.update_zn(register.wrapping_sub(value));
}

pub fn asl(regs: &mut CpuRegisters, value: u8) -> u8 {
    regs.p.set(StatusFlags::CARRY, value & 0x80 != 0);
    let result = value << 1;
    regs.p.update_zn(result);
    result
}

pub fn lsr(regs: &mut CpuRegisters, value: u8) -> u8 {
    regs.p.set(StatusFlags::CARRY, value & 0x01 != 0);
    let result = value >> 1;
    regs.p.update_zn(result);
    result
}

pub fn rol(regs: &mut CpuRegisters, value: u8) -> u8 {
    let carry_in = regs.carry_bit();
    regs.p.set(StatusFlags::CARRY, value & 0x80 != 0);
    let result = (value << 1) | carry_in;
    regs.p.update_zn(result);
    result
}

pub fn ror(regs: &mut CpuRegisters, value: u8) -> u8 {
    let carry_in = regs.carry_bit() << 7;
    regs.p.set(StatusFlags::CARRY, value & 0x01 != 0);
    let result = (value >> 1) | carry_in;
    regs.p.update_zn(result);
    result
}

pub fn bit(regs: &mut CpuRegisters, value: u8) {
    regs.p.set(StatusFlags::ZERO, regs.a & value == 0);
    regs.p.set(StatusFlags::OVERFLOW, value & 0x40 != 0);
    regs.p.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
}

pub(crate) fn push(regs: &mut CpuRegisters, bus: &mut Bus, value: u8) -> Result<(), NesError> {
    bus.write_cpu(0x0100 | regs.s as u16, value)?;
    regs.s = regs.s.wrapping_sub(1);
    Ok(())
}

pub(crate) fn push_word(regs: &mut CpuRegisters, bus: &mut Bus, value: u16) -> Result<(), NesError> {
    let [lo, hi] = value.to_le_bytes();
    push(regs, bus, hi)?;
    push(regs, bus, lo)
}

fn pop(regs: &mut CpuRegisters, bus: &mut Bus) -> Result<u8, NesError> {
    regs.s = regs.s.wrapping_add(1);
    bus.read_cpu(0x0100 | regs.s as u16)
}

fn pop_word(regs: &mut CpuRegisters, bus: &mut Bus) -> Result<u16, NesError> {
    let lo = pop(regs, bus)?;
    let hi = pop(regs, bus)?;
    Ok(u16::from_le_bytes([lo, hi]))
}

fn effective(ins: &Instruction) -> u16 {
    ins.address.unwrap_or_default()
}

fn read_operand(regs: &CpuRegisters, bus: &mut Bus, ins: &Instruction) -> Result<u8, NesError> {
    match ins.entry.mode {
        AddressingMode::Immediate => Ok(ins.operands[0]),
        AddressingMode::Accumulator => Ok(regs.a),
        _ => bus.read_cpu(effective(ins)),
    }
}

/// Read-modify-write on the accumulator or memory; returns the new value
fn modify(
    regs: &mut CpuRegisters,
    bus: &mut Bus,
    ins: &Instruction,
    op: impl FnOnce(&mut CpuRegisters, u8) -> u8,
) -> Result<u8, NesError> {
    if ins.entry.mode == AddressingMode::Accumulator {
        let a = regs.a;
        let result = op(regs, a);
        regs.a = result;
        return Ok(result);
    }
    let address = effective(ins);
    let value = bus.read_cpu(address)?;
    let result = op(regs, value);
    bus.write_cpu(address, result)?;
    Ok(result)
}

fn branch(regs: &mut CpuRegisters, ins: &Instruction, condition: bool) -> u8 {
    if !condition {
        return 0;
    }
    let target = effective(ins);
    let penalty = if crosses_page(regs.pc, target) { 2 } else { 1 };
    regs.pc = target;
    penalty
}

/// SHA/SHX/SHY/TAS store: `value & (high byte of base + 1)`; on a page
/// cross the stored value also replaces the high byte of the address
fn store_high_and(bus: &mut Bus, ins: &Instruction, index: u8, value: u8) -> Result<(), NesError> {
    let address = effective(ins);
    let base = address.wrapping_sub(index as u16);
    let result = value & ((base >> 8) as u8).wrapping_add(1);
    let target = if ins.page_crossed {
        ((result as u16) << 8) | (address & 0x00FF)
    } else {
        address
    };
    bus.write_cpu(target, result)
}

/// Run one decoded instruction
///
/// `regs.pc` already points at the next instruction. Returns the cycles
/// spent on top of the table's base count.
pub(crate) fn execute(regs: &mut CpuRegisters, bus: &mut Bus, ins: &Instruction) -> Result<u8, NesError> {
    use Mnemonic::*;

    let mut extra = if ins.entry.page_penalty && ins.page_crossed { 1 } else { 0 };

    match ins.entry.mnemonic {
        LDA => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_a(v);
        }
        LDX => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_x(v);
        }
        LDY => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_y(v);
        }
        STA => bus.write_cpu(effective(ins), regs.a)?,
        STX => bus.write_cpu(effective(ins), regs.x)?,
        STY => bus.write_cpu(effective(ins), regs.y)?,

        TAX => regs.set_x(regs.a),
        TAY => regs.set_y(regs.a),
        TSX => regs.set_x(regs.s),
        TXA => regs.set_a(regs.x),
        TXS => regs.s = regs.x,
        TYA => regs.set_a(regs.y),

        PHA => {
            let a = regs.a;
            push(regs, bus, a)?;
        }
        PHP => {
            let p = regs.p.pushed(true);
            push(regs, bus, p)?;
        }
        PLA => {
            let v = pop(regs, bus)?;
            regs.set_a(v);
        }
        PLP => regs.p = StatusFlags::pulled(pop(regs, bus)?),

        ASL => {
            modify(regs, bus, ins, asl)?;
        }
        LSR => {
            modify(regs, bus, ins, lsr)?;
        }
        ROL => {
            modify(regs, bus, ins, rol)?;
        }
        ROR => {
            modify(regs, bus, ins, ror)?;
        }

        AND => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_a(regs.a & v);
        }
        EOR => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_a(regs.a ^ v);
        }
        ORA => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_a(regs.a | v);
        }
        BIT => {
            let v = read_operand(regs, bus, ins)?;
            bit(regs, v);
        }

        ADC => {
            let v = read_operand(regs, bus, ins)?;
            adc(regs, v);
        }
        SBC => {
            let v = read_operand(regs, bus, ins)?;
            sbc(regs, v);
        }
        CMP => {
            let v = read_operand(regs, bus, ins)?;
            let register = regs.a;
            compare(regs, register, v);
        }
        CPX => {
            let v = read_operand(regs, bus, ins)?;
            let register = regs.x;
            compare(regs, register, v);
        }
        CPY => {
            let v = read_operand(regs, bus, ins)?;
            let register = regs.y;
            compare(regs, register, v);
        }

        INC => {
            modify(regs, bus, ins, |r, v| {
                let v = v.wrapping_add(1);
                r.p.update_zn(v);
                v
            })?;
        }
        DEC => {
            modify(regs, bus, ins, |r, v| {
                let v = v.wrapping_sub(1);
                r.p.update_zn(v);
                v
            })?;
        }
        INX => regs.set_x(regs.x.wrapping_add(1)),
        INY => regs.set_y(regs.y.wrapping_add(1)),
        DEX => regs.set_x(regs.x.wrapping_sub(1)),
        DEY => regs.set_y(regs.y.wrapping_sub(1)),

        JMP => regs.pc = effective(ins),
        JSR => {
            // Return address is pushed minus one; RTS compensates
            let ret = regs.pc.wrapping_sub(1);
            push_word(regs, bus, ret)?;
            regs.pc = effective(ins);
        }
        RTS => regs.pc = pop_word(regs, bus)?.wrapping_add(1),
        RTI => {
            regs.p = StatusFlags::pulled(pop(regs, bus)?);
            regs.pc = pop_word(regs, bus)?;
        }
        BRK => {
            // Skips the padding byte after the opcode
            let ret = regs.pc.wrapping_add(1);
            push_word(regs, bus, ret)?;
            let p = regs.p.pushed(true);
            push(regs, bus, p)?;
            regs.p.insert(StatusFlags::INTERRUPT);
            regs.pc = bus.read_cpu_word(IRQ_VECTOR)?;
        }

        BCC => {
            let taken = !regs.p.contains(StatusFlags::CARRY);
            extra += branch(regs, ins, taken);
        }
        BCS => {
            let taken = regs.p.contains(StatusFlags::CARRY);
            extra += branch(regs, ins, taken);
        }
        BEQ => {
            let taken = regs.p.contains(StatusFlags::ZERO);
            extra += branch(regs, ins, taken);
        }
        BNE => {
            let taken = !regs.p.contains(StatusFlags::ZERO);
            extra += branch(regs, ins, taken);
        }
        BMI => {
            let taken = regs.p.contains(StatusFlags::NEGATIVE);
            extra += branch(regs, ins, taken);
        }
        BPL => {
            let taken = !regs.p.contains(StatusFlags::NEGATIVE);
            extra += branch(regs, ins, taken);
        }
        BVS => {
            let taken = regs.p.contains(StatusFlags::OVERFLOW);
            extra += branch(regs, ins, taken);
        }
        BVC => {
            let taken = !regs.p.contains(StatusFlags::OVERFLOW);
            extra += branch(regs, ins, taken);
        }

        CLC => regs.p.remove(StatusFlags::CARRY),
        CLD => regs.p.remove(StatusFlags::DECIMAL),
        CLI => regs.p.remove(StatusFlags::INTERRUPT),
        CLV => regs.p.remove(StatusFlags::OVERFLOW),
        SEC => regs.p.insert(StatusFlags::CARRY),
        SED => regs.p.insert(StatusFlags::DECIMAL),
        SEI => regs.p.insert(StatusFlags::INTERRUPT),

        NOP => {}

        LAX => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_a(v);
            regs.x = v;
        }
        SAX => bus.write_cpu(effective(ins), regs.a & regs.x)?,
        DCP => {
            let v = modify(regs, bus, ins, |_, v| v.wrapping_sub(1))?;
            let register = regs.a;
            compare(regs, register, v);
        }
        ISB => {
            let v = modify(regs, bus, ins, |_, v| v.wrapping_add(1))?;
            sbc(regs, v);
        }
        SLO => {
            let v = modify(regs, bus, ins, asl)?;
            regs.set_a(regs.a | v);
        }
        RLA => {
            let v = modify(regs, bus, ins, rol)?;
            regs.set_a(regs.a & v);
        }
        SRE => {
            let v = modify(regs, bus, ins, lsr)?;
            regs.set_a(regs.a ^ v);
        }
        RRA => {
            let v = modify(regs, bus, ins, ror)?;
            adc(regs, v);
        }
        ANC => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_a(regs.a & v);
            regs.p.set(StatusFlags::CARRY, regs.a & 0x80 != 0);
        }
        ALR => {
            let v = read_operand(regs, bus, ins)?;
            let masked = regs.a & v;
            regs.a = lsr(regs, masked);
        }
        ARR => {
            let v = read_operand(regs, bus, ins)?;
            let result = ((regs.a & v) >> 1) | (regs.carry_bit() << 7);
            regs.set_a(result);
            regs.p.set(StatusFlags::CARRY, result & 0x40 != 0);
            regs.p
                .set(StatusFlags::OVERFLOW, ((result >> 6) ^ (result >> 5)) & 1 != 0);
        }
        AXS => {
            let v = read_operand(regs, bus, ins)?;
            let ax = regs.a & regs.x;
            regs.p.set(StatusFlags::CARRY, ax >= v);
            regs.set_x(ax.wrapping_sub(v));
        }

        XAA => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_a((regs.a | UNSTABLE_MAGIC) & regs.x & v);
        }
        LXA => {
            let v = read_operand(regs, bus, ins)?;
            regs.set_a((regs.a | UNSTABLE_MAGIC) & v);
            regs.x = regs.a;
        }
        SHA => store_high_and(bus, ins, regs.y, regs.a & regs.x)?,
        SHX => store_high_and(bus, ins, regs.y, regs.x)?,
        SHY => store_high_and(bus, ins, regs.x, regs.y)?,
        TAS => {
            regs.s = regs.a & regs.x;
            store_high_and(bus, ins, regs.y, regs.s)?;
        }
        LAS => {
            let v = read_operand(regs, bus, ins)? & regs.s;
            regs.set_a(v);
            regs.x = v;
            regs.s = v;
        }
    }

    Ok(extra)
}
