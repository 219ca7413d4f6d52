//! Opcode decode table
//!
//! One entry per opcode byte. The twelve JAM/KIL opcodes have no entry and
//! decode to an error.

use std::fmt;

/// 6502 addressing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// Signed offset from the address of the next instruction
    Relative,
    /// `(zp,X)`
    IndexedIndirect,
    /// `(zp),Y`
    IndirectIndexed,
    /// `JMP ($nnnn)` only
    Indirect,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode
    pub const fn operand_len(self) -> u16 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::Relative
            | AddressingMode::IndexedIndirect
            | AddressingMode::IndirectIndexed => 1,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 2,
        }
    }
}

/// Instruction mnemonics, documented and illegal
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    // Load/store
    LDA, LDX, LDY, STA, STX, STY,
    // Transfer
    TAX, TAY, TSX, TXA, TXS, TYA,
    // Stack
    PHA, PHP, PLA, PLP,
    // Shift
    ASL, LSR, ROL, ROR,
    // Logic
    AND, BIT, EOR, ORA,
    // Arithmetic
    ADC, SBC, CMP, CPX, CPY,
    // Inc/dec
    INC, INX, INY, DEC, DEX, DEY,
    // Control flow
    JMP, JSR, RTS, RTI, BRK,
    BCC, BCS, BEQ, BMI, BNE, BPL, BVC, BVS,
    // Flags
    CLC, CLD, CLI, CLV, SEC, SED, SEI,
    NOP,
    // Stable illegal
    LAX, SAX, DCP, ISB, SLO, RLA, SRE, RRA, ANC, ALR, ARR, AXS,
    // Unstable illegal
    XAA, LXA, SHA, SHX, SHY, TAS, LAS,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How trustworthy an entry's cycle count is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Exact,
    /// Hardware timing is unresolved; the count is the commonly cited value
    Placeholder,
}

/// Static description of one opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    /// Base cycle count before page-cross and branch penalties
    pub cycles: u8,
    /// Read instruction that pays one extra cycle on a page cross
    pub page_penalty: bool,
    /// Documented by the manufacturer
    pub official: bool,
    pub timing: Timing,
}

impl OpcodeEntry {
    /// Instruction length in bytes, opcode included
    pub const fn byte_len(&self) -> u16 {
        1 + self.mode.operand_len()
    }
}

/// Look up an opcode byte
pub fn decode(opcode: u8) -> Option<&'static OpcodeEntry> {
    OPCODES[opcode as usize].as_ref()
}

/// Every defined entry, in opcode order
pub fn entries() -> impl Iterator<Item = &'static OpcodeEntry> {
    OPCODES.iter().flatten()
}

type Row = (Mnemonic, AddressingMode, u8, Kind);

#[derive(Clone, Copy)]
enum Kind {
    Official,
    OfficialPenalty,
    Illegal,
    IllegalPenalty,
    Unstable,
    UnstablePenalty,
    Jam,
}

use AddressingMode::*;
use Kind::*;
use Mnemonic::*;

const fn op(m: Mnemonic, mode: AddressingMode, cycles: u8, kind: Kind) -> Row {
    (m, mode, cycles, kind)
}

const JAM: Row = (NOP, Implied, 0, Jam);

#[rustfmt::skip]
const ROWS: [Row; 256] = [
    // 0x00
    op(BRK, Implied, 7, Official),          op(ORA, IndexedIndirect, 6, Official),
    JAM,                                    op(SLO, IndexedIndirect, 8, Illegal),
    op(NOP, ZeroPage, 3, Illegal),          op(ORA, ZeroPage, 3, Official),
    op(ASL, ZeroPage, 5, Official),         op(SLO, ZeroPage, 5, Illegal),
    op(PHP, Implied, 3, Official),          op(ORA, Immediate, 2, Official),
    op(ASL, Accumulator, 2, Official),      op(ANC, Immediate, 2, Illegal),
    op(NOP, Absolute, 4, Illegal),          op(ORA, Absolute, 4, Official),
    op(ASL, Absolute, 6, Official),         op(SLO, Absolute, 6, Illegal),
    // 0x10
    op(BPL, Relative, 2, Official),         op(ORA, IndirectIndexed, 5, OfficialPenalty),
    JAM,                                    op(SLO, IndirectIndexed, 8, Illegal),
    op(NOP, ZeroPageX, 4, Illegal),         op(ORA, ZeroPageX, 4, Official),
    op(ASL, ZeroPageX, 6, Official),        op(SLO, ZeroPageX, 6, Illegal),
    op(CLC, Implied, 2, Official),          op(ORA, AbsoluteY, 4, OfficialPenalty),
    op(NOP, Implied, 2, Illegal),           op(SLO, AbsoluteY, 7, Illegal),
    op(NOP, AbsoluteX, 4, IllegalPenalty),  op(ORA, AbsoluteX, 4, OfficialPenalty),
    op(ASL, AbsoluteX, 7, Official),        op(SLO, AbsoluteX, 7, Illegal),
    // 0x20
    op(JSR, Absolute, 6, Official),         op(AND, IndexedIndirect, 6, Official),
    JAM,                                    op(RLA, IndexedIndirect, 8, Illegal),
    op(BIT, ZeroPage, 3, Official),         op(AND, ZeroPage, 3, Official),
    op(ROL, ZeroPage, 5, Official),         op(RLA, ZeroPage, 5, Illegal),
    op(PLP, Implied, 4, Official),          op(AND, Immediate, 2, Official),
    op(ROL, Accumulator, 2, Official),      op(ANC, Immediate, 2, Illegal),
    op(BIT, Absolute, 4, Official),         op(AND, Absolute, 4, Official),
    op(ROL, Absolute, 6, Official),         op(RLA, Absolute, 6, Illegal),
    // 0x30
    op(BMI, Relative, 2, Official),         op(AND, IndirectIndexed, 5, OfficialPenalty),
    JAM,                                    op(RLA, IndirectIndexed, 8, Illegal),
    op(NOP, ZeroPageX, 4, Illegal),         op(AND, ZeroPageX, 4, Official),
    op(ROL, ZeroPageX, 6, Official),        op(RLA, ZeroPageX, 6, Illegal),
    op(SEC, Implied, 2, Official),          op(AND, AbsoluteY, 4, OfficialPenalty),
    op(NOP, Implied, 2, Illegal),           op(RLA, AbsoluteY, 7, Illegal),
    op(NOP, AbsoluteX, 4, IllegalPenalty),  op(AND, AbsoluteX, 4, OfficialPenalty),
    op(ROL, AbsoluteX, 7, Official),        op(RLA, AbsoluteX, 7, Illegal),
    // 0x40
    op(RTI, Implied, 6, Official),          op(EOR, IndexedIndirect, 6, Official),
    JAM,                                    op(SRE, IndexedIndirect, 8, Illegal),
    op(NOP, ZeroPage, 3, Illegal),          op(EOR, ZeroPage, 3, Official),
    op(LSR, ZeroPage, 5, Official),         op(SRE, ZeroPage, 5, Illegal),
    op(PHA, Implied, 3, Official),          op(EOR, Immediate, 2, Official),
    op(LSR, Accumulator, 2, Official),      op(ALR, Immediate, 2, Illegal),
    op(JMP, Absolute, 3, Official),         op(EOR, Absolute, 4, Official),
    op(LSR, Absolute, 6, Official),         op(SRE, Absolute, 6, Illegal),
    // 0x50
    op(BVC, Relative, 2, Official),         op(EOR, IndirectIndexed, 5, OfficialPenalty),
    JAM,                                    op(SRE, IndirectIndexed, 8, Illegal),
    op(NOP, ZeroPageX, 4, Illegal),         op(EOR, ZeroPageX, 4, Official),
    op(LSR, ZeroPageX, 6, Official),        op(SRE, ZeroPageX, 6, Illegal),
    op(CLI, Implied, 2, Official),          op(EOR, AbsoluteY, 4, OfficialPenalty),
    op(NOP, Implied, 2, Illegal),           op(SRE, AbsoluteY, 7, Illegal),
    op(NOP, AbsoluteX, 4, IllegalPenalty),  op(EOR, AbsoluteX, 4, OfficialPenalty),
    op(LSR, AbsoluteX, 7, Official),        op(SRE, AbsoluteX, 7, Illegal),
    // 0x60
    op(RTS, Implied, 6, Official),          op(ADC, IndexedIndirect, 6, Official),
    JAM,                                    op(RRA, IndexedIndirect, 8, Illegal),
    op(NOP, ZeroPage, 3, Illegal),          op(ADC, ZeroPage, 3, Official),
    op(ROR, ZeroPage, 5, Official),         op(RRA, ZeroPage, 5, Illegal),
    op(PLA, Implied, 4, Official),          op(ADC, Immediate, 2, Official),
    op(ROR, Accumulator, 2, Official),      op(ARR, Immediate, 2, Illegal),
    op(JMP, Indirect, 5, Official),         op(ADC, Absolute, 4, Official),
    op(ROR, Absolute, 6, Official),         op(RRA, Absolute, 6, Illegal),
    // 0x70
    op(BVS, Relative, 2, Official),         op(ADC, IndirectIndexed, 5, OfficialPenalty),
    JAM,                                    op(RRA, IndirectIndexed, 8, Illegal),
    op(NOP, ZeroPageX, 4, Illegal),         op(ADC, ZeroPageX, 4, Official),
    op(ROR, ZeroPageX, 6, Official),        op(RRA, ZeroPageX, 6, Illegal),
    op(SEI, Implied, 2, Official),          op(ADC, AbsoluteY, 4, OfficialPenalty),
    op(NOP, Implied, 2, Illegal),           op(RRA, AbsoluteY, 7, Illegal),
    op(NOP, AbsoluteX, 4, IllegalPenalty),  op(ADC, AbsoluteX, 4, OfficialPenalty),
    op(ROR, AbsoluteX, 7, Official),        op(RRA, AbsoluteX, 7, Illegal),
    // 0x80
    op(NOP, Immediate, 2, Illegal),         op(STA, IndexedIndirect, 6, Official),
    op(NOP, Immediate, 2, Illegal),         op(SAX, IndexedIndirect, 6, Illegal),
    op(STY, ZeroPage, 3, Official),         op(STA, ZeroPage, 3, Official),
    op(STX, ZeroPage, 3, Official),         op(SAX, ZeroPage, 3, Illegal),
    op(DEY, Implied, 2, Official),          op(NOP, Immediate, 2, Illegal),
    op(TXA, Implied, 2, Official),          op(XAA, Immediate, 2, Unstable),
    op(STY, Absolute, 4, Official),         op(STA, Absolute, 4, Official),
    op(STX, Absolute, 4, Official),         op(SAX, Absolute, 4, Illegal),
    // 0x90
    op(BCC, Relative, 2, Official),         op(STA, IndirectIndexed, 6, Official),
    JAM,                                    op(SHA, IndirectIndexed, 6, Unstable),
    op(STY, ZeroPageX, 4, Official),        op(STA, ZeroPageX, 4, Official),
    op(STX, ZeroPageY, 4, Official),        op(SAX, ZeroPageY, 4, Illegal),
    op(TYA, Implied, 2, Official),          op(STA, AbsoluteY, 5, Official),
    op(TXS, Implied, 2, Official),          op(TAS, AbsoluteY, 5, Unstable),
    op(SHY, AbsoluteX, 5, Unstable),        op(STA, AbsoluteX, 5, Official),
    op(SHX, AbsoluteY, 5, Unstable),        op(SHA, AbsoluteY, 5, Unstable),
    // 0xA0
    op(LDY, Immediate, 2, Official),        op(LDA, IndexedIndirect, 6, Official),
    op(LDX, Immediate, 2, Official),        op(LAX, IndexedIndirect, 6, Illegal),
    op(LDY, ZeroPage, 3, Official),         op(LDA, ZeroPage, 3, Official),
    op(LDX, ZeroPage, 3, Official),         op(LAX, ZeroPage, 3, Illegal),
    op(TAY, Implied, 2, Official),          op(LDA, Immediate, 2, Official),
    op(TAX, Implied, 2, Official),          op(LXA, Immediate, 2, Unstable),
    op(LDY, Absolute, 4, Official),         op(LDA, Absolute, 4, Official),
    op(LDX, Absolute, 4, Official),         op(LAX, Absolute, 4, Illegal),
    // 0xB0
    op(BCS, Relative, 2, Official),         op(LDA, IndirectIndexed, 5, OfficialPenalty),
    JAM,                                    op(LAX, IndirectIndexed, 5, IllegalPenalty),
    op(LDY, ZeroPageX, 4, Official),        op(LDA, ZeroPageX, 4, Official),
    op(LDX, ZeroPageY, 4, Official),        op(LAX, ZeroPageY, 4, Illegal),
    op(CLV, Implied, 2, Official),          op(LDA, AbsoluteY, 4, OfficialPenalty),
    op(TSX, Implied, 2, Official),          op(LAS, AbsoluteY, 4, UnstablePenalty),
    op(LDY, AbsoluteX, 4, OfficialPenalty), op(LDA, AbsoluteX, 4, OfficialPenalty),
    op(LDX, AbsoluteY, 4, OfficialPenalty), op(LAX, AbsoluteY, 4, IllegalPenalty),
    // 0xC0
    op(CPY, Immediate, 2, Official),        op(CMP, IndexedIndirect, 6, Official),
    op(NOP, Immediate, 2, Illegal),         op(DCP, IndexedIndirect, 8, Illegal),
    op(CPY, ZeroPage, 3, Official),         op(CMP, ZeroPage, 3, Official),
    op(DEC, ZeroPage, 5, Official),         op(DCP, ZeroPage, 5, Illegal),
    op(INY, Implied, 2, Official),          op(CMP, Immediate, 2, Official),
    op(DEX, Implied, 2, Official),          op(AXS, Immediate, 2, Illegal),
    op(CPY, Absolute, 4, Official),         op(CMP, Absolute, 4, Official),
    op(DEC, Absolute, 6, Official),         op(DCP, Absolute, 6, Illegal),
    // 0xD0
    op(BNE, Relative, 2, Official),         op(CMP, IndirectIndexed, 5, OfficialPenalty),
    JAM,                                    op(DCP, IndirectIndexed, 8, Illegal),
    op(NOP, ZeroPageX, 4, Illegal),         op(CMP, ZeroPageX, 4, Official),
    op(DEC, ZeroPageX, 6, Official),        op(DCP, ZeroPageX, 6, Illegal),
    op(CLD, Implied, 2, Official),          op(CMP, AbsoluteY, 4, OfficialPenalty),
    op(NOP, Implied, 2, Illegal),           op(DCP, AbsoluteY, 7, Illegal),
    op(NOP, AbsoluteX, 4, IllegalPenalty),  op(CMP, AbsoluteX, 4, OfficialPenalty),
    op(DEC, AbsoluteX, 7, Official),        op(DCP, AbsoluteX, 7, Illegal),
    // 0xE0
    op(CPX, Immediate, 2, Official),        op(SBC, IndexedIndirect, 6, Official),
    op(NOP, Immediate, 2, Illegal),         op(ISB, IndexedIndirect, 8, Illegal),
    op(CPX, ZeroPage, 3, Official),         op(SBC, ZeroPage, 3, Official),
    op(INC, ZeroPage, 5, Official),         op(ISB, ZeroPage, 5, Illegal),
    op(INX, Implied, 2, Official),          op(SBC, Immediate, 2, Official),
    op(NOP, Implied, 2, Official),          op(SBC, Immediate, 2, Illegal),
    op(CPX, Absolute, 4, Official),         op(SBC, Absolute, 4, Official),
    op(INC, Absolute, 6, Official),         op(ISB, Absolute, 6, Illegal),
    // 0xF0
    op(BEQ, Relative, 2, Official),         op(SBC, IndirectIndexed, 5, OfficialPenalty),
    JAM,                                    op(ISB, IndirectIndexed, 8, Illegal),
    op(NOP, ZeroPageX, 4, Illegal),         op(SBC, ZeroPageX, 4, Official),
    op(INC, ZeroPageX, 6, Official),        op(ISB, ZeroPageX, 6, Illegal),
    op(SED, Implied, 2, Official),          op(SBC, AbsoluteY, 4, OfficialPenalty),
    op(NOP, Implied, 2, Illegal),           op(ISB, AbsoluteY, 7, Illegal),
    op(NOP, AbsoluteX, 4, IllegalPenalty),  op(SBC, AbsoluteX, 4, OfficialPenalty),
    op(INC, AbsoluteX, 7, Official),        op(ISB, AbsoluteX, 7, Illegal),
];

const fn build() -> [Option<OpcodeEntry>; 256] {
    let mut table = [None; 256];
    let mut i = 0;
    while i < 256 {
        let (mnemonic, mode, cycles, kind) = ROWS[i];
        let (page_penalty, official, timing) = match kind {
            Official => (false, true, Timing::Exact),
            OfficialPenalty => (true, true, Timing::Exact),
            Illegal => (false, false, Timing::Exact),
            IllegalPenalty => (true, false, Timing::Exact),
            Unstable => (false, false, Timing::Placeholder),
            UnstablePenalty => (true, false, Timing::Placeholder),
            Jam => {
                i += 1;
                continue;
            }
        };
        table[i] = Some(OpcodeEntry {
            opcode: i as u8,
            mnemonic,
            mode,
            cycles,
            page_penalty,
            official,
            timing,
        });
        i += 1;
    }
    table
}

static OPCODES: [Option<OpcodeEntry>; 256] = build();
