//! 2A03 register file

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Processor status register (P)
    ///
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// N V U B D I Z C
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY     = 0b0000_0001;
        const ZERO      = 0b0000_0010;
        const INTERRUPT = 0b0000_0100;
        /// Tracked but has no effect on arithmetic
        const DECIMAL   = 0b0000_1000;
        /// Only exists on the stack copy pushed by PHP/BRK
        const BREAK     = 0b0001_0000;
        /// Reads back as 1
        const RESERVED  = 0b0010_0000;
        const OVERFLOW  = 0b0100_0000;
        const NEGATIVE  = 0b1000_0000;
    }
}

impl StatusFlags {
    /// Power-up value: I and the reserved bit set
    pub const POWER_UP: Self = Self::from_bits_retain(0x24);

    /// Set Z and N from a result byte
    pub fn update_zn(&mut self, value: u8) {
        self.set(Self::ZERO, value == 0);
        self.set(Self::NEGATIVE, value & 0x80 != 0);
    }

    /// Status byte as pushed onto the stack
    pub fn pushed(self, brk: bool) -> u8 {
        let mut p = self | Self::RESERVED;
        p.set(Self::BREAK, brk);
        p.bits()
    }

    /// Status after PLP/RTI: B is dropped, the reserved bit stays set
    pub fn pulled(byte: u8) -> Self {
        (Self::from_bits_retain(byte) - Self::BREAK) | Self::RESERVED
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self::POWER_UP
    }
}

/// 2A03 CPU registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuRegisters {
    /// Accumulator
    pub a: u8,
    pub x: u8,
    pub y: u8,
    /// Stack pointer, offset into page $01
    pub s: u8,
    pub pc: u16,
    pub p: StatusFlags,
}

impl Default for CpuRegisters {
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0xFD,
            pc: 0,
            p: StatusFlags::POWER_UP,
        }
    }
}

impl CpuRegisters {
    pub fn carry(&self) -> bool {
        self.p.contains(StatusFlags::CARRY)
    }

    pub fn carry_bit(&self) -> u8 {
        self.carry() as u8
    }

    /// Load A and update Z/N
    pub fn set_a(&mut self, value: u8) {
        self.a = value;
        self.p.update_zn(value);
    }

    pub fn set_x(&mut self, value: u8) {
        self.x = value;
        self.p.update_zn(value);
    }

    pub fn set_y(&mut self, value: u8) {
        self.y = value;
        self.p.update_zn(value);
    }
}

impl fmt::Display for CpuRegisters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X}",
            self.a,
            self.x,
            self.y,
            self.p.bits(),
            self.s
        )
    }
}
