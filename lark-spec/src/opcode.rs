//! # Lark-16 Opcode Definitions
//!
//! One opcode byte selects the instruction and governs which argument
//! scheme the remaining three bytes follow.
//!
//! ## Opcode Map
//!
//! - 0x00:      NOP
//! - 0x01-0x03: Loads (LDI, LDR, LDRB)
//! - 0x04-0x0d: Arithmetic/logical (ADD, SUB, MUL, DIV, MOD, AND, OR, XOR, SHL, SHR)
//! - 0x0e-0x10: Jumps (JMP, JZ, JD)
//! - 0x11-0x14: Stores (STI, STIB, STR, STRB)
//! - 0x15:      SYS

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of valid opcodes (0x00..=0x15).
pub const NUM_OPCODES: u8 = 22;

/// Instruction opcode (one byte, values 0x00-0x15)
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// NOP: do nothing
    Nop = 0x00,
    /// LDI: rd = imm
    Ldi = 0x01,
    /// LDR: rd = mem16[rs]
    Ldr = 0x02,
    /// LDRB: rd = mem8[rs]
    Ldrb = 0x03,
    /// ADD: rd = rs1 + rs2
    Add = 0x04,
    /// SUB: rd = rs1 - rs2
    Sub = 0x05,
    /// MUL: rd = rs1 * rs2
    Mul = 0x06,
    /// DIV: rd = rs1 / rs2 (fatal when rs2 is 0)
    Div = 0x07,
    /// MOD: rd = rs1 % rs2 (fatal when rs2 is 0)
    Mod = 0x08,
    /// AND: rd = rs1 & rs2
    And = 0x09,
    /// OR: rd = rs1 | rs2
    Or = 0x0a,
    /// XOR: rd = rs1 ^ rs2
    Xor = 0x0b,
    /// SHL: rd = rs1 << rs2
    Shl = 0x0c,
    /// SHR: rd = rs1 >> rs2
    Shr = 0x0d,
    /// JMP: ip = addr
    Jmp = 0x0e,
    /// JZ: if zero flag set, ip = addr and the zero flag is cleared
    Jz = 0x0f,
    /// JD: ip = rs
    Jd = 0x10,
    /// STI: mem16[addr] = rs
    Sti = 0x11,
    /// STIB: mem8[addr] = low byte of rs
    Stib = 0x12,
    /// STR: mem16[ra] = rs
    Str = 0x13,
    /// STRB: mem8[ra] = low byte of rs
    Strb = 0x14,
    /// SYS: dispatch through the syscall table on register a
    Sys = 0x15,
}

/// Argument scheme for the three bytes following the opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgScheme {
    /// No arguments, e.g. `nop`
    None,
    /// Three registers, e.g. `add %a, %b, %c`
    Regs,
    /// Register plus 16-bit immediate, e.g. `ldi %a, 0x1234`
    RegImm,
    /// Two registers, e.g. `str %a, %b`
    RegReg,
    /// One register, e.g. `jd %a`
    Reg,
    /// 16-bit immediate only, e.g. `jmp 0x1234`
    Imm,
}

impl Opcode {
    /// Try to convert from the raw opcode byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Opcode::Nop),
            0x01 => Some(Opcode::Ldi),
            0x02 => Some(Opcode::Ldr),
            0x03 => Some(Opcode::Ldrb),
            0x04 => Some(Opcode::Add),
            0x05 => Some(Opcode::Sub),
            0x06 => Some(Opcode::Mul),
            0x07 => Some(Opcode::Div),
            0x08 => Some(Opcode::Mod),
            0x09 => Some(Opcode::And),
            0x0a => Some(Opcode::Or),
            0x0b => Some(Opcode::Xor),
            0x0c => Some(Opcode::Shl),
            0x0d => Some(Opcode::Shr),
            0x0e => Some(Opcode::Jmp),
            0x0f => Some(Opcode::Jz),
            0x10 => Some(Opcode::Jd),
            0x11 => Some(Opcode::Sti),
            0x12 => Some(Opcode::Stib),
            0x13 => Some(Opcode::Str),
            0x14 => Some(Opcode::Strb),
            0x15 => Some(Opcode::Sys),
            _ => None,
        }
    }

    /// Raw opcode byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Assembly mnemonic
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Ldi => "ldi",
            Opcode::Ldr => "ldr",
            Opcode::Ldrb => "ldrb",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Jmp => "jmp",
            Opcode::Jz => "jz",
            Opcode::Jd => "jd",
            Opcode::Sti => "sti",
            Opcode::Stib => "stib",
            Opcode::Str => "str",
            Opcode::Strb => "strb",
            Opcode::Sys => "sys",
        }
    }

    /// Look up an opcode by its assembly mnemonic
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::all().find(|op| op.mnemonic() == name)
    }

    /// Argument scheme governing bytes 1-3
    pub fn scheme(self) -> ArgScheme {
        match self {
            Opcode::Nop | Opcode::Sys => ArgScheme::None,
            Opcode::Ldi | Opcode::Sti | Opcode::Stib => ArgScheme::RegImm,
            Opcode::Ldr | Opcode::Ldrb | Opcode::Str | Opcode::Strb => ArgScheme::RegReg,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Shl
            | Opcode::Shr => ArgScheme::Regs,
            Opcode::Jmp | Opcode::Jz => ArgScheme::Imm,
            Opcode::Jd => ArgScheme::Reg,
        }
    }

    /// Iterate over every valid opcode in encoding order
    pub fn all() -> impl Iterator<Item = Opcode> {
        (0..NUM_OPCODES).map(|v| Opcode::from_u8(v).expect("opcode table is contiguous"))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
