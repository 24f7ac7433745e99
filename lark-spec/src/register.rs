//! Register definitions for Lark-16
//!
//! 32 sixteen-bit registers: `a`-`z` are general purpose (with `a`-`d`
//! doubling as syscall number and arguments), indices 26-28 are reserved,
//! and `sp`/`ip`/`fl` sit at the top.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of registers
pub const NUM_REGISTERS: usize = 32;

/// Register (a-z, reserved, sp, ip, fl)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Register {
    A = 0, // syscall number
    B = 1, // syscall argument 1
    C = 2, // syscall argument 2
    D = 3, // syscall argument 3
    E = 4,
    F = 5,
    G = 6,
    H = 7,
    I = 8,
    J = 9,
    K = 10,
    L = 11,
    M = 12,
    N = 13,
    O = 14,
    P = 15,
    Q = 16,
    R = 17,
    S = 18,
    T = 19,
    U = 20,
    V = 21,
    W = 22,
    X = 23,
    Y = 24,
    Z = 25,
    R26 = 26, // reserved
    R27 = 27, // reserved
    R28 = 28, // reserved
    Sp = 29,  // stack pointer
    Ip = 30,  // instruction pointer
    Fl = 31,  // flags
}

impl Register {
    /// Stack pointer
    pub const STACK_POINTER: Self = Self::Sp;
    /// Instruction pointer
    pub const INSTRUCTION_POINTER: Self = Self::Ip;
    /// Flags register
    pub const FLAGS: Self = Self::Fl;

    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        if index < NUM_REGISTERS {
            Some(unsafe { std::mem::transmute::<u8, Register>(index as u8) })
        } else {
            None
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Assembly name (`a`-`z`, `r26`-`r28`, `sp`, `ip`, `fl`)
    pub fn name(self) -> &'static str {
        const NAMES: [&str; NUM_REGISTERS] = [
            "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q",
            "r", "s", "t", "u", "v", "w", "x", "y", "z", "r26", "r27", "r28", "sp", "ip", "fl",
        ];
        NAMES[self.index()]
    }

    /// Look up a register by its assembly name
    pub fn from_name(name: &str) -> Option<Self> {
        (0..NUM_REGISTERS)
            .map(|i| Self::from_index(i).expect("index in range"))
            .find(|reg| reg.name() == name)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_index_roundtrip() {
        for i in 0..NUM_REGISTERS {
            let reg = Register::from_index(i).unwrap();
            assert_eq!(reg.index(), i);
        }
        assert_eq!(Register::from_index(NUM_REGISTERS), None);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Register::from_name("a"), Some(Register::A));
        assert_eq!(Register::from_name("z"), Some(Register::Z));
        assert_eq!(Register::from_name("sp"), Some(Register::Sp));
        assert_eq!(Register::from_name("ip"), Some(Register::Ip));
        assert_eq!(Register::from_name("fl"), Some(Register::Fl));
        assert_eq!(Register::from_name("aa"), None);
        assert_eq!(Register::from_name(""), None);
    }

    #[test]
    fn test_special_indices() {
        assert_eq!(Register::Sp.index(), 29);
        assert_eq!(Register::Ip.index(), 30);
        assert_eq!(Register::Fl.index(), 31);
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(Register::Q.to_string(), "q");
        assert_eq!(Register::Fl.to_string(), "fl");
    }
}
