//! Syscall table
//!
//! The `sys` instruction dispatches through a bounded table of handlers
//! indexed by register `a`. Handlers get the full [`CpuState`] and may
//! read and write registers and memory freely within the call.
//!
//! Syscall convention:
//! - `%a`: syscall number (and return value, by convention)
//! - `%b`-`%d`: arguments

use crate::state::CpuState;
use lark_spec::{flags, Register};

/// Maximum number of registered syscalls.
pub const MAX_SYSCALLS: usize = 32;

/// A syscall handler.
pub trait Syscall {
    fn call(&mut self, state: &mut CpuState);
}

/// Adapter so a plain closure can sit in the syscall table.
pub struct SyscallFn<F>(pub F);

impl<F: FnMut(&mut CpuState)> Syscall for SyscallFn<F> {
    fn call(&mut self, state: &mut CpuState) {
        (self.0)(state)
    }
}

/// Syscall 0 by convention: set the finished flag so the driver loop stops.
pub struct Exit;

impl Syscall for Exit {
    fn call(&mut self, state: &mut CpuState) {
        state.set_flag(flags::FIN);
    }
}

/// Syscall 1 by convention: write `%c` bytes of memory starting at `%b` to
/// the wrapped sink, then clear `%a`.
pub struct Print<W: std::io::Write> {
    out: W,
}

impl<W: std::io::Write> Print<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: std::io::Write> Syscall for Print<W> {
    fn call(&mut self, state: &mut CpuState) {
        let addr = state.read_reg(Register::B);
        let len = state.read_reg(Register::C);

        for i in 0..len {
            let byte = state.read_u8(addr.wrapping_add(i));
            if self.out.write_all(&[byte]).is_err() {
                break;
            }
        }
        let _ = self.out.flush();

        state.write_reg(Register::A, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_sets_finished() {
        let mut state = CpuState::new();
        Exit.call(&mut state);
        assert!(state.finished());
    }

    #[test]
    fn test_print_writes_memory_range() {
        let mut state = CpuState::new();
        for (i, b) in b"lark".iter().enumerate() {
            state.write_u8(0x6000 + i as u16, *b);
        }
        state.write_reg(Register::A, 1);
        state.write_reg(Register::B, 0x6000);
        state.write_reg(Register::C, 4);

        let mut out = Vec::new();
        Print::new(&mut out).call(&mut state);

        assert_eq!(out, b"lark");
        assert_eq!(state.read_reg(Register::A), 0);
    }

    #[test]
    fn test_closure_as_syscall() {
        let mut state = CpuState::new();
        let mut handler = SyscallFn(|state: &mut CpuState| state.write_reg(Register::Z, 42));
        handler.call(&mut state);
        assert_eq!(state.read_reg(Register::Z), 42);
    }
}
