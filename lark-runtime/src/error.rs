//! Runtime error types

use lark_spec::SpecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Spec error: {0}")]
    Spec(#[from] SpecError),

    #[error("Division by zero at {addr:#06x}")]
    DivisionByZero { addr: u16 },

    #[error("Invalid syscall {number} ({registered} registered)")]
    InvalidSyscall { number: u16, registered: usize },

    #[error("Too many syscalls: {count} (maximum {max})")]
    TooManySyscalls { count: usize, max: usize },

    #[error("Too many MMIO entries (maximum {max})")]
    TooManyMmioEntries { max: usize },

    #[error("Too many breakpoints (maximum {max})")]
    TooManyBreakpoints { max: usize },

    #[error("Too many watchpoints (maximum {max})")]
    TooManyWatchpoints { max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
