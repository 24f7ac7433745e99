//! Error types for the Lark-16 specification crate

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("Invalid register index: {0} (valid range: 0-31)")]
    InvalidRegister(u8),

    #[error("Binary image too large: {size} bytes (maximum {max})")]
    ImageTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, SpecError>;
