//! Assembler errors
//!
//! Every stage reports structured errors with a source position; deciding
//! to abort the process is left to the caller.

use thiserror::Error;

/// Lexical error kinds, carried inside [`AsmError::Lex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
pub enum LexErrorKind {
    #[default]
    #[error("invalid character")]
    InvalidCharacter,

    #[error("unterminated string")]
    UnterminatedString,

    #[error("unterminated character literal")]
    UnterminatedChar,

    #[error("invalid escape sequence")]
    InvalidEscape,

    #[error("integer too large")]
    IntegerTooLarge,

    #[error("string too long")]
    StringTooLong,

    #[error("identifier too long")]
    IdentifierTooLong,
}

#[derive(Debug, Error)]
pub enum AsmError {
    #[error("Lex error at {line}:{col}: {kind}")]
    Lex { kind: LexErrorKind, line: u32, col: u32 },

    #[error("Parse error at {line}:{col}: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: &'static str,
        got: String,
        line: u32,
        col: u32,
    },

    #[error("Unknown instruction '{name}' at {line}:{col}")]
    UnknownInstruction { name: String, line: u32, col: u32 },

    #[error("Invalid register %{name} at {line}:{col}")]
    InvalidRegister { name: String, line: u32, col: u32 },

    #[error("Unknown preprocessor directive at {line}:{col}")]
    UnknownDirective { line: u32, col: u32 },

    #[error("Macro '{name}' redefined at {line}:{col}")]
    MacroRedefinition { name: String, line: u32, col: u32 },

    #[error("Duplicate macro parameter '{name}' at {line}:{col}")]
    DuplicateMacroParameter { name: String, line: u32, col: u32 },

    #[error("Unterminated definition of macro '{name}' starting at {line}:{col}")]
    UnterminatedMacro { name: String, line: u32, col: u32 },

    #[error("Too few arguments to macro '{name}' at {line}:{col}: expected {expected}")]
    TooFewMacroArgs {
        name: String,
        expected: usize,
        line: u32,
        col: u32,
    },

    #[error("Label '{name}' already defined at {line}:{col}")]
    DuplicateLabel { name: String, line: u32, col: u32 },

    #[error("Too many labels (maximum {max})")]
    TooManyLabels { max: usize },
}

pub type Result<T> = std::result::Result<T, AsmError>;
