//! # Lark-16 Assembler
//!
//! Compile Lark-16 assembly text into the flat binary encoding the CPU
//! executes: lexer → macro preprocessor → single-pass assembler with
//! end-of-stream label backpatching.
//!
//! ## Example
//!
//! ```rust
//! use lark_assembler::assemble;
//!
//! let source = "\
//! !macro halt : ldi %a, 0
//! sys ;
//! ldi %b, 0x1234
//! halt
//! ";
//!
//! let assembly = assemble(source).unwrap();
//! assert_eq!(assembly.image.len(), 12);
//! ```

pub mod assembler;
pub mod error;
pub mod lexer;
pub mod preprocessor;

pub use assembler::{assemble, Assembler, Assembly, MAX_LABELS};
pub use error::{AsmError, LexErrorKind, Result};
pub use lexer::{Lexer, Token, TokenKind, MAX_NAME_LEN};
pub use preprocessor::{Macro, Preprocessor};
