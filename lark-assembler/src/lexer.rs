//! # Lexer for Lark-16 Assembly
//!
//! Raw token recognition is a [`logos`] scanner; the [`Lexer`] wrapper
//! tracks line/column positions and maps scanner output onto the public
//! [`Token`] type (adding the end-of-file token the scanner does not
//! produce).
//!
//! Tokens own their text. Cloning a token deep-copies the buffer, which
//! macro expansion relies on when it replays body tokens repeatedly.

use crate::error::{AsmError, LexErrorKind, Result};
use logos::Logos;

/// Longest accepted identifier or string literal, in bytes.
pub const MAX_NAME_LEN: usize = 1024;

/// One lexed token with its source position (1-based line and column).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub col: u32,
}

/// Token payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,
    // single-char tokens
    Newline,
    Comma,
    Colon,
    Percent,
    Dollar,
    Dot,
    Bang,
    Minus,
    Semicolon,
    // keywords
    MacroKw,
    // value-holding tokens
    Ident(String),
    Int(i32),
    Str(String),
    Char(char),
}

impl TokenKind {
    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Percent => "'%'".to_string(),
            TokenKind::Dollar => "'$'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Bang => "'!'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::MacroKw => "'macro'".to_string(),
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Int(value) => format!("integer {value}"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Char(c) => format!("character literal {c:?}"),
        }
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t]+")] // whitespace (not newlines)
#[logos(skip r"#[^\n]*")] // comments
enum RawToken {
    #[token("\n")]
    Newline,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token("%")]
    Percent,

    #[token("$")]
    Dollar,

    #[token(".")]
    Dot,

    #[token("!")]
    Bang,

    #[token("-")]
    Minus,

    #[token(";")]
    Semicolon,

    #[token("macro")]
    MacroKw,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", parse_ident)]
    Ident(String),

    /// 123, 0x123, 0b101, and negated forms
    #[regex(r"-?(0x[0-9a-fA-F]+|0b[01]+|[0-9]+)", parse_int)]
    Int(i32),

    #[regex(r#""([^"\\]|\\.)*""#, parse_str)]
    #[regex(r#""([^"\\]|\\.)*"#, unterminated_str)]
    Str(String),

    #[regex(r"'(\\.|[^'\\])'", parse_char)]
    #[regex(r"'(\\.|[^'\\])?", unterminated_char)]
    Char(char),
}

fn unterminated_str(
    _lex: &mut logos::Lexer<RawToken>,
) -> std::result::Result<String, LexErrorKind> {
    Err(LexErrorKind::UnterminatedString)
}

fn unterminated_char(
    _lex: &mut logos::Lexer<RawToken>,
) -> std::result::Result<char, LexErrorKind> {
    Err(LexErrorKind::UnterminatedChar)
}

fn parse_ident(lex: &mut logos::Lexer<RawToken>) -> std::result::Result<String, LexErrorKind> {
    let slice = lex.slice();
    if slice.len() > MAX_NAME_LEN {
        return Err(LexErrorKind::IdentifierTooLong);
    }
    Ok(slice.to_string())
}

fn parse_int(lex: &mut logos::Lexer<RawToken>) -> std::result::Result<i32, LexErrorKind> {
    let slice = lex.slice();
    let (negative, digits) = match slice.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, slice),
    };

    let magnitude = if let Some(hex) = digits.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        u32::from_str_radix(bin, 2)
    } else {
        digits.parse::<u32>()
    }
    .map_err(|_| LexErrorKind::IntegerTooLarge)?;

    if magnitude > 0xffff {
        return Err(LexErrorKind::IntegerTooLarge);
    }

    Ok(if negative {
        -(magnitude as i32)
    } else {
        magnitude as i32
    })
}

fn unescape(c: char, quote: char) -> std::result::Result<char, LexErrorKind> {
    match c {
        'n' => Ok('\n'),
        't' => Ok('\t'),
        'r' => Ok('\r'),
        '\\' => Ok('\\'),
        c if c == quote => Ok(c),
        _ => Err(LexErrorKind::InvalidEscape),
    }
}

fn parse_str(lex: &mut logos::Lexer<RawToken>) -> std::result::Result<String, LexErrorKind> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let escaped = chars.next().ok_or(LexErrorKind::InvalidEscape)?;
            value.push(unescape(escaped, '"')?);
        } else {
            value.push(c);
        }
        if value.len() > MAX_NAME_LEN {
            return Err(LexErrorKind::StringTooLong);
        }
    }

    Ok(value)
}

fn parse_char(lex: &mut logos::Lexer<RawToken>) -> std::result::Result<char, LexErrorKind> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];

    let mut chars = inner.chars();
    let first = chars.next().ok_or(LexErrorKind::UnterminatedChar)?;
    if first == '\\' {
        let escaped = chars.next().ok_or(LexErrorKind::InvalidEscape)?;
        unescape(escaped, '\'')
    } else {
        Ok(first)
    }
}

/// Position-tracking token source over an in-memory source text.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, RawToken>,
    src: &'src str,
    line: u32,
    line_start: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            inner: RawToken::lexer(src),
            src,
            line: 1,
            line_start: 0,
        }
    }

    /// Next token, or the end-of-file token once the input is exhausted.
    pub fn next(&mut self) -> Result<Token> {
        let Some(raw) = self.inner.next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line: self.line,
                col: (self.src.len() - self.line_start + 1) as u32,
            });
        };

        let span = self.inner.span();
        let line = self.line;
        let col = (span.start - self.line_start + 1) as u32;

        // newlines can appear both as tokens and inside string literals
        for (offset, byte) in self.src[span.clone()].bytes().enumerate() {
            if byte == b'\n' {
                self.line += 1;
                self.line_start = span.start + offset + 1;
            }
        }

        let kind = match raw {
            Ok(RawToken::Newline) => TokenKind::Newline,
            Ok(RawToken::Comma) => TokenKind::Comma,
            Ok(RawToken::Colon) => TokenKind::Colon,
            Ok(RawToken::Percent) => TokenKind::Percent,
            Ok(RawToken::Dollar) => TokenKind::Dollar,
            Ok(RawToken::Dot) => TokenKind::Dot,
            Ok(RawToken::Bang) => TokenKind::Bang,
            Ok(RawToken::Minus) => TokenKind::Minus,
            Ok(RawToken::Semicolon) => TokenKind::Semicolon,
            Ok(RawToken::MacroKw) => TokenKind::MacroKw,
            Ok(RawToken::Ident(name)) => TokenKind::Ident(name),
            Ok(RawToken::Int(value)) => TokenKind::Int(value),
            Ok(RawToken::Str(value)) => TokenKind::Str(value),
            Ok(RawToken::Char(value)) => TokenKind::Char(value),
            Err(kind) => return Err(AsmError::Lex { kind, line, col }),
        };

        Ok(Token { kind, line, col })
    }
}
