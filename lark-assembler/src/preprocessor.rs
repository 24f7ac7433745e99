//! # Macro Preprocessor
//!
//! Sits between the lexer and the assembler and yields tokens as if macro
//! definitions and invocations were never present.
//!
//! At the front of a line, `!macro <name> <param>* : <body>* ;` records a
//! definition (each formal may be written bare or as `$name`), and an
//! identifier naming a known macro starts an invocation: one
//! comma-separated argument (an arbitrary token run) is captured per
//! formal parameter, the last terminated by newline. The body is then
//! replayed token by token; `$` followed by a formal parameter name
//! streams clones of that argument's captured tokens.
//!
//! Captured argument tokens are emitted verbatim and never re-expanded,
//! even if they spell another macro invocation, and a `$name` that does
//! not match any formal parameter replays untouched. This is a deliberate
//! limit: expansion is a single rewrite, not a fixpoint.

use crate::error::{AsmError, Result};
use crate::lexer::{Lexer, Token, TokenKind};

/// A recorded macro definition: name, ordered formal parameters, and the
/// body tokens stored verbatim.
#[derive(Debug, Clone)]
pub struct Macro {
    name: String,
    params: Vec<String>,
    body: Vec<Token>,
}

/// In-flight invocation state.
struct Expansion {
    macro_index: usize,
    /// Next body token to replay.
    body_pos: usize,
    /// Captured argument tokens, one run per formal parameter.
    args: Vec<Vec<Token>>,
    /// Argument currently being streamed: (argument index, position).
    streaming: Option<(usize, usize)>,
    /// Token that terminated argument capture, emitted after the body.
    pending: Token,
}

/// Token source with macro definition and expansion applied.
pub struct Preprocessor<'src> {
    lexer: Lexer<'src>,
    macros: Vec<Macro>,
    expansion: Option<Expansion>,
    /// True when the next lexer token begins a source line.
    at_line_start: bool,
}

impl<'src> Preprocessor<'src> {
    pub fn new(lexer: Lexer<'src>) -> Self {
        Self {
            lexer,
            macros: Vec::new(),
            expansion: None,
            at_line_start: true,
        }
    }

    /// Convenience constructor over source text.
    pub fn from_source(src: &'src str) -> Self {
        Self::new(Lexer::new(src))
    }

    /// Fetch one lexer token, reporting whether it began a line.
    fn fetch(&mut self) -> Result<(Token, bool)> {
        let starts_line = self.at_line_start;
        let token = self.lexer.next()?;
        self.at_line_start = token.kind == TokenKind::Newline;
        Ok((token, starts_line))
    }

    /// Next token as seen by the assembler.
    pub fn next(&mut self) -> Result<Token> {
        loop {
            if let Some(token) = self.step_expansion()? {
                return Ok(token);
            }

            let (token, starts_line) = self.fetch()?;

            if starts_line && token.kind == TokenKind::Bang {
                let (directive, _) = self.fetch()?;
                if directive.kind != TokenKind::MacroKw {
                    return Err(AsmError::UnknownDirective {
                        line: directive.line,
                        col: directive.col,
                    });
                }
                self.define_macro()?;
                continue;
            }

            if starts_line {
                if let TokenKind::Ident(ref name) = token.kind {
                    if let Some(index) = self.macros.iter().position(|m| &m.name == name) {
                        self.begin_invocation(index, &token)?;
                        continue;
                    }
                }
            }

            return Ok(token);
        }
    }

    /// Parse `<name> <param>* : <body>* ;` after the `!macro` directive.
    fn define_macro(&mut self) -> Result<()> {
        let (name_token, _) = self.fetch()?;
        let TokenKind::Ident(name) = name_token.kind else {
            return Err(AsmError::UnexpectedToken {
                expected: "macro name",
                got: name_token.kind.describe(),
                line: name_token.line,
                col: name_token.col,
            });
        };

        if self.macros.iter().any(|m| m.name == name) {
            return Err(AsmError::MacroRedefinition {
                name,
                line: name_token.line,
                col: name_token.col,
            });
        }

        let mut params = Vec::new();
        let (mut token, _) = self.fetch()?;
        loop {
            // formals may be written bare or with a leading '$'
            let param_token = if token.kind == TokenKind::Dollar {
                let (next, _) = self.fetch()?;
                if !matches!(next.kind, TokenKind::Ident(_)) {
                    return Err(AsmError::UnexpectedToken {
                        expected: "parameter name after '$'",
                        got: next.kind.describe(),
                        line: next.line,
                        col: next.col,
                    });
                }
                next
            } else {
                token
            };

            match param_token.kind {
                TokenKind::Ident(param) => {
                    if params.contains(&param) {
                        return Err(AsmError::DuplicateMacroParameter {
                            name: param,
                            line: param_token.line,
                            col: param_token.col,
                        });
                    }
                    params.push(param);
                    (token, _) = self.fetch()?;
                }
                _ => {
                    token = param_token;
                    break;
                }
            }
        }

        if token.kind != TokenKind::Colon {
            return Err(AsmError::UnexpectedToken {
                expected: "':' after macro parameters",
                got: token.kind.describe(),
                line: token.line,
                col: token.col,
            });
        }

        let mut body = Vec::new();
        loop {
            let (token, _) = self.fetch()?;
            match token.kind {
                TokenKind::Semicolon => break,
                TokenKind::Eof => {
                    return Err(AsmError::UnterminatedMacro {
                        name,
                        line: name_token.line,
                        col: name_token.col,
                    });
                }
                _ => body.push(token),
            }
        }

        self.macros.push(Macro { name, params, body });
        Ok(())
    }

    /// Capture one argument token run per formal parameter.
    fn begin_invocation(&mut self, macro_index: usize, name_token: &Token) -> Result<()> {
        let expected = self.macros[macro_index].params.len();
        let mut args = Vec::with_capacity(expected);

        let (mut token, _) = self.fetch()?;
        for captured in 0..expected {
            let mut arg = Vec::new();
            while !matches!(
                token.kind,
                TokenKind::Comma | TokenKind::Newline | TokenKind::Eof
            ) {
                arg.push(token);
                (token, _) = self.fetch()?;
            }
            args.push(arg);

            if token.kind == TokenKind::Comma {
                (token, _) = self.fetch()?;
            } else if captured + 1 < expected {
                // newline (or end of input) before every parameter was filled
                return Err(AsmError::TooFewMacroArgs {
                    name: self.macros[macro_index].name.clone(),
                    expected,
                    line: name_token.line,
                    col: name_token.col,
                });
            }
        }

        // the macro-name token is consumed; the first emitted token comes
        // from the body, and the capture terminator follows it
        self.expansion = Some(Expansion {
            macro_index,
            body_pos: 0,
            args,
            streaming: None,
            pending: token,
        });

        Ok(())
    }

    /// Produce the next token of the current expansion, if one is active.
    fn step_expansion(&mut self) -> Result<Option<Token>> {
        loop {
            let Some(exp) = self.expansion.as_mut() else {
                return Ok(None);
            };

            if let Some((arg_index, pos)) = exp.streaming {
                if let Some(token) = exp.args[arg_index].get(pos) {
                    let token = token.clone();
                    if pos + 1 == exp.args[arg_index].len() {
                        exp.streaming = None;
                        exp.body_pos += 1; // past the parameter identifier
                    } else {
                        exp.streaming = Some((arg_index, pos + 1));
                    }
                    return Ok(Some(token));
                }
                // an empty argument streams nothing
                exp.streaming = None;
                exp.body_pos += 1;
            }

            let mac = &self.macros[exp.macro_index];

            if exp.body_pos >= mac.body.len() {
                let pending = exp.pending.clone();
                self.expansion = None;
                return Ok(Some(pending));
            }

            let token = mac.body[exp.body_pos].clone();
            exp.body_pos += 1;

            if token.kind != TokenKind::Dollar {
                return Ok(Some(token));
            }

            // a parameter reference is '$' + a formal parameter name;
            // anything else after '$' replays untouched
            let arg_index = mac.body.get(exp.body_pos).and_then(|next| {
                if let TokenKind::Ident(ref name) = next.kind {
                    mac.params.iter().position(|p| p == name)
                } else {
                    None
                }
            });

            let Some(arg_index) = arg_index else {
                return Ok(Some(token));
            };

            exp.streaming = Some((arg_index, 0));
        }
    }
}
