//! # Assembler
//!
//! Consumes the preprocessed token stream one line at a time: a line is
//! either a label definition (`.name:`) or an instruction whose operands
//! follow the opcode's [`ArgScheme`]. Each instruction is encoded to its
//! 4-byte form and appended to an in-memory image; the running image
//! length is the current address.
//!
//! Label references to not-yet-defined names emit a zero placeholder and
//! record the byte offset of the immediate field. One backpatch pass after
//! the token stream is exhausted overwrites every recorded offset with the
//! resolved address, high byte first. A label never defined is reported
//! but does not abort the run; its references stay zero in the image.

use crate::error::{AsmError, Result};
use crate::lexer::{Token, TokenKind};
use crate::preprocessor::Preprocessor;
use lark_spec::{ArgScheme, Instruction, Opcode, Register};

/// Maximum number of labels per assembly run.
pub const MAX_LABELS: usize = 256;

/// Result of one assembly run.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// The flat binary image.
    pub image: Vec<u8>,
    /// Names of labels that were referenced but never defined.
    pub unresolved: Vec<String>,
}

struct Label {
    name: String,
    /// Byte address, once the label is defined.
    addr: Option<u16>,
    /// Byte offsets of immediate fields awaiting this label's address.
    refs: Vec<u16>,
}

/// Single-pass assembler with end-of-stream label backpatching.
pub struct Assembler<'src> {
    preprocessor: Preprocessor<'src>,
    token: Token,
    output: Vec<u8>,
    labels: Vec<Label>,
}

/// Assemble source text into a flat binary image.
pub fn assemble(source: &str) -> Result<Assembly> {
    Assembler::new(source)?.run()
}

impl<'src> Assembler<'src> {
    pub fn new(source: &'src str) -> Result<Self> {
        let mut preprocessor = Preprocessor::from_source(source);
        let token = preprocessor.next()?;

        Ok(Self {
            preprocessor,
            token,
            output: Vec::new(),
            labels: Vec::new(),
        })
    }

    fn advance(&mut self) -> Result<()> {
        self.token = self.preprocessor.next()?;
        Ok(())
    }

    fn unexpected(&self, expected: &'static str) -> AsmError {
        AsmError::UnexpectedToken {
            expected,
            got: self.token.kind.describe(),
            line: self.token.line,
            col: self.token.col,
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<()> {
        if self.token.kind != kind {
            return Err(self.unexpected(expected));
        }
        self.advance()
    }

    /// Drive the whole token stream, then backpatch.
    pub fn run(mut self) -> Result<Assembly> {
        loop {
            while self.token.kind == TokenKind::Newline {
                self.advance()?;
            }

            match self.token.kind {
                TokenKind::Eof => break,
                TokenKind::Dot => {
                    self.advance()?;
                    self.parse_label_definition()?;
                }
                TokenKind::Ident(_) => self.parse_instruction()?,
                _ => return Err(self.unexpected("instruction or label")),
            }
        }

        let mut unresolved = Vec::new();
        for label in &self.labels {
            match label.addr {
                Some(addr) => {
                    for &offset in &label.refs {
                        self.output[offset as usize] = (addr >> 8) as u8;
                        self.output[offset as usize + 1] = addr as u8;
                    }
                }
                None => {
                    tracing::error!(label = %label.name, "label referenced but never defined");
                    unresolved.push(label.name.clone());
                }
            }
        }

        Ok(Assembly {
            image: self.output,
            unresolved,
        })
    }

    fn parse_label_definition(&mut self) -> Result<()> {
        let TokenKind::Ident(ref name) = self.token.kind else {
            return Err(self.unexpected("label name after '.'"));
        };
        let name = name.clone();
        let addr = self.output.len() as u16;

        if let Some(label) = self.labels.iter_mut().find(|l| l.name == name) {
            if label.addr.is_some() {
                return Err(AsmError::DuplicateLabel {
                    name,
                    line: self.token.line,
                    col: self.token.col,
                });
            }
            label.addr = Some(addr);
        } else {
            if self.labels.len() >= MAX_LABELS {
                return Err(AsmError::TooManyLabels { max: MAX_LABELS });
            }
            self.labels.push(Label {
                name,
                addr: Some(addr),
                refs: Vec::new(),
            });
        }

        self.advance()?;
        self.expect(TokenKind::Colon, "':' after label name")
    }

    /// Address of a referenced label, or 0 with the immediate field's
    /// offset recorded for backpatching.
    fn label_value(&mut self, name: &str) -> Result<u16> {
        // the immediate lives two bytes into the instruction being built
        let ref_offset = self.output.len() as u16 + 2;

        if let Some(label) = self.labels.iter_mut().find(|l| l.name == name) {
            if let Some(addr) = label.addr {
                return Ok(addr);
            }
            label.refs.push(ref_offset);
            return Ok(0);
        }

        if self.labels.len() >= MAX_LABELS {
            return Err(AsmError::TooManyLabels { max: MAX_LABELS });
        }
        self.labels.push(Label {
            name: name.to_string(),
            addr: None,
            refs: vec![ref_offset],
        });
        Ok(0)
    }

    fn parse_register(&mut self) -> Result<Register> {
        self.expect(TokenKind::Percent, "'%' before register name")?;

        let TokenKind::Ident(ref name) = self.token.kind else {
            return Err(self.unexpected("register name after '%'"));
        };

        let Some(reg) = Register::from_name(name) else {
            return Err(AsmError::InvalidRegister {
                name: name.clone(),
                line: self.token.line,
                col: self.token.col,
            });
        };

        self.advance()?;
        Ok(reg)
    }

    fn parse_immediate(&mut self) -> Result<u16> {
        match self.token.kind {
            TokenKind::Int(value) => {
                self.advance()?;
                Ok(value as u16)
            }
            TokenKind::Char(c) => {
                self.advance()?;
                Ok(c as u16)
            }
            TokenKind::Dot => {
                self.advance()?;
                let TokenKind::Ident(ref name) = self.token.kind else {
                    return Err(self.unexpected("label name after '.'"));
                };
                let name = name.clone();
                let addr = self.label_value(&name)?;
                self.advance()?;
                Ok(addr)
            }
            _ => Err(self.unexpected("immediate")),
        }
    }

    fn parse_instruction(&mut self) -> Result<()> {
        let TokenKind::Ident(ref name) = self.token.kind else {
            return Err(self.unexpected("instruction"));
        };

        let Some(opcode) = Opcode::from_mnemonic(name) else {
            return Err(AsmError::UnknownInstruction {
                name: name.clone(),
                line: self.token.line,
                col: self.token.col,
            });
        };

        self.advance()?;

        let inst = match opcode.scheme() {
            ArgScheme::None => match opcode {
                Opcode::Nop => Instruction::Nop,
                _ => Instruction::Sys,
            },

            ArgScheme::Regs => {
                let rd = self.parse_register()?;
                self.expect(TokenKind::Comma, "',' between operands")?;
                let rs1 = self.parse_register()?;
                self.expect(TokenKind::Comma, "',' between operands")?;
                let rs2 = self.parse_register()?;

                match opcode {
                    Opcode::Add => Instruction::Add { rd, rs1, rs2 },
                    Opcode::Sub => Instruction::Sub { rd, rs1, rs2 },
                    Opcode::Mul => Instruction::Mul { rd, rs1, rs2 },
                    Opcode::Div => Instruction::Div { rd, rs1, rs2 },
                    Opcode::Mod => Instruction::Mod { rd, rs1, rs2 },
                    Opcode::And => Instruction::And { rd, rs1, rs2 },
                    Opcode::Or => Instruction::Or { rd, rs1, rs2 },
                    Opcode::Xor => Instruction::Xor { rd, rs1, rs2 },
                    Opcode::Shl => Instruction::Shl { rd, rs1, rs2 },
                    _ => Instruction::Shr { rd, rs1, rs2 },
                }
            }

            ArgScheme::RegImm => {
                let reg = self.parse_register()?;
                self.expect(TokenKind::Comma, "',' between operands")?;
                let imm = self.parse_immediate()?;

                match opcode {
                    Opcode::Ldi => Instruction::Ldi { rd: reg, imm },
                    Opcode::Sti => Instruction::Sti { rs: reg, addr: imm },
                    _ => Instruction::Stib { rs: reg, addr: imm },
                }
            }

            ArgScheme::RegReg => {
                let first = self.parse_register()?;
                self.expect(TokenKind::Comma, "',' between operands")?;
                let second = self.parse_register()?;

                match opcode {
                    Opcode::Ldr => Instruction::Ldr { rd: first, rs: second },
                    Opcode::Ldrb => Instruction::Ldrb { rd: first, rs: second },
                    Opcode::Str => Instruction::Str { ra: first, rs: second },
                    _ => Instruction::Strb { ra: first, rs: second },
                }
            }

            ArgScheme::Reg => {
                let rs = self.parse_register()?;
                Instruction::Jd { rs }
            }

            ArgScheme::Imm => {
                let addr = self.parse_immediate()?;
                match opcode {
                    Opcode::Jmp => Instruction::Jmp { addr },
                    _ => Instruction::Jz { addr },
                }
            }
        };

        // a newline ends the line; end of input is accepted for the last one
        match self.token.kind {
            TokenKind::Newline => self.advance()?,
            TokenKind::Eof => {}
            _ => return Err(self.unexpected("newline after instruction")),
        }

        self.output.extend_from_slice(&inst.encode());
        Ok(())
    }
}
