//! Interactive debugger overlay
//!
//! Wraps a [`Cpu`] without owning or copying its state. While
//! free-running, the next instruction is peeked before execution so store
//! watchpoints and breakpoints halt *before* the triggering instruction
//! runs. While stopped, one operator command is accepted per call.
//!
//! Command parsing and execution ([`Debugger::execute_command`]) is a pure
//! function over a line of text so it can be driven from tests; the
//! blocking prompt loop lives in [`Debugger::run`].

use crate::cpu::Cpu;
use crate::error::{Result, RuntimeError};
use lark_spec::{Instruction, Register, NUM_REGISTERS};
use std::io::{BufRead, Write};

/// Maximum number of breakpoints.
pub const MAX_BREAKPOINTS: usize = 32;

/// Maximum number of watchpoints.
pub const MAX_WATCHPOINTS: usize = 32;

/// Outcome of one operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Command handled; prompt again.
    Handled,
    /// Operator asked to leave the debugger.
    Quit,
}

/// Debugger state layered over a borrowed CPU.
pub struct Debugger<'a> {
    cpu: &'a mut Cpu,
    breakpoints: Vec<u16>,
    watchpoints: Vec<u16>,
    reg_watch: [bool; NUM_REGISTERS],
    prev_regs: [u16; NUM_REGISTERS],
    running: bool,
}

impl<'a> Debugger<'a> {
    /// Wrap a CPU. A breakpoint at the code origin is preinstalled so a
    /// fresh `run` stops at the entry point.
    pub fn new(cpu: &'a mut Cpu) -> Self {
        let prev_regs = cpu.state().regs;

        Self {
            cpu,
            breakpoints: vec![0x0000],
            watchpoints: Vec::new(),
            reg_watch: [false; NUM_REGISTERS],
            prev_regs,
            running: false,
        }
    }

    pub fn add_breakpoint(&mut self, addr: u16) -> Result<()> {
        if self.breakpoints.len() >= MAX_BREAKPOINTS {
            return Err(RuntimeError::TooManyBreakpoints { max: MAX_BREAKPOINTS });
        }
        self.breakpoints.push(addr);
        Ok(())
    }

    pub fn remove_breakpoint(&mut self, addr: u16) {
        self.breakpoints.retain(|&a| a != addr);
    }

    pub fn add_watchpoint(&mut self, addr: u16) -> Result<()> {
        if self.watchpoints.len() >= MAX_WATCHPOINTS {
            return Err(RuntimeError::TooManyWatchpoints { max: MAX_WATCHPOINTS });
        }
        self.watchpoints.push(addr);
        Ok(())
    }

    pub fn remove_watchpoint(&mut self, addr: u16) {
        self.watchpoints.retain(|&a| a != addr);
    }

    pub fn watch_register(&mut self, reg: Register, watch: bool) {
        self.reg_watch[reg.index()] = watch;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Target address of a store instruction, if `inst` is one.
    fn store_target(&self, inst: &Instruction) -> Option<(u16, bool)> {
        match *inst {
            Instruction::Sti { addr, .. } => Some((addr, true)),
            Instruction::Stib { addr, .. } => Some((addr, false)),
            Instruction::Str { ra, .. } => Some((self.cpu.state().read_reg(ra), true)),
            Instruction::Strb { ra, .. } => Some((self.cpu.state().read_reg(ra), false)),
            _ => None,
        }
    }

    fn watchpoint_hit(&self, addr: u16, wide: bool) -> bool {
        self.watchpoints.contains(&addr)
            || (wide && self.watchpoints.contains(&addr.wrapping_add(1)))
    }

    /// One free-running step: halt before a watched store or a breakpoint,
    /// otherwise execute one CPU step and report watched register changes.
    pub fn step<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        if let Ok(inst) = self.cpu.peek() {
            if let Some((target, wide)) = self.store_target(&inst) {
                if self.watchpoint_hit(target, wide) {
                    self.running = false;
                    writeln!(out, "Watchpoint hit at {target:#06x}")?;
                    return Ok(());
                }
            }
        }

        let ip = self.cpu.state().ip();
        if self.breakpoints.contains(&ip) {
            self.running = false;
            writeln!(out, "Breakpoint hit at {ip:#06x}")?;
            return Ok(());
        }

        self.cpu.step()?;

        for index in 0..NUM_REGISTERS {
            if !self.reg_watch[index] {
                continue;
            }

            let now = self.cpu.state().regs[index];
            let before = self.prev_regs[index];
            if now != before {
                let name = Register::from_index(index).expect("index in range").name();
                writeln!(out, "Register %{name} changed from {before:#06x} to {now:#06x}")?;
            }
        }

        self.prev_regs = self.cpu.state().regs;
        Ok(())
    }

    /// Parse and execute one operator command line.
    pub fn execute_command<W: Write>(&mut self, line: &str, out: &mut W) -> Result<CommandOutcome> {
        let mut parts = line.trim().splitn(2, ' ');
        let name = parts.next().unwrap_or("");
        let args = parts.next().map(str::trim);

        match name {
            "" => {}

            "c" | "continue" => {
                self.running = true;
                // step off the current breakpoint before the next check
                self.cpu.step()?;
            }

            "s" | "step" => {
                self.cpu.step()?;
            }

            "b" | "break" => match args.and_then(parse_u16) {
                Some(addr) => self.add_breakpoint(addr)?,
                None => writeln!(out, "Missing or invalid breakpoint address")?,
            },

            "d" | "delete" => match args.and_then(parse_u16) {
                Some(addr) => self.remove_breakpoint(addr),
                None => writeln!(out, "Missing or invalid breakpoint address")?,
            },

            "w" | "watch" => match args.and_then(parse_u16) {
                Some(addr) => self.add_watchpoint(addr)?,
                None => writeln!(out, "Missing or invalid watchpoint address")?,
            },

            "x" | "forget" => match args.and_then(parse_u16) {
                Some(addr) => self.remove_watchpoint(addr),
                None => writeln!(out, "Missing or invalid watchpoint address")?,
            },

            "r" | "reg" => match args.and_then(Register::from_name) {
                Some(reg) => self.watch_register(reg, true),
                None => writeln!(out, "Missing or invalid register name")?,
            },

            "u" | "unreg" => match args.and_then(Register::from_name) {
                Some(reg) => self.watch_register(reg, false),
                None => writeln!(out, "Missing or invalid register name")?,
            },

            "p" | "print" => self.print_command(args, out)?,

            "i" | "info" => {
                writeln!(out, "Breakpoints:")?;
                for addr in &self.breakpoints {
                    writeln!(out, "  {addr:#06x}")?;
                }
                writeln!(out, "Watchpoints:")?;
                for addr in &self.watchpoints {
                    writeln!(out, "  {addr:#06x}")?;
                }
                writeln!(out, "Watched registers:")?;
                for index in 0..NUM_REGISTERS {
                    if self.reg_watch[index] {
                        let name = Register::from_index(index).expect("index in range").name();
                        writeln!(out, "  %{name}")?;
                    }
                }
            }

            "?" | "help" => {
                writeln!(out, "Commands:")?;
                writeln!(out, "  s | step          - step one instruction")?;
                writeln!(out, "  c | continue      - continue execution")?;
                writeln!(out, "  b | break <addr>  - add breakpoint")?;
                writeln!(out, "  d | delete <addr> - remove breakpoint")?;
                writeln!(out, "  w | watch <addr>  - add watchpoint")?;
                writeln!(out, "  x | forget <addr> - remove watchpoint")?;
                writeln!(out, "  r | reg <reg>     - watch register")?;
                writeln!(out, "  u | unreg <reg>   - unwatch register")?;
                writeln!(out, "  p | print %<reg>  - print register")?;
                writeln!(out, "            *<addr> - print byte at address")?;
                writeln!(out, "            $<addr> - print word at address")?;
                writeln!(out, "  i | info          - print info")?;
                writeln!(out, "  ? | help          - print help")?;
                writeln!(out, "  q | quit          - quit debugger")?;
            }

            "q" | "quit" => return Ok(CommandOutcome::Quit),

            _ => writeln!(out, "Unknown command")?,
        }

        Ok(CommandOutcome::Handled)
    }

    fn print_command<W: Write>(&mut self, args: Option<&str>, out: &mut W) -> Result<()> {
        let Some(args) = args else {
            writeln!(out, "Missing print argument")?;
            return Ok(());
        };

        if let Some(name) = args.strip_prefix('%') {
            match Register::from_name(name) {
                Some(reg) => {
                    let value = self.cpu.state().read_reg(reg);
                    writeln!(out, "%{} = {value:#06x}", reg.name())?;
                }
                None => writeln!(out, "Invalid register name")?,
            }
        } else if let Some(addr) = args.strip_prefix('*') {
            match parse_u16(addr) {
                Some(addr) => {
                    let value = self.cpu.state().read_u8(addr);
                    writeln!(out, "*{addr:#06x} = {value:#04x}")?;
                }
                None => writeln!(out, "Invalid print address")?,
            }
        } else if let Some(addr) = args.strip_prefix('$') {
            match parse_u16(addr) {
                Some(addr) => {
                    let value = self.cpu.state().read_u16(addr);
                    writeln!(out, "${addr:#06x} = {value:#06x}")?;
                }
                None => writeln!(out, "Invalid print address")?,
            }
        } else {
            writeln!(out, "Invalid print argument")?;
        }

        Ok(())
    }

    /// Drive the CPU to the finished flag, prompting for commands whenever
    /// execution is stopped.
    pub fn run<R: BufRead, W: Write>(&mut self, input: &mut R, out: &mut W) -> Result<()> {
        while !self.cpu.halted() {
            if self.running {
                self.step(out)?;
                continue;
            }

            write!(out, "> ")?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break;
            }

            if self.execute_command(&line, out)? == CommandOutcome::Quit {
                break;
            }
        }

        Ok(())
    }
}

fn parse_u16(text: &str) -> Option<u16> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x") {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix("0b") {
        u16::from_str_radix(bin, 2).ok()
    } else {
        text.parse().ok()
    }
}
