//! # Lark-16 Runtime
//!
//! Execute Lark-16 binary images: a virtual CPU with a single-step
//! execution primitive, memory-mapped I/O ranges, a bounded syscall
//! table, and an interactive debugger overlay.
//!
//! The CPU is strictly single-threaded and synchronous: [`Cpu::step`]
//! runs one fetch-decode-execute cycle to completion and returns. The
//! embedding program owns all scheduling: a host can step the CPU inside
//! a frame budget, the CLI free-runs it, the debugger steps one decoded
//! instruction at a time.
//!
//! ## Example
//!
//! ```rust
//! use lark_runtime::{Cpu, Exit};
//! use lark_spec::{Instruction, Register};
//!
//! let image: Vec<u8> = [
//!     Instruction::Ldi { rd: Register::A, imm: 0 },
//!     Instruction::Sys,
//! ]
//! .iter()
//! .flat_map(|inst| inst.encode())
//! .collect();
//!
//! let mut cpu = Cpu::new(vec![Box::new(Exit)]).unwrap();
//! cpu.load(&image).unwrap();
//! cpu.reset();
//! let executed = cpu.run().unwrap();
//! assert_eq!(executed, 2);
//! ```

pub mod cpu;
pub mod debug;
pub mod error;
pub mod mmio;
pub mod state;
pub mod syscall;

pub use cpu::Cpu;
pub use debug::{CommandOutcome, Debugger, MAX_BREAKPOINTS, MAX_WATCHPOINTS};
pub use error::{Result, RuntimeError};
pub use mmio::{MmioDevice, MmioEntry, MAX_MMIO_ENTRIES};
pub use state::CpuState;
pub use syscall::{Exit, Print, Syscall, SyscallFn, MAX_SYSCALLS};
