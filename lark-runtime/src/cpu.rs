//! The Lark-16 virtual CPU
//!
//! One [`Cpu::step`] performs exactly one fetch-decode-execute cycle and
//! returns to the caller; driver loops (the CLI, the debugger, a host
//! frame loop) decide how often to call it and observe the finished flag
//! between steps.

use crate::error::{Result, RuntimeError};
use crate::mmio::{MmioDevice, MmioEntry, MAX_MMIO_ENTRIES};
use crate::state::CpuState;
use crate::syscall::{Syscall, MAX_SYSCALLS};
use lark_spec::{
    flags, Instruction, MemoryRegion, Register, SpecError, CODE_START, INSTRUCTION_SIZE, MEM_SIZE,
};

/// Virtual CPU: state plus the MMIO and syscall tables.
pub struct Cpu {
    state: CpuState,
    mmio: Vec<MmioEntry>,
    syscalls: Vec<Box<dyn Syscall>>,
}

impl Cpu {
    /// Create a CPU with the given syscall table. Registers and memory
    /// start zeroed; call [`reset`](Self::reset) before stepping.
    pub fn new(syscalls: Vec<Box<dyn Syscall>>) -> Result<Self> {
        if syscalls.len() > MAX_SYSCALLS {
            return Err(RuntimeError::TooManySyscalls {
                count: syscalls.len(),
                max: MAX_SYSCALLS,
            });
        }

        Ok(Self {
            state: CpuState::new(),
            mmio: Vec::new(),
            syscalls,
        })
    }

    /// Register an MMIO range `[start, end)`. Entries are matched in
    /// registration order.
    pub fn add_mmio(&mut self, start: u16, end: u16, device: Box<dyn MmioDevice>) -> Result<()> {
        if self.mmio.len() >= MAX_MMIO_ENTRIES {
            return Err(RuntimeError::TooManyMmioEntries { max: MAX_MMIO_ENTRIES });
        }

        self.mmio.push(MmioEntry { start, end, device });
        tracing::debug!(start = format_args!("{start:#06x}"), end = format_args!("{end:#06x}"), "added MMIO entry");
        Ok(())
    }

    /// Initialize the run state: registers cleared, ip at the code origin,
    /// sp at the stack origin, flags cleared, instruction counter zeroed.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Copy a binary image to the code origin without validating contents.
    pub fn load(&mut self, image: &[u8]) -> Result<()> {
        self.load_at(CODE_START, image)
    }

    /// Copy a binary image to `addr` without validating contents.
    pub fn load_at(&mut self, addr: u16, image: &[u8]) -> Result<()> {
        let end = addr as usize + image.len();
        if end > MEM_SIZE {
            return Err(SpecError::ImageTooLarge { size: image.len(), max: MEM_SIZE - addr as usize }.into());
        }

        self.state.mem[addr as usize..end].copy_from_slice(image);
        Ok(())
    }

    pub fn state(&self) -> &CpuState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut CpuState {
        &mut self.state
    }

    /// True once the finished flag is set.
    pub fn halted(&self) -> bool {
        self.state.finished()
    }

    /// Decode the instruction at the current instruction pointer without
    /// executing it.
    pub fn peek(&self) -> std::result::Result<Instruction, SpecError> {
        Instruction::decode(self.state.fetch(self.state.ip()))
    }

    /// One fetch-decode-execute cycle.
    ///
    /// An unaligned instruction pointer or an unrecognized instruction is
    /// a trap: the finished flag is set and `Ok` is returned. Division by
    /// zero and a syscall index outside the registered table are fatal.
    pub fn step(&mut self) -> Result<()> {
        let ip = self.state.ip();

        if ip % INSTRUCTION_SIZE != 0 {
            tracing::error!(
                ip = format_args!("{ip:#06x}"),
                region = %MemoryRegion::of(ip),
                "unaligned instruction pointer"
            );
            self.state.set_flag(flags::FIN);
            return Ok(());
        }

        let inst = match Instruction::decode(self.state.fetch(ip)) {
            Ok(inst) => inst,
            Err(err) => {
                tracing::error!(
                    ip = format_args!("{ip:#06x}"),
                    region = %MemoryRegion::of(ip),
                    %err,
                    "invalid instruction"
                );
                self.state.set_flag(flags::FIN);
                return Ok(());
            }
        };

        // Advance before executing so jumps and fall-through compose.
        self.state.set_ip(ip.wrapping_add(INSTRUCTION_SIZE));
        self.state.executed_ops += 1;

        self.execute(inst)
    }

    /// Step until the finished flag is observed. Returns the number of
    /// instructions executed since the last reset.
    pub fn run(&mut self) -> Result<u64> {
        while !self.halted() {
            self.step()?;
        }
        Ok(self.state.executed_ops)
    }

    fn execute(&mut self, inst: Instruction) -> Result<()> {
        match inst {
            Instruction::Nop => {}

            Instruction::Ldi { rd, imm } => self.state.write_reg(rd, imm),

            Instruction::Ldr { rd, rs } => {
                let addr = self.state.read_reg(rs);
                if let Some(value) = self.bus_read16(addr) {
                    self.state.write_reg(rd, value);
                }
            }

            Instruction::Ldrb { rd, rs } => {
                let addr = self.state.read_reg(rs);
                if let Some(value) = self.bus_read8(addr) {
                    self.state.write_reg(rd, value as u16);
                }
            }

            Instruction::Add { rd, rs1, rs2 } => {
                let result = self.state.read_reg(rs1).wrapping_add(self.state.read_reg(rs2));
                self.write_alu_result(rd, result);
            }

            Instruction::Sub { rd, rs1, rs2 } => {
                let result = self.state.read_reg(rs1).wrapping_sub(self.state.read_reg(rs2));
                self.write_alu_result(rd, result);
            }

            Instruction::Mul { rd, rs1, rs2 } => {
                let result = self.state.read_reg(rs1).wrapping_mul(self.state.read_reg(rs2));
                self.write_alu_result(rd, result);
            }

            Instruction::Div { rd, rs1, rs2 } => {
                let divisor = self.state.read_reg(rs2);
                if divisor == 0 {
                    return Err(self.arithmetic_fault());
                }
                let result = self.state.read_reg(rs1) / divisor;
                self.write_alu_result(rd, result);
            }

            Instruction::Mod { rd, rs1, rs2 } => {
                let divisor = self.state.read_reg(rs2);
                if divisor == 0 {
                    return Err(self.arithmetic_fault());
                }
                let result = self.state.read_reg(rs1) % divisor;
                self.write_alu_result(rd, result);
            }

            Instruction::And { rd, rs1, rs2 } => {
                let result = self.state.read_reg(rs1) & self.state.read_reg(rs2);
                self.write_alu_result(rd, result);
            }

            Instruction::Or { rd, rs1, rs2 } => {
                let result = self.state.read_reg(rs1) | self.state.read_reg(rs2);
                self.write_alu_result(rd, result);
            }

            Instruction::Xor { rd, rs1, rs2 } => {
                let result = self.state.read_reg(rs1) ^ self.state.read_reg(rs2);
                self.write_alu_result(rd, result);
            }

            Instruction::Shl { rd, rs1, rs2 } => {
                let shift = self.state.read_reg(rs2) as u32;
                let result = self.state.read_reg(rs1).checked_shl(shift).unwrap_or(0);
                self.write_alu_result(rd, result);
            }

            Instruction::Shr { rd, rs1, rs2 } => {
                let shift = self.state.read_reg(rs2) as u32;
                let result = self.state.read_reg(rs1).checked_shr(shift).unwrap_or(0);
                self.write_alu_result(rd, result);
            }

            Instruction::Jmp { addr } => self.state.set_ip(addr),

            Instruction::Jz { addr } => {
                if self.state.flag_set(flags::ZERO) {
                    self.state.set_ip(addr);
                    self.state.clear_flag(flags::ZERO);
                }
            }

            Instruction::Jd { rs } => {
                let addr = self.state.read_reg(rs);
                self.state.set_ip(addr);
            }

            Instruction::Sti { rs, addr } => {
                let value = self.state.read_reg(rs);
                self.bus_write16(addr, value);
            }

            Instruction::Stib { rs, addr } => {
                let value = self.state.read_reg(rs) as u8;
                self.bus_write8(addr, value);
            }

            Instruction::Str { ra, rs } => {
                let addr = self.state.read_reg(ra);
                let value = self.state.read_reg(rs);
                self.bus_write16(addr, value);
            }

            Instruction::Strb { ra, rs } => {
                let addr = self.state.read_reg(ra);
                let value = self.state.read_reg(rs) as u8;
                self.bus_write8(addr, value);
            }

            Instruction::Sys => {
                let number = self.state.read_reg(Register::A);
                let registered = self.syscalls.len();
                let handler = self.syscalls.get_mut(number as usize).ok_or(
                    RuntimeError::InvalidSyscall {
                        number,
                        registered,
                    },
                )?;
                handler.call(&mut self.state);
            }
        }

        Ok(())
    }

    /// Write an ALU result and recompute the zero flag from it. Carry,
    /// overflow and sign are allocated in the flags register but not
    /// maintained.
    fn write_alu_result(&mut self, rd: Register, result: u16) {
        if result == 0 {
            self.state.set_flag(flags::ZERO);
        } else {
            self.state.clear_flag(flags::ZERO);
        }
        self.state.write_reg(rd, result);
    }

    /// Address of the instruction that faulted (ip already advanced).
    fn arithmetic_fault(&self) -> RuntimeError {
        RuntimeError::DivisionByZero {
            addr: self.state.ip().wrapping_sub(INSTRUCTION_SIZE),
        }
    }

    /// 16-bit load through the bus. `None` means an MMIO entry matched but
    /// its device has no read port; the caller must leave the destination
    /// untouched.
    fn bus_read16(&mut self, addr: u16) -> Option<u16> {
        for entry in self.mmio.iter_mut() {
            if entry.contains(addr) {
                let lo = entry.device.read(addr)?;
                let hi = entry.device.read(addr.wrapping_add(1)).unwrap_or(0);
                return Some(u16::from(lo) | (u16::from(hi) << 8));
            }
        }
        Some(self.state.read_u16(addr))
    }

    fn bus_read8(&mut self, addr: u16) -> Option<u8> {
        for entry in self.mmio.iter_mut() {
            if entry.contains(addr) {
                return Some(entry.device.read(addr)?);
            }
        }
        Some(self.state.read_u8(addr))
    }

    /// 16-bit store through the bus. Devices receive the high byte at
    /// `addr` and the low byte at `addr + 1`; raw memory stays
    /// little-endian.
    fn bus_write16(&mut self, addr: u16, value: u16) {
        for entry in self.mmio.iter_mut() {
            if entry.contains(addr) {
                entry.device.write(addr, (value >> 8) as u8);
                entry.device.write(addr.wrapping_add(1), value as u8);
                return;
            }
        }
        self.state.write_u16(addr, value);
    }

    fn bus_write8(&mut self, addr: u16, value: u8) {
        for entry in self.mmio.iter_mut() {
            if entry.contains(addr) {
                entry.device.write(addr, value);
                return;
            }
        }
        self.state.write_u8(addr, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lark_spec::STACK_START;

    fn cpu_with_program(instructions: &[Instruction]) -> Cpu {
        let image: Vec<u8> = instructions.iter().flat_map(|i| i.encode()).collect();
        let mut cpu = Cpu::new(vec![]).unwrap();
        cpu.load(&image).unwrap();
        cpu.reset();
        cpu
    }

    #[test]
    fn test_reset_postconditions() {
        let mut cpu = Cpu::new(vec![]).unwrap();
        cpu.state_mut().set_ip(0x200);
        cpu.state_mut().set_flag(flags::FIN);
        cpu.reset();

        assert_eq!(cpu.state().ip(), CODE_START);
        assert_eq!(cpu.state().read_reg(Register::Sp), STACK_START);
        assert_eq!(cpu.state().flags(), 0);
    }

    #[test]
    fn test_ldi_and_add() {
        let mut cpu = cpu_with_program(&[
            Instruction::Ldi { rd: Register::A, imm: 40 },
            Instruction::Ldi { rd: Register::B, imm: 2 },
            Instruction::Add { rd: Register::C, rs1: Register::A, rs2: Register::B },
        ]);

        for _ in 0..3 {
            cpu.step().unwrap();
        }

        assert_eq!(cpu.state().read_reg(Register::C), 42);
        assert!(!cpu.state().flag_set(flags::ZERO));
        assert_eq!(cpu.state().executed_ops, 3);
    }

    #[test]
    fn test_sub_equal_sets_zero_flag() {
        let mut cpu = cpu_with_program(&[
            Instruction::Ldi { rd: Register::A, imm: 0x1234 },
            Instruction::Ldi { rd: Register::B, imm: 0x1234 },
            Instruction::Sub { rd: Register::C, rs1: Register::A, rs2: Register::B },
        ]);

        for _ in 0..3 {
            cpu.step().unwrap();
        }

        assert_eq!(cpu.state().read_reg(Register::C), 0);
        assert!(cpu.state().flag_set(flags::ZERO));
    }

    #[test]
    fn test_arithmetic_wraps() {
        let mut cpu = cpu_with_program(&[
            Instruction::Ldi { rd: Register::A, imm: 0xffff },
            Instruction::Ldi { rd: Register::B, imm: 2 },
            Instruction::Add { rd: Register::C, rs1: Register::A, rs2: Register::B },
            Instruction::Mul { rd: Register::D, rs1: Register::A, rs2: Register::B },
        ]);

        for _ in 0..4 {
            cpu.step().unwrap();
        }

        assert_eq!(cpu.state().read_reg(Register::C), 1);
        assert_eq!(cpu.state().read_reg(Register::D), 0xfffe);
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        let mut cpu = cpu_with_program(&[Instruction::Div {
            rd: Register::C,
            rs1: Register::A,
            rs2: Register::B,
        }]);

        let err = cpu.step().unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero { addr: 0x0000 }));
    }

    #[test]
    fn test_modulo_by_zero_reports_faulting_address() {
        let mut cpu = cpu_with_program(&[
            Instruction::Nop,
            Instruction::Mod { rd: Register::C, rs1: Register::A, rs2: Register::B },
        ]);

        cpu.step().unwrap();
        let err = cpu.step().unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero { addr: 0x0004 }));
    }

    #[test]
    fn test_jmp_sets_ip() {
        let mut cpu = cpu_with_program(&[Instruction::Jmp { addr: 0x0100 }]);
        cpu.step().unwrap();
        assert_eq!(cpu.state().ip(), 0x0100);
    }

    #[test]
    fn test_jz_taken_clears_zero_flag() {
        let mut cpu = cpu_with_program(&[
            Instruction::Sub { rd: Register::C, rs1: Register::A, rs2: Register::B },
            Instruction::Jz { addr: 0x0200 },
        ]);

        cpu.step().unwrap();
        assert!(cpu.state().flag_set(flags::ZERO));
        cpu.step().unwrap();
        assert_eq!(cpu.state().ip(), 0x0200);
        assert!(!cpu.state().flag_set(flags::ZERO));
    }

    #[test]
    fn test_jz_not_taken_falls_through() {
        let mut cpu = cpu_with_program(&[
            Instruction::Ldi { rd: Register::A, imm: 1 },
            Instruction::Jz { addr: 0x0200 },
        ]);

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.state().ip(), 0x0008);
    }

    #[test]
    fn test_jd_jumps_to_register_value() {
        let mut cpu = cpu_with_program(&[
            Instruction::Ldi { rd: Register::E, imm: 0x0300 },
            Instruction::Jd { rs: Register::E },
        ]);

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.state().ip(), 0x0300);
    }

    #[test]
    fn test_store_and_load_roundtrip() {
        let mut cpu = cpu_with_program(&[
            Instruction::Ldi { rd: Register::A, imm: 0xbeef },
            Instruction::Sti { rs: Register::A, addr: 0x6000 },
            Instruction::Ldi { rd: Register::E, imm: 0x6000 },
            Instruction::Ldr { rd: Register::B, rs: Register::E },
        ]);

        for _ in 0..4 {
            cpu.step().unwrap();
        }

        // raw memory is little-endian
        assert_eq!(cpu.state().read_u8(0x6000), 0xef);
        assert_eq!(cpu.state().read_u8(0x6001), 0xbe);
        assert_eq!(cpu.state().read_reg(Register::B), 0xbeef);
    }

    #[test]
    fn test_byte_store_and_load() {
        let mut cpu = cpu_with_program(&[
            Instruction::Ldi { rd: Register::A, imm: 0x1234 },
            Instruction::Stib { rs: Register::A, addr: 0x6000 },
            Instruction::Ldi { rd: Register::E, imm: 0x6000 },
            Instruction::Ldrb { rd: Register::B, rs: Register::E },
        ]);

        for _ in 0..4 {
            cpu.step().unwrap();
        }

        assert_eq!(cpu.state().read_u8(0x6000), 0x34);
        assert_eq!(cpu.state().read_reg(Register::B), 0x0034);
    }

    #[test]
    fn test_unaligned_ip_traps() {
        let mut cpu = Cpu::new(vec![]).unwrap();
        cpu.reset();
        cpu.state_mut().set_ip(0x0003);

        cpu.step().unwrap();

        assert!(cpu.halted());
        assert_eq!(cpu.state().executed_ops, 0);
    }

    #[test]
    fn test_invalid_opcode_traps() {
        let mut cpu = Cpu::new(vec![]).unwrap();
        cpu.load(&[0x16, 0, 0, 0]).unwrap();
        cpu.reset();

        cpu.step().unwrap();

        assert!(cpu.halted());
        assert_eq!(cpu.state().executed_ops, 0);
        // ip is left at the trapping instruction
        assert_eq!(cpu.state().ip(), 0x0000);
    }

    #[test]
    fn test_syscall_dispatch() {
        let handler = crate::syscall::SyscallFn(|state: &mut CpuState| {
            state.write_reg(Register::Z, 0x5a5a);
            state.set_flag(flags::FIN);
        });
        let mut cpu = Cpu::new(vec![Box::new(handler)]).unwrap();
        cpu.load(&Instruction::Sys.encode()).unwrap();
        cpu.reset();

        cpu.step().unwrap();

        assert_eq!(cpu.state().read_reg(Register::Z), 0x5a5a);
        assert!(cpu.halted());
    }

    #[test]
    fn test_syscall_out_of_range_is_fatal() {
        let mut cpu = Cpu::new(vec![]).unwrap();
        cpu.load(&Instruction::Sys.encode()).unwrap();
        cpu.reset();

        let err = cpu.step().unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::InvalidSyscall { number: 0, registered: 0 }
        ));
    }

    #[test]
    fn test_load_too_large() {
        let mut cpu = Cpu::new(vec![]).unwrap();
        let image = vec![0u8; MEM_SIZE + 1];
        assert!(cpu.load(&image).is_err());
    }

    #[test]
    fn test_load_at_end_of_memory() {
        let mut cpu = Cpu::new(vec![]).unwrap();
        cpu.load_at(0xfffe, &[0xaa, 0xbb]).unwrap();
        assert_eq!(cpu.state().read_u8(0xffff), 0xbb);
        assert!(cpu.load_at(0xfffe, &[0, 0, 0]).is_err());
    }

    #[test]
    fn test_too_many_syscalls() {
        let mut table: Vec<Box<dyn Syscall>> = Vec::new();
        for _ in 0..=MAX_SYSCALLS {
            table.push(Box::new(crate::syscall::Exit));
        }
        assert!(matches!(
            Cpu::new(table),
            Err(RuntimeError::TooManySyscalls { .. })
        ));
    }
}
