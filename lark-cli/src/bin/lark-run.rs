//! Execute a Lark-16 binary image, free-running or under the interactive
//! debugger.

use anyhow::{bail, Context, Result};
use clap::Parser;
use lark_runtime::{Cpu, Debugger, Exit, MmioDevice, Print, Syscall};
use lark_spec::MAX_IMAGE_SIZE;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "lark-run", about = "Run a Lark-16 binary image")]
struct Args {
    /// Binary image to execute
    image: PathBuf,

    /// Drop into the interactive debugger instead of free-running
    #[arg(long)]
    debug: bool,
}

/// Write-only console port: every stored byte goes straight to stdout.
struct ConsolePort;

impl MmioDevice for ConsolePort {
    fn write(&mut self, _addr: u16, value: u8) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(&[value]);
        let _ = stdout.flush();
    }
}

/// Byte port address of the console device.
const CONSOLE_PORT: u16 = 0xff00;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let image = std::fs::read(&args.image)
        .with_context(|| format!("failed to read image: {}", args.image.display()))?;
    if image.len() > MAX_IMAGE_SIZE {
        bail!(
            "image too large: {} is {} bytes (maximum {MAX_IMAGE_SIZE})",
            args.image.display(),
            image.len()
        );
    }

    let syscalls: Vec<Box<dyn Syscall>> = vec![
        Box::new(Exit),
        Box::new(Print::new(std::io::stdout())),
    ];

    let mut cpu = Cpu::new(syscalls)?;
    cpu.add_mmio(CONSOLE_PORT, CONSOLE_PORT + 1, Box::new(ConsolePort))?;
    cpu.load(&image)?;
    cpu.reset();

    if args.debug {
        let mut debugger = Debugger::new(&mut cpu);
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        debugger.run(&mut input, &mut output)?;
        return Ok(());
    }

    let start = Instant::now();
    let executed = cpu.run()?;
    let elapsed = start.elapsed();

    tracing::info!(
        "executed {executed} instructions in {} us",
        elapsed.as_micros()
    );
    if !elapsed.is_zero() {
        let hz = executed as f64 / elapsed.as_secs_f64();
        tracing::info!("calculated frequency: {hz:.0} Hz");
    }

    Ok(())
}
