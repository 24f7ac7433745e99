//! Assemble Lark-16 source text into a flat binary image.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{Read, Write};

#[derive(Parser)]
#[command(name = "lark-asm", about = "Assemble Lark-16 source into a binary image")]
struct Args {
    /// Input source file, or '-' for stdin
    input: String,

    /// Output image file, or '-' for stdout
    #[arg(short, long)]
    output: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let source = if args.input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)
            .with_context(|| format!("failed to read input file: {}", args.input))?
    };

    let assembly = lark_assembler::assemble(&source)?;

    // unresolved labels were already reported; the image is still written
    match args.output.as_deref() {
        Some(path) if path != "-" => {
            std::fs::write(path, &assembly.image)
                .with_context(|| format!("failed to write output file: {path}"))?;
        }
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&assembly.image)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
