// RegWired - SVD Register Map Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use clap::Parser;
use regwired_emitter::ZigEmitter;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generate Zig register maps from CMSIS-SVD files"
)]
struct Args {
    /// Input SVD file
    #[arg(short, long)]
    input: PathBuf,

    /// Output Zig file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit only the named peripherals (comma separated)
    #[arg(long)]
    filter: Option<String>,

    /// Write the loaded device model as JSON for inspection
    #[arg(long)]
    dump_model: Option<PathBuf>,

    /// Enable verbose loader tracing
    #[arg(short, long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing with appropriate level based on --trace flag.
    // Logs go to stderr so stdout stays reserved for the generated code.
    if args.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(io::stderr)
            .init();
    }

    let xml = fs::read_to_string(&args.input).context("Failed to read SVD file")?;
    let mut device = regwired_loader::load_device(&xml).context("Failed to load SVD device")?;

    if let Some(filter) = &args.filter {
        let keep: Vec<&str> = filter.split(',').map(str::trim).collect();
        device
            .peripherals
            .retain(|p| keep.contains(&p.name.as_str()));
    }

    if let Some(path) = &args.dump_model {
        let json =
            serde_json::to_string_pretty(&device).context("Failed to serialize device model")?;
        fs::write(path, json).with_context(|| format!("Failed to write model dump {:?}", path))?;
        info!("Wrote model dump to {:?}", path);
    }

    info!(
        "Emitting {} peripherals for {}",
        device.peripherals.len(),
        device.name
    );

    match &args.output {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("Failed to create output file {:?}", path))?;
            let mut emitter = ZigEmitter::new(BufWriter::new(file));
            emitter
                .emit_device(&mut device)
                .context("Failed to write generated code")?;
            emitter
                .into_inner()
                .flush()
                .context("Failed to flush output file")?;
        }
        None => {
            let mut emitter = ZigEmitter::new(io::stdout().lock());
            emitter
                .emit_device(&mut device)
                .context("Failed to write generated code")?;
        }
    }

    Ok(())
}
