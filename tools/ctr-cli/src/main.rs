//! ctr - inspection tool for CTR asset containers
//!
//! # Commands
//!
//! - `ctr info <file>` - identify a container and summarize its content
//! - `ctr roundtrip <file>` - decode, re-encode and compare byte-for-byte
//!
//! Both container families are detected by magic bytes; everything else
//! goes through the `ctr-formats` record layer.

mod container;
mod info;
mod roundtrip;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Inspection tool for CTR asset containers
#[derive(Parser)]
#[command(name = "ctr")]
#[command(about = "Inspect and round-trip H3D/CGFX asset containers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify a container file and summarize its content
    Info(info::InfoArgs),

    /// Decode a container, re-encode it and compare the bytes
    Roundtrip(roundtrip::RoundtripArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Info(args) => info::execute(args),
        Commands::Roundtrip(args) => roundtrip::execute(args),
    }
}
