//! `ctr info` - summarize a container file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::container::Container;

#[derive(Args)]
pub struct InfoArgs {
    /// Container file (.bch / .bcres and friends)
    pub file: PathBuf,

    /// Emit the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct Summary {
    kind: &'static str,
    file_len: usize,
    revision: u32,
    models: Vec<String>,
    textures: Vec<String>,
    luts: Vec<String>,
    metadata: Vec<String>,
}

fn summarize(container: &Container, file_len: usize) -> Summary {
    match container {
        Container::Gfx(gfx) => Summary {
            kind: "CGFX",
            file_len,
            revision: gfx.revision,
            models: Vec::new(),
            textures: gfx.textures.iter().map(|(n, _)| n.to_string()).collect(),
            luts: gfx.luts.iter().map(|(n, _)| n.to_string()).collect(),
            metadata: gfx.metadata.iter().map(|(n, _)| n.to_string()).collect(),
        },
        Container::H3d(h3d) => Summary {
            kind: "H3D",
            file_len,
            revision: u32::from(h3d.backward_compat),
            models: h3d.models.iter().map(|(n, _)| n.to_string()).collect(),
            textures: h3d.textures.iter().map(|(n, _)| n.to_string()).collect(),
            luts: h3d.luts.iter().map(|(n, _)| n.to_string()).collect(),
            metadata: Vec::new(),
        },
    }
}

pub fn execute(args: InfoArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let container = Container::load(&bytes)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;
    let summary = summarize(&container, bytes.len());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{}: {} rev 0x{:X}, {} bytes",
        args.file.display(),
        summary.kind,
        summary.revision,
        summary.file_len
    );
    print_group("models", &summary.models);
    print_group("textures", &summary.textures);
    print_group("luts", &summary.luts);
    print_group("metadata", &summary.metadata);
    Ok(())
}

fn print_group(label: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!("  {label} ({}):", names.len());
    for name in names {
        println!("    {name}");
    }
}
