//! `ctr roundtrip` - decode, re-encode, compare.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::container::Container;

#[derive(Args)]
pub struct RoundtripArgs {
    /// Container file to round-trip
    pub file: PathBuf,

    /// Write the re-encoded bytes here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: RoundtripArgs) -> Result<()> {
    let original = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let container = Container::load(&original)?;
    let reencoded = container.to_bytes()?;

    if let Some(output) = &args.output {
        std::fs::write(output, &reencoded)
            .with_context(|| format!("failed to write {}", output.display()))?;
    }

    if let Some(at) = first_difference(&original, &reencoded) {
        bail!(
            "{}: round trip differs at offset 0x{at:08X} ({} -> {} bytes)",
            args.file.display(),
            original.len(),
            reencoded.len()
        );
    }

    tracing::info!(len = original.len(), "round trip is byte-identical");
    println!(
        "{}: {} round trip ok, {} bytes",
        args.file.display(),
        container.kind(),
        original.len()
    );
    Ok(())
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    if a.len() != b.len() {
        return Some(a.len().min(b.len()));
    }
    (0..a.len()).find(|&i| a[i] != b[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctr_formats::gfx::Gfx;
    use ctr_formats::metadata::{GfxMetaData, MetaFloats};

    #[test]
    fn written_file_round_trips_through_the_cli_path() {
        let mut gfx = Gfx::default();
        gfx.metadata
            .insert(
                "weights",
                GfxMetaData::Floats(MetaFloats {
                    name: "weights".to_string(),
                    values: vec![0.25, 0.75],
                }),
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.bcres");
        std::fs::write(&path, gfx.to_bytes().unwrap()).unwrap();

        execute(RoundtripArgs {
            file: path,
            output: None,
        })
        .unwrap();
    }

    #[test]
    fn first_difference_reports_the_offset() {
        assert_eq!(first_difference(b"abc", b"abc"), None);
        assert_eq!(first_difference(b"abc", b"abd"), Some(2));
        assert_eq!(first_difference(b"abc", b"abcd"), Some(3));
    }
}
