//! Container detection by magic bytes.

use anyhow::{bail, Result};
use ctr_formats::error::FormatError;
use ctr_formats::gfx::{Gfx, GFX_MAGIC};
use ctr_formats::h3d::{H3d, H3D_MAGIC};

/// A loaded container of either family.
pub enum Container {
    Gfx(Gfx),
    H3d(H3d),
}

impl Container {
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            bail!("file too small to identify ({} bytes)", bytes.len());
        }
        match &bytes[0..4] {
            m if *m == GFX_MAGIC => Ok(Container::Gfx(Gfx::from_bytes(bytes)?)),
            m if *m == H3D_MAGIC => Ok(Container::H3d(H3d::from_bytes(bytes)?)),
            other => bail!("unrecognized container magic {other:02X?}"),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        match self {
            Container::Gfx(gfx) => gfx.to_bytes(),
            Container::H3d(h3d) => h3d.to_bytes(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Container::Gfx(_) => "CGFX",
            Container::H3d(_) => "H3D",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_both_families() {
        let gfx = Gfx::default().to_bytes().unwrap();
        assert_eq!(Container::load(&gfx).unwrap().kind(), "CGFX");

        let h3d = H3d::default().to_bytes().unwrap();
        assert_eq!(Container::load(&h3d).unwrap().kind(), "H3D");
    }

    #[test]
    fn rejects_unknown_magic() {
        assert!(Container::load(b"NOPE....").is_err());
    }
}
