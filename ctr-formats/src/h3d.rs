//! H3D container.
//!
//! # Layout
//! ```text
//! 0x00: magic "BCH\0"
//! 0x04: backward compatibility revision
//! 0x05: forward compatibility revision
//! 0x06: reserved
//! 0x08: contents address + length
//! 0x10: strings address + length
//! 0x18: image address + length
//! 0x20: root record
//! ```
//!
//! Pointers are absolute file offsets and counts follow their pointer.
//! The backward-compatibility byte is the running revision that gates
//! version-dependent fields (texture mappers moved behind a pointer at
//! 0x21). The section table is written last, once lengths are known.

use std::sync::OnceLock;

use ctr_serial::{FieldKind, Options, ReadError, Reader, Record, Schema, SectionId, Writer};
use ctr_serial::{LengthPos, PointerKind, WriteError};
use serde::{Deserialize, Serialize};

use crate::dict::{self, Dict};
use crate::error::FormatError;
use crate::lut::H3dLut;
use crate::model::H3dModel;
use crate::texture::H3dTexture;

pub const H3D_MAGIC: [u8; 4] = *b"BCH\0";
/// Current backward-compatibility revision.
pub const H3D_REVISION: u8 = 0x21;

pub const H3D_OPTIONS: Options = Options::new(PointerKind::Absolute, LengthPos::AfterPointer);

const HEADER_LEN: u32 = 0x20;

/// An H3D scene: top-level dicts of models, textures and lookup tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct H3d {
    pub backward_compat: u8,
    pub forward_compat: u8,
    pub models: Dict<H3dModel>,
    pub textures: Dict<H3dTexture>,
    pub luts: Dict<H3dLut>,
}

impl Default for H3d {
    fn default() -> Self {
        Self {
            backward_compat: H3D_REVISION,
            forward_compat: H3D_REVISION,
            models: Dict::new(),
            textures: Dict::new(),
            luts: Dict::new(),
        }
    }
}

fn w_h3d_models<'v>(h: &'v H3d, w: &mut Writer<'v>) -> Result<(), WriteError> {
    dict::write(&h.models, w)
}

fn r_h3d_models(h: &mut H3d, d: &mut Reader<'_>) -> Result<(), ReadError> {
    h.models = dict::read(d)?;
    Ok(())
}

fn w_h3d_textures<'v>(h: &'v H3d, w: &mut Writer<'v>) -> Result<(), WriteError> {
    dict::write(&h.textures, w)
}

fn r_h3d_textures(h: &mut H3d, d: &mut Reader<'_>) -> Result<(), ReadError> {
    h.textures = dict::read(d)?;
    Ok(())
}

fn w_h3d_luts<'v>(h: &'v H3d, w: &mut Writer<'v>) -> Result<(), WriteError> {
    dict::write(&h.luts, w)
}

fn r_h3d_luts(h: &mut H3d, d: &mut Reader<'_>) -> Result<(), ReadError> {
    h.luts = dict::read(d)?;
    Ok(())
}

impl Record for H3d {
    const NAME: &'static str = "H3d";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<H3d>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .ignored("backward_compat")
                .ignored("forward_compat")
                .field("models", FieldKind::IndirectArray, w_h3d_models, r_h3d_models)
                .field(
                    "textures",
                    FieldKind::IndirectArray,
                    w_h3d_textures,
                    r_h3d_textures,
                )
                .field("luts", FieldKind::IndirectArray, w_h3d_luts, r_h3d_luts)
                .finish()
        })
    }
}

impl H3d {
    /// Serialize the scene with its two-pass container header.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let mut writer = Writer::new(H3D_OPTIONS, u32::from(self.backward_compat));
        writer.prologue(SectionId::Contents, HEADER_LEN);
        writer.record(self)?;
        let (mut bytes, layout) = writer.finish()?;

        bytes[0x00..0x04].copy_from_slice(&H3D_MAGIC);
        bytes[0x04] = self.backward_compat;
        bytes[0x05] = self.forward_compat;
        bytes[0x06..0x08].copy_from_slice(&[0, 0]);
        let table = [
            Some(layout.contents),
            layout.strings,
            layout.image,
        ];
        for (i, span) in table.iter().enumerate() {
            let at = 0x08 + i * 8;
            let (offset, len) = span.map(|s| (s.offset, s.len)).unwrap_or((0, 0));
            bytes[at..at + 4].copy_from_slice(&offset.to_le_bytes());
            bytes[at + 4..at + 8].copy_from_slice(&len.to_le_bytes());
        }

        tracing::debug!(
            len = bytes.len(),
            models = self.models.len(),
            textures = self.textures.len(),
            luts = self.luts.len(),
            "wrote H3D container"
        );
        Ok(bytes)
    }

    /// Deserialize a scene, validating the container header first.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < HEADER_LEN as usize {
            return Err(FormatError::TooSmall {
                format: "H3D",
                actual: data.len(),
            });
        }
        if data[0x00..0x04] != H3D_MAGIC {
            return Err(FormatError::BadMagic { format: "H3D" });
        }
        let backward_compat = data[0x04];
        let forward_compat = data[0x05];
        // Every declared section must lie inside the file.
        for i in 0..3 {
            let at = 0x08 + i * 8;
            let offset = read_u32_at(data, at);
            let len = read_u32_at(data, at + 4);
            let end = u64::from(offset) + u64::from(len);
            if end > data.len() as u64 {
                return Err(FormatError::LengthMismatch {
                    format: "H3D",
                    declared: offset.saturating_add(len),
                    actual: data.len(),
                });
            }
        }

        let mut reader = Reader::new(data, H3D_OPTIONS);
        reader.set_version(u32::from(backward_compat));
        reader.seek(u64::from(HEADER_LEN))?;
        let mut h3d: H3d = reader.record()?;
        h3d.backward_compat = backward_compat;
        h3d.forward_compat = forward_compat;
        Ok(h3d)
    }
}

fn read_u32_at(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
