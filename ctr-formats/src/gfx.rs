//! CGFX container.
//!
//! # Layout
//! ```text
//! 0x00: magic "CGFX"
//! 0x04: byte-order mark (0xFEFF)
//! 0x06: header length (0x14)
//! 0x08: revision
//! 0x0C: file length
//! 0x10: section count (1, or 2 with an image section)
//! 0x14: "DATA" + length        <- content graph and string pool
//! 0x1C: root record
//!  ...
//!       "IMAG" + length        <- raw pixel data, when present
//! ```
//!
//! Pointers are self-relative and counts precede their pointer. The
//! header is patched in a second pass once every section is closed.

use std::sync::OnceLock;

use ctr_serial::{FieldKind, Options, ReadError, Reader, Record, Schema, SectionId, Writer};
use ctr_serial::{LengthPos, PointerKind, WriteError};
use serde::{Deserialize, Serialize};

use crate::dict::{self, Dict};
use crate::error::FormatError;
use crate::lut::GfxLut;
use crate::metadata::GfxMetaData;
use crate::texture::GfxTexture;

pub const GFX_MAGIC: [u8; 4] = *b"CGFX";
pub const GFX_BOM: u16 = 0xFEFF;
pub const CGFX_REVISION: u32 = 0x0500_0000;

pub const GFX_OPTIONS: Options =
    Options::new(PointerKind::SelfRelative, LengthPos::BeforePointer);

const HEADER_LEN: u16 = 0x14;
const DATA_MAGIC: [u8; 4] = *b"DATA";
const IMAG_MAGIC: [u8; 4] = *b"IMAG";
const SEGMENT_HEADER_LEN: u32 = 8;
/// Container header plus the DATA segment header.
const CONTENTS_PROLOGUE: u32 = HEADER_LEN as u32 + SEGMENT_HEADER_LEN;

/// A CGFX scene: top-level dicts of textures, lookup tables and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gfx {
    pub revision: u32,
    pub textures: Dict<GfxTexture>,
    pub luts: Dict<GfxLut>,
    pub metadata: Dict<GfxMetaData>,
}

impl Default for Gfx {
    fn default() -> Self {
        Self {
            revision: CGFX_REVISION,
            textures: Dict::new(),
            luts: Dict::new(),
            metadata: Dict::new(),
        }
    }
}

fn w_gfx_textures<'v>(g: &'v Gfx, w: &mut Writer<'v>) -> Result<(), WriteError> {
    dict::write_tagged(&g.textures, w)
}

fn r_gfx_textures(g: &mut Gfx, d: &mut Reader<'_>) -> Result<(), ReadError> {
    g.textures = dict::read_tagged(d)?;
    Ok(())
}

fn w_gfx_luts<'v>(g: &'v Gfx, w: &mut Writer<'v>) -> Result<(), WriteError> {
    dict::write(&g.luts, w)
}

fn r_gfx_luts(g: &mut Gfx, d: &mut Reader<'_>) -> Result<(), ReadError> {
    g.luts = dict::read(d)?;
    Ok(())
}

fn w_gfx_metadata<'v>(g: &'v Gfx, w: &mut Writer<'v>) -> Result<(), WriteError> {
    dict::write_tagged(&g.metadata, w)
}

fn r_gfx_metadata(g: &mut Gfx, d: &mut Reader<'_>) -> Result<(), ReadError> {
    g.metadata = dict::read_tagged(d)?;
    Ok(())
}

impl Record for Gfx {
    const NAME: &'static str = "Gfx";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<Gfx>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .ignored("revision")
                .field(
                    "textures",
                    FieldKind::IndirectArray,
                    w_gfx_textures,
                    r_gfx_textures,
                )
                .field("luts", FieldKind::IndirectArray, w_gfx_luts, r_gfx_luts)
                .field(
                    "metadata",
                    FieldKind::IndirectArray,
                    w_gfx_metadata,
                    r_gfx_metadata,
                )
                .finish()
        })
    }
}

impl Gfx {
    /// Serialize the scene with its two-pass container header.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let mut writer = Writer::new(GFX_OPTIONS, self.revision);
        writer.prologue(SectionId::Contents, CONTENTS_PROLOGUE);
        writer.prologue(SectionId::Image, SEGMENT_HEADER_LEN);
        writer.record(self)?;
        let (mut bytes, layout) = writer.finish()?;

        let file_len = bytes.len() as u32;
        let section_count: u32 = if layout.image.is_some() { 2 } else { 1 };
        // The DATA segment spans the content graph and the string pool.
        let data_end = layout
            .strings
            .map(|s| s.end())
            .unwrap_or_else(|| layout.contents.end());
        let data_len = data_end - HEADER_LEN as u32;

        bytes[0x00..0x04].copy_from_slice(&GFX_MAGIC);
        bytes[0x04..0x06].copy_from_slice(&GFX_BOM.to_le_bytes());
        bytes[0x06..0x08].copy_from_slice(&HEADER_LEN.to_le_bytes());
        bytes[0x08..0x0C].copy_from_slice(&self.revision.to_le_bytes());
        bytes[0x0C..0x10].copy_from_slice(&file_len.to_le_bytes());
        bytes[0x10..0x14].copy_from_slice(&section_count.to_le_bytes());
        bytes[0x14..0x18].copy_from_slice(&DATA_MAGIC);
        bytes[0x18..0x1C].copy_from_slice(&data_len.to_le_bytes());
        if let Some(image) = layout.image {
            let at = image.offset as usize;
            bytes[at..at + 4].copy_from_slice(&IMAG_MAGIC);
            bytes[at + 4..at + 8].copy_from_slice(&image.len.to_le_bytes());
        }

        tracing::debug!(
            len = file_len,
            sections = section_count,
            textures = self.textures.len(),
            luts = self.luts.len(),
            "wrote CGFX container"
        );
        Ok(bytes)
    }

    /// Deserialize a scene, validating the container header first.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < CONTENTS_PROLOGUE as usize {
            return Err(FormatError::TooSmall {
                format: "CGFX",
                actual: data.len(),
            });
        }
        if data[0x00..0x04] != GFX_MAGIC
            || data[0x04..0x06] != GFX_BOM.to_le_bytes()
            || data[0x14..0x18] != DATA_MAGIC
        {
            return Err(FormatError::BadMagic { format: "CGFX" });
        }
        let revision = read_u32_at(data, 0x08);
        let file_len = read_u32_at(data, 0x0C);
        if file_len as usize != data.len() {
            return Err(FormatError::LengthMismatch {
                format: "CGFX",
                declared: file_len,
                actual: data.len(),
            });
        }

        let mut reader = Reader::new(data, GFX_OPTIONS);
        reader.set_version(revision);
        reader.seek(CONTENTS_PROLOGUE as u64)?;
        let mut gfx: Gfx = reader.record()?;
        gfx.revision = revision;
        Ok(gfx)
    }
}

fn read_u32_at(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::{GfxLutSampler, TABLE_LEN};
    use crate::metadata::{MetaIntegers, MetaStrings, StringFormat};
    use crate::texture::{GfxTextureImage, PixelFormat};

    fn test_scene() -> Gfx {
        let mut gfx = Gfx::default();
        gfx.textures
            .insert(
                "grass",
                GfxTexture::Image(GfxTextureImage::new(
                    "grass",
                    4,
                    4,
                    PixelFormat::Rgba8,
                    vec![0x7F; 64],
                )),
            )
            .unwrap();
        gfx.textures
            .insert(
                "dirt",
                GfxTexture::Image(GfxTextureImage::new(
                    "dirt",
                    2,
                    2,
                    PixelFormat::L8,
                    vec![1, 2, 3, 4],
                )),
            )
            .unwrap();

        let mut lut = GfxLut {
            name: "fresnel".to_string(),
            ..GfxLut::default()
        };
        let mut sampler = GfxLutSampler::new("Default");
        let table: Vec<f32> = (0..TABLE_LEN).map(|i| (i % 4096) as f32 / 4095.0).collect();
        sampler.set_table(&table).unwrap();
        lut.samplers.insert("Default", sampler).unwrap();
        gfx.luts.insert("fresnel", lut).unwrap();

        gfx.metadata
            .insert(
                "edit",
                GfxMetaData::Strings(MetaStrings {
                    name: "edit".to_string(),
                    format: StringFormat::Utf8,
                    values: vec!["editor 1.2".to_string()],
                }),
            )
            .unwrap();
        gfx.metadata
            .insert(
                "ids",
                GfxMetaData::Integers(MetaIntegers {
                    name: "ids".to_string(),
                    values: vec![10, 20],
                }),
            )
            .unwrap();
        gfx
    }

    #[test]
    fn container_round_trips() {
        let gfx = test_scene();
        let bytes = gfx.to_bytes().unwrap();
        let back = Gfx::from_bytes(&bytes).unwrap();
        assert_eq!(back, gfx);
    }

    #[test]
    fn reserialization_is_byte_identical() {
        let bytes = test_scene().to_bytes().unwrap();
        let again = Gfx::from_bytes(&bytes).unwrap().to_bytes().unwrap();
        assert_eq!(bytes, again);
    }

    #[test]
    fn header_fields_are_patched_last() {
        let gfx = test_scene();
        let bytes = gfx.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"CGFX");
        assert_eq!(u16::from_le_bytes(bytes[4..6].try_into().unwrap()), 0xFEFF);
        assert_eq!(
            u32::from_le_bytes(bytes[0x0C..0x10].try_into().unwrap()),
            bytes.len() as u32
        );
        // Image data present, so two sections.
        assert_eq!(u32::from_le_bytes(bytes[0x10..0x14].try_into().unwrap()), 2);
        assert_eq!(&bytes[0x14..0x18], b"DATA");
    }

    #[test]
    fn image_section_carries_its_own_header() {
        let bytes = test_scene().to_bytes().unwrap();
        let at = bytes
            .windows(4)
            .position(|w| w == b"IMAG")
            .expect("image section header");
        assert_eq!(at % 0x10, 0);
        let len = u32::from_le_bytes(bytes[at + 4..at + 8].try_into().unwrap());
        assert_eq!(at + len as usize, bytes.len());
    }

    #[test]
    fn scene_without_images_has_one_section() {
        let mut gfx = Gfx::default();
        gfx.metadata
            .insert(
                "ids",
                GfxMetaData::Integers(MetaIntegers {
                    name: "ids".to_string(),
                    values: vec![1],
                }),
            )
            .unwrap();
        let bytes = gfx.to_bytes().unwrap();
        assert_eq!(u32::from_le_bytes(bytes[0x10..0x14].try_into().unwrap()), 1);
        assert_eq!(bytes.windows(4).position(|w| w == b"IMAG"), None);

        let back = Gfx::from_bytes(&bytes).unwrap();
        assert_eq!(back, gfx);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = test_scene().to_bytes().unwrap();
        bytes[0] = b'X';
        assert_eq!(
            Gfx::from_bytes(&bytes),
            Err(FormatError::BadMagic { format: "CGFX" })
        );
    }

    #[test]
    fn declared_length_must_match() {
        let mut bytes = test_scene().to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            Gfx::from_bytes(&bytes),
            Err(FormatError::LengthMismatch { format: "CGFX", .. })
        ));
    }

    #[test]
    fn truncated_file_is_rejected() {
        assert_eq!(
            Gfx::from_bytes(&[0; 8]),
            Err(FormatError::TooSmall {
                format: "CGFX",
                actual: 8
            })
        );
    }
}
