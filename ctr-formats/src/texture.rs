//! Texture records.
//!
//! Pixel bytes are opaque to the engine: they are routed to the image
//! section and copied verbatim. Format conversion (swizzling, ETC1) is
//! external; the records only know each format's size so they can validate
//! that the blob matches the declared dimensions. Validation runs through
//! a wrapped codec - before any bytes on write, after the field walk on
//! read.

use std::sync::OnceLock;

use ctr_serial::{
    Codec, FieldKind, ReadError, Reader, Record, Schema, SectionId, TagEntry, TagTable,
    TaggedRecord, WriteError, Writer,
};
use serde::{Deserialize, Serialize};

/// CGFX texture discriminants: a flat image or a six-face cube map.
pub const TAG_TEXTURE_IMAGE: u32 = 0x2000_0011;
pub const TAG_TEXTURE_CUBE: u32 = 0x2000_0020;

/// Hardware pixel formats, in register order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    #[default]
    Rgba8 = 0,
    Rgb8 = 1,
    Rgba5551 = 2,
    Rgb565 = 3,
    Rgba4 = 4,
    La8 = 5,
    HiLo8 = 6,
    L8 = 7,
    A8 = 8,
    La4 = 9,
    L4 = 10,
    A4 = 11,
    Etc1 = 12,
    Etc1A4 = 13,
}

impl PixelFormat {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Rgba8,
            1 => Self::Rgb8,
            2 => Self::Rgba5551,
            3 => Self::Rgb565,
            4 => Self::Rgba4,
            5 => Self::La8,
            6 => Self::HiLo8,
            7 => Self::L8,
            8 => Self::A8,
            9 => Self::La4,
            10 => Self::L4,
            11 => Self::A4,
            12 => Self::Etc1,
            13 => Self::Etc1A4,
            _ => return None,
        })
    }

    pub fn bits_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 32,
            Self::Rgb8 => 24,
            Self::Rgba5551 | Self::Rgb565 | Self::Rgba4 | Self::La8 | Self::HiLo8 => 16,
            Self::L8 | Self::A8 | Self::La4 | Self::Etc1A4 => 8,
            Self::L4 | Self::A4 | Self::Etc1 => 4,
        }
    }

    /// Byte size of one mip level.
    pub fn data_size(self, width: u32, height: u32) -> usize {
        (width as usize * height as usize * self.bits_per_pixel()).div_ceil(8)
    }

    /// Byte size of a full mip chain.
    pub fn chain_size(self, width: u32, height: u32, levels: u32) -> usize {
        (0..levels)
            .map(|l| self.data_size((width >> l).max(1), (height >> l).max(1)))
            .sum()
    }
}

fn read_format(d: &mut Reader<'_>) -> Result<PixelFormat, ReadError> {
    let at = d.position();
    let raw = d.u32()?;
    PixelFormat::from_u32(raw).ok_or(ReadError::InvalidValue {
        field: d.field(),
        what: "pixel format",
        offset: at,
        value: raw,
    })
}

// ---------------------------------------------------------------------
// CGFX flat texture
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GfxTextureImage {
    pub name: String,
    pub height: u32,
    pub width: u32,
    pub mipmap_levels: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl GfxTextureImage {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            height,
            width,
            mipmap_levels: 1,
            format,
            data,
        }
    }

    pub fn expected_size(&self) -> usize {
        self.format
            .chain_size(self.width, self.height, self.mipmap_levels)
    }
}

fn w_gfx_tex_validate(t: &GfxTextureImage, _w: &mut Writer<'_>) -> Result<(), WriteError> {
    let expected = t.expected_size();
    if t.data.len() != expected {
        return Err(WriteError::LengthMismatch {
            field: "data",
            expected,
            actual: t.data.len(),
        });
    }
    Ok(())
}

fn r_gfx_tex_validate(t: &mut GfxTextureImage, d: &mut Reader<'_>) -> Result<(), ReadError> {
    if t.data.len() != t.expected_size() {
        return Err(ReadError::Malformed {
            field: "data",
            what: "image data length",
            offset: d.position(),
        });
    }
    Ok(())
}

fn w_gfx_tex_name<'v>(t: &'v GfxTextureImage, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&t.name)
}

fn r_gfx_tex_name(t: &mut GfxTextureImage, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.name = d.string()?;
    Ok(())
}

fn w_gfx_tex_height(t: &GfxTextureImage, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.height)
}

fn r_gfx_tex_height(t: &mut GfxTextureImage, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.height = d.u32()?;
    Ok(())
}

fn w_gfx_tex_width(t: &GfxTextureImage, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.width)
}

fn r_gfx_tex_width(t: &mut GfxTextureImage, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.width = d.u32()?;
    Ok(())
}

fn w_gfx_tex_mipmaps(t: &GfxTextureImage, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.mipmap_levels)
}

fn r_gfx_tex_mipmaps(t: &mut GfxTextureImage, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.mipmap_levels = d.u32()?;
    Ok(())
}

fn w_gfx_tex_format(t: &GfxTextureImage, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.format as u32)
}

fn r_gfx_tex_format(t: &mut GfxTextureImage, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.format = read_format(d)?;
    Ok(())
}

fn w_gfx_tex_data<'v>(t: &'v GfxTextureImage, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.blob(&t.data)
}

fn r_gfx_tex_data(t: &mut GfxTextureImage, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.data = d.blob()?;
    Ok(())
}

impl Record for GfxTextureImage {
    const NAME: &'static str = "GfxTextureImage";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<GfxTextureImage>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .codec(Codec::Wrapped {
                    pre_write: w_gfx_tex_validate,
                    post_read: r_gfx_tex_validate,
                })
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_gfx_tex_name,
                    r_gfx_tex_name,
                )
                .field("height", FieldKind::Inline, w_gfx_tex_height, r_gfx_tex_height)
                .field("width", FieldKind::Inline, w_gfx_tex_width, r_gfx_tex_width)
                .field("mipmap_levels", FieldKind::Inline, w_gfx_tex_mipmaps, r_gfx_tex_mipmaps)
                .field("format", FieldKind::Inline, w_gfx_tex_format, r_gfx_tex_format)
                .field(
                    "data",
                    FieldKind::SectionRouted { section: SectionId::Image },
                    w_gfx_tex_data,
                    r_gfx_tex_data,
                )
                .finish()
        })
    }
}

// ---------------------------------------------------------------------
// CGFX cube map (read-only)
// ---------------------------------------------------------------------

/// Six-face cube map. Older tooling emits these with a two-pointer slot
/// encoding that is not part of the generic pointer contract, so this
/// record is read through plain single pointers and refuses to write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GfxTextureCube {
    pub name: String,
    pub height: u32,
    pub width: u32,
    pub mipmap_levels: u32,
    pub format: PixelFormat,
    pub faces: [Vec<u8>; 6],
}

fn w_cube_name<'v>(t: &'v GfxTextureCube, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&t.name)
}

fn r_cube_name(t: &mut GfxTextureCube, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.name = d.string()?;
    Ok(())
}

fn w_cube_height(t: &GfxTextureCube, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.height)
}

fn r_cube_height(t: &mut GfxTextureCube, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.height = d.u32()?;
    Ok(())
}

fn w_cube_width(t: &GfxTextureCube, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.width)
}

fn r_cube_width(t: &mut GfxTextureCube, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.width = d.u32()?;
    Ok(())
}

fn w_cube_mipmaps(t: &GfxTextureCube, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.mipmap_levels)
}

fn r_cube_mipmaps(t: &mut GfxTextureCube, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.mipmap_levels = d.u32()?;
    Ok(())
}

fn w_cube_format(t: &GfxTextureCube, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.format as u32)
}

fn r_cube_format(t: &mut GfxTextureCube, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.format = read_format(d)?;
    Ok(())
}

macro_rules! cube_face_field {
    ($w:ident, $r:ident, $index:expr) => {
        fn $w<'v>(t: &'v GfxTextureCube, w: &mut Writer<'v>) -> Result<(), WriteError> {
            w.blob(&t.faces[$index])
        }

        fn $r(t: &mut GfxTextureCube, d: &mut Reader<'_>) -> Result<(), ReadError> {
            t.faces[$index] = d.blob()?;
            Ok(())
        }
    };
}

cube_face_field!(w_cube_face_xp, r_cube_face_xp, 0);
cube_face_field!(w_cube_face_xn, r_cube_face_xn, 1);
cube_face_field!(w_cube_face_yp, r_cube_face_yp, 2);
cube_face_field!(w_cube_face_yn, r_cube_face_yn, 3);
cube_face_field!(w_cube_face_zp, r_cube_face_zp, 4);
cube_face_field!(w_cube_face_zn, r_cube_face_zn, 5);

impl Record for GfxTextureCube {
    const NAME: &'static str = "GfxTextureCube";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<GfxTextureCube>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_cube_name,
                    r_cube_name,
                )
                .field("height", FieldKind::Inline, w_cube_height, r_cube_height)
                .field("width", FieldKind::Inline, w_cube_width, r_cube_width)
                .field("mipmap_levels", FieldKind::Inline, w_cube_mipmaps, r_cube_mipmaps)
                .field("format", FieldKind::Inline, w_cube_format, r_cube_format)
                .field(
                    "face_x_pos",
                    FieldKind::SectionRouted { section: SectionId::Image },
                    w_cube_face_xp,
                    r_cube_face_xp,
                )
                .field(
                    "face_x_neg",
                    FieldKind::SectionRouted { section: SectionId::Image },
                    w_cube_face_xn,
                    r_cube_face_xn,
                )
                .field(
                    "face_y_pos",
                    FieldKind::SectionRouted { section: SectionId::Image },
                    w_cube_face_yp,
                    r_cube_face_yp,
                )
                .field(
                    "face_y_neg",
                    FieldKind::SectionRouted { section: SectionId::Image },
                    w_cube_face_yn,
                    r_cube_face_yn,
                )
                .field(
                    "face_z_pos",
                    FieldKind::SectionRouted { section: SectionId::Image },
                    w_cube_face_zp,
                    r_cube_face_zp,
                )
                .field(
                    "face_z_neg",
                    FieldKind::SectionRouted { section: SectionId::Image },
                    w_cube_face_zn,
                    r_cube_face_zn,
                )
                .finish()
        })
    }
}

// ---------------------------------------------------------------------
// CGFX texture union
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GfxTexture {
    Image(GfxTextureImage),
    Cube(GfxTextureCube),
}

impl GfxTexture {
    pub fn name(&self) -> &str {
        match self {
            GfxTexture::Image(t) => &t.name,
            GfxTexture::Cube(t) => &t.name,
        }
    }
}

impl Default for GfxTexture {
    fn default() -> Self {
        GfxTexture::Image(GfxTextureImage::default())
    }
}

impl TaggedRecord for GfxTexture {
    const NAME: &'static str = "GfxTexture";

    fn tag_table() -> &'static TagTable<Self> {
        static TABLE: OnceLock<TagTable<GfxTexture>> = OnceLock::new();
        TABLE.get_or_init(|| {
            TagTable::finish(
                Self::NAME,
                vec![
                    TagEntry {
                        tag: TAG_TEXTURE_IMAGE,
                        name: "GfxTextureImage",
                        read: |d| Ok(GfxTexture::Image(d.record()?)),
                    },
                    TagEntry {
                        tag: TAG_TEXTURE_CUBE,
                        name: "GfxTextureCube",
                        read: |d| Ok(GfxTexture::Cube(d.record()?)),
                    },
                ],
            )
        })
    }

    fn wire_tag(&self) -> u32 {
        match self {
            GfxTexture::Image(_) => TAG_TEXTURE_IMAGE,
            GfxTexture::Cube(_) => TAG_TEXTURE_CUBE,
        }
    }

    fn write_payload<'v>(&'v self, w: &mut Writer<'v>) -> Result<(), WriteError> {
        match self {
            GfxTexture::Image(t) => w.record(t),
            GfxTexture::Cube(_) => Err(WriteError::Unsupported("cube map textures")),
        }
    }
}

// ---------------------------------------------------------------------
// H3D texture
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct H3dTexture {
    pub name: String,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub mipmap_levels: u32,
    pub data: Vec<u8>,
}

impl H3dTexture {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            width,
            height,
            mipmap_levels: 1,
            data,
        }
    }

    pub fn expected_size(&self) -> usize {
        self.format
            .chain_size(self.width, self.height, self.mipmap_levels)
    }
}

fn w_h3d_tex_validate(t: &H3dTexture, _w: &mut Writer<'_>) -> Result<(), WriteError> {
    let expected = t.expected_size();
    if t.data.len() != expected {
        return Err(WriteError::LengthMismatch {
            field: "data",
            expected,
            actual: t.data.len(),
        });
    }
    Ok(())
}

fn r_h3d_tex_validate(t: &mut H3dTexture, d: &mut Reader<'_>) -> Result<(), ReadError> {
    if t.data.len() != t.expected_size() {
        return Err(ReadError::Malformed {
            field: "data",
            what: "image data length",
            offset: d.position(),
        });
    }
    Ok(())
}

fn w_h3d_tex_format(t: &H3dTexture, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.format as u32)
}

fn r_h3d_tex_format(t: &mut H3dTexture, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.format = read_format(d)?;
    Ok(())
}

fn w_h3d_tex_width(t: &H3dTexture, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.width)
}

fn r_h3d_tex_width(t: &mut H3dTexture, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.width = d.u32()?;
    Ok(())
}

fn w_h3d_tex_height(t: &H3dTexture, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.height)
}

fn r_h3d_tex_height(t: &mut H3dTexture, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.height = d.u32()?;
    Ok(())
}

fn w_h3d_tex_mipmaps(t: &H3dTexture, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(t.mipmap_levels)
}

fn r_h3d_tex_mipmaps(t: &mut H3dTexture, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.mipmap_levels = d.u32()?;
    Ok(())
}

fn w_h3d_tex_data<'v>(t: &'v H3dTexture, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.blob(&t.data)
}

fn r_h3d_tex_data(t: &mut H3dTexture, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.data = d.blob()?;
    Ok(())
}

fn w_h3d_tex_name<'v>(t: &'v H3dTexture, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&t.name)
}

fn r_h3d_tex_name(t: &mut H3dTexture, d: &mut Reader<'_>) -> Result<(), ReadError> {
    t.name = d.string()?;
    Ok(())
}

impl Record for H3dTexture {
    const NAME: &'static str = "H3dTexture";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<H3dTexture>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .codec(Codec::Wrapped {
                    pre_write: w_h3d_tex_validate,
                    post_read: r_h3d_tex_validate,
                })
                .field("format", FieldKind::Inline, w_h3d_tex_format, r_h3d_tex_format)
                .field("width", FieldKind::Inline, w_h3d_tex_width, r_h3d_tex_width)
                .field("height", FieldKind::Inline, w_h3d_tex_height, r_h3d_tex_height)
                .field("mipmap_levels", FieldKind::Inline, w_h3d_tex_mipmaps, r_h3d_tex_mipmaps)
                .field(
                    "data",
                    FieldKind::SectionRouted { section: SectionId::Image },
                    w_h3d_tex_data,
                    r_h3d_tex_data,
                )
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_h3d_tex_name,
                    r_h3d_tex_name,
                )
                .finish()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctr_serial::{read_root, write_root, Options};

    #[test]
    fn pixel_format_sizes() {
        assert_eq!(PixelFormat::Rgba8.data_size(8, 8), 256);
        assert_eq!(PixelFormat::Etc1.data_size(8, 8), 32);
        assert_eq!(PixelFormat::Rgb565.data_size(4, 2), 16);
        // 8x8 RGBA8 with three mips: 256 + 64 + 16.
        assert_eq!(PixelFormat::Rgba8.chain_size(8, 8, 3), 336);
    }

    #[test]
    fn h3d_texture_round_trips() {
        let tex = H3dTexture::new("stone", 4, 2, PixelFormat::Rgb565, vec![0xAB; 16]);
        let bytes = write_root(&tex, Options::default(), 0x21).unwrap();
        let back: H3dTexture = read_root(&bytes, Options::default(), 0x21).unwrap();
        assert_eq!(back, tex);
    }

    #[test]
    fn wrong_data_length_is_rejected_before_writing() {
        let tex = H3dTexture::new("bad", 4, 4, PixelFormat::Rgba8, vec![0; 3]);
        let err = write_root(&tex, Options::default(), 0x21).unwrap_err();
        assert_eq!(
            err,
            WriteError::LengthMismatch {
                field: "data",
                expected: 64,
                actual: 3
            }
        );
    }

    #[test]
    fn cube_texture_record_round_trips_directly() {
        let mut cube = GfxTextureCube {
            name: "sky".to_string(),
            width: 2,
            height: 2,
            mipmap_levels: 1,
            format: PixelFormat::L8,
            ..GfxTextureCube::default()
        };
        for (i, face) in cube.faces.iter_mut().enumerate() {
            *face = vec![i as u8; 4];
        }

        let mut writer = ctr_serial::Writer::new(Options::default(), 0);
        writer.record(&cube).unwrap();
        let (bytes, _) = writer.finish().unwrap();

        let mut reader = ctr_serial::Reader::new(&bytes, Options::default());
        let back: GfxTextureCube = reader.record().unwrap();
        assert_eq!(back, cube);
    }

    #[test]
    fn writing_a_cube_texture_through_the_union_is_unsupported() {
        let cube = GfxTexture::Cube(GfxTextureCube::default());
        let mut writer = ctr_serial::Writer::new(Options::default(), 0);
        writer.tagged_ref(&cube).unwrap();
        let err = writer.finish().unwrap_err();
        assert_eq!(err, WriteError::Unsupported("cube map textures"));
    }
}
