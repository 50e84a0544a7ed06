//! H3D materials (subset: texture binding state).
//!
//! The interesting wire detail is the texture mapper block. From revision
//! 0x21 on, the three mappers live behind a pointer; older files store
//! them inline inside the material. Both layouts share the same in-memory
//! field, registered twice with complementary version gates.

use std::sync::OnceLock;

use ctr_serial::{
    FieldKind, ReadError, Reader, Record, Schema, SectionId, VersionGate, WriteError, Writer,
};
use serde::{Deserialize, Serialize};

/// Revision that moved texture mappers behind a pointer.
pub const MAPPER_POINTER_REVISION: u32 = 0x21;

/// Texture units per material.
pub const TEXTURE_UNITS: usize = 3;

/// Sampler state for one texture unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureMapper {
    pub wrap_u: u32,
    pub wrap_v: u32,
    pub mag_filter: u32,
    pub min_filter: u32,
    pub lod_bias: f32,
}

fn w_mapper_wrap_u(m: &TextureMapper, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(m.wrap_u)
}

fn r_mapper_wrap_u(m: &mut TextureMapper, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.wrap_u = d.u32()?;
    Ok(())
}

fn w_mapper_wrap_v(m: &TextureMapper, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(m.wrap_v)
}

fn r_mapper_wrap_v(m: &mut TextureMapper, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.wrap_v = d.u32()?;
    Ok(())
}

fn w_mapper_mag(m: &TextureMapper, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(m.mag_filter)
}

fn r_mapper_mag(m: &mut TextureMapper, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.mag_filter = d.u32()?;
    Ok(())
}

fn w_mapper_min(m: &TextureMapper, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(m.min_filter)
}

fn r_mapper_min(m: &mut TextureMapper, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.min_filter = d.u32()?;
    Ok(())
}

fn w_mapper_lod(m: &TextureMapper, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.f32(m.lod_bias)
}

fn r_mapper_lod(m: &mut TextureMapper, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.lod_bias = d.f32()?;
    Ok(())
}

impl Record for TextureMapper {
    const NAME: &'static str = "TextureMapper";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<TextureMapper>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field("wrap_u", FieldKind::Inline, w_mapper_wrap_u, r_mapper_wrap_u)
                .field("wrap_v", FieldKind::Inline, w_mapper_wrap_v, r_mapper_wrap_v)
                .field("mag_filter", FieldKind::Inline, w_mapper_mag, r_mapper_mag)
                .field("min_filter", FieldKind::Inline, w_mapper_min, r_mapper_min)
                .field("lod_bias", FieldKind::Inline, w_mapper_lod, r_mapper_lod)
                .finish()
        })
    }
}

/// H3D material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct H3dMaterial {
    pub name: String,
    pub flags: u32,
    /// Always three entries, one per texture unit.
    pub mappers: Vec<TextureMapper>,
    pub texture0_name: String,
    pub texture1_name: String,
    pub texture2_name: String,
}

impl Default for H3dMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            flags: 0,
            mappers: vec![TextureMapper::default(); TEXTURE_UNITS],
            texture0_name: String::new(),
            texture1_name: String::new(),
            texture2_name: String::new(),
        }
    }
}

impl H3dMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

fn w_mat_name<'v>(m: &'v H3dMaterial, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&m.name)
}

fn r_mat_name(m: &mut H3dMaterial, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.name = d.string()?;
    Ok(())
}

fn w_mat_flags(m: &H3dMaterial, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(m.flags)
}

fn r_mat_flags(m: &mut H3dMaterial, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.flags = d.u32()?;
    Ok(())
}

fn w_mat_mappers<'v>(m: &'v H3dMaterial, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.fixed_list(&m.mappers, TEXTURE_UNITS)
}

fn r_mat_mappers(m: &mut H3dMaterial, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.mappers = d.fixed_list(TEXTURE_UNITS)?;
    Ok(())
}

fn w_mat_mappers_inline<'v>(m: &'v H3dMaterial, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.fixed_inline_list(&m.mappers, TEXTURE_UNITS)
}

fn r_mat_mappers_inline(m: &mut H3dMaterial, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.mappers = d.inline_list(TEXTURE_UNITS)?;
    Ok(())
}

fn w_mat_tex0<'v>(m: &'v H3dMaterial, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&m.texture0_name)
}

fn r_mat_tex0(m: &mut H3dMaterial, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.texture0_name = d.string()?;
    Ok(())
}

fn w_mat_tex1<'v>(m: &'v H3dMaterial, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&m.texture1_name)
}

fn r_mat_tex1(m: &mut H3dMaterial, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.texture1_name = d.string()?;
    Ok(())
}

fn w_mat_tex2<'v>(m: &'v H3dMaterial, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&m.texture2_name)
}

fn r_mat_tex2(m: &mut H3dMaterial, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.texture2_name = d.string()?;
    Ok(())
}

impl Record for H3dMaterial {
    const NAME: &'static str = "H3dMaterial";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<H3dMaterial>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_mat_name,
                    r_mat_name,
                )
                .field("flags", FieldKind::Inline, w_mat_flags, r_mat_flags)
                .gated_field(
                    "texture_mappers",
                    FieldKind::Indirect,
                    VersionGate::gequal(MAPPER_POINTER_REVISION),
                    w_mat_mappers,
                    r_mat_mappers,
                )
                .gated_field(
                    "texture_mappers_inline",
                    FieldKind::InlineArray { len: TEXTURE_UNITS },
                    VersionGate::less(MAPPER_POINTER_REVISION),
                    w_mat_mappers_inline,
                    r_mat_mappers_inline,
                )
                .field(
                    "texture0_name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_mat_tex0,
                    r_mat_tex0,
                )
                .field(
                    "texture1_name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_mat_tex1,
                    r_mat_tex1,
                )
                .field(
                    "texture2_name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_mat_tex2,
                    r_mat_tex2,
                )
                .finish()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctr_serial::{read_root, write_root, Options};

    fn test_material() -> H3dMaterial {
        let mut mat = H3dMaterial::new("body");
        mat.flags = 0x11;
        mat.mappers[0].wrap_u = 2;
        mat.mappers[1].min_filter = 1;
        mat.mappers[2].lod_bias = -0.5;
        mat.texture0_name = "skin".to_string();
        mat
    }

    #[test]
    fn mappers_round_trip_through_the_pointer_layout() {
        let mat = test_material();
        let opts = Options::default();
        let bytes = write_root(&mat, opts, MAPPER_POINTER_REVISION).unwrap();
        let back: H3dMaterial = read_root(&bytes, opts, MAPPER_POINTER_REVISION).unwrap();
        assert_eq!(back, mat);
    }

    #[test]
    fn mappers_round_trip_through_the_inline_layout() {
        let mat = test_material();
        let opts = Options::default();
        let old = MAPPER_POINTER_REVISION - 1;
        let bytes = write_root(&mat, opts, old).unwrap();
        let back: H3dMaterial = read_root(&bytes, opts, old).unwrap();
        assert_eq!(back, mat);
    }

    #[test]
    fn inline_layout_is_larger_in_place() {
        let mat = test_material();
        let opts = Options::default();
        let new = write_root(&mat, opts, MAPPER_POINTER_REVISION).unwrap();
        let old = write_root(&mat, opts, MAPPER_POINTER_REVISION - 1).unwrap();
        // Both carry the same 60 mapper bytes; the new layout adds the
        // 4-byte pointer slot.
        assert_eq!(old.len() + 4, new.len());
    }

    #[test]
    fn wrong_mapper_count_is_rejected_before_writing() {
        let mut mat = test_material();
        mat.mappers.pop();
        let err = write_root(&mat, Options::default(), MAPPER_POINTER_REVISION).unwrap_err();
        assert_eq!(
            err,
            WriteError::LengthMismatch {
                field: "texture_mappers",
                expected: 3,
                actual: 2
            }
        );
    }
}
