//! H3D models (subset: transform and material table).

use std::sync::OnceLock;

use ctr_serial::{
    FieldKind, ReadError, Reader, Record, Schema, SectionId, WriteError, Writer,
};
use serde::{Deserialize, Serialize};

use crate::dict::{self, Dict};
use crate::material::H3dMaterial;
use crate::math::Mat3x4;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct H3dModel {
    pub name: String,
    pub flags: u32,
    pub world_transform: Mat3x4,
    pub materials: Dict<H3dMaterial>,
}

impl H3dModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

fn w_model_name<'v>(m: &'v H3dModel, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&m.name)
}

fn r_model_name(m: &mut H3dModel, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.name = d.string()?;
    Ok(())
}

fn w_model_flags(m: &H3dModel, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(m.flags)
}

fn r_model_flags(m: &mut H3dModel, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.flags = d.u32()?;
    Ok(())
}

fn w_model_transform(m: &H3dModel, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.f32_slice(&m.world_transform.0)
}

fn r_model_transform(m: &mut H3dModel, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.world_transform = Mat3x4(d.f32_array()?);
    Ok(())
}

fn w_model_materials<'v>(m: &'v H3dModel, w: &mut Writer<'v>) -> Result<(), WriteError> {
    dict::write(&m.materials, w)
}

fn r_model_materials(m: &mut H3dModel, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.materials = dict::read(d)?;
    Ok(())
}

impl Record for H3dModel {
    const NAME: &'static str = "H3dModel";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<H3dModel>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_model_name,
                    r_model_name,
                )
                .field("flags", FieldKind::Inline, w_model_flags, r_model_flags)
                .field(
                    "world_transform",
                    FieldKind::InlineArray { len: 12 },
                    w_model_transform,
                    r_model_transform,
                )
                .field(
                    "materials",
                    FieldKind::IndirectArray,
                    w_model_materials,
                    r_model_materials,
                )
                .finish()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MAPPER_POINTER_REVISION;
    use ctr_serial::{read_root, write_root, Options};

    #[test]
    fn model_with_materials_round_trips() {
        let mut model = H3dModel::new("hero");
        model.flags = 1;
        model.world_transform.0[3] = 4.0;
        model
            .materials
            .insert("body", H3dMaterial::new("body"))
            .unwrap();
        model
            .materials
            .insert("face", H3dMaterial::new("face"))
            .unwrap();

        let opts = Options::default();
        let bytes = write_root(&model, opts, MAPPER_POINTER_REVISION).unwrap();
        let back: H3dModel = read_root(&bytes, opts, MAPPER_POINTER_REVISION).unwrap();
        assert_eq!(back, model);
    }
}
