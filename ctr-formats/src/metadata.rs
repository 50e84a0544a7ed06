//! User-data metadata blocks.
//!
//! CGFX containers attach arbitrary named value lists to objects. The
//! block's concrete type is selected by the leading word of its referent;
//! the string variant additionally carries a sibling format field that
//! selects how its elements are encoded.

use std::sync::OnceLock;

use ctr_serial::{
    FieldKind, ReadError, Reader, Record, Schema, SectionId, TagEntry, TagTable, TaggedRecord,
    WriteError, Writer,
};
use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Discriminants, as registered by the reference tooling. There is no
/// entry for a vector block: the original never registers one, so a file
/// carrying that tag fails the decode.
pub const TAG_META_STRINGS: u32 = 0x1000_0000;
pub const TAG_META_INTEGERS: u32 = 0x2000_0000;
pub const TAG_META_COLORS: u32 = 0x4000_0000;
pub const TAG_META_FLOATS: u32 = 0x8000_0000;

/// Float value list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaFloats {
    pub name: String,
    pub values: Vec<f32>,
}

fn w_floats_name<'v>(m: &'v MetaFloats, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&m.name)
}

fn r_floats_name(m: &mut MetaFloats, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.name = d.string()?;
    Ok(())
}

fn w_floats_values<'v>(m: &'v MetaFloats, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.scalar_list(&m.values)
}

fn r_floats_values(m: &mut MetaFloats, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.values = d.scalar_list()?;
    Ok(())
}

impl Record for MetaFloats {
    const NAME: &'static str = "MetaFloats";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<MetaFloats>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_floats_name,
                    r_floats_name,
                )
                .field(
                    "values",
                    FieldKind::IndirectArray,
                    w_floats_values,
                    r_floats_values,
                )
                .finish()
        })
    }
}

/// Integer value list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaIntegers {
    pub name: String,
    pub values: Vec<i32>,
}

fn w_ints_name<'v>(m: &'v MetaIntegers, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&m.name)
}

fn r_ints_name(m: &mut MetaIntegers, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.name = d.string()?;
    Ok(())
}

fn w_ints_values<'v>(m: &'v MetaIntegers, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.scalar_list(&m.values)
}

fn r_ints_values(m: &mut MetaIntegers, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.values = d.scalar_list()?;
    Ok(())
}

impl Record for MetaIntegers {
    const NAME: &'static str = "MetaIntegers";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<MetaIntegers>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_ints_name,
                    r_ints_name,
                )
                .field(
                    "values",
                    FieldKind::IndirectArray,
                    w_ints_values,
                    r_ints_values,
                )
                .finish()
        })
    }
}

/// RGBA color value list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaColors {
    pub name: String,
    pub values: Vec<Vec4>,
}

fn w_colors_name<'v>(m: &'v MetaColors, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&m.name)
}

fn r_colors_name(m: &mut MetaColors, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.name = d.string()?;
    Ok(())
}

fn w_colors_values<'v>(m: &'v MetaColors, w: &mut Writer<'v>) -> Result<(), WriteError> {
    let values = m.values.as_slice();
    w.deferred(Some(values.len() as u32), move |w| {
        for color in values {
            w.f32(color.x)?;
            w.f32(color.y)?;
            w.f32(color.z)?;
            w.f32(color.w)?;
        }
        Ok(())
    })
}

fn r_colors_values(m: &mut MetaColors, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.values = d.counted(Vec::new(), |d, count| {
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let [x, y, z, w] = d.f32_array()?;
            out.push(Vec4::new(x, y, z, w));
        }
        Ok(out)
    })?;
    Ok(())
}

impl Record for MetaColors {
    const NAME: &'static str = "MetaColors";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<MetaColors>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_colors_name,
                    r_colors_name,
                )
                .field(
                    "values",
                    FieldKind::IndirectArray,
                    w_colors_values,
                    r_colors_values,
                )
                .finish()
        })
    }
}

/// Element encoding of a string metadata block. The value is a sibling
/// discriminant: it is read as an ordinary field, and the values list
/// right after it is decoded according to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StringFormat {
    #[default]
    Ascii = 0,
    Utf8 = 1,
    Utf16Le = 2,
    Utf16Be = 3,
}

impl StringFormat {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ascii),
            1 => Some(Self::Utf8),
            2 => Some(Self::Utf16Le),
            3 => Some(Self::Utf16Be),
            _ => None,
        }
    }
}

/// String value list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaStrings {
    pub name: String,
    pub format: StringFormat,
    pub values: Vec<String>,
}

fn w_strings_name<'v>(m: &'v MetaStrings, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&m.name)
}

fn r_strings_name(m: &mut MetaStrings, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.name = d.string()?;
    Ok(())
}

fn w_strings_format(m: &MetaStrings, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(m.format as u32)
}

fn r_strings_format(m: &mut MetaStrings, d: &mut Reader<'_>) -> Result<(), ReadError> {
    let at = d.position();
    let raw = d.u32()?;
    m.format = StringFormat::from_u32(raw).ok_or(ReadError::InvalidValue {
        field: d.field(),
        what: "string format",
        offset: at,
        value: raw,
    })?;
    Ok(())
}

fn w_strings_values<'v>(m: &'v MetaStrings, w: &mut Writer<'v>) -> Result<(), WriteError> {
    match m.format {
        StringFormat::Ascii | StringFormat::Utf8 => w.string_list(&m.values),
        StringFormat::Utf16Le => w.string_list_utf16(&m.values, false),
        StringFormat::Utf16Be => w.string_list_utf16(&m.values, true),
    }
}

fn r_strings_values(m: &mut MetaStrings, d: &mut Reader<'_>) -> Result<(), ReadError> {
    m.values = match m.format {
        StringFormat::Ascii | StringFormat::Utf8 => d.string_list()?,
        StringFormat::Utf16Le => d.string_list_utf16(false)?,
        StringFormat::Utf16Be => d.string_list_utf16(true)?,
    };
    Ok(())
}

impl Record for MetaStrings {
    const NAME: &'static str = "MetaStrings";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<MetaStrings>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_strings_name,
                    r_strings_name,
                )
                .field("format", FieldKind::Inline, w_strings_format, r_strings_format)
                .field(
                    "values",
                    FieldKind::IndirectArray,
                    w_strings_values,
                    r_strings_values,
                )
                .finish()
        })
    }
}

/// A metadata block: closed union over the registered value list types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GfxMetaData {
    Floats(MetaFloats),
    Integers(MetaIntegers),
    Colors(MetaColors),
    Strings(MetaStrings),
}

impl GfxMetaData {
    pub fn name(&self) -> &str {
        match self {
            GfxMetaData::Floats(m) => &m.name,
            GfxMetaData::Integers(m) => &m.name,
            GfxMetaData::Colors(m) => &m.name,
            GfxMetaData::Strings(m) => &m.name,
        }
    }
}

impl Default for GfxMetaData {
    fn default() -> Self {
        GfxMetaData::Floats(MetaFloats::default())
    }
}

impl TaggedRecord for GfxMetaData {
    const NAME: &'static str = "GfxMetaData";

    fn tag_table() -> &'static TagTable<Self> {
        static TABLE: OnceLock<TagTable<GfxMetaData>> = OnceLock::new();
        TABLE.get_or_init(|| {
            TagTable::finish(
                Self::NAME,
                vec![
                    TagEntry {
                        tag: TAG_META_FLOATS,
                        name: "MetaFloats",
                        read: |d| Ok(GfxMetaData::Floats(d.record()?)),
                    },
                    TagEntry {
                        tag: TAG_META_INTEGERS,
                        name: "MetaIntegers",
                        read: |d| Ok(GfxMetaData::Integers(d.record()?)),
                    },
                    TagEntry {
                        tag: TAG_META_COLORS,
                        name: "MetaColors",
                        read: |d| Ok(GfxMetaData::Colors(d.record()?)),
                    },
                    TagEntry {
                        tag: TAG_META_STRINGS,
                        name: "MetaStrings",
                        read: |d| Ok(GfxMetaData::Strings(d.record()?)),
                    },
                ],
            )
        })
    }

    fn wire_tag(&self) -> u32 {
        match self {
            GfxMetaData::Floats(_) => TAG_META_FLOATS,
            GfxMetaData::Integers(_) => TAG_META_INTEGERS,
            GfxMetaData::Colors(_) => TAG_META_COLORS,
            GfxMetaData::Strings(_) => TAG_META_STRINGS,
        }
    }

    fn write_payload<'v>(&'v self, w: &mut Writer<'v>) -> Result<(), WriteError> {
        match self {
            GfxMetaData::Floats(m) => w.record(m),
            GfxMetaData::Integers(m) => w.record(m),
            GfxMetaData::Colors(m) => w.record(m),
            GfxMetaData::Strings(m) => w.record(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::{self, Dict};
    use ctr_serial::Options;

    fn round_trip_dict(dict: &Dict<GfxMetaData>) -> Dict<GfxMetaData> {
        let mut writer = Writer::new(Options::default(), 0);
        dict::write_tagged(dict, &mut writer).unwrap();
        let (bytes, _) = writer.finish().unwrap();

        let mut reader = Reader::new(&bytes, Options::default());
        dict::read_tagged(&mut reader).unwrap()
    }

    #[test]
    fn every_variant_round_trips() {
        let mut dict = Dict::new();
        dict.insert(
            "floats",
            GfxMetaData::Floats(MetaFloats {
                name: "floats".to_string(),
                values: vec![1.0, 2.5],
            }),
        )
        .unwrap();
        dict.insert(
            "ints",
            GfxMetaData::Integers(MetaIntegers {
                name: "ints".to_string(),
                values: vec![-3, 9],
            }),
        )
        .unwrap();
        dict.insert(
            "colors",
            GfxMetaData::Colors(MetaColors {
                name: "colors".to_string(),
                values: vec![Vec4::new(0.1, 0.2, 0.3, 1.0)],
            }),
        )
        .unwrap();
        dict.insert(
            "strings",
            GfxMetaData::Strings(MetaStrings {
                name: "strings".to_string(),
                format: StringFormat::Utf8,
                values: vec!["one".to_string(), "two".to_string()],
            }),
        )
        .unwrap();

        assert_eq!(round_trip_dict(&dict), dict);
    }

    #[test]
    fn utf16_string_blocks_round_trip() {
        for format in [StringFormat::Utf16Le, StringFormat::Utf16Be] {
            let mut dict = Dict::new();
            dict.insert(
                "wide",
                GfxMetaData::Strings(MetaStrings {
                    name: "wide".to_string(),
                    format,
                    values: vec!["héllo".to_string()],
                }),
            )
            .unwrap();
            assert_eq!(round_trip_dict(&dict), dict);
        }
    }

    #[test]
    fn invalid_string_format_is_a_decode_error() {
        let block = MetaStrings {
            name: "s".to_string(),
            format: StringFormat::Ascii,
            values: vec![],
        };
        let mut bytes = ctr_serial::write_root(&block, Options::default(), 0).unwrap();
        // Layout: name slot @0, format word @4.
        bytes[4..8].copy_from_slice(&9u32.to_le_bytes());
        let err = ctr_serial::read_root::<MetaStrings>(&bytes, Options::default(), 0).unwrap_err();
        assert_eq!(
            err,
            ReadError::InvalidValue {
                field: "format",
                what: "string format",
                offset: 4,
                value: 9
            }
        );
    }
}
