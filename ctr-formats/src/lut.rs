//! Fragment-lighting lookup tables.
//!
//! A sampler is 256 float samples in memory. On the wire it is a packed
//! PICA command stream: each sample quantized to a 12-bit value plus a
//! 12-bit delta to the next sample, uploaded through the lighting LUT data
//! registers. The transform spans the whole record, so both sampler
//! records use a fully custom codec instead of the generic field walk.

use std::sync::OnceLock;

use ctr_serial::{Codec, FieldKind, ReadError, Reader, Record, Schema, SectionId, WriteError, Writer};
use serde::{Deserialize, Serialize};

use crate::dict::{self, Dict};
use crate::error::FormatError;
use crate::gfx::CGFX_REVISION;
use crate::pica::{
    self, CommandWriter, REG_LIGHTING_LUT_DATA0, REG_LIGHTING_LUT_DATA7, REG_LIGHTING_LUT_INDEX,
};

/// Samples per lookup table.
pub const TABLE_LEN: usize = 256;

const VALUE_SCALE: f32 = 4095.0;
const DELTA_SCALE: f32 = 2047.0;

/// Difference between neighboring samples, used for the delta bits when
/// the caller has no decoded deltas to preserve.
fn table_deltas(table: &[f32]) -> Vec<f32> {
    let mut deltas = vec![0.0f32; TABLE_LEN];
    for i in 0..TABLE_LEN - 1 {
        deltas[i] = table[i + 1] - table[i];
    }
    deltas
}

/// Quantize a 256-sample table into its command stream words.
///
/// Values are rounded, not truncated, so decode(encode(t)) is idempotent
/// and re-serialization stays byte-identical.
fn encode_table(table: &[f32], deltas: &[f32]) -> Vec<u32> {
    debug_assert_eq!(table.len(), TABLE_LEN);
    debug_assert_eq!(deltas.len(), TABLE_LEN);
    let mut packed = vec![0u32; TABLE_LEN];
    for i in 0..TABLE_LEN {
        let value = (table[i] * VALUE_SCALE).round() as i32;
        let delta = (deltas[i] * DELTA_SCALE).round() as i32;
        packed[i] = ((value | (delta << 12)) as u32) & 0x00FF_FFFF;
    }
    let mut writer = CommandWriter::new();
    writer.set_command(REG_LIGHTING_LUT_DATA0, 0xF, false, &packed);
    writer.end();
    writer.into_words()
}

/// Rebuild the sample table (low 12 bits) and the stored delta bits from
/// a command stream.
fn decode_table(words: &[u32]) -> Result<(Vec<f32>, Vec<f32>), pica::StreamError> {
    let mut table = vec![0.0f32; TABLE_LEN];
    let mut deltas = vec![0.0f32; TABLE_LEN];
    let mut index = 0usize;
    for cmd in pica::parse(words)? {
        if cmd.register == REG_LIGHTING_LUT_INDEX {
            index = (cmd.parameters[0] & 0xFF) as usize;
        } else if (REG_LIGHTING_LUT_DATA0..=REG_LIGHTING_LUT_DATA7).contains(&cmd.register) {
            for param in &cmd.parameters {
                if index < TABLE_LEN {
                    table[index] = (param & 0xFFF) as f32 / VALUE_SCALE;
                    deltas[index] = ((param >> 12) & 0xFFF) as f32 / DELTA_SCALE;
                    index += 1;
                }
            }
        }
    }
    Ok((table, deltas))
}

fn stream_error(d: &Reader<'_>) -> ReadError {
    ReadError::Malformed {
        field: d.field(),
        what: "lut command stream",
        offset: d.position(),
    }
}

// ---------------------------------------------------------------------
// CGFX sampler
// ---------------------------------------------------------------------

/// CGFX lookup-table sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GfxLutSampler {
    pub name: String,
    pub is_absolute: bool,
    table: Vec<f32>,
}

impl GfxLutSampler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn table(&self) -> &[f32] {
        &self.table
    }

    /// Replace the sample table. The length invariant (exactly 256) is
    /// enforced here, at assignment, never at write time.
    pub fn set_table(&mut self, table: &[f32]) -> Result<(), FormatError> {
        if table.len() != TABLE_LEN {
            return Err(FormatError::TableLength {
                expected: TABLE_LEN,
                actual: table.len(),
            });
        }
        self.table.copy_from_slice(table);
        Ok(())
    }
}

impl Default for GfxLutSampler {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_absolute: false,
            table: vec![0.0; TABLE_LEN],
        }
    }
}

fn w_gfx_sampler<'v>(s: &'v GfxLutSampler, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&s.name)?;
    w.u32(s.is_absolute as u32)?;
    // CGFX always derives the delta bits from the table.
    w.scalar_list_owned(encode_table(&s.table, &table_deltas(&s.table)))
}

fn r_gfx_sampler(s: &mut GfxLutSampler, d: &mut Reader<'_>) -> Result<(), ReadError> {
    s.name = d.string()?;
    s.is_absolute = d.u32()? != 0;
    let words = d.scalar_list::<u32>()?;
    (s.table, _) = decode_table(&words).map_err(|_| stream_error(d))?;
    Ok(())
}

impl Record for GfxLutSampler {
    const NAME: &'static str = "GfxLutSampler";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<GfxLutSampler>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .codec(Codec::Custom {
                    write: w_gfx_sampler,
                    read: r_gfx_sampler,
                })
                .finish()
        })
    }
}

// ---------------------------------------------------------------------
// H3D sampler
// ---------------------------------------------------------------------

const H3D_LUT_FLAG_ABSOLUTE: u32 = 1;

/// H3D lookup-table sampler. Same table, different field order on the
/// wire: flags word, command stream, then the name.
///
/// Unlike the CGFX sampler, the delta bits decoded from a file are kept
/// and written back verbatim; re-encoding an unmodified sampler is
/// byte-exact even when the table is off the quantization grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct H3dLutSampler {
    pub name: String,
    pub is_absolute: bool,
    table: Vec<f32>,
    deltas: Vec<f32>,
}

impl H3dLutSampler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn table(&self) -> &[f32] {
        &self.table
    }

    pub fn set_table(&mut self, table: &[f32]) -> Result<(), FormatError> {
        if table.len() != TABLE_LEN {
            return Err(FormatError::TableLength {
                expected: TABLE_LEN,
                actual: table.len(),
            });
        }
        self.table.copy_from_slice(table);
        self.deltas = table_deltas(&self.table);
        Ok(())
    }

    /// Fill `start..end` with a linear ramp between the two values.
    pub fn fill_lerp(&mut self, start: usize, start_value: f32, end: usize, end_value: f32) {
        let span = (end - start).max(1) as f32;
        for i in start..end.min(TABLE_LEN) {
            let weight = (i - start) as f32 / span;
            self.table[i] = start_value * (1.0 - weight) + end_value * weight;
        }
        self.deltas = table_deltas(&self.table);
    }
}

impl Default for H3dLutSampler {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_absolute: false,
            table: vec![0.0; TABLE_LEN],
            deltas: vec![0.0; TABLE_LEN],
        }
    }
}

// The stored delta bits are a cache of the wire encoding, not part of the
// sampler's value.
impl PartialEq for H3dLutSampler {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.is_absolute == other.is_absolute
            && self.table == other.table
    }
}

fn w_h3d_sampler<'v>(s: &'v H3dLutSampler, w: &mut Writer<'v>) -> Result<(), WriteError> {
    let flags = if s.is_absolute {
        H3D_LUT_FLAG_ABSOLUTE
    } else {
        0
    };
    w.u32(flags)?;
    w.scalar_list_owned(encode_table(&s.table, &s.deltas))?;
    w.string(&s.name)
}

fn r_h3d_sampler(s: &mut H3dLutSampler, d: &mut Reader<'_>) -> Result<(), ReadError> {
    s.is_absolute = d.u32()? & H3D_LUT_FLAG_ABSOLUTE != 0;
    let words = d.scalar_list::<u32>()?;
    (s.table, s.deltas) = decode_table(&words).map_err(|_| stream_error(d))?;
    s.name = d.string()?;
    Ok(())
}

impl Record for H3dLutSampler {
    const NAME: &'static str = "H3dLutSampler";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<H3dLutSampler>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .codec(Codec::Custom {
                    write: w_h3d_sampler,
                    read: r_h3d_sampler,
                })
                .finish()
        })
    }
}

// ---------------------------------------------------------------------
// LUT containers
// ---------------------------------------------------------------------

/// CGFX lookup table: a named dict of samplers, carrying its own object
/// revision word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GfxLut {
    pub revision: u32,
    pub name: String,
    pub samplers: Dict<GfxLutSampler>,
}

impl Default for GfxLut {
    fn default() -> Self {
        Self {
            revision: CGFX_REVISION,
            name: String::new(),
            samplers: Dict::new(),
        }
    }
}

fn w_gfx_lut_revision(l: &GfxLut, w: &mut Writer<'_>) -> Result<(), WriteError> {
    w.u32(l.revision)
}

fn r_gfx_lut_revision(l: &mut GfxLut, d: &mut Reader<'_>) -> Result<(), ReadError> {
    l.revision = d.u32()?;
    Ok(())
}

fn w_gfx_lut_name<'v>(l: &'v GfxLut, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&l.name)
}

fn r_gfx_lut_name(l: &mut GfxLut, d: &mut Reader<'_>) -> Result<(), ReadError> {
    l.name = d.string()?;
    Ok(())
}

fn w_gfx_lut_samplers<'v>(l: &'v GfxLut, w: &mut Writer<'v>) -> Result<(), WriteError> {
    dict::write(&l.samplers, w)
}

fn r_gfx_lut_samplers(l: &mut GfxLut, d: &mut Reader<'_>) -> Result<(), ReadError> {
    // The object's embedded revision governs its own subtree.
    let revision = l.revision;
    d.scoped_version(revision, |d| {
        l.samplers = dict::read(d)?;
        Ok(())
    })
}

impl Record for GfxLut {
    const NAME: &'static str = "GfxLut";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<GfxLut>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field(
                    "revision",
                    FieldKind::Inline,
                    w_gfx_lut_revision,
                    r_gfx_lut_revision,
                )
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_gfx_lut_name,
                    r_gfx_lut_name,
                )
                .field(
                    "samplers",
                    FieldKind::IndirectArray,
                    w_gfx_lut_samplers,
                    r_gfx_lut_samplers,
                )
                .finish()
        })
    }
}

/// H3D lookup table: a named dict of samplers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct H3dLut {
    pub name: String,
    pub samplers: Dict<H3dLutSampler>,
}

fn w_h3d_lut_name<'v>(l: &'v H3dLut, w: &mut Writer<'v>) -> Result<(), WriteError> {
    w.string(&l.name)
}

fn r_h3d_lut_name(l: &mut H3dLut, d: &mut Reader<'_>) -> Result<(), ReadError> {
    l.name = d.string()?;
    Ok(())
}

fn w_h3d_lut_samplers<'v>(l: &'v H3dLut, w: &mut Writer<'v>) -> Result<(), WriteError> {
    dict::write(&l.samplers, w)
}

fn r_h3d_lut_samplers(l: &mut H3dLut, d: &mut Reader<'_>) -> Result<(), ReadError> {
    l.samplers = dict::read(d)?;
    Ok(())
}

impl Record for H3dLut {
    const NAME: &'static str = "H3dLut";

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<H3dLut>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder(Self::NAME)
                .field(
                    "name",
                    FieldKind::SectionRouted { section: SectionId::Strings },
                    w_h3d_lut_name,
                    r_h3d_lut_name,
                )
                .field(
                    "samplers",
                    FieldKind::IndirectArray,
                    w_h3d_lut_samplers,
                    r_h3d_lut_samplers,
                )
                .finish()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctr_serial::{read_root, write_root, Options};

    /// Table whose samples sit exactly on the quantization grid, so a
    /// round trip is bit-exact.
    fn quantized_table() -> Vec<f32> {
        (0..TABLE_LEN)
            .map(|i| ((i * 16) % 4096) as f32 / 4095.0)
            .collect()
    }

    #[test]
    fn set_table_rejects_wrong_length() {
        let mut sampler = GfxLutSampler::new("s");
        assert_eq!(
            sampler.set_table(&[0.0; 255]),
            Err(FormatError::TableLength {
                expected: 256,
                actual: 255
            })
        );
    }

    #[test]
    fn sampler_named_default_with_256_floats_round_trips() {
        let mut sampler = GfxLutSampler::new("Default");
        sampler.set_table(&quantized_table()).unwrap();

        let bytes = write_root(&sampler, Options::default(), 0).unwrap();
        let back: GfxLutSampler = read_root(&bytes, Options::default(), 0).unwrap();

        assert_eq!(back.name, "Default");
        assert_eq!(back.table().len(), 256);
        assert_eq!(back.table(), sampler.table());
    }

    #[test]
    fn quantization_is_idempotent_after_one_generation() {
        let mut sampler = H3dLutSampler::new("ramp");
        sampler.fill_lerp(0, 0.0, 256, 1.0);

        let opts = Options::default();
        let first = write_root(&sampler, opts, 0).unwrap();
        let gen1: H3dLutSampler = read_root(&first, opts, 0).unwrap();
        let second = write_root(&gen1, opts, 0).unwrap();
        assert_eq!(first, second);

        // And every decoded sample is within one quantization step.
        for (a, b) in sampler.table().iter().zip(gen1.table()) {
            assert!((a - b).abs() <= 1.0 / 4095.0);
        }
    }

    #[test]
    fn h3d_sampler_flags_round_trip() {
        let mut sampler = H3dLutSampler::new("abs");
        sampler.is_absolute = true;
        let bytes = write_root(&sampler, Options::default(), 0).unwrap();
        let back: H3dLutSampler = read_root(&bytes, Options::default(), 0).unwrap();
        assert!(back.is_absolute);
        assert_eq!(back.name, "abs");
    }

    #[test]
    fn lut_dict_round_trips() {
        let mut lut = GfxLut {
            name: "lights".to_string(),
            ..GfxLut::default()
        };
        let mut sampler = GfxLutSampler::new("spec");
        sampler.set_table(&quantized_table()).unwrap();
        lut.samplers.insert("spec", sampler).unwrap();

        let bytes = write_root(&lut, Options::default(), 0).unwrap();
        let back: GfxLut = read_root(&bytes, Options::default(), 0).unwrap();
        assert_eq!(back, lut);
    }
}
