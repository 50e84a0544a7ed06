//! Declarative record schemas.
//!
//! Every wire record registers an ordered field table: declaration order is
//! the wire order. Each field descriptor pairs static metadata (kind,
//! version gate) with a write and a read function pointer; the writer and
//! reader drive the table, the function pointers do the per-field work
//! through the engine's typed operations.
//!
//! Tables are built exactly once per record type and cached behind a
//! `OnceLock`. A misconfigured table is a programming defect, not bad
//! input: [`SchemaBuilder::finish`] panics on the first use so the defect
//! cannot be shipped silently.

use crate::error::{ReadError, SchemaError, WriteError};
use crate::reader::Reader;
use crate::section::SectionId;
use crate::writer::Writer;

/// Field write hook. The `'v` lifetime ties the borrowed value to the
/// writer session, letting indirect fields defer their referent until the
/// relocation ledger drains.
pub type WriteFn<T> = for<'v> fn(&'v T, &mut Writer<'v>) -> Result<(), WriteError>;

/// Field read hook.
pub type ReadFn<T> = fn(&mut T, &mut Reader<'_>) -> Result<(), ReadError>;

/// Write hook for an ignored (memory-only) field.
pub fn skip_write<T>(_: &T, _: &mut Writer<'_>) -> Result<(), WriteError> {
    Ok(())
}

/// Read hook for an ignored (memory-only) field.
pub fn skip_read<T>(_: &mut T, _: &mut Reader<'_>) -> Result<(), ReadError> {
    Ok(())
}

/// How a field is represented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Value encoded at the current cursor, no indirection.
    Inline,
    /// Compile-time-known count of inline values.
    InlineArray { len: usize },
    /// 4-byte pointer slot now, referent emitted later.
    Indirect,
    /// Element count plus a pointer slot; the backing buffer is deferred.
    IndirectArray,
    /// Indirect, but the referent lands in a section other than the
    /// current one (strings, image).
    SectionRouted { section: SectionId },
    /// Pointer to a referent whose leading word selects the concrete type.
    Tagged { tags: &'static [u32] },
    /// Present in memory, absent on the wire.
    Ignored,
}

/// Comparison operator for version gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Less,
    Lequal,
    Equal,
    Gequal,
    Greater,
}

/// Includes a field only when the running format revision satisfies the
/// comparison. A gated-out field consumes zero bytes and keeps its
/// in-memory default on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionGate {
    pub op: CmpOp,
    pub threshold: u32,
}

impl VersionGate {
    pub const fn less(threshold: u32) -> Self {
        Self {
            op: CmpOp::Less,
            threshold,
        }
    }

    pub const fn lequal(threshold: u32) -> Self {
        Self {
            op: CmpOp::Lequal,
            threshold,
        }
    }

    pub const fn equal(threshold: u32) -> Self {
        Self {
            op: CmpOp::Equal,
            threshold,
        }
    }

    pub const fn gequal(threshold: u32) -> Self {
        Self {
            op: CmpOp::Gequal,
            threshold,
        }
    }

    pub const fn greater(threshold: u32) -> Self {
        Self {
            op: CmpOp::Greater,
            threshold,
        }
    }

    pub fn admits(&self, version: u32) -> bool {
        match self.op {
            CmpOp::Less => version < self.threshold,
            CmpOp::Lequal => version <= self.threshold,
            CmpOp::Equal => version == self.threshold,
            CmpOp::Gequal => version >= self.threshold,
            CmpOp::Greater => version > self.threshold,
        }
    }
}

/// One entry of a record's field table.
pub struct FieldDesc<T: 'static> {
    pub name: &'static str,
    pub kind: FieldKind,
    pub gate: Option<VersionGate>,
    pub write: WriteFn<T>,
    pub read: ReadFn<T>,
}

/// Custom-codec strategy, resolved once at schema build.
pub enum Codec<T: 'static> {
    /// Generic per-field walk only.
    Default,
    /// `pre_write` runs before the field walk, `post_read` after it. Used
    /// for records that validate or derive state around the generic walk.
    Wrapped {
        pre_write: WriteFn<T>,
        post_read: ReadFn<T>,
    },
    /// The hooks fully replace the field walk. Used for hand-rolled
    /// sub-formats such as packed GPU command streams.
    Custom { write: WriteFn<T>, read: ReadFn<T> },
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Codec<T> {}

/// Immutable, cached description of a record's wire layout.
pub struct Schema<T: 'static> {
    type_name: &'static str,
    codec: Codec<T>,
    fields: Vec<FieldDesc<T>>,
}

impl<T> core::fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl<T> Schema<T> {
    pub fn builder(type_name: &'static str) -> SchemaBuilder<T> {
        SchemaBuilder {
            type_name,
            codec: Codec::Default,
            fields: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn codec(&self) -> Codec<T> {
        self.codec
    }

    pub fn fields(&self) -> &[FieldDesc<T>] {
        &self.fields
    }
}

/// Builder for [`Schema`]. Field registration order is wire order.
pub struct SchemaBuilder<T: 'static> {
    type_name: &'static str,
    codec: Codec<T>,
    fields: Vec<FieldDesc<T>>,
}

impl<T> SchemaBuilder<T> {
    pub fn field(
        self,
        name: &'static str,
        kind: FieldKind,
        write: WriteFn<T>,
        read: ReadFn<T>,
    ) -> Self {
        self.push(FieldDesc {
            name,
            kind,
            gate: None,
            write,
            read,
        })
    }

    pub fn gated_field(
        self,
        name: &'static str,
        kind: FieldKind,
        gate: VersionGate,
        write: WriteFn<T>,
        read: ReadFn<T>,
    ) -> Self {
        self.push(FieldDesc {
            name,
            kind,
            gate: Some(gate),
            write,
            read,
        })
    }

    /// A memory-only field, recorded for documentation but skipped by both
    /// walks.
    pub fn ignored(self, name: &'static str) -> Self {
        self.push(FieldDesc {
            name,
            kind: FieldKind::Ignored,
            gate: None,
            write: skip_write::<T>,
            read: skip_read::<T>,
        })
    }

    pub fn codec(mut self, codec: Codec<T>) -> Self {
        self.codec = codec;
        self
    }

    fn push(mut self, desc: FieldDesc<T>) -> Self {
        self.fields.push(desc);
        self
    }

    /// Validate and build the schema.
    pub fn build(self) -> Result<Schema<T>, SchemaError> {
        for (i, desc) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|d| d.name == desc.name) {
                return Err(SchemaError::DuplicateField {
                    type_name: self.type_name,
                    field: desc.name,
                });
            }
            match desc.kind {
                FieldKind::Tagged { tags } => {
                    if tags.is_empty() {
                        return Err(SchemaError::MissingTagTable {
                            type_name: self.type_name,
                            field: desc.name,
                        });
                    }
                    for (j, tag) in tags.iter().enumerate() {
                        if tags[..j].contains(tag) {
                            return Err(SchemaError::DuplicateTag {
                                type_name: self.type_name,
                                tag: *tag,
                            });
                        }
                    }
                }
                FieldKind::InlineArray { len: 0 } => {
                    return Err(SchemaError::EmptyInlineArray {
                        type_name: self.type_name,
                        field: desc.name,
                    });
                }
                _ => {}
            }
        }
        Ok(Schema {
            type_name: self.type_name,
            codec: self.codec,
            fields: self.fields,
        })
    }

    /// Build, panicking on a configuration error. Schema defects are
    /// programming errors and must fail at first use, not per call.
    pub fn finish(self) -> Schema<T> {
        let type_name = self.type_name;
        self.build()
            .unwrap_or_else(|e| panic!("invalid schema for {type_name}: {e}"))
    }
}

/// A wire record: plain data plus a cached field table.
///
/// Implementations cache the table in a `OnceLock`:
///
/// ```ignore
/// impl Record for Sampler {
///     const NAME: &'static str = "Sampler";
///
///     fn schema() -> &'static Schema<Self> {
///         static SCHEMA: OnceLock<Schema<Sampler>> = OnceLock::new();
///         SCHEMA.get_or_init(|| {
///             Schema::builder(Self::NAME)
///                 .field("name", FieldKind::SectionRouted { section: SectionId::Strings }, w_name, r_name)
///                 .finish()
///         })
///     }
/// }
/// ```
pub trait Record: Default + Sized + 'static {
    const NAME: &'static str;

    fn schema() -> &'static Schema<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Dummy;

    #[test]
    fn duplicate_field_rejected() {
        let err = Schema::<Dummy>::builder("Dummy")
            .field("a", FieldKind::Inline, skip_write, skip_read)
            .field("a", FieldKind::Inline, skip_write, skip_read)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateField {
                type_name: "Dummy",
                field: "a"
            }
        );
    }

    #[test]
    fn tagged_field_requires_discriminant_table() {
        let err = Schema::<Dummy>::builder("Dummy")
            .field("poly", FieldKind::Tagged { tags: &[] }, skip_write, skip_read)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingTagTable {
                type_name: "Dummy",
                field: "poly"
            }
        );
    }

    #[test]
    fn duplicate_tags_rejected() {
        let err = Schema::<Dummy>::builder("Dummy")
            .field(
                "poly",
                FieldKind::Tagged { tags: &[1, 2, 1] },
                skip_write,
                skip_read,
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateTag {
                type_name: "Dummy",
                tag: 1
            }
        );
    }

    #[test]
    fn zero_length_inline_array_rejected() {
        let err = Schema::<Dummy>::builder("Dummy")
            .field(
                "table",
                FieldKind::InlineArray { len: 0 },
                skip_write,
                skip_read,
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::EmptyInlineArray {
                type_name: "Dummy",
                field: "table"
            }
        );
    }

    #[test]
    fn version_gate_comparisons() {
        assert!(VersionGate::gequal(0x21).admits(0x21));
        assert!(VersionGate::gequal(0x21).admits(0x22));
        assert!(!VersionGate::gequal(0x21).admits(0x20));
        assert!(VersionGate::less(0x21).admits(0x20));
        assert!(!VersionGate::less(0x21).admits(0x21));
        assert!(VersionGate::equal(7).admits(7));
        assert!(!VersionGate::equal(7).admits(8));
        assert!(VersionGate::lequal(7).admits(7));
        assert!(VersionGate::greater(7).admits(8));
    }
}
