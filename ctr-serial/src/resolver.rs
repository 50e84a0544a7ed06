//! Discriminant-driven type resolution for polymorphic fields.
//!
//! A polymorphic referent starts with a 4-byte tag that selects its
//! concrete record type. Each closed union registers a static table of
//! (tag, reader) pairs; resolution is exact-match with no default variant,
//! so an unregistered tag is a decode failure, never a silent fallback.

use crate::error::{ReadError, SchemaError, WriteError};
use crate::reader::Reader;
use crate::writer::Writer;

/// One registered variant of a polymorphic field.
pub struct TagEntry<T: 'static> {
    /// On-disk discriminant value.
    pub tag: u32,
    /// Variant name, for diagnostics.
    pub name: &'static str,
    /// Reads the payload that follows the tag word.
    pub read: fn(&mut Reader<'_>) -> Result<T, ReadError>,
}

/// Static discriminant table for one closed union.
pub struct TagTable<T: 'static> {
    type_name: &'static str,
    entries: Vec<TagEntry<T>>,
}

impl<T> core::fmt::Debug for TagTable<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TagTable")
            .field("type_name", &self.type_name)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<T> TagTable<T> {
    /// Validate and build the table. Empty or duplicate registrations are
    /// schema configuration errors.
    pub fn build(
        type_name: &'static str,
        entries: Vec<TagEntry<T>>,
    ) -> Result<Self, SchemaError> {
        if entries.is_empty() {
            return Err(SchemaError::EmptyTagTable { type_name });
        }
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.tag == entry.tag) {
                return Err(SchemaError::DuplicateTag {
                    type_name,
                    tag: entry.tag,
                });
            }
        }
        Ok(Self { type_name, entries })
    }

    /// Build, panicking on a configuration error (programming defect).
    pub fn finish(type_name: &'static str, entries: Vec<TagEntry<T>>) -> Self {
        Self::build(type_name, entries)
            .unwrap_or_else(|e| panic!("invalid discriminant table for {type_name}: {e}"))
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Exact-match lookup. `None` means the caller must fail the decode.
    pub fn resolve(&self, tag: u32) -> Option<&TagEntry<T>> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

/// A closed union stored behind a tagged pointer.
///
/// The write side needs no table lookup: the enum itself is the reverse
/// mapping from runtime variant to wire tag.
pub trait TaggedRecord: Sized + 'static {
    const NAME: &'static str;

    /// Static (tag, reader) table, cached like a record schema.
    fn tag_table() -> &'static TagTable<Self>;

    /// Wire tag of this value's variant.
    fn wire_tag(&self) -> u32;

    /// Write the payload that follows the tag word. A variant that only
    /// supports reading returns [`WriteError::Unsupported`].
    fn write_payload<'v>(&'v self, w: &mut Writer<'v>) -> Result<(), WriteError>;
}
