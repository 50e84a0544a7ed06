//! Engine error types.
//!
//! Three distinct failure classes, matching how they should be handled:
//!
//! - [`SchemaError`] - a record's declared field table is inconsistent.
//!   This is a programming defect, surfaced loudly on first use of the
//!   schema, never triggered by input data.
//! - [`WriteError`] - an encode precondition does not hold (wrong fixed
//!   length, unsupported write path). Rejected before any bytes are
//!   produced; a conversion either yields a complete buffer or nothing.
//! - [`ReadError`] - malformed input. Fatal for the current read and
//!   propagated with the field name and byte offset so the input file can
//!   be diagnosed.

use thiserror::Error;

/// Schema configuration error, detected when a record's field table is
/// first built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("record {type_name} declares field `{field}` more than once")]
    DuplicateField {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("polymorphic field `{field}` of {type_name} has an empty discriminant table")]
    MissingTagTable {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("discriminant table for {type_name} registers tag 0x{tag:08X} more than once")]
    DuplicateTag { type_name: &'static str, tag: u32 },

    #[error("discriminant table for {type_name} has no entries")]
    EmptyTagTable { type_name: &'static str },

    #[error("inline array field `{field}` of {type_name} declares zero length")]
    EmptyInlineArray {
        type_name: &'static str,
        field: &'static str,
    },
}

/// Encode precondition failure. Nothing has been written when this is
/// returned; serialization is atomic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("field `{field}` expects exactly {expected} elements, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("writing {0} is not supported")]
    Unsupported(&'static str),

    #[error("section {section} exceeds the 4 GiB pointer range")]
    SectionOverflow { section: &'static str },

    #[error("pointer from `{field}` cannot be encoded (slot 0x{slot:08X}, target 0x{target:08X})")]
    PointerRange {
        field: &'static str,
        slot: u64,
        target: u64,
    },
}

/// Malformed input. No partial object is ever returned alongside one of
/// these; the whole read aborts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("unexpected end of file in `{field}` at offset 0x{offset:08X}")]
    UnexpectedEof { field: &'static str, offset: u64 },

    #[error(
        "pointer in `{field}` at offset 0x{slot:08X} targets 0x{target:08X}, \
         past the end of the file (0x{len:08X} bytes)"
    )]
    PointerOutOfRange {
        field: &'static str,
        slot: u64,
        target: u64,
        len: u64,
    },

    #[error("null pointer in required field `{field}` at offset 0x{slot:08X}")]
    NullPointer { field: &'static str, slot: u64 },

    #[error("count {count} in `{field}` at offset 0x{offset:08X} exceeds the remaining file size")]
    CountOutOfRange {
        field: &'static str,
        offset: u64,
        count: u32,
    },

    #[error("unknown discriminant 0x{tag:08X} for {type_name} in `{field}` at offset 0x{offset:08X}")]
    UnknownTag {
        field: &'static str,
        type_name: &'static str,
        offset: u64,
        tag: u32,
    },

    #[error("invalid value 0x{value:08X} for {what} in `{field}` at offset 0x{offset:08X}")]
    InvalidValue {
        field: &'static str,
        what: &'static str,
        offset: u64,
        value: u32,
    },

    #[error("malformed {what} in `{field}` at offset 0x{offset:08X}")]
    Malformed {
        field: &'static str,
        what: &'static str,
        offset: u64,
    },
}
