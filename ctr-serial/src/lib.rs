//! Pointer-relocating binary object serialization for CTR asset containers.
//!
//! Both container families this workspace handles (the legacy H3D layout
//! and the newer CGFX layout) store their object graphs the same way: a
//! content section holding records that point at each other through 4-byte
//! slots, a string pool of interned names, and an image pool of raw byte
//! blobs. This crate is the engine that gives plain-data records that
//! graph-shaped, byte-exact representation:
//!
//! - [`schema`] - per-record field tables; declaration order is wire order
//! - [`section`] - physical sections, the relocation ledger and patch list
//! - [`writer`] - breadth-first serializer with deferred referents
//! - [`reader`] - seek-and-return deserializer
//! - [`resolver`] - discriminant-driven type resolution
//!
//! The engine knows nothing about any concrete record layout; those live
//! in `ctr-formats`. One conversion is one [`Writer`] or [`Reader`],
//! single-threaded and synchronous; independent conversions can run on
//! separate threads with no shared state.
//!
//! # Example
//!
//! ```ignore
//! let bytes = ctr_serial::write_root(&scene, Options::default(), revision)?;
//! let back: Scene = ctr_serial::read_root(&bytes, Options::default(), revision)?;
//! ```

pub mod error;
pub mod options;
pub mod reader;
pub mod resolver;
pub mod scalar;
pub mod schema;
pub mod section;
pub mod writer;


pub use error::{ReadError, SchemaError, WriteError};
pub use options::{LengthPos, Options, PointerKind};
pub use reader::Reader;
pub use resolver::{TagEntry, TagTable, TaggedRecord};
pub use scalar::Scalar;
pub use schema::{
    CmpOp, Codec, FieldDesc, FieldKind, Record, Schema, SchemaBuilder, VersionGate,
};
pub use section::{FileLayout, SectionId, SectionSpan};
pub use writer::Writer;

/// Serialize a root record into a standalone (headerless) buffer.
///
/// Container formats drive [`Writer`] directly so they can reserve header
/// prologues; this is the plain entry point for graphs without one.
pub fn write_root<T: Record>(
    root: &T,
    opts: Options,
    version: u32,
) -> Result<Vec<u8>, WriteError> {
    let mut writer = Writer::new(opts, version);
    writer.record(root)?;
    let (bytes, _layout) = writer.finish()?;
    Ok(bytes)
}

/// Deserialize a root record from a standalone (headerless) buffer.
pub fn read_root<T: Record>(data: &[u8], opts: Options, version: u32) -> Result<T, ReadError> {
    let mut reader = Reader::new(data, opts);
    reader.set_version(version);
    reader.record()
}
