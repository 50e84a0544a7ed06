//! Container-level error type.

use ctr_serial::{ReadError, WriteError};
use thiserror::Error;

/// Errors raised by the container layer on top of the engine's own
/// read/write failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid {format} magic bytes")]
    BadMagic { format: &'static str },

    #[error("file too small for a {format} header ({actual} bytes)")]
    TooSmall { format: &'static str, actual: usize },

    #[error("{format} header declares {declared} bytes but the file has {actual}")]
    LengthMismatch {
        format: &'static str,
        declared: u32,
        actual: usize,
    },

    #[error("dict entry name cannot be empty")]
    EmptyName,

    #[error("duplicate entry `{0}` in dict")]
    DuplicateName(String),

    #[error("lookup table expects exactly {expected} entries, got {actual}")]
    TableLength { expected: usize, actual: usize },

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Write(#[from] WriteError),
}
