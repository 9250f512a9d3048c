//! Error types for the FatELF glue engine.
//!
//! This module defines the typed error taxonomy used throughout the crate,
//! covering the container codec, the ELF/AR readers, and the merge and
//! glue algorithms.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for the glue engine.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The ELF identification or header could not be parsed.
    #[error("malformed ELF at {path}: {message}")]
    MalformedElf { path: PathBuf, message: String },

    /// The ar archive header or member table could not be parsed.
    #[error("malformed ar archive at {path}: {message}")]
    MalformedAr { path: PathBuf, message: String },

    /// A file was expected to carry the FatELF magic but did not.
    #[error("not a FatELF container: {path}")]
    NotFatElf { path: PathBuf },

    /// A FatELF header declared a format version this crate cannot read.
    #[error("unsupported FatELF version {version} in {path}")]
    UnsupportedVersion { path: PathBuf, version: u16 },

    /// A read ran past the end of the available data.
    #[error("truncated data at offset {offset} in {path}: expected {expected} bytes, got {actual}")]
    Truncated {
        path: PathBuf,
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// Two inputs to the glue engine target the same architecture/ABI tuple.
    #[error("duplicate target: {path} targets the same architecture/ABI as an earlier input")]
    DuplicateTarget { path: PathBuf },

    /// A FatELF container declared (or would require) more records than fit
    /// in the one-byte record count.
    #[error("too many records: {count} (FatELF supports at most 255)")]
    TooManyRecords { count: usize },

    /// Two peer paths in a merge disagree on file type, or an existing
    /// target disagrees with the type being merged into it.
    #[error("type mismatch between {a} and {b}")]
    TypeMismatch { a: PathBuf, b: PathBuf },

    /// A merge input is a type this engine does not know how to merge
    /// (block device, character device, FIFO, or socket).
    #[error("unsupported file type at {path}")]
    UnsupportedFileType { path: PathBuf },

    /// A merge input is unsuitable for the requested operation (e.g. an
    /// already-fat FatELF file passed to the glue leg).
    #[error("unsupported input at {path}: {message}")]
    UnsupportedInput { path: PathBuf, message: String },

    /// A code path is acknowledged but intentionally not implemented.
    #[error("not implemented: {0}")]
    Unimplemented(String),

    /// A merge was requested for `target` with an empty source list; the
    /// caller (tree walker or CLI) is expected to never produce this, but
    /// it is rejected as data rather than assumed away.
    #[error("no source paths given for merge target {target}")]
    EmptySourceSet { target: PathBuf },
}

/// Result type alias for glue engine operations.
pub type Result<T> = std::result::Result<T, Error>;
