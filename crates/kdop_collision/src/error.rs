//! Error types for building, loading and configuring collision trees
//!
//! Queries never fail; they report a miss instead. Everything that can fail
//! happens before the first query: assembling triangles, loading an archive,
//! or reading a configuration file.

use crate::config::ConfigError;
use thiserror::Error;

/// kDOP tree errors
#[derive(Error, Debug)]
pub enum KdopError {
    /// A value does not fit in the tree's index type
    #[error("{what} {value} does not fit in the index type (max {max})")]
    IndexOverflow {
        /// What was being converted
        what: &'static str,
        /// The offending value
        value: usize,
        /// Largest representable value
        max: usize,
    },

    /// A triangle references a vertex that does not exist
    #[error("vertex index {index} out of range ({count} vertices)")]
    VertexOutOfRange {
        /// Referenced vertex index
        index: usize,
        /// Number of vertices available
        count: usize,
    },

    /// Invalid build or transform parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error while reading or writing an archive
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive does not start with the expected magic bytes
    #[error("not a kDOP archive")]
    BadMagic,

    /// Archive version this build cannot read
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u32),

    /// Archive index width other than 2 or 4 bytes
    #[error("unsupported index width {0}")]
    UnsupportedIndexWidth(u32),

    /// Archive decoded but describes an inconsistent tree
    #[error("corrupt archive: {0}")]
    Corrupt(String),
}

/// Result alias for kDOP operations
pub type KdopResult<T> = Result<T, KdopError>;
