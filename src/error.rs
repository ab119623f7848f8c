//! Error types for archive operations

use thiserror::Error;

/// Archive operation result type
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors raised by the archiver, the dearchiver and the serializer
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Null or empty name, empty backend set, duplicate binding index
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A resource with the same name but different contents is already registered
    #[error("{kind} with name '{name}' is already present in the archive with different contents")]
    NameConflict { kind: &'static str, name: String },

    /// The byte source does not start with the archive magic number
    #[error("Invalid magic number in archive header")]
    BadMagic,

    /// The archive was produced by an incompatible format version
    #[error("Unsupported archive version: {0}")]
    UnsupportedVersion(u32),

    /// Parse-time bound violation, duplicate chunk, kind mismatch or truncated data
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// The requested name is not present in the archive
    #[error("{kind} with name '{name}' is not present in the archive")]
    NotFound { kind: &'static str, name: String },

    /// The selected backend contributed no bytes for this resource
    #[error("Archive contains no data for backend {backend:?}")]
    BackendUnavailable { backend: crate::backend::Backend },

    /// The external object factory rejected the description
    #[error("Device factory failed: {0}")]
    FactoryFailed(String),

    /// Underlying byte source or sink failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        ArchiveError::CorruptArchive(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ArchiveError::InvalidArgument(msg.into())
    }
}
