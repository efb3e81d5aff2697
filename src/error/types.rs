//! Error types
//!
//! Defines domain-specific error types for each module of the server. Every
//! error reports an [`ErrorKind`] so transports can pick a status code without
//! inspecting message text.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Externally visible error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputInvalid,
    Forbidden,
    NotFound,
    WrongType,
    BadFormat,
    Io,
}

/// Path resolution errors
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Invalid path: {0}")]
    InvalidInput(String),

    #[error("Access to the requested path is forbidden: {0}")]
    Forbidden(String),

    #[error("Path prefix {} not found", .0.display())]
    PrefixNotFound(PathBuf),

    #[error("Path prefix {} is not a directory", .0.display())]
    PrefixNotADirectory(PathBuf),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PathError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PathError::InvalidInput(_) => ErrorKind::InputInvalid,
            PathError::Forbidden(_) => ErrorKind::Forbidden,
            PathError::PrefixNotFound(_) => ErrorKind::NotFound,
            PathError::PrefixNotADirectory(_) => ErrorKind::WrongType,
            PathError::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Archive extraction and decompression errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive '{archive}' contains unsafe path entry '{entry}'")]
    UnsafeEntry { archive: String, entry: String },

    #[error("Invalid gzip header in '{0}'")]
    GzipHeader(String),

    #[error("Empty or invalid tar archive '{0}': no entries found")]
    Empty(String),

    #[error("Failed to read archive '{archive}': {source}")]
    Corrupt {
        archive: String,
        #[source]
        source: io::Error,
    },

    #[error("Truncated entry '{entry}' in '{archive}': expected {expected} bytes, got {actual}")]
    Truncated {
        archive: String,
        entry: String,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::UnsafeEntry { .. } => ErrorKind::Forbidden,
            ArchiveError::GzipHeader(_)
            | ArchiveError::Empty(_)
            | ArchiveError::Corrupt { .. }
            | ArchiveError::Truncated { .. } => ErrorKind::BadFormat,
            ArchiveError::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Plain upload and target preparation errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Path traversal attempt for file target '{0}'")]
    OutsideTarget(String),

    #[error("Failed to read upload stream for '{name}': {source}")]
    Stream {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to prepare target directory {}: {source}", path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to buffer upload: {0}")]
    Spool(#[source] io::Error),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::OutsideTarget(_) => ErrorKind::Forbidden,
            TransferError::Stream { .. }
            | TransferError::Prepare { .. }
            | TransferError::Write { .. }
            | TransferError::Spool(_) => ErrorKind::Io,
        }
    }
}

/// Directory listing errors. Paths are the virtual display paths.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("Directory not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Permission denied for directory: {0}")]
    PermissionDenied(String),

    #[error("Failed to read directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ListError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ListError::NotFound(_) => ErrorKind::NotFound,
            ListError::NotADirectory(_) => ErrorKind::WrongType,
            ListError::PermissionDenied(_) => ErrorKind::Forbidden,
            ListError::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Service error that encompasses all error types
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    List(#[from] ListError),

    /// Malformed request envelope, such as a missing form part
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Path(e) => e.kind(),
            ServiceError::Archive(e) => e.kind(),
            ServiceError::Transfer(e) => e.kind(),
            ServiceError::List(e) => e.kind(),
            ServiceError::BadRequest(_) => ErrorKind::InputInvalid,
            ServiceError::Internal(_) => ErrorKind::Io,
        }
    }
}
