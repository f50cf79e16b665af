//! Error types for class file detection.
//!
//! Failures fall into two groups: problems with a single entry (a truncated or
//! malformed class file, an unreadable archive member) which the scan logs and
//! steps over, and problems with the scan request itself (a missing root, an
//! unsupported resource URL) which abort the scan.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("unexpected end of data at offset {offset}: wanted {wanted} bytes, {available} available")]
    UnexpectedEof {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    #[error("malformed modified UTF-8 string at offset {offset}")]
    MalformedUtf8 { offset: usize },

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("constant pool index {index} does not resolve to a string")]
    UnresolvableConstant { index: u16 },

    #[error("invalid annotation element value tag 0x{tag:02x}")]
    UnknownElementTag { tag: u8 },

    #[error("failed to read entry '{name}': {source}")]
    EntryRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read archive member '{name}': {source}")]
    ArchiveMember {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("skipping archive '{path}': {source}")]
    UnreadableArchive {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to open archive '{path}': {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    #[error("not a recognized resource url: {url}")]
    UnrecognizedResource { url: String },

    #[error("no reporter defined: register at least one of on_type, on_field or on_method")]
    NoReporter,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn entry_read(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::EntryRead {
            name: name.into(),
            source,
        }
    }

    pub fn unreadable_archive(path: impl Into<PathBuf>, source: Error) -> Self {
        Self::UnreadableArchive {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub fn unrecognized_resource(url: impl Into<String>) -> Self {
        Self::UnrecognizedResource { url: url.into() }
    }

    /// True when the error concerns one entry and the scan should move on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof { .. }
                | Self::MalformedUtf8 { .. }
                | Self::UnknownConstantTag { .. }
                | Self::UnresolvableConstant { .. }
                | Self::UnknownElementTag { .. }
                | Self::EntryRead { .. }
                | Self::ArchiveMember { .. }
                | Self::UnreadableArchive { .. }
                | Self::Walk { .. }
        )
    }
}
