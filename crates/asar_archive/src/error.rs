//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`] raised while reading
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// the archive header is malformed
    #[error("the archive header is malformed")]
    MalformedHeader(#[from] MalformedHeaderError),

    /// a file reaches past the end of the content region
    #[error(transparent)]
    TruncatedContent(#[from] TruncatedContentError),

    /// unable to write the archive
    #[error("unable to write the archive")]
    WriteError(#[source] std::io::Error),

    /// unable to find requested entry
    #[error("unable to find requested entry {0}")]
    FileNotFound(String),

    /// an entry with this name already exists in the directory
    #[error("an entry named {0} already exists in the directory")]
    DuplicateEntry(String),

    /// the builder is already at the root directory
    #[error("the builder is already at the root directory")]
    NoParent,

    /// entry names may not be empty, a dot segment, or contain a separator
    #[error("invalid entry name {0:?}")]
    InvalidName(String),

    /// the entry is not a directory
    #[error("{0} is not a directory")]
    NotADirectory(String),
}

/// Error type to provide further information when the header could not be parsed
#[derive(Error, Diagnostic, Debug)]
pub enum MalformedHeaderError {
    /// the pickle framing around the header is invalid
    #[error("invalid pickle framing")]
    Pickle(#[from] binrw::Error),

    /// the header is not valid JSON or has an unexpected shape
    #[error("invalid header json")]
    Json(#[from] serde_json::Error),

    /// the archive ends before the declared header size
    #[error("expected a header of {expected} bytes but only {actual} are available")]
    UnexpectedEnd {
        /// bytes declared by the size pickle
        expected: u64,
        /// bytes actually present
        actual: u64,
    },

    /// the top level node does not describe a directory
    #[error("the root entry is not a directory")]
    RootNotDirectory,

    /// a packed file does not declare where its content starts
    #[error("packed file {0} has no offset")]
    MissingOffset(String),

    /// an entry name is empty, a dot segment, or contains a separator
    #[error("invalid entry name {0:?}")]
    InvalidName(String),
}

/// Error type for a file whose declared bytes are not present in the content region
#[derive(Error, Diagnostic, Debug)]
#[error("{path} declares bytes {offset}..{offset}+{size} but the content region holds {available} bytes")]
pub struct TruncatedContentError {
    /// Path of the file inside the archive
    pub path: String,
    /// Declared offset into the content region
    pub offset: u64,
    /// Declared size
    pub size: u64,
    /// Length of the content region
    pub available: u64,
}

/// Error type for a replacement that is not written as `MATCH=REPLACEMENT`
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("expected MATCH=REPLACEMENT but got {0:?}")]
#[diagnostic(help("separate the text to find from its replacement with `=`"))]
pub struct InvalidReplacementError(pub String);

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
