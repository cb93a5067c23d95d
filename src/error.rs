use std::{fmt, io, result};
use thiserror::Error;

/// A type alias for `Result<T, docstore::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// The error type for document store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Stored or submitted bytes are not a valid document
    #[error("Decode error: {0}")]
    Decode(String),

    /// A document cannot be represented in the storage encoding
    #[error("Encode error: {0}")]
    Encode(String),

    /// An external identifier string is malformed or carries no timestamp
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A document's `_id` field is present but unusable
    #[error("ID must be a string unique identifier")]
    InvalidDocumentId,

    /// An update document tried to change `_id`
    #[error("Can't update ID on update")]
    ImmutableId,

    /// The clock or entropy source needed for a new identifier is unavailable
    #[error("Identifier generation failed: {0}")]
    IdentifierGeneration(String),

    /// LMDB transaction or I/O failure
    #[error("Storage error: {0}")]
    Storage(#[from] lmdb::Error),

    /// I/O error occurred outside a transaction
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The addressed document does not exist
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Invalid argument provided
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Creates a new decode error
    pub fn decode<T: fmt::Display>(msg: T) -> Self {
        Error::Decode(msg.to_string())
    }

    /// Creates a new encode error
    pub fn encode<T: fmt::Display>(msg: T) -> Self {
        Error::Encode(msg.to_string())
    }

    /// Creates a new invalid-argument error
    pub fn invalid_argument<T: Into<String>>(msg: T) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}
