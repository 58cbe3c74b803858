//! The closed set of error kinds the core can raise.

use std::io;
use thiserror::Error;

/// An error raised while decoding a container.
///
/// Five variants: malformed container, unsupported feature, not found,
/// source I/O error, and option error.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Wrong magic, a version out of range, a framed-record byte-count
    /// mismatch, an unknown tag encoding, a topological sort that cannot
    /// converge, or a streamer list containing an unexpected type.
    #[error("malformed container: {0}")]
    Malformed(String),

    /// A construct the decoder recognizes but deliberately does not decode:
    /// self-references, STL-string elements, `Loop`/`Artificial` elements on
    /// a concrete class, or an unknown `fType`.
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// A directory lookup (`name`, `cycle`) did not match any key.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying [`ByteSource`](crate::ByteSource) failed a `read`.
    #[error("byte source I/O error")]
    Io(#[from] io::Error),

    /// An option passed to `open`/`read` was not recognized.
    #[error("unrecognized option: {0}")]
    Option(String),
}

impl ReadError {
    /// Builds a [`ReadError::Malformed`].
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Builds a [`ReadError::Unsupported`].
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Builds a [`ReadError::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Builds a [`ReadError::Option`].
    pub fn option(msg: impl Into<String>) -> Self {
        Self::Option(msg.into())
    }

    /// Shorthand for a read-past-end-of-source condition, which is always
    /// a fatal error.
    pub fn eof(context: impl std::fmt::Display) -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            context.to_string(),
        ))
    }
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, ReadError>;
