//! Error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolvError>;

/// Errors returned while decoding or encoding DNS messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Buffer shorter than the fixed header, or no room for type and class.
    #[error("message too short ({0} bytes)")]
    TooShort(usize),

    /// Only standard queries (opcode 0) are handled.
    #[error("unsupported opcode {0}")]
    UnsupportedOpcode(u8),

    /// Exactly one question is supported.
    #[error("expected exactly one question, got {0}")]
    QuestionCount(u16),

    /// A length byte or fixed field points past the end of the buffer.
    #[error("truncated message at offset {0}")]
    Truncated(usize),

    /// Label longer than 63 bytes or name longer than 255 bytes.
    #[error("name too long: {0}")]
    NameTooLong(String),

    /// Only the Internet class is answered.
    #[error("unsupported class {0}")]
    UnsupportedClass(u16),

    /// Compression pointers loop or nest too deeply.
    #[error("too many compression pointers while parsing name")]
    TooManyPointers,
}

/// Errors returned by resolver operations.
#[derive(Debug, Error)]
pub enum ResolvError {
    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading a configuration or hosts file failed.
    #[error("cannot read {}: {source}", .path.display())]
    File {
        /// The file that could not be read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An override nameserver did not parse as an IPv4 address.
    #[error("invalid nameserver address: {0}")]
    InvalidAddress(String),

    /// A query was issued on a state that was never initialized.
    #[error("resolver state is not initialized")]
    NotInitialized,

    /// The state holds no nameserver to send to.
    #[error("no nameservers configured")]
    NoNameservers,

    /// A DNS message could not be built or parsed.
    #[error("malformed DNS message: {0}")]
    Malformed(#[from] CodecError),
}

impl ResolvError {
    /// Wraps an I/O error that concerns `path`.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the underlying I/O error is `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io(e) | Self::File { source: e, .. } => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
