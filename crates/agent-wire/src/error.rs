use std::io;

/// Errors surfaced by [`crate::varint::Reader`] and [`crate::varint::Writer`].
///
/// Mirrors the exception hierarchy of the stream this format was lifted
/// from: a malformed varint/bool/length is a distinct case from a plain
/// I/O error, because callers treat them differently (fatal vs. retryable).
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed format: {0}")]
    MalformedFormat(&'static str),

    #[error("end of file")]
    EndOfFile,

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("unknown control message type {0}")]
    UnknownMessageType(u64),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl WireError {
    /// `true` for errors that indicate an orderly peer shutdown rather than
    /// a protocol violation.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::EndOfFile)
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
