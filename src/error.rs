use std::{io, time::Duration};
use thiserror::Error;

/// Error is returned by every SOCKS5 decode step and composed operation.
///
/// The first error a handshake runs into ends it: nothing is retried and
/// nothing else is read from or written to the socket afterwards.
#[derive(Error, Debug)]
pub enum Error {
    /// The client announced a protocol version other than 0x05
    #[error("version mismatch: expected 0x05, got {0:#04x}")]
    VersionMismatch(u8),

    /// A field was malformed: zero method count, bad reserved byte,
    /// unknown command or address type, truncated input
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The client asked for something we recognise but do not implement
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Transport failure reported by the socket (reset, EOF mid-field, ...)
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The peer did not finish the handshake in time
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
}

/// Result alias used by the codec and the handshake operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::ProtocolError(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedOperation(msg.into())
    }

    /// is_eof reports whether the peer hung up in the middle of a field
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
