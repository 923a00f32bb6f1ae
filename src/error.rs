//! Library-wide error and result types.
//!
//! Everything in [`Error`] is fatal for the node or read that produced it.
//! Problems a caller is expected to live with (missing keys, missing seeds)
//! are not errors here; they are [`crate::keys::KeyIssue`] values that the
//! decoder stores in `…Error` fields while the rest of the container stays
//! readable.

use std::fmt;
use std::io;

/// Result alias used throughout ctrkit.
pub type Result<T> = std::result::Result<T, Error>;

/// All fatal errors the library can produce.
#[derive(Debug)]
pub enum Error {
    /// A magic/signature field did not match the expected value.
    BadMagic,
    /// A structural constraint was violated (message describes which one).
    Parse(&'static str),
    /// A read of `len` bytes at `offset` does not fit a source of `size` bytes.
    OutOfRange { offset: u64, len: u64, size: u64 },
    /// The backing store could not satisfy a read.
    Io(io::Error),
    /// No derivation is registered under this name.
    FieldNotFound(String),
    /// A node was asked for a value of a different type than it holds.
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A field transitively depends on itself.
    Cycle(String),
    /// The NCCH version uses an IV scheme this library does not implement.
    UnsupportedIvVersion(u16),
    /// The header names a crypto method with no defined meaning.
    UnknownCryptoMethod(u8),
    /// Key material was requested although it is not available.
    KeyUnavailable(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadMagic => write!(f, "bad magic value"),
            Error::Parse(s) => write!(f, "parse error: {s}"),
            Error::OutOfRange { offset, len, size } => write!(
                f,
                "read of {len:#x} bytes at {offset:#x} exceeds source size {size:#x}"
            ),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::FieldNotFound(name) => write!(f, "no field named '{name}'"),
            Error::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Error::Cycle(name) => write!(f, "field '{name}' depends on itself"),
            Error::UnsupportedIvVersion(v) => {
                write!(f, "unsupported IV scheme for NCCH version {v}")
            }
            Error::UnknownCryptoMethod(m) => write!(f, "unknown crypto method {m:#04x}"),
            Error::KeyUnavailable(s) => write!(f, "key unavailable: {s}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
