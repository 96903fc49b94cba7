//! Host error taxonomy.
//!
//! Every error surfaced by this crate originates in a host implementation
//! ([`crate::host`]). The conformance layer only propagates them, or inspects
//! [`HostError::kind`] to classify a probe result.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// The exception names a native host raises, with their legacy numeric codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An output or input index is outside the node's arity.
    IndexSize,
    /// The requested configuration or node type is not supported.
    NotSupported,
    /// The object is in a state where the operation is not allowed
    /// (second `start`, `stop` before `start`, closed context).
    InvalidState,
    /// The operation targets something it cannot act on
    /// (disconnecting an unconnected destination, cross-context connections).
    InvalidAccess,
    /// A numeric argument is outside its permitted range.
    Range,
    /// An argument has the wrong type (non-finite numbers).
    Type,
}

impl ErrorKind {
    /// The exception name, as a host reports it.
    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::IndexSize => "IndexSizeError",
            ErrorKind::NotSupported => "NotSupportedError",
            ErrorKind::InvalidState => "InvalidStateError",
            ErrorKind::InvalidAccess => "InvalidAccessError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Type => "TypeError",
        }
    }

    /// The legacy exception code. Errors that are not DOM exceptions report `0`.
    pub const fn code(self) -> u16 {
        match self {
            ErrorKind::IndexSize => 1,
            ErrorKind::NotSupported => 9,
            ErrorKind::InvalidState => 11,
            ErrorKind::InvalidAccess => 15,
            ErrorKind::Range | ErrorKind::Type => 0,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error raised by a host implementation.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct HostError {
    kind: ErrorKind,
    message: Cow<'static, str>,
}

impl HostError {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn index_size(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::IndexSize, message)
    }

    pub fn not_supported(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotSupported, message)
    }

    pub fn invalid_state(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    pub fn invalid_access(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidAccess, message)
    }

    pub fn range(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Range, message)
    }

    pub fn type_error(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}
