//! Error types for termweave.

use std::fmt;
use std::io;

/// The main error type for termweave operations.
///
/// Only resource failures and rejected parent links are errors. An unhandled
/// event, cancelling an event that is not queued, or a flush that matched
/// nothing are ordinary outcomes reported as values.
#[derive(Debug)]
pub enum WeaveError {
    /// The terminal could not be switched into managed mode.
    TerminalInit(io::Error),
    /// The terminal could not be restored to its default mode.
    TerminalRestore(io::Error),
    /// No terminal driver is available for this platform.
    UnsupportedPlatform,
    /// Attempted to set a node as its own parent or ancestor.
    CircularParentage,
}

impl fmt::Display for WeaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TerminalInit(err) => {
                write!(f, "Failed to enter managed terminal mode: {err}")
            }
            Self::TerminalRestore(err) => {
                write!(f, "Failed to restore terminal mode: {err}")
            }
            Self::UnsupportedPlatform => {
                write!(f, "No terminal driver is available on this platform")
            }
            Self::CircularParentage => {
                write!(f, "Cannot set a node as its own parent or ancestor")
            }
        }
    }
}

impl std::error::Error for WeaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TerminalInit(err) | Self::TerminalRestore(err) => Some(err),
            Self::UnsupportedPlatform | Self::CircularParentage => None,
        }
    }
}

/// A specialized Result type for termweave operations.
pub type Result<T> = std::result::Result<T, WeaveError>;
