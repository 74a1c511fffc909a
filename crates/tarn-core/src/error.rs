//! Error types for the tarn engine.
//!
//! Every error maps onto exactly one [`Status`] through [`Error::status`], so
//! callers that only care about the flat status code can ignore the context
//! carried by each variant.
//!
//! # Examples
//!
//! ```
//! use tarn_core::{Error, Result, Status};
//!
//! fn check_magic(bytes: &[u8]) -> Result<()> {
//!     if !bytes.starts_with(b"\0asm") {
//!         return Err(Error::Parse {
//!             offset: 0,
//!             message: "missing magic header".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! let err = check_magic(b"nope").unwrap_err();
//! assert!(err.is_parse_error());
//! assert_eq!(err.status(), Status::ParseError);
//! ```

use crate::Status;
use thiserror::Error;

/// Main error type for the engine.
///
/// All crates in the workspace report failures through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// The binary is malformed.
    #[error("parse error at offset {offset:#x}: {message}")]
    Parse {
        /// Byte offset at which decoding stopped
        offset: usize,
        /// Description of the malformed construct
        message: String,
    },

    /// The binary is well formed but fails validation.
    #[error("validation failed at offset {offset:#x} ({status}): {message}")]
    Validation {
        /// One of the validation statuses
        status: Status,
        /// Byte offset of the offending construct
        offset: usize,
        /// Description of the failure
        message: String,
    },

    /// Linking or initialization failed.
    ///
    /// Also used when an instance whose instantiation failed is used again.
    #[error("instantiation failed ({status}): {message}")]
    Instantiation {
        /// Failure status, usually an instantiation status, or a trap
        /// raised while running initializers or the start function
        status: Status,
        /// Description of the failure
        message: String,
    },

    /// Execution trapped.
    #[error("trap: {status}: {message}")]
    Trap {
        /// One of the trap statuses
        status: Status,
        /// Where the trap happened
        message: String,
    },

    /// Execution stopped at a debug trap and may be resumed.
    #[error("execution suspended: {status}")]
    Suspended {
        /// One of the debug-trap statuses
        status: Status,
    },

    /// A caller-supplied argument was rejected.
    #[error("invalid arguments: {message}")]
    InvalidArgs {
        /// Description of the rejected argument
        message: String,
    },

    /// A named export, function, or global does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up
        what: String,
    },

    /// Configuration is invalid or could not be loaded.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// A third-party backend reported an error.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the backend failure
        message: String,
        /// Underlying error cause
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a trap error.
    #[must_use]
    pub fn trap(status: Status, message: impl Into<String>) -> Self {
        Self::Trap {
            status,
            message: message.into(),
        }
    }

    /// Creates an instantiation error.
    #[must_use]
    pub fn instantiation(status: Status, message: impl Into<String>) -> Self {
        Self::Instantiation {
            status,
            message: message.into(),
        }
    }

    /// Creates an invalid-arguments error.
    #[must_use]
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs {
            message: message.into(),
        }
    }

    /// Maps this error onto the flat status taxonomy.
    ///
    /// # Examples
    ///
    /// ```
    /// use tarn_core::{Error, Status};
    ///
    /// let err = Error::trap(Status::TrapUnreachable, "in function 0");
    /// assert_eq!(err.status(), Status::TrapUnreachable);
    ///
    /// let err = Error::invalid_args("wrong arity");
    /// assert_eq!(err.status(), Status::FailInvalidArgs);
    /// ```
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Parse { .. } => Status::ParseError,
            Self::Validation { status, .. }
            | Self::Instantiation { status, .. }
            | Self::Trap { status, .. }
            | Self::Suspended { status } => *status,
            Self::InvalidArgs { .. } | Self::NotFound { .. } | Self::Config { .. } => {
                Status::FailInvalidArgs
            }
            Self::Backend { .. } => Status::FailUnknown,
        }
    }

    /// Returns `true` if this is a parse error.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Returns `true` if this is a validation error.
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if this is an instantiation error.
    #[must_use]
    pub const fn is_instantiation_error(&self) -> bool {
        matches!(self, Self::Instantiation { .. })
    }

    /// Returns `true` if execution trapped.
    ///
    /// # Examples
    ///
    /// ```
    /// use tarn_core::{Error, Status};
    ///
    /// assert!(Error::trap(Status::TrapDivideByZero, "").is_trap());
    /// assert!(!Error::invalid_args("x").is_trap());
    /// ```
    #[must_use]
    pub const fn is_trap(&self) -> bool {
        matches!(self, Self::Trap { .. })
    }

    /// Returns `true` if execution is suspended at a debug trap.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }

    /// Returns `true` if this is an invalid-arguments error.
    #[must_use]
    pub const fn is_invalid_args(&self) -> bool {
        matches!(self, Self::InvalidArgs { .. })
    }

    /// Returns `true` if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns `true` if a third-party backend reported the error.
    #[must_use]
    pub const fn is_backend_error(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                Error::Parse {
                    offset: 8,
                    message: "bad".into(),
                },
                Status::ParseError,
            ),
            (
                Error::Validation {
                    status: Status::ValidationInvalidLocal,
                    offset: 0,
                    message: "local 9".into(),
                },
                Status::ValidationInvalidLocal,
            ),
            (
                Error::instantiation(Status::FailMissingImport, "env.f"),
                Status::FailMissingImport,
            ),
            (
                Error::trap(Status::TrapStackOverflow, "depth"),
                Status::TrapStackOverflow,
            ),
            (
                Error::Suspended {
                    status: Status::DebugTrapStep,
                },
                Status::DebugTrapStep,
            ),
            (
                Error::NotFound { what: "x".into() },
                Status::FailInvalidArgs,
            ),
            (
                Error::Backend {
                    message: "boom".into(),
                    source: None,
                },
                Status::FailUnknown,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn test_predicates() {
        assert!(Error::trap(Status::TrapUnreachable, "").is_trap());
        assert!(Error::instantiation(Status::FailInstantiate, "").is_instantiation_error());
        assert!(
            Error::Suspended {
                status: Status::DebugTrapBreakpoint
            }
            .is_suspended()
        );
        assert!(Error::Config { message: "x".into() }.is_config_error());
        assert!(Error::NotFound { what: "g".into() }.is_not_found());
    }

    #[test]
    fn test_display_includes_offset() {
        let err = Error::Parse {
            offset: 0x10,
            message: "unexpected end".into(),
        };
        assert_eq!(err.to_string(), "parse error at offset 0x10: unexpected end");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
