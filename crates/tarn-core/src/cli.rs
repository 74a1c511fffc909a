//! CLI-specific types shared by front ends.
//!
//! # Examples
//!
//! ```
//! use tarn_core::Status;
//! use tarn_core::cli::{ExitCode, OutputFormat};
//!
//! let format: OutputFormat = "json".parse().unwrap();
//! assert_eq!(format, OutputFormat::Json);
//!
//! assert_eq!(ExitCode::from_status(Status::Ok), ExitCode::SUCCESS);
//! assert_eq!(ExitCode::from_status(Status::TrapUnreachable), ExitCode::TRAP);
//! ```

use crate::Status;
use std::fmt;
use std::str::FromStr;

/// CLI output format.
///
/// All formats carry the same information with different presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    /// JSON output for machine parsing
    Json,
    /// Plain text output for scripts
    Text,
    /// Pretty-printed output with colors for human reading
    #[default]
    Pretty,
}

impl OutputFormat {
    /// Returns the format name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "pretty" => Ok(Self::Pretty),
            _ => Err(crate::Error::invalid_args(format!(
                "invalid output format: '{s}' (expected: json, text, or pretty)"
            ))),
        }
    }
}

/// Process exit code with semantic meaning.
///
/// Success is 0; each failure family of [`Status`] has its own code so
/// scripts can tell a trapping guest from a malformed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Successful execution (exit code 0).
    pub const SUCCESS: Self = Self(0);

    /// General error (exit code 1).
    pub const ERROR: Self = Self(1);

    /// Invalid input or arguments (exit code 2).
    pub const INVALID_INPUT: Self = Self(2);

    /// Module failed to parse or validate (exit code 3).
    pub const INVALID_MODULE: Self = Self(3);

    /// Linking or initialization failed (exit code 4).
    pub const INSTANTIATION: Self = Self(4);

    /// The guest trapped (exit code 5).
    pub const TRAP: Self = Self(5);

    /// Execution suspended, e.g. the step budget ran out (exit code 6).
    pub const SUSPENDED: Self = Self(6);

    /// Creates an exit code from an integer value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        Self(code)
    }

    /// Picks the exit code for a status family.
    #[must_use]
    pub const fn from_status(status: Status) -> Self {
        if status.is_ok() {
            Self::SUCCESS
        } else if status.is_parse_error() || status.is_validation_error() {
            Self::INVALID_MODULE
        } else if matches!(status, Status::FailInvalidArgs) {
            Self::INVALID_INPUT
        } else if status.is_instantiation_error() {
            Self::INSTANTIATION
        } else if status.is_trap() {
            Self::TRAP
        } else if status.is_debug_trap() {
            Self::SUSPENDED
        } else {
            Self::ERROR
        }
    }

    /// Returns the exit code as an integer.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    /// Checks if the exit code represents success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.0 == 0
    }
}

impl Default for ExitCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_exit_code_families() {
        let cases = [
            (Status::Ok, ExitCode::SUCCESS),
            (Status::ParseError, ExitCode::INVALID_MODULE),
            (Status::ValidationTypeMismatch, ExitCode::INVALID_MODULE),
            (Status::FailInvalidArgs, ExitCode::INVALID_INPUT),
            (Status::FailMissingImport, ExitCode::INSTANTIATION),
            (Status::TrapDivideByZero, ExitCode::TRAP),
            (Status::DebugTrapSuspended, ExitCode::SUSPENDED),
            (Status::FailUnknown, ExitCode::ERROR),
        ];
        for (status, expected) in cases {
            assert_eq!(ExitCode::from_status(status), expected, "{status:?}");
        }
    }

    #[test]
    fn test_exit_code_conversion() {
        assert_eq!(i32::from(ExitCode::TRAP), 5);
        assert!(ExitCode::default().is_success());
        assert_eq!(ExitCode::from_i32(4), ExitCode::INSTANTIATION);
    }
}
