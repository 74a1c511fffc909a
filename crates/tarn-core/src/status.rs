//! Flat status taxonomy reported by every engine operation.
//!
//! Statuses are grouped into families: parse, validation, instantiation,
//! runtime traps, and debug traps. Debug traps are not failures: they mark a
//! suspended call that may be continued.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome code of an engine operation.
///
/// # Examples
///
/// ```
/// use tarn_core::Status;
///
/// assert!(Status::Ok.is_ok());
/// assert!(Status::TrapDivideByZero.is_trap());
/// assert!(Status::DebugTrapBreakpoint.is_debug_trap());
/// assert!(!Status::DebugTrapBreakpoint.is_trap());
/// assert_eq!(Status::FailMissingImport.as_str(), "missing import");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Success.
    Ok,

    /// Malformed binary.
    ParseError,

    /// Operand or signature types disagree.
    ValidationTypeMismatch,
    /// Type index out of range.
    ValidationInvalidType,
    /// Function index out of range.
    ValidationInvalidFunction,
    /// Global index out of range or illegal global access.
    ValidationInvalidGlobal,
    /// Local index out of range.
    ValidationInvalidLocal,
    /// Table index out of range or malformed table.
    ValidationInvalidTable,
    /// Memory index out of range or malformed memory.
    ValidationInvalidMemory,

    /// A caller-supplied argument was rejected.
    FailInvalidArgs,
    /// No binding satisfied an import.
    FailMissingImport,
    /// A binding satisfied an import name but not its type.
    FailImportTypeMismatch,
    /// A linear memory could not be reserved or committed.
    FailMemoryAlloc,
    /// Instantiation failed for a reason without a more specific code.
    FailInstantiate,
    /// The start function does not have type `() -> ()`.
    FailInvalidStart,

    /// `unreachable` executed.
    TrapUnreachable,
    /// An opcode the engine cannot execute.
    TrapInvalidOp,
    /// Integer division or remainder by zero.
    TrapDivideByZero,
    /// Integer overflow in division or float-to-int conversion.
    TrapIntegerOverflow,
    /// NaN converted to an integer.
    TrapInvalidIntegerConversion,
    /// Call depth or value stack limit exceeded.
    TrapStackOverflow,
    /// Linear memory access outside the current size.
    TrapMemoryOutOfBounds,
    /// Table access outside the current size.
    TrapTableOutOfBounds,
    /// Call through a null reference.
    TrapRefNull,
    /// Indirect call target has the wrong type.
    TrapIndirectCallTypeMismatch,
    /// A trap without a more specific code, such as a failing host function.
    TrapUnknown,

    /// Execution reached a breakpoint.
    DebugTrapBreakpoint,
    /// A single step completed.
    DebugTrapStep,
    /// Execution was suspended from outside or ran out of its step budget.
    DebugTrapSuspended,
    /// The interpreter was terminated and cannot continue.
    DebugTrapTerminated,

    /// Failure without any more specific code.
    FailUnknown,
}

impl Status {
    /// Every status, in declaration order.
    pub const ALL: [Self; 31] = [
        Self::Ok,
        Self::ParseError,
        Self::ValidationTypeMismatch,
        Self::ValidationInvalidType,
        Self::ValidationInvalidFunction,
        Self::ValidationInvalidGlobal,
        Self::ValidationInvalidLocal,
        Self::ValidationInvalidTable,
        Self::ValidationInvalidMemory,
        Self::FailInvalidArgs,
        Self::FailMissingImport,
        Self::FailImportTypeMismatch,
        Self::FailMemoryAlloc,
        Self::FailInstantiate,
        Self::FailInvalidStart,
        Self::TrapUnreachable,
        Self::TrapInvalidOp,
        Self::TrapDivideByZero,
        Self::TrapIntegerOverflow,
        Self::TrapInvalidIntegerConversion,
        Self::TrapStackOverflow,
        Self::TrapMemoryOutOfBounds,
        Self::TrapTableOutOfBounds,
        Self::TrapRefNull,
        Self::TrapIndirectCallTypeMismatch,
        Self::TrapUnknown,
        Self::DebugTrapBreakpoint,
        Self::DebugTrapStep,
        Self::DebugTrapSuspended,
        Self::DebugTrapTerminated,
        Self::FailUnknown,
    ];

    /// Returns `true` only for [`Status::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns `true` for every status that ends an operation unsuccessfully.
    ///
    /// Debug traps are resumable stops, not failures.
    #[must_use]
    pub const fn is_fail(self) -> bool {
        !self.is_ok() && !self.is_debug_trap()
    }

    /// Returns `true` for [`Status::ParseError`].
    #[must_use]
    pub const fn is_parse_error(self) -> bool {
        matches!(self, Self::ParseError)
    }

    /// Returns `true` for any validation status.
    #[must_use]
    pub const fn is_validation_error(self) -> bool {
        matches!(
            self,
            Self::ValidationTypeMismatch
                | Self::ValidationInvalidType
                | Self::ValidationInvalidFunction
                | Self::ValidationInvalidGlobal
                | Self::ValidationInvalidLocal
                | Self::ValidationInvalidTable
                | Self::ValidationInvalidMemory
        )
    }

    /// Returns `true` for linking and instantiation failures.
    #[must_use]
    pub const fn is_instantiation_error(self) -> bool {
        matches!(
            self,
            Self::FailInvalidArgs
                | Self::FailMissingImport
                | Self::FailImportTypeMismatch
                | Self::FailMemoryAlloc
                | Self::FailInstantiate
                | Self::FailInvalidStart
        )
    }

    /// Returns `true` for runtime traps.
    #[must_use]
    pub const fn is_trap(self) -> bool {
        matches!(
            self,
            Self::TrapUnreachable
                | Self::TrapInvalidOp
                | Self::TrapDivideByZero
                | Self::TrapIntegerOverflow
                | Self::TrapInvalidIntegerConversion
                | Self::TrapStackOverflow
                | Self::TrapMemoryOutOfBounds
                | Self::TrapTableOutOfBounds
                | Self::TrapRefNull
                | Self::TrapIndirectCallTypeMismatch
                | Self::TrapUnknown
        )
    }

    /// Returns `true` for debug traps, which suspend rather than fail.
    #[must_use]
    pub const fn is_debug_trap(self) -> bool {
        matches!(
            self,
            Self::DebugTrapBreakpoint
                | Self::DebugTrapStep
                | Self::DebugTrapSuspended
                | Self::DebugTrapTerminated
        )
    }

    /// Human-readable description.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ParseError => "parse error",
            Self::ValidationTypeMismatch => "type mismatch",
            Self::ValidationInvalidType => "invalid type index",
            Self::ValidationInvalidFunction => "invalid function index",
            Self::ValidationInvalidGlobal => "invalid global",
            Self::ValidationInvalidLocal => "invalid local index",
            Self::ValidationInvalidTable => "invalid table",
            Self::ValidationInvalidMemory => "invalid memory",
            Self::FailInvalidArgs => "invalid arguments",
            Self::FailMissingImport => "missing import",
            Self::FailImportTypeMismatch => "import type mismatch",
            Self::FailMemoryAlloc => "memory allocation failed",
            Self::FailInstantiate => "instantiation failed",
            Self::FailInvalidStart => "start function must have type () -> ()",
            Self::TrapUnreachable => "unreachable executed",
            Self::TrapInvalidOp => "invalid opcode",
            Self::TrapDivideByZero => "integer divide by zero",
            Self::TrapIntegerOverflow => "integer overflow",
            Self::TrapInvalidIntegerConversion => "invalid conversion to integer",
            Self::TrapStackOverflow => "call stack exhausted",
            Self::TrapMemoryOutOfBounds => "out of bounds memory access",
            Self::TrapTableOutOfBounds => "out of bounds table access",
            Self::TrapRefNull => "null reference",
            Self::TrapIndirectCallTypeMismatch => "indirect call type mismatch",
            Self::TrapUnknown => "unknown trap",
            Self::DebugTrapBreakpoint => "breakpoint",
            Self::DebugTrapStep => "step",
            Self::DebugTrapSuspended => "suspended",
            Self::DebugTrapTerminated => "terminated",
            Self::FailUnknown => "unknown failure",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
