//! Exit codes for the sq-core CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-2: Operational outcomes (the JSON payload is still written)
//! - 10-19: User/input errors (recoverable by fixing the input)
//! - 20-29: Internal errors (bugs, should be reported)

use sq_common::Error;

/// Exit codes for sq-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-2)
    // ========================================================================
    /// Success
    Ok = 0,

    /// Search stopped on its time budget; the result may be incomplete
    IncompleteSearch = 1,

    /// Enforcing every unknown constraint leaves no feasible policy
    NoSafePolicy = 2,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Config file missing, malformed, or invalid
    ConfigError = 11,

    /// Problem file malformed or inconsistent
    ProblemError = 12,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (broken invariant - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code is an operational outcome (codes 0-2).
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// Check if this exit code is a user/input error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Ok => "OK",
            ExitCode::IncompleteSearch => "OK_INCOMPLETE",
            ExitCode::NoSafePolicy => "NO_SAFE_POLICY",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::ProblemError => "ERR_PROBLEM",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code for a failed command.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::InvalidArgument { .. } => ExitCode::ArgsError,
            Error::Config(_) | Error::UnknownBackend(_) => ExitCode::ConfigError,
            Error::InvalidProblem(_) => ExitCode::ProblemError,
            Error::NoSafePolicy => ExitCode::NoSafePolicy,
            Error::Io(_) | Error::Json(_) => ExitCode::IoError,
            Error::NegativeEvoi { .. } | Error::Invariant(_) => ExitCode::InternalError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
