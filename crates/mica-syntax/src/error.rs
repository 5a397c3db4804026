//! Error handling types and utilities for the Mica language toolchain.
//!
//! This module provides the unified error handling system used throughout all
//! Mica components: a structured error type with optional source location,
//! plus convenience functions for error creation and propagation.
//!
//! Definition errors (lexing, parsing, compilation) and execution faults both
//! use this one type; lex and parse errors carry a line/column span, compile
//! and runtime errors name the offending construct or operation in the
//! message.
//!
//! # Examples
//!
//! ```rust
//! use mica_syntax::error::{Error, Result, error};
//!
//! // A plain error, and one with a source location
//! let fault = Error::new("division by zero");
//! let located = Error::with_span("Unexpected token", 10, 5);
//!
//! // The convenience function builds an Err result directly
//! fn might_fail() -> Result<i64> {
//!     error("Operation failed")
//! }
//! ```

use std::fmt;

/// An error that occurred during Mica language processing.
///
/// Represents everything from lexical errors to VM execution faults. Each
/// error includes a descriptive message and optional source location.
#[derive(Debug, Clone)]
pub struct Error {
    /// Human-readable error message
    pub msg: String,

    /// Optional line number in source file (1-based)
    pub line: Option<usize>,

    /// Optional column number in source file (1-based)
    pub col: Option<usize>,
}

impl Error {
    /// Creates a new error without source location information. Suitable for
    /// compile-time definition errors and runtime faults, where no single
    /// source position applies.
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            line: None,
            col: None,
        }
    }

    /// Creates a new error with a source location. Used for lex and parse
    /// errors that can be pinned to a position in the source text.
    pub fn with_span(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            msg: msg.into(),
            line: Some(line),
            col: Some(col),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(c)) = (self.line, self.col) {
            write!(f, "{} at {}:{}", self.msg, l, c)
        } else {
            write!(f, "{}", self.msg)
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::new(s)
    }
}
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::new(s)
    }
}

/// A specialized `Result` type for Mica operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience function to create an error result.
///
/// Shorthand for `Err(Error::new(msg))`.
///
/// # Examples
///
/// ```rust
/// use mica_syntax::error::{Result, error};
///
/// fn validate(depth: usize) -> Result<()> {
///     if depth == 0 {
///         error("stack underflow in Pop")
///     } else {
///         Ok(())
///     }
/// }
/// ```
pub fn error<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::new(msg))
}

/// Convenience function to create an error result with a source location.
///
/// Shorthand for `Err(Error::with_span(msg, line, col))`.
pub fn error_at<T>(line: usize, col: usize, msg: impl Into<String>) -> Result<T> {
    Err(Error::with_span(msg, line, col))
}
