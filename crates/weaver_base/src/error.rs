//! Errors with source locations.
//!
//! The spec-file lexer and parser report failures as a [`SpannedError`]: a
//! message plus the [`Span`] of the offending text. Higher layers either
//! surface these directly or wrap them into their own error taxonomies.
//!
//! # Example
//!
//! ```
//! use weaver_base::{Result, Span, SpannedError};
//!
//! fn expect_digit(s: &str, at: usize) -> Result<u32> {
//!     s[at..]
//!         .chars()
//!         .next()
//!         .and_then(|c| c.to_digit(10))
//!         .ok_or_else(|| SpannedError::new("expected a digit", Span::new(at, at + 1)))
//! }
//!
//! let err = expect_digit("x", 0).unwrap_err();
//! assert!(err.to_string().contains("expected a digit"));
//! ```

use crate::span::Span;
use std::fmt;

/// An error annotated with where in the source it occurred.
///
/// Displays as `{message} at {start}..{end}`.
#[derive(Debug, Clone)]
pub struct SpannedError {
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Source location of the problem.
    pub span: Span,
}

impl SpannedError {
    /// Creates an error with the given message and location.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for SpannedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}..{}",
            self.message, self.span.start, self.span.end
        )
    }
}

impl std::error::Error for SpannedError {}

/// Alias for `std::result::Result<T, SpannedError>`.
pub type Result<T> = std::result::Result<T, SpannedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message_and_span() {
        let err = SpannedError::new("unterminated string", Span::new(12, 20));
        let text = err.to_string();
        assert!(text.contains("unterminated string"));
        assert!(text.contains("12..20"));
    }
}
