//! # weaver-base
//!
//! Structural atoms shared by every weaver crate:
//!
//! - [`Span`] — byte-offset source location tracking
//! - [`SpannedError`]/[`Result`] — errors that point at source text
//!
//! This crate knows nothing about grammars, programs, or solvers. It exists
//! so that the spec-file front end and its consumers can agree on how source
//! locations are represented without depending on each other.

pub mod error;
pub mod span;

pub use error::{Result, SpannedError};
pub use span::Span;
