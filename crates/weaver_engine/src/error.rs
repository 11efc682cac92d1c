//! Engine-level errors.
//!
//! Everything the enumerators, deciders, and the synthesis loop can fail
//! with, other than the per-candidate interpreter errors of
//! [`interpreter::InterpreterError`](crate::interpreter::InterpreterError)
//! (those have their own recovery path through blame analysis).

use std::fmt;

use weaver_dsl::DslError;
use weaver_spec::SpecError;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A failure in the enumerators, deciders, or the synthesis loop.
#[derive(Debug)]
pub enum EngineError {
    /// A decider was constructed with no examples.
    EmptyExamples,

    /// A depth or loc bound was zero.
    InvalidBound { what: &'static str, value: usize },

    /// A spec lookup failed while encoding or decoding.
    Spec(SpecError),

    /// AST construction failed while decoding a model.
    Dsl(DslError),

    /// A recognized predicate had missing or wrongly-typed arguments.
    BadPredicate { predicate: String, reason: String },

    /// Generation ran out of productions for a type before reaching a leaf.
    ExhaustedProductions { ty: String, depth: usize },

    /// A constraint expression could not be encoded into the solver theory.
    Encoding(String),

    /// A blame set referenced a node that is not part of the current
    /// candidate.
    BlameOutsideCandidate,

    /// `update` was asked to block a model before any model existed.
    NoActiveModel,

    /// The interpreter failed in a way synthesis cannot recover from.
    Interpreter(String),

    /// The lattice cache file could not be read or written.
    LatticeIo(std::io::Error),

    /// A lattice cache line did not match the expected format.
    LatticeFormat { line: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::EmptyExamples => {
                write!(f, "cannot build a decider from an empty example list")
            }
            EngineError::InvalidBound { what, value } => {
                write!(f, "{} cannot be {}", what, value)
            }
            EngineError::Spec(err) => write!(f, "{}", err),
            EngineError::Dsl(err) => write!(f, "{}", err),
            EngineError::BadPredicate { predicate, reason } => {
                write!(f, "failed to resolve predicate {}: {}", predicate, reason)
            }
            EngineError::ExhaustedProductions { ty, depth } => write!(
                f,
                "ran out of productions for type {} at depth {}",
                ty, depth
            ),
            EngineError::Encoding(msg) => write!(f, "constraint encoding error: {}", msg),
            EngineError::BlameOutsideCandidate => {
                write!(f, "blame references a node outside the current candidate")
            }
            EngineError::NoActiveModel => {
                write!(f, "no model to block; call next() first")
            }
            EngineError::Interpreter(msg) => write!(f, "interpreter error: {}", msg),
            EngineError::LatticeIo(err) => write!(f, "lattice cache i/o error: {}", err),
            EngineError::LatticeFormat { line } => {
                write!(f, "malformed lattice cache line: {}", line)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<SpecError> for EngineError {
    fn from(err: SpecError) -> Self {
        EngineError::Spec(err)
    }
}

impl From<DslError> for EngineError {
    fn from(err: DslError) -> Self {
        EngineError::Dsl(err)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::LatticeIo(err)
    }
}
