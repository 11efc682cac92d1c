//! AST construction and lookup errors.

use std::fmt;

use weaver_spec::SpecError;

/// Result alias for DSL operations.
pub type DslResult<T> = Result<T, DslError>;

/// A failure while building or querying an AST.
#[derive(Debug, Clone)]
pub enum DslError {
    /// A node was built from the wrong production kind, e.g. an atom from a
    /// function production.
    WrongProductionKind {
        expected: &'static str,
        production: String,
    },

    /// An apply node was built with the wrong number of children.
    ArityMismatch { expected: usize, found: usize },

    /// An apply child's type did not match the production's rhs.
    ArgTypeMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    /// A spec lookup failed while resolving a production.
    Spec(SpecError),

    /// An s-expression could not be parsed or did not describe a node.
    Sexp(String),

    /// A node was queried in an indexer that never saw it.
    NodeNotIndexed,

    /// An id was queried in an indexer that never assigned it.
    IdNotAssigned { id: usize },

    /// A node has no parent in the indexed program.
    NoParent,
}

impl fmt::Display for DslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DslError::WrongProductionKind {
                expected,
                production,
            } => write!(
                f,
                "cannot build {} node from production: {}",
                expected, production
            ),
            DslError::ArityMismatch { expected, found } => write!(
                f,
                "argument count mismatch: expected {} but found {}",
                expected, found
            ),
            DslError::ArgTypeMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "argument {} type mismatch: expected {} but found {}",
                index, expected, found
            ),
            DslError::Spec(err) => write!(f, "{}", err),
            DslError::Sexp(msg) => write!(f, "s-expression error: {}", msg),
            DslError::NodeNotIndexed => write!(f, "node is not part of the indexed program"),
            DslError::IdNotAssigned { id } => write!(f, "node id is not assigned: {}", id),
            DslError::NoParent => write!(f, "node has no parent"),
        }
    }
}

impl std::error::Error for DslError {}

impl From<SpecError> for DslError {
    fn from(err: SpecError) -> Self {
        DslError::Spec(err)
    }
}
