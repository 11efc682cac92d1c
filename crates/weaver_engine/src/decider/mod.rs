//! Deciders: accept a candidate, or reject it with an explanation.
//!
//! Three implementations, in increasing deductive power:
//!
//! - [`ExampleDecider`](example::ExampleDecider) runs the interpreter on
//!   every example and compares outputs; rejection carries no blame.
//! - [`ExampleConstraintDecider`](constraint::ExampleConstraintDecider)
//!   additionally aligns the candidate's abstract semantics with a failing
//!   example symbolically; an unsat core becomes blame sets, expanded
//!   through the constraint-implication map.
//! - [`ExampleConstraintPruningDecider`](pruning::ExampleConstraintPruningDecider)
//!   interleaves concrete evaluation with the symbolic context and aborts
//!   mid-tree as soon as the context becomes unsatisfiable.

pub mod assert_violation;
pub mod blame;
pub mod constraint;
pub mod encoder;
pub mod eval_expr;
pub mod example;
pub mod pruning;

use std::fmt;

use weaver_dsl::NodeRef;

use crate::interpreter::InterpreterError;
use blame::BlameSet;

/// The verdict on one candidate program.
#[derive(Debug)]
pub enum Outcome {
    /// The candidate satisfies every example.
    Accepted,
    /// The candidate fails; the blame sets (possibly empty) are disjunctive
    /// clauses for the enumerator.
    Rejected(Vec<BlameSet>),
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    /// The blame sets of a rejection; empty for acceptance as well as for
    /// rejections with no abstract explanation.
    pub fn blames(&self) -> &[BlameSet] {
        match self {
            Outcome::Accepted => &[],
            Outcome::Rejected(blames) => blames,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Accepted => write!(f, "accepted"),
            Outcome::Rejected(blames) => write!(f, "rejected ({} blame sets)", blames.len()),
        }
    }
}

/// Analyzes candidate programs against a specification of intent.
pub trait Decider {
    /// The interpreter's runtime value type.
    type Value: Clone + fmt::Debug;

    /// Checks the candidate; `Err` carries interpreter failures, which the
    /// synthesis loop routes through [`explain_error`](Self::explain_error).
    fn analyze(&self, prog: &NodeRef) -> Result<Outcome, InterpreterError<Self::Value>>;

    /// Turns a recoverable interpreter error into blame sets, if this
    /// decider knows how.
    fn explain_error(&self, error: &InterpreterError<Self::Value>) -> Option<Vec<BlameSet>> {
        let _ = error;
        None
    }
}
