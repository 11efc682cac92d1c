//! # weaver-engine
//!
//! The synthesis engine: everything between a parsed
//! [`Spec`](weaver_spec::Spec) and a verified program.
//!
//! The moving parts, in the order the synthesis loop exercises them:
//!
//! - [`interpreter`] — the contract a domain implements to execute candidate
//!   programs and compute abstract property values.
//! - [`enumerator`] — candidate generators: the k-tree and line-based SMT
//!   encodings (both backed by Z3), plus a random sampler and an
//!   iterator adapter for tests.
//! - [`decider`] — example checking and deduction: runs the interpreter,
//!   and on failure extracts *blame sets* from an unsat core so the
//!   enumerator can prune whole equivalence classes at once.
//! - [`synthesizer`] — the driver loop tying the two together, with
//!   cooperative cancellation.
//!
//! A single Z3 [`Context`](z3::Context) is created by the caller and lent to
//! the solver-owning enumerators; the deciders build short-lived contexts per
//! query.

pub mod decider;
pub mod enumerator;
pub mod error;
pub mod interpreter;
pub mod synthesizer;

pub use decider::blame::{Blame, BlameSet};
pub use decider::constraint::ExampleConstraintDecider;
pub use decider::example::{Example, ExampleDecider};
pub use decider::pruning::ExampleConstraintPruningDecider;
pub use decider::{Decider, Outcome};
pub use enumerator::ktree::KTreeEnumerator;
pub use enumerator::lines::{LinesEnumerator, SymmetryMode};
pub use enumerator::random::RandomEnumerator;
pub use enumerator::Enumerator;
pub use error::EngineError;
pub use interpreter::{Interpreter, PropValue};
pub use synthesizer::{CancelToken, Synthesizer};
