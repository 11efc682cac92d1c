//! Candidate program generators.
//!
//! The two SMT enumerators are the heart of the search:
//!
//! - [`ktree::KTreeEnumerator`] lays candidates out on a fixed k-ary tree
//!   template and asks Z3 for well-typed labelings, optimized against the
//!   spec's weighted predicates.
//! - [`lines::LinesEnumerator`] lays them out as an SSA-like sequence of
//!   lines referencing earlier lines, with optional symmetry breaking over
//!   line permutations.
//!
//! [`random::RandomEnumerator`] samples well-typed trees for baselines and
//! tests; [`from_iterator::FromIteratorEnumerator`] adapts any iterator of
//! prebuilt programs.

pub mod from_iterator;
pub mod ktree;
pub mod lattice;
pub mod lines;
pub mod optimizer;
pub mod random;

use weaver_dsl::NodeRef;

use crate::decider::blame::BlameSet;
use crate::error::EngineResult;

/// A source of candidate programs that learns from rejection.
///
/// Candidates never repeat across calls to
/// [`next_program`](Self::next_program); every [`update`](Self::update)
/// must strictly shrink the remaining space.
pub trait Enumerator {
    /// The next candidate, or `None` when the space is exhausted.
    ///
    /// Once `None` is returned, every further call returns `None`.
    fn next_program(&mut self) -> EngineResult<Option<NodeRef>>;

    /// Feeds back the decider's verdict on the last candidate.
    ///
    /// `None` blocks just the last returned candidate. `Some(blames)` adds
    /// one disjunctive clause per blame set, pruning every program that
    /// agrees with all of a set's (node, production) assignments.
    fn update(&mut self, blames: Option<&[BlameSet]>) -> EngineResult<()>;
}
