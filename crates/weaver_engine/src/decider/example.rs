//! Input/output examples and the plain example decider.

use std::fmt;
use std::rc::Rc;

use weaver_dsl::NodeRef;

use crate::error::{EngineError, EngineResult};
use crate::interpreter::{Interpreter, InterpreterError};

use super::{Decider, Outcome};

/// One behavioral example: expected output for given inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Example<V> {
    pub inputs: Vec<V>,
    pub output: V,
}

impl<V> Example<V> {
    pub fn new(inputs: Vec<V>, output: V) -> Example<V> {
        Example { inputs, output }
    }
}

impl<V: fmt::Debug> fmt::Display for Example<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {:?}", self.inputs, self.output)
    }
}

/// Output comparison, user-replaceable to allow approximate matches.
pub type OutputEq<V> = Rc<dyn Fn(&V, &V) -> bool>;

/// Accepts a candidate iff it reproduces every example's output.
///
/// Rejections carry no blame; use
/// [`ExampleConstraintDecider`](super::constraint::ExampleConstraintDecider)
/// when the spec declares constraints worth deducing from.
pub struct ExampleDecider<I: Interpreter> {
    interp: I,
    examples: Vec<Example<I::Value>>,
    equal: OutputEq<I::Value>,
}

impl<I: Interpreter> ExampleDecider<I>
where
    I::Value: PartialEq,
{
    /// Builds a decider comparing outputs with `==`.
    ///
    /// Refuses an empty example list.
    pub fn new(interp: I, examples: Vec<Example<I::Value>>) -> EngineResult<Self> {
        Self::with_equality(interp, examples, Rc::new(|a: &I::Value, b: &I::Value| a == b))
    }
}

impl<I: Interpreter> ExampleDecider<I> {
    /// Builds a decider with a custom output equality.
    pub fn with_equality(
        interp: I,
        examples: Vec<Example<I::Value>>,
        equal: OutputEq<I::Value>,
    ) -> EngineResult<Self> {
        if examples.is_empty() {
            return Err(EngineError::EmptyExamples);
        }
        Ok(ExampleDecider {
            interp,
            examples,
            equal,
        })
    }

    pub fn interpreter(&self) -> &I {
        &self.interp
    }

    pub fn examples(&self) -> &[Example<I::Value>] {
        &self.examples
    }

    pub(crate) fn equal(&self) -> &OutputEq<I::Value> {
        &self.equal
    }

    /// Runs the candidate on every example, returning the failing ones.
    pub fn failed_examples(
        &self,
        prog: &NodeRef,
    ) -> Result<Vec<&Example<I::Value>>, InterpreterError<I::Value>> {
        let mut failed = Vec::new();
        for example in &self.examples {
            let actual = self.interp.eval(prog, &example.inputs)?;
            if !(self.equal)(&actual, &example.output) {
                failed.push(example);
            }
        }
        Ok(failed)
    }

    /// Whether any example fails on the candidate.
    pub fn has_failed_examples(
        &self,
        prog: &NodeRef,
    ) -> Result<bool, InterpreterError<I::Value>> {
        Ok(!self.failed_examples(prog)?.is_empty())
    }
}

impl<I: Interpreter> Decider for ExampleDecider<I> {
    type Value = I::Value;

    fn analyze(&self, prog: &NodeRef) -> Result<Outcome, InterpreterError<I::Value>> {
        if self.has_failed_examples(prog)? {
            Ok(Outcome::Rejected(Vec::new()))
        } else {
            Ok(Outcome::Accepted)
        }
    }
}
