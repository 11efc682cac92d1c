//! Interpreter error kinds.
//!
//! Two kinds with very different fates (see the synthesis loop): a
//! *general* error aborts synthesis, while an *assertion violation* is
//! handed to the blame machinery and enumeration continues.

use std::fmt;
use std::rc::Rc;

use weaver_dsl::NodeRef;

/// A dynamic argument-precondition failure raised by
/// [`assert_arg`](crate::interpreter::assert_arg).
pub struct AssertionViolation<V> {
    node: NodeRef,
    index: usize,
    reason: Rc<dyn Fn(&V) -> bool>,
    captures: Vec<usize>,
}

impl<V> AssertionViolation<V> {
    pub(crate) fn new<F>(node: NodeRef, index: usize, reason: F, captures: Vec<usize>) -> Self
    where
        F: Fn(&V) -> bool + 'static,
    {
        AssertionViolation {
            node,
            index,
            reason: Rc::new(reason),
            captures,
        }
    }

    /// The apply node whose argument failed.
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// The failing argument's position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The failing argument node itself.
    pub fn arg(&self) -> &NodeRef {
        &self.node.children()[self.index]
    }

    /// Indices of other arguments the predicate reads.
    pub fn captures(&self) -> &[usize] {
        &self.captures
    }

    /// Re-checks the predicate against another value.
    pub fn holds_for(&self, value: &V) -> bool {
        (self.reason)(value)
    }
}

impl<V> Clone for AssertionViolation<V> {
    fn clone(&self) -> Self {
        AssertionViolation {
            node: self.node.clone(),
            index: self.index,
            reason: self.reason.clone(),
            captures: self.captures.clone(),
        }
    }
}

impl<V> fmt::Debug for AssertionViolation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionViolation")
            .field("node", &self.node.to_string())
            .field("index", &self.index)
            .field("captures", &self.captures)
            .finish()
    }
}

/// An error raised while evaluating a candidate program.
pub enum InterpreterError<V> {
    /// Unrecoverable: missing eval method, input index out of bounds,
    /// unsupported operation. Surfaces out of the synthesis loop.
    General(String),
    /// Recoverable: a guarded argument precondition failed. The
    /// assertion-violation handler converts this into blame sets.
    Assertion(AssertionViolation<V>),
}

impl<V> InterpreterError<V> {
    pub fn general(message: impl Into<String>) -> Self {
        InterpreterError::General(message.into())
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, InterpreterError::Assertion(_))
    }
}

impl<V> Clone for InterpreterError<V> {
    fn clone(&self) -> Self {
        match self {
            InterpreterError::General(msg) => InterpreterError::General(msg.clone()),
            InterpreterError::Assertion(v) => InterpreterError::Assertion(v.clone()),
        }
    }
}

impl<V> fmt::Debug for InterpreterError<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterError::General(msg) => write!(f, "General({:?})", msg),
            InterpreterError::Assertion(v) => f
                .debug_struct("Assertion")
                .field("node", &v.node.to_string())
                .field("index", &v.index)
                .field("captures", &v.captures)
                .finish(),
        }
    }
}

impl<V> fmt::Display for InterpreterError<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterError::General(msg) => write!(f, "{}", msg),
            InterpreterError::Assertion(v) => write!(
                f,
                "assertion violated on argument {} of {}",
                v.index, v.node
            ),
        }
    }
}

impl<V> std::error::Error for InterpreterError<V> {}
