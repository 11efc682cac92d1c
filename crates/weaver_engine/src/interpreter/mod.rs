//! The contract between the engine and a domain's concrete semantics.
//!
//! A domain implements [`Interpreter`] once per DSL: how enum literals
//! become runtime values, how each function application evaluates, and how
//! each declared property observes a value. The engine never inspects
//! runtime values itself; it only moves them between these three methods.
//!
//! The provided [`eval`](Interpreter::eval) walks a program post-order,
//! resolving params against the input vector. Inside
//! [`eval_apply`](Interpreter::eval_apply), implementations guard argument
//! preconditions with [`assert_arg`]; a failed guard surfaces as an
//! [`AssertionViolation`] that the decider turns into blame instead of an
//! opaque crash.
//!
//! # Example
//!
//! ```
//! use weaver_dsl::NodeRef;
//! use weaver_engine::interpreter::{assert_arg, EvalResult, Interpreter, PropValue};
//! use weaver_spec::TypeRef;
//!
//! struct Arith;
//!
//! impl Interpreter for Arith {
//!     type Value = i64;
//!
//!     fn eval_atom(&self, _ty: &TypeRef, literal: &str) -> EvalResult<i64, i64> {
//!         literal.parse().map_err(|_| {
//!             weaver_engine::interpreter::InterpreterError::general(
//!                 format!("bad literal '{}'", literal),
//!             )
//!         })
//!     }
//!
//!     fn eval_apply(&self, node: &NodeRef, name: &str, args: &[i64]) -> EvalResult<i64, i64> {
//!         match name {
//!             "plus" => Ok(args[0] + args[1]),
//!             "sqrt" => {
//!                 assert_arg(node, args, 0, |x: &i64| *x >= 0, &[])?;
//!                 Ok((args[0] as f64).sqrt() as i64)
//!             }
//!             other => Err(weaver_engine::interpreter::InterpreterError::general(
//!                 format!("no eval for '{}'", other),
//!             )),
//!         }
//!     }
//!
//!     fn apply_property(&self, property: &str, value: &i64) -> EvalResult<PropValue, i64> {
//!         match property {
//!             "pos" => Ok(PropValue::Bool(*value > 0)),
//!             other => Err(weaver_engine::interpreter::InterpreterError::general(
//!                 format!("no property '{}'", other),
//!             )),
//!         }
//!     }
//! }
//! ```

pub mod error;
pub mod post_order;

use std::fmt;

use weaver_dsl::NodeRef;
use weaver_spec::{Sort, TypeRef};

pub use error::{AssertionViolation, InterpreterError};

/// The result of observing a runtime value through a declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
}

impl PropValue {
    pub fn sort(&self) -> Sort {
        match self {
            PropValue::Bool(_) => Sort::Bool,
            PropValue::Int(_) => Sort::Int,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Bool(b) => write!(f, "{}", b),
            PropValue::Int(n) => write!(f, "{}", n),
        }
    }
}

/// Result alias for interpreter callbacks: `V` is the interpreter's runtime
/// value type, which the error type also carries (assertion violations hold
/// a re-checkable predicate over it).
pub type EvalResult<T, V> = Result<T, InterpreterError<V>>;

/// Concrete semantics for one DSL.
///
/// All three required methods are total modulo [`InterpreterError`]: a
/// missing case (unknown function name, unknown property) must be reported
/// as a general error, which is fatal to synthesis.
pub trait Interpreter {
    /// The domain's runtime value: an integer, a table, a list, ...
    type Value: Clone + fmt::Debug;

    /// Evaluates an enum literal of type `ty` to a runtime value.
    fn eval_atom(&self, ty: &TypeRef, literal: &str) -> EvalResult<Self::Value, Self::Value>;

    /// Evaluates one function application over already-evaluated arguments.
    ///
    /// `node` is the apply node being evaluated, passed through so argument
    /// guards can attach blame to the right position via [`assert_arg`].
    fn eval_apply(
        &self,
        node: &NodeRef,
        name: &str,
        args: &[Self::Value],
    ) -> EvalResult<Self::Value, Self::Value>;

    /// Computes a declared abstract property of a runtime value.
    fn apply_property(
        &self,
        property: &str,
        value: &Self::Value,
    ) -> EvalResult<PropValue, Self::Value>;

    /// Evaluates a whole program on concrete inputs, post-order.
    fn eval(&self, prog: &NodeRef, inputs: &[Self::Value]) -> EvalResult<Self::Value, Self::Value> {
        post_order::eval(self, prog, inputs)
    }
}

/// Checks the `index`-th argument of `node` against `cond`.
///
/// On failure, returns an [`AssertionViolation`] carrying the node, the
/// failing argument index, the predicate itself (so the blame handler can
/// re-check alternative values), and the indices of any other arguments the
/// predicate captured.
pub fn assert_arg<V, F>(
    node: &NodeRef,
    args: &[V],
    index: usize,
    cond: F,
    captures: &[usize],
) -> Result<(), InterpreterError<V>>
where
    V: Clone,
    F: Fn(&V) -> bool + 'static,
{
    if node.is_leaf() {
        return Err(InterpreterError::general(
            "assert_arg cannot be used on a leaf node",
        ));
    }
    let arg = args.get(index).ok_or_else(|| {
        InterpreterError::general(format!(
            "assert_arg index {} out of bounds ({} arguments)",
            index,
            args.len()
        ))
    })?;
    if cond(arg) {
        Ok(())
    } else {
        Err(InterpreterError::Assertion(AssertionViolation::new(
            node.clone(),
            index,
            cond,
            captures.to_vec(),
        )))
    }
}
