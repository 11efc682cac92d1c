//! The synthesis loop.
//!
//! Asks the enumerator for a candidate, asks the decider to judge it, and
//! feeds the verdict back:
//!
//! - accepted: done, return the program;
//! - rejected with blame: push the blame sets;
//! - rejected without blame: block just that candidate;
//! - assertion violation: convert to blame through the decider, then as
//!   above;
//! - any other interpreter failure: abort synthesis with an error.
//!
//! The loop is sequential and single-threaded; a [`CancelToken`] lets
//! another thread request a graceful stop, checked once per iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use weaver_dsl::NodeRef;

use crate::decider::{Decider, Outcome};
use crate::enumerator::Enumerator;
use crate::error::{EngineError, EngineResult};
use crate::interpreter::InterpreterError;

/// Cooperative cancellation flag, cloneable across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Requests the loop to stop before its next iteration.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Drives one enumerator against one decider until acceptance or
/// exhaustion.
pub struct Synthesizer<E, D> {
    enumerator: E,
    decider: D,
    cancel: CancelToken,
}

impl<E, D> Synthesizer<E, D>
where
    E: Enumerator,
    D: Decider,
{
    pub fn new(enumerator: E, decider: D) -> Self {
        Synthesizer {
            enumerator,
            decider,
            cancel: CancelToken::new(),
        }
    }

    /// A token that interrupts [`synthesize`](Self::synthesize) from
    /// outside; on cancellation the loop returns `None`.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn enumerator(&mut self) -> &mut E {
        &mut self.enumerator
    }

    pub fn decider(&self) -> &D {
        &self.decider
    }

    /// Runs the loop to completion.
    ///
    /// Returns the first accepted program, or `None` when the enumerator is
    /// exhausted or the loop was cancelled.
    pub fn synthesize(&mut self) -> EngineResult<Option<NodeRef>> {
        let mut attempts: u64 = 0;
        loop {
            if self.cancel.is_cancelled() {
                log::debug!("synthesis cancelled after {} attempts", attempts);
                return Ok(None);
            }
            let Some(prog) = self.enumerator.next_program()? else {
                log::debug!("enumerator exhausted after {} attempts", attempts);
                return Ok(None);
            };
            attempts += 1;
            if attempts % 100 == 0 {
                log::debug!("attempts: {}", attempts);
            }

            match self.decider.analyze(&prog) {
                Ok(Outcome::Accepted) => {
                    log::debug!("program accepted after {} attempts", attempts);
                    return Ok(Some(prog));
                }
                Ok(Outcome::Rejected(blames)) => {
                    if blames.is_empty() {
                        self.enumerator.update(None)?;
                    } else {
                        self.enumerator.update(Some(&blames))?;
                    }
                }
                Err(error @ InterpreterError::Assertion(_)) => {
                    match self.decider.explain_error(&error) {
                        Some(blames) if !blames.is_empty() => {
                            self.enumerator.update(Some(&blames))?;
                        }
                        _ => self.enumerator.update(None)?,
                    }
                }
                Err(InterpreterError::General(message)) => {
                    return Err(EngineError::Interpreter(message));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decider::example::{Example, ExampleDecider};
    use crate::enumerator::from_iterator::from_list;
    use crate::interpreter::{EvalResult, Interpreter, PropValue};
    use weaver_dsl::Builder;
    use weaver_spec::{parse, Spec, TypeRef};

    fn toy() -> Spec {
        parse(
            r#"
            value Int;
            program Toy(Int, Int) -> Int;
            func plus: Int -> Int, Int;
            func mult: Int -> Int, Int;
            "#,
        )
        .unwrap()
    }

    struct Arith;

    impl Interpreter for Arith {
        type Value = i64;

        fn eval_atom(&self, _ty: &TypeRef, literal: &str) -> EvalResult<i64, i64> {
            literal
                .parse()
                .map_err(|_| crate::interpreter::InterpreterError::general("bad literal"))
        }

        fn eval_apply(
            &self,
            _node: &weaver_dsl::NodeRef,
            name: &str,
            args: &[i64],
        ) -> EvalResult<i64, i64> {
            match name {
                "plus" => Ok(args[0] + args[1]),
                "mult" => Ok(args[0] * args[1]),
                other => Err(crate::interpreter::InterpreterError::general(format!(
                    "no eval for '{}'",
                    other
                ))),
            }
        }

        fn apply_property(&self, property: &str, _value: &i64) -> EvalResult<PropValue, i64> {
            Err(crate::interpreter::InterpreterError::general(format!(
                "no property '{}'",
                property
            )))
        }
    }

    #[test]
    fn accepts_the_first_passing_candidate() {
        let spec = toy();
        let b = Builder::new(&spec);
        let wrong = b.from_sexp("(mult (@param 0) (@param 1))").unwrap();
        let right = b.from_sexp("(plus (@param 0) (@param 1))").unwrap();

        let decider =
            ExampleDecider::new(Arith, vec![Example::new(vec![2, 3], 5)]).unwrap();
        let mut synth = Synthesizer::new(from_list(vec![wrong, right.clone()]), decider);
        let found = synth.synthesize().unwrap().expect("a program");
        assert!(found.deep_eq(&right));
    }

    #[test]
    fn exhaustion_returns_none() {
        let spec = toy();
        let b = Builder::new(&spec);
        let wrong = b.from_sexp("(mult (@param 0) (@param 1))").unwrap();

        let decider =
            ExampleDecider::new(Arith, vec![Example::new(vec![2, 3], 5)]).unwrap();
        let mut synth = Synthesizer::new(from_list(vec![wrong]), decider);
        assert!(synth.synthesize().unwrap().is_none());
    }

    #[test]
    fn cancellation_stops_the_loop() {
        let spec = toy();
        let b = Builder::new(&spec);
        let right = b.from_sexp("(plus (@param 0) (@param 1))").unwrap();

        let decider =
            ExampleDecider::new(Arith, vec![Example::new(vec![2, 3], 5)]).unwrap();
        let mut synth = Synthesizer::new(from_list(vec![right]), decider);
        synth.cancel_token().cancel();
        assert!(synth.synthesize().unwrap().is_none());
    }
}
