//! Enumerator over a prebuilt sequence of programs.
//!
//! Used by tests to drive deciders and the synthesis loop with scripted
//! candidates. Feedback is accepted and ignored.

use weaver_dsl::NodeRef;

use crate::decider::blame::BlameSet;
use crate::error::EngineResult;

use super::Enumerator;

/// Yields programs from any iterator, in order.
pub struct FromIteratorEnumerator<T> {
    iter: T,
}

impl<T: Iterator<Item = NodeRef>> FromIteratorEnumerator<T> {
    pub fn new(iter: T) -> Self {
        FromIteratorEnumerator { iter }
    }
}

/// An enumerator over a fixed list of programs.
pub fn from_list(
    programs: Vec<NodeRef>,
) -> FromIteratorEnumerator<std::vec::IntoIter<NodeRef>> {
    FromIteratorEnumerator::new(programs.into_iter())
}

impl<T: Iterator<Item = NodeRef>> Enumerator for FromIteratorEnumerator<T> {
    fn next_program(&mut self) -> EngineResult<Option<NodeRef>> {
        Ok(self.iter.next())
    }

    fn update(&mut self, _blames: Option<&[BlameSet]>) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_dsl::Builder;
    use weaver_spec::parse;

    #[test]
    fn yields_in_order_then_stays_exhausted() {
        let spec = parse(
            r#"
            value Int;
            program Toy(Int, Int) -> Int;
            func plus: Int -> Int, Int;
            "#,
        )
        .unwrap();
        let b = Builder::new(&spec);
        let p0 = b.from_sexp("(plus (@param 0) (@param 1))").unwrap();
        let p1 = b.from_sexp("(plus (@param 1) (@param 0))").unwrap();

        let mut e = from_list(vec![p0.clone(), p1.clone()]);
        assert!(e.next_program().unwrap().unwrap().deep_eq(&p0));
        e.update(None).unwrap();
        assert!(e.next_program().unwrap().unwrap().deep_eq(&p1));
        assert!(e.next_program().unwrap().is_none());
        assert!(e.next_program().unwrap().is_none());
    }
}
