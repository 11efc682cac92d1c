//! Random top-down sampling of well-typed programs.
//!
//! At each hole, one production with the required lhs is drawn uniformly;
//! at the depth limit, only leaf productions remain eligible. Sampled
//! programs are deduplicated by deep hash so the enumerator never yields
//! the same candidate twice; after too many consecutive duplicates it
//! reports exhaustion.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use weaver_dsl::{Builder, NodeRef};
use weaver_spec::{ProdRef, Spec, TypeRef};

use crate::decider::blame::BlameSet;
use crate::error::{EngineError, EngineResult};

use super::Enumerator;

const MAX_DRAWS_PER_CALL: usize = 10_000;

/// Uniform sampler over programs of bounded depth.
pub struct RandomEnumerator<'s> {
    spec: &'s Spec,
    rng: StdRng,
    max_depth: usize,
    seen: HashSet<u64>,
}

impl<'s> RandomEnumerator<'s> {
    /// `max_depth` bounds the tree height; sampling is forced onto leaf
    /// productions at the last level.
    pub fn new(spec: &'s Spec, max_depth: usize, seed: Option<u64>) -> EngineResult<Self> {
        if max_depth == 0 {
            return Err(EngineError::InvalidBound {
                what: "max depth",
                value: 0,
            });
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(RandomEnumerator {
            spec,
            rng,
            max_depth,
            seen: HashSet::new(),
        })
    }

    fn generate(&mut self, ty: &TypeRef, depth: usize) -> EngineResult<NodeRef> {
        let force_leaf = depth + 1 >= self.max_depth;
        let candidates: Vec<ProdRef> = self
            .spec
            .productions_with_lhs(ty.name())
            .iter()
            .filter(|p| !(force_leaf && p.is_function()))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(EngineError::ExhaustedProductions {
                ty: ty.name().to_string(),
                depth,
            });
        }
        let prod = &candidates[self.rng.gen_range(0..candidates.len())];
        let builder = Builder::new(self.spec);
        if !prod.is_function() {
            return Ok(builder.make_node(prod.id(), Vec::new())?);
        }
        let mut children = Vec::with_capacity(prod.arity());
        for child_ty in prod.rhs() {
            children.push(self.generate(child_ty, depth + 1)?);
        }
        Ok(builder.make_node(prod.id(), children)?)
    }
}

impl<'s> Enumerator for RandomEnumerator<'s> {
    fn next_program(&mut self) -> EngineResult<Option<NodeRef>> {
        let output = self.spec.output().clone();
        for _ in 0..MAX_DRAWS_PER_CALL {
            let prog = self.generate(&output, 0)?;
            if self.seen.insert(prog.deep_hash()) {
                return Ok(Some(prog));
            }
        }
        log::debug!(
            "random enumerator drew {} duplicates in a row; giving up",
            MAX_DRAWS_PER_CALL
        );
        Ok(None)
    }

    fn update(&mut self, _blames: Option<&[BlameSet]>) -> EngineResult<()> {
        Ok(())
    }
}
