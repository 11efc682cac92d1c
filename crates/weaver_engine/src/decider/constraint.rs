//! The constraint decider: examples plus deduction.
//!
//! When a candidate fails an example concretely, this decider rebuilds the
//! candidate symbolically: one solver variable per (node, property), node
//! properties pinned to concrete observations at the inputs and at the
//! expected output, and every function constraint asserted under a tracking
//! literal. If that system is unsatisfiable the candidate could never have
//! worked on this example no matter what the unconstrained parts compute,
//! and the unsat core names the productions to blame.
//!
//! Blame is then widened through the *implication map*, computed once at
//! construction: production `q` appears in the map entry of `(p, c)` when
//! one of `q`'s constraints implies `c` under the pure bool/int theory, so
//! any blame triggered by `c` at a node also rules out relabelling that
//! node with `q`.

use std::collections::{BTreeMap, HashMap, HashSet};

use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Config, Context, SatResult, Solver};

use weaver_dsl::{bfs, Ast as AstNode, NodeIndexer, NodeRef};
use weaver_spec::{Expr, ProdRef, Sort, Spec, TypeRef};

use crate::error::{EngineError, EngineResult};
use crate::interpreter::{Interpreter, InterpreterError, PropValue};

use super::assert_violation::AssertionViolationHandler;
use super::blame::{Blame, BlameSet};
use super::encoder::ConstraintEncoder;
use super::example::{Example, ExampleDecider, OutputEq};
use super::{Decider, Outcome};

/// `(production id, constraint index)` to the productions whose constraint
/// sets are at least as strong.
pub(crate) type ImplyMap = HashMap<(usize, usize), Vec<ProdRef>>;

pub(crate) fn fresh_context() -> Context {
    let mut cfg = Config::new();
    cfg.set_param_value("timeout", "10000");
    Context::new(&cfg)
}

/// The solver variable standing for `name(node)`.
fn property_var<'ctx>(
    ctx: &'ctx Context,
    node_id: usize,
    name: &str,
    sort: Sort,
) -> Dynamic<'ctx> {
    let var_name = format!("{}_n{}", name, node_id);
    match sort {
        Sort::Int => Dynamic::from_ast(&Int::new_const(ctx, var_name.as_str())),
        _ => Dynamic::from_ast(&Bool::new_const(ctx, var_name.as_str())),
    }
}

fn assert_concrete<'ctx>(
    solver: &Solver<'ctx>,
    ctx: &'ctx Context,
    var: &Dynamic<'ctx>,
    value: PropValue,
) -> EngineResult<()> {
    let clause = match value {
        PropValue::Int(n) => {
            let v = var
                .as_int()
                .ok_or_else(|| EngineError::Encoding("int property var expected".into()))?;
            v._eq(&Int::from_i64(ctx, n))
        }
        PropValue::Bool(b) => {
            let v = var
                .as_bool()
                .ok_or_else(|| EngineError::Encoding("bool property var expected".into()))?;
            v._eq(&Bool::from_bool(ctx, b))
        }
    };
    solver.assert(&clause);
    Ok(())
}

/// Builds the symbolic over-approximation of one candidate on one example.
pub(crate) struct AlignmentEncoder<'ctx> {
    ctx: &'ctx Context,
    pub(crate) solver: Solver<'ctx>,
    trackers: Vec<(Bool<'ctx>, NodeRef, usize)>,
}

impl<'ctx> AlignmentEncoder<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context) -> Self {
        AlignmentEncoder {
            ctx,
            solver: Solver::new(ctx),
            trackers: Vec::new(),
        }
    }

    pub(crate) fn node_property_var(
        &self,
        indexer: &NodeIndexer,
        node: &NodeRef,
        name: &str,
        sort: Sort,
    ) -> Dynamic<'ctx> {
        let node_id = indexer.get_id(node).unwrap_or(usize::MAX);
        property_var(self.ctx, node_id, name, sort)
    }

    /// Pins every declared property of `node` to its concrete observation
    /// on `value`.
    fn align_concrete<I: Interpreter>(
        &self,
        interp: &I,
        indexer: &NodeIndexer,
        node: &NodeRef,
        ty: &TypeRef,
        value: &I::Value,
    ) -> Result<(), InterpreterError<I::Value>> {
        for prop in ty.properties() {
            let observed = interp.apply_property(&prop.name, value)?;
            if observed.sort() != prop.sort {
                return Err(InterpreterError::general(format!(
                    "property '{}' returned {} but is declared {}",
                    prop.name,
                    observed.sort(),
                    prop.sort
                )));
            }
            let var = self.node_property_var(indexer, node, &prop.name, prop.sort);
            assert_concrete(&self.solver, self.ctx, &var, observed)
                .map_err(|e| InterpreterError::general(e.to_string()))?;
        }
        Ok(())
    }

    /// Pins a property variable to a freshly observed concrete value.
    pub(crate) fn assert_observed(
        &self,
        var: &Dynamic<'ctx>,
        value: PropValue,
    ) -> EngineResult<()> {
        assert_concrete(&self.solver, self.ctx, var, value)
    }

    /// Asserts every constraint of an apply node under a tracking literal.
    fn track_apply(&mut self, indexer: &NodeIndexer, node: &NodeRef) -> EngineResult<()> {
        let constraints = node.production().constraints();
        if constraints.is_empty() {
            return Ok(());
        }
        let node_id = indexer.get_id_or_raise(node)?;
        for (cidx, constraint) in constraints.iter().enumerate() {
            let clause = self.encode_constraint(indexer, node, constraint)?;
            let tag = Bool::new_const(self.ctx, format!("n{}_c{}", node_id, cidx));
            self.solver.assert_and_track(&clause, &tag);
            self.trackers.push((tag, node.clone(), cidx));
        }
        Ok(())
    }

    pub(crate) fn encode_constraint(
        &self,
        indexer: &NodeIndexer,
        node: &NodeRef,
        constraint: &Expr,
    ) -> EngineResult<Bool<'ctx>> {
        let ctx = self.ctx;
        let mut encoder = ConstraintEncoder::new(ctx, |name, sort, slot| {
            let target = if slot == 0 {
                node
            } else {
                &node.children()[slot - 1]
            };
            self.node_property_var(indexer, target, name, sort)
        });
        encoder.encode_bool(constraint)
    }

    /// Encodes the whole candidate against one example: output and input
    /// alignment plus every apply constraint.
    pub(crate) fn encode_candidate<I: Interpreter>(
        &mut self,
        interp: &I,
        indexer: &NodeIndexer,
        prog: &NodeRef,
        example: &Example<I::Value>,
    ) -> Result<(), InterpreterError<I::Value>> {
        self.align_concrete(interp, indexer, prog, prog.ty(), &example.output)?;
        for node in bfs(prog) {
            match node.as_ref() {
                AstNode::Param { .. } => {
                    let index = node.index().unwrap_or_default();
                    let value = example.inputs.get(index).ok_or_else(|| {
                        InterpreterError::general(format!(
                            "example has {} inputs but the candidate reads @param{}",
                            example.inputs.len(),
                            index
                        ))
                    })?;
                    self.align_concrete(interp, indexer, &node, node.ty(), value)?;
                }
                AstNode::Apply { .. } => {
                    self.track_apply(indexer, &node)
                        .map_err(|e| InterpreterError::general(e.to_string()))?;
                }
                AstNode::Atom { .. } => {}
            }
        }
        Ok(())
    }

    pub(crate) fn is_unsat(&self) -> bool {
        self.solver.check() == SatResult::Unsat
    }

    /// After an unsat check: the apply nodes named by the core, each with
    /// the indices of its blamed constraints, ordered by node id.
    pub(crate) fn blame_nodes(&self, indexer: &NodeIndexer) -> Vec<(NodeRef, Vec<usize>)> {
        let core = self.solver.get_unsat_core();
        let mut grouped: BTreeMap<usize, (NodeRef, Vec<usize>)> = BTreeMap::new();
        for item in &core {
            for (tag, node, cidx) in &self.trackers {
                if tag == item {
                    let node_id = indexer.get_id(node).unwrap_or(usize::MAX);
                    grouped
                        .entry(node_id)
                        .or_insert_with(|| (node.clone(), Vec::new()))
                        .1
                        .push(*cidx);
                }
            }
        }
        grouped.into_values().collect()
    }
}

/// Decides whether one constraint set subsumes a single constraint.
///
/// `implies(pre, post)` holds when `pre ==> post` is valid with property
/// accesses treated as fresh typed variables keyed by name and slot.
pub(crate) fn constraint_implies(pre: &Expr, post: &Expr) -> bool {
    let ctx = fresh_context();
    let solver = Solver::new(&ctx);
    let mut encoder = ConstraintEncoder::new(&ctx, |name, sort, slot| {
        property_var(&ctx, slot, name, sort)
    });
    let (Ok(pre), Ok(post)) = (encoder.encode_bool(pre), encoder.encode_bool(post)) else {
        return false;
    };
    solver.assert(&pre.implies(&post).not());
    solver.check() == SatResult::Unsat
}

/// Precomputes the implication map over all constrained productions that
/// share a signature.
pub(crate) fn build_imply_map(spec: &Spec) -> ImplyMap {
    let constrained: Vec<&ProdRef> = spec
        .function_productions()
        .iter()
        .filter(|p| !p.constraints().is_empty())
        .collect();

    // A substitute must fit the blamed node's position exactly: same lhs,
    // same argument types.
    let same_signature = |p0: &ProdRef, p1: &ProdRef| {
        p0.lhs().name() == p1.lhs().name()
            && p0.arity() == p1.arity()
            && p0
                .rhs()
                .iter()
                .zip(p1.rhs())
                .all(|(a, b)| a.name() == b.name())
    };

    let mut map: ImplyMap = HashMap::new();
    for &p0 in &constrained {
        for &p1 in &constrained {
            if p0.id() == p1.id() || !same_signature(p0, p1) {
                continue;
            }

            for (i0, c0) in p0.constraints().iter().enumerate() {
                if p1
                    .constraints()
                    .iter()
                    .any(|c1| constraint_implies(c1, c0))
                {
                    map.entry((p0.id(), i0)).or_default().push(p1.clone());
                }
            }
        }
    }
    log::debug!(
        "implication map: {} entries over {} constrained productions",
        map.len(),
        constrained.len()
    );
    map
}

/// Accumulates deduplicated blame sets across failing examples.
struct BlameFinder<'a, I: Interpreter> {
    interp: &'a I,
    imply_map: &'a ImplyMap,
    prog: NodeRef,
    indexer: NodeIndexer,
    seen: HashSet<Vec<(usize, usize)>>,
    blames: Vec<BlameSet>,
}

impl<'a, I: Interpreter> BlameFinder<'a, I> {
    fn new(interp: &'a I, imply_map: &'a ImplyMap, prog: NodeRef) -> Self {
        let indexer = NodeIndexer::new(&prog);
        BlameFinder {
            interp,
            imply_map,
            prog,
            indexer,
            seen: HashSet::new(),
            blames: Vec::new(),
        }
    }

    fn push_set(&mut self, set: BlameSet) {
        let mut key: Vec<(usize, usize)> = set
            .iter()
            .map(|b| {
                (
                    self.indexer.get_id(&b.node).unwrap_or(usize::MAX),
                    b.production.id(),
                )
            })
            .collect();
        key.sort_unstable();
        if self.seen.insert(key) {
            self.blames.push(set);
        }
    }

    fn process_example(
        &mut self,
        example: &Example<I::Value>,
    ) -> Result<(), InterpreterError<I::Value>> {
        let ctx = fresh_context();
        let mut encoder = AlignmentEncoder::new(&ctx);
        encoder.encode_candidate(self.interp, &self.indexer, &self.prog, example)?;
        if !encoder.is_unsat() {
            // The abstract semantics admits the example; nothing to learn.
            return Ok(());
        }
        let blamed = encoder.blame_nodes(&self.indexer);
        if blamed.is_empty() {
            return Ok(());
        }

        let base_nodes: Vec<NodeRef> = blamed.iter().map(|(n, _)| n.clone()).collect();
        self.push_set(
            base_nodes
                .iter()
                .map(|n| Blame::new(n.clone(), n.production().clone()))
                .collect(),
        );

        for (node, cidxs) in &blamed {
            for cidx in cidxs {
                let Some(substitutes) = self.imply_map.get(&(node.production().id(), *cidx))
                else {
                    continue;
                };
                for substitute in substitutes {
                    let set = base_nodes
                        .iter()
                        .map(|n| {
                            let prod = if std::rc::Rc::ptr_eq(n, node) {
                                substitute.clone()
                            } else {
                                n.production().clone()
                            };
                            Blame::new(n.clone(), prod)
                        })
                        .collect();
                    self.push_set(set);
                }
            }
        }
        Ok(())
    }

    fn into_blames(self) -> Vec<BlameSet> {
        self.blames
    }
}

/// Example checking with unsat-core blame and implication expansion.
pub struct ExampleConstraintDecider<'s, I: Interpreter> {
    spec: &'s Spec,
    base: ExampleDecider<I>,
    imply_map: ImplyMap,
}

impl<'s, I: Interpreter> ExampleConstraintDecider<'s, I>
where
    I::Value: PartialEq,
{
    /// Builds the decider with `==` output comparison.
    pub fn new(
        spec: &'s Spec,
        interp: I,
        examples: Vec<Example<I::Value>>,
    ) -> EngineResult<Self> {
        let base = ExampleDecider::new(interp, examples)?;
        Ok(ExampleConstraintDecider {
            spec,
            imply_map: build_imply_map(spec),
            base,
        })
    }
}

impl<'s, I: Interpreter> ExampleConstraintDecider<'s, I> {
    /// Builds the decider with a custom output equality.
    pub fn with_equality(
        spec: &'s Spec,
        interp: I,
        examples: Vec<Example<I::Value>>,
        equal: OutputEq<I::Value>,
    ) -> EngineResult<Self> {
        let base = ExampleDecider::with_equality(interp, examples, equal)?;
        Ok(ExampleConstraintDecider {
            spec,
            imply_map: build_imply_map(spec),
            base,
        })
    }

    pub fn interpreter(&self) -> &I {
        self.base.interpreter()
    }
}

impl<'s, I: Interpreter> Decider for ExampleConstraintDecider<'s, I> {
    type Value = I::Value;

    fn analyze(&self, prog: &NodeRef) -> Result<Outcome, InterpreterError<I::Value>> {
        let failed = self.base.failed_examples(prog)?;
        if failed.is_empty() {
            return Ok(Outcome::Accepted);
        }
        let mut finder = BlameFinder::new(self.base.interpreter(), &self.imply_map, prog.clone());
        for example in failed {
            finder.process_example(example)?;
        }
        Ok(Outcome::Rejected(finder.into_blames()))
    }

    fn explain_error(&self, error: &InterpreterError<I::Value>) -> Option<Vec<BlameSet>> {
        let InterpreterError::Assertion(violation) = error else {
            return None;
        };
        AssertionViolationHandler::new(self.spec).handle(self.base.interpreter(), violation)
    }
}
