//! The line-based SMT enumerator.
//!
//! Instead of one deep tree, the template is an ordered list of `loc`
//! *lines*. Each line is a single function application whose children are
//! leaves or references to earlier lines; the last line produces the
//! program output. References are encoded as synthetic *line productions*,
//! one per (line, type) pair, with ids above the spec's production range
//! and the reserved hole id.
//!
//! Because permuting independent lines does not change the program, each
//! blocked model can drag its whole permutation class down with it: the
//! model's dataflow [`signature`](super::lattice::signature) is looked up
//! in a [`LatticeStore`](super::lattice::LatticeStore) (loaded from a cache
//! file, computed on the fly, or both; see [`SymmetryMode`]), and every
//! stored renumbering yields one more blocking clause.

use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use z3::ast::{Ast, Bool, Int};
use z3::{Context, Model, SatResult, Solver};

use weaver_dsl::{Builder, NodeRef};
use weaver_spec::{PredArg, Predicate, Spec, TypeRef};

use crate::decider::blame::BlameSet;
use crate::error::{EngineError, EngineResult};

use super::lattice::{find_symmetries, signature, FlowNode, LatticeStore, PermModel};
use super::Enumerator;

/// How line-permutation symmetries are discovered.
#[derive(Debug, Clone)]
pub enum SymmetryMode {
    /// No symmetry breaking; only the returned model is blocked.
    Off,
    /// Discover permutations with a solver query at run time, memoized in
    /// memory for the session.
    Online,
    /// Like `Online`, but seeded from the given cache file;
    /// [`LinesEnumerator::close`] writes discoveries back.
    Offline(PathBuf),
}

/// SMT enumeration over an SSA-like sequence of lines.
pub struct LinesEnumerator<'ctx, 's> {
    ctx: &'ctx Context,
    spec: &'s Spec,
    solver: Solver<'ctx>,
    loc: usize,
    max_children: usize,
    hole_id: usize,
    /// Types a line may produce, in spec declaration order.
    types: Vec<TypeRef>,
    root_vars: Vec<Int<'ctx>>,
    type_vars: Vec<Int<'ctx>>,
    child_vars: Vec<Vec<Int<'ctx>>>,
    /// `line_flags[i][s][l]` is 1 iff slot `s` of line `i + 1` consumes
    /// line `l + 1`.
    line_flags: Vec<Vec<Vec<Int<'ctx>>>>,
    symmetry: SymmetryMode,
    store: LatticeStore,
    program_map: HashMap<usize, Int<'ctx>>,
    model: Option<Model<'ctx>>,
}

impl<'ctx, 's> LinesEnumerator<'ctx, 's> {
    pub fn new(
        ctx: &'ctx Context,
        spec: &'s Spec,
        loc: usize,
        symmetry: SymmetryMode,
    ) -> EngineResult<Self> {
        if loc == 0 {
            return Err(EngineError::InvalidBound {
                what: "loc",
                value: 0,
            });
        }
        let max_children = spec.max_arity();
        if max_children == 0 {
            return Err(EngineError::InvalidBound {
                what: "max arity",
                value: 0,
            });
        }
        let types: Vec<TypeRef> = spec
            .types()
            .iter()
            .filter(|ty| {
                spec.productions_with_lhs(ty.name())
                    .iter()
                    .any(|p| p.is_function())
            })
            .cloned()
            .collect();
        let store = match &symmetry {
            SymmetryMode::Offline(path) => LatticeStore::load(path)?,
            _ => LatticeStore::new(),
        };

        let mut enumerator = LinesEnumerator {
            ctx,
            spec,
            solver: Solver::new(ctx),
            loc,
            max_children,
            hole_id: spec.num_productions(),
            types,
            root_vars: Vec::new(),
            type_vars: Vec::new(),
            child_vars: Vec::new(),
            line_flags: Vec::new(),
            symmetry,
            store,
            program_map: HashMap::new(),
            model: None,
        };
        enumerator.create_variables();
        enumerator.create_output_constraints();
        enumerator.create_lines_constraints();
        enumerator.create_input_constraints();
        enumerator.create_type_constraints();
        enumerator.create_children_constraints();
        enumerator.resolve_predicates()?;
        log::debug!(
            "lines template: {} lines x {} slots, {} line productions",
            loc,
            max_children,
            (loc.saturating_sub(1)) * enumerator.types.len()
        );
        Ok(enumerator)
    }

    // ---- Synthetic line productions ----

    /// The synthetic production id for "the value of line `line` at type
    /// index `type_index`"; `line` is 1-based.
    fn line_prod_id(&self, line: usize, type_index: usize) -> usize {
        self.hole_id + 1 + (line - 1) * self.types.len() + type_index
    }

    /// Inverse of [`line_prod_id`](Self::line_prod_id).
    fn decode_line_prod(&self, id: usize) -> Option<(usize, usize)> {
        if id <= self.hole_id {
            return None;
        }
        let offset = id - self.hole_id - 1;
        Some((offset / self.types.len() + 1, offset % self.types.len()))
    }

    fn type_index(&self, ty: &TypeRef) -> Option<usize> {
        self.types.iter().position(|t| t.name() == ty.name())
    }

    fn int(&self, value: usize) -> Int<'ctx> {
        Int::from_u64(self.ctx, value as u64)
    }

    fn any(&self, clauses: &[Bool<'ctx>]) -> Bool<'ctx> {
        let refs: Vec<&Bool<'ctx>> = clauses.iter().collect();
        Bool::or(self.ctx, &refs)
    }

    fn leaf_production_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .spec
            .productions()
            .iter()
            .filter(|p| !p.is_function())
            .map(|p| p.id())
            .collect();
        ids.push(self.hole_id);
        ids
    }

    // ---- Template variables ----

    fn create_variables(&mut self) {
        let leaf_ids = self.leaf_production_ids();
        for line in 1..=self.loc {
            let root = Int::new_const(self.ctx, format!("n{}", line));
            let clauses: Vec<Bool<'ctx>> = self
                .spec
                .function_productions()
                .iter()
                .map(|p| root._eq(&self.int(p.id())))
                .collect();
            let domain = self.any(&clauses);
            self.solver.assert(&domain);
            self.root_vars.push(root);

            let ty = Int::new_const(self.ctx, format!("t{}", line));
            self.solver.assert(&ty.ge(&self.int(0)));
            self.solver.assert(&ty.lt(&self.int(self.types.len())));
            self.type_vars.push(ty);

            let mut slots = Vec::with_capacity(self.max_children);
            let mut slot_flags = Vec::with_capacity(self.max_children);
            for slot in 0..self.max_children {
                let child = Int::new_const(self.ctx, format!("c{}_{}", line, slot));
                let mut allowed: Vec<usize> = leaf_ids.clone();
                for earlier in 1..line {
                    for type_index in 0..self.types.len() {
                        allowed.push(self.line_prod_id(earlier, type_index));
                    }
                }
                let clauses: Vec<Bool<'ctx>> = allowed
                    .iter()
                    .map(|&id| child._eq(&self.int(id)))
                    .collect();
                let domain = self.any(&clauses);
                self.solver.assert(&domain);

                let mut flags = Vec::with_capacity(line - 1);
                for earlier in 1..line {
                    let flag = Int::new_const(self.ctx, format!("l{}_{}_{}", line, slot, earlier));
                    self.solver.assert(&flag.ge(&self.int(0)));
                    self.solver.assert(&flag.le(&self.int(1)));
                    let references: Vec<Bool<'ctx>> = (0..self.types.len())
                        .map(|t| child._eq(&self.int(self.line_prod_id(earlier, t))))
                        .collect();
                    let any_reference = self.any(&references);
                    self.solver
                        .assert(&flag._eq(&self.int(1))._eq(&any_reference));
                    // Consuming a line at a type pins that line's type.
                    for (t, reference) in references.iter().enumerate() {
                        self.solver.assert(
                            &reference.implies(&self.type_vars[earlier - 1]._eq(&self.int(t))),
                        );
                    }
                    flags.push(flag);
                }
                slots.push(child);
                slot_flags.push(flags);
            }
            // Unused slots are trailing: a hole never precedes a real child.
            for slot in 0..self.max_children.saturating_sub(1) {
                self.solver.assert(
                    &slots[slot]
                        ._eq(&self.int(self.hole_id))
                        .implies(&slots[slot + 1]._eq(&self.int(self.hole_id))),
                );
            }
            self.child_vars.push(slots);
            self.line_flags.push(slot_flags);
        }
    }

    /// The last line produces the program output type.
    fn create_output_constraints(&mut self) {
        let clauses: Vec<Bool<'ctx>> = self
            .spec
            .productions_with_lhs(self.spec.output().name())
            .iter()
            .filter(|p| p.is_function())
            .map(|p| self.root_vars[self.loc - 1]._eq(&self.int(p.id())))
            .collect();
        let domain = self.any(&clauses);
        self.solver.assert(&domain);
    }

    /// Every line except the last is consumed exactly once.
    fn create_lines_constraints(&mut self) {
        for earlier in 1..self.loc {
            let mut uses: Vec<Int<'ctx>> = Vec::new();
            for line_index in earlier..self.loc {
                for slot_flags in &self.line_flags[line_index] {
                    uses.push(slot_flags[earlier - 1].clone());
                }
            }
            let refs: Vec<&Int<'ctx>> = uses.iter().collect();
            let total = Int::add(self.ctx, &refs);
            self.solver.assert(&total._eq(&self.int(1)));
        }
    }

    /// Every program input appears on some slot.
    fn create_input_constraints(&mut self) {
        for param in self.spec.param_productions() {
            let mut clauses = Vec::new();
            for slots in &self.child_vars {
                for child in slots {
                    clauses.push(child._eq(&self.int(param.id())));
                }
            }
            let anywhere = self.any(&clauses);
            self.solver.assert(&anywhere);
        }
    }

    /// A line's type variable tracks its chosen production's lhs.
    fn create_type_constraints(&mut self) {
        for line_index in 0..self.loc {
            for prod in self.spec.function_productions() {
                let Some(type_index) = self.type_index(prod.lhs()) else {
                    continue;
                };
                self.solver.assert(
                    &self.root_vars[line_index]
                        ._eq(&self.int(prod.id()))
                        .implies(&self.type_vars[line_index]._eq(&self.int(type_index))),
                );
            }
        }
    }

    /// Slots agree with the chosen production's rhs types.
    fn create_children_constraints(&mut self) {
        for line_index in 0..self.loc {
            let line = line_index + 1;
            for prod in self.spec.function_productions() {
                let here = self.root_vars[line_index]._eq(&self.int(prod.id()));
                for slot in 0..self.max_children {
                    let child = &self.child_vars[line_index][slot];
                    if slot >= prod.arity() {
                        self.solver
                            .assert(&here.implies(&child._eq(&self.int(self.hole_id))));
                        break;
                    }
                    let wanted = prod.rhs()[slot].name();
                    let mut allowed: Vec<usize> = self
                        .spec
                        .productions_with_lhs(wanted)
                        .iter()
                        .filter(|p| !p.is_function())
                        .map(|p| p.id())
                        .collect();
                    if let Some(type_index) =
                        self.types.iter().position(|t| t.name() == wanted)
                    {
                        for earlier in 1..line {
                            allowed.push(self.line_prod_id(earlier, type_index));
                        }
                    }
                    let clauses: Vec<Bool<'ctx>> = allowed
                        .iter()
                        .map(|&id| child._eq(&self.int(id)))
                        .collect();
                    let domain = self.any(&clauses);
                    self.solver.assert(&here.implies(&domain));
                }
            }
        }
    }

    // ---- Predicates ----

    fn named_function(&self, pred: &Predicate, position: usize) -> EngineResult<usize> {
        let name = pred
            .args()
            .get(position)
            .and_then(PredArg::as_str)
            .ok_or_else(|| EngineError::BadPredicate {
                predicate: pred.to_string(),
                reason: format!("argument {} must be a function name", position),
            })?;
        Ok(self.spec.function_production_or_raise(name)?.id())
    }

    fn enum_production_ids(&self, literal: &str) -> Vec<usize> {
        self.spec
            .productions()
            .iter()
            .filter(|p| p.is_enum() && p.enum_literal() == Some(literal))
            .map(|p| p.id())
            .collect()
    }

    fn resolve_predicates(&mut self) -> EngineResult<()> {
        for pred in self.spec.predicates().to_vec() {
            match pred.name() {
                "is_not_parent" => {
                    let parent = self.named_function(&pred, 0)?;
                    let child = self.named_function(&pred, 1)?;
                    self.mk_is_not_parent(parent, child);
                }
                "distinct_inputs" => {
                    let func = self.named_function(&pred, 0)?;
                    self.mk_distinct_inputs(func);
                }
                "distinct_filters" => {
                    let func = self.named_function(&pred, 0)?;
                    let (a, b) = self.filter_positions(&pred)?;
                    self.mk_distinct_filters(func, a, b);
                }
                "constant_occurs" => {
                    self.mk_constant_occurs(&pred)?;
                }
                "happens_before" => {
                    self.mk_happens_before(&pred)?;
                }
                other => {
                    log::warn!("predicate not handled by the lines enumerator: {}", other);
                }
            }
        }
        Ok(())
    }

    /// A consumed line must not hold `child` when its consumer holds
    /// `parent`.
    fn mk_is_not_parent(&mut self, parent: usize, child: usize) {
        for line_index in 0..self.loc {
            for earlier in 1..=line_index {
                let consumed: Vec<Bool<'ctx>> = self.line_flags[line_index]
                    .iter()
                    .map(|flags| flags[earlier - 1]._eq(&self.int(1)))
                    .collect();
                let consumed_any = self.any(&consumed);
                let child_there = self.root_vars[earlier - 1]._eq(&self.int(child));
                let parent_here = self.root_vars[line_index]._eq(&self.int(parent));
                self.solver.assert(
                    &Bool::and(self.ctx, &[&consumed_any, &child_there])
                        .implies(&parent_here.not()),
                );
            }
        }
    }

    /// Children of a `func` line must pairwise differ, holes excepted.
    fn mk_distinct_inputs(&mut self, func: usize) {
        let hole = self.int(self.hole_id);
        for line_index in 0..self.loc {
            let here = self.root_vars[line_index]._eq(&self.int(func));
            let slots = &self.child_vars[line_index];
            for a in 0..slots.len() {
                for b in (a + 1)..slots.len() {
                    let differ = slots[a]._eq(&slots[b]).not();
                    let both_holes = Bool::and(
                        self.ctx,
                        &[&slots[a]._eq(&hole), &slots[b]._eq(&hole)],
                    );
                    self.solver.assert(
                        &here.implies(&Bool::or(self.ctx, &[&differ, &both_holes])),
                    );
                }
            }
        }
    }

    fn filter_positions(&self, pred: &Predicate) -> EngineResult<(usize, usize)> {
        let index = |position: usize| -> EngineResult<usize> {
            let value = pred
                .args()
                .get(position)
                .and_then(PredArg::as_int)
                .ok_or_else(|| EngineError::BadPredicate {
                    predicate: pred.to_string(),
                    reason: format!("argument {} must be a child index", position),
                })?;
            let value = value as usize;
            if value >= self.max_children {
                return Err(EngineError::BadPredicate {
                    predicate: pred.to_string(),
                    reason: format!("child index {} exceeds arity {}", value, self.max_children),
                });
            }
            Ok(value)
        };
        Ok((index(1)?, index(2)?))
    }

    fn mk_distinct_filters(&mut self, func: usize, a: usize, b: usize) {
        for line_index in 0..self.loc {
            let here = self.root_vars[line_index]._eq(&self.int(func));
            let differ = self.child_vars[line_index][a]
                ._eq(&self.child_vars[line_index][b])
                .not();
            self.solver.assert(&here.implies(&differ));
        }
    }

    /// At least one of the listed enum values appears somewhere.
    fn mk_constant_occurs(&mut self, pred: &Predicate) -> EngineResult<()> {
        let csv = pred
            .args()
            .first()
            .and_then(PredArg::as_str)
            .ok_or_else(|| EngineError::BadPredicate {
                predicate: pred.to_string(),
                reason: "argument 0 must be a comma-separated value list".into(),
            })?;
        let mut clauses = Vec::new();
        for literal in csv.split(',') {
            for id in self.enum_production_ids(literal.trim()) {
                for slots in &self.child_vars {
                    for child in slots {
                        clauses.push(child._eq(&self.int(id)));
                    }
                }
            }
        }
        let anywhere = self.any(&clauses);
        self.solver.assert(&anywhere);
        Ok(())
    }

    /// Any occurrence of `after` needs an occurrence of `before` on an
    /// earlier line.
    fn mk_happens_before(&mut self, pred: &Predicate) -> EngineResult<()> {
        let value = |position: usize| -> EngineResult<&str> {
            pred.args()
                .get(position)
                .and_then(PredArg::as_str)
                .ok_or_else(|| EngineError::BadPredicate {
                    predicate: pred.to_string(),
                    reason: format!("argument {} must be an enum value", position),
                })
        };
        let after_ids = self.enum_production_ids(value(0)?);
        let before_ids = self.enum_production_ids(value(1)?);

        for line_index in 0..self.loc {
            let mut here = Vec::new();
            for child in &self.child_vars[line_index] {
                for &id in &after_ids {
                    here.push(child._eq(&self.int(id)));
                }
            }
            let after_here = self.any(&here);

            let mut earlier = Vec::new();
            for prior in 0..line_index {
                for child in &self.child_vars[prior] {
                    for &id in &before_ids {
                        earlier.push(child._eq(&self.int(id)));
                    }
                }
            }
            let before_earlier = self.any(&earlier);
            self.solver.assert(&after_here.implies(&before_earlier));
        }
        Ok(())
    }

    // ---- Decoding ----

    fn model_value(&self, model: &Model<'ctx>, var: &Int<'ctx>) -> EngineResult<usize> {
        model
            .eval(var, true)
            .and_then(|v| v.as_i64())
            .map(|v| v as usize)
            .ok_or_else(|| EngineError::Encoding("template variable missing from model".into()))
    }

    fn build_line(
        &mut self,
        model: &Model<'ctx>,
        line_index: usize,
        built: &mut Vec<Option<NodeRef>>,
    ) -> EngineResult<NodeRef> {
        if let Some(node) = &built[line_index] {
            return Ok(node.clone());
        }
        let builder = Builder::new(self.spec);
        let prod_id = self.model_value(model, &self.root_vars[line_index])?;
        let mut children = Vec::new();
        for slot in 0..self.max_children {
            let value = self.model_value(model, &self.child_vars[line_index][slot])?;
            if value == self.hole_id {
                continue;
            }
            if let Some((line, _)) = self.decode_line_prod(value) {
                let node = self.build_line(model, line - 1, built)?;
                self.program_map.insert(
                    Rc::as_ptr(&node) as usize,
                    self.root_vars[line - 1].clone(),
                );
                children.push(node);
            } else {
                let node = builder.make_node(value, Vec::new())?;
                self.program_map.insert(
                    Rc::as_ptr(&node) as usize,
                    self.child_vars[line_index][slot].clone(),
                );
                children.push(node);
            }
        }
        let node = builder.make_node(prod_id, children)?;
        self.program_map
            .insert(Rc::as_ptr(&node) as usize, self.root_vars[line_index].clone());
        built[line_index] = Some(node.clone());
        Ok(node)
    }

    fn build_program(&mut self, model: &Model<'ctx>) -> EngineResult<NodeRef> {
        self.program_map.clear();
        let mut built = vec![None; self.loc];
        self.build_line(model, self.loc - 1, &mut built)
    }

    // ---- Blocking and symmetry ----

    fn block_assignment(&self, values: &[(Int<'ctx>, usize)]) {
        let clauses: Vec<Bool<'ctx>> = values
            .iter()
            .map(|(var, value)| var._eq(&self.int(*value)).not())
            .collect();
        let block = self.any(&clauses);
        self.solver.assert(&block);
    }

    /// The current model's root and slot assignments.
    fn snapshot(&self, model: &Model<'ctx>) -> EngineResult<Vec<(Int<'ctx>, usize)>> {
        let mut values = Vec::new();
        for line_index in 0..self.loc {
            values.push((
                self.root_vars[line_index].clone(),
                self.model_value(model, &self.root_vars[line_index])?,
            ));
            for slot in 0..self.max_children {
                let var = self.child_vars[line_index][slot].clone();
                let value = self.model_value(model, &var)?;
                values.push((var, value));
            }
        }
        Ok(values)
    }

    /// The dataflow tree of the current model, rooted at the last line.
    fn flow_tree(&self, model: &Model<'ctx>, line_index: usize) -> EngineResult<FlowNode> {
        let mut children = Vec::new();
        for slot in 0..self.max_children {
            let value = self.model_value(model, &self.child_vars[line_index][slot])?;
            if let Some((line, _)) = self.decode_line_prod(value) {
                children.push(self.flow_tree(model, line - 1)?);
            }
        }
        Ok(FlowNode::new(line_index + 1, children))
    }

    /// The permutations preserving the model's dataflow signature, from the
    /// store or the symmetry solver.
    fn symmetries_for(&mut self, flow: &FlowNode) -> Vec<PermModel> {
        let sig = signature(flow);
        if let Some(models) = self.store.get(&sig) {
            return models.clone();
        }
        let models = find_symmetries(flow);
        log::debug!(
            "lattice {}: {} symmetric renumberings",
            sig,
            models.len()
        );
        self.store.insert(sig, models.clone());
        models
    }

    /// Blocks the renumbered twin of the current model.
    fn block_permuted(&self, model: &Model<'ctx>, perm: &PermModel) -> EngineResult<()> {
        let mut target = vec![0usize; self.loc + 1];
        for line in 1..=self.loc {
            target[line] = line;
        }
        for &(line, position) in perm {
            if line == 0 || line > self.loc || position == 0 || position > self.loc {
                return Ok(());
            }
            target[line] = position;
        }

        let mut permuted: Vec<(Int<'ctx>, usize)> = Vec::new();
        for line in 1..=self.loc {
            let moved_to = target[line];
            let root_value = self.model_value(model, &self.root_vars[line - 1])?;
            permuted.push((self.root_vars[moved_to - 1].clone(), root_value));
            for slot in 0..self.max_children {
                let value = self.model_value(model, &self.child_vars[line - 1][slot])?;
                let remapped = match self.decode_line_prod(value) {
                    Some((referenced, type_index)) => {
                        self.line_prod_id(target[referenced], type_index)
                    }
                    None => value,
                };
                permuted.push((self.child_vars[moved_to - 1][slot].clone(), remapped));
            }
        }
        self.block_assignment(&permuted);
        Ok(())
    }

    fn block_model(&mut self) -> EngineResult<()> {
        let Some(model) = self.model.take() else {
            return Err(EngineError::NoActiveModel);
        };
        let values = self.snapshot(&model)?;
        self.block_assignment(&values);

        if !matches!(self.symmetry, SymmetryMode::Off) && self.loc > 2 {
            let flow = self.flow_tree(&model, self.loc - 1)?;
            for perm in self.symmetries_for(&flow) {
                self.block_permuted(&model, &perm)?;
            }
        }
        self.model = Some(model);
        Ok(())
    }

    /// Persists discovered symmetries when a cache file is configured.
    pub fn close(&self) -> EngineResult<()> {
        if let SymmetryMode::Offline(path) = &self.symmetry {
            self.store.save(path)?;
        }
        Ok(())
    }
}

impl<'ctx, 's> Enumerator for LinesEnumerator<'ctx, 's> {
    fn next_program(&mut self) -> EngineResult<Option<NodeRef>> {
        if self.solver.check() != SatResult::Sat {
            return Ok(None);
        }
        let Some(model) = self.solver.get_model() else {
            return Ok(None);
        };
        let prog = self.build_program(&model)?;
        self.model = Some(model);
        Ok(Some(prog))
    }

    fn update(&mut self, blames: Option<&[BlameSet]>) -> EngineResult<()> {
        match blames {
            Some(blame_sets) => {
                for set in blame_sets {
                    let mut clauses = Vec::with_capacity(set.len());
                    for blame in set {
                        let key = Rc::as_ptr(&blame.node) as usize;
                        let var = self
                            .program_map
                            .get(&key)
                            .ok_or(EngineError::BlameOutsideCandidate)?;
                        clauses.push(var._eq(&self.int(blame.production.id())).not());
                    }
                    let block = self.any(&clauses);
                    self.solver.assert(&block);
                }
                Ok(())
            }
            None => self.block_model(),
        }
    }
}
