//! The k-tree SMT enumerator.
//!
//! Candidates are labelings of a fixed k-ary tree template, `k` being the
//! largest arity in the spec. One integer variable per template node holds
//! the chosen production id; the reserved id `spec.num_productions()` is an
//! internal *hole* filling unused slots, so grammars never declare an empty
//! production themselves. Hard constraints pin down well-typedness, the
//! requested function count, root output type, and input usage; weighted
//! predicates become relaxation variables resolved by the
//! [`LsuOptimizer`](super::optimizer::LsuOptimizer).
//!
//! Decoded programs remember which template node produced which AST node,
//! so blame sets translate directly into clauses over template variables.

use std::collections::{HashMap, VecDeque};

use z3::ast::{Ast, Bool, Int};
use z3::{Context, Model, SatResult, Solver};

use weaver_dsl::{Builder, NodeRef};
use weaver_spec::{PredArg, Predicate, ProdRef, Spec};

use crate::decider::blame::BlameSet;
use crate::error::{EngineError, EngineResult};

use super::optimizer::LsuOptimizer;
use super::Enumerator;

struct TreeNode {
    depth: usize,
    children: Option<Vec<usize>>,
}

/// Builds the template: every expanded node gets `k` children, and nodes at
/// the depth limit stay unexpanded.
fn build_ktree(k: usize, depth: usize) -> Vec<TreeNode> {
    let mut nodes = vec![TreeNode {
        depth: 1,
        children: None,
    }];
    let mut queue = VecDeque::from([0usize]);
    while let Some(index) = queue.pop_front() {
        let child_depth = nodes[index].depth + 1;
        let mut children = Vec::with_capacity(k);
        for _ in 0..k {
            let child = nodes.len();
            nodes.push(TreeNode {
                depth: child_depth,
                children: None,
            });
            children.push(child);
            if child_depth < depth {
                queue.push_back(child);
            }
        }
        nodes[index].children = Some(children);
    }
    nodes
}

/// SMT enumeration over a fixed k-ary template.
pub struct KTreeEnumerator<'ctx, 's> {
    ctx: &'ctx Context,
    spec: &'s Spec,
    solver: Solver<'ctx>,
    optimizer: LsuOptimizer<'ctx>,
    nodes: Vec<TreeNode>,
    prod_vars: Vec<Int<'ctx>>,
    fun_vars: Vec<Int<'ctx>>,
    occ_vars: Option<Vec<Int<'ctx>>>,
    hole_id: usize,
    loc: usize,
    program_map: HashMap<usize, usize>,
    model: Option<Model<'ctx>>,
}

impl<'ctx, 's> KTreeEnumerator<'ctx, 's> {
    /// Builds the template and asserts all hard constraints.
    ///
    /// `depth` bounds the tree height, `loc` fixes the exact number of
    /// function applications.
    pub fn new(ctx: &'ctx Context, spec: &'s Spec, depth: usize, loc: usize) -> EngineResult<Self> {
        if depth == 0 {
            return Err(EngineError::InvalidBound {
                what: "depth",
                value: 0,
            });
        }
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

        let mut enumerator = KTreeEnumerator {
            ctx,
            spec,
            solver: Solver::new(ctx),
            optimizer: LsuOptimizer::new(ctx),
            nodes: build_ktree(max_children, depth),
            prod_vars: Vec::new(),
            fun_vars: Vec::new(),
            occ_vars: None,
            hole_id: spec.num_productions(),
            loc,
            program_map: HashMap::new(),
            model: None,
        };
        enumerator.create_variables();
        enumerator.create_output_constraints();
        enumerator.create_loc_constraints();
        enumerator.create_input_constraints();
        enumerator.create_function_constraints();
        enumerator.create_leaf_constraints();
        enumerator.create_children_constraints();
        enumerator.resolve_predicates()?;
        log::debug!(
            "k-tree template: {} nodes, k={}, depth={}, loc={}",
            enumerator.nodes.len(),
            max_children,
            depth,
            loc
        );
        Ok(enumerator)
    }

    fn int(&self, value: usize) -> Int<'ctx> {
        Int::from_u64(self.ctx, value as u64)
    }

    fn var_is(&self, index: usize, prod_id: usize) -> Bool<'ctx> {
        self.prod_vars[index]._eq(&self.int(prod_id))
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

    fn create_variables(&mut self) {
        for index in 0..self.nodes.len() {
            let var = Int::new_const(self.ctx, format!("n{}", index + 1));
            self.solver.assert(&var.ge(&self.int(0)));
            self.solver.assert(&var.le(&self.int(self.hole_id)));
            self.prod_vars.push(var);

            let fun = Int::new_const(self.ctx, format!("h{}", index + 1));
            self.solver.assert(&fun.ge(&self.int(0)));
            self.solver.assert(&fun.le(&self.int(1)));
            self.fun_vars.push(fun);
        }
    }

    /// The root's production produces the program output type.
    fn create_output_constraints(&mut self) {
        let clauses: Vec<Bool<'ctx>> = self
            .spec
            .productions_with_lhs(self.spec.output().name())
            .iter()
            .map(|p| self.var_is(0, p.id()))
            .collect();
        let any = self.any(&clauses);
        self.solver.assert(&any);
    }

    /// Exactly `loc` function applications.
    fn create_loc_constraints(&mut self) {
        let refs: Vec<&Int<'ctx>> = self.fun_vars.iter().collect();
        let total = Int::add(self.ctx, &refs);
        self.solver.assert(&total._eq(&self.int(self.loc)));
    }

    /// Every program input appears somewhere.
    fn create_input_constraints(&mut self) {
        for param in self.spec.param_productions() {
            let clauses: Vec<Bool<'ctx>> = (0..self.nodes.len())
                .map(|index| self.var_is(index, param.id()))
                .collect();
            let any = self.any(&clauses);
            self.solver.assert(&any);
        }
    }

    /// `h` marks exactly the nodes holding a function production.
    fn create_function_constraints(&mut self) {
        for index in 0..self.nodes.len() {
            for prod in self.spec.productions() {
                let marker = if prod.is_function() { 1 } else { 0 };
                self.solver.assert(
                    &self
                        .var_is(index, prod.id())
                        .implies(&self.fun_vars[index]._eq(&self.int(marker))),
                );
            }
            self.solver.assert(
                &self
                    .var_is(index, self.hole_id)
                    .implies(&self.fun_vars[index]._eq(&self.int(0))),
            );
        }
    }

    /// Unexpanded template nodes may only hold leaves or the hole.
    fn create_leaf_constraints(&mut self) {
        let leaf_ids = self.leaf_production_ids();
        for index in 0..self.nodes.len() {
            if self.nodes[index].children.is_some() {
                continue;
            }
            let clauses: Vec<Bool<'ctx>> = leaf_ids
                .iter()
                .map(|&id| self.var_is(index, id))
                .collect();
            let any = self.any(&clauses);
            self.solver.assert(&any);
        }
    }

    /// Children agree with the parent's rhs types; slots past the arity and
    /// children of leaves are holes.
    fn create_children_constraints(&mut self) {
        let leaf_ids = self.leaf_production_ids();
        for index in 0..self.nodes.len() {
            let Some(children) = self.nodes[index].children.clone() else {
                continue;
            };
            for prod in self.spec.productions() {
                if prod.is_function() {
                    for (pos, &child) in children.iter().enumerate() {
                        let here = self.var_is(index, prod.id());
                        if pos < prod.arity() {
                            let clauses: Vec<Bool<'ctx>> = self
                                .spec
                                .productions_with_lhs(prod.rhs()[pos].name())
                                .iter()
                                .map(|t| self.var_is(child, t.id()))
                                .collect();
                            let any = self.any(&clauses);
                            self.solver.assert(&here.implies(&any));
                        } else {
                            self.solver
                                .assert(&here.implies(&self.var_is(child, self.hole_id)));
                        }
                    }
                }
            }
            for &leaf_id in &leaf_ids {
                for &child in &children {
                    self.solver.assert(
                        &self
                            .var_is(index, leaf_id)
                            .implies(&self.var_is(child, self.hole_id)),
                    );
                }
            }
        }
    }

    // ---- Weighted predicates ----

    /// Sentinel weight making a soft predicate hard.
    const HARD_WEIGHT: u64 = 100;

    /// The 0/1 variable recording whether `prod_id` occurs anywhere in the
    /// template, created lazily for all productions at once.
    fn occurrence_var(&mut self, prod_id: usize) -> Int<'ctx> {
        if let Some(vars) = &self.occ_vars {
            return vars[prod_id].clone();
        }
        let mut occ_vars = Vec::with_capacity(self.spec.num_productions());
        for id in 0..self.spec.num_productions() {
            let occ = Int::new_const(self.ctx, format!("occ{}", id));
            self.solver.assert(&occ.ge(&self.int(0)));
            self.solver.assert(&occ.le(&self.int(1)));
            let clauses: Vec<Bool<'ctx>> = (0..self.nodes.len())
                .map(|index| self.var_is(index, id))
                .collect();
            let anywhere = self.any(&clauses);
            self.solver.assert(&occ._eq(&self.int(1))._eq(&anywhere));
            occ_vars.push(occ);
        }
        let var = occ_vars[prod_id].clone();
        self.occ_vars = Some(occ_vars);
        var
    }

    fn mk_occurs(&mut self, prod: &ProdRef, weight: u64, wanted: bool) {
        let occ = self.occurrence_var(prod.id());
        let target = self.int(if wanted { 1 } else { 0 });
        if weight == Self::HARD_WEIGHT {
            self.solver.assert(&occ._eq(&target));
            return;
        }
        let relax = self.optimizer.add_relax_var(&self.solver, weight);
        let one = self.int(1);
        let zero = self.int(0);
        let satisfied = occ._eq(&target);
        self.solver
            .assert(&Bool::or(self.ctx, &[&satisfied, &relax._eq(&one)]));
        self.solver
            .assert(&relax._eq(&one).implies(&satisfied.not()));
        self.solver.assert(&satisfied.implies(&relax._eq(&zero)));
    }

    /// Template positions where `child`'s type fits one of `parent`'s slots.
    fn matching_child_clause(
        &self,
        children: &[usize],
        parent: &ProdRef,
        child: &ProdRef,
    ) -> Bool<'ctx> {
        let clauses: Vec<Bool<'ctx>> = parent
            .rhs()
            .iter()
            .enumerate()
            .filter(|(_, ty)| ty.name() == child.lhs().name())
            .filter_map(|(pos, _)| children.get(pos))
            .map(|&c| self.var_is(c, child.id()))
            .collect();
        self.any(&clauses)
    }

    fn mk_is_parent(&mut self, parent: &ProdRef, child: &ProdRef, weight: u64) {
        for index in 0..self.nodes.len() {
            let Some(children) = self.nodes[index].children.clone() else {
                continue;
            };
            let here = self.var_is(index, parent.id());
            let child_here = self.matching_child_clause(&children, parent, child);
            if weight == Self::HARD_WEIGHT {
                self.solver.assert(&here.implies(&child_here));
                continue;
            }
            let relax = self.optimizer.add_relax_var(&self.solver, weight);
            let one = self.int(1);
            let zero = self.int(0);
            self.solver.assert(&Bool::or(
                self.ctx,
                &[&here.implies(&child_here), &relax._eq(&one)],
            ));
            self.solver.assert(&relax._eq(&one).implies(&Bool::or(
                self.ctx,
                &[&here.not(), &child_here.not()],
            )));
            self.solver.assert(
                &Bool::and(self.ctx, &[&here, &child_here]).implies(&relax._eq(&zero)),
            );
        }
    }

    fn mk_is_not_parent(&mut self, parent: &ProdRef, child: &ProdRef, weight: u64) {
        for index in 0..self.nodes.len() {
            let Some(children) = self.nodes[index].children.clone() else {
                continue;
            };
            let here = self.var_is(index, parent.id());
            let child_here = self.matching_child_clause(&children, parent, child);
            if weight == Self::HARD_WEIGHT {
                self.solver.assert(&child_here.implies(&here.not()));
                continue;
            }
            let relax = self.optimizer.add_relax_var(&self.solver, weight);
            let one = self.int(1);
            let zero = self.int(0);
            self.solver.assert(&Bool::or(
                self.ctx,
                &[&child_here.implies(&here.not()), &relax._eq(&one)],
            ));
            self.solver.assert(
                &relax
                    ._eq(&one)
                    .implies(&Bool::or(self.ctx, &[&here, &child_here.not()])),
            );
            self.solver.assert(
                &Bool::and(self.ctx, &[&here.not(), &child_here]).implies(&relax._eq(&zero)),
            );
        }
    }

    fn weighted_args(&self, pred: &Predicate, names: usize) -> EngineResult<(Vec<ProdRef>, u64)> {
        let mut prods = Vec::with_capacity(names);
        for position in 0..names {
            let name = pred
                .args()
                .get(position)
                .and_then(PredArg::as_str)
                .ok_or_else(|| EngineError::BadPredicate {
                    predicate: pred.to_string(),
                    reason: format!("argument {} must be a function name", position),
                })?;
            prods.push(self.spec.function_production_or_raise(name)?.clone());
        }
        let weight = pred
            .args()
            .get(names)
            .and_then(PredArg::as_weight)
            .ok_or_else(|| EngineError::BadPredicate {
                predicate: pred.to_string(),
                reason: format!("argument {} must be an integral weight", names),
            })?;
        Ok((prods, weight))
    }

    fn resolve_predicates(&mut self) -> EngineResult<()> {
        for pred in self.spec.predicates() {
            match pred.name() {
                "occurs" => {
                    let (prods, weight) = self.weighted_args(pred, 1)?;
                    self.mk_occurs(&prods[0], weight, true);
                }
                "not_occurs" => {
                    let (prods, weight) = self.weighted_args(pred, 1)?;
                    self.mk_occurs(&prods[0], weight, false);
                }
                "is_parent" => {
                    let (prods, weight) = self.weighted_args(pred, 2)?;
                    self.mk_is_parent(&prods[0], &prods[1], weight);
                }
                "is_not_parent" => {
                    let (prods, weight) = self.weighted_args(pred, 2)?;
                    self.mk_is_not_parent(&prods[0], &prods[1], weight);
                }
                other => {
                    log::warn!("predicate not handled by the k-tree enumerator: {}", other);
                }
            }
        }
        Ok(())
    }

    // ---- Decoding ----

    fn model_value(&self, model: &Model<'ctx>, index: usize) -> EngineResult<usize> {
        model
            .eval(&self.prod_vars[index], true)
            .and_then(|v| v.as_i64())
            .map(|v| v as usize)
            .ok_or_else(|| EngineError::Encoding("template variable missing from model".into()))
    }

    fn build_program(&mut self, model: &Model<'ctx>) -> EngineResult<NodeRef> {
        self.program_map.clear();
        let builder = Builder::new(self.spec);
        let mut built: Vec<Option<NodeRef>> = vec![None; self.nodes.len()];

        for index in (0..self.nodes.len()).rev() {
            let prod_id = self.model_value(model, index)?;
            if prod_id == self.hole_id {
                continue;
            }
            let mut children = Vec::new();
            if let Some(child_indices) = &self.nodes[index].children {
                for &child in child_indices {
                    if let Some(node) = built[child].clone() {
                        children.push(node);
                    }
                }
            }
            let node = builder.make_node(prod_id, children)?;
            self.program_map
                .insert(std::rc::Rc::as_ptr(&node) as usize, index);
            built[index] = Some(node);
        }

        built[0]
            .clone()
            .ok_or_else(|| EngineError::Encoding("template root decoded to a hole".into()))
    }

    fn block_model(&mut self) -> EngineResult<()> {
        let Some(model) = &self.model else {
            return Err(EngineError::NoActiveModel);
        };
        let mut clauses = Vec::with_capacity(self.prod_vars.len());
        for index in 0..self.prod_vars.len() {
            let value = self.model_value(model, index)?;
            clauses.push(self.var_is(index, value).not());
        }
        let any = self.any(&clauses);
        self.solver.assert(&any);
        Ok(())
    }
}

impl<'ctx, 's> Enumerator for KTreeEnumerator<'ctx, 's> {
    fn next_program(&mut self) -> EngineResult<Option<NodeRef>> {
        match self.optimizer.optimize(&self.solver)? {
            Some(model) => {
                let prog = self.build_program(&model)?;
                self.model = Some(model);
                Ok(Some(prog))
            }
            None => Ok(None),
        }
    }

    fn update(&mut self, blames: Option<&[BlameSet]>) -> EngineResult<()> {
        match blames {
            Some(blame_sets) => {
                for set in blame_sets {
                    let mut clauses = Vec::with_capacity(set.len());
                    for blame in set {
                        let key = std::rc::Rc::as_ptr(&blame.node) as usize;
                        let index = *self
                            .program_map
                            .get(&key)
                            .ok_or(EngineError::BlameOutsideCandidate)?;
                        clauses.push(self.var_is(index, blame.production.id()).not());
                    }
                    let any = self.any(&clauses);
                    self.solver.assert(&any);
                }
                Ok(())
            }
            None => self.block_model(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::Config;

    fn toy() -> Spec {
        weaver_spec::parse(
            r#"
            enum SmallInt { "0", "1", "2", "3" }
            value Int;
            program Toy(Int, Int) -> Int;
            func const: Int -> SmallInt;
            func plus: Int -> Int, Int;
            func minus: Int -> Int, Int;
            func mult: Int -> Int, Int;
            "#,
        )
        .unwrap()
    }

    fn drain(enumerator: &mut dyn Enumerator, cap: usize) -> Vec<NodeRef> {
        let mut out = Vec::new();
        while out.len() < cap {
            match enumerator.next_program().unwrap() {
                Some(prog) => {
                    out.push(prog);
                    enumerator.update(None).unwrap();
                }
                None => break,
            }
        }
        out
    }

    fn count_functions(node: &NodeRef) -> usize {
        let own = usize::from(node.is_apply());
        own + node.children().iter().map(count_functions).sum::<usize>()
    }

    #[test]
    fn depth_one_yields_exactly_the_single_applications() {
        let spec = toy();
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut e = KTreeEnumerator::new(&ctx, &spec, 1, 1).unwrap();

        let programs = drain(&mut e, 64);
        // Three binary functions, both inputs required, two orders each.
        assert_eq!(programs.len(), 6);
        for prog in &programs {
            assert_eq!(prog.ty().name(), "Int");
            assert_eq!(count_functions(prog), 1);
            assert_eq!(prog.children().len(), 2);
            assert!(prog.children().iter().all(|c| c.is_param()));
        }
        // Exhaustion is stable.
        assert!(e.next_program().unwrap().is_none());
        assert!(e.next_program().unwrap().is_none());
    }

    #[test]
    fn no_candidate_repeats() {
        let spec = toy();
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut e = KTreeEnumerator::new(&ctx, &spec, 2, 1).unwrap();

        let programs = drain(&mut e, 200);
        for (i, a) in programs.iter().enumerate() {
            for b in &programs[i + 1..] {
                assert!(!a.deep_eq(b), "{} repeated", a);
            }
        }
    }

    #[test]
    fn returned_programs_satisfy_the_loc_bound() {
        let spec = toy();
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut e = KTreeEnumerator::new(&ctx, &spec, 3, 2).unwrap();

        let programs = drain(&mut e, 25);
        assert!(!programs.is_empty());
        for prog in &programs {
            assert_eq!(count_functions(prog), 2, "{}", prog);
            assert_eq!(prog.ty().name(), "Int");
        }
    }

    #[test]
    fn occurs_predicate_prefers_the_named_function() {
        let spec = weaver_spec::parse(
            r#"
            enum SmallInt { "0", "1", "2", "3" }
            value Int;
            program Toy(Int, Int) -> Int;
            func const: Int -> SmallInt;
            func plus: Int -> Int, Int;
            func minus: Int -> Int, Int;
            func mult: Int -> Int, Int;
            predicate occurs("mult", 2);
            "#,
        )
        .unwrap();
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut e = KTreeEnumerator::new(&ctx, &spec, 1, 1).unwrap();

        fn uses(node: &NodeRef, name: &str) -> bool {
            node.name() == Some(name) || node.children().iter().any(|c| uses(c, name))
        }

        // Zero-cost models come first: both mult orderings precede the rest.
        let first = e.next_program().unwrap().unwrap();
        assert!(uses(&first, "mult"));
        e.update(None).unwrap();
        let second = e.next_program().unwrap().unwrap();
        assert!(uses(&second, "mult"));
        e.update(None).unwrap();

        let rest = drain(&mut e, 16);
        assert_eq!(rest.len(), 4);
        assert!(rest.iter().all(|p| !uses(p, "mult")));
    }

    #[test]
    fn hard_is_not_parent_is_never_violated() {
        let spec = weaver_spec::parse(
            r#"
            enum SmallInt { "0", "1", "2", "3" }
            value Int;
            program Toy(Int, Int) -> Int;
            func const: Int -> SmallInt;
            func plus: Int -> Int, Int;
            func mult: Int -> Int, Int;
            predicate is_not_parent("plus", "mult", 100);
            "#,
        )
        .unwrap();
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut e = KTreeEnumerator::new(&ctx, &spec, 3, 2).unwrap();

        fn violates(node: &NodeRef) -> bool {
            if node.name() == Some("plus")
                && node.children().iter().any(|c| c.name() == Some("mult"))
            {
                return true;
            }
            node.children().iter().any(violates)
        }

        let programs = drain(&mut e, 30);
        assert!(!programs.is_empty());
        assert!(programs.iter().all(|p| !violates(p)));
    }

    #[test]
    fn blame_updates_prune_the_production_at_that_position() {
        let spec = toy();
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut e = KTreeEnumerator::new(&ctx, &spec, 1, 1).unwrap();

        let first = e.next_program().unwrap().unwrap();
        let root_prod = first.production().clone();
        let blame = vec![vec![crate::decider::blame::Blame::new(
            first.clone(),
            root_prod.clone(),
        )]];
        e.update(Some(&blame)).unwrap();

        let rest = drain(&mut e, 16);
        // Blocking the root production kills both argument orders.
        assert_eq!(rest.len(), 4);
        assert!(rest
            .iter()
            .all(|p| p.production().id() != root_prod.id()));
    }

    #[test]
    fn zero_bounds_are_refused() {
        let spec = toy();
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        assert!(KTreeEnumerator::new(&ctx, &spec, 0, 1).is_err());
        assert!(KTreeEnumerator::new(&ctx, &spec, 1, 0).is_err());
    }
}
