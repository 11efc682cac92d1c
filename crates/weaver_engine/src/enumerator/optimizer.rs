//! LSU-style optimization over weighted relaxation variables.
//!
//! Weighted predicates are encoded with one 0/1 relaxation variable per
//! applicable location; paying a variable's weight buys the right to break
//! its predicate. The optimizer minimizes the total paid weight by linear
//! search on the bound from below: assert `objective <= bound` inside a
//! `push`/`pop` scope, and on unsat raise the bound to the next value
//! reachable as a subset sum of the remaining weights. The first sat bound
//! is optimal, and it persists across calls so later requests resume there.

use z3::ast::{Ast, Bool, Int};
use z3::{Context, Model, SatResult, Solver};

use crate::error::EngineResult;

pub(crate) struct LsuOptimizer<'ctx> {
    ctx: &'ctx Context,
    objective: Vec<(Int<'ctx>, u64)>,
    weights: Vec<u64>,
    bound: u64,
    ub: u64,
    next_id: usize,
}

impl<'ctx> LsuOptimizer<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context) -> Self {
        LsuOptimizer {
            ctx,
            objective: Vec::new(),
            weights: Vec::new(),
            bound: 0,
            ub: 0,
            next_id: 0,
        }
    }

    /// Whether any weighted predicate registered a relaxation variable.
    pub(crate) fn has_objective(&self) -> bool {
        !self.objective.is_empty()
    }

    /// Creates a fresh 0/1 relaxation variable with the given cost.
    pub(crate) fn add_relax_var(&mut self, solver: &Solver<'ctx>, weight: u64) -> Int<'ctx> {
        let var = Int::new_const(self.ctx, format!("relax{}", self.next_id));
        self.next_id += 1;
        let zero = Int::from_i64(self.ctx, 0);
        let one = Int::from_i64(self.ctx, 1);
        solver.assert(&Bool::or(
            self.ctx,
            &[&var._eq(&zero), &var._eq(&one)],
        ));
        self.objective.push((var.clone(), weight));
        self.weights.push(weight);
        self.ub += weight;
        var
    }

    fn objective_sum(&self) -> Int<'ctx> {
        let mut terms: Vec<Int<'ctx>> = Vec::with_capacity(self.objective.len());
        for (var, weight) in &self.objective {
            terms.push(Int::from_u64(self.ctx, *weight) * var.clone());
        }
        let refs: Vec<&Int<'ctx>> = terms.iter().collect();
        Int::add(self.ctx, &refs)
    }

    /// Whether `target` is reachable as a sum over a subset of the weights.
    fn subset_sum_feasible(&self, target: u64) -> bool {
        let target = target as usize;
        let mut reachable = vec![false; target + 1];
        reachable[0] = true;
        for &w in &self.weights {
            let w = w as usize;
            if w == 0 || w > target {
                continue;
            }
            for sum in (w..=target).rev() {
                if reachable[sum - w] {
                    reachable[sum] = true;
                }
            }
        }
        reachable[target]
    }

    fn cost_of(&self, model: &Model<'ctx>) -> u64 {
        let mut cost = 0;
        for (var, weight) in &self.objective {
            let value = model
                .eval(var, true)
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            if value == 1 {
                cost += weight;
            }
        }
        cost
    }

    /// Finds a model minimizing the objective, or `None` when the hard
    /// constraints are unsatisfiable (or the solver gives up).
    pub(crate) fn optimize(&mut self, solver: &Solver<'ctx>) -> EngineResult<Option<Model<'ctx>>> {
        if !self.has_objective() {
            return Ok(match solver.check() {
                SatResult::Sat => solver.get_model(),
                _ => None,
            });
        }

        let objective = self.objective_sum();
        let mut bound = self.bound;
        loop {
            solver.push();
            solver.assert(&objective.le(&Int::from_u64(self.ctx, bound)));
            let res = solver.check();
            if res == SatResult::Sat {
                let model = solver.get_model();
                solver.pop(1);
                if let Some(model) = &model {
                    self.bound = self.cost_of(model);
                }
                return Ok(model);
            }
            solver.pop(1);
            if res == SatResult::Unknown || bound >= self.ub {
                return Ok(None);
            }
            bound += 1;
            while bound < self.ub && !self.subset_sum_feasible(bound) {
                bound += 1;
            }
        }
    }
}
