//! Dataflow lattices and line-permutation symmetries.
//!
//! A model of the lines encoding induces a *dataflow tree*: the last line
//! is the root and each line's children are the lines it consumes, in child
//! slot order. Permuting lines without changing that tree yields the same
//! program, so once one member of the class is blocked, every permuted
//! sibling can be blocked too.
//!
//! The tree's [`signature`] is a canonical bracketed string; the
//! [`LatticeStore`] memoizes, per signature, the set of nontrivial
//! line-renumberings ([`PermModel`]) that preserve it. Stores round-trip
//! through a plain text cache, one line per signature:
//!
//! ```text
//! (3(1)(2)):x_1=2,x_2=1
//! (3(2(1))):
//! ```
//!
//! An absent or empty entry means "no known symmetries". When no cache is
//! available, [`find_symmetries`] computes the renumberings with a small
//! solver query.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use z3::ast::{Ast, Bool, Int};
use z3::{Config, Context, SatResult, Solver};

use crate::error::{EngineError, EngineResult};

/// One node of the dataflow tree; `line` numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowNode {
    pub line: usize,
    pub children: Vec<FlowNode>,
}

impl FlowNode {
    pub fn leaf(line: usize) -> FlowNode {
        FlowNode {
            line,
            children: Vec::new(),
        }
    }

    pub fn new(line: usize, children: Vec<FlowNode>) -> FlowNode {
        FlowNode { line, children }
    }
}

/// Canonical bracketed form of a dataflow tree, e.g. `(3(1)(2))`.
pub fn signature(node: &FlowNode) -> String {
    let mut out = String::new();
    write_signature(node, &mut out);
    out
}

fn write_signature(node: &FlowNode, out: &mut String) {
    out.push('(');
    out.push_str(&node.line.to_string());
    for child in &node.children {
        write_signature(child, out);
    }
    out.push(')');
}

/// A line renumbering: `(line, new_position)` pairs, lines not listed stay
/// put. Corresponds to one `x_1=2,x_2=1` model in the cache format.
pub type PermModel = Vec<(usize, usize)>;

/// In-memory signature-to-permutations map with optional file persistence.
#[derive(Debug, Default)]
pub struct LatticeStore {
    entries: HashMap<String, Vec<PermModel>>,
}

impl LatticeStore {
    pub fn new() -> LatticeStore {
        LatticeStore::default()
    }

    /// Reads a cache file; a missing file yields an empty store.
    pub fn load(path: &Path) -> EngineResult<LatticeStore> {
        let mut store = LatticeStore::new();
        if !path.exists() {
            return Ok(store);
        }
        let text = fs::read_to_string(path)?;
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let (sig, models_text) =
                line.split_once(':')
                    .ok_or_else(|| EngineError::LatticeFormat {
                        line: line.to_string(),
                    })?;
            let mut models = Vec::new();
            for model_text in models_text.split('|') {
                let model = parse_model(model_text).ok_or_else(|| EngineError::LatticeFormat {
                    line: line.to_string(),
                })?;
                if !model.is_empty() {
                    models.push(model);
                }
            }
            store.entries.insert(sig.to_string(), models);
        }
        Ok(store)
    }

    /// Writes the store back out, one signature per line, sorted so the
    /// file is stable across runs.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let mut sigs: Vec<&String> = self.entries.keys().collect();
        sigs.sort();
        let mut out = String::new();
        for sig in sigs {
            out.push_str(sig);
            out.push(':');
            let models = &self.entries[sig];
            for (i, model) in models.iter().enumerate() {
                if i > 0 {
                    out.push('|');
                }
                out.push_str(&format_model(model));
            }
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    pub fn get(&self, sig: &str) -> Option<&Vec<PermModel>> {
        self.entries.get(sig)
    }

    pub fn insert(&mut self, sig: String, models: Vec<PermModel>) {
        self.entries.insert(sig, models);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_model(text: &str) -> Option<PermModel> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '[' && *c != ']')
        .collect();
    if cleaned.is_empty() {
        return Some(Vec::new());
    }
    let mut model = Vec::new();
    for pair in cleaned.split(',') {
        let (var, value) = pair.split_once('=').or_else(|| pair.split_once(':'))?;
        let line: usize = var.strip_prefix("x_")?.parse().ok()?;
        let position: usize = value.parse().ok()?;
        model.push((line, position));
    }
    Some(model)
}

fn format_model(model: &PermModel) -> String {
    let mut sorted = model.clone();
    sorted.sort_unstable();
    sorted
        .iter()
        .map(|(line, position)| format!("x_{}={}", line, position))
        .collect::<Vec<_>>()
        .join(",")
}

/// Solves for all nontrivial renumberings preserving the dataflow tree.
///
/// Each line gets a position variable constrained between the number of
/// lines it consumes (its children must fit below it) and its consumer's
/// position; an all-different constraint makes the assignment a
/// permutation, and the identity is excluded.
pub fn find_symmetries(root: &FlowNode) -> Vec<PermModel> {
    let mut cfg = Config::new();
    cfg.set_param_value("timeout", "10000");
    let ctx = Context::new(&cfg);
    let solver = Solver::new(&ctx);

    let mut vars: Vec<(usize, Int)> = Vec::new();
    let mut off_identity: Vec<Bool> = Vec::new();
    let root_pos = Int::from_u64(&ctx, root.line as u64);
    for child in &root.children {
        encode_positions(&ctx, &solver, child, &root_pos, &mut vars, &mut off_identity);
    }
    if vars.is_empty() {
        return Vec::new();
    }

    let refs: Vec<&Bool> = off_identity.iter().collect();
    solver.assert(&Bool::or(&ctx, &refs));
    for i in 0..vars.len() {
        for j in (i + 1)..vars.len() {
            solver.assert(&vars[i].1._eq(&vars[j].1).not());
        }
    }

    let mut models = Vec::new();
    while solver.check() == SatResult::Sat {
        let Some(model) = solver.get_model() else {
            break;
        };
        let mut perm: PermModel = Vec::with_capacity(vars.len());
        let mut block: Vec<Bool> = Vec::with_capacity(vars.len());
        for (line, var) in &vars {
            let Some(value) = model.eval(var, true).and_then(|v| v.as_i64()) else {
                return models;
            };
            perm.push((*line, value as usize));
            block.push(var._eq(&Int::from_i64(&ctx, value)).not());
        }
        models.push(perm);
        let refs: Vec<&Bool> = block.iter().collect();
        solver.assert(&Bool::or(&ctx, &refs));
    }
    models
}

fn encode_positions<'ctx>(
    ctx: &'ctx Context,
    solver: &Solver<'ctx>,
    node: &FlowNode,
    parent_pos: &Int<'ctx>,
    vars: &mut Vec<(usize, Int<'ctx>)>,
    off_identity: &mut Vec<Bool<'ctx>>,
) {
    let var = Int::new_const(ctx, format!("x_{}", node.line));
    solver.assert(&var.gt(&Int::from_u64(ctx, node.children.len() as u64)));
    solver.assert(&var.lt(parent_pos));
    off_identity.push(var._eq(&Int::from_u64(ctx, node.line as u64)).not());
    for child in &node.children {
        encode_positions(ctx, solver, child, &var, vars, off_identity);
    }
    vars.push((node.line, var));
}
