//! Grammar productions: the rules candidate programs are assembled from.
//!
//! A production is identified by the integer id the spec assigned it at
//! build time; ids are dense, stable, and unique within one spec. The three
//! kinds mirror the three AST node kinds: enum choices and input parameters
//! label leaves, function applications label interior nodes.

use std::fmt;
use std::rc::Rc;

use crate::expr::Expr;
use crate::types::TypeRef;

/// The payload distinguishing the three production kinds.
#[derive(Debug, Clone)]
pub enum ProductionKind {
    /// One element of an enum type's domain, by index.
    Enum { choice: usize },
    /// One program input slot.
    Param { index: usize },
    /// A named function application template with typed arguments and
    /// optional abstract-semantics constraints.
    Function {
        name: String,
        rhs: Vec<TypeRef>,
        constraints: Vec<Expr>,
    },
}

/// A typed grammar rule.
#[derive(Debug, Clone)]
pub struct Production {
    id: usize,
    lhs: TypeRef,
    kind: ProductionKind,
}

/// Shared handle to a production.
pub type ProdRef = Rc<Production>;

impl Production {
    pub(crate) fn new(id: usize, lhs: TypeRef, kind: ProductionKind) -> Production {
        Production { id, lhs, kind }
    }

    /// The spec-assigned id, unique and stable within one spec.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The type this production produces.
    pub fn lhs(&self) -> &TypeRef {
        &self.lhs
    }

    pub fn kind(&self) -> &ProductionKind {
        &self.kind
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, ProductionKind::Enum { .. })
    }

    pub fn is_param(&self) -> bool {
        matches!(self.kind, ProductionKind::Param { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, ProductionKind::Function { .. })
    }

    /// Argument count: zero for leaves, `rhs.len()` for functions.
    pub fn arity(&self) -> usize {
        match &self.kind {
            ProductionKind::Function { rhs, .. } => rhs.len(),
            _ => 0,
        }
    }

    /// The argument types of a function production; empty for leaves.
    pub fn rhs(&self) -> &[TypeRef] {
        match &self.kind {
            ProductionKind::Function { rhs, .. } => rhs,
            _ => &[],
        }
    }

    /// The domain literal of an enum production.
    pub fn enum_literal(&self) -> Option<&str> {
        match &self.kind {
            ProductionKind::Enum { choice } => self.lhs.domain().get(*choice).map(|s| s.as_str()),
            _ => None,
        }
    }

    /// The input slot of a parameter production.
    pub fn param_index(&self) -> Option<usize> {
        match &self.kind {
            ProductionKind::Param { index } => Some(*index),
            _ => None,
        }
    }

    /// The name of a function production.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            ProductionKind::Function { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The constraints of a function production; empty for leaves.
    pub fn constraints(&self) -> &[Expr] {
        match &self.kind {
            ProductionKind::Function { constraints, .. } => constraints,
            _ => &[],
        }
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ProductionKind::Enum { .. } => write!(
                f,
                "production {}: {} -> \"{}\"",
                self.id,
                self.lhs,
                self.enum_literal().unwrap_or("?")
            ),
            ProductionKind::Param { index } => {
                write!(f, "production {}: {} -> <param {}>", self.id, self.lhs, index)
            }
            ProductionKind::Function { name, rhs, .. } => {
                write!(f, "production {}: {} -> {}(", self.id, self.lhs, name)?;
                for (i, ty) in rhs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, ")")
            }
        }
    }
}
