//! The AST node variants and their construction invariants.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use weaver_spec::{ProdRef, TypeRef};

use crate::error::{DslError, DslResult};

/// A node of a candidate program tree.
///
/// The three variants mirror the production kinds. Use the constructors
/// ([`Ast::atom`], [`Ast::param`], [`Ast::apply`]) or the spec-aware
/// [`Builder`](crate::Builder); they enforce that an apply's children match
/// the production's rhs in count and type.
#[derive(Debug)]
pub enum Ast {
    /// A leaf holding one enum choice.
    Atom { prod: ProdRef },
    /// A leaf referencing one program input.
    Param { prod: ProdRef },
    /// A function application over typed children.
    Apply { prod: ProdRef, args: Vec<NodeRef> },
}

/// Shared handle to an immutable AST node.
pub type NodeRef = Rc<Ast>;

/// Address-based key for identity maps over one program's nodes.
///
/// Two occurrences of structurally equal subtrees are distinct nodes; deep
/// equality must never be used where node identity is meant.
pub(crate) fn node_key(node: &NodeRef) -> usize {
    Rc::as_ptr(node) as usize
}

impl Ast {
    /// Wraps an enum production into a leaf.
    pub fn atom(prod: ProdRef) -> DslResult<NodeRef> {
        if !prod.is_enum() {
            return Err(DslError::WrongProductionKind {
                expected: "atom",
                production: prod.to_string(),
            });
        }
        Ok(Rc::new(Ast::Atom { prod }))
    }

    /// Wraps a parameter production into a leaf.
    pub fn param(prod: ProdRef) -> DslResult<NodeRef> {
        if !prod.is_param() {
            return Err(DslError::WrongProductionKind {
                expected: "param",
                production: prod.to_string(),
            });
        }
        Ok(Rc::new(Ast::Param { prod }))
    }

    /// Builds a function application, checking arity and argument types.
    pub fn apply(prod: ProdRef, args: Vec<NodeRef>) -> DslResult<NodeRef> {
        if !prod.is_function() {
            return Err(DslError::WrongProductionKind {
                expected: "apply",
                production: prod.to_string(),
            });
        }
        if prod.arity() != args.len() {
            return Err(DslError::ArityMismatch {
                expected: prod.arity(),
                found: args.len(),
            });
        }
        for (index, (declared, arg)) in prod.rhs().iter().zip(args.iter()).enumerate() {
            if declared != arg.ty() {
                return Err(DslError::ArgTypeMismatch {
                    index,
                    expected: declared.name().to_string(),
                    found: arg.ty().name().to_string(),
                });
            }
        }
        Ok(Rc::new(Ast::Apply { prod, args }))
    }

    /// The production labelling this node.
    pub fn production(&self) -> &ProdRef {
        match self {
            Ast::Atom { prod } | Ast::Param { prod } | Ast::Apply { prod, .. } => prod,
        }
    }

    /// The node's type, i.e. its production's lhs.
    pub fn ty(&self) -> &TypeRef {
        self.production().lhs()
    }

    /// Left-to-right children; empty for leaves.
    pub fn children(&self) -> &[NodeRef] {
        match self {
            Ast::Apply { args, .. } => args,
            _ => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_apply()
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Ast::Atom { .. })
    }

    pub fn is_param(&self) -> bool {
        matches!(self, Ast::Param { .. })
    }

    pub fn is_apply(&self) -> bool {
        matches!(self, Ast::Apply { .. })
    }

    /// The enum literal of an atom.
    pub fn data(&self) -> Option<&str> {
        match self {
            Ast::Atom { prod } => prod.enum_literal(),
            _ => None,
        }
    }

    /// The input slot of a param leaf.
    pub fn index(&self) -> Option<usize> {
        match self {
            Ast::Param { prod } => prod.param_index(),
            _ => None,
        }
    }

    /// The function name of an apply.
    pub fn name(&self) -> Option<&str> {
        match self {
            Ast::Apply { prod, .. } => prod.name(),
            _ => None,
        }
    }

    /// Structural equality: same production, deeply equal children.
    ///
    /// Never considers node addresses.
    pub fn deep_eq(&self, other: &Ast) -> bool {
        if self.production().id() != other.production().id() {
            return false;
        }
        let (a, b) = (self.children(), other.children());
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_eq(y))
    }

    /// Structural hash, consistent with [`deep_eq`](Self::deep_eq):
    /// `a.deep_eq(b)` implies `a.deep_hash() == b.deep_hash()`.
    pub fn deep_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.feed_hash(&mut hasher);
        hasher.finish()
    }

    fn feed_hash(&self, hasher: &mut DefaultHasher) {
        self.production().id().hash(hasher);
        self.children().len().hash(hasher);
        for child in self.children() {
            child.feed_hash(hasher);
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Atom { .. } => write!(f, "{}", self.data().unwrap_or("?")),
            Ast::Param { .. } => write!(f, "@param{}", self.index().unwrap_or(usize::MAX)),
            Ast::Apply { args, .. } => {
                write!(f, "{}(", self.name().unwrap_or("?"))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_spec::parse;

    fn toy() -> weaver_spec::Spec {
        parse(
            r#"
            enum SmallInt { "0", "1" }
            value Int;
            program Toy(Int, Int) -> Int;
            func const: Int -> SmallInt;
            func plus: Int -> Int, Int;
            "#,
        )
        .unwrap()
    }

    #[test]
    fn atom_rejects_non_enum_production() {
        let spec = toy();
        let plus = spec.function_production_or_raise("plus").unwrap().clone();
        assert!(matches!(
            Ast::atom(plus),
            Err(DslError::WrongProductionKind { .. })
        ));
    }

    #[test]
    fn apply_constructs_iff_arity_and_types_match() {
        let spec = toy();
        let plus = spec.function_production_or_raise("plus").unwrap().clone();
        let p0 = Ast::param(spec.param_production_or_raise(0).unwrap().clone()).unwrap();
        let p1 = Ast::param(spec.param_production_or_raise(1).unwrap().clone()).unwrap();

        assert!(Ast::apply(plus.clone(), vec![p0.clone(), p1.clone()]).is_ok());
        assert!(matches!(
            Ast::apply(plus.clone(), vec![p0.clone()]),
            Err(DslError::ArityMismatch { .. })
        ));

        let small = spec.get_type_or_raise("SmallInt").unwrap().clone();
        let zero = Ast::atom(spec.enum_production_or_raise(&small, "0").unwrap().clone()).unwrap();
        assert!(matches!(
            Ast::apply(plus, vec![p0, zero]),
            Err(DslError::ArgTypeMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn deep_eq_ignores_node_identity() {
        let spec = toy();
        let plus = spec.function_production_or_raise("plus").unwrap().clone();
        let mk = || {
            let p0 = Ast::param(spec.param_production_or_raise(0).unwrap().clone()).unwrap();
            let p1 = Ast::param(spec.param_production_or_raise(1).unwrap().clone()).unwrap();
            Ast::apply(plus.clone(), vec![p0, p1]).unwrap()
        };
        let a = mk();
        let b = mk();
        assert!(!Rc::ptr_eq(&a, &b));
        assert!(a.deep_eq(&b));
        assert_eq!(a.deep_hash(), b.deep_hash());
    }

    #[test]
    fn deep_eq_distinguishes_child_order() {
        let spec = toy();
        let plus = spec.function_production_or_raise("plus").unwrap().clone();
        let p0 = Ast::param(spec.param_production_or_raise(0).unwrap().clone()).unwrap();
        let p1 = Ast::param(spec.param_production_or_raise(1).unwrap().clone()).unwrap();
        let ab = Ast::apply(plus.clone(), vec![p0.clone(), p1.clone()]).unwrap();
        let ba = Ast::apply(plus, vec![p1, p0]).unwrap();
        assert!(!ab.deep_eq(&ba));
    }

    #[test]
    fn display_is_call_notation() {
        let spec = toy();
        let plus = spec.function_production_or_raise("plus").unwrap().clone();
        let p0 = Ast::param(spec.param_production_or_raise(0).unwrap().clone()).unwrap();
        let p1 = Ast::param(spec.param_production_or_raise(1).unwrap().clone()).unwrap();
        let prog = Ast::apply(plus, vec![p0, p1]).unwrap();
        assert_eq!(prog.to_string(), "plus(@param0, @param1)");
    }
}
