//! Spec-aware node factory.
//!
//! A [`Builder`] borrows the spec and resolves names and ids so callers can
//! write `make_apply("plus", args)` instead of threading productions around.
//! Every method surfaces the same typed errors as the raw [`Ast`]
//! constructors.

use weaver_spec::Spec;

use crate::error::{DslError, DslResult};
use crate::node::{Ast, NodeRef};
use crate::sexp::{parse_sexp, Sexp};

/// Factory for AST nodes over one spec.
pub struct Builder<'s> {
    spec: &'s Spec,
}

impl<'s> Builder<'s> {
    pub fn new(spec: &'s Spec) -> Builder<'s> {
        Builder { spec }
    }

    /// The spec this builder resolves against.
    pub fn spec(&self) -> &'s Spec {
        self.spec
    }

    /// Creates a node from a production id and children.
    ///
    /// Leaf productions require an empty child list.
    pub fn make_node(&self, prod_id: usize, children: Vec<NodeRef>) -> DslResult<NodeRef> {
        let prod = self.spec.get_production_or_raise(prod_id)?.clone();
        if prod.is_function() {
            Ast::apply(prod, children)
        } else if !children.is_empty() {
            Err(DslError::ArityMismatch {
                expected: 0,
                found: children.len(),
            })
        } else if prod.is_enum() {
            Ast::atom(prod)
        } else {
            Ast::param(prod)
        }
    }

    /// Creates an atom holding `value` of the enum type `type_name`.
    pub fn make_enum(&self, type_name: &str, value: &str) -> DslResult<NodeRef> {
        let ty = self.spec.get_type_or_raise(type_name)?;
        let prod = self.spec.enum_production_or_raise(ty, value)?.clone();
        Ast::atom(prod)
    }

    /// Creates the param leaf for input slot `index`.
    pub fn make_param(&self, index: usize) -> DslResult<NodeRef> {
        let prod = self.spec.param_production_or_raise(index)?.clone();
        Ast::param(prod)
    }

    /// Creates an application of the named function.
    pub fn make_apply(&self, name: &str, args: Vec<NodeRef>) -> DslResult<NodeRef> {
        let prod = self.spec.function_production_or_raise(name)?.clone();
        Ast::apply(prod, args)
    }

    /// Parses an s-expression string into a node.
    ///
    /// Accepts the forms produced by [`print_sexp`](crate::sexp::print_sexp).
    pub fn from_sexp(&self, src: &str) -> DslResult<NodeRef> {
        let sexp = parse_sexp(src)?;
        self.node_from_sexp(&sexp)
    }

    fn node_from_sexp(&self, sexp: &Sexp) -> DslResult<NodeRef> {
        let Sexp::List(items) = sexp else {
            return Err(DslError::Sexp(format!(
                "expected a list form, found {:?}",
                sexp
            )));
        };
        let Some(Sexp::Sym(head)) = items.first() else {
            return Err(DslError::Sexp(format!(
                "expected a symbol head, found {:?}",
                items.first()
            )));
        };

        if head == "@param" {
            let Some(Sexp::Num(index)) = items.get(1) else {
                return Err(DslError::Sexp("@param requires an index".into()));
            };
            return self.make_param(*index);
        }

        if let Some(ty) = self.spec.get_type(head) {
            if ty.is_enum() {
                let Some(Sexp::Str(value)) = items.get(1) else {
                    return Err(DslError::Sexp(format!(
                        "enum atom of type {} requires a quoted literal",
                        head
                    )));
                };
                return self.make_enum(head, value);
            }
        }

        let args = items[1..]
            .iter()
            .map(|item| self.node_from_sexp(item))
            .collect::<DslResult<Vec<_>>>()?;
        self.make_apply(head, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::print_sexp;
    use weaver_spec::parse;

    fn toy() -> weaver_spec::Spec {
        parse(
            r#"
            enum SmallInt { "0", "1", "2", "3" }
            value Int;
            program Toy(Int, Int) -> Int;
            func const: Int -> SmallInt;
            func plus: Int -> Int, Int;
            func mult: Int -> Int, Int;
            "#,
        )
        .unwrap()
    }

    #[test]
    fn make_apply_resolves_by_name() {
        let spec = toy();
        let b = Builder::new(&spec);
        let prog = b
            .make_apply("plus", vec![b.make_param(0).unwrap(), b.make_param(1).unwrap()])
            .unwrap();
        assert_eq!(prog.name(), Some("plus"));
        assert_eq!(prog.ty().name(), "Int");
    }

    #[test]
    fn make_node_rejects_children_on_leaves() {
        let spec = toy();
        let b = Builder::new(&spec);
        let param_prod = spec.param_production_or_raise(0).unwrap().id();
        let child = b.make_param(1).unwrap();
        assert!(matches!(
            b.make_node(param_prod, vec![child]),
            Err(DslError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn unknown_names_surface_spec_errors() {
        let spec = toy();
        let b = Builder::new(&spec);
        assert!(matches!(
            b.make_apply("pow", vec![]),
            Err(DslError::Spec(_))
        ));
        assert!(matches!(b.make_enum("SmallInt", "9"), Err(DslError::Spec(_))));
        assert!(matches!(b.make_param(7), Err(DslError::Spec(_))));
    }

    #[test]
    fn sexp_round_trip_is_deep_equal() {
        let spec = toy();
        let b = Builder::new(&spec);
        let src = "(mult (const (SmallInt \"2\")) (plus (@param 0) (@param 1)))";
        let prog = b.from_sexp(src).unwrap();
        let printed = print_sexp(&prog);
        assert_eq!(printed, src);
        let reparsed = b.from_sexp(&printed).unwrap();
        assert!(prog.deep_eq(&reparsed));
        assert_eq!(prog.deep_hash(), reparsed.deep_hash());
    }

    #[test]
    fn from_sexp_rejects_malformed_forms() {
        let spec = toy();
        let b = Builder::new(&spec);
        assert!(b.from_sexp("plus").is_err());
        assert!(b.from_sexp("(@param x)").is_err());
        assert!(b.from_sexp("(SmallInt 1)").is_err());
        assert!(b.from_sexp("(plus (@param 0))").is_err());
    }
}
