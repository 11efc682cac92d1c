//! The assembled DSL spec and its builder.
//!
//! [`SpecBuilder`] accumulates type, program, function, and predicate
//! declarations (the parser drives it, but it is equally usable from code),
//! then [`build`](SpecBuilder::build) freezes everything into a [`Spec`]:
//!
//! - every enum type contributes one enum production per domain element,
//! - every program input contributes one parameter production, in order,
//! - production ids are assigned densely: functions first (declaration
//!   order), then enum choices, then parameters.
//!
//! A `Spec` is immutable. Lookups are O(1) and each has an `_or_raise`
//! variant that fails with a typed [`SpecError`] instead of returning `None`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{SpecError, SpecResult};
use crate::expr::Expr;
use crate::predicate::{PredArg, Predicate};
use crate::production::{ProdRef, Production, ProductionKind};
use crate::types::{Sort, TypeDef, TypeRef};

/// An immutable DSL specification: types, productions, program signature,
/// and enumeration predicates.
#[derive(Debug)]
pub struct Spec {
    name: String,
    types: Vec<TypeRef>,
    type_map: HashMap<String, TypeRef>,
    inputs: Vec<TypeRef>,
    output: TypeRef,
    productions: Vec<ProdRef>,
    lhs_map: HashMap<String, Vec<ProdRef>>,
    func_order: Vec<ProdRef>,
    func_map: HashMap<String, ProdRef>,
    param_map: Vec<ProdRef>,
    predicates: Vec<Predicate>,
}

impl Spec {
    // ---- Types ----

    pub fn get_type(&self, name: &str) -> Option<&TypeRef> {
        self.type_map.get(name)
    }

    pub fn get_type_or_raise(&self, name: &str) -> SpecResult<&TypeRef> {
        self.get_type(name).ok_or_else(|| SpecError::TypeNotFound {
            name: name.to_string(),
        })
    }

    /// All declared types, in declaration order.
    pub fn types(&self) -> &[TypeRef] {
        &self.types
    }

    pub fn num_types(&self) -> usize {
        self.types.len()
    }

    // ---- Productions ----

    pub fn get_production(&self, id: usize) -> Option<&ProdRef> {
        self.productions.get(id)
    }

    pub fn get_production_or_raise(&self, id: usize) -> SpecResult<&ProdRef> {
        self.get_production(id)
            .ok_or(SpecError::ProductionNotFound { id })
    }

    /// Productions whose lhs is the named type, in declaration order.
    ///
    /// Unknown type names yield an empty slice.
    pub fn productions_with_lhs(&self, ty: &str) -> &[ProdRef] {
        self.lhs_map.get(ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn function_production(&self, name: &str) -> Option<&ProdRef> {
        self.func_map.get(name)
    }

    pub fn function_production_or_raise(&self, name: &str) -> SpecResult<&ProdRef> {
        self.function_production(name)
            .ok_or_else(|| SpecError::FunctionNotFound {
                name: name.to_string(),
            })
    }

    /// All function productions, in declaration order.
    pub fn function_productions(&self) -> &[ProdRef] {
        &self.func_order
    }

    pub fn param_production(&self, index: usize) -> Option<&ProdRef> {
        self.param_map.get(index)
    }

    pub fn param_production_or_raise(&self, index: usize) -> SpecResult<&ProdRef> {
        self.param_production(index)
            .ok_or(SpecError::ParamNotFound { index })
    }

    /// One parameter production per program input, in input order.
    pub fn param_productions(&self) -> &[ProdRef] {
        &self.param_map
    }

    /// The enum production for a literal of the given enum type.
    pub fn enum_production(&self, ty: &TypeRef, value: &str) -> Option<&ProdRef> {
        if !ty.is_enum() {
            return None;
        }
        self.productions_with_lhs(ty.name())
            .iter()
            .find(|p| p.enum_literal() == Some(value))
    }

    pub fn enum_production_or_raise(&self, ty: &TypeRef, value: &str) -> SpecResult<&ProdRef> {
        self.enum_production(ty, value)
            .ok_or_else(|| SpecError::EnumValueNotFound {
                ty: ty.name().to_string(),
                value: value.to_string(),
            })
    }

    /// All productions, indexed by id.
    pub fn productions(&self) -> &[ProdRef] {
        &self.productions
    }

    pub fn num_productions(&self) -> usize {
        self.productions.len()
    }

    /// The largest arity over all function productions.
    pub fn max_arity(&self) -> usize {
        self.func_order.iter().map(|p| p.arity()).max().unwrap_or(0)
    }

    // ---- Program signature ----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[TypeRef] {
        &self.inputs
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn output(&self) -> &TypeRef {
        &self.output
    }

    // ---- Predicates ----

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn predicates_with_name(&self, name: &str) -> impl Iterator<Item = &Predicate> {
        let name = name.to_string();
        self.predicates.iter().filter(move |p| p.name() == name)
    }

    pub fn num_predicates(&self) -> usize {
        self.predicates.len()
    }
}

/// Accumulates declarations and freezes them into a [`Spec`].
#[derive(Debug, Default)]
pub struct SpecBuilder {
    types: Vec<TypeRef>,
    type_map: HashMap<String, TypeRef>,
    program: Option<(String, Vec<TypeRef>, TypeRef)>,
    functions: Vec<(String, TypeRef, Vec<TypeRef>, Vec<Expr>)>,
    predicates: Vec<Predicate>,
}

impl SpecBuilder {
    pub fn new() -> SpecBuilder {
        SpecBuilder::default()
    }

    fn define_type(&mut self, ty: TypeRef) -> SpecResult<TypeRef> {
        if self.type_map.contains_key(ty.name()) {
            return Err(SpecError::DuplicateType {
                name: ty.name().to_string(),
            });
        }
        self.type_map.insert(ty.name().to_string(), ty.clone());
        self.types.push(ty.clone());
        Ok(ty)
    }

    /// Declares an enum type with an ordered literal domain.
    pub fn define_enum(
        &mut self,
        name: impl Into<String>,
        domain: Vec<String>,
    ) -> SpecResult<TypeRef> {
        self.define_type(TypeDef::enumeration(name, domain))
    }

    /// Declares a value type with (possibly zero) properties.
    pub fn define_value(
        &mut self,
        name: impl Into<String>,
        properties: Vec<(String, Sort)>,
    ) -> SpecResult<TypeRef> {
        let ty = TypeDef::value(name, properties)?;
        self.define_type(ty)
    }

    /// Declares the program signature. Inputs and output must be value types.
    pub fn set_program(
        &mut self,
        name: impl Into<String>,
        inputs: Vec<TypeRef>,
        output: TypeRef,
    ) -> SpecResult<()> {
        for ty in inputs.iter().chain(std::iter::once(&output)) {
            if !ty.is_value() {
                return Err(SpecError::NonValueType {
                    name: ty.name().to_string(),
                    context: "program input/output",
                });
            }
        }
        self.program = Some((name.into(), inputs, output));
        Ok(())
    }

    /// Declares a function production.
    ///
    /// The lhs must be a value type, the rhs non-empty, and every constraint
    /// boolean.
    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        lhs: TypeRef,
        rhs: Vec<TypeRef>,
        constraints: Vec<Expr>,
    ) -> SpecResult<()> {
        let name = name.into();
        if self.functions.iter().any(|(n, _, _, _)| *n == name) {
            return Err(SpecError::DuplicateFunction { name });
        }
        if !lhs.is_value() {
            return Err(SpecError::NonValueType {
                name: lhs.name().to_string(),
                context: "function lhs",
            });
        }
        if rhs.is_empty() {
            return Err(SpecError::EmptyRhs { function: name });
        }
        for c in &constraints {
            if c.sort() != Sort::Bool {
                return Err(SpecError::NonBoolConstraint {
                    function: name,
                    found: c.sort(),
                });
            }
        }
        self.functions.push((name, lhs, rhs, constraints));
        Ok(())
    }

    /// Records a spec-scope predicate, verbatim.
    pub fn add_predicate(&mut self, name: impl Into<String>, args: Vec<PredArg>) {
        self.predicates.push(Predicate::new(name, args));
    }

    /// Resolves a type declared earlier on this builder.
    pub fn lookup_type(&self, name: &str) -> Option<TypeRef> {
        self.type_map.get(name).cloned()
    }

    /// Freezes the builder into an immutable [`Spec`], deriving the enum and
    /// parameter productions and assigning all production ids.
    pub fn build(self) -> SpecResult<Spec> {
        let (name, inputs, output) = self.program.ok_or(SpecError::MissingProgram)?;

        let mut productions: Vec<ProdRef> = Vec::new();
        let mut lhs_map: HashMap<String, Vec<ProdRef>> = HashMap::new();
        let mut func_order: Vec<ProdRef> = Vec::new();
        let mut func_map: HashMap<String, ProdRef> = HashMap::new();
        let mut param_map: Vec<ProdRef> = Vec::new();

        let push = |prod: Production,
                        productions: &mut Vec<ProdRef>,
                        lhs_map: &mut HashMap<String, Vec<ProdRef>>|
         -> ProdRef {
            let prod = Rc::new(prod);
            lhs_map
                .entry(prod.lhs().name().to_string())
                .or_default()
                .push(prod.clone());
            productions.push(prod.clone());
            prod
        };

        for (fname, lhs, rhs, constraints) in self.functions {
            let id = productions.len();
            let prod = push(
                Production::new(
                    id,
                    lhs,
                    ProductionKind::Function {
                        name: fname.clone(),
                        rhs,
                        constraints,
                    },
                ),
                &mut productions,
                &mut lhs_map,
            );
            func_order.push(prod.clone());
            func_map.insert(fname, prod);
        }

        for ty in self.types.iter().filter(|t| t.is_enum()) {
            for choice in 0..ty.domain().len() {
                let id = productions.len();
                push(
                    Production::new(id, ty.clone(), ProductionKind::Enum { choice }),
                    &mut productions,
                    &mut lhs_map,
                );
            }
        }

        for (index, ty) in inputs.iter().enumerate() {
            let id = productions.len();
            let prod = push(
                Production::new(id, ty.clone(), ProductionKind::Param { index }),
                &mut productions,
                &mut lhs_map,
            );
            param_map.push(prod);
        }

        Ok(Spec {
            name,
            types: self.types,
            type_map: self.type_map,
            inputs,
            output,
            productions,
            lhs_map,
            func_order,
            func_map,
            param_map,
            predicates: self.predicates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, Expr};

    fn toy_builder() -> (SpecBuilder, TypeRef, TypeRef) {
        let mut b = SpecBuilder::new();
        let small = b
            .define_enum("SmallInt", vec!["0".into(), "1".into()])
            .unwrap();
        let int = b.define_value("Int", vec![]).unwrap();
        b.set_program("Toy", vec![int.clone(), int.clone()], int.clone())
            .unwrap();
        (b, small, int)
    }

    #[test]
    fn build_derives_enum_and_param_productions() {
        let (mut b, small, int) = toy_builder();
        b.add_function("const", int.clone(), vec![small], vec![])
            .unwrap();
        let spec = b.build().unwrap();

        // 1 function + 2 enum choices + 2 params
        assert_eq!(spec.num_productions(), 5);
        assert_eq!(spec.param_productions().len(), 2);
        assert_eq!(spec.param_production(0).unwrap().param_index(), Some(0));
        assert_eq!(spec.param_production(1).unwrap().param_index(), Some(1));

        let sm = spec.get_type_or_raise("SmallInt").unwrap().clone();
        let zero = spec.enum_production_or_raise(&sm, "0").unwrap();
        assert_eq!(zero.enum_literal(), Some("0"));
        assert!(spec.enum_production(&sm, "7").is_none());
        assert!(spec.enum_production(&int, "0").is_none());
    }

    #[test]
    fn production_ids_are_dense_and_stable() {
        let (mut b, small, int) = toy_builder();
        b.add_function("const", int.clone(), vec![small], vec![])
            .unwrap();
        b.add_function("plus", int.clone(), vec![int.clone(), int.clone()], vec![])
            .unwrap();
        let spec = b.build().unwrap();

        for (id, prod) in spec.productions().iter().enumerate() {
            assert_eq!(prod.id(), id);
        }
        let by_name = spec.function_production_or_raise("plus").unwrap();
        let by_id = spec.get_production_or_raise(by_name.id()).unwrap();
        assert_eq!(by_name.id(), by_id.id());
        assert!(Rc::ptr_eq(by_name, by_id));
    }

    #[test]
    fn productions_with_lhs_preserves_declaration_order() {
        let (mut b, small, int) = toy_builder();
        b.add_function("const", int.clone(), vec![small], vec![])
            .unwrap();
        b.add_function("plus", int.clone(), vec![int.clone(), int.clone()], vec![])
            .unwrap();
        let spec = b.build().unwrap();

        let prods = spec.productions_with_lhs("Int");
        // const, plus, then the two derived params
        assert_eq!(prods.len(), 4);
        assert_eq!(prods[0].name(), Some("const"));
        assert_eq!(prods[1].name(), Some("plus"));
        assert!(prods[2].is_param());
        assert!(prods[3].is_param());
        assert!(spec.productions_with_lhs("NotAType").is_empty());
    }

    #[test]
    fn arity_zero_function_is_refused() {
        let (mut b, _, int) = toy_builder();
        let res = b.add_function("nullary", int, vec![], vec![]);
        assert!(matches!(res, Err(SpecError::EmptyRhs { .. })));
    }

    #[test]
    fn duplicate_function_is_refused() {
        let (mut b, small, int) = toy_builder();
        b.add_function("const", int.clone(), vec![small.clone()], vec![])
            .unwrap();
        let res = b.add_function("const", int, vec![small], vec![]);
        assert!(matches!(res, Err(SpecError::DuplicateFunction { .. })));
    }

    #[test]
    fn non_bool_constraint_is_refused() {
        let (mut b, small, int) = toy_builder();
        let res = b.add_function("const", int, vec![small], vec![Expr::int(1)]);
        assert!(matches!(res, Err(SpecError::NonBoolConstraint { .. })));
    }

    #[test]
    fn enum_program_io_is_refused() {
        let mut b = SpecBuilder::new();
        let small = b.define_enum("SmallInt", vec!["0".into()]).unwrap();
        let int = b.define_value("Int", vec![]).unwrap();
        let res = b.set_program("Toy", vec![small], int);
        assert!(matches!(res, Err(SpecError::NonValueType { .. })));
    }

    #[test]
    fn missing_program_is_refused() {
        let b = SpecBuilder::new();
        assert!(matches!(b.build(), Err(SpecError::MissingProgram)));
    }

    #[test]
    fn predicates_filter_by_name() {
        let (mut b, small, int) = toy_builder();
        b.add_function("const", int, vec![small], vec![]).unwrap();
        b.add_predicate("occurs", vec![PredArg::Str("const".into()), PredArg::Int(90)]);
        b.add_predicate("not_occurs", vec![PredArg::Str("const".into()), PredArg::Int(5)]);
        b.add_predicate("occurs", vec![PredArg::Str("const".into()), PredArg::Int(10)]);
        let spec = b.build().unwrap();

        assert_eq!(spec.num_predicates(), 3);
        assert_eq!(spec.predicates_with_name("occurs").count(), 2);
        assert_eq!(spec.predicates_with_name("is_parent").count(), 0);
    }

    #[test]
    fn constraint_sort_mismatch_surfaces_from_expr() {
        // Building the expression itself fails; the spec never sees it.
        let bad = Expr::binary(BinaryOp::And, Expr::int(1), Expr::boolean(true));
        assert!(bad.is_err());
    }
}
