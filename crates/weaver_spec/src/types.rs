//! DSL types: enum types with finite domains, value types with properties.
//!
//! Types compare by name. Two `TypeRef`s obtained from the same spec for the
//! same name are interchangeable everywhere, including as hash-map keys.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::{SpecError, SpecResult};

/// The sort of a constraint expression or property.
///
/// `Value` is the sort of raw `@ret`/`@arg` references; properties observe a
/// value and yield `Bool` or `Int`. Only the latter two are legal property
/// result sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    /// An opaque runtime value; only property access applies.
    Value,
    /// A boolean observation.
    Bool,
    /// An integer observation.
    Int,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Value => write!(f, "value"),
            Sort::Bool => write!(f, "bool"),
            Sort::Int => write!(f, "int"),
        }
    }
}

/// A named abstract observation on a runtime value.
///
/// The interpreter computes properties; the spec only declares their names
/// and result sorts so constraints can be sort-checked at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// The property name, unique within its owning type.
    pub name: String,
    /// The declared result sort; always `Bool` or `Int`.
    pub sort: Sort,
}

/// The two kinds of DSL type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// A finite, ordered domain of literal values.
    Enum { domain: Vec<String> },
    /// An opaque runtime value observed through properties.
    Value { properties: Vec<Property> },
}

/// A named DSL type. Identity is the name.
#[derive(Debug, Clone)]
pub struct TypeDef {
    name: String,
    kind: TypeKind,
}

/// Shared handle to a type definition.
pub type TypeRef = Rc<TypeDef>;

impl TypeDef {
    /// Creates an enum type with the given ordered domain of literals.
    pub fn enumeration(name: impl Into<String>, domain: Vec<String>) -> TypeRef {
        Rc::new(TypeDef {
            name: name.into(),
            kind: TypeKind::Enum { domain },
        })
    }

    /// Creates a value type with the given properties.
    ///
    /// Fails on duplicate property names and on properties declared with the
    /// `Value` sort.
    pub fn value(
        name: impl Into<String>,
        properties: Vec<(String, Sort)>,
    ) -> SpecResult<TypeRef> {
        let name = name.into();
        let mut props: Vec<Property> = Vec::with_capacity(properties.len());
        for (pname, sort) in properties {
            if props.iter().any(|p| p.name == pname) {
                return Err(SpecError::DuplicateProperty {
                    ty: name,
                    property: pname,
                });
            }
            if sort == Sort::Value {
                return Err(SpecError::SortMismatch {
                    expected: Sort::Bool,
                    found: Sort::Value,
                    context: format!("property '{}' of type '{}'", pname, name),
                });
            }
            props.push(Property { name: pname, sort });
        }
        Ok(Rc::new(TypeDef {
            name,
            kind: TypeKind::Value { properties: props },
        }))
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum { .. })
    }

    pub fn is_value(&self) -> bool {
        matches!(self.kind, TypeKind::Value { .. })
    }

    /// The ordered literal domain of an enum type; empty for value types.
    pub fn domain(&self) -> &[String] {
        match &self.kind {
            TypeKind::Enum { domain } => domain,
            TypeKind::Value { .. } => &[],
        }
    }

    /// The declared properties of a value type; empty for enum types.
    pub fn properties(&self) -> &[Property] {
        match &self.kind {
            TypeKind::Value { properties } => properties,
            TypeKind::Enum { .. } => &[],
        }
    }

    /// The result sort of the named property, if declared.
    pub fn property_sort(&self, name: &str) -> Option<Sort> {
        self.properties()
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.sort)
    }

    /// Like [`property_sort`](Self::property_sort) but fails with a typed error.
    pub fn property_sort_or_raise(&self, name: &str) -> SpecResult<Sort> {
        self.property_sort(name)
            .ok_or_else(|| SpecError::UnknownProperty {
                ty: self.name.clone(),
                property: name.to_string(),
            })
    }
}

impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeDef {}

impl Hash for TypeDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
