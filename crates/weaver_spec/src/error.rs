//! Spec-construction errors.
//!
//! Everything here is fatal at spec-build time: a malformed grammar file, an
//! unknown type name, a duplicated property, a sort mismatch inside a
//! constraint expression. Once a [`Spec`](crate::Spec) exists, none of these
//! can occur again.

use std::fmt;

use weaver_base::SpannedError;

use crate::types::Sort;

/// Result alias for spec construction and lookup.
pub type SpecResult<T> = Result<T, SpecError>;

/// A failure while building or querying a DSL spec.
#[derive(Debug, Clone)]
pub enum SpecError {
    /// The spec source text could not be tokenized or parsed.
    Syntax(SpannedError),

    /// A type with this name was declared twice.
    DuplicateType { name: String },

    /// A declaration referenced a type that does not exist.
    UnknownType { name: String },

    /// A value type declared the same property twice.
    DuplicateProperty { ty: String, property: String },

    /// A constraint referenced a property the parameter's type does not have.
    UnknownProperty { ty: String, property: String },

    /// A function production with this name was declared twice.
    DuplicateFunction { name: String },

    /// Two parameter productions were registered for the same input slot.
    DuplicateParam { index: usize },

    /// A function production was declared with no arguments.
    EmptyRhs { function: String },

    /// A function lhs, program input, or program output was not a value type.
    NonValueType { name: String, context: &'static str },

    /// A constraint expression attached to a function was not boolean.
    NonBoolConstraint { function: String, found: Sort },

    /// An expression was built with an operand of the wrong sort.
    SortMismatch {
        expected: Sort,
        found: Sort,
        context: String,
    },

    /// An enum production referenced a domain index outside the type's domain.
    ChoiceOutOfRange { ty: String, choice: usize },

    /// The spec file never declared a `program` signature.
    MissingProgram,

    /// A lookup by production id found nothing.
    ProductionNotFound { id: usize },

    /// A lookup by function name found nothing.
    FunctionNotFound { name: String },

    /// A lookup by parameter index found nothing.
    ParamNotFound { index: usize },

    /// A lookup for an enum literal found nothing in the type's domain.
    EnumValueNotFound { ty: String, value: String },

    /// A lookup by type name found nothing.
    TypeNotFound { name: String },
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::Syntax(err) => write!(f, "spec syntax error: {}", err),
            SpecError::DuplicateType { name } => {
                write!(f, "type '{}' is already defined", name)
            }
            SpecError::UnknownType { name } => write!(f, "unknown type '{}'", name),
            SpecError::DuplicateProperty { ty, property } => {
                write!(f, "type '{}' declares property '{}' twice", ty, property)
            }
            SpecError::UnknownProperty { ty, property } => {
                write!(f, "type '{}' has no property '{}'", ty, property)
            }
            SpecError::DuplicateFunction { name } => {
                write!(f, "function '{}' is already defined", name)
            }
            SpecError::DuplicateParam { index } => {
                write!(f, "parameter production {} is already defined", index)
            }
            SpecError::EmptyRhs { function } => {
                write!(f, "function '{}' must take at least one argument", function)
            }
            SpecError::NonValueType { name, context } => {
                write!(f, "non-value type '{}' cannot be used as {}", name, context)
            }
            SpecError::NonBoolConstraint { function, found } => write!(
                f,
                "constraint on function '{}' has sort {}, expected bool",
                function, found
            ),
            SpecError::SortMismatch {
                expected,
                found,
                context,
            } => write!(
                f,
                "expected sort {} but found {} in {}",
                expected, found, context
            ),
            SpecError::ChoiceOutOfRange { ty, choice } => write!(
                f,
                "enum choice {} is outside the domain of type '{}'",
                choice, ty
            ),
            SpecError::MissingProgram => write!(f, "spec does not declare a program signature"),
            SpecError::ProductionNotFound { id } => {
                write!(f, "no production with id {}", id)
            }
            SpecError::FunctionNotFound { name } => {
                write!(f, "no function production named '{}'", name)
            }
            SpecError::ParamNotFound { index } => {
                write!(f, "no parameter production with index {}", index)
            }
            SpecError::EnumValueNotFound { ty, value } => {
                write!(f, "value \"{}\" is not in the domain of type '{}'", value, ty)
            }
            SpecError::TypeNotFound { name } => write!(f, "no type named '{}'", name),
        }
    }
}

impl std::error::Error for SpecError {}

impl From<SpannedError> for SpecError {
    fn from(err: SpannedError) -> Self {
        SpecError::Syntax(err)
    }
}
