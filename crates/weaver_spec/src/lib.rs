//! # weaver-spec
//!
//! The DSL specification model: everything the synthesizer knows about the
//! search space before it sees a single example.
//!
//! A [`Spec`] is built once (usually by [`parse`] from the textual spec
//! format) and is immutable afterwards. It holds:
//!
//! - **Types** ([`TypeDef`]): enum types with a finite literal domain, and
//!   value types carrying named abstract [`Property`] observations.
//! - **Productions** ([`Production`]): the typed grammar rules candidate
//!   programs are built from. Enum choices and input parameters are derived
//!   automatically; function productions come from `func` declarations and
//!   may carry boolean constraint expressions over `@ret`/`@arg` properties.
//! - **Predicates** ([`Predicate`]): spec-scope directives that shape
//!   enumeration order (soft weights, parent/child restrictions, ordering).
//!
//! # Example
//!
//! ```
//! use weaver_spec::parse;
//!
//! let spec = parse(r#"
//!     enum SmallInt { "0", "1", "2", "3" }
//!     value Int;
//!     program Toy(Int, Int) -> Int;
//!     func const: Int -> SmallInt;
//!     func plus: Int -> Int, Int;
//! "#).unwrap();
//!
//! assert_eq!(spec.name(), "Toy");
//! assert!(spec.function_production("plus").is_some());
//! // 2 functions + 4 enum choices + 2 inputs
//! assert_eq!(spec.num_productions(), 8);
//! ```

pub mod error;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod predicate;
pub mod production;
pub mod spec;
pub mod types;

pub use error::SpecError;
pub use expr::{BinaryOp, ConstValue, Expr, UnaryOp};
pub use parser::parse;
pub use predicate::{PredArg, Predicate};
pub use production::{ProdRef, Production, ProductionKind};
pub use spec::{Spec, SpecBuilder};
pub use types::{Property, Sort, TypeDef, TypeKind, TypeRef};
