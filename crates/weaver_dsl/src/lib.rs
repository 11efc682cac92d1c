//! # weaver-dsl
//!
//! Candidate programs as immutable, typed trees over the productions of a
//! [`Spec`](weaver_spec::Spec).
//!
//! An [`Ast`] node is one of three kinds, mirroring the production kinds:
//! atoms (enum choices), params (program inputs), and applies (function
//! applications over typed children). Construction enforces arity and
//! argument types, so a node that exists is well typed by construction.
//!
//! Nodes are shared via [`NodeRef`] (`Rc`); trees are never mutated after
//! construction, so structural sharing between candidates is safe. Semantic
//! comparison is always *deep* ([`Ast::deep_eq`] / [`Ast::deep_hash`]);
//! utilities that need to tell two occurrences of the same subtree apart
//! ([`NodeIndexer`], [`ParentFinder`]) key on node addresses internally.

pub mod builder;
pub mod error;
pub mod indexer;
pub mod iterator;
pub mod node;
pub mod parent;
pub mod sexp;

pub use builder::Builder;
pub use error::DslError;
pub use indexer::NodeIndexer;
pub use iterator::{bfs, post_order};
pub use node::{Ast, NodeRef};
pub use parent::ParentFinder;
