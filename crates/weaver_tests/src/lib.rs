//! Integration test suite for the weaver workspace.
//!
//! This crate exists only to run the tests under `tests/`; all test code
//! lives there. The scenarios cover the full synthesis pipeline over a toy
//! integer-arithmetic DSL:
//!
//! | File | Scenarios |
//! |------|-----------|
//! | `deciders.rs` | concrete pass/fail, blame extraction, implication expansion, custom output equality, assertion-violation blame |
//! | `closure.rs` | end-to-end synthesis with the k-tree and lines enumerators |
//!
//! Run with `cargo test -p weaver-tests` (requires a Z3 installation).
