#![forbid(unsafe_code)]
//! Osprey Language Compiler Front End
//!
//! Osprey is a small imperative language with typed scalars, fixed-length
//! arrays, nested procedures, and if/for/return control flow. This crate is
//! its compiler front end: a lexer with one-token pushback, a chained-scope
//! symbol table, and a single-pass recursive-descent parser that type checks
//! and drives SSA IR construction as it goes. There is no syntax tree.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **True invariants**: If a panic represents a compiler bug (logic error), use `.expect("INVARIANT: reason")` with a
//!   clear explanation.

pub mod backend;
pub mod cli;
pub mod frontend;

pub use frontend::diagnostics;
pub use frontend::lexer;
pub use frontend::parser;
pub use frontend::symbols;
pub use frontend::token;
pub use frontend::types;

pub use backend::ir::{IrBuilder, NullBuilder};
pub use backend::ssa::SsaModule;
