//! The Osprey front end: lexing, parsing, and semantic analysis.
//!
//! The front end is single-pass. [`parser::Parser`] pulls tokens from
//! [`lexer::Lexer`], checks types against the [`symbols::ScopeChain`], and
//! drives an [`crate::backend::ir::IrBuilder`] as each construct is
//! recognized. There is no syntax tree.

pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod symbols;
pub mod token;
pub mod types;
