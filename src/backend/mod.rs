//! IR backends.
//!
//! [`ir`] defines the builder contract the front end drives; [`ssa`] is the
//! shipping implementation, a printable SSA module.

pub mod ir;
pub mod ssa;
