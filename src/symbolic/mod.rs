//! The Symbolic Algebra Facade: a thin, purpose-built computer algebra
//! layer exposing exactly the operations the dynamics derivation
//! pipeline and the homogeneous-transform engine need.

mod compile;
mod expr;
mod matrix;

pub use compile::{compile_vector, Compiled};
pub use expr::{Symbol, Sym};
pub use matrix::{equations_to_matrix, SymMatrix};
