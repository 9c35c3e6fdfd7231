//! Compilation of symbolic expressions into numeric callables over named
//! argument groups.
//!
//! This is a direct-eval compiler (the tree is walked once per call
//! against a binding table built from the argument groups), not a
//! bytecode virtual machine. The pack's `Instruction`-style stack
//! machines were considered and are noted as rejected in DESIGN.md: the
//! expression sizes this crate produces (a handful of joints, at most a
//! few hundred nodes) do not amortize the complexity of a bytecode
//! compiler.

use super::expr::{Symbol, Sym};
use super::matrix::SymMatrix;
use crate::error::DynError;
use std::collections::HashMap;

/// A symbolic expression (or matrix, flattened row-major) compiled
/// against one or more named argument groups.
pub struct Compiled {
    groups: Vec<Vec<Symbol>>,
    exprs: Vec<Sym>,
    shape: (usize, usize),
}

impl Compiled {
    fn group_lens(&self) -> Vec<usize> {
        self.groups.iter().map(Vec::len).collect()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Evaluates the compiled form against one numeric slice per
    /// argument group, in the same order the groups were declared.
    /// Returns the flattened (row-major) numeric result.
    pub fn eval(&self, args: &[&[f64]]) -> Result<Vec<f64>, DynError> {
        let expected = self.group_lens();
        if args.len() != expected.len() {
            return Err(DynError::ShapeMismatch {
                expected: expected.iter().sum(),
                got: args.len(),
            });
        }
        let mut bindings = HashMap::new();
        for (group, values) in self.groups.iter().zip(args.iter()) {
            if group.len() != values.len() {
                return Err(DynError::ShapeMismatch {
                    expected: group.len(),
                    got: values.len(),
                });
            }
            for (sym, &v) in group.iter().zip(values.iter()) {
                bindings.insert(sym.clone(), v);
            }
        }
        self.exprs
            .iter()
            .map(|e| e.eval(&bindings).ok_or(DynError::CasBackendError("unbound symbol during evaluation".into())))
            .collect()
    }
}

impl Sym {
    /// Compiles this scalar expression against the given argument
    /// groups (e.g. `&[&q, &qd]`).
    pub fn compile(&self, groups: &[&[Symbol]]) -> Compiled {
        Compiled {
            groups: groups.iter().map(|g| g.to_vec()).collect(),
            exprs: vec![self.clone()],
            shape: (1, 1),
        }
    }
}

impl SymMatrix {
    /// Compiles every entry of this matrix (row-major) against the given
    /// argument groups.
    pub fn compile(&self, groups: &[&[Symbol]]) -> Compiled {
        Compiled {
            groups: groups.iter().map(|g| g.to_vec()).collect(),
            exprs: self.data().to_vec(),
            shape: (self.rows(), self.cols()),
        }
    }
}

/// Compiles a flat vector of scalar expressions (e.g. a length-n V or G
/// vector) against the given argument groups.
pub fn compile_vector(exprs: &[Sym], groups: &[&[Symbol]]) -> Compiled {
    Compiled {
        groups: groups.iter().map(|g| g.to_vec()).collect(),
        exprs: exprs.to_vec(),
        shape: (exprs.len(), 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_scalar_over_single_group() {
        let x = Symbol::new("x");
        let e = Sym::var(&x).powi(2);
        let compiled = e.compile(&[&[x]]);
        let out = compiled.eval(&[&[3.0]]).unwrap();
        assert_eq!(out, vec![9.0]);
    }

    #[test]
    fn compiles_over_two_groups() {
        let x = Symbol::new("x");
        let y = Symbol::new("y");
        let e = Sym::var(&x) + Sym::var(&y);
        let compiled = e.compile(&[&[x], &[y]]);
        let out = compiled.eval(&[&[1.0], &[2.0]]).unwrap();
        assert_eq!(out, vec![3.0]);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let x = Symbol::new("x");
        let e = Sym::var(&x);
        let compiled = e.compile(&[&[x]]);
        assert!(matches!(compiled.eval(&[&[1.0, 2.0]]), Err(DynError::ShapeMismatch { .. })));
    }
}
