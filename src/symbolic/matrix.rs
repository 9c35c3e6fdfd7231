//! Dense symbolic matrices over [`Sym`], plus the "equations to matrix"
//! linear decomposition.

use super::expr::{Symbol, Sym};
use crate::error::DynError;
use std::collections::HashMap;

/// A dense, row-major matrix of symbolic scalars.
#[derive(Clone, Debug, PartialEq)]
pub struct SymMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Sym>,
}

impl SymMatrix {
    pub fn from_vec(rows: usize, cols: usize, data: Vec<Sym>) -> Self {
        assert_eq!(rows * cols, data.len(), "matrix data length must equal rows*cols");
        Self { rows, cols, data }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::from_vec(rows, cols, vec![Sym::zero(); rows * cols])
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, Sym::one());
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, r: usize, c: usize) -> &Sym {
        &self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, v: Sym) {
        self.data[r * self.cols + c] = v;
    }

    pub fn row(&self, r: usize) -> Vec<Sym> {
        (0..self.cols).map(|c| self.get(r, c).clone()).collect()
    }

    pub fn col(&self, c: usize) -> Vec<Sym> {
        (0..self.rows).map(|r| self.get(r, c).clone()).collect()
    }

    pub fn data(&self) -> &[Sym] {
        &self.data
    }

    pub fn is_literal_zero(&self) -> bool {
        self.data.iter().all(Sym::is_zero_literal)
    }

    pub fn transpose(&self) -> SymMatrix {
        let mut out = SymMatrix::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c).clone());
            }
        }
        out
    }

    pub fn mul(&self, rhs: &SymMatrix) -> SymMatrix {
        assert_eq!(self.cols, rhs.rows, "matrix shape mismatch in multiplication");
        let mut out = SymMatrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for j in 0..rhs.cols {
                let mut acc = Sym::zero();
                for k in 0..self.cols {
                    acc = acc + self.get(i, k).clone() * rhs.get(k, j).clone();
                }
                out.set(i, j, acc);
            }
        }
        out
    }

    pub fn add(&self, rhs: &SymMatrix) -> SymMatrix {
        assert_eq!((self.rows, self.cols), (rhs.rows, rhs.cols));
        let data = self
            .data
            .iter()
            .zip(rhs.data.iter())
            .map(|(a, b)| a.clone() + b.clone())
            .collect();
        SymMatrix::from_vec(self.rows, self.cols, data)
    }

    pub fn scale(&self, s: &Sym) -> SymMatrix {
        let data = self.data.iter().map(|a| a.clone() * s.clone()).collect();
        SymMatrix::from_vec(self.rows, self.cols, data)
    }

    pub fn simplify(&self) -> SymMatrix {
        let data = self.data.iter().map(Sym::simplify).collect();
        SymMatrix::from_vec(self.rows, self.cols, data)
    }

    pub fn subs_all(&self, map: &HashMap<Symbol, Sym>) -> SymMatrix {
        let data = self.data.iter().map(|e| e.subs_all(map)).collect();
        SymMatrix::from_vec(self.rows, self.cols, data)
    }

    pub fn diff(&self, wrt: &Symbol) -> SymMatrix {
        let data = self.data.iter().map(|e| e.diff(wrt)).collect();
        SymMatrix::from_vec(self.rows, self.cols, data)
    }

    /// Determinant via recursive cofactor (Laplace) expansion along the
    /// first row. Exponential in `n`, which is acceptable for the small
    /// (≤ ~7) joint counts this crate targets.
    pub fn determinant(&self) -> Sym {
        assert_eq!(self.rows, self.cols, "determinant requires a square matrix");
        let n = self.rows;
        match n {
            0 => Sym::one(),
            1 => self.get(0, 0).clone(),
            2 => self.get(0, 0).clone() * self.get(1, 1).clone() - self.get(0, 1).clone() * self.get(1, 0).clone(),
            _ => {
                let mut det = Sym::zero();
                for j in 0..n {
                    let cofactor = self.minor(0, j).determinant();
                    let signed = if j % 2 == 0 { cofactor } else { -cofactor };
                    det = det + self.get(0, j).clone() * signed;
                }
                det
            }
        }
    }

    fn minor(&self, skip_row: usize, skip_col: usize) -> SymMatrix {
        let n = self.rows;
        let mut data = Vec::with_capacity((n - 1) * (n - 1));
        for r in 0..n {
            if r == skip_row {
                continue;
            }
            for c in 0..n {
                if c == skip_col {
                    continue;
                }
                data.push(self.get(r, c).clone());
            }
        }
        SymMatrix::from_vec(n - 1, n - 1, data)
    }

    /// Matrix inverse via the classical adjugate (cofactor transpose)
    /// construction: `M⁻¹ = adj(M) / det(M)`.
    ///
    /// `M⁻¹ := 0` is returned only when `self` is the *literal* all-zero
    /// matrix (the degenerate empty-model case); any other matrix whose
    /// determinant simplifies to the literal constant zero is reported
    /// as `SingularMatrix` rather than silently zeroed.
    pub fn inverse(&self) -> Result<SymMatrix, DynError> {
        assert_eq!(self.rows, self.cols, "inverse requires a square matrix");
        if self.is_literal_zero() {
            return Ok(SymMatrix::zeros(self.rows, self.cols));
        }

        let n = self.rows;
        let det = self.determinant().simplify();
        if let Some(0.0) = det.as_const() {
            return Err(DynError::SingularMatrix);
        }

        let mut adjugate = SymMatrix::zeros(n, n);
        for r in 0..n {
            for c in 0..n {
                let cofactor = self.minor(r, c).determinant();
                let signed = if (r + c) % 2 == 0 { cofactor } else { -cofactor };
                // adjugate is the transpose of the cofactor matrix.
                adjugate.set(c, r, signed);
            }
        }
        Ok(adjugate.scale(&(Sym::one() / det)))
    }
}

/// "Equations to matrix" decomposition: given a vector expression
/// `exprs` that is affine in `vars`, returns `(A, c)` with
/// `exprs = A·vars + c`. Valid unconditionally when the linearity
/// precondition holds; callers (the Euler-Lagrange decomposition) are
/// responsible for that guarantee.
pub fn equations_to_matrix(exprs: &[Sym], vars: &[Symbol]) -> (SymMatrix, Vec<Sym>) {
    let mut a = SymMatrix::zeros(exprs.len(), vars.len());
    for (i, e) in exprs.iter().enumerate() {
        for (j, v) in vars.iter().enumerate() {
            a.set(i, j, e.diff(v));
        }
    }
    let c = exprs.iter().map(|e| e.subs_zero(vars)).collect();
    (a, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinant_2x2() {
        let m = SymMatrix::from_vec(2, 2, vec![Sym::konst(1.0), Sym::konst(2.0), Sym::konst(3.0), Sym::konst(4.0)]);
        assert_eq!(m.determinant().simplify().as_const(), Some(-2.0));
    }

    #[test]
    fn inverse_identity() {
        let m = SymMatrix::identity(3);
        let inv = m.inverse().unwrap().simplify();
        assert_eq!(inv, SymMatrix::identity(3).simplify());
    }

    #[test]
    fn inverse_zero_matrix_is_zero() {
        let m = SymMatrix::zeros(2, 2);
        let inv = m.inverse().unwrap();
        assert!(inv.is_literal_zero());
    }

    #[test]
    fn inverse_singular_nonzero_errors() {
        let m = SymMatrix::from_vec(2, 2, vec![Sym::konst(1.0), Sym::konst(2.0), Sym::konst(2.0), Sym::konst(4.0)]);
        assert!(matches!(m.inverse(), Err(DynError::SingularMatrix)));
    }

    #[test]
    fn equations_to_matrix_extracts_linear_form() {
        let (ax, ax_e) = (Symbol::new("a"), ());
        let _ = ax_e;
        let a = ax;
        let b = Symbol::new("b");
        let e0 = Sym::var(&a) * Sym::konst(2.0) + Sym::konst(3.0);
        let e1 = Sym::var(&b) * Sym::konst(5.0);
        let (mat, c) = equations_to_matrix(&[e0, e1], &[a.clone(), b]);
        assert_eq!(mat.get(0, 0).simplify().as_const(), Some(2.0));
        assert_eq!(mat.get(1, 1).simplify().as_const(), Some(5.0));
        assert_eq!(c[0].simplify().as_const(), Some(3.0));
        assert_eq!(c[1].simplify().as_const(), Some(0.0));
    }
}
