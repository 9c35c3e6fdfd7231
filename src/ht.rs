//! The Homogeneous Transform Engine: a symbolic 4×4 homogeneous
//! transform with the conventional `[[R, t], [0, 0, 0, 1]]` block
//! structure, plus composition, inversion, Euler decomposition and
//! Jacobians.

use crate::error::DynError;
use crate::symbolic::{Symbol, Sym, SymMatrix};
use crate::time_subs::TimeSubstitutionContext;
use std::collections::HashMap;
use std::ops::Mul;

/// One polymorphic construction argument: an explicit enum rather than
/// a dynamically-dispatched shape check, so each named constructor form
/// stays obvious at the call site.
pub enum HtArg {
    Matrix4x4(SymMatrix),
    Rotation3x3(SymMatrix),
    Translation3([Sym; 3]),
    /// `[translation; ZYX Euler]`.
    Wrench6([Sym; 6]),
    /// Column-major 16-vector reshape.
    Column16(Box<[Sym; 16]>),
    DhRow { theta: Sym, d: Sym, a: Sym, alpha: Sym },
}

/// A symbolic homogeneous transform. Immutable by convention: every
/// setter-like method returns a fresh `Ht` rather than mutating in
/// place.
///
/// `euler_cache` is a tagged-variant design, realized as an `Option`
/// rather than a two-armed enum: `Some` means this `Ht` was
/// last set via Euler angles and getting `euler()` returns the cached
/// triple verbatim (exact round-trip); `None` means `euler()` must
/// extract from `matrix` (lossy-looking, though mathematically
/// equivalent, symbolic form).
#[derive(Clone, Debug)]
pub struct Ht {
    matrix: SymMatrix,
    euler_cache: Option<[Sym; 3]>,
}

fn rot_z(angle: &Sym) -> SymMatrix {
    SymMatrix::from_vec(
        3,
        3,
        vec![
            angle.cos(), -angle.sin(), Sym::zero(),
            angle.sin(), angle.cos(), Sym::zero(),
            Sym::zero(), Sym::zero(), Sym::one(),
        ],
    )
}

fn rot_y(angle: &Sym) -> SymMatrix {
    SymMatrix::from_vec(
        3,
        3,
        vec![
            angle.cos(), Sym::zero(), angle.sin(),
            Sym::zero(), Sym::one(), Sym::zero(),
            -angle.sin(), Sym::zero(), angle.cos(),
        ],
    )
}

fn rot_x(angle: &Sym) -> SymMatrix {
    SymMatrix::from_vec(
        3,
        3,
        vec![
            Sym::one(), Sym::zero(), Sym::zero(),
            Sym::zero(), angle.cos(), -angle.sin(),
            Sym::zero(), angle.sin(), angle.cos(),
        ],
    )
}

/// Deskew: for a 3×3 skew-symmetric `W`, returns `(W32, W13, W21)`
/// 1-indexed, i.e. `(2,1)`, `(0,2)`, `(1,0)` with 0-indexed access.
fn deskew(w: &SymMatrix) -> [Sym; 3] {
    [w.get(2, 1).clone(), w.get(0, 2).clone(), w.get(1, 0).clone()]
}

fn block_4x4(r: &SymMatrix, t: &[Sym; 3]) -> SymMatrix {
    let mut m = SymMatrix::identity(4);
    for row in 0..3 {
        for col in 0..3 {
            m.set(row, col, r.get(row, col).clone());
        }
        m.set(row, 3, t[row].clone());
    }
    m
}

impl Ht {
    pub fn identity() -> Ht {
        Ht { matrix: SymMatrix::identity(4), euler_cache: None }
    }

    pub fn from_matrix(m: SymMatrix) -> Result<Ht, DynError> {
        if m.rows() != 4 || m.cols() != 4 {
            return Err(DynError::InvalidShape(format!("HT matrix must be 4x4, got {}x{}", m.rows(), m.cols())));
        }
        Ok(Ht { matrix: m, euler_cache: None })
    }

    pub fn from_rotation(r: SymMatrix) -> Result<Ht, DynError> {
        if r.rows() != 3 || r.cols() != 3 {
            return Err(DynError::InvalidShape(format!("rotation must be 3x3, got {}x{}", r.rows(), r.cols())));
        }
        let zero = [Sym::zero(), Sym::zero(), Sym::zero()];
        Ok(Ht { matrix: block_4x4(&r, &zero), euler_cache: None })
    }

    pub fn from_translation(t: [Sym; 3]) -> Ht {
        Ht { matrix: block_4x4(&SymMatrix::identity(3), &t), euler_cache: None }
    }

    /// `phi = [φx, φy, φz]`. Builds `R = Rz(φz)·Ry(φy)·Rx(φx)` and caches
    /// the triple so a subsequent `euler()` returns it verbatim.
    pub fn from_euler(phi: [Sym; 3]) -> Ht {
        Ht::identity().with_euler(phi)
    }

    pub fn from_wrench(w: [Sym; 6]) -> Ht {
        let t = [w[0].clone(), w[1].clone(), w[2].clone()];
        let phi = [w[3].clone(), w[4].clone(), w[5].clone()];
        Ht::from_translation(t).with_euler(phi)
    }

    /// Column-major 16-vector reshape into a 4×4 matrix.
    pub fn from_column(v: Box<[Sym; 16]>) -> Result<Ht, DynError> {
        let mut m = SymMatrix::zeros(4, 4);
        for col in 0..4 {
            for row in 0..4 {
                m.set(row, col, v[col * 4 + row].clone());
            }
        }
        Ht::from_matrix(m)
    }

    /// Standard Denavit-Hartenberg transform for one row: parameters
    /// `(θ, d, a, α)`, built symbolically rather than numerically.
    pub fn from_dh_row(theta: &Sym, d: &Sym, a: &Sym, alpha: &Sym) -> Ht {
        let (ct, st) = (theta.cos(), theta.sin());
        let (ca, sa) = (alpha.cos(), alpha.sin());
        let r = SymMatrix::from_vec(
            3,
            3,
            vec![
                ct.clone(), -(st.clone() * ca.clone()), st.clone() * sa.clone(),
                st.clone(), ct.clone() * ca.clone(), -(ct.clone() * sa.clone()),
                Sym::zero(), sa, ca,
            ],
        );
        let t = [a.clone() * ct, a.clone() * st, d.clone()];
        Ht { matrix: block_4x4(&r, &t), euler_cache: None }
    }

    /// Left-to-right product of the per-argument transforms; no
    /// arguments yields the identity.
    pub fn new(args: &[HtArg]) -> Result<Ht, DynError> {
        let mut acc = Ht::identity();
        for arg in args {
            let next = match arg {
                HtArg::Matrix4x4(m) => Ht::from_matrix(m.clone())?,
                HtArg::Rotation3x3(r) => Ht::from_rotation(r.clone())?,
                HtArg::Translation3(t) => Ht::from_translation(t.clone()),
                HtArg::Wrench6(w) => Ht::from_wrench(w.clone()),
                HtArg::Column16(v) => Ht::from_column(v.clone())?,
                HtArg::DhRow { theta, d, a, alpha } => Ht::from_dh_row(theta, d, a, alpha),
            };
            acc = acc * next;
        }
        Ok(acc)
    }

    pub fn matrix(&self) -> &SymMatrix {
        &self.matrix
    }

    pub fn translation(&self) -> [Sym; 3] {
        [self.matrix.get(0, 3).clone(), self.matrix.get(1, 3).clone(), self.matrix.get(2, 3).clone()]
    }

    pub fn with_translation(&self, t: [Sym; 3]) -> Ht {
        Ht { matrix: block_4x4(&self.rotation(), &t), euler_cache: self.euler_cache.clone() }
    }

    pub fn rotation(&self) -> SymMatrix {
        let mut r = SymMatrix::zeros(3, 3);
        for row in 0..3 {
            for col in 0..3 {
                r.set(row, col, self.matrix.get(row, col).clone());
            }
        }
        r
    }

    /// Setting `Rot` clears any cached Euler override.
    pub fn with_rotation(&self, r: SymMatrix) -> Ht {
        Ht { matrix: block_4x4(&r, &self.translation()), euler_cache: None }
    }

    /// Cached triple if this `Ht` was built/set via Euler angles;
    /// otherwise extracted from `R` by the standard ZYX formula.
    /// Singular at `φy = ±π/2`, which callers must avoid themselves.
    pub fn euler(&self) -> [Sym; 3] {
        if let Some(cached) = &self.euler_cache {
            return cached.clone();
        }
        let r32 = self.matrix.get(2, 1).clone();
        let r33 = self.matrix.get(2, 2).clone();
        let r13 = self.matrix.get(0, 2).clone();
        let r21 = self.matrix.get(1, 0).clone();
        let r11 = self.matrix.get(0, 0).clone();
        let denom = (r32.clone() * r32.clone() + r33.clone() * r33.clone()).sqrt();
        let phi_x = r32.atan2(&r33);
        let phi_y = (-r13).atan2(&denom);
        let phi_z = r21.atan2(&r11);
        [phi_x, phi_y, phi_z]
    }

    /// `phi = [φx, φy, φz]`: sets `R ← Rz(φz)·Ry(φy)·Rx(φx)` and caches
    /// the triple.
    pub fn with_euler(&self, phi: [Sym; 3]) -> Ht {
        let r = rot_z(&phi[2]).mul(&rot_y(&phi[1])).mul(&rot_x(&phi[0]));
        Ht { matrix: block_4x4(&r, &self.translation()), euler_cache: Some(phi) }
    }

    pub fn wrench(&self) -> [Sym; 6] {
        let t = self.translation();
        let phi = self.euler();
        [t[0].clone(), t[1].clone(), t[2].clone(), phi[0].clone(), phi[1].clone(), phi[2].clone()]
    }

    /// Column-major 16-vector form.
    pub fn column(&self) -> [Sym; 16] {
        let mut out: [Sym; 16] = std::array::from_fn(|_| Sym::zero());
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = self.matrix.get(row, col).clone();
            }
        }
        out
    }

    /// Structural inverse: `H⁻¹ = [[Rᵀ, −Rᵀt], [0, 1]]`, cheaper and
    /// symbolically cleaner than a generic 4×4 inverse.
    pub fn inverse(&self) -> Ht {
        let rt = self.rotation().transpose();
        let t = self.translation();
        let t_col = SymMatrix::from_vec(3, 1, t.to_vec());
        let neg_rt_t = rt.mul(&t_col).scale(&Sym::konst(-1.0));
        let translation = [neg_rt_t.get(0, 0).clone(), neg_rt_t.get(1, 0).clone(), neg_rt_t.get(2, 0).clone()];
        Ht { matrix: block_4x4(&rt, &translation), euler_cache: None }
    }

    /// Left-division: treating `self` as `A`, `A.ldiv(B) = A⁻¹·B`.
    pub fn ldiv(&self, other: &Ht) -> Ht {
        self.inverse() * other.clone()
    }

    /// Right-division: treating `self` as `A`, `A.rdiv(B) = B·A⁻¹`.
    pub fn rdiv(&self, other: &Ht) -> Ht {
        other.clone() * self.inverse()
    }

    /// The body angular velocity `ω` such that `ω̂ = (dR/dvar)·Rᵀ`,
    /// differentiated against an arbitrary symbol.
    pub fn get_rot_vel(&self, var: &Symbol) -> [Sym; 3] {
        let r = self.rotation();
        let rdot = r.diff(var);
        let what = rdot.mul(&r.transpose());
        deskew(&what)
    }

    /// Geometric Jacobian: upper 3 rows `∂t/∂qᵢ`, lower 3 rows
    /// `get_rot_vel(qᵢ)`.
    pub fn geometric_jacobian(&self, vars: &[Symbol]) -> SymMatrix {
        let t = self.translation();
        let mut j = SymMatrix::zeros(6, vars.len());
        for (col, v) in vars.iter().enumerate() {
            for row in 0..3 {
                j.set(row, col, t[row].diff(v));
            }
            let omega = self.get_rot_vel(v);
            for row in 0..3 {
                j.set(row + 3, col, omega[row].clone());
            }
        }
        j
    }

    /// Analytic Jacobian: upper 3 rows `∂t/∂qᵢ`, lower 3 rows `∂φ/∂qᵢ`
    /// on ZYX Euler.
    pub fn analytic_jacobian(&self, vars: &[Symbol]) -> SymMatrix {
        let t = self.translation();
        let phi = self.euler();
        let mut j = SymMatrix::zeros(6, vars.len());
        for (col, v) in vars.iter().enumerate() {
            for row in 0..3 {
                j.set(row, col, t[row].diff(v));
            }
            for row in 0..3 {
                j.set(row + 3, col, phi[row].diff(v));
            }
        }
        j
    }

    /// The Euler-rate/angular-velocity coupling matrix `B(φ)` such that
    /// `ω = B(φ)·φ̇`, built once over fresh placeholder symbols and then
    /// substituted with the caller's `phi` (which may itself depend on
    /// q). See `time_subs::TimeSubstitutionContext`.
    pub fn coupling_matrix(phi: &[Sym; 3]) -> SymMatrix {
        let fresh_syms = [Symbol::new("__ba_phi_x"), Symbol::new("__ba_phi_y"), Symbol::new("__ba_phi_z")];
        let fresh = [Sym::var(&fresh_syms[0]), Sym::var(&fresh_syms[1]), Sym::var(&fresh_syms[2])];
        let ht = Ht::from_euler(fresh);
        let ctx = TimeSubstitutionContext::new(&fresh_syms);

        let r = ht.rotation();
        let rdot = SymMatrix::from_vec(3, 3, r.data().iter().map(|e| ctx.diff_t(e)).collect());
        let what = rdot.mul(&r.transpose());
        let omega = deskew(&what);

        let phidots = ctx.velocities();
        let mut b = SymMatrix::zeros(3, 3);
        for row in 0..3 {
            for col in 0..3 {
                b.set(row, col, omega[row].diff(&phidots[col]));
            }
        }

        let map: HashMap<Symbol, Sym> =
            fresh_syms.iter().cloned().zip(phi.iter().cloned()).collect();
        b.subs_all(&map)
    }

    /// `Ba = block-diag(I₃, B(φ))`.
    pub fn coupling_block(phi: &[Sym; 3]) -> SymMatrix {
        let b = Ht::coupling_matrix(phi);
        let mut ba = SymMatrix::zeros(6, 6);
        for i in 0..3 {
            ba.set(i, i, Sym::one());
        }
        for row in 0..3 {
            for col in 0..3 {
                ba.set(row + 3, col + 3, b.get(row, col).clone());
            }
        }
        ba
    }

    /// `B(φ)⁻¹` such that `φ̇ = B(φ)⁻¹·ω`, the other direction of the
    /// coupling relationship.
    pub fn coupling_matrix_inverse(phi: &[Sym; 3]) -> Result<SymMatrix, DynError> {
        Ht::coupling_matrix(phi).inverse()
    }

    /// `Ba⁻¹ = block-diag(I₃, B(φ)⁻¹)`, used by `Ja = Ba⁻¹·Jg`.
    pub fn coupling_block_inverse(phi: &[Sym; 3]) -> Result<SymMatrix, DynError> {
        let b_inv = Ht::coupling_matrix_inverse(phi)?;
        let mut ba_inv = SymMatrix::zeros(6, 6);
        for i in 0..3 {
            ba_inv.set(i, i, Sym::one());
        }
        for row in 0..3 {
            for col in 0..3 {
                ba_inv.set(row + 3, col + 3, b_inv.get(row, col).clone());
            }
        }
        Ok(ba_inv)
    }
}

impl Mul for Ht {
    type Output = Ht;
    fn mul(self, rhs: Ht) -> Ht {
        Ht { matrix: self.matrix.mul(&rhs.matrix), euler_cache: None }
    }
}

impl Mul<&Ht> for &Ht {
    type Output = Ht;
    fn mul(self, rhs: &Ht) -> Ht {
        Ht { matrix: self.matrix.mul(&rhs.matrix), euler_cache: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_zero_matrix(m: &SymMatrix, tol: f64) -> bool {
        m.data().iter().all(|e| e.simplify().as_const().map(|v| v.abs() < tol).unwrap_or(false))
    }

    #[test]
    fn inverse_round_trips_to_identity_numerically() {
        let theta = Symbol::new("theta");
        let ht = Ht::from_dh_row(&Sym::var(&theta), &Sym::konst(1.0), &Sym::konst(2.0), &Sym::konst(0.3));
        let bindings = [(theta.clone(), 0.7_f64)].into_iter().collect();
        let product = (&ht * &ht.inverse()).matrix().simplify();
        let numeric = SymMatrix::from_vec(
            4,
            4,
            product.data().iter().map(|e| Sym::konst(e.eval(&bindings).unwrap())).collect(),
        );
        let identity = SymMatrix::identity(4);
        for r in 0..4 {
            for c in 0..4 {
                let diff = numeric.get(r, c).clone() - identity.get(r, c).clone();
                assert!(diff.simplify().as_const().unwrap().abs() < 1e-9);
            }
        }
    }

    #[test]
    fn euler_setter_getter_round_trips_exactly() {
        let phi = [Sym::konst(0.1), Sym::konst(0.2), Sym::konst(0.3)];
        let ht = Ht::from_euler(phi.clone());
        let got = ht.euler();
        for (a, b) in phi.iter().zip(got.iter()) {
            assert_eq!(a.as_const(), b.as_const());
        }
    }

    #[test]
    fn left_division_recovers_b() {
        let a = Ht::from_translation([Sym::konst(1.0), Sym::konst(0.0), Sym::konst(0.0)]);
        let b = Ht::from_translation([Sym::konst(0.0), Sym::konst(2.0), Sym::konst(0.0)]);
        let recovered = a.ldiv(&(&a * &b)).matrix().simplify();
        let expected = b.matrix().simplify();
        assert_eq!(recovered, expected);
    }

    #[test]
    fn jacobian_coupling_identity_for_small_angles_numeric() {
        // Jg ≡ Ba(φ)·Ja at a generic configuration: spot-check with a
        // single-joint DH chain where φ = euler of the transform.
        let q = Symbol::new("q");
        let ht = Ht::from_dh_row(&Sym::var(&q), &Sym::zero(), &Sym::konst(1.0), &Sym::zero());
        let jg = ht.geometric_jacobian(&[q.clone()]);
        let ja = ht.analytic_jacobian(&[q.clone()]);
        let phi = ht.euler();
        let ba = Ht::coupling_block(&phi);
        let rhs = ba.mul(&ja);

        let bindings = [(q.clone(), 0.4_f64)].into_iter().collect();
        for r in 0..6 {
            let lhs_val = jg.get(r, 0).eval(&bindings).unwrap();
            let rhs_val = rhs.get(r, 0).eval(&bindings).unwrap();
            assert!((lhs_val - rhs_val).abs() < 1e-6, "row {r}: {lhs_val} vs {rhs_val}");
        }
        assert!(!approx_zero_matrix(&jg, f64::INFINITY)); // sanity: jg not vacuous
    }

    #[test]
    fn jacobian_coupling_identity_inverse_direction_numeric() {
        // Ja ≡ Ba(φ)⁻¹·Jg, the other direction of the same relationship.
        let q = Symbol::new("q");
        let ht = Ht::from_dh_row(&Sym::var(&q), &Sym::zero(), &Sym::konst(1.0), &Sym::zero());
        let jg = ht.geometric_jacobian(&[q.clone()]);
        let ja = ht.analytic_jacobian(&[q.clone()]);
        let phi = ht.euler();
        let ba_inv = Ht::coupling_block_inverse(&phi).unwrap();
        let rhs = ba_inv.mul(&jg);

        let bindings = [(q.clone(), 0.4_f64)].into_iter().collect();
        for r in 0..6 {
            let lhs_val = ja.get(r, 0).eval(&bindings).unwrap();
            let rhs_val = rhs.get(r, 0).eval(&bindings).unwrap();
            assert!((lhs_val - rhs_val).abs() < 1e-6, "row {r}: {lhs_val} vs {rhs_val}");
        }
    }

    /// A two-row DH chain's composed transform matches the explicit
    /// rotZ·translate·rotZ·translate product.
    #[test]
    fn dh_composition_matches_explicit_rot_translate_product() {
        let q1 = Symbol::new("q1");
        let q2 = Symbol::new("q2");
        let row1 = Ht::from_dh_row(&Sym::var(&q1), &Sym::zero(), &Sym::one(), &Sym::zero());
        let row2 = Ht::from_dh_row(&Sym::var(&q2), &Sym::zero(), &Sym::one(), &Sym::zero());
        let from_dh = &row1 * &row2;

        let rot_z = |q: &Symbol| {
            let c = Sym::var(q).cos();
            let s = Sym::var(q).sin();
            let mut m = SymMatrix::identity(4);
            m.set(0, 0, c.clone());
            m.set(0, 1, -s.clone());
            m.set(1, 0, s);
            m.set(1, 1, c);
            Ht::from_matrix(m).unwrap()
        };
        let translate_x1 = Ht::from_translation([Sym::one(), Sym::zero(), Sym::zero()]);
        let explicit = &(&(&rot_z(&q1) * &translate_x1) * &rot_z(&q2)) * &translate_x1;

        let bindings = [(q1, 0.4_f64), (q2, -0.9_f64)].into_iter().collect();
        for r in 0..4 {
            for c in 0..4 {
                let lhs = from_dh.matrix().get(r, c).eval(&bindings).unwrap();
                let rhs = explicit.matrix().get(r, c).eval(&bindings).unwrap();
                assert!((lhs - rhs).abs() < 1e-9, "({r},{c}): {lhs} vs {rhs}");
            }
        }
    }
}
