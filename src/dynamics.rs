//! The Dynamic Model: mass/inertia attachment bookkeeping, the
//! Lagrangian derivation pipeline, and the M/V/G decomposition compiled
//! to numeric callables for forward/inverse dynamics.

use crate::error::DynError;
use crate::ht::Ht;
use crate::kinematics::KinematicModel;
use crate::symbolic::{compile_vector, Compiled, Symbol, Sym, SymMatrix};
use crate::time_subs::TimeSubstitutionContext;

/// Either a full 3×3 symmetric inertia tensor or a scalar promoted to
/// `diag(0, 0, I)`.
pub enum InertiaInput {
    Tensor(SymMatrix),
    Scalar(Sym),
}

impl InertiaInput {
    fn into_tensor(self) -> SymMatrix {
        match self {
            InertiaInput::Tensor(m) => m,
            InertiaInput::Scalar(i) => {
                let mut m = SymMatrix::zeros(3, 3);
                m.set(2, 2, i);
                m
            }
        }
    }
}

struct MassAttachment {
    mass: Sym,
    position: [Sym; 3],
}

struct InertiaAttachment {
    inertia: SymMatrix,
    rotation: SymMatrix,
}

/// Gravity and damping configuration, factored out of `DynamicModel`
/// itself. Stays an in-process, `Default`-implementing struct rather
/// than a builder or a `serde`/`toml` layer: nothing here crosses a
/// process boundary.
pub struct DynamicModelConfig {
    pub g_val: f64,
    pub g_dir: [f64; 3],
    pub damping: Vec<Sym>,
}

impl Default for DynamicModelConfig {
    /// `damping` is left empty: its length depends on the joint count,
    /// which this type does not know. [`DynamicModelConfig::default_for`]
    /// is the usual way to build one.
    fn default() -> Self {
        Self { g_val: 9.81, g_dir: [0.0, 0.0, -1.0], damping: Vec::new() }
    }
}

impl DynamicModelConfig {
    /// `damping` defaults to `n` zeros once the joint count is known.
    pub fn default_for(n: usize) -> Self {
        Self { damping: vec![Sym::zero(); n], ..Self::default() }
    }
}

/// The symbolic state materialized by [`DynamicModel::calculate_dynamics`],
/// plus the six compiled numeric callables it exposes.
struct DerivedState {
    sym_m: SymMatrix,
    sym_v: Vec<Sym>,
    sym_g: Vec<Sym>,
    sym_inv_m: SymMatrix,
    func_m: Compiled,
    func_v: Compiled,
    func_g: Compiled,
    func_inv_m: Compiled,
    func_i_dyn: Compiled,
    func_f_dyn: Compiled,
}

/// Deskew, duplicated from `ht` rather than exposed there: the inertia
/// kinetic-energy term needs the same `ω̂ = Ṙ·Rᵀ` extraction applied to
/// an attachment rotation rather than a fresh-placeholder one.
fn deskew(w: &SymMatrix) -> [Sym; 3] {
    [w.get(2, 1).clone(), w.get(0, 2).clone(), w.get(1, 0).clone()]
}

fn dot(a: &[Sym], b: &[Sym]) -> Sym {
    a.iter().zip(b.iter()).fold(Sym::zero(), |acc, (x, y)| acc + x.clone() * y.clone())
}

/// Collects mass/inertia attachments for a manipulator described by a
/// [`KinematicModel`], and derives `M(q)·q̈ + V(q,q̇) + G(q) + B·q̇ = τ`.
pub struct DynamicModel<K: KinematicModel> {
    kin: K,
    q: Vec<Symbol>,
    qd: Vec<Symbol>,
    qdd: Vec<Symbol>,
    ctx: TimeSubstitutionContext,
    masses: Vec<MassAttachment>,
    inertias: Vec<InertiaAttachment>,
    g_val: f64,
    g_dir: [f64; 3],
    damping: Vec<Sym>,
    derived: Option<DerivedState>,
}

impl<K: KinematicModel> DynamicModel<K> {
    pub fn new(kin: K) -> Self {
        let n = kin.q().len();
        Self::with_config(kin, DynamicModelConfig::default_for(n))
    }

    pub fn with_config(kin: K, config: DynamicModelConfig) -> Self {
        let q = kin.q().to_vec();
        let ctx = TimeSubstitutionContext::new(&q);
        let qd = ctx.velocities().to_vec();
        let qdd = ctx.accelerations().to_vec();
        let damping = if config.damping.len() == q.len() {
            config.damping
        } else {
            vec![Sym::zero(); q.len()]
        };
        Self {
            kin,
            q,
            qd,
            qdd,
            ctx,
            masses: Vec::new(),
            inertias: Vec::new(),
            g_val: config.g_val,
            g_dir: config.g_dir,
            damping,
            derived: None,
        }
    }

    pub fn kinematic_model(&self) -> &K {
        &self.kin
    }

    pub fn g_val(&self) -> f64 {
        self.g_val
    }

    pub fn set_g_val(&mut self, v: f64) {
        self.g_val = v;
        self.derived = None;
    }

    pub fn g_dir(&self) -> [f64; 3] {
        self.g_dir
    }

    pub fn set_g_dir(&mut self, dir: [f64; 3]) {
        self.g_dir = dir;
        self.derived = None;
    }

    pub fn set_damping(&mut self, b: Vec<Sym>) -> Result<(), DynError> {
        if b.len() != self.q.len() {
            return Err(DynError::ShapeMismatch { expected: self.q.len(), got: b.len() });
        }
        self.damping = b;
        self.derived = None;
        Ok(())
    }

    /// `x`, optionally re-expressed from `frame` into the base frame via
    /// `T(0, frame)`.
    pub fn add_mass(&mut self, m: Sym, x: [Sym; 3], frame: Option<usize>) {
        let position = match frame {
            Some(f) => {
                let t = self.kin.transform(f) * Ht::from_translation(x);
                t.translation()
            }
            None => x,
        };
        self.masses.push(MassAttachment { mass: m, position });
        self.derived = None;
    }

    /// `r`, optionally premultiplied by `T(0, frame).Rot`.
    pub fn add_inertia(&mut self, i: InertiaInput, r: SymMatrix, frame: Option<usize>) {
        let rotation = match frame {
            Some(f) => self.kin.transform(f).rotation().mul(&r),
            None => r,
        };
        self.inertias.push(InertiaAttachment { inertia: i.into_tensor(), rotation });
        self.derived = None;
    }

    /// Decomposes `t_form` and forwards to [`Self::add_mass`]/[`Self::add_inertia`].
    pub fn add(&mut self, t_form: &Ht, m: Option<Sym>, i: Option<InertiaInput>, frame: Option<usize>) {
        if let Some(m) = m {
            self.add_mass(m, t_form.translation(), frame);
        }
        if let Some(i) = i {
            self.add_inertia(i, t_form.rotation(), frame);
        }
    }

    pub fn clear_mass(&mut self) {
        self.masses.clear();
        self.derived = None;
    }

    pub fn clear_inertia(&mut self) {
        self.inertias.clear();
        self.derived = None;
    }

    pub fn clear(&mut self) {
        self.clear_mass();
        self.clear_inertia();
    }

    fn kinetic_energy(&self) -> Sym {
        let mut k = Sym::zero();
        for att in &self.masses {
            let xdot: Vec<Sym> = att.position.iter().map(|c| self.ctx.diff_t(c)).collect();
            k = k + Sym::konst(0.5) * att.mass.clone() * dot(&xdot, &xdot);
        }
        for att in &self.inertias {
            let rdot = SymMatrix::from_vec(3, 3, att.rotation.data().iter().map(|e| self.ctx.diff_t(e)).collect());
            let what = rdot.mul(&att.rotation.transpose());
            let omega = deskew(&what);
            let q_base = att.rotation.transpose().mul(&att.inertia).mul(&att.rotation);
            let mut quad = Sym::zero();
            for i in 0..3 {
                for j in 0..3 {
                    quad = quad + omega[i].clone() * q_base.get(i, j).clone() * omega[j].clone();
                }
            }
            k = k + Sym::konst(0.5) * quad;
        }
        k
    }

    fn potential_energy(&self) -> Sym {
        let anti_g = [Sym::konst(-self.g_dir[0]), Sym::konst(-self.g_dir[1]), Sym::konst(-self.g_dir[2])];
        let mut p = Sym::zero();
        for att in &self.masses {
            let height = dot(&att.position, &anti_g);
            p = p + Sym::konst(self.g_val) * att.mass.clone() * height;
        }
        p
    }

    /// Runs the full derivation pipeline: Lagrangian, Euler–Lagrange per
    /// joint, M/V/G decomposition, and compilation of the six numeric
    /// callables. Populates the derived-state cache.
    pub fn calculate_dynamics(&mut self) -> Result<(), DynError> {
        let n = self.q.len();
        let l = self.kinetic_energy() - self.potential_energy();

        let mut e_l = Vec::with_capacity(n);
        for i in 0..n {
            let d_l_d_qd = l.diff(&self.qd[i]);
            let row = (self.ctx.diff_t(&d_l_d_qd) - l.diff(&self.q[i])).simplify();
            log::debug!("Euler-Lagrange row {i} derived");
            e_l.push(row);
        }

        let g_vec: Vec<Sym> = e_l.iter().map(|e| e.subs_zero(&self.qd).subs_zero(&self.qdd)).collect();
        let v_vec: Vec<Sym> = e_l
            .iter()
            .zip(g_vec.iter())
            .map(|(e, g)| (e.subs_zero(&self.qdd) - g.clone()).simplify())
            .collect();

        let (sym_m, _) = crate::symbolic::equations_to_matrix(&e_l, &self.qdd);
        let sym_m = sym_m.simplify();
        let sym_inv_m = sym_m.inverse()?;

        let tau = Symbol::vector("tau", n);

        let i_dyn_exprs: Vec<Sym> = e_l
            .iter()
            .zip(self.qd.iter())
            .zip(self.damping.iter())
            .map(|((e, qd), b)| (e.clone() + b.clone() * Sym::var(qd)).simplify())
            .collect();

        let mut f_dyn_exprs = Vec::with_capacity(n);
        for i in 0..n {
            let mut rhs = Vec::with_capacity(n);
            for j in 0..n {
                let damped = v_vec[j].clone() + g_vec[j].clone() + self.damping[j].clone() * Sym::var(&self.qd[j]);
                rhs.push(Sym::var(&tau[j]) - damped);
            }
            let row: Sym = (0..n).fold(Sym::zero(), |acc, j| acc + sym_inv_m.get(i, j).clone() * rhs[j].clone());
            f_dyn_exprs.push(row.simplify());
        }

        let func_m = sym_m.compile(&[&self.q]);
        let func_v = compile_vector(&v_vec, &[&self.q, &self.qd]);
        let func_g = compile_vector(&g_vec, &[&self.q]);
        let func_inv_m = sym_inv_m.compile(&[&self.q]);
        let func_i_dyn = compile_vector(&i_dyn_exprs, &[&self.q, &self.qd, &self.qdd]);
        let func_f_dyn = compile_vector(&f_dyn_exprs, &[&self.q, &self.qd, &tau]);

        self.derived = Some(DerivedState {
            sym_m,
            sym_v: v_vec,
            sym_g: g_vec,
            sym_inv_m,
            func_m,
            func_v,
            func_g,
            func_inv_m,
            func_i_dyn,
            func_f_dyn,
        });
        Ok(())
    }

    fn derived(&self) -> Result<&DerivedState, DynError> {
        self.derived.as_ref().ok_or(DynError::Uninitialized)
    }

    pub fn sym_m(&self) -> Result<&SymMatrix, DynError> {
        Ok(&self.derived()?.sym_m)
    }

    pub fn sym_v(&self) -> Result<&[Sym], DynError> {
        Ok(&self.derived()?.sym_v)
    }

    pub fn sym_g(&self) -> Result<&[Sym], DynError> {
        Ok(&self.derived()?.sym_g)
    }

    pub fn sym_inv_m(&self) -> Result<&SymMatrix, DynError> {
        Ok(&self.derived()?.sym_inv_m)
    }

    fn warn_if_nonfinite(label: &str, values: &[f64]) {
        if values.iter().any(|v| !v.is_finite()) {
            log::warn!("{label} evaluated to a non-finite value");
        }
    }

    pub fn m(&self, q: &[f64]) -> Result<Vec<f64>, DynError> {
        let out = self.derived()?.func_m.eval(&[q])?;
        Self::warn_if_nonfinite("M(q)", &out);
        Ok(out)
    }

    pub fn v(&self, q: &[f64], qd: &[f64]) -> Result<Vec<f64>, DynError> {
        let out = self.derived()?.func_v.eval(&[q, qd])?;
        Self::warn_if_nonfinite("V(q, q̇)", &out);
        Ok(out)
    }

    pub fn g(&self, q: &[f64]) -> Result<Vec<f64>, DynError> {
        let out = self.derived()?.func_g.eval(&[q])?;
        Self::warn_if_nonfinite("G(q)", &out);
        Ok(out)
    }

    pub fn inv_m(&self, q: &[f64]) -> Result<Vec<f64>, DynError> {
        let out = self.derived()?.func_inv_m.eval(&[q])?;
        Self::warn_if_nonfinite("M(q)^-1", &out);
        Ok(out)
    }

    fn zeros_or(values: Option<&[f64]>, n: usize) -> Vec<f64> {
        values.map(<[f64]>::to_vec).unwrap_or_else(|| vec![0.0; n])
    }

    /// `E_L(q, q̇, q̈) + B·q̇`. Missing trailing arguments default to zero.
    pub fn inverse_dyn(&self, q: &[f64], qd: Option<&[f64]>, qdd: Option<&[f64]>) -> Result<Vec<f64>, DynError> {
        let n = self.q.len();
        let qd = Self::zeros_or(qd, n);
        let qdd = Self::zeros_or(qdd, n);
        let out = self.derived()?.func_i_dyn.eval(&[q, &qd, &qdd])?;
        Self::warn_if_nonfinite("inverse_dyn", &out);
        Ok(out)
    }

    /// `M⁻¹·(τ − V − G − B·q̇)`. Missing trailing arguments default to zero.
    pub fn forward_dyn(&self, q: &[f64], qd: Option<&[f64]>, tau: Option<&[f64]>) -> Result<Vec<f64>, DynError> {
        let n = self.q.len();
        let qd = Self::zeros_or(qd, n);
        let tau = Self::zeros_or(tau, n);
        let out = self.derived()?.func_f_dyn.eval(&[q, &qd, &tau])?;
        Self::warn_if_nonfinite("forward_dyn", &out);
        Ok(out)
    }

    pub fn q_symbols(&self) -> &[Symbol] {
        &self.q
    }

    pub fn qd_symbols(&self) -> &[Symbol] {
        &self.qd
    }

    pub fn qdd_symbols(&self) -> &[Symbol] {
        &self.qdd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{DhKinematicModel, DhRow};
    use approx::assert_relative_eq;

    /// A single point mass on a 1-DOF prismatic joint along x.
    #[test]
    fn prismatic_point_mass_matches_textbook_form() {
        let q1 = Symbol::new("q1");
        let kin = DhKinematicModel::new(vec![DhRow::prismatic(0.0, 0.0, 0.0, 0.0, q1.clone())]).unwrap();
        let mut dm = DynamicModel::new(kin);
        let x = [Sym::var(&q1), Sym::zero(), Sym::zero()];
        dm.add_mass(Sym::one(), x, None);
        dm.set_g_dir([0.0, 0.0, -1.0]);
        dm.calculate_dynamics().unwrap();

        let m = dm.m(&[0.0]).unwrap();
        assert_relative_eq!(m[0], 1.0, epsilon = 1e-9);
        let v = dm.v(&[0.0], &[0.0]).unwrap();
        assert_relative_eq!(v[0], 0.0, epsilon = 1e-9);
        let g = dm.g(&[0.0]).unwrap();
        assert_relative_eq!(g[0], 0.0, epsilon = 1e-9);

        let fwd = dm.forward_dyn(&[0.0], Some(&[0.0]), Some(&[5.0])).unwrap();
        assert_relative_eq!(fwd[0], 5.0, epsilon = 1e-9);
    }

    /// A single point mass on a 1-DOF revolute joint: a pendulum of
    /// length `l`.
    #[test]
    fn revolute_pendulum_matches_textbook_form() {
        let q1 = Symbol::new("q1");
        let kin = DhKinematicModel::new(vec![DhRow::revolute(0.0, 0.0, 0.0, 0.0, q1.clone())]).unwrap();
        let mut dm = DynamicModel::new(kin);
        let l = 2.0;
        let x = [
            Sym::konst(l) * Sym::var(&q1).sin(),
            Sym::zero(),
            -(Sym::konst(l) * Sym::var(&q1).cos()),
        ];
        dm.add_mass(Sym::one(), x, None);
        dm.set_g_val(9.81);
        dm.set_g_dir([0.0, 0.0, -1.0]);
        dm.calculate_dynamics().unwrap();

        let m = dm.m(&[0.3]).unwrap();
        assert_relative_eq!(m[0], l * l, epsilon = 1e-9);

        let fwd = dm.forward_dyn(&[std::f64::consts::FRAC_PI_2], Some(&[0.0]), Some(&[0.0])).unwrap();
        assert_relative_eq!(fwd[0], -9.81 / l, epsilon = 1e-6);
    }

    #[test]
    fn uninitialized_model_errors_before_calculate_dynamics() {
        let q1 = Symbol::new("q1");
        let kin = DhKinematicModel::new(vec![DhRow::revolute(0.0, 0.0, 0.0, 0.0, q1)]).unwrap();
        let dm = DynamicModel::new(kin);
        assert!(matches!(dm.m(&[0.0]), Err(DynError::Uninitialized)));
    }

    /// Builds a two-link planar arm with point masses at each link's
    /// tip, unit link lengths.
    fn two_link_planar_model() -> (Symbol, Symbol, DynamicModel<DhKinematicModel>) {
        let q1 = Symbol::new("q1");
        let q2 = Symbol::new("q2");
        let kin = DhKinematicModel::new(vec![
            DhRow::revolute(1.0, 0.0, 0.0, 0.0, q1.clone()),
            DhRow::revolute(0.8, 0.0, 0.0, 0.0, q2.clone()),
        ])
        .unwrap();
        let mut dm = DynamicModel::new(kin);
        let joint1 = dm.kinematic_model().transform(0).translation();
        let joint2 = dm.kinematic_model().transform(1).translation();
        dm.add_mass(Sym::one(), joint1, None);
        dm.add_mass(Sym::one(), joint2, None);
        dm.calculate_dynamics().unwrap();
        (q1, q2, dm)
    }

    /// M(q) is symmetric.
    #[test]
    fn two_link_planar_mass_matrix_is_symmetric() {
        let (q1, q2, dm) = two_link_planar_model();
        let m = dm.sym_m().unwrap().clone();
        let skew = m.add(&m.transpose().scale(&Sym::konst(-1.0))).simplify();
        for (q1_val, q2_val) in [(0.1, -0.4), (1.2, 0.3), (-0.5, 2.1)] {
            let bindings = [(q1.clone(), q1_val), (q2.clone(), q2_val)].into_iter().collect();
            for e in skew.data() {
                assert!(e.eval(&bindings).unwrap().abs() < 1e-9);
            }
        }
    }

    /// M(q)·q̈ + V(q,q̇) + G(q) matches `inverse_dyn` at a generic
    /// (non-setpoint) configuration, with zero damping.
    #[test]
    fn mvg_decomposition_matches_inverse_dyn_generically() {
        let (_, _, dm) = two_link_planar_model();
        let q = [0.3, -0.2];
        let qd = [0.5, 1.1];
        let qdd = [0.2, -0.4];

        let m = dm.m(&q).unwrap();
        let v = dm.v(&q, &qd).unwrap();
        let g = dm.g(&q).unwrap();
        let i_dyn = dm.inverse_dyn(&q, Some(&qd), Some(&qdd)).unwrap();

        for i in 0..2 {
            let m_qdd: f64 = (0..2).map(|j| m[i * 2 + j] * qdd[j]).sum();
            assert_relative_eq!(m_qdd + v[i] + g[i], i_dyn[i], epsilon = 1e-7);
        }
    }

    /// forward_dyn composed with inverse_dyn recovers the original
    /// torque.
    #[test]
    fn forward_inverse_dynamics_round_trip() {
        let q1 = Symbol::new("q1");
        let kin = DhKinematicModel::new(vec![DhRow::revolute(0.0, 0.0, 0.0, 0.0, q1.clone())]).unwrap();
        let mut dm = DynamicModel::new(kin);
        let l = 1.5;
        let x = [
            Sym::konst(l) * Sym::var(&q1).sin(),
            Sym::zero(),
            -(Sym::konst(l) * Sym::var(&q1).cos()),
        ];
        dm.add_mass(Sym::one(), x, None);
        dm.calculate_dynamics().unwrap();

        let q = [0.37];
        let qd = [0.9];
        let tau = [2.2];
        let qdd = dm.forward_dyn(&q, Some(&qd), Some(&tau)).unwrap();
        let recovered = dm.inverse_dyn(&q, Some(&qd), Some(&qdd)).unwrap();
        assert_relative_eq!(recovered[0], tau[0], epsilon = 1e-7);
    }

    /// A single revolute joint about z carrying only a diag(0,0,Izz)
    /// inertia. Expected M = [[Izz]], V = G = 0.
    #[test]
    fn inertia_only_spinning_body_matches_textbook_form() {
        let q1 = Symbol::new("q1");
        let kin = DhKinematicModel::new(vec![DhRow::revolute(0.0, 0.0, 0.0, 0.0, q1.clone())]).unwrap();
        let mut dm = DynamicModel::new(kin);
        let izz = 3.0;
        dm.add_inertia(InertiaInput::Scalar(Sym::konst(izz)), SymMatrix::identity(3), Some(0));
        dm.calculate_dynamics().unwrap();

        let m = dm.m(&[0.5]).unwrap();
        assert_relative_eq!(m[0], izz, epsilon = 1e-9);
        let v = dm.v(&[0.5], &[0.4]).unwrap();
        assert_relative_eq!(v[0], 0.0, epsilon = 1e-9);
        let g = dm.g(&[0.5]).unwrap();
        assert_relative_eq!(g[0], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_input_law_yields_zero_matrices() {
        let q1 = Symbol::new("q1");
        let kin = DhKinematicModel::new(vec![DhRow::revolute(0.0, 0.0, 0.0, 0.0, q1)]).unwrap();
        let mut dm = DynamicModel::new(kin);
        dm.calculate_dynamics().unwrap();
        assert_relative_eq!(dm.m(&[0.2]).unwrap()[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(dm.g(&[0.2]).unwrap()[0], 0.0, epsilon = 1e-9);
        let fwd = dm.forward_dyn(&[0.2], Some(&[0.1]), Some(&[3.0])).unwrap();
        assert_relative_eq!(fwd[0], 0.0, epsilon = 1e-9);
    }
}
