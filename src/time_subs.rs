//! Time-Substitution Machinery: the twin-family trick that lets
//! q, q̇, q̈ behave as independent symbols under partial differentiation
//! while still being linked through d/dt when the Euler-Lagrange
//! operator is applied.
//!
//! Reusable standalone. `DynamicModel` owns one context over its `n`
//! joint symbols, and [`crate::ht::Ht::coupling_matrix`] builds an
//! ephemeral one over three Euler-angle placeholders. The dual naming
//! convention (`__ts_*`) is never exposed outside this module.

use crate::symbolic::{Symbol, Sym};

/// Holds the static (q, q̇, q̈) and t-parameterized (q(t), q̇(t), q̈(t))
/// families for a fixed set of "position" symbols, and exposes
/// `subs_t`, `subs_q`, `diff_t`.
#[derive(Clone)]
pub struct TimeSubstitutionContext {
    statics: Vec<Symbol>,
    velocities: Vec<Symbol>,
    accelerations: Vec<Symbol>,
    t_statics: Vec<Symbol>,
    t_velocities: Vec<Symbol>,
    t_accelerations: Vec<Symbol>,
}

/// Derives the conventional `d_<name>` / `dd_<name>` velocity and
/// acceleration symbol names from a position symbol's name.
pub fn velocity_symbol(q: &Symbol) -> Symbol {
    Symbol::new(format!("d_{}", q.name()))
}

pub fn acceleration_symbol(q: &Symbol) -> Symbol {
    Symbol::new(format!("dd_{}", q.name()))
}

impl TimeSubstitutionContext {
    /// Builds a context over `statics`, deriving q̇/q̈ names via
    /// [`velocity_symbol`]/[`acceleration_symbol`].
    pub fn new(statics: &[Symbol]) -> Self {
        let velocities: Vec<Symbol> = statics.iter().map(velocity_symbol).collect();
        let accelerations: Vec<Symbol> = statics.iter().map(acceleration_symbol).collect();
        let t_statics: Vec<Symbol> = statics.iter().map(|s| Symbol::new(format!("__ts_{}_t", s.name()))).collect();
        let t_velocities: Vec<Symbol> = statics.iter().map(|s| Symbol::new(format!("__ts_d_{}_t", s.name()))).collect();
        let t_accelerations: Vec<Symbol> = statics.iter().map(|s| Symbol::new(format!("__ts_dd_{}_t", s.name()))).collect();
        Self {
            statics: statics.to_vec(),
            velocities,
            accelerations,
            t_statics,
            t_velocities,
            t_accelerations,
        }
    }

    pub fn statics(&self) -> &[Symbol] {
        &self.statics
    }

    pub fn velocities(&self) -> &[Symbol] {
        &self.velocities
    }

    pub fn accelerations(&self) -> &[Symbol] {
        &self.accelerations
    }

    /// Replaces static symbols (q, q̇, q̈) with their t-parameterized
    /// placeholders.
    pub fn subs_t(&self, e: &Sym) -> Sym {
        let mut out = e.clone();
        for (s, t) in self.statics.iter().zip(self.t_statics.iter()) {
            out = out.subs(s, &Sym::var(t));
        }
        for (s, t) in self.velocities.iter().zip(self.t_velocities.iter()) {
            out = out.subs(s, &Sym::var(t));
        }
        for (s, t) in self.accelerations.iter().zip(self.t_accelerations.iter()) {
            out = out.subs(s, &Sym::var(t));
        }
        out
    }

    /// The inverse substitution: t-parameterized placeholders back to
    /// static symbols.
    pub fn subs_q(&self, e: &Sym) -> Sym {
        let mut out = e.clone();
        for (s, t) in self.statics.iter().zip(self.t_statics.iter()) {
            out = out.subs(t, &Sym::var(s));
        }
        for (s, t) in self.velocities.iter().zip(self.t_velocities.iter()) {
            out = out.subs(t, &Sym::var(s));
        }
        for (s, t) in self.accelerations.iter().zip(self.t_accelerations.iter()) {
            out = out.subs(t, &Sym::var(s));
        }
        out
    }

    /// The total time derivative: `subs_q(d/dt(subs_t(e)))`, where d/dt
    /// is realized as the chain-rule sum over every t-parameterized
    /// symbol's own declared derivative, since no single symbol in this
    /// facade is itself "a function of t"; only this context's
    /// bookkeeping makes it act that way.
    ///
    /// `diff_t(q) == q̇`, `diff_t(q̇) == q̈`, and `diff_t` is linear and
    /// respects the product/chain rule because it is built from `Sym`'s
    /// ordinary partial derivative.
    pub fn diff_t(&self, e: &Sym) -> Sym {
        let e_t = self.subs_t(e);
        let mut total = Sym::zero();
        for (t_pos, t_vel) in self.t_statics.iter().zip(self.t_velocities.iter()) {
            total = total + e_t.diff(t_pos) * Sym::var(t_vel);
        }
        for (t_vel, t_acc) in self.t_velocities.iter().zip(self.t_accelerations.iter()) {
            total = total + e_t.diff(t_vel) * Sym::var(t_acc);
        }
        self.subs_q(&total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_t_of_position_is_velocity() {
        let q = Symbol::new("q1");
        let ctx = TimeSubstitutionContext::new(&[q.clone()]);
        let d = ctx.diff_t(&Sym::var(&q)).simplify();
        assert_eq!(d, Sym::var(&velocity_symbol(&q)).simplify());
    }

    #[test]
    fn diff_t_of_velocity_is_acceleration() {
        let q = Symbol::new("q1");
        let ctx = TimeSubstitutionContext::new(&[q.clone()]);
        let qd = velocity_symbol(&q);
        let d = ctx.diff_t(&Sym::var(&qd)).simplify();
        assert_eq!(d, Sym::var(&acceleration_symbol(&q)).simplify());
    }

    #[test]
    fn diff_t_of_square_uses_product_rule() {
        let q = Symbol::new("q1");
        let ctx = TimeSubstitutionContext::new(&[q.clone()]);
        let qd = velocity_symbol(&q);
        let e = Sym::var(&q) * Sym::var(&q);
        let d = ctx.diff_t(&e).simplify();
        let expected = (Sym::konst(2.0) * Sym::var(&q) * Sym::var(&qd)).simplify();

        let mut bindings = std::collections::HashMap::new();
        bindings.insert(q.clone(), 3.0);
        bindings.insert(qd.clone(), 5.0);
        assert_eq!(d.eval(&bindings), expected.eval(&bindings));
    }

    proptest::proptest! {
        /// `diff_t(q^2) == 2*q*q̇` numerically, for arbitrary bindings:
        /// the product rule holds regardless of the specific values.
        #[test]
        fn diff_t_product_rule_holds_for_any_binding(q_val in -10.0f64..10.0, qd_val in -10.0f64..10.0) {
            let q = Symbol::new("q1");
            let ctx = TimeSubstitutionContext::new(&[q.clone()]);
            let qd = velocity_symbol(&q);
            let e = Sym::var(&q) * Sym::var(&q);
            let d = ctx.diff_t(&e);
            let expected = Sym::konst(2.0) * Sym::var(&q) * Sym::var(&qd);

            let mut bindings = std::collections::HashMap::new();
            bindings.insert(q, q_val);
            bindings.insert(qd, qd_val);
            let lhs = d.eval(&bindings).unwrap();
            let rhs = expected.eval(&bindings).unwrap();
            proptest::prop_assert!((lhs - rhs).abs() < 1e-9);
        }

        /// `subs_q(subs_t(e)) == e` structurally, for any position binding
        /// used only to force distinct symbol instantiation per run.
        #[test]
        fn subs_round_trip_is_identity(_seed in 0u32..100) {
            let q = Symbol::new("q1");
            let ctx = TimeSubstitutionContext::new(&[q.clone()]);
            let e = Sym::var(&q) * Sym::var(&q) + Sym::one();
            let round_tripped = ctx.subs_q(&ctx.subs_t(&e));
            proptest::prop_assert_eq!(round_tripped.simplify(), e.simplify());
        }
    }
}
