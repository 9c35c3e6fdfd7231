//! The controller collaborator: a callable `(t, q, q̇) → τ`.
//! `ComputedTorque` is a feedback-linearizing computed-torque law with
//! per-joint diagonal gains sized to the model's own joint count, wired
//! directly to `inverse_dyn` rather than a generic task-space error.

use crate::error::DynError;
use crate::kinematics::KinematicModel;
use crate::dynamics::DynamicModel;

/// Desired joint trajectory at time `t`: `(q_des, q̇_des, q̈_des)`.
pub trait Trajectory {
    fn at(&self, t: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>);
}

impl<F: Fn(f64) -> (Vec<f64>, Vec<f64>, Vec<f64>)> Trajectory for F {
    fn at(&self, t: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        self(t)
    }
}

/// A callable torque law.
pub trait Controller {
    fn torque(&self, t: f64, q: &[f64], qd: &[f64]) -> Result<Vec<f64>, DynError>;
}

/// Feedback-linearizing computed-torque control: commands an
/// acceleration `q̈_des + Kd(q̇_des − q̇) + Kp(q_des − q)` and passes it
/// through the model's own `inverse_dyn`.
pub struct ComputedTorque<'a, K: KinematicModel, T: Trajectory> {
    model: &'a DynamicModel<K>,
    trajectory: T,
    kp: Vec<f64>,
    kd: Vec<f64>,
}

impl<'a, K: KinematicModel, T: Trajectory> ComputedTorque<'a, K, T> {
    pub fn new(model: &'a DynamicModel<K>, trajectory: T, kp: Vec<f64>, kd: Vec<f64>) -> Result<Self, DynError> {
        let n = model.q_symbols().len();
        if kp.len() != n || kd.len() != n {
            return Err(DynError::ShapeMismatch { expected: n, got: kp.len().max(kd.len()) });
        }
        Ok(Self { model, trajectory, kp, kd })
    }
}

impl<'a, K: KinematicModel, T: Trajectory> Controller for ComputedTorque<'a, K, T> {
    fn torque(&self, t: f64, q: &[f64], qd: &[f64]) -> Result<Vec<f64>, DynError> {
        let (q_des, qd_des, qdd_des) = self.trajectory.at(t);
        let n = q.len();
        let mut qdd_cmd = Vec::with_capacity(n);
        for i in 0..n {
            let cmd = qdd_des[i] + self.kd[i] * (qd_des[i] - qd[i]) + self.kp[i] * (q_des[i] - q[i]);
            qdd_cmd.push(cmd);
        }
        self.model.inverse_dyn(q, Some(qd), Some(&qdd_cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{DhKinematicModel, DhRow};
    use crate::symbolic::{Symbol, Sym};
    use approx::assert_relative_eq;

    #[test]
    fn computed_torque_matches_inverse_dyn_at_setpoint() {
        let q1 = Symbol::new("q1");
        let kin = DhKinematicModel::new(vec![DhRow::revolute(0.0, 0.0, 0.0, 0.0, q1.clone())]).unwrap();
        let mut dm = DynamicModel::new(kin);
        let l = 1.5;
        let x = [Sym::konst(l) * Sym::var(&q1).sin(), Sym::zero(), -(Sym::konst(l) * Sym::var(&q1).cos())];
        dm.add_mass(Sym::one(), x, None);
        dm.calculate_dynamics().unwrap();

        let traj = |_t: f64| (vec![0.3], vec![0.0], vec![0.0]);
        let ctrl = ComputedTorque::new(&dm, traj, vec![0.0], vec![0.0]).unwrap();

        let tau = ctrl.torque(0.0, &[0.3], &[0.0]).unwrap();
        let expected = dm.inverse_dyn(&[0.3], Some(&[0.0]), Some(&[0.0])).unwrap();
        assert_relative_eq!(tau[0], expected[0], epsilon = 1e-9);
    }

    #[test]
    fn shape_mismatched_gains_are_rejected() {
        let q1 = Symbol::new("q1");
        let kin = DhKinematicModel::new(vec![DhRow::revolute(0.0, 0.0, 0.0, 0.0, q1)]).unwrap();
        let dm = DynamicModel::new(kin);
        let traj = |_t: f64| (vec![0.0], vec![0.0], vec![0.0]);
        let result = ComputedTorque::new(&dm, traj, vec![1.0, 2.0], vec![1.0]);
        assert!(matches!(result, Err(DynError::ShapeMismatch { .. })));
    }
}
