//! The Simulation Adapter: wraps a desired trajectory, a controller,
//! and a noise callable around `forward_dyn` into a single
//! state-derivative function, plus a fixed-step RK4 fallback integrator
//! and a `plotly`-based trajectory plot. A collaborator boundary, not
//! core logic, but the sole consumer that exercises `forward_dyn`
//! end-to-end.

use crate::controller::Controller;
use crate::kinematics::KinematicModel;
use crate::dynamics::DynamicModel;
use plotly::{Plot, Scatter};

/// Builds the `(t, y) -> ẏ` state-derivative function for state
/// `y = [q; q̇]`, wrapping `controller` and `noise` around the model's
/// `forward_dyn`. Controller/model failures (shape mismatch, an
/// uninitialized model) fall back to zero torque/acceleration rather
/// than propagating, since the integrator this closure is handed
/// cannot itself return a `Result`.
pub fn state_derivative<'a, K: KinematicModel, C: Controller>(
    model: &'a DynamicModel<K>,
    controller: &'a C,
    noise: impl Fn(f64, &[f64], &[f64]) -> Vec<f64> + 'a,
) -> impl Fn(f64, &[f64]) -> Vec<f64> + 'a {
    let n = model.q_symbols().len();
    move |t: f64, y: &[f64]| {
        let q = &y[..n];
        let qd = &y[n..];
        let mut tau = controller.torque(t, q, qd).unwrap_or_else(|_| vec![0.0; n]);
        for (ti, ni) in tau.iter_mut().zip(noise(t, q, qd)) {
            *ti += ni;
        }
        let qdd = model.forward_dyn(q, Some(qd), Some(&tau)).unwrap_or_else(|_| vec![0.0; n]);
        let mut out = Vec::with_capacity(2 * n);
        out.extend_from_slice(qd);
        out.extend_from_slice(&qdd);
        out
    }
}

/// Fixed-step RK4 integration, the `OdeIntegrator`-shaped default for
/// callers with no external integrator of their own. Returns the time
/// grid and the state trajectory at each grid point.
pub fn rk4_integrate(
    rhs: impl Fn(f64, &[f64]) -> Vec<f64>,
    t_span: (f64, f64),
    y0: &[f64],
    dt: f64,
) -> (Vec<f64>, Vec<Vec<f64>>) {
    let (t0, t1) = t_span;
    let steps = ((t1 - t0) / dt).ceil().max(0.0) as usize;
    let mut ts = Vec::with_capacity(steps + 1);
    let mut ys = Vec::with_capacity(steps + 1);
    let mut y = y0.to_vec();
    let mut t = t0;
    ts.push(t);
    ys.push(y.clone());

    for _ in 0..steps {
        let k1 = rhs(t, &y);
        let y2: Vec<f64> = y.iter().zip(&k1).map(|(yi, ki)| yi + ki * dt / 2.0).collect();
        let k2 = rhs(t + dt / 2.0, &y2);
        let y3: Vec<f64> = y.iter().zip(&k2).map(|(yi, ki)| yi + ki * dt / 2.0).collect();
        let k3 = rhs(t + dt / 2.0, &y3);
        let y4: Vec<f64> = y.iter().zip(&k3).map(|(yi, ki)| yi + ki * dt).collect();
        let k4 = rhs(t + dt, &y4);
        y = y
            .iter()
            .enumerate()
            .map(|(i, yi)| yi + dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
            .collect();
        t += dt;
        ts.push(t);
        ys.push(y.clone());
    }
    (ts, ys)
}

/// Plots each joint's actual trajectory, desired trajectory and applied
/// torque against time, and writes the result to `path` as HTML.
pub fn plot_trajectory(
    path: &str,
    ts: &[f64],
    actual: &[Vec<f64>],
    desired: &[Vec<f64>],
    torque: &[Vec<f64>],
    n_joints: usize,
) {
    let mut plot = Plot::new();
    for j in 0..n_joints {
        let actual_j: Vec<f64> = actual.iter().map(|row| row[j]).collect();
        let desired_j: Vec<f64> = desired.iter().map(|row| row[j]).collect();
        plot.add_trace(Scatter::new(ts.to_vec(), actual_j).name(&format!("q{j} actual")));
        plot.add_trace(Scatter::new(ts.to_vec(), desired_j).name(&format!("q{j} desired")));
        if j < torque.first().map_or(0, Vec::len) {
            let torque_j: Vec<f64> = torque.iter().map(|row| row[j]).collect();
            plot.add_trace(Scatter::new(ts.to_vec(), torque_j).name(&format!("tau{j}")));
        }
    }
    plot.write_html(path);
}
