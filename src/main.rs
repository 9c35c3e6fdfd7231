use manipulator_dynamics::kinematics::{DhKinematicModel, DhRow};
use manipulator_dynamics::sim::{plot_trajectory, rk4_integrate, state_derivative};
use manipulator_dynamics::{ComputedTorque, DynamicModel, Sym, Symbol};

/// A small planar two-link arm, point masses at each link's tip, driven
/// to a setpoint by computed-torque control and integrated with RK4.
/// Demonstrates the pipeline end to end: build a kinematic model, attach
/// masses, derive M/V/G, wrap them in a controller, simulate, and plot.
fn main() {
    env_logger::init();

    let q1 = Symbol::new("q1");
    let q2 = Symbol::new("q2");
    let l1 = 1.0;
    let l2 = 0.8;

    let kin = DhKinematicModel::new(vec![
        DhRow::revolute(l1, 0.0, 0.0, 0.0, q1.clone()),
        DhRow::revolute(l2, 0.0, 0.0, 0.0, q2.clone()),
    ])
    .expect("non-empty DH table");

    let mut model = DynamicModel::new(kin);

    let joint2 = model.kinematic_model().transform(0).translation();
    let joint2_x = joint2[0].clone() + Sym::konst(l2) * (Sym::var(&q1) + Sym::var(&q2)).cos();
    let joint2_y = joint2[1].clone() + Sym::konst(l2) * (Sym::var(&q1) + Sym::var(&q2)).sin();
    model.add_mass(Sym::one(), [joint2[0].clone(), joint2[1].clone(), Sym::zero()], None);
    model.add_mass(Sym::one(), [joint2_x, joint2_y, Sym::zero()], None);

    model.calculate_dynamics().expect("dynamics derivation should succeed for this model");

    let setpoint = [0.5_f64, -0.3_f64];
    let trajectory = move |_t: f64| (setpoint.to_vec(), vec![0.0, 0.0], vec![0.0, 0.0]);
    let controller = ComputedTorque::new(&model, trajectory, vec![40.0, 40.0], vec![12.0, 12.0])
        .expect("gain vectors sized to joint count");

    let rhs = state_derivative(&model, &controller, |_t, _q, _qd| vec![0.0, 0.0]);
    let y0 = [0.1, 0.1, 0.0, 0.0];
    let (ts, ys) = rk4_integrate(rhs, (0.0, 2.0), &y0, 0.01);

    let actual: Vec<Vec<f64>> = ys.iter().map(|y| vec![y[0], y[1]]).collect();
    let desired: Vec<Vec<f64>> = ts.iter().map(|_| setpoint.to_vec()).collect();
    let torque: Vec<Vec<f64>> = ts
        .iter()
        .zip(ys.iter())
        .map(|(t, y)| controller.torque(*t, &y[..2], &y[2..]).unwrap_or_else(|_| vec![0.0, 0.0]))
        .collect();

    plot_trajectory("trajectory.html", &ts, &actual, &desired, &torque, 2);

    println!("final state: q = [{:.4}, {:.4}]", ys.last().unwrap()[0], ys.last().unwrap()[1]);
}
