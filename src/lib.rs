//! Symbolic derivation of manipulator equations of motion
//! (`M(q)·q̈ + V(q,q̇) + G(q) + B·q̇ = τ`) from a symbolic kinematic model
//! and a set of mass/inertia attachments, compiled to numeric callables
//! for forward and inverse dynamics.

pub mod controller;
pub mod dynamics;
pub mod error;
pub mod ht;
pub mod kinematics;
pub mod sim;
pub mod symbolic;
pub mod time_subs;

pub use controller::{ComputedTorque, Controller, Trajectory};
pub use dynamics::{DynamicModel, DynamicModelConfig, InertiaInput};
pub use error::DynError;
pub use ht::{Ht, HtArg};
pub use kinematics::{DhJoint, DhKinematicModel, DhRow, KinematicModel};
pub use symbolic::{Compiled, Sym, SymMatrix, Symbol};
pub use time_subs::TimeSubstitutionContext;
