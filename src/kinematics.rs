//! The kinematic-model collaborator: supplies the ordered joint symbol
//! vector `q` and `T(0, frame)` transforms. `DhKinematicModel` is a
//! Denavit-Hartenberg table whose joint values are symbols rather than
//! `f64`s.

use crate::error::DynError;
use crate::ht::Ht;
use crate::symbolic::{Symbol, Sym};

/// Kinematic-model collaborator: the only interface the Dynamic Model
/// needs from the outside world.
pub trait KinematicModel {
    /// The ordered joint symbol vector.
    fn q(&self) -> &[Symbol];

    /// The symbolic transform from the base frame to `frame`.
    fn transform(&self, frame: usize) -> Ht;

    fn num_frames(&self) -> usize;
}

/// One row of a Denavit-Hartenberg table. Constant `(a, alpha, d,
/// theta)` offsets plus an optional joint that adds its symbol to
/// `theta` (revolute) or `d` (prismatic).
#[derive(Clone)]
pub enum DhJoint {
    Fixed,
    Revolute(Symbol),
    Prismatic(Symbol),
}

#[derive(Clone)]
pub struct DhRow {
    pub a: f64,
    pub alpha: f64,
    pub d: f64,
    pub theta: f64,
    pub joint: DhJoint,
}

impl DhRow {
    pub fn fixed(a: f64, alpha: f64, d: f64, theta: f64) -> Self {
        Self { a, alpha, d, theta, joint: DhJoint::Fixed }
    }

    pub fn revolute(a: f64, alpha: f64, d: f64, theta_offset: f64, joint: Symbol) -> Self {
        Self { a, alpha, d, theta: theta_offset, joint: DhJoint::Revolute(joint) }
    }

    pub fn prismatic(a: f64, alpha: f64, d_offset: f64, theta: f64, joint: Symbol) -> Self {
        Self { a, alpha, d: d_offset, theta, joint: DhJoint::Prismatic(joint) }
    }

    fn transform(&self) -> Ht {
        let theta = match &self.joint {
            DhJoint::Revolute(sym) => Sym::konst(self.theta) + Sym::var(sym),
            _ => Sym::konst(self.theta),
        };
        let d = match &self.joint {
            DhJoint::Prismatic(sym) => Sym::konst(self.d) + Sym::var(sym),
            _ => Sym::konst(self.d),
        };
        Ht::from_dh_row(&theta, &d, &Sym::konst(self.a), &Sym::konst(self.alpha))
    }
}

/// A serial chain of DH rows. `transform(f)` returns the composed
/// transform from the base to the end of row `f` (0-indexed, inclusive
/// of row `f` itself).
pub struct DhKinematicModel {
    rows: Vec<DhRow>,
    q: Vec<Symbol>,
}

impl DhKinematicModel {
    pub fn new(rows: Vec<DhRow>) -> Result<Self, DynError> {
        if rows.is_empty() {
            return Err(DynError::InvalidShape("DH table must have at least one row".into()));
        }
        let q: Vec<Symbol> = rows
            .iter()
            .filter_map(|r| match &r.joint {
                DhJoint::Revolute(s) | DhJoint::Prismatic(s) => Some(s.clone()),
                DhJoint::Fixed => None,
            })
            .collect();
        Ok(Self { rows, q })
    }
}

impl KinematicModel for DhKinematicModel {
    fn q(&self) -> &[Symbol] {
        &self.q
    }

    fn transform(&self, frame: usize) -> Ht {
        let mut acc = Ht::identity();
        for row in &self.rows[..=frame] {
            acc = acc * row.transform();
        }
        acc
    }

    fn num_frames(&self) -> usize {
        self.rows.len()
    }
}
