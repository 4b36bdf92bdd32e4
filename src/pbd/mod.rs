//! Position-based dynamics
//!
//! Constraints operate on flat particle buffers owned by the caller. A solver
//! step integrates positions elsewhere and then relaxes all constraints a few
//! times, each constraint seeing the corrections of the ones before it.

pub mod angle;
pub mod constraint;
pub mod error;

pub use self::angle::{AngleBound, AngleConstraint, Correction, clamp_angle};
pub use self::constraint::{Constraint, Indices};
pub use self::error::{ConstraintError, ConstraintResult};

use crate::math::Real;

/// Apply all `constraints` in order, `iterations` times (Gauss-Seidel).
pub fn relax<T>(
    constraints: &[&dyn Constraint<T>],
    iterations: usize,
    positions: &mut [T],
    previous: &[T],
    weights: &[T],
)
where
    T: Real,
{
    for _ in 0..iterations {
        for constraint in constraints {
            constraint.apply_constraint(positions, previous, weights);
        }
    }
}
