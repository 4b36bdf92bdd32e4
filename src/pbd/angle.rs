//! Angle constraint
//!
//! Keeps the angle at the middle particle `B` of a triple `(A, B, C)`, between
//! the edges `A-B` and `B-C`, inside a bound `[min, max]`.
//!
//! The correction is positional: a violated angle is turned into a target
//! distance between `A` and `C` via the law of cosines, and both end particles
//! are moved symmetrically along `AC` to reach it. For obtuse targets `B` is
//! additionally pulled towards or pushed away from the line `AC`. This is a
//! relaxation heuristic, a single call does not solve the triple exactly.

use std::f64::consts::PI;

use cgmath::{InnerSpace, Vector3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::constraint::{Constraint, Indices};
use super::error::{ConstraintError, ConstraintResult};
use crate::math::{self, Real};

/// Distance kept between any angle bound and the singular angles `0` and `π`.
pub const ANGLE_EPSILON: f64 = 1e-7;

/// Targets at or above this angle also move the middle particle.
pub const ANGLE_OBTUSE: f64 = PI * 0.75;

/// Offset applied by the symmetry-break perturbations.
pub const PERTURBATION: f64 = 0.1;

const ARITY: usize = 3;

/// Clamp `angle` into `[ε, π - ε]`.
pub fn clamp_angle<T: Real>(angle: T) -> T {
    let eps = T::new(ANGLE_EPSILON);
    math::clamp(eps, T::new(PI) - eps, angle)
}

/// Allowed range for the angle at the middle particle, in radians.
///
/// Both ends are clamped with [`clamp_angle`] whenever they are set.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(
    from = "(T, T)",
    into = "(T, T)",
    bound(serialize = "T: Real + Serialize", deserialize = "T: Real + Deserialize<'de>"),
))]
pub struct AngleBound<T> {
    min: T,
    max: T,
}

impl<T: Real> AngleBound<T> {
    pub fn new(min: T, max: T) -> Self {
        AngleBound {
            min: clamp_angle(min),
            max: clamp_angle(max),
        }
    }

    /// Bound allowing a single angle only.
    pub fn exact(angle: T) -> Self {
        Self::new(angle, angle)
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    pub fn set_min(&mut self, min: T) {
        self.min = clamp_angle(min);
    }

    pub fn set_max(&mut self, max: T) {
        self.max = clamp_angle(max);
    }

    pub fn contains(&self, angle: T) -> bool {
        angle >= self.min && angle <= self.max
    }
}

impl<T: Real> From<T> for AngleBound<T> {
    fn from(angle: T) -> Self {
        AngleBound::exact(angle)
    }
}

impl<T: Real> From<(T, T)> for AngleBound<T> {
    fn from((min, max): (T, T)) -> Self {
        AngleBound::new(min, max)
    }
}

impl<T> From<AngleBound<T>> for (T, T) {
    fn from(bound: AngleBound<T>) -> Self {
        (bound.min, bound.max)
    }
}

/// What a single triple correction did to the positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Angle already inside the bound, nothing moved.
    Satisfied,
    /// `A` and `C` coincided and were pushed apart.
    CoincidentPerturbed,
    /// Only `A` and `C` moved.
    Endpoints,
    /// `A` and `C` moved, `B` lay on the line `AC` and was pushed off it.
    ColinearPerturbed,
    /// All three particles moved.
    EndpointsAndMiddle,
}

impl Correction {
    /// Whether the middle particle was moved.
    pub fn moved_middle(&self) -> bool {
        matches!(self, Correction::ColinearPerturbed | Correction::EndpointsAndMiddle)
    }
}

/// Shared bound over one or more particle triples.
///
/// Each triple `(a, b, c)` constrains the angle at `b`. Batched triples are
/// corrected in order on the same buffer, so triples sharing particles see
/// each other's corrections within one call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(
    try_from = "FlatAngleConstraint<T>",
    bound(serialize = "T: Real + Serialize", deserialize = "T: Real + Deserialize<'de>"),
))]
pub struct AngleConstraint<T> {
    bound: AngleBound<T>,
    indices: Indices,
}

/// Serialized form of [`AngleConstraint`], checked by `from_flat` on load.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Real + Deserialize<'de>"))]
struct FlatAngleConstraint<T> {
    bound: AngleBound<T>,
    indices: Vec<usize>,
}

#[cfg(feature = "serde")]
impl<T: Real> TryFrom<FlatAngleConstraint<T>> for AngleConstraint<T> {
    type Error = ConstraintError;

    fn try_from(flat: FlatAngleConstraint<T>) -> ConstraintResult<Self> {
        AngleConstraint::from_flat(flat.bound, &flat.indices)
    }
}

impl<T: Real> AngleConstraint<T> {
    /// Constrain a single triple.
    pub fn new<B>(bound: B, a: usize, b: usize, c: usize) -> Self
    where
        B: Into<AngleBound<T>>,
    {
        let mut indices = Indices::with_size(ARITY);
        indices.set(&[a, b, c]);
        AngleConstraint { bound: bound.into(), indices }
    }

    /// Constrain the triples `(a[i], b[i], c[i])` with one shared bound.
    pub fn batch<B>(bound: B, a: &[usize], b: &[usize], c: &[usize]) -> ConstraintResult<Self>
    where
        B: Into<AngleBound<T>>,
    {
        let mut indices = Indices::with_size(ARITY * a.len());
        indices.set_columns(&[a, b, c])?;
        if indices.is_empty() {
            return Err(ConstraintError::Empty);
        }
        Ok(AngleConstraint { bound: bound.into(), indices })
    }

    /// Constrain already flattened triples `[a0, b0, c0, a1, b1, c1, ...]`.
    pub fn from_flat<B>(bound: B, indices: &[usize]) -> ConstraintResult<Self>
    where
        B: Into<AngleBound<T>>,
    {
        if indices.is_empty() {
            return Err(ConstraintError::Empty);
        }
        if indices.len() % ARITY != 0 {
            return Err(ConstraintError::NotTriples(indices.len()));
        }
        Ok(AngleConstraint {
            bound: bound.into(),
            indices: Indices::from(indices.to_vec()),
        })
    }

    pub fn set_angle(&mut self, min: T, max: T) {
        self.set_min(min);
        self.set_max(max);
    }

    /// Allow `angle` only, `min == max`.
    pub fn set_angle_exact(&mut self, angle: T) {
        self.set_angle(angle, angle);
    }

    pub fn set_min(&mut self, min: T) {
        self.bound.set_min(min);
    }

    pub fn set_max(&mut self, max: T) {
        self.bound.set_max(max);
    }

    pub fn bound(&self) -> AngleBound<T> {
        self.bound
    }

    pub fn min(&self) -> T {
        self.bound.min
    }

    pub fn max(&self) -> T {
        self.bound.max
    }

    /// Number of triples.
    pub fn count(&self) -> usize {
        self.indices.len() / ARITY
    }

    pub fn triples(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.indices.tuples(ARITY).map(|t| (t[0], t[1], t[2]))
    }
}

impl<T: Real> Constraint<T> for AngleConstraint<T> {
    fn indices(&self) -> &[usize] {
        self.indices.as_slice()
    }

    /// Correct every triple in order.
    ///
    /// The angle constraint moves particles without regard to mass, `previous`
    /// and `weights` are not read.
    fn apply_constraint(&self, positions: &mut [T], _previous: &[T], _weights: &[T]) {
        let ii = self.indices.as_slice();
        if self.count() == 1 {
            correct_triple(positions, &self.bound, ii[0], ii[1], ii[2]);
            return;
        }

        for (a, b, c) in self.triples() {
            correct_triple(positions, &self.bound, a, b, c);
        }
    }
}

/// Push coincident end particles apart.
///
/// Best effort: it rarely fixes the current call but keeps the next one away
/// from a division by zero.
pub fn perturb_coincident<T: Real>(positions: &mut [T], a: usize, b: usize, c: usize) {
    let offset = T::new(PERTURBATION);
    let zero = T::zero();
    math::translate(positions, a, Vector3::new(offset, zero, zero));
    math::translate(positions, b, Vector3::new(zero, offset, zero));
    math::translate(positions, c, Vector3::new(-offset, zero, zero));
}

/// Push a middle particle off the line through its neighbours.
pub fn perturb_colinear<T: Real>(positions: &mut [T], b: usize) {
    let offset = T::new(PERTURBATION);
    math::translate(positions, b, Vector3::new(offset, offset, offset));
}

// `len_sq` is negligible compared to `scale_sq`; also true if both are zero.
fn is_degenerate<T: Real>(len_sq: T, scale_sq: T) -> bool {
    len_sq <= T::epsilon() * T::epsilon() * scale_sq
}

/// Correct the angle at `b` of a single triple.
///
/// Zero-length edges `AB` or `BC` are not guarded: the measured angle is `NaN`
/// and the upper bound is taken as the target.
pub fn correct_triple<T: Real>(
    positions: &mut [T],
    bound: &AngleBound<T>,
    ai: usize,
    bi: usize,
    ci: usize,
) -> Correction {
    let (a, b, c) = (
        math::position(positions, ai),
        math::position(positions, bi),
        math::position(positions, ci));

    let ab = b - a;
    let bc = c - b;
    let ac = c - a;

    let ab_len_sq = ab.magnitude2();
    let bc_len_sq = bc.magnitude2();
    let ac_len_sq = ac.magnitude2();

    if is_degenerate(ac_len_sq, ab_len_sq + bc_len_sq) {
        trace!(a = ai, b = bi, c = ci, "angle constraint: coincident end particles");
        perturb_coincident(positions, ai, bi, ci);
        return Correction::CoincidentPerturbed;
    }

    let ab_len = ab_len_sq.sqrt();
    let bc_len = bc_len_sq.sqrt();
    let ac_len = ac_len_sq.sqrt();

    // Angle between B->A and B->C
    let b_angle = (-ab * ab_len.recip()).dot(bc * bc_len.recip()).acos();
    if bound.contains(b_angle) {
        return Correction::Satisfied;
    }
    let b_angle_target = if b_angle < bound.min { bound.min } else { bound.max };

    let two = T::new(2.0);

    // Target length for AC
    let ac_len_target_sq = ab_len_sq + bc_len_sq - two * ab_len * bc_len * b_angle_target.cos();
    let ac_len_target = ac_len_target_sq.sqrt();
    let ac_diff = (ac_len - ac_len_target) / ac_len * T::new(0.5);

    math::translate(positions, ai, ac * ac_diff);
    math::translate(positions, ci, -ac * ac_diff);

    if b_angle_target < T::new(ANGLE_OBTUSE) {
        return Correction::Endpoints;
    }

    // Target angle at A
    let a_angle_target =
        ((ab_len_sq + ac_len_target_sq - bc_len_sq) / (two * ab_len * ac_len_target)).acos();

    // Project B onto AC as AP
    let ac_unit = ac * ac_len.recip();
    let ap = ac_unit * ac_unit.dot(ab);
    let bp = ap - ab;
    let bp_len_sq = bp.magnitude2();

    if is_degenerate(bp_len_sq, ab_len_sq) {
        // a straight target is already met by a colinear B
        if b_angle_target < T::new(PI) {
            trace!(a = ai, b = bi, c = ci, "angle constraint: colinear middle particle");
            perturb_colinear(positions, bi);
            return Correction::ColinearPerturbed;
        }
        return Correction::Endpoints;
    }

    let ap_len = ap.magnitude();
    let bp_len = bp_len_sq.sqrt();
    let bp_len_target = ap_len * a_angle_target.tan();
    let bp_diff = (bp_len - bp_len_target) / bp_len;

    math::translate(positions, bi, bp * bp_diff);
    Correction::EndpointsAndMiddle
}


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn round_trip() {
        let constraint = AngleConstraint::<f64>::batch((0.5, FRAC_PI_2), &[0, 1], &[1, 2], &[2, 3]).unwrap();
        let json = serde_json::to_string(&constraint).unwrap();
        assert_eq!(json, r#"{"bound":[0.5,1.5707963267948966],"indices":[0,1,2,1,2,3]}"#);

        let loaded: AngleConstraint<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, constraint);
        assert_eq!(loaded.count(), 2);
    }

    #[test]
    fn load_clamps_bound() {
        let loaded: AngleConstraint<f64> =
            serde_json::from_str(r#"{"bound":[-1.0,9.0],"indices":[0,1,2]}"#).unwrap();
        assert_eq!(loaded.min(), ANGLE_EPSILON);
        assert_eq!(loaded.max(), clamp_angle(PI));

        let bound: AngleBound<f64> = serde_json::from_str("[0.0, 1.0]").unwrap();
        assert_eq!(bound, AngleBound::new(ANGLE_EPSILON, 1.0));
    }

    #[test]
    fn load_rejects_partial_triples() {
        let err = serde_json::from_str::<AngleConstraint<f64>>(r#"{"bound":[1.0,1.0],"indices":[0,1,2,5]}"#)
            .unwrap_err();
        assert!(err.to_string().contains(&ConstraintError::NotTriples(4).to_string()), "{}", err);
    }

    #[test]
    fn load_rejects_empty() {
        let err = serde_json::from_str::<AngleConstraint<f64>>(r#"{"bound":[1.0,1.0],"indices":[]}"#)
            .unwrap_err();
        assert!(err.to_string().contains(&ConstraintError::Empty.to_string()), "{}", err);
    }
}
