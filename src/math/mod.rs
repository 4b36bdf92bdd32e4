//! Scalar trait and flat particle buffer access.
//!
//! Particle data lives in flat scalar buffers with three consecutive entries
//! per particle (`x, y, z`). Constraints read and write these buffers through
//! the helpers below, lifting the three scalars into a `cgmath` vector for the
//! actual geometry.

use cgmath::{BaseFloat, Vector3};

/// Number of scalars stored per particle.
pub const STRIDE: usize = 3;

pub trait Real: BaseFloat + Send + Sync + 'static {
    /// Convert a constant into the scalar type.
    ///
    /// Every `BaseFloat` can represent any finite `f64` approximately, the
    /// `NaN` fallback is never hit for `f32` or `f64`.
    fn new<U: num::NumCast>(other: U) -> Self {
        num::NumCast::from(other).unwrap_or_else(Self::nan)
    }
}

impl<T> Real for T where T: BaseFloat + Send + Sync + 'static { }

/// Clamp `value` into `[lower, upper]`.
///
/// `NaN` inputs collapse onto the bounds, following `Float::max`/`Float::min`.
pub fn clamp<T: Real>(lower: T, upper: T, value: T) -> T {
    value.max(lower).min(upper)
}

/// Position of particle `index` in a flat buffer.
#[inline]
pub fn position<T: Real>(buffer: &[T], index: usize) -> Vector3<T> {
    let i = index * STRIDE;
    Vector3::new(buffer[i], buffer[i + 1], buffer[i + 2])
}

/// Move particle `index` by `delta`.
#[inline]
pub fn translate<T: Real>(buffer: &mut [T], index: usize, delta: Vector3<T>) {
    let i = index * STRIDE;
    buffer[i] += delta.x;
    buffer[i + 1] += delta.y;
    buffer[i + 2] += delta.z;
}

/// Number of particles stored in a buffer of `len` scalars, if the layout is valid.
pub fn particle_count(len: usize) -> Option<usize> {
    if len % STRIDE == 0 { Some(len / STRIDE) } else { None }
}
