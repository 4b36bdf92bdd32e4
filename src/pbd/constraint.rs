//! Constraint
//!
//! Position-based dynamics is built on-top of a system of non-linear constrains.
//! Each constraint references a handful of particles by index and nudges their
//! positions directly until the relation between them approximately holds.
//! The particle buffers themselves are owned by the caller.

use std::slice::ChunksExact;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ConstraintError, ConstraintResult};
use crate::math::{self, Real};

/// Flattened particle indices of a constraint.
///
/// Constraints acting on tuples of particles (pairs, triples, ...) store the
/// tuples back to back: `[a0, b0, c0, a1, b1, c1, ...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Indices(Vec<usize>);

impl Indices {
    /// Reserve `size` index slots, all pointing at particle 0.
    pub fn with_size(size: usize) -> Self {
        Indices(vec![0; size])
    }

    /// Replace the storage with `indices`, in order.
    ///
    /// Used for a single tuple as well as for an already flattened list.
    pub fn set(&mut self, indices: &[usize]) {
        self.0.clear();
        self.0.extend_from_slice(indices);
    }

    /// Interleave parallel index sequences into tuples.
    ///
    /// `columns[k][i]` becomes element `k` of tuple `i`. All columns must have
    /// the same length.
    pub fn set_columns(&mut self, columns: &[&[usize]]) -> ConstraintResult<()> {
        let rows = columns.first().map_or(0, |column| column.len());
        if let Some(column) = columns.iter().find(|column| column.len() != rows) {
            return Err(ConstraintError::MismatchedColumns {
                expected: rows,
                found: column.len(),
            });
        }

        self.0.clear();
        self.0.reserve(rows * columns.len());
        for row in 0..rows {
            self.0.extend(columns.iter().map(|column| column[row]));
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the stored tuples of `arity` indices.
    pub fn tuples(&self, arity: usize) -> ChunksExact<'_, usize> {
        self.0.chunks_exact(arity)
    }
}

impl From<Vec<usize>> for Indices {
    fn from(indices: Vec<usize>) -> Self {
        Indices(indices)
    }
}

/// Check that `buffer` holds whole particles and that every index fits inside it.
pub fn validate_buffer<T>(name: &'static str, buffer: &[T], indices: &[usize]) -> ConstraintResult<()> {
    let particles = math::particle_count(buffer.len()).ok_or(ConstraintError::BufferLayout {
        buffer: name,
        len: buffer.len(),
    })?;

    match indices.iter().find(|&&index| index >= particles) {
        Some(&index) => Err(ConstraintError::IndexOutOfBounds {
            index,
            particles,
            buffer: name,
        }),
        None => Ok(()),
    }
}

/// A relation between particles, restored by moving their positions.
pub trait Constraint<T: Real> {
    /// Flattened indices of all particles this constraint touches.
    fn indices(&self) -> &[usize];

    /// Nudge `positions` towards satisfying the constraint.
    ///
    /// Runs once per solver iteration on the shared buffer. `previous` and
    /// `weights` carry the previous positions and inverse masses in the same
    /// layout; kinds that don't need them ignore them.
    ///
    /// Indices are not validated: an index outside a buffer panics.
    fn apply_constraint(&self, positions: &mut [T], previous: &[T], weights: &[T]);

    /// Check the buffer layouts against the stored indices.
    fn validate(&self, positions: &[T], previous: &[T], weights: &[T]) -> ConstraintResult<()> {
        let indices = self.indices();
        validate_buffer("positions", positions, indices)?;
        validate_buffer("previous positions", previous, indices)?;
        validate_buffer("weights", weights, indices)
    }

    /// `apply_constraint` behind a `validate` check.
    fn try_apply_constraint(&self, positions: &mut [T], previous: &[T], weights: &[T]) -> ConstraintResult<()> {
        if let Err(err) = self.validate(positions, previous, weights) {
            debug!(%err, "rejected constraint buffers");
            return Err(err);
        }
        self.apply_constraint(positions, previous, weights);
        Ok(())
    }
}
