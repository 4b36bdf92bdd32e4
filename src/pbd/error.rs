//! Error types for constraint construction and validated application.

use thiserror::Error;

/// Result type alias for constraint operations.
pub type ConstraintResult<T> = Result<T, ConstraintError>;

/// Errors reported by constraint construction and `try_apply_constraint`.
///
/// The per-iteration `apply_constraint` path never reports errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    /// Parallel index sequences have different lengths.
    #[error("index columns differ in length: expected {expected}, found {found}")]
    MismatchedColumns { expected: usize, found: usize },

    /// A flattened index list is not made of whole triples.
    #[error("{0} indices do not form whole triples")]
    NotTriples(usize),

    /// No particle tuples were supplied.
    #[error("constraint has no particle tuples")]
    Empty,

    /// A particle buffer does not hold a whole number of particles.
    #[error("{buffer} buffer of length {len} is not a multiple of 3")]
    BufferLayout { buffer: &'static str, len: usize },

    /// A particle index does not fit inside a buffer.
    #[error("particle index {index} out of bounds for {particles} particles in {buffer} buffer")]
    IndexOutOfBounds {
        index: usize,
        particles: usize,
        buffer: &'static str,
    },
}
