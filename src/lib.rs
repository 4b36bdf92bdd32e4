//! Particle constraints for position-based (Verlet-style) simulations.
//!
//! Particles are stored in flat scalar buffers, three entries per particle.
//! Constraints hold particle indices and nudge the positions in those buffers
//! directly during relaxation.

pub mod math;
pub mod pbd;

pub use pbd::*;
