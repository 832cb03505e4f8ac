//! Gyre Location Engine
//!
//! Maps opaque content addresses onto the unit sphere and finds the
//! weighted-geodesic centroid of a set of sphere points.
//!
//! # Design
//!
//! Addresses are 32-byte SHA-256 digests. Each address maps
//! deterministically to a point on the unit sphere by consuming its bytes
//! as a sequence of rotation quaternions, so any conforming peer reproduces
//! the mapping bit-exactly.
//!
//! The centroid problem is Non-Euclidean Multi-Facility Location (NEMFL):
//! given weighted points on the sphere, minimize the weighted sum of
//! great-circle distances. The solver implements the two-phase algorithm
//! of Xue (1994), with a Monte Carlo restart wrapper for global coverage
//! and a brute-force sampling minimizer as a cross-check.

mod address;
mod error;
mod mc;
mod nemfl;

pub use address::{address_of, position_of, Address};
pub use error::{Error, Result};
pub use mc::monte_carlo_minimize;
pub use nemfl::{
    geodesic_distances, solve, solve_monte_carlo, solve_skip_nonsmooth, stereographic, Placement,
};
