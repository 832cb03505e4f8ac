//! Gyre Sphere Geometry
//!
//! Vector and quaternion algebra for positions on the unit 3-sphere.
//!
//! # Mathematical Foundation
//!
//! Every node and every piece of data in the gyre mesh lives at a point on
//! the surface of the unit sphere. Distances between points are angular
//! (great-circle) distances in radians, on `[0, π]`. Positions are derived
//! by rotating a reference vector with unit quaternions, and flattened for
//! display with a distance-preserving stereographic projection.
//!
//! The two primitives:
//! - [`V`], a 3-vector with the usual algebra plus great-circle distance
//!   and the projections used by visualizers.
//! - [`Q`], a quaternion with Hamilton-product arithmetic and vector
//!   rotation, plus uniform random sampling over 3D rotations.

mod quat;
mod vec;

pub use quat::{random_quaternion, Q};
pub use vec::{random_vector, V};
