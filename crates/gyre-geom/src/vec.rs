//! 3-vectors on and around the unit sphere.

use std::f64::consts::PI;
use std::ops::{Add, Div, Mul, Neg, Sub};

use rand::Rng;

use crate::{random_quaternion, Q};

/// A 3-vector.
///
/// Positions on the unit sphere are represented as unit-norm `V`s. The
/// algebra is plain Euclidean; the sphere-specific operations are
/// [`V::great_circle_distance`] and the projections.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct V {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl V {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// The reference vector rotated by content addresses: unit X.
    pub const UNIT_X: Self = Self { x: 1.0, y: 0.0, z: 0.0 };

    /// The projection pole used by [`V::project_gsd`]: unit Z.
    pub const UNIT_Z: Self = Self { x: 0.0, y: 0.0, z: 1.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, o: V) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn cross(&self, o: V) -> V {
        V {
            x: self.y * o.z - self.z * o.y,
            y: self.z * o.x - self.x * o.z,
            z: self.x * o.y - self.y * o.x,
        }
    }

    /// Euclidean (2-)norm.
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit-normalized copy.
    pub fn unit(&self) -> V {
        *self / self.norm()
    }

    /// Angular distance to `o` along the sphere surface, in radians on
    /// `[0, π]`. Both vectors must be unit-norm.
    pub fn great_circle_distance(&self, o: V) -> f64 {
        let d = self.dot(o);
        if d == 0.0 {
            return PI / 2.0;
        }
        let dist = (self.cross(o).norm() / d).atan();
        if d < 0.0 {
            PI + dist
        } else {
            dist
        }
    }

    /// Rotate by a quaternion.
    pub fn rotate(&self, q: Q) -> V {
        q.rotate(*self)
    }

    /// The quaternion rotating `self` onto `o` along the shortest arc.
    ///
    /// Nearly parallel and nearly antipodal inputs collapse to fixed
    /// rotations to avoid a degenerate cross product.
    pub fn shortest_rotation(&self, o: V) -> Q {
        let d = self.dot(o);
        if d > 0.999999 {
            Q { i: PI, j: 0.0, k: 0.0, r: 0.0 }
        } else if d < -0.999999 {
            Q { i: 0.0, j: 0.0, k: 0.0, r: 1.0 }
        } else {
            let v0 = self.cross(o);
            Q { i: v0.x, j: v0.y, k: v0.z, r: d }
        }
    }

    /// Big-endian IEEE-754 encoding of the three components.
    pub fn raw_bytes(&self) -> [u8; 24] {
        let mut buf = [0u8; 24];
        buf[..8].copy_from_slice(&self.x.to_bits().to_be_bytes());
        buf[8..16].copy_from_slice(&self.y.to_bits().to_be_bytes());
        buf[16..].copy_from_slice(&self.z.to_bits().to_be_bytes());
        buf
    }

    /// Plain stereographic projection from the south pole onto the
    /// `z = 0` plane: `(x/(1-z), y/(1-z))`.
    pub fn project(&self) -> (f64, f64) {
        (self.x / (1.0 - self.z), self.y / (1.0 - self.z))
    }

    /// Geodesic-scaled stereographic projection for visualization.
    ///
    /// Takes [`V::project`] and rescales its unit direction by the
    /// great-circle distance from `self` to the north pole, so overlay
    /// circles of radii `π/2` and `π` read as true distances. The poles
    /// map to `(0, 0)` and `(0, π)`.
    pub fn project_gsd(&self) -> (f64, f64) {
        if self.x == 0.0 && self.y == 0.0 {
            if self.z == 1.0 {
                return (0.0, 0.0);
            } else if self.z == -1.0 {
                return (0.0, PI);
            }
        }
        let (x, y) = self.project();
        let n = V::new(x, y, 0.0);
        let scaled = n.unit() * self.great_circle_distance(V::UNIT_Z);
        (scaled.x, scaled.y)
    }
}

impl Add for V {
    type Output = V;

    #[inline]
    fn add(self, o: V) -> V {
        V { x: self.x + o.x, y: self.y + o.y, z: self.z + o.z }
    }
}

impl Sub for V {
    type Output = V;

    #[inline]
    fn sub(self, o: V) -> V {
        V { x: self.x - o.x, y: self.y - o.y, z: self.z - o.z }
    }
}

impl Neg for V {
    type Output = V;

    #[inline]
    fn neg(self) -> V {
        V { x: -self.x, y: -self.y, z: -self.z }
    }
}

impl Mul<f64> for V {
    type Output = V;

    #[inline]
    fn mul(self, s: f64) -> V {
        V { x: self.x * s, y: self.y * s, z: self.z * s }
    }
}

impl Div<f64> for V {
    type Output = V;

    #[inline]
    fn div(self, s: f64) -> V {
        V { x: self.x / s, y: self.y / s, z: self.z / s }
    }
}

impl std::fmt::Display for V {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}, {}, {}}}", self.x, self.y, self.z)
    }
}

/// A uniform-random point on the unit sphere: the reference vector rotated
/// by a uniform-random rotation.
pub fn random_vector<R: Rng + ?Sized>(rng: &mut R) -> V {
    V::UNIT_X.rotate(random_quaternion(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn great_circle_distance_orthogonal() {
        let v = V::new(0.0, 0.0, 1.0);
        let o = V::new(0.0, 1.0, 0.0);
        assert_eq!(v.great_circle_distance(o), PI / 2.0);
    }

    #[test]
    fn great_circle_distance_antipodal() {
        let v = V::new(0.0, 0.0, 1.0);
        let o = V::new(0.0, 0.0, -1.0);
        assert_eq!(v.great_circle_distance(o.unit()), PI);
    }

    #[test]
    fn great_circle_distance_properties() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let v = random_vector(&mut rng);
            let o = random_vector(&mut rng);
            let d = v.great_circle_distance(o);
            // Symmetric, non-negative, bounded by pi.
            assert!((d - o.great_circle_distance(v)).abs() < 1e-12);
            assert!(d >= 0.0);
            assert!(d <= PI);
            assert!(v.great_circle_distance(v).abs() < 1e-12);
        }
    }

    #[test]
    fn unit_normalization() {
        let v = V::new(3.0, 4.0, 0.0);
        let u = v.unit();
        assert!((u.norm() - 1.0).abs() < 1e-12);
        assert!((u.x - 0.6).abs() < 1e-12);
        assert!((u.y - 0.8).abs() < 1e-12);
    }

    #[test]
    fn cross_is_orthogonal() {
        let v = V::new(1.0, 2.0, 3.0);
        let o = V::new(-2.0, 0.5, 1.0);
        let c = v.cross(o);
        assert!(c.dot(v).abs() < 1e-12);
        assert!(c.dot(o).abs() < 1e-12);
    }

    #[test]
    fn random_vector_is_unit() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let v = random_vector(&mut rng);
            assert!((v.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn gsd_projection_poles() {
        assert_eq!(V::UNIT_Z.project_gsd(), (0.0, 0.0));
        assert_eq!(V::new(0.0, 0.0, -1.0).project_gsd(), (0.0, PI));
    }

    #[test]
    fn gsd_projection_preserves_distance_to_pole() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let v = random_vector(&mut rng);
            if v.x == 0.0 && v.y == 0.0 {
                continue;
            }
            let (x, y) = v.project_gsd();
            let r = (x * x + y * y).sqrt();
            let d = v.great_circle_distance(V::UNIT_Z);
            assert!((r - d).abs() < 1e-9);
        }
    }

    #[test]
    fn raw_bytes_roundtrip() {
        let v = V::new(1.5, -2.25, 0.0078125);
        let b = v.raw_bytes();
        let x = f64::from_bits(u64::from_be_bytes(b[..8].try_into().unwrap()));
        let y = f64::from_bits(u64::from_be_bytes(b[8..16].try_into().unwrap()));
        let z = f64::from_bits(u64::from_be_bytes(b[16..].try_into().unwrap()));
        assert_eq!(V::new(x, y, z), v);
    }

    #[test]
    fn shortest_rotation_spins_in_plane() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let v = random_vector(&mut rng);
            let o = random_vector(&mut rng);
            if v.dot(o) < 0.01 || v.dot(o) > 0.999 {
                continue;
            }
            let theta = v.great_circle_distance(o);
            let q = v.shortest_rotation(o).unit();
            let r = v.rotate(q);
            // Unit quaternion rotation preserves the norm, stays in the
            // v-o plane, and swings through twice the separation angle.
            assert!((r.norm() - 1.0).abs() < 1e-9);
            assert!(r.dot(v.cross(o)).abs() < 1e-9);
            assert!((v.great_circle_distance(r) - 2.0 * theta).abs() < 1e-9);
        }
    }
}
