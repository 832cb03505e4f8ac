//! Quaternions for unit-sphere rotations.

use std::f64::consts::PI;
use std::ops::{Add, Neg, Sub};

use rand::Rng;

use crate::V;

/// A quaternion `(i, j, k, r)` with `r` the real part.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Q {
    pub i: f64,
    pub j: f64,
    pub k: f64,
    pub r: f64,
}

impl Q {
    pub const fn new(i: f64, j: f64, k: f64, r: f64) -> Self {
        Self { i, j, k, r }
    }

    /// Hamilton product.
    pub fn mul(&self, o: Q) -> Q {
        Q {
            r: self.r * o.r - self.i * o.i - self.j * o.j - self.k * o.k,
            i: self.r * o.i + self.i * o.r + self.j * o.k - self.k * o.j,
            j: self.r * o.j - self.i * o.k + self.j * o.r + self.k * o.i,
            k: self.r * o.k + self.i * o.j - self.j * o.i + self.k * o.r,
        }
    }

    pub fn mul_scalar(&self, s: f64) -> Q {
        self.mul(Q { r: s, ..Q::default() })
    }

    /// Right division `self * o^-1`.
    pub fn div(&self, o: Q) -> Q {
        let d = o.r * o.r + o.i * o.i + o.j * o.j + o.k * o.k;
        self.mul(o.conj()).mul_scalar(1.0 / d)
    }

    pub fn div_scalar(&self, s: f64) -> Q {
        self.div(Q { r: s, ..Q::default() })
    }

    pub fn conj(&self) -> Q {
        Q { i: -self.i, j: -self.j, k: -self.k, r: self.r }
    }

    pub fn norm(&self) -> f64 {
        (self.r * self.r + self.i * self.i + self.j * self.j + self.k * self.k).sqrt()
    }

    /// Euclidean distance to `o` in quaternion space.
    pub fn dist(&self, o: Q) -> f64 {
        (*self - o).norm()
    }

    pub fn unit(&self) -> Q {
        self.div_scalar(self.norm())
    }

    /// Conjugation rotation `q v q*` of a vector.
    pub fn rotate(&self, v: V) -> V {
        let p = Q { r: 0.0, i: v.x, j: v.y, k: v.z };
        let r = self.mul(p).mul(self.conj());
        V::new(r.i, r.j, r.k)
    }
}

impl Add for Q {
    type Output = Q;

    #[inline]
    fn add(self, o: Q) -> Q {
        Q { i: self.i + o.i, j: self.j + o.j, k: self.k + o.k, r: self.r + o.r }
    }
}

impl Sub for Q {
    type Output = Q;

    #[inline]
    fn sub(self, o: Q) -> Q {
        self + (-o)
    }
}

impl Neg for Q {
    type Output = Q;

    #[inline]
    fn neg(self) -> Q {
        Q { i: -self.i, j: -self.j, k: -self.k, r: -self.r }
    }
}

impl std::fmt::Display for Q {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{:5.2}, {:5.2}, {:5.2}, {:5.2}}}", self.r, self.i, self.j, self.k)
    }
}

/// A quaternion drawn uniformly over 3D rotations.
///
/// Standard subgroup-algorithm construction: one uniform draw splits the
/// unit interval, polar coordinates on each half.
pub fn random_quaternion<R: Rng + ?Sized>(rng: &mut R) -> Q {
    let s: f64 = rng.gen();
    let sig1 = (1.0 - s).sqrt();
    let sig2 = s.sqrt();
    let t1 = 2.0 * PI * rng.gen::<f64>();
    let t2 = 2.0 * PI * rng.gen::<f64>();
    Q {
        r: t2.cos() * sig2,
        i: t1.sin() * sig1,
        j: t1.cos() * sig1,
        k: t2.sin() * sig2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn close(a: Q, b: Q) -> bool {
        a.dist(b) < 1e-9
    }

    #[test]
    fn multiplication_associative() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let a = random_quaternion(&mut rng);
            let b = random_quaternion(&mut rng);
            let c = random_quaternion(&mut rng);
            assert!(close(a.mul(b).mul(c), a.mul(b.mul(c))));
        }
    }

    #[test]
    fn conjugate_product_is_squared_norm() {
        let q = Q::new(1.0, -2.0, 3.0, 0.5);
        let p = q.mul(q.conj());
        assert!(p.i.abs() < 1e-12);
        assert!(p.j.abs() < 1e-12);
        assert!(p.k.abs() < 1e-12);
        assert!((p.r - q.norm() * q.norm()).abs() < 1e-9);
    }

    #[test]
    fn division_inverts_multiplication() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let a = random_quaternion(&mut rng);
            let b = random_quaternion(&mut rng);
            assert!(close(a.mul(b).div(b), a));
        }
    }

    #[test]
    fn random_quaternion_is_unit() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let q = random_quaternion(&mut rng);
            assert!((q.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn unit_rotation_preserves_norm() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let q = random_quaternion(&mut rng);
            let v = V::new(0.3, -1.2, 2.0);
            let r = q.rotate(v);
            assert!((r.norm() - v.norm()).abs() < 1e-9);
        }
    }

    #[test]
    fn identity_rotation() {
        let id = Q::new(0.0, 0.0, 0.0, 1.0);
        let v = V::new(1.0, 2.0, 3.0);
        assert_eq!(id.rotate(v), v);
    }
}
