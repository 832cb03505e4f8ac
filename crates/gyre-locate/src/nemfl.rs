//! Non-Euclidean Multi-Facility Location on the unit sphere.
//!
//! Given locations `a_1..a_n` on the unit sphere and positive weights
//! `c_1..c_n`, find the point `x` minimizing the weighted sum of
//! great-circle distances
//!
//! ```text
//! F(x) = Σ c_j · gcd(x, a_j)
//! ```
//!
//! The algorithm follows:
//!
//! > "A Globally Convergent Algorithm for Facility Location on a Sphere"
//! > by G.-L. Xue, Computers Math. Applic. Vol. 27, No. 6, pp. 37-50, 1994
//!
//! # Two phases
//!
//! **Non-smooth** (Step 1): `F` is non-differentiable at the input points
//! themselves, so each `a_t` whose leave-one-out objective dominates all
//! others is tested against the paper's Equation 15. A hit is returned
//! directly.
//!
//! **Smooth** (Steps 3-4): otherwise a gradient-style descent runs from an
//! initial point, linearizing each term through a rescaled stereographic
//! projection onto the plane tangent at the current iterate, with Armijo
//! backtracking on the step length.
//!
//! The paper's Step 2 (constructing the smooth starting point from the
//! dominant non-smooth candidate) does not work out in practice; instead,
//! uniform random points are drawn until one beats the best non-smooth
//! objective. The draw count is capped, and exhaustion reports
//! [`Error::NoNemflSolution`].
//!
//! [`solve_monte_carlo`] wraps the smooth phase in random restarts and
//! keeps the best finite result, which is how nodes recompute their
//! position from owned data.

use gyre_geom::{random_vector, V};
use rand::Rng;

use crate::{Error, Result};

const MAX_OUTER_ITERS: usize = 100_000;
const MAX_STEP_HALVINGS: usize = 1_000;
const MAX_SEED_DRAWS: usize = 10_000;
const SEED_STEP: f64 = 0.001;

/// A solved location together with the objective observability terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// The minimizing location, unit-norm.
    pub location: V,
    /// `F(x)` at the solution.
    pub fx: f64,
    /// Sum of the squared per-term contributions to `F(x)`.
    pub fx_sq: f64,
    /// Number of terms in the objective.
    pub n_fx: usize,
}

enum NonSmooth {
    /// An input point satisfied the non-smooth optimality condition.
    Optimal(Placement),
    /// No input point is optimal; descend from this seed.
    Seed { x0: V, alpha0: f64 },
}

/// Solve for the weighted-geodesic centroid of `locations`.
///
/// Checks the non-smooth candidates first, then runs a single smooth
/// descent. Weights must be positive and every location unit-norm.
pub fn solve<R: Rng + ?Sized>(
    locations: &[V],
    weights: &[f64],
    nonsmooth_tolerance: f64,
    smooth_tolerance: f64,
    rng: &mut R,
) -> Result<V> {
    match solve_nonsmooth(locations, weights, nonsmooth_tolerance, rng)? {
        NonSmooth::Optimal(p) => Ok(p.location),
        NonSmooth::Seed { x0, alpha0 } => {
            solve_smooth(locations, weights, smooth_tolerance, x0, alpha0)
                .map(|p| p.location)
                .ok_or(Error::NoNemflSolution)
        }
    }
}

/// Solve the smooth problem only, descending from `initial`.
///
/// Deterministic: no random sampling is involved, so a fixed starting
/// point always reproduces the same iterate sequence.
pub fn solve_skip_nonsmooth(
    locations: &[V],
    weights: &[f64],
    smooth_tolerance: f64,
    initial: V,
) -> Result<V> {
    solve_smooth(locations, weights, smooth_tolerance, initial, SEED_STEP)
        .map(|p| p.location)
        .ok_or(Error::NoNemflSolution)
}

/// Solve with `n_restarts` Monte Carlo restarts of the smooth phase.
///
/// A non-smooth optimum short-circuits. Otherwise the first descent runs
/// from the sampled seed and every further restart from a fresh random
/// unit vector; the best finite result by lowest `F(x)` wins. Fails only
/// if every attempt diverges.
pub fn solve_monte_carlo<R: Rng + ?Sized>(
    locations: &[V],
    weights: &[f64],
    nonsmooth_tolerance: f64,
    smooth_tolerance: f64,
    n_restarts: usize,
    rng: &mut R,
) -> Result<Placement> {
    let seed = match solve_nonsmooth(locations, weights, nonsmooth_tolerance, rng)? {
        NonSmooth::Optimal(p) => return Ok(p),
        NonSmooth::Seed { x0, alpha0 } => (x0, alpha0),
    };
    let mut best: Option<Placement> = None;
    for attempt in 0..n_restarts {
        let (x0, alpha0) = if attempt == 0 {
            seed
        } else {
            (random_vector(rng), SEED_STEP)
        };
        if let Some(p) = solve_smooth(locations, weights, smooth_tolerance, x0, alpha0) {
            if best.map_or(true, |b| p.fx < b.fx) {
                best = Some(p);
            }
        }
    }
    best.ok_or(Error::NoNemflSolution)
}

/// `F(p)` and the sum of its squared per-term contributions.
pub fn geodesic_distances(p: V, locations: &[V], weights: &[f64]) -> (f64, f64) {
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for (a, c) in locations.iter().zip(weights) {
        let v = p.great_circle_distance(*a) * c;
        sum += v;
        sum_sq += v * v;
    }
    (sum, sum_sq)
}

/// Leave-one-out objective: `F(a_t)` summed over every index but `t`.
fn geodesic_distances_from(t: usize, locations: &[V], weights: &[f64]) -> (f64, f64) {
    let p = locations[t];
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for (j, (a, c)) in locations.iter().zip(weights).enumerate() {
        if j == t {
            continue;
        }
        let v = p.great_circle_distance(*a) * c;
        sum += v;
        sum_sq += v * v;
    }
    (sum, sum_sq)
}

fn solve_nonsmooth<R: Rng + ?Sized>(
    locations: &[V],
    weights: &[f64],
    tolerance: f64,
    rng: &mut R,
) -> Result<NonSmooth> {
    if locations.is_empty() {
        return Err(Error::NoNemflSolution);
    }
    let n = locations.len();
    let mut faj = vec![0.0; n];
    let mut fsqaj = vec![0.0; n];
    for j in 0..n {
        let (f, fsq) = geodesic_distances_from(j, locations, weights);
        faj[j] = f;
        fsqaj[j] = fsq;
    }
    // Step 1: any input point whose leave-one-out objective dominates all
    // others is a non-smooth candidate. Ties keep the last candidate seen,
    // which is fine as a descent anchor since the smooth phase converges
    // from an arbitrary start.
    let mut at0 = 0;
    for t in 0..n {
        let dominant = (0..n).all(|j| j == t || faj[j] <= faj[t]);
        if dominant {
            at0 = t;
            if nonsmooth_optimal(t, locations, weights, tolerance) {
                return Ok(NonSmooth::Optimal(Placement {
                    location: locations[t],
                    fx: faj[t],
                    fx_sq: fsqaj[t],
                    n_fx: n,
                }));
            }
        }
    }
    // Step 2 replacement: sample until a point beats the dominant
    // non-smooth objective. Capped rather than open-ended; the objective
    // can be flat (antipodal pairs) and no better point exists.
    for _ in 0..MAX_SEED_DRAWS {
        let candidate = random_vector(rng);
        let (fx, _) = geodesic_distances(candidate, locations, weights);
        if fx < faj[at0] {
            return Ok(NonSmooth::Seed { x0: candidate, alpha0: SEED_STEP });
        }
    }
    Err(Error::NoNemflSolution)
}

/// Equation 15: the optimality test at the non-differentiable points.
fn nonsmooth_optimal(t: usize, locations: &[V], weights: &[f64], tolerance: f64) -> bool {
    let p = locations[t];
    let mut s = V::ZERO;
    for (j, (a, c)) in locations.iter().zip(weights).enumerate() {
        if j == t {
            continue;
        }
        let num = p - *a / p.dot(*a);
        let den = num.norm();
        s = s + num * (*c / den);
    }
    s.norm() <= weights[t] + tolerance
}

fn solve_smooth(
    locations: &[V],
    weights: &[f64],
    tolerance: f64,
    x0: V,
    alpha0: f64,
) -> Option<Placement> {
    let n = locations.len();
    let mut xk = x0;
    let mut alphak = alpha0;
    let mut prev_fxk = 0.0;
    for k in 1..MAX_OUTER_ITERS {
        // Step 3: descent direction through the tangent-plane projection.
        let grad = gradient(xk, locations, weights);
        let dk = -grad;
        let (fxk, fxsqk) = geodesic_distances(xk, locations, weights);
        let done = Placement { location: xk, fx: fxk, fx_sq: fxsqk, n_fx: n };
        if k == 1 {
            prev_fxk = fxk;
        } else if prev_fxk == fxk {
            // Stuck in a local minimum.
            return Some(done);
        } else {
            prev_fxk = fxk;
        }
        if grad.norm() < tolerance {
            return Some(done);
        }
        alphak = step_length(xk, locations, weights);
        // Step 4: Armijo backtracking on the step length.
        let mut prev_fxn = 0.0;
        for alpha_iter in 1..MAX_STEP_HALVINGS {
            let xn = (xk + dk * alphak).unit();
            let (fxn, _) = geodesic_distances(xn, locations, weights);
            if fxn <= fxk - 0.1 * alphak * dk.norm() * dk.norm() {
                xk = xn;
                break;
            }
            if alpha_iter == 1 {
                prev_fxn = fxn;
            } else if prev_fxn == fxn {
                return Some(done);
            }
            alphak *= 0.5;
        }
    }
    None
}

/// `Σ c_j (x − s(a_j, x)) / ‖x − s(a_j, x)‖`, the linearized gradient of
/// `F` at `x`. Antipodal terms are skipped; the projection cannot express
/// them.
fn gradient(x: V, locations: &[V], weights: &[f64]) -> V {
    let mut s = V::ZERO;
    for (a, c) in locations.iter().zip(weights) {
        if *a == -x {
            continue;
        }
        let num = x - stereographic(*a, x);
        let den = num.norm();
        s = s + num * (*c / den);
    }
    s
}

/// Step 3 step length: `1 / Σ c_j / ‖x − s(a_j, x)‖`.
fn step_length(x: V, locations: &[V], weights: &[f64]) -> f64 {
    let mut s = 0.0;
    for (a, c) in locations.iter().zip(weights) {
        if *a == -x {
            continue;
        }
        s += c / (x - stereographic(*a, x)).norm();
    }
    1.0 / s
}

/// Project `a` onto the plane tangent to the sphere at `x`, rescaled so
/// the planar distance equals the true geodesic distance.
///
/// Projecting from the antipole of `x` maps the hemisphere near `x`
/// inside the projection. The raw projection lands on the parallel plane
/// through the origin; the result is rescaled to geodesic length and
/// translated onto the tangent plane at `x`.
///
/// `a == x` returns `x`; `a == -x` returns `-x` (useless, so callers must
/// skip antipodal terms).
pub fn stereographic(a: V, x: V) -> V {
    if a == x {
        return x;
    }
    let p = -x;
    if a == p {
        return p;
    }
    let proj0 = p + (a - p) / (1.0 - a.dot(p));
    let dist = x.great_circle_distance(a);
    proj0.unit() * dist + x
}
