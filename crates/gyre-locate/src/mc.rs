//! Brute-force Monte Carlo minimizer of the NEMFL objective.
//!
//! Useful as a cross-check on the solver: no projection, no descent, just
//! uniform sampling. Converges like `O(1/sqrt(n))`, so it is strictly a
//! diagnostic tool.

use gyre_geom::{random_vector, V};
use rand::Rng;

use crate::geodesic_distances;

/// Return the best of `n_samples` uniform-random unit vectors by lowest
/// weighted-geodesic objective.
pub fn monte_carlo_minimize<R: Rng + ?Sized>(
    locations: &[V],
    weights: &[f64],
    n_samples: usize,
    rng: &mut R,
) -> V {
    let mut best = random_vector(rng);
    let (mut best_fx, _) = geodesic_distances(best, locations, weights);
    for _ in 0..n_samples {
        let candidate = random_vector(rng);
        let (fx, _) = geodesic_distances(candidate, locations, weights);
        if fx < best_fx {
            best_fx = fx;
            best = candidate;
        }
    }
    best
}
