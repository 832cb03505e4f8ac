//! Stochastic parameter factories.
//!
//! Every stochastic parameter of the simulation comes from a two-stage
//! draw. A [`Hyper`] captures a hyper-distribution: uncertainty in both
//! the mean and the standard deviation of a normal distribution. Calling
//! [`Hyper::sampler`] draws one concrete `(mean, sd)` pair and returns a
//! [`NormalSampler`], so each node is constructed with its own slightly
//! different parameter distribution. This models node-level heterogeneity
//! and rewards experiments that reduce uncertainty.
//!
//! No global RNG: every draw goes through the caller's generator, which
//! keeps identically seeded simulations bit-identical.

use rand::Rng;
use rand_distr::StandardNormal;

/// Uncertainty in a normal distribution's own parameters.
#[derive(Debug, Clone, Copy)]
pub struct Hyper {
    pub mean_of_mean: f64,
    pub sd_of_mean: f64,
    pub mean_of_sd: f64,
    pub sd_of_sd: f64,
}

impl Hyper {
    pub const fn new(mean_of_mean: f64, sd_of_mean: f64, mean_of_sd: f64, sd_of_sd: f64) -> Self {
        Self { mean_of_mean, sd_of_mean, mean_of_sd, sd_of_sd }
    }

    /// Draw one concrete `(mean, sd)` and return the resulting sampler.
    pub fn sampler<R: Rng + ?Sized>(&self, rng: &mut R) -> NormalSampler {
        let sd = rng.sample::<f64, _>(StandardNormal) * self.sd_of_sd + self.mean_of_sd;
        let mean = rng.sample::<f64, _>(StandardNormal) * self.sd_of_mean + self.mean_of_mean;
        NormalSampler { mean, sd }
    }
}

/// A concrete normal sampler produced by a [`Hyper`], with the shaping
/// variants the simulation parameters need.
#[derive(Debug, Clone, Copy)]
pub struct NormalSampler {
    pub mean: f64,
    pub sd: f64,
}

impl NormalSampler {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.sample::<f64, _>(StandardNormal) * self.sd + self.mean
    }

    /// Floor of a draw, capped above by `max` and below by zero.
    pub fn sample_capped<R: Rng + ?Sized>(&self, rng: &mut R, max: usize) -> usize {
        let v = self.sample(rng).floor().min(max as f64);
        if v < 0.0 {
            0
        } else {
            v as usize
        }
    }

    /// Floor of `current + draw`, never below zero.
    pub fn sample_added<R: Rng + ?Sized>(&self, rng: &mut R, current: usize) -> usize {
        let v = (self.sample(rng) + current as f64).floor();
        if v < 0.0 {
            0
        } else {
            v as usize
        }
    }

    /// A draw clamped into `[0, 1]`, for probabilities.
    pub fn sample_unit<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sample(rng).clamp(0.0, 1.0)
    }

    /// A random payload whose length is a draw (at least one byte).
    pub fn sample_payload<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<u8> {
        let len = self.sample(rng).floor().max(1.0) as usize;
        let mut bytes = vec![0u8; len];
        rng.fill(&mut bytes[..]);
        bytes
    }
}

/// The full set of parameter families a simulation draws from.
#[derive(Debug, Clone, Copy)]
pub struct Factories {
    /// Data-pool slots reserved per node (its item bound).
    pub node_slots: Hyper,
    /// Initial data items created for a new node.
    pub node_initial_data: Hyper,
    /// Payload length in bytes.
    pub payload_size: Hyper,
    /// Byte-capacity headroom added on top of a node's initial size.
    pub node_max_bytes: Hyper,
    /// Per-tick probability of waking from Wait.
    pub wait_activity: Hyper,
    /// Per-tick, per-node chance of growing new data.
    pub data_growth: Hyper,
}

impl Default for Factories {
    fn default() -> Self {
        Self {
            node_slots: Hyper::new(2000.0, 10.0, 10.0, 10.0),
            node_initial_data: Hyper::new(100.0, 2.0, 2.0, 2.0),
            // Datashards are always ~32kb.
            payload_size: Hyper::new(32_000.0, 0.0, 0.0, 0.0),
            node_max_bytes: Hyper::new(1_000_000_000.0, 1_000_000.0, 1_000_000.0, 1_000_000.0),
            wait_activity: Hyper::new(0.5, 0.01, 0.03, 0.01),
            data_growth: Hyper::new(0.01, 0.001, 0.003, 0.001),
        }
    }
}

impl Factories {
    /// The default set with a doubled data-growth chance, used by the
    /// heavier growth experiments.
    pub fn with_fast_growth(mut self) -> Self {
        self.data_growth = Hyper::new(0.02, 0.001, 0.003, 0.001);
        self
    }

    /// A small configuration for tests: a handful of slots and tiny
    /// payloads so centroid solves stay cheap.
    pub fn small() -> Self {
        Self {
            node_slots: Hyper::new(5.0, 0.5, 0.5, 0.1),
            node_initial_data: Hyper::new(3.0, 0.5, 0.5, 0.1),
            payload_size: Hyper::new(64.0, 4.0, 4.0, 1.0),
            node_max_bytes: Hyper::new(100_000.0, 100.0, 100.0, 10.0),
            wait_activity: Hyper::new(0.5, 0.01, 0.03, 0.01),
            data_growth: Hyper::new(0.05, 0.005, 0.01, 0.001),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samplers_differ_between_draws() {
        let hyper = Hyper::new(100.0, 10.0, 5.0, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        let a = hyper.sampler(&mut rng);
        let b = hyper.sampler(&mut rng);
        // Two factory calls yield distinct concrete distributions.
        assert_ne!(a.mean, b.mean);
    }

    #[test]
    fn capped_sample_respects_bounds() {
        let sampler = NormalSampler { mean: 50.0, sd: 30.0 };
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let v = sampler.sample_capped(&mut rng, 20);
            assert!(v <= 20);
        }
        // A hugely negative mean clamps to zero rather than wrapping.
        let negative = NormalSampler { mean: -1e6, sd: 1.0 };
        assert_eq!(negative.sample_capped(&mut rng, 100), 0);
        assert_eq!(negative.sample_added(&mut rng, 10), 0);
    }

    #[test]
    fn unit_sample_stays_in_range() {
        let sampler = NormalSampler { mean: 0.5, sd: 10.0 };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let v = sampler.sample_unit(&mut rng);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn payloads_are_never_empty() {
        let sampler = NormalSampler { mean: 2.0, sd: 5.0 };
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..100 {
            assert!(!sampler.sample_payload(&mut rng).is_empty());
        }
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let hyper = Hyper::new(10.0, 2.0, 1.0, 0.5);
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        let sa = hyper.sampler(&mut a);
        let sb = hyper.sampler(&mut b);
        assert_eq!(sa.mean, sb.mean);
        assert_eq!(sa.sd, sb.sd);
        assert_eq!(sa.sample(&mut a), sb.sample(&mut b));
    }
}
