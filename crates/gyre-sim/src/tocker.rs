//! Experiment hooks applied after each tick.
//!
//! A [`Tocker`] injects churn into the ecosystem (nodes coming online or
//! offline, data growing) once the network has had time to relax. Hooks
//! run after state application and before statistics, so observations see
//! their effects immediately.

use rand::Rng;
use tracing::warn;

use crate::World;

/// The iteration treated as the relaxation point: experiments inject
/// their churn at or after this tick.
pub const RELAXED_ITER: u64 = 5000;

/// A per-tick event hook. Given the world and the iteration number, it
/// may mutate the simulation.
pub trait Tocker: Send {
    fn tock(&mut self, world: &mut World, iteration: u64);
}

/// Add one node at the relaxation point.
#[derive(Debug, Default)]
pub struct JoinAtRelaxed;

impl Tocker for JoinAtRelaxed {
    fn tock(&mut self, world: &mut World, iteration: u64) {
        if iteration == RELAXED_ITER {
            if let Err(err) = world.new_node_joins() {
                warn!(%err, "join hook could not construct a node");
            }
        }
    }
}

/// Remove the last live node at the relaxation point.
#[derive(Debug, Default)]
pub struct LeaveAtRelaxed;

impl Tocker for LeaveAtRelaxed {
    fn tock(&mut self, world: &mut World, iteration: u64) {
        if iteration == RELAXED_ITER {
            world.existing_node_leaves();
        }
    }
}

/// Let nodes grow new data on every iteration past the relaxation point.
#[derive(Debug, Default)]
pub struct GrowthAfterRelaxed;

impl Tocker for GrowthAfterRelaxed {
    fn tock(&mut self, world: &mut World, iteration: u64) {
        if iteration > RELAXED_ITER {
            world.generate_local_data();
        }
    }
}

/// Production-like churn: data growth plus, with 2% probability per
/// iteration, a coin flip between a join and a leave. Leaves are held
/// back for another thousand iterations so the network re-relaxes first.
#[derive(Debug, Default)]
pub struct Prod;

impl Tocker for Prod {
    fn tock(&mut self, world: &mut World, iteration: u64) {
        if iteration <= RELAXED_ITER {
            return;
        }
        world.generate_local_data();
        if world.rng().gen_range(0..100) < 2 {
            if world.rng().gen_range(0..2) == 0 && iteration > RELAXED_ITER + 1000 {
                world.existing_node_leaves();
            } else if let Err(err) = world.new_node_joins() {
                warn!(%err, "churn join could not construct a node");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Factories, PeerPolicy};

    fn world() -> World {
        World::new(64, 8, 3, 7, Factories::small(), PeerPolicy::default())
    }

    #[test]
    fn join_fires_only_at_relaxed() {
        let mut w = world();
        let mut hook = JoinAtRelaxed;
        hook.tock(&mut w, RELAXED_ITER - 1);
        assert_eq!(w.mesh().live_node_count(), 3);
        hook.tock(&mut w, RELAXED_ITER);
        assert_eq!(w.mesh().live_node_count(), 4);
        hook.tock(&mut w, RELAXED_ITER + 1);
        assert_eq!(w.mesh().live_node_count(), 4);
    }

    #[test]
    fn leave_fires_only_at_relaxed() {
        let mut w = world();
        let mut hook = LeaveAtRelaxed;
        hook.tock(&mut w, RELAXED_ITER - 1);
        assert_eq!(w.mesh().live_node_count(), 3);
        hook.tock(&mut w, RELAXED_ITER);
        assert_eq!(w.mesh().live_node_count(), 2);
    }

    #[test]
    fn growth_waits_for_relaxation() {
        let mut w = world();
        let held_before: usize = w.mesh().data().iter().flatten().count();
        let mut hook = GrowthAfterRelaxed;
        hook.tock(&mut w, RELAXED_ITER);
        assert_eq!(w.mesh().data().iter().flatten().count(), held_before);
        // Growth is stochastic; over many post-relaxation ticks some node
        // wins its draw.
        for i in 1..=500 {
            hook.tock(&mut w, RELAXED_ITER + i);
        }
        assert!(w.mesh().data().iter().flatten().count() > held_before);
    }

    #[test]
    fn prod_keeps_population_in_pool_bounds() {
        let mut w = world();
        let mut hook = Prod;
        for i in 0..2000 {
            hook.tock(&mut w, RELAXED_ITER + 1 + i);
            let live = w.mesh().live_node_count();
            assert!(live <= w.mesh().nodes().len());
        }
    }
}
