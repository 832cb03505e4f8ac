//! The mutable simulation state behind the reader/writer lock.

use gyre_mesh::{Data, Mesh, MeshError, Node, NodeId, PeerList};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::Factories;

/// Which peer-retention policy newly constructed nodes get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPolicy {
    MaxSpread { capacity: usize },
    Closest { capacity: usize },
    Hybrid { spread: usize, closest: usize },
}

impl PeerPolicy {
    pub fn build(&self) -> PeerList {
        match *self {
            PeerPolicy::MaxSpread { capacity } => PeerList::max_spread(capacity),
            PeerPolicy::Closest { capacity } => PeerList::closest(capacity),
            PeerPolicy::Hybrid { spread, closest } => PeerList::hybrid(spread, closest),
        }
    }
}

impl Default for PeerPolicy {
    fn default() -> Self {
        PeerPolicy::MaxSpread { capacity: 16 }
    }
}

/// Everything a tick mutates: the mesh arena, the simulation RNG, and
/// the parameter factories new nodes draw from.
///
/// Visualizers read this through the simulation's reader/writer lock;
/// everything reachable from [`World::mesh`] is stable for the duration
/// of a read guard.
#[derive(Debug)]
pub struct World {
    mesh: Mesh,
    rng: StdRng,
    factories: Factories,
    peer_policy: PeerPolicy,
}

impl World {
    pub fn new(
        n_max_data: usize,
        n_max_node: usize,
        n_start_nodes: usize,
        seed: u64,
        factories: Factories,
        peer_policy: PeerPolicy,
    ) -> Self {
        let mut world = Self {
            mesh: Mesh::new(n_max_data, n_max_node),
            rng: StdRng::seed_from_u64(seed),
            factories,
            peer_policy,
        };
        for _ in 0..n_start_nodes.min(n_max_node) {
            if let Err(err) = world.new_node_joins() {
                warn!(%err, "seed node kept out of the mesh");
            }
        }
        info!(
            nodes = world.mesh.live_node_count(),
            free_slots = world.mesh.n_data_free(),
            seed,
            "world seeded"
        );
        world
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// The per-simulation RNG. Event hooks share it so runs stay
    /// reproducible from the seed alone.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Apply every live node's state, then commit all staged transitions.
    /// `log` receives one summary line per applied node.
    pub fn tick(&mut self, mut log: impl FnMut(String)) {
        for i in 0..self.mesh.nodes().len() {
            if let Some(summary) = self.mesh.apply_state(NodeId(i), &mut self.rng) {
                log(summary);
            }
        }
        self.mesh.advance_all();
    }

    /// Construct a node in the first empty arena slot, drawing its slot
    /// count, initial data, capacity and activity from the factories.
    ///
    /// If the new node's centroid solve diverges, no node joins and the
    /// typed failure is returned for the caller to inspect.
    pub fn new_node_joins(&mut self) -> Result<(), MeshError> {
        if self.mesh.live_node_count() == self.mesh.nodes().len() {
            return Ok(());
        }
        let node = self.create_node()?;
        self.mesh.insert_node(node);
        Ok(())
    }

    /// Remove the last live node and purge it from peer lists.
    pub fn existing_node_leaves(&mut self) {
        self.mesh.existing_node_leaves();
    }

    /// Each live node draws its growth chance; winners with a free slot
    /// get a fresh random payload there (and reject it themselves if it
    /// busts their byte capacity).
    pub fn generate_local_data(&mut self) {
        let chance_sampler = self.factories.data_growth.sampler(&mut self.rng);
        let payload_sampler = self.factories.payload_size.sampler(&mut self.rng);
        for i in 0..self.mesh.nodes().len() {
            let id = NodeId(i);
            let Some(node) = self.mesh.node(id) else { continue };
            let chance = chance_sampler.sample_unit(&mut self.rng);
            if self.rng.gen::<f64>() >= chance {
                continue;
            }
            let Some(idx) = node.free_slot(self.mesh.data()) else { continue };
            let payload = payload_sampler.sample_payload(&mut self.rng);
            self.mesh.put_data(idx, Data::from_payload(&payload));
            if let Err(err) = self.mesh.apply_new_data(id, idx, &mut self.rng) {
                warn!(%err, node = %id, "node kept previous location after growth");
            }
        }
    }

    fn create_node(&mut self) -> Result<Node, MeshError> {
        let slots_sampler = self.factories.node_slots.sampler(&mut self.rng);
        let initial_sampler = self.factories.node_initial_data.sampler(&mut self.rng);
        let payload_sampler = self.factories.payload_size.sampler(&mut self.rng);
        let max_bytes_sampler = self.factories.node_max_bytes.sampler(&mut self.rng);
        let wait_sampler = self.factories.wait_activity.sampler(&mut self.rng);

        let want = slots_sampler.sample_capped(&mut self.rng, self.mesh.n_data_free());
        let indices = self.mesh.reserve_slots(want);
        let n_initial = initial_sampler.sample_capped(&mut self.rng, indices.len());
        let mut size = 0;
        for &idx in indices.iter().take(n_initial) {
            let payload = payload_sampler.sample_payload(&mut self.rng);
            size += self.mesh.put_data(idx, Data::from_payload(&payload));
        }
        let max_bytes = max_bytes_sampler.sample_added(&mut self.rng, size);
        let wait_activity = wait_sampler.sample_unit(&mut self.rng);
        match Node::new(
            self.mesh.data(),
            indices.clone(),
            max_bytes,
            wait_activity,
            self.peer_policy.build(),
            &mut self.rng,
        ) {
            Ok(node) => Ok(node),
            Err(err) => {
                // The reservation must not outlive the failed construction.
                self.mesh.release_slots(&indices);
                Err(err)
            }
        }
    }
}
