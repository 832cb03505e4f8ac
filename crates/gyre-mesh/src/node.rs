//! Per-node routing state.

use gyre_geom::{random_vector, V};
use gyre_locate::solve_monte_carlo;
use rand::Rng;

use crate::{Data, MeshError, PeerList};

/// Tolerances and restart count for the per-node centroid solve. Loose on
/// purpose: the position only needs to be good enough to steer gossip.
const CENTROID_NONSMOOTH_TOL: f64 = 0.1;
const CENTROID_SMOOTH_TOL: f64 = 0.1;
const CENTROID_RESTARTS: usize = 2;

/// Arena handle for a node. Handles may dangle after a node leaves;
/// holders treat a vacated slot as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The four phases of the node state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Newly constructed; introduces itself to an arbitrary node.
    Join,
    /// Idle; occasionally wakes to exchange data or ask for peers.
    Wait,
    /// Pushing one owned datum toward a closer peer.
    ExchangeData,
    /// Requesting a second-hand peer reference.
    AskPeer,
}

impl Phase {
    pub const COUNT: usize = 4;

    /// Stable index for state-count histograms.
    pub fn index(self) -> usize {
        match self {
            Phase::Join => 0,
            Phase::Wait => 1,
            Phase::ExchangeData => 2,
            Phase::AskPeer => 3,
        }
    }
}

/// One participant in the mesh.
///
/// Owns a fixed set of slots in the global data pool (`data_indices`) and
/// a bounded peer list. Its `location` is the weighted-geodesic centroid
/// of the data it currently holds, re-solved after every mutation, or a
/// uniform-random point while it holds nothing.
#[derive(Debug)]
pub struct Node {
    pub location: V,
    pub(crate) state: Phase,
    pub(crate) next_state: Phase,
    /// Phase during the previous tick; this is what the per-tick state
    /// counts report.
    pub(crate) last_state: Phase,
    /// Last non-wait action, alternating ExchangeData and AskPeer.
    pub(crate) last_action: Phase,
    pub(crate) current_bytes: usize,
    pub(crate) max_bytes: usize,
    /// Probability per tick of waking from Wait.
    pub(crate) wait_activity: f64,
    /// Reserved indices into the global data pool. A reserved slot is
    /// empty while the pool entry is `None`.
    pub(crate) data_indices: Vec<usize>,
    pub(crate) peers: PeerList,
    fx: f64,
    fx_sq: f64,
    n_fx: usize,
}

impl Node {
    /// Construct a node in `Join` over its reserved slots and solve its
    /// starting location from whatever data the slots already hold.
    ///
    /// A node has no position to fall back on before its first solve, so
    /// a divergence here surfaces as [`MeshError::NoNemflSolution`] and
    /// no node is produced.
    pub fn new<R: Rng + ?Sized>(
        data: &[Option<Data>],
        data_indices: Vec<usize>,
        max_bytes: usize,
        wait_activity: f64,
        peers: PeerList,
        rng: &mut R,
    ) -> Result<Self, MeshError> {
        let mut node = Self {
            location: V::UNIT_X,
            state: Phase::Join,
            next_state: Phase::Join,
            last_state: Phase::Join,
            last_action: Phase::Wait,
            current_bytes: 0,
            max_bytes,
            wait_activity,
            data_indices,
            peers,
            fx: 0.0,
            fx_sq: 0.0,
            n_fx: 0,
        };
        node.recompute_location(data, rng)?;
        Ok(node)
    }

    pub fn state(&self) -> Phase {
        self.state
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn current_bytes(&self) -> usize {
        self.current_bytes
    }

    pub fn data_indices(&self) -> &[usize] {
        &self.data_indices
    }

    pub fn peers(&self) -> &PeerList {
        &self.peers
    }

    /// Last solved objective value and its square-sum / term count.
    pub fn fx_terms(&self) -> (f64, f64, usize) {
        (self.fx, self.fx_sq, self.n_fx)
    }

    /// Whether the node may service requests this tick: only nodes in
    /// `Wait` or `Join` accept transfers and peer hellos.
    pub fn is_receptive(&self) -> bool {
        matches!(self.state, Phase::Wait | Phase::Join)
    }

    /// Locations of the data currently held, skipping empty slots.
    pub fn data_locations(&self, data: &[Option<Data>]) -> Vec<V> {
        self.data_indices
            .iter()
            .filter_map(|&i| data[i].as_ref())
            .map(|d| d.location)
            .collect()
    }

    /// Cached locations of retained peers, for visualization.
    pub fn peer_locations(&self) -> Vec<V> {
        self.peers.locations()
    }

    /// First reserved slot whose pool entry is empty.
    pub fn free_slot(&self, data: &[Option<Data>]) -> Option<usize> {
        self.data_indices.iter().copied().find(|&i| data[i].is_none())
    }

    /// Whether this node can take `d`: enough byte headroom and a free
    /// slot. On success returns the slot to write into.
    pub fn can_accept(&self, d: &Data, data: &[Option<Data>]) -> Result<usize, MeshError> {
        if d.size + self.current_bytes > self.max_bytes {
            return Err(MeshError::CapacityExceeded);
        }
        self.free_slot(data).ok_or(MeshError::SlotExhausted)
    }

    /// Re-solve the node's position and byte count from its data.
    ///
    /// With no data the node floats to a uniform-random point and its
    /// objective terms zero out. If the solver diverges the node keeps
    /// its previous location and statistics, and the typed failure is
    /// returned for the caller to inspect.
    pub fn recompute_location<R: Rng + ?Sized>(
        &mut self,
        data: &[Option<Data>],
        rng: &mut R,
    ) -> Result<(), MeshError> {
        let mut bytes = 0;
        let mut locations = Vec::with_capacity(self.data_indices.len());
        for &i in &self.data_indices {
            if let Some(d) = &data[i] {
                locations.push(d.location);
                bytes += d.size;
            }
        }
        self.current_bytes = bytes;
        if locations.is_empty() {
            self.location = random_vector(rng);
            self.fx = 0.0;
            self.fx_sq = 0.0;
            self.n_fx = 0;
            return Ok(());
        }
        let weights = vec![1.0; locations.len()];
        let p = solve_monte_carlo(
            &locations,
            &weights,
            CENTROID_NONSMOOTH_TOL,
            CENTROID_SMOOTH_TOL,
            CENTROID_RESTARTS,
            rng,
        )?;
        self.location = p.location;
        self.fx = p.fx;
        self.fx_sq = p.fx_sq;
        self.n_fx = p.n_fx;
        Ok(())
    }

    /// Inspect freshly generated data in slot `idx`: a node rejects its
    /// own oversize data by clearing the slot. Always re-solves.
    pub fn apply_new_data<R: Rng + ?Sized>(
        &mut self,
        data: &mut [Option<Data>],
        idx: usize,
        rng: &mut R,
    ) -> Result<(), MeshError> {
        if let Some(d) = &data[idx] {
            if d.size + self.current_bytes > self.max_bytes {
                data[idx] = None;
            }
        }
        self.recompute_location(data, rng)
    }

    /// Commit the staged state. The phase just left becomes `last_state`.
    pub fn advance_state(&mut self) {
        self.last_state = self.state;
        self.state = self.next_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool_with(payloads: &[&str]) -> Vec<Option<Data>> {
        payloads.iter().map(|p| Some(Data::from_payload(p.as_bytes()))).collect()
    }

    #[test]
    fn new_node_without_data_floats_randomly() {
        let data: Vec<Option<Data>> = vec![None, None];
        let mut rng = StdRng::seed_from_u64(2);
        let node =
            Node::new(&data, vec![0, 1], 1000, 0.5, PeerList::max_spread(4), &mut rng).unwrap();
        assert_eq!(node.state(), Phase::Join);
        assert!((node.location.norm() - 1.0).abs() < 1e-9);
        assert_eq!(node.fx_terms(), (0.0, 0.0, 0));
        assert_eq!(node.current_bytes(), 0);
    }

    #[test]
    fn new_node_with_data_sits_at_centroid() {
        let data = pool_with(&["alpha", "beta", "gamma"]);
        let mut rng = StdRng::seed_from_u64(3);
        let node =
            Node::new(&data, vec![0, 1, 2], 1 << 30, 0.5, PeerList::max_spread(4), &mut rng)
                .unwrap();
        assert!((node.location.norm() - 1.0).abs() < 1e-9);
        let (fx, fx_sq, n_fx) = node.fx_terms();
        assert!(fx > 0.0);
        assert!(fx_sq > 0.0);
        assert_eq!(n_fx, 3);
        assert_eq!(node.current_bytes(), 5 + 4 + 5);
    }

    #[test]
    fn byte_accounting_tracks_occupied_slots() {
        let mut data = pool_with(&["12345678", "1234"]);
        data.push(None);
        let mut rng = StdRng::seed_from_u64(4);
        let mut node =
            Node::new(&data, vec![0, 1, 2], 1 << 30, 0.5, PeerList::max_spread(4), &mut rng)
                .unwrap();
        assert_eq!(node.current_bytes(), 12);
        assert_eq!(node.free_slot(&data), Some(2));
        data[0] = None;
        node.recompute_location(&data, &mut rng).unwrap();
        assert_eq!(node.current_bytes(), 4);
    }

    #[test]
    fn can_accept_enforces_both_limits() {
        let data = pool_with(&["xxxxxxxx"]);
        let mut rng = StdRng::seed_from_u64(5);
        let node = Node::new(&data, vec![0], 10, 0.5, PeerList::max_spread(4), &mut rng).unwrap();
        let incoming = Data::from_payload(b"yy");
        // Slot 0 is occupied: no free slot even though bytes would fit.
        assert_eq!(node.can_accept(&incoming, &data), Err(MeshError::SlotExhausted));
        let big = Data::from_payload(&[0u8; 64]);
        assert_eq!(node.can_accept(&big, &data), Err(MeshError::CapacityExceeded));
    }

    #[test]
    fn oversize_self_generated_data_is_dropped() {
        let mut data = pool_with(&["0123456789"]);
        data.push(None);
        let mut rng = StdRng::seed_from_u64(6);
        let mut node =
            Node::new(&data, vec![0, 1], 12, 0.5, PeerList::max_spread(4), &mut rng).unwrap();
        assert_eq!(node.current_bytes(), 10);
        // New datum of 8 bytes would exceed max_bytes = 12.
        data[1] = Some(Data::from_payload(b"abcdefgh"));
        node.apply_new_data(&mut data, 1, &mut rng).unwrap();
        assert!(data[1].is_none());
        assert_eq!(node.current_bytes(), 10);
        // A small one fits and stays.
        data[1] = Some(Data::from_payload(b"a"));
        node.apply_new_data(&mut data, 1, &mut rng).unwrap();
        assert!(data[1].is_some());
        assert_eq!(node.current_bytes(), 11);
    }

    #[test]
    fn advance_state_records_previous_phase() {
        let data: Vec<Option<Data>> = vec![];
        let mut rng = StdRng::seed_from_u64(7);
        let mut node = Node::new(&data, vec![], 0, 0.5, PeerList::max_spread(4), &mut rng).unwrap();
        node.next_state = Phase::Wait;
        node.advance_state();
        assert_eq!(node.state(), Phase::Wait);
        assert_eq!(node.last_state, Phase::Join);
    }
}
