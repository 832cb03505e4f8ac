//! The shared arena: preallocated data and node pools, slot reservation
//! bookkeeping, and the node-to-node interactions driven each tick.

use rand::Rng;
use tracing::{debug, warn};

use crate::{Data, MeshError, Node, NodeId, Phase};

/// The global pools and their ownership bookkeeping.
///
/// Both pools are sized once and never grow. The mesh is the sole owner
/// of nodes and data; nodes refer to data by index and to each other by
/// [`NodeId`]. `allocd_to_node[i]` tracks whether some node has reserved
/// data slot `i`, independently of whether the slot currently holds a
/// descriptor.
#[derive(Debug)]
pub struct Mesh {
    data: Vec<Option<Data>>,
    allocd_to_node: Vec<bool>,
    n_data_free: usize,
    nodes: Vec<Option<Node>>,
}

impl Mesh {
    pub fn new(n_max_data: usize, n_max_node: usize) -> Self {
        Self {
            data: vec![None; n_max_data],
            allocd_to_node: vec![false; n_max_data],
            n_data_free: n_max_data,
            nodes: (0..n_max_node).map(|_| None).collect(),
        }
    }

    pub fn data(&self) -> &[Option<Data>] {
        &self.data
    }

    pub fn nodes(&self) -> &[Option<Node>] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    pub fn allocd_to_node(&self) -> &[bool] {
        &self.allocd_to_node
    }

    /// Count of data slots not reserved by any node.
    pub fn n_data_free(&self) -> usize {
        self.n_data_free
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i), n)))
    }

    pub fn live_node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Reserve up to `want` free data slots for a new node and mark them
    /// allocated. Returns the reserved indices (fewer than `want` when
    /// the pool runs short).
    pub fn reserve_slots(&mut self, want: usize) -> Vec<usize> {
        let take = want.min(self.n_data_free);
        let mut indices = Vec::with_capacity(take);
        for (idx, allocd) in self.allocd_to_node.iter_mut().enumerate() {
            if indices.len() >= take {
                break;
            }
            if !*allocd {
                *allocd = true;
                indices.push(idx);
            }
        }
        self.n_data_free -= indices.len();
        indices
    }

    /// Write a descriptor into a reserved slot, returning its size.
    pub fn put_data(&mut self, idx: usize, d: Data) -> usize {
        let size = d.size;
        self.data[idx] = Some(d);
        size
    }

    pub fn clear_data(&mut self, idx: usize) {
        self.data[idx] = None;
    }

    /// Place a node in the first empty arena slot.
    pub fn insert_node(&mut self, node: Node) -> Option<NodeId> {
        let slot = self.nodes.iter().position(|n| n.is_none())?;
        self.nodes[slot] = Some(node);
        Some(NodeId(slot))
    }

    /// Any live node other than `me`, or `None` when the caller is alone.
    pub fn find_other_arbitrary_node<R: Rng + ?Sized>(
        &self,
        me: NodeId,
        rng: &mut R,
    ) -> Option<NodeId> {
        let has_other = self
            .nodes
            .iter()
            .enumerate()
            .any(|(i, n)| n.is_some() && i != me.0);
        if !has_other {
            return None;
        }
        loop {
            let i = rng.gen_range(0..self.nodes.len());
            if i != me.0 && self.nodes[i].is_some() {
                return Some(NodeId(i));
            }
        }
    }

    /// Run one tick of the node's state machine and stage its next state.
    ///
    /// Peers' *current* states are read throughout; transitions commit
    /// later in [`Mesh::advance_all`], so tick order does not affect who
    /// was receptive this tick. Returns a summary line for the run log,
    /// or `None` when the slot is empty.
    pub fn apply_state<R: Rng + ?Sized>(&mut self, id: NodeId, rng: &mut R) -> Option<String> {
        let phase = self.node(id)?.state();
        match phase {
            Phase::Join => {
                let mut found = "did not find other arbitrary node";
                if let Some(oid) = self.find_other_arbitrary_node(id, rng) {
                    let (me, other) = pair_mut(&mut self.nodes, id.0, oid.0);
                    // The hello may not be mutual: each side's policy
                    // decides independently.
                    if other.is_receptive() {
                        other.peers.add(other.location, id, me.location);
                        me.peers.add(me.location, oid, other.location);
                        found = "found other arbitrary node";
                    }
                }
                let node = self.nodes[id.0].as_mut().expect("checked live above");
                node.next_state = Phase::Wait;
                Some(format!("Node at {} joined and {}", node.location, found))
            }
            Phase::Wait => {
                let node = self.nodes[id.0].as_mut().expect("checked live above");
                if rng.gen::<f64>() < node.wait_activity {
                    // Alternate between the two actions.
                    if node.last_action == Phase::ExchangeData {
                        node.next_state = Phase::AskPeer;
                        node.last_action = Phase::AskPeer;
                        Some(format!("Node at {} will attempt asking peer", node.location))
                    } else {
                        node.next_state = Phase::ExchangeData;
                        node.last_action = Phase::ExchangeData;
                        Some(format!("Node at {} will attempt exchange", node.location))
                    }
                } else {
                    node.next_state = Phase::Wait;
                    Some(format!("Node at {} waited", node.location))
                }
            }
            Phase::ExchangeData => {
                let summary = self.exchange_data(id, rng);
                let node = self.nodes[id.0].as_mut().expect("checked live above");
                node.next_state = Phase::Wait;
                Some(format!("Node at {} {}", node.location, summary))
            }
            Phase::AskPeer => {
                let outcome = self.request_peer(id, rng);
                let node = self.nodes[id.0].as_mut().expect("checked live above");
                node.next_state = Phase::Wait;
                Some(match outcome {
                    Ok(()) => format!("Node at {} asked peer", node.location),
                    Err(err) => format!("Node at {} asked peer ({err})", node.location),
                })
            }
        }
    }

    /// Commit every node's staged state.
    pub fn advance_all(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.advance_state();
        }
    }

    /// Per-phase counts of what live nodes did in the tick just applied.
    pub fn count_states(&self) -> [usize; Phase::COUNT] {
        let mut counts = [0; Phase::COUNT];
        for node in self.nodes.iter().flatten() {
            counts[node.last_state.index()] += 1;
        }
        counts
    }

    /// Aggregate objective terms across live nodes.
    pub fn fx_statistics(&self) -> (f64, f64, usize) {
        let mut fx = 0.0;
        let mut fx_sq = 0.0;
        let mut n_fx = 0;
        for node in self.nodes.iter().flatten() {
            let (f, fsq, n) = node.fx_terms();
            fx += f;
            fx_sq += fsq;
            n_fx += n;
        }
        (fx, fx_sq, n_fx)
    }

    /// Offer `peer` to `node`'s list (one direction only), using the
    /// peer's live location. Returns whether the policy retained it.
    /// Useful for seeding topologies outside the gossip path.
    pub fn offer_peer(&mut self, node: NodeId, peer: NodeId) -> bool {
        if node == peer {
            return false;
        }
        let Some(peer_location) = self.node(peer).map(|p| p.location) else {
            return false;
        };
        match self.nodes[node.0].as_mut() {
            Some(n) => {
                let owner_location = n.location;
                n.peers.add(owner_location, peer, peer_location)
            }
            None => false,
        }
    }

    /// Let a node inspect freshly generated data in one of its slots;
    /// oversize data is dropped and the node re-solves its location. A
    /// diverged solve leaves the node where it was and is passed back up.
    pub fn apply_new_data<R: Rng + ?Sized>(
        &mut self,
        id: NodeId,
        idx: usize,
        rng: &mut R,
    ) -> Result<(), MeshError> {
        match self.nodes[id.0].as_mut() {
            Some(node) => node.apply_new_data(&mut self.data, idx, rng),
            None => Ok(()),
        }
    }

    /// Return reserved data slots to the free pool, clearing any
    /// descriptors still in them.
    pub fn release_slots(&mut self, indices: &[usize]) {
        for &idx in indices {
            self.data[idx] = None;
            if self.allocd_to_node[idx] {
                self.allocd_to_node[idx] = false;
                self.n_data_free += 1;
            }
        }
    }

    /// Remove the last live node. Its data slots are emptied and returned
    /// to the free pool, and every surviving node purges the leaver from
    /// its peer list.
    pub fn existing_node_leaves(&mut self) -> Option<NodeId> {
        let idx = (0..self.nodes.len()).rev().find(|&i| self.nodes[i].is_some())?;
        let node = self.nodes[idx].take().expect("found live above");
        self.release_slots(&node.data_indices);
        let leaver = NodeId(idx);
        for survivor in self.nodes.iter_mut().flatten() {
            survivor.peers.remove(leaver);
        }
        debug!(%leaver, "node left, peer references purged");
        Some(leaver)
    }

    /// Data exchange: push one owned datum to a peer that sits closer
    /// to it. The peer must be receptive this tick and able to take the
    /// datum; on accept both sides re-solve their locations and exchange
    /// peer references. On any rejection nothing changes.
    fn exchange_data<R: Rng + ?Sized>(&mut self, id: NodeId, rng: &mut R) -> String {
        let (found, has_peers) = {
            let n = self.nodes[id.0].as_ref().expect("caller checked live");
            (
                n.peers.find_closer(n.location, &self.data, &n.data_indices, rng),
                !n.peers.is_empty(),
            )
        };
        let Some((peer, di)) = found else {
            return if has_peers {
                "could not exchange data (no closer data)".into()
            } else {
                "could not exchange data (no peers)".into()
            };
        };
        if self.nodes[peer.id.0].is_none() {
            // Dangling reference left by a departed peer.
            return format!("could not exchange data (peer {} is gone)", peer.id);
        }
        let Some(datum) = self.data[di].clone() else {
            return "could not exchange data (slot emptied)".into();
        };
        let (me, other) = pair_mut(&mut self.nodes, id.0, peer.id.0);
        if !other.is_receptive() {
            return format!(
                "unsuccessfully exchanged data at index {} to peer {}",
                di, other.location
            );
        }
        match other.can_accept(&datum, &self.data) {
            Ok(slot) => {
                self.data[slot] = Some(datum);
                if let Err(err) = other.recompute_location(&self.data, rng) {
                    warn!(%err, "receiver kept previous location");
                }
                self.data[di] = None;
                if let Err(err) = me.recompute_location(&self.data, rng) {
                    warn!(%err, "sender kept previous location");
                }
                other.peers.add(other.location, id, me.location);
                me.peers.add(me.location, peer.id, other.location);
                format!("exchanged data at index {} to peer {}", di, other.location)
            }
            Err(err) => format!("could not exchange data ({err})"),
        }
    }

    /// Peer request: ask a random peer for a peer of theirs. If the
    /// intermediary is receptive, references flow both ways: it learns
    /// the asker, the asker learns the third node (by cached location;
    /// the reference may be dangling, which later use tolerates).
    fn request_peer<R: Rng + ?Sized>(&mut self, id: NodeId, rng: &mut R) -> Result<(), MeshError> {
        let o_entry = self.nodes[id.0]
            .as_ref()
            .expect("caller checked live")
            .peers
            .random(rng)
            .ok_or(MeshError::NoSuchPeer)?;
        let Some(o) = self.nodes[o_entry.id.0].as_ref() else {
            return Err(MeshError::NoSuchPeer);
        };
        let p_entry = o.peers.random_not(id, rng).ok_or(MeshError::NoSuchPeer)?;
        if !o.is_receptive() {
            return Ok(());
        }
        let (me, other) = pair_mut(&mut self.nodes, id.0, o_entry.id.0);
        other.peers.add(other.location, id, me.location);
        me.peers.add(me.location, p_entry.id, p_entry.location);
        Ok(())
    }
}

/// Disjoint mutable borrows of two live nodes.
fn pair_mut(nodes: &mut [Option<Node>], a: usize, b: usize) -> (&mut Node, &mut Node) {
    assert_ne!(a, b, "a node cannot interact with itself");
    if a < b {
        let (lo, hi) = nodes.split_at_mut(b);
        (
            lo[a].as_mut().expect("node a is live"),
            hi[0].as_mut().expect("node b is live"),
        )
    } else {
        let (lo, hi) = nodes.split_at_mut(a);
        (
            hi[0].as_mut().expect("node a is live"),
            lo[b].as_mut().expect("node b is live"),
        )
    }
}
