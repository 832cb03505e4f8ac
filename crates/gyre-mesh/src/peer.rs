//! Bounded peer lists and their retention policies.
//!
//! A peer list decides which peers a node keeps when more are offered
//! than its capacity allows. Three interchangeable policies:
//!
//! - **Max-spread** keeps the set whose pairwise distances are largest,
//!   favouring coverage of the whole sphere.
//! - **Closest** keeps the peers nearest the owner, favouring the local
//!   neighbourhood.
//! - **Hybrid** runs a max-spread sublist and falls back to a closest
//!   sublist when the first rejects.
//!
//! All three share the base bookkeeping: identity-indexed storage with
//! swap-removal, cached peer locations, and random selection. Only the
//! eviction step in `add` differs.

use std::collections::HashMap;

use gyre_geom::V;
use rand::Rng;

use crate::{Data, NodeId};

const RANDOM_NOT_MAX_TRIES: usize = 10;

/// One retained peer: an arena handle plus its last advertised location.
///
/// The cached location is what distance policies and `find_closer`
/// consult; it refreshes whenever the same peer is offered again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerEntry {
    pub id: NodeId,
    pub location: V,
}

/// Shared storage for every policy.
#[derive(Debug)]
struct BasePeers {
    index: HashMap<NodeId, usize>,
    entries: Vec<PeerEntry>,
    capacity: usize,
}

impl BasePeers {
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Duplicate adds are idempotent: refresh the stored location.
    fn refresh(&mut self, id: NodeId, location: V) -> bool {
        if let Some(&i) = self.index.get(&id) {
            self.entries[i].location = location;
            true
        } else {
            false
        }
    }

    fn push(&mut self, entry: PeerEntry) {
        self.index.insert(entry.id, self.entries.len());
        self.entries.push(entry);
    }

    fn replace(&mut self, slot: usize, entry: PeerEntry) {
        self.index.remove(&self.entries[slot].id);
        self.index.insert(entry.id, slot);
        self.entries[slot] = entry;
    }

    /// O(n) identity removal, compacting by swap-with-last.
    fn remove(&mut self, id: NodeId) {
        if let Some(i) = self.index.remove(&id) {
            self.entries.swap_remove(i);
            if i < self.entries.len() {
                self.index.insert(self.entries[i].id, i);
            }
        }
    }

    fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<PeerEntry> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries[rng.gen_range(0..self.entries.len())])
    }

    fn random_not<R: Rng + ?Sized>(&self, not: NodeId, rng: &mut R) -> Option<PeerEntry> {
        if self.entries.is_empty() {
            return None;
        }
        for _ in 0..RANDOM_NOT_MAX_TRIES {
            let entry = self.entries[rng.gen_range(0..self.entries.len())];
            if entry.id != not {
                return Some(entry);
            }
        }
        None
    }

    /// Random-offset scan: the first peer that sits closer than the owner
    /// to some owned datum, paired with that datum's index.
    fn find_closer<R: Rng + ?Sized>(
        &self,
        owner_location: V,
        data: &[Option<Data>],
        indices: &[usize],
        rng: &mut R,
    ) -> Option<(PeerEntry, usize)> {
        if self.entries.is_empty() {
            return None;
        }
        let len = self.entries.len();
        let offset = rng.gen_range(0..len);
        let mut i = offset;
        loop {
            let peer = self.entries[i];
            for &di in indices {
                if let Some(d) = &data[di] {
                    if owner_location.great_circle_distance(d.location)
                        > peer.location.great_circle_distance(d.location)
                    {
                        return Some((peer, di));
                    }
                }
            }
            i = (i + 1) % len;
            if i == offset {
                return None;
            }
        }
    }

    fn iter(&self) -> impl Iterator<Item = &PeerEntry> {
        self.entries.iter()
    }

    /// Max-spread eviction: replace the peer whose distance sum to the
    /// others (excluding its distance to the candidate) is smallest and
    /// strictly below the candidate's own sum; reject if nobody improves
    /// the spread.
    fn add_max_spread(&mut self, entry: PeerEntry) -> bool {
        if self.refresh(entry.id, entry.location) {
            return true;
        }
        if self.entries.len() < self.capacity {
            self.push(entry);
            return true;
        }
        let n = self.entries.len();
        let mut dists = vec![0.0; n];
        let mut dist_to_candidate = vec![0.0; n];
        let mut candidate_sum = 0.0;
        for i in 0..n {
            let d = self.entries[i].location.great_circle_distance(entry.location);
            candidate_sum += d;
            dist_to_candidate[i] = d;
            for j in 0..i {
                let d = self.entries[i].location.great_circle_distance(self.entries[j].location);
                dists[i] += d;
                dists[j] += d;
            }
        }
        let mut evict: Option<usize> = None;
        for (i, &dist) in dists.iter().enumerate() {
            if dist < candidate_sum - dist_to_candidate[i]
                && evict.map_or(true, |e| dist < dists[e])
            {
                evict = Some(i);
            }
        }
        match evict {
            Some(i) => {
                self.replace(i, entry);
                true
            }
            None => false,
        }
    }

    /// Closest eviction: replace the peer farthest from the owner, but
    /// only if it is farther than the candidate.
    fn add_closest(&mut self, owner_location: V, entry: PeerEntry) -> bool {
        if self.refresh(entry.id, entry.location) {
            return true;
        }
        if self.entries.len() < self.capacity {
            self.push(entry);
            return true;
        }
        let candidate_dist = owner_location.great_circle_distance(entry.location);
        let mut farthest: Option<(usize, f64)> = None;
        for (i, peer) in self.entries.iter().enumerate() {
            let dist = owner_location.great_circle_distance(peer.location);
            if dist > candidate_dist && farthest.map_or(true, |(_, f)| dist > f) {
                farthest = Some((i, dist));
            }
        }
        match farthest {
            Some((i, _)) => {
                self.replace(i, entry);
                true
            }
            None => false,
        }
    }
}

/// A capacity-bounded peer list under one of the three retention
/// policies.
#[derive(Debug)]
pub struct PeerList {
    policy: Policy,
}

#[derive(Debug)]
enum Policy {
    MaxSpread(BasePeers),
    Closest(BasePeers),
    Hybrid { spread: BasePeers, closest: BasePeers },
}

impl PeerList {
    /// Max-spread policy with the given capacity.
    pub fn max_spread(capacity: usize) -> Self {
        Self { policy: Policy::MaxSpread(BasePeers::new(capacity)) }
    }

    /// Closest policy with the given capacity.
    pub fn closest(capacity: usize) -> Self {
        Self { policy: Policy::Closest(BasePeers::new(capacity)) }
    }

    /// Hybrid: offer to a max-spread sublist first, fall back to a
    /// closest sublist. The two sublists are otherwise independent.
    pub fn hybrid(spread_capacity: usize, closest_capacity: usize) -> Self {
        Self {
            policy: Policy::Hybrid {
                spread: BasePeers::new(spread_capacity),
                closest: BasePeers::new(closest_capacity),
            },
        }
    }

    /// Offer a peer; returns whether it was retained. Offering an already
    /// retained peer refreshes its cached location.
    pub fn add(&mut self, owner_location: V, id: NodeId, location: V) -> bool {
        let entry = PeerEntry { id, location };
        match &mut self.policy {
            Policy::MaxSpread(base) => base.add_max_spread(entry),
            Policy::Closest(base) => base.add_closest(owner_location, entry),
            Policy::Hybrid { spread, closest } => {
                spread.add_max_spread(entry)
                    || closest.add_closest(owner_location, entry)
            }
        }
    }

    pub fn remove(&mut self, id: NodeId) {
        match &mut self.policy {
            Policy::MaxSpread(base) | Policy::Closest(base) => base.remove(id),
            Policy::Hybrid { spread, closest } => {
                spread.remove(id);
                closest.remove(id);
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.policy {
            Policy::MaxSpread(base) | Policy::Closest(base) => base.len(),
            Policy::Hybrid { spread, closest } => spread.len() + closest.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        match &self.policy {
            Policy::MaxSpread(base) | Policy::Closest(base) => base.capacity,
            Policy::Hybrid { spread, closest } => spread.capacity + closest.capacity,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        match &self.policy {
            Policy::MaxSpread(base) | Policy::Closest(base) => base.contains(id),
            Policy::Hybrid { spread, closest } => {
                spread.contains(id) || closest.contains(id)
            }
        }
    }

    /// Cached peer locations, for visualization.
    pub fn locations(&self) -> Vec<V> {
        match &self.policy {
            Policy::MaxSpread(base) | Policy::Closest(base) => {
                base.iter().map(|p| p.location).collect()
            }
            Policy::Hybrid { spread, closest } => spread
                .iter()
                .chain(closest.iter())
                .map(|p| p.location)
                .collect(),
        }
    }

    /// A uniform-random retained peer. Hybrid lists pick the sublist by
    /// unbiased coin when both are non-empty.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<PeerEntry> {
        match &self.policy {
            Policy::MaxSpread(base) | Policy::Closest(base) => base.random(rng),
            Policy::Hybrid { spread, closest } => {
                if !spread.is_empty() && !closest.is_empty() {
                    if rng.gen_range(0..2) == 0 {
                        spread.random(rng)
                    } else {
                        closest.random(rng)
                    }
                } else if !spread.is_empty() {
                    spread.random(rng)
                } else {
                    closest.random(rng)
                }
            }
        }
    }

    /// A random peer other than `not`, giving up after a bounded number
    /// of draws.
    pub fn random_not<R: Rng + ?Sized>(&self, not: NodeId, rng: &mut R) -> Option<PeerEntry> {
        match &self.policy {
            Policy::MaxSpread(base) | Policy::Closest(base) => base.random_not(not, rng),
            Policy::Hybrid { spread, closest } => {
                if !spread.is_empty() && !closest.is_empty() {
                    if rng.gen_range(0..2) == 0 {
                        spread.random_not(not, rng)
                    } else {
                        closest.random_not(not, rng)
                    }
                } else if !spread.is_empty() {
                    spread.random_not(not, rng)
                } else {
                    closest.random_not(not, rng)
                }
            }
        }
    }

    /// Scan (from a random offset) for a peer closer than the owner to
    /// one of the owner's data. Returns the peer from the scan iteration
    /// that produced the match, with the matching data index.
    pub fn find_closer<R: Rng + ?Sized>(
        &self,
        owner_location: V,
        data: &[Option<Data>],
        indices: &[usize],
        rng: &mut R,
    ) -> Option<(PeerEntry, usize)> {
        match &self.policy {
            Policy::MaxSpread(base) | Policy::Closest(base) => {
                base.find_closer(owner_location, data, indices, rng)
            }
            Policy::Hybrid { spread, closest } => spread
                .find_closer(owner_location, data, indices, rng)
                .or_else(|| closest.find_closer(owner_location, data, indices, rng)),
        }
    }

    /// Visit every retained peer handle.
    pub fn for_each(&self, mut f: impl FnMut(NodeId)) {
        match &self.policy {
            Policy::MaxSpread(base) | Policy::Closest(base) => {
                for p in base.iter() {
                    f(p.id);
                }
            }
            Policy::Hybrid { spread, closest } => {
                for p in spread.iter().chain(closest.iter()) {
                    f(p.id);
                }
            }
        }
    }
}
