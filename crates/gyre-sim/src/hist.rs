//! Hop and disjointedness histograms.
//!
//! For every live datum, a breadth-first relaxation over peer links
//! measures how many hops separate each node from a copy of the datum:
//! owners sit at zero, and a node is `h + 1` hops away when some peer of
//! its is `h` hops away. Nodes never reached are disjoint from the datum.
//! The two histograms aggregate these per `(datum, node)` pair and per
//! datum respectively, and are the simulator's main reachability signal.

use std::collections::HashMap;

use gyre_mesh::Mesh;

/// Iterations interesting enough to pause for the expensive hop and
/// disjointedness computation.
pub fn is_hop_hist_iter(i: u64) -> bool {
    i == 0 || i == 1 || i == 50 || i == 5001 || i == 5050 || i % 1000 == 0
}

/// Histogram pair for one iteration, indexed by hop count and by
/// disjoint-node count. Both are sized to the node pool, the natural
/// upper bound for either quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopHistograms {
    pub hops: Vec<usize>,
    pub disjoint: Vec<usize>,
}

pub fn hop_histograms(mesh: &Mesh) -> HopHistograms {
    let n_nodes = mesh.nodes().len();
    // hops[data index][node index] = hop distance to a copy.
    let mut hops: HashMap<usize, HashMap<usize, usize>> = HashMap::new();
    for (id, node) in mesh.live_nodes() {
        for &di in node.data_indices() {
            if mesh.data()[di].is_some() {
                hops.entry(di).or_default().insert(id.0, 0);
            }
        }
    }
    // Relax until quiescent. No node can sit more than the pool size in
    // hops from anything, so the round count is capped there.
    for _ in 0..n_nodes {
        let mut still_hopping = false;
        for node_map in hops.values_mut() {
            for (id, node) in mesh.live_nodes() {
                if node_map.contains_key(&id.0) {
                    continue;
                }
                let mut via: Option<usize> = None;
                node.peers().for_each(|peer| {
                    if via.is_none() {
                        if let Some(&h) = node_map.get(&peer.0) {
                            via = Some(h);
                        }
                    }
                });
                if let Some(h) = via {
                    node_map.insert(id.0, h + 1);
                    still_hopping = true;
                }
            }
        }
        if !still_hopping {
            break;
        }
    }
    let live: Vec<usize> = mesh.live_nodes().map(|(id, _)| id.0).collect();
    let mut hops_hist = vec![0; n_nodes];
    let mut disjoint_hist = vec![0; n_nodes];
    for node_map in hops.values() {
        for &h in node_map.values() {
            hops_hist[h] += 1;
        }
        let disjoint = live.iter().filter(|id| !node_map.contains_key(id)).count();
        disjoint_hist[disjoint] += 1;
    }
    HopHistograms { hops: hops_hist, disjoint: disjoint_hist }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_mesh::{Data, Mesh, Node, PeerList};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn interesting_iterations() {
        for i in [0, 1, 50, 1000, 2000, 5000, 5001, 5050] {
            assert!(is_hop_hist_iter(i), "{i} should be interesting");
        }
        for i in [2, 49, 51, 999, 1001, 5002, 5049, 5051] {
            assert!(!is_hop_hist_iter(i), "{i} should not be interesting");
        }
    }

    /// A three-node chain around one datum: the owner at zero hops, its
    /// peer at one, the peer's peer at two, and an isolated fourth node
    /// disjoint.
    #[test]
    fn chain_topology_hops() {
        let mut mesh = Mesh::new(4, 4);
        let mut rng = StdRng::seed_from_u64(1);
        let indices = mesh.reserve_slots(1);
        mesh.put_data(indices[0], Data::from_payload(b"the datum"));
        let node = Node::new(mesh.data(), indices, 1 << 20, 0.5, PeerList::max_spread(4), &mut rng)
            .unwrap();
        let owner = mesh.insert_node(node).unwrap();
        let spawn_empty = |mesh: &mut Mesh, rng: &mut StdRng| {
            let node = Node::new(mesh.data(), vec![], 1 << 20, 0.5, PeerList::max_spread(4), rng)
                .unwrap();
            mesh.insert_node(node).unwrap()
        };
        let mid = spawn_empty(&mut mesh, &mut rng);
        let far = spawn_empty(&mut mesh, &mut rng);
        let _lonely = spawn_empty(&mut mesh, &mut rng);

        // mid knows the owner; far knows mid; lonely knows nobody.
        assert!(mesh.offer_peer(mid, owner));
        assert!(mesh.offer_peer(far, mid));

        let hist = hop_histograms(&mesh);
        // One (datum, node) pair at each hop count 0..2.
        assert_eq!(hist.hops[0], 1);
        assert_eq!(hist.hops[1], 1);
        assert_eq!(hist.hops[2], 1);
        assert_eq!(hist.hops[3], 0);
        // The single datum has exactly one disjoint node.
        assert_eq!(hist.disjoint[1], 1);
        assert_eq!(hist.disjoint.iter().sum::<usize>(), 1);
    }

    #[test]
    fn empty_mesh_yields_empty_histograms() {
        let mesh = Mesh::new(4, 4);
        let hist = hop_histograms(&mesh);
        assert!(hist.hops.iter().all(|&c| c == 0));
        assert!(hist.disjoint.iter().all(|&c| c == 0));
    }
}
