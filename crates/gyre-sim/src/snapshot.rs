//! Serializable world snapshots for external visualizers.
//!
//! A snapshot is taken under the read lock and can then be shipped
//! anywhere; the lock only needs to be held while copying. Positions
//! come with their geodesic-scaled stereographic projection so a flat
//! frontend can draw distance-true overlays without sphere math.

use gyre_geom::V;
use gyre_mesh::Mesh;
use serde::Serialize;

/// One node as a visualizer sees it.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: usize,
    pub location: V,
    /// Geodesic-scaled stereographic projection of `location`.
    pub projected: (f64, f64),
    pub peer_locations: Vec<V>,
    pub n_data: usize,
    pub current_bytes: usize,
    pub max_bytes: usize,
}

/// A consistent copy of everything a frame needs.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub iteration: u64,
    pub nodes: Vec<NodeSnapshot>,
    pub data_locations: Vec<V>,
}

pub fn snapshot(mesh: &Mesh, iteration: u64) -> WorldSnapshot {
    let nodes = mesh
        .live_nodes()
        .map(|(id, node)| NodeSnapshot {
            id: id.0,
            location: node.location,
            projected: node.location.project_gsd(),
            peer_locations: node.peer_locations(),
            n_data: node.data_locations(mesh.data()).len(),
            current_bytes: node.current_bytes(),
            max_bytes: node.max_bytes(),
        })
        .collect();
    let data_locations = mesh.data().iter().flatten().map(|d| d.location).collect();
    WorldSnapshot { iteration, nodes, data_locations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Factories, PeerPolicy, World};

    #[test]
    fn snapshot_copies_live_state() {
        let world = World::new(64, 8, 3, 5, Factories::small(), PeerPolicy::default());
        let snap = snapshot(world.mesh(), 17);
        assert_eq!(snap.iteration, 17);
        assert_eq!(snap.nodes.len(), 3);
        let held: usize = world.mesh().data().iter().flatten().count();
        assert_eq!(snap.data_locations.len(), held);
        for node in &snap.nodes {
            assert!((node.location.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let world = World::new(32, 4, 2, 6, Factories::small(), PeerPolicy::default());
        let snap = snapshot(world.mesh(), 0);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"iteration\":0"));
        assert!(json.contains("\"nodes\""));
    }
}
