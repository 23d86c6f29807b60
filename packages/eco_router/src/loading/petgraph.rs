//! The road graph: a petgraph graph of NodeData/EdgeData, plus a lookup from
//! the map provider's node IDs to petgraph node indexes. Parallel edges are
//! kept (petgraph's add_edge rather than update_edge), as divided roads and
//! merged ways are common in real map data.

use geo::{Distance, Haversine, Point};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::{EdgeRef, IntoNodeReferences};
use petgraph::{Directed, Graph};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crate::common::error::GraphError;
use crate::common::graph_data::{DEFAULT_ELEVATION, EdgeData, NodeData};
use crate::loading::structs::{MapData, RawEdge, RawNode};

pub type RoadPetgraph = Graph<NodeData, EdgeData, Directed, u32>;

/// Slope of an edge, given the elevation at either end. Zero-length edges
/// are treated as flat
pub fn slope_between(src_elevation: f64, dst_elevation: f64, length: f64) -> f64 {
    if length > 0.0 {
        (dst_elevation - src_elevation) / length
    } else {
        0.0
    }
}

/// In-memory street network
#[derive(Debug, Clone)]
pub struct RoadGraph {
    graph: RoadPetgraph,
    node_id_inx_map: FxHashMap<i64, NodeIndex>,
    elevations_assigned: bool,
}

impl RoadGraph {
    /// Build a graph from the output of a map provider
    pub fn new(map: MapData) -> RoadGraph {
        RoadGraph::from_parts(map.nodes, map.edges)
    }

    /// Based on the node and edge data supplied by the map provider, build
    /// the graph. Nodes are added in the order provided, which keeps node
    /// indexes (and by extension search results) stable between runs. Edges
    /// which reference unknown nodes are dropped.
    pub fn from_parts(nodes: Vec<RawNode>, edges: Vec<RawEdge>) -> RoadGraph {
        let mut graph = RoadPetgraph::new();
        let mut node_id_inx_map = FxHashMap::<i64, NodeIndex>::default();

        let mut duplicates: usize = 0;
        for node in nodes {
            if node_id_inx_map.contains_key(&node.id) {
                duplicates += 1;
                continue;
            }
            let id = node.id;
            let node_inx = graph.add_node(node.into());
            node_id_inx_map.insert(id, node_inx);
        }

        let mut dangling: usize = 0;
        for edge in edges {
            let (src_inx, dst_inx) = match (
                node_id_inx_map.get(&edge.src),
                node_id_inx_map.get(&edge.dst),
            ) {
                (Some(src_inx), Some(dst_inx)) => (*src_inx, *dst_inx),
                _ => {
                    dangling += 1;
                    continue;
                }
            };

            // Parallel edges are told apart by the order they arrive in
            let key = graph.edges_connecting(src_inx, dst_inx).count() as u32;
            let edge_data = edge.prepare(&graph[src_inx], &graph[dst_inx], key);

            graph.add_edge(src_inx, dst_inx, edge_data);
        }

        if duplicates > 0 {
            warn!(duplicates, "ignored nodes with duplicate IDs");
        }
        if dangling > 0 {
            warn!(dangling, "ignored edges referencing unknown nodes");
        }

        let mut road_graph = RoadGraph {
            graph,
            node_id_inx_map,
            elevations_assigned: false,
        };
        road_graph.compute_slopes();

        info!(
            nodes = road_graph.node_count(),
            edges = road_graph.edge_count(),
            "road graph created"
        );

        road_graph
    }

    /// Direct access to the underlying petgraph graph, used by the search
    /// algorithms
    pub fn inner(&self) -> &RoadPetgraph {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn index_of(&self, id: i64) -> Option<NodeIndex> {
        self.node_id_inx_map.get(&id).copied()
    }

    pub fn node(&self, id: i64) -> Option<&NodeData> {
        self.index_of(id)
            .and_then(|inx| self.graph.node_weight(inx))
    }

    pub fn edge(&self, inx: EdgeIndex) -> Option<&EdgeData> {
        self.graph.edge_weight(inx)
    }

    /// Every edge leaving the provided node, paired with the ID of the node
    /// it leads to. Edges are returned in the order they were added to the
    /// graph. Unknown nodes have no neighbours
    pub fn neighbors(&self, id: i64) -> Vec<(&EdgeData, i64)> {
        let Some(inx) = self.index_of(id) else {
            return Vec::new();
        };

        let mut erefs: Vec<_> = self.graph.edges(inx).collect();
        erefs.sort_by_key(|eref| eref.id());

        erefs
            .into_iter()
            .map(|eref| (eref.weight(), self.graph[eref.target()].id))
            .collect()
    }

    /// Apply elevation data to every node in the graph, then refresh the
    /// slope of every edge. Nodes which are not present in the mapping are
    /// placed at reference level. This may only be done once per graph.
    pub fn assign_elevations(
        &mut self,
        elevations: &FxHashMap<i64, f64>,
    ) -> Result<(), GraphError> {
        if self.elevations_assigned {
            return Err(GraphError::ElevationsAlreadyAssigned);
        }

        let mut missing: usize = 0;
        for node in self.graph.node_weights_mut() {
            node.elevation = match elevations.get(&node.id) {
                Some(ele) if ele.is_finite() => *ele,
                _ => {
                    missing += 1;
                    DEFAULT_ELEVATION
                }
            };
        }

        if missing > 0 {
            debug!(missing, "nodes without elevation set to reference level");
        }

        self.elevations_assigned = true;
        self.compute_slopes();

        Ok(())
    }

    pub fn elevations_assigned(&self) -> bool {
        self.elevations_assigned
    }

    /// Recalculate the slope of every edge based on the current elevation of
    /// its endpoints
    pub fn compute_slopes(&mut self) {
        for eix in self.graph.edge_indices() {
            let Some((src, dst)) = self.graph.edge_endpoints(eix) else {
                continue;
            };
            let src_ele = self.graph[src].elevation;
            let dst_ele = self.graph[dst].elevation;

            let edge = &mut self.graph[eix];
            edge.slope = slope_between(src_ele, dst_ele, edge.length);
        }
    }

    /// Determine the node closest to the provided point. Ties go to the node
    /// which was added first. Returns None for an empty graph
    pub fn nearest_node(&self, lat: f64, lon: f64) -> Option<i64> {
        let target = Point::new(lon, lat);

        let mut smallest_dist = f64::MAX;
        let mut closest: Option<i64> = None;

        for (_, node) in self.graph.node_references() {
            let dist = Haversine::distance(target, Point::new(node.lon, node.lat));
            if dist < smallest_dist {
                smallest_dist = dist;
                closest = Some(node.id);
            }
        }

        closest
    }

    /// ID, latitude and longitude of every node, in graph order. This is the
    /// input expected by the elevation provider
    pub fn node_coords(&self) -> Vec<(i64, f64, f64)> {
        self.graph
            .node_weights()
            .map(|node| (node.id, node.lat, node.lon))
            .collect()
    }

    /// Latitude and longitude of each node in a path. Unknown nodes are
    /// skipped
    pub fn coords_for(&self, path: &[i64]) -> Vec<(f64, f64)> {
        path.iter()
            .filter_map(|id| self.node(*id))
            .map(|node| (node.lat, node.lon))
            .collect()
    }

    /// IDs of every node which can be reached from the provided node
    pub fn reachable_from(&self, id: i64) -> FxHashSet<i64> {
        let mut reachable = FxHashSet::<i64>::default();
        let Some(start) = self.index_of(id) else {
            return reachable;
        };

        let mut dfs = petgraph::visit::Dfs::new(&self.graph, start);
        while let Some(inx) = dfs.next(&self.graph) {
            reachable.insert(self.graph[inx].id);
        }

        reachable
    }
}
