//! Runs two searches over the same road graph: one minimising distance, and
//! one minimising modelled fuel consumption. Fuel costs may be negative on
//! descents, so the fuel search uses Bellman-Ford. If a negative cycle is
//! reachable from the origin there is no well-defined cheapest path, and the
//! search drops back to Dijkstra over fuel costs floored at a small positive
//! value.

use petgraph::algo::{astar, bellman_ford};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Graph};
use tracing::{debug, info, warn};

use crate::common::error::RoutingError;
use crate::common::graph_data::EdgeData;
use crate::common::vehicle::VehicleProfile;
use crate::loading::petgraph::RoadGraph;
use crate::routing::cost::{CostModel, TravelContext};
use crate::routing::structs::metrics::PathMetrics;
use crate::routing::structs::{RoutePath, RouteResult, SearchStrategy};

/// Copy of the road graph topology with the fuel cost of each edge as its
/// weight. Edge indexes match the road graph
type FuelGraph = Graph<(), f64, Directed, u32>;

/// Walk back from the goal through the Bellman-Ford predecessor list.
/// Returns None if the goal was never reached
fn path_from_predecessors(
    predecessors: &[Option<NodeIndex>],
    start: NodeIndex,
    goal: NodeIndex,
) -> Option<Vec<NodeIndex>> {
    let mut path = vec![goal];
    let mut cur = goal;

    while cur != start {
        // A path can never be longer than the number of nodes
        if path.len() > predecessors.len() {
            return None;
        }
        cur = (*predecessors.get(cur.index())?)?;
        path.push(cur);
    }

    path.reverse();
    Some(path)
}

/// For each consecutive pair of nodes in a path, pick the connecting edge
/// with the lowest weight. Ties go to the edge which was added first
fn select_edges<F>(
    graph: &RoadGraph,
    nodes: &[NodeIndex],
    weight: F,
) -> Vec<EdgeIndex>
where
    F: Fn(EdgeIndex, &EdgeData) -> f64,
{
    nodes
        .windows(2)
        .filter_map(|pair| {
            graph
                .inner()
                .edges_connecting(pair[0], pair[1])
                .map(|eref| (weight(eref.id(), eref.weight()), eref.id()))
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
                .map(|(_, eix)| eix)
        })
        .collect()
}

/// Produces both the shortest and the most fuel-efficient route between two
/// nodes
#[derive(Debug, Clone, Default)]
pub struct DualRouter {
    model: CostModel,
}

impl DualRouter {
    pub fn new(model: CostModel) -> DualRouter {
        DualRouter { model }
    }

    pub fn model(&self) -> &CostModel {
        &self.model
    }

    /// Route for the current local hour, in the weather stored against the
    /// profile
    pub fn route(
        &self,
        graph: &RoadGraph,
        origin: i64,
        destination: i64,
        profile: &VehicleProfile,
    ) -> Result<RouteResult, RoutingError> {
        let context = TravelContext::for_profile(profile);
        self.route_with_context(graph, origin, destination, profile, &context)
    }

    pub fn route_with_context(
        &self,
        graph: &RoadGraph,
        origin: i64,
        destination: i64,
        profile: &VehicleProfile,
        context: &TravelContext,
    ) -> Result<RouteResult, RoutingError> {
        let start = graph
            .index_of(origin)
            .ok_or(RoutingError::UnknownNode { id: origin })?;
        let goal = graph
            .index_of(destination)
            .ok_or(RoutingError::UnknownNode { id: destination })?;

        if start == goal {
            debug!(origin, "origin and destination coincide");
            return Ok(RouteResult::trivial(origin));
        }

        let no_path = RoutingError::NoPathFound {
            origin,
            destination,
        };

        // Skip both searches, and the O(V·E) fuel search in particular, when
        // the destination cannot be reached at all
        if !graph.reachable_from(origin).contains(&destination) {
            debug!(origin, destination, "destination not reachable");
            return Err(no_path);
        }

        let fuel_graph: FuelGraph = graph.inner().map(
            |_, _| (),
            |_, edata| self.model.edge_cost_fuel(edata, profile, context),
        );

        // Distance
        let (_, shortest_nodes) = astar(
            graph.inner(),
            start,
            |inx| inx == goal,
            |eref| self.model.edge_cost_distance(eref.weight()),
            |_| 0.0,
        )
        .ok_or(no_path.clone())?;

        let shortest_edges = select_edges(graph, &shortest_nodes, |_, edata| {
            self.model.edge_cost_distance(edata)
        });

        // Fuel
        let floor = self.model.tables().negative_cycle_floor;
        let (eco_nodes, eco_edges, strategy) =
            match bellman_ford(&fuel_graph, start) {
                Ok(paths) => {
                    let nodes =
                        path_from_predecessors(&paths.predecessors, start, goal)
                            .ok_or(no_path.clone())?;
                    let edges =
                        select_edges(graph, &nodes, |eix, _| fuel_graph[eix]);
                    (nodes, edges, SearchStrategy::BellmanFord)
                }
                Err(_) => {
                    warn!(
                        origin,
                        destination,
                        floor,
                        "negative fuel cycle reachable, using floored Dijkstra"
                    );
                    let (_, nodes) = astar(
                        &fuel_graph,
                        start,
                        |inx| inx == goal,
                        |eref| eref.weight().max(floor),
                        |_| 0.0,
                    )
                    .ok_or(no_path.clone())?;
                    let edges = select_edges(graph, &nodes, |eix, _| {
                        fuel_graph[eix].max(floor)
                    });
                    (nodes, edges, SearchStrategy::FlooredDijkstra)
                }
            };

        let shortest = self.build_path(
            graph,
            &fuel_graph,
            &shortest_nodes,
            &shortest_edges,
        );
        let eco = self.build_path(graph, &fuel_graph, &eco_nodes, &eco_edges);

        info!(
            origin,
            destination,
            ?strategy,
            shortest_m = shortest.metrics.distance_m,
            shortest_l = shortest.metrics.fuel_litres,
            eco_m = eco.metrics.distance_m,
            eco_l = eco.metrics.fuel_litres,
            "routes generated"
        );

        Ok(RouteResult {
            shortest,
            eco,
            strategy,
        })
    }

    /// Convert a path of node indexes into a RoutePath, with metrics summed
    /// over the selected edges
    fn build_path(
        &self,
        graph: &RoadGraph,
        fuel_graph: &FuelGraph,
        nodes: &[NodeIndex],
        edges: &[EdgeIndex],
    ) -> RoutePath {
        let mut metrics = PathMetrics::new();
        let mut keys = Vec::with_capacity(edges.len());

        for eix in edges {
            if let Some(edata) = graph.edge(*eix) {
                metrics.take_step(edata, fuel_graph[*eix]);
                keys.push(edata.edge_key());
            }
        }

        RoutePath {
            nodes: nodes.iter().map(|inx| graph.inner()[*inx].id).collect(),
            edges: keys,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::vehicle::{EngineCategory, VehicleSpec, Weather};
    use crate::loading::petgraph::tests::{raw_edge, raw_node};
    use crate::loading::structs::{MaxSpeed, OsmTag, RawEdge, RawNode};
    use crate::routing::tables::CostTables;
    use approx::assert_abs_diff_eq;

    fn get_test_context() -> TravelContext {
        TravelContext::new(12, Weather::Dry)
    }

    fn road(
        src: i64,
        dst: i64,
        length: f64,
        class: &str,
        limit: f64,
    ) -> RawEdge {
        RawEdge {
            highway: Some(OsmTag::One(class.to_string())),
            maxspeed: Some(MaxSpeed::Number(limit)),
            ..raw_edge(src, dst, length)
        }
    }

    fn heavy_profile() -> VehicleProfile {
        VehicleProfile::resolve(
            &VehicleSpec {
                mass_kg: Some(3000.0),
                drag_coefficient: Some(0.4),
                frontal_area_m2: Some(3.0),
                engine: Some(EngineCategory::Standard),
                ..Default::default()
            },
            &CostTables::default(),
        )
    }

    /// A -> B -> C, 100m then 200m, all flat
    fn get_flat_graph() -> RoadGraph {
        let nodes = vec![
            raw_node(1, 0.0, Some(0.0)),
            raw_node(2, 0.001, Some(0.0)),
            raw_node(3, 0.003, Some(0.0)),
        ];
        let edges = vec![raw_edge(1, 2, 100.0), raw_edge(2, 3, 200.0)];
        RoadGraph::from_parts(nodes, edges)
    }

    /// A short, steep residential street from A up to B, and a longer route
    /// via C on a gently climbing highway
    fn get_hill_graph() -> RoadGraph {
        let nodes: Vec<RawNode> = vec![
            raw_node(1, 0.0, Some(0.0)),
            raw_node(2, 0.01, Some(100.0)),
            raw_node(3, 0.02, Some(100.0)),
        ];
        let edges = vec![
            road(1, 2, 1000.0, "residential", 30.0),
            road(1, 3, 2000.0, "motorway", 100.0),
            road(3, 2, 200.0, "motorway", 100.0),
        ];
        RoadGraph::from_parts(nodes, edges)
    }

    mod test_route {
        use super::*;

        /// With a single route available, both searches agree
        #[test]
        fn test_single_path() {
            let graph = get_flat_graph();
            let router = DualRouter::default();
            let profile = VehicleProfile::default();

            let result = router
                .route_with_context(&graph, 1, 3, &profile, &get_test_context())
                .unwrap();

            assert_eq!(result.shortest.nodes, vec![1, 2, 3]);
            assert_eq!(result.eco.nodes, vec![1, 2, 3]);
            assert_eq!(result.shortest.metrics.distance_m, 300.0);
            assert_eq!(result.eco.metrics.distance_m, 300.0);
            assert!(result.eco.metrics.fuel_litres > 0.0);
            assert_eq!(result.strategy, SearchStrategy::BellmanFord);
            assert!(!result.is_trivial());

            let edges: Vec<(i64, i64)> = result
                .shortest
                .edges
                .iter()
                .map(|key| (key.src, key.dst))
                .collect();
            assert_eq!(edges, vec![(1, 2), (2, 3)]);
        }

        /// Path fuel is the sum of the fuel of each edge
        #[test]
        fn test_metrics_sum() {
            let graph = get_flat_graph();
            let router = DualRouter::default();
            let profile = VehicleProfile::default();
            let context = get_test_context();

            let result = router
                .route_with_context(&graph, 1, 3, &profile, &context)
                .unwrap();

            let target: f64 = graph
                .inner()
                .edge_weights()
                .map(|edata| router.model().edge_cost_fuel(edata, &profile, &context))
                .sum();

            assert_abs_diff_eq!(
                result.eco.metrics.fuel_litres,
                target,
                epsilon = 1e-15
            );
        }

        /// Repeated requests produce identical results
        #[test]
        fn test_deterministic() {
            let graph = get_hill_graph();
            let router = DualRouter::default();
            let profile = heavy_profile();

            let first = router
                .route_with_context(&graph, 1, 2, &profile, &get_test_context())
                .unwrap();
            let second = router
                .route_with_context(&graph, 1, 2, &profile, &get_test_context())
                .unwrap();

            assert_eq!(first, second);
        }

        /// A heavy vehicle saves fuel by taking the longer, gentler climb at
        /// a more efficient speed
        #[test]
        fn test_divergent() {
            let graph = get_hill_graph();
            let router = DualRouter::default();

            let result = router
                .route_with_context(&graph, 1, 2, &heavy_profile(), &get_test_context())
                .unwrap();

            assert_eq!(result.shortest.nodes, vec![1, 2]);
            assert_eq!(result.eco.nodes, vec![1, 3, 2]);
            assert_eq!(result.shortest.metrics.distance_m, 1000.0);
            assert_eq!(result.eco.metrics.distance_m, 2200.0);
            assert!(result.fuel_saved_litres() > 0.0);
            assert_eq!(result.extra_distance_m(), 1200.0);
        }

        /// The eco route never burns more than the shortest route
        #[test]
        fn test_eco_not_worse() {
            let graph = get_hill_graph();
            let router = DualRouter::default();

            for profile in [VehicleProfile::default(), heavy_profile()] {
                for hour in [3, 8, 12, 17] {
                    let context = TravelContext::new(hour, Weather::Dry);
                    let result = router
                        .route_with_context(&graph, 1, 2, &profile, &context)
                        .unwrap();

                    assert_eq!(result.strategy, SearchStrategy::BellmanFord);
                    assert!(
                        result.eco.metrics.fuel_litres
                            <= result.shortest.metrics.fuel_litres
                    );
                }
            }
        }

        /// The current-hour entry point runs the same searches
        #[test]
        fn test_route_current_hour() {
            let graph = get_flat_graph();
            let router = DualRouter::default();

            let result = router
                .route(&graph, 1, 3, &VehicleProfile::default())
                .unwrap();

            assert_eq!(result.eco.nodes, vec![1, 2, 3]);
        }
    }

    mod test_edge_cases {
        use super::*;

        #[test]
        fn test_same_origin_destination() {
            let graph = get_flat_graph();
            let router = DualRouter::default();

            let result = router
                .route_with_context(
                    &graph,
                    2,
                    2,
                    &VehicleProfile::default(),
                    &get_test_context(),
                )
                .unwrap();

            assert!(result.is_trivial());
            assert_eq!(result.shortest.nodes, vec![2]);
            assert_eq!(result.eco.nodes, vec![2]);
            assert_eq!(result.eco.metrics, PathMetrics::new());
        }

        /// Edges are directed, so C cannot be left
        #[test]
        fn test_no_path() {
            let graph = get_flat_graph();
            let router = DualRouter::default();

            let result = router.route_with_context(
                &graph,
                3,
                1,
                &VehicleProfile::default(),
                &get_test_context(),
            );

            assert_eq!(
                result,
                Err(RoutingError::NoPathFound {
                    origin: 3,
                    destination: 1
                })
            );
        }

        /// An unreachable destination is reported as such, even when a
        /// negative cycle sits next to the origin
        #[test]
        fn test_no_path_disconnected() {
            let nodes = vec![
                raw_node(1, 0.0, Some(0.0)),
                raw_node(2, 0.01, Some(100.0)),
                raw_node(4, 0.05, Some(0.0)),
            ];
            let edges = vec![
                road(1, 2, 1000.0, "motorway", 100.0),
                road(2, 1, 1000.0, "residential", 30.0),
            ];
            let graph = RoadGraph::from_parts(nodes, edges);
            let router = DualRouter::default();

            let result = router.route_with_context(
                &graph,
                1,
                4,
                &heavy_profile(),
                &get_test_context(),
            );

            assert_eq!(
                result,
                Err(RoutingError::NoPathFound {
                    origin: 1,
                    destination: 4
                })
            );
        }

        #[test]
        fn test_unknown_node() {
            let graph = get_flat_graph();
            let router = DualRouter::default();

            let result = router.route_with_context(
                &graph,
                1,
                99,
                &VehicleProfile::default(),
                &get_test_context(),
            );

            assert_eq!(result, Err(RoutingError::UnknownNode { id: 99 }));
        }

        /// Of two parallel edges, only the cheaper is ever used
        #[test]
        fn test_parallel_edges() {
            let nodes = vec![raw_node(1, 0.0, None), raw_node(2, 0.0001, None)];
            let edges = vec![raw_edge(1, 2, 10.0), raw_edge(1, 2, 5.0)];
            let graph = RoadGraph::from_parts(nodes, edges);
            let router = DualRouter::default();

            let result = router
                .route_with_context(
                    &graph,
                    1,
                    2,
                    &VehicleProfile::default(),
                    &get_test_context(),
                )
                .unwrap();

            assert_eq!(result.shortest.edges.len(), 1);
            assert_eq!(result.shortest.edges[0].key, 1);
            assert_eq!(result.eco.edges[0].key, 1);
            assert_eq!(result.shortest.metrics.distance_m, 5.0);
            assert_eq!(result.eco.metrics.distance_m, 5.0);
        }

        /// Each search picks its own cheapest parallel edge. A short crawl
        /// through a slow street wins on distance, a longer fast road wins
        /// on fuel
        #[test]
        fn test_parallel_edges_by_weight() {
            let nodes = vec![raw_node(1, 0.0, None), raw_node(2, 0.001, None)];
            let edges = vec![
                road(1, 2, 100.0, "residential", 10.0),
                road(1, 2, 150.0, "motorway", 100.0),
            ];
            let graph = RoadGraph::from_parts(nodes, edges);
            let router = DualRouter::default();
            let profile = VehicleProfile::default();
            let context = get_test_context();

            let result = router
                .route_with_context(&graph, 1, 2, &profile, &context)
                .unwrap();

            let costs: Vec<f64> = graph
                .inner()
                .edge_weights()
                .map(|edata| router.model().edge_cost_fuel(edata, &profile, &context))
                .collect();
            assert!(costs[1] < costs[0]);

            assert_eq!(result.shortest.edges[0].key, 0);
            assert_eq!(result.eco.edges[0].key, 1);
            assert_ne!(result.shortest.edges[0].key, result.eco.edges[0].key);
            assert_eq!(result.shortest.metrics.distance_m, 100.0);
            assert_eq!(result.eco.metrics.distance_m, 150.0);
            assert_abs_diff_eq!(
                result.eco.metrics.fuel_litres,
                costs[1],
                epsilon = 1e-15
            );
            assert!(result.fuel_saved_litres() > 0.0);
        }

        /// Negative edge weights are searched exactly
        #[test]
        fn test_downhill() {
            let nodes = vec![
                raw_node(1, 0.0, Some(100.0)),
                raw_node(2, 0.01, Some(0.0)),
            ];
            let edges = vec![raw_edge(1, 2, 1000.0)];
            let graph = RoadGraph::from_parts(nodes, edges);
            let router = DualRouter::default();

            let result = router
                .route_with_context(
                    &graph,
                    1,
                    2,
                    &heavy_profile(),
                    &get_test_context(),
                )
                .unwrap();

            assert_eq!(result.strategy, SearchStrategy::BellmanFord);
            assert!(result.eco.metrics.fuel_litres < 0.0);
        }

        /// Climbing fast and descending slowly recovers more fuel than it
        /// burns, which makes the loop between A and B a negative cycle
        #[test]
        fn test_negative_cycle() {
            let nodes = vec![
                raw_node(1, 0.0, Some(0.0)),
                raw_node(2, 0.01, Some(100.0)),
                raw_node(3, 0.02, Some(100.0)),
            ];
            let edges = vec![
                road(1, 2, 1000.0, "motorway", 100.0),
                road(2, 1, 1000.0, "residential", 30.0),
                road(2, 3, 100.0, "residential", 30.0),
            ];
            let graph = RoadGraph::from_parts(nodes, edges);
            let router = DualRouter::default();

            let result = router
                .route_with_context(
                    &graph,
                    1,
                    3,
                    &heavy_profile(),
                    &get_test_context(),
                )
                .unwrap();

            assert_eq!(result.strategy, SearchStrategy::FlooredDijkstra);
            assert_eq!(result.eco.nodes, vec![1, 2, 3]);
            assert_eq!(result.shortest.nodes, vec![1, 2, 3]);
        }
    }

    mod test_path_from_predecessors {
        use super::*;

        #[test]
        fn test_walk() {
            let preds = vec![
                None,
                Some(NodeIndex::new(0)),
                Some(NodeIndex::new(1)),
            ];

            let result =
                path_from_predecessors(&preds, NodeIndex::new(0), NodeIndex::new(2));

            assert_eq!(
                result,
                Some(vec![NodeIndex::new(0), NodeIndex::new(1), NodeIndex::new(2)])
            );
        }

        #[test]
        fn test_unreached() {
            let preds = vec![None, None];

            let result =
                path_from_predecessors(&preds, NodeIndex::new(0), NodeIndex::new(1));

            assert_eq!(result, None);
        }

        /// A corrupt predecessor list cannot cause an endless walk
        #[test]
        fn test_loop_guard() {
            let preds = vec![
                None,
                Some(NodeIndex::new(2)),
                Some(NodeIndex::new(1)),
            ];

            let result =
                path_from_predecessors(&preds, NodeIndex::new(0), NodeIndex::new(2));

            assert_eq!(result, None);
        }
    }
}
