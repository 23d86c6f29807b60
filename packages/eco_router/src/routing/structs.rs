pub mod metrics;

use serde::Serialize;

use crate::common::graph_data::EdgeKey;
use crate::routing::structs::metrics::PathMetrics;

/// Which algorithm produced the fuel-optimal path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Exact search over signed fuel weights
    BellmanFord,
    /// A negative cycle was reachable from the origin, so fuel weights were
    /// floored at a small positive value and Dijkstra was used instead
    FlooredDijkstra,
}

/// A single path through the road graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePath {
    /// IDs of every node visited, origin first
    pub nodes: Vec<i64>,
    /// The edge taken between each consecutive pair of nodes
    pub edges: Vec<EdgeKey>,
    pub metrics: PathMetrics,
}

impl RoutePath {
    fn single(node: i64) -> RoutePath {
        RoutePath {
            nodes: vec![node],
            edges: Vec::new(),
            metrics: PathMetrics::new(),
        }
    }
}

/// Both routes between an origin and a destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    pub shortest: RoutePath,
    pub eco: RoutePath,
    pub strategy: SearchStrategy,
}

impl RouteResult {
    /// Result for a request where the origin and destination coincide
    pub fn trivial(node: i64) -> RouteResult {
        RouteResult {
            shortest: RoutePath::single(node),
            eco: RoutePath::single(node),
            strategy: SearchStrategy::BellmanFord,
        }
    }

    pub fn is_trivial(&self) -> bool {
        self.shortest.edges.is_empty() && self.eco.edges.is_empty()
    }

    /// Fuel saved by taking the eco route instead of the shortest one
    pub fn fuel_saved_litres(&self) -> f64 {
        self.shortest.metrics.fuel_litres - self.eco.metrics.fuel_litres
    }

    /// Additional distance travelled by taking the eco route
    pub fn extra_distance_m(&self) -> f64 {
        self.eco.metrics.distance_m - self.shortest.metrics.distance_m
    }
}
