//! Route-cost engine for comparing the shortest route between two points on a
//! road network with the route which is expected to burn the least fuel.
//!
//! The crate is split into three areas:
//! - `common` holds the data stored on the graph, vehicle profiles, errors and
//!   the configuration read from the environment or received from the API
//! - `loading` builds the road graph from map data, and wraps the external
//!   map/elevation/geocoding collaborators in a file-backed value cache
//! - `routing` contains the per-edge fuel model and the dual search which
//!   produces both routes

pub mod common;
pub mod loading;
pub mod routing;

pub use common::error::{ConfigError, GraphError, ProviderError, RoutingError};
pub use common::vehicle::{VehicleProfile, VehicleSpec};
pub use loading::cache::ValueCache;
pub use loading::petgraph::RoadGraph;
pub use routing::cost::{CostModel, TravelContext};
pub use routing::dual::DualRouter;
pub use routing::structs::{RoutePath, RouteResult, SearchStrategy};
pub use routing::tables::CostTables;
