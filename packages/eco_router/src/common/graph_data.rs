//! Sets the data which will be stored as weights in the petgraph graph. All
//! defaults for missing map attributes are applied before these structs are
//! created, so nothing downstream needs to deal with optional values.

use serde::{Deserialize, Serialize};

/// Speed limit (km/h) assumed for any edge without a usable maxspeed tag
pub const DEFAULT_SPEED_LIMIT_KMH: f64 = 50.0;

/// Elevation (m) assumed for any node without elevation data
pub const DEFAULT_ELEVATION: f64 = 0.0;

/// Broad classes of road understood by the cost model. Every lookup table in
/// the cost model is keyed by one of these.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RoadClass {
    Highway,
    #[default]
    Primary,
    Secondary,
    Residential,
    Unpaved,
}

impl RoadClass {
    /// Map an OSM highway tag onto a road class. Link roads share the class
    /// of the road they connect to, unrecognised tags are treated as Primary
    pub fn from_osm_tag(tag: &str) -> RoadClass {
        let tag = tag.trim().to_ascii_lowercase();
        let base = tag.strip_suffix("_link").unwrap_or(&tag);

        match base {
            "motorway" | "trunk" | "highway" => RoadClass::Highway,
            "primary" => RoadClass::Primary,
            "secondary" | "tertiary" => RoadClass::Secondary,
            "residential" | "living_street" | "unclassified" | "service" => {
                RoadClass::Residential
            }
            "track" | "path" | "unpaved" => RoadClass::Unpaved,
            _ => RoadClass::Primary,
        }
    }
}

/// Node weight for the road graph
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeData {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
}

/// Identifies a single directed edge. `key` separates parallel edges which
/// share the same ordered pair of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EdgeKey {
    pub src: i64,
    pub dst: i64,
    pub key: u32,
}

/// Edge weight for the road graph. `slope` is derived from the elevation of
/// the endpoints and is refreshed whenever node elevations change.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct EdgeData {
    pub src: i64,
    pub dst: i64,
    pub key: u32,
    /// Metres, never negative
    pub length: f64,
    pub road_class: RoadClass,
    /// Posted limit in km/h
    pub speed_limit: f64,
    /// Degrees clockwise from north, from src towards dst
    pub bearing: f64,
    pub slope: f64,
}

impl EdgeData {
    pub fn edge_key(&self) -> EdgeKey {
        EdgeKey {
            src: self.src,
            dst: self.dst,
            key: self.key,
        }
    }
}
