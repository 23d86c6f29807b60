//! Containers for the raw node and edge data returned by a map provider.
//! Any attribute may be missing; defaults are applied here, when the raw
//! rows are converted into the weights stored on the graph.

use geo::{Bearing, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::common::graph_data::{
    DEFAULT_ELEVATION, DEFAULT_SPEED_LIMIT_KMH, EdgeData, NodeData, RoadClass,
};

const KMH_PER_MPH: f64 = 1.609344;

/// Node as provided by the map provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub elevation: Option<f64>,
}

impl Into<NodeData> for RawNode {
    fn into(self) -> NodeData {
        NodeData {
            id: self.id,
            lat: self.lat,
            lon: self.lon,
            elevation: self
                .elevation
                .filter(|ele| ele.is_finite())
                .unwrap_or(DEFAULT_ELEVATION),
        }
    }
}

/// OSM tags are sometimes collapsed into a list when several ways are merged
/// into a single edge. Only the first entry is used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OsmTag {
    One(String),
    Many(Vec<String>),
}

impl OsmTag {
    pub fn first(&self) -> Option<&str> {
        match self {
            OsmTag::One(tag) => Some(tag.as_str()),
            OsmTag::Many(tags) => tags.first().map(|tag| tag.as_str()),
        }
    }
}

/// Posted speed limit, either as a plain number or as an OSM maxspeed string
/// such as "50", "30 mph" or a list of either
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxSpeed {
    Number(f64),
    Text(String),
    Many(Vec<MaxSpeed>),
}

impl MaxSpeed {
    /// Convert to km/h, if a positive value can be read
    pub fn to_kmh(&self) -> Option<f64> {
        let kmh = match self {
            MaxSpeed::Number(val) => Some(*val),
            MaxSpeed::Text(text) => parse_maxspeed(text),
            MaxSpeed::Many(vals) => vals.first().and_then(|val| val.to_kmh()),
        };

        kmh.filter(|val| val.is_finite() && *val > 0.0)
    }
}

fn parse_maxspeed(text: &str) -> Option<f64> {
    let text = text.trim().to_ascii_lowercase();
    match text.strip_suffix("mph") {
        Some(mph) => mph.trim().parse::<f64>().ok().map(|v| v * KMH_PER_MPH),
        None => text
            .strip_suffix("km/h")
            .or_else(|| text.strip_suffix("kmh"))
            .unwrap_or(&text)
            .trim()
            .parse::<f64>()
            .ok(),
    }
}

/// Edge as provided by the map provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEdge {
    pub src: i64,
    pub dst: i64,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub highway: Option<OsmTag>,
    #[serde(default)]
    pub maxspeed: Option<MaxSpeed>,
}

impl RawEdge {
    /// Unpack the raw edge data into a format which can be loaded into the
    /// graph. The endpoints are needed to fill in a missing length and to
    /// determine the direction of travel. Slope is left at zero until
    /// elevations are applied
    pub fn prepare(self, src: &NodeData, dst: &NodeData, key: u32) -> EdgeData {
        let src_point = Point::new(src.lon, src.lat);
        let dst_point = Point::new(dst.lon, dst.lat);

        let length = match self.length {
            Some(len) if len.is_finite() && len >= 0.0 => len,
            _ => Haversine::distance(src_point, dst_point),
        };

        let road_class = self
            .highway
            .as_ref()
            .and_then(|tag| tag.first())
            .map(RoadClass::from_osm_tag)
            .unwrap_or_default();

        let speed_limit = self
            .maxspeed
            .as_ref()
            .and_then(|speed| speed.to_kmh())
            .unwrap_or(DEFAULT_SPEED_LIMIT_KMH);

        let bearing = if src_point == dst_point {
            0.0
        } else {
            Haversine::bearing(src_point, dst_point)
        };

        EdgeData {
            src: self.src,
            dst: self.dst,
            key,
            length,
            road_class,
            speed_limit,
            bearing,
            slope: 0.0,
        }
    }
}

/// Complete output of a map provider for a single query
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}
