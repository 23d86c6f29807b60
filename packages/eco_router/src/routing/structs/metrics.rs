//! Defines the struct which contains high level information about a path
//! (i.e. total distance, total fuel)

use serde::Serialize;

use crate::common::graph_data::EdgeData;

/// Totals accumulated over every edge in a path
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct PathMetrics {
    pub distance_m: f64,
    /// Litres of fuel (or units of charge for electric vehicles). Negative
    /// if the path recovers more energy than it spends
    pub fuel_litres: f64,
}

impl PathMetrics {
    pub fn new() -> PathMetrics {
        PathMetrics::default()
    }

    /// Update the metrics to reflect their state after traversing the
    /// provided edge, which is expected to consume the provided fuel
    pub fn take_step(&mut self, edata: &EdgeData, fuel_litres: f64) {
        self.distance_m += edata.length;
        self.fuel_litres += fuel_litres;
    }
}
