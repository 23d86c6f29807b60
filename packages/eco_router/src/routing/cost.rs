//! Per-edge cost functions. The distance cost is simply the edge length; the
//! fuel cost is built up from a physical model of the vehicle:
//!
//! 1. the speed the vehicle is expected to travel at, given the road class,
//!    time of day and weather
//! 2. the forces acting on the vehicle at that speed (aerodynamic drag,
//!    rolling resistance and gravity)
//! 3. the work done against those forces over the length of the edge
//! 4. how efficiently the powertrain converts fuel into that work
//! 5. the volume of fuel containing the energy required
//!
//! Every step is exposed as a free function so that it can be checked in
//! isolation. Downhill edges can produce negative work, which is kept, so
//! fuel costs may be negative.

use serde::Serialize;

use crate::common::graph_data::{EdgeData, RoadClass};
use crate::common::vehicle::{FuelType, VehicleProfile, Weather};
use crate::routing::tables::CostTables;

const KMH_PER_MS: f64 = 3.6;

/// Conditions which vary between requests for the same vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TravelContext {
    /// Hour of the day, 0-23
    pub hour: u8,
    pub weather: Weather,
}

impl TravelContext {
    pub fn new(hour: u8, weather: Weather) -> TravelContext {
        TravelContext { hour, weather }
    }

    /// Plan for the current local hour, in the weather stored against the
    /// provided profile
    pub fn for_profile(profile: &VehicleProfile) -> TravelContext {
        let hour = jiff::Zoned::now().hour().clamp(0, 23) as u8;
        TravelContext::new(hour, profile.environment.weather)
    }

    /// Plan for a specific hour, or the current hour if none is provided
    pub fn at_hour(
        hour: Option<u8>,
        profile: &VehicleProfile,
    ) -> TravelContext {
        match hour {
            Some(hour) => TravelContext::new(hour, profile.environment.weather),
            None => TravelContext::for_profile(profile),
        }
    }
}

/// Speed (km/h) under the linear traffic-flow model, before weather is
/// taken into account. Speed falls linearly from the free-flow speed to zero
/// as density approaches the jam density of the road class. Density is
/// higher during peak windows
pub fn traffic_speed_kmh(
    tables: &CostTables,
    road_class: RoadClass,
    speed_limit: f64,
    hour: u8,
) -> f64 {
    let base = speed_limit.min(tables.free_flow_kmh.get(road_class));
    let jam_density = tables.jam_density.get(road_class);
    if jam_density <= 0.0 {
        return base;
    }

    let density = if tables.is_peak_hour(hour) {
        tables.peak_density
    } else {
        tables.offpeak_density
    };

    base * (1.0 - (density / jam_density).clamp(0.0, 1.0))
}

/// Multiplier on speed for the provided weather, scaled by how sensitive
/// the road class is to it. Always within [0, 1]
pub fn weather_speed_multiplier(
    tables: &CostTables,
    road_class: RoadClass,
    weather: Weather,
) -> f64 {
    let base = tables.weather_speed.get(weather);
    let sensitivity = tables.weather_sensitivity.get(road_class);
    (1.0 - (1.0 - base) * sensitivity).clamp(0.0, 1.0)
}

/// Expected speed (km/h) along an edge. Never below the minimum crawl speed
/// unless the posted limit is lower still, and never above the posted limit
pub fn effective_speed_kmh(
    tables: &CostTables,
    edge: &EdgeData,
    context: &TravelContext,
) -> f64 {
    let traffic = traffic_speed_kmh(
        tables,
        edge.road_class,
        edge.speed_limit,
        context.hour,
    );
    let weather =
        weather_speed_multiplier(tables, edge.road_class, context.weather);

    (traffic * weather)
        .max(tables.min_speed_kmh)
        .min(edge.speed_limit)
}

/// Share of rolling resistance lost to a slippery surface, within [0, 0.95]
pub fn friction_reduction(
    tables: &CostTables,
    road_class: RoadClass,
    weather: Weather,
) -> f64 {
    let reduction = tables.weather_friction_reduction.get(weather);
    let sensitivity = tables.weather_sensitivity.get(road_class);
    (reduction * sensitivity).clamp(0.0, 0.95)
}

/// Aerodynamic drag (N) at the provided speed (m/s), allowing for wind.
/// Wind direction is the bearing the wind blows from, so a wind from dead
/// ahead adds its full speed to the airflow
pub fn aerodynamic_drag(
    tables: &CostTables,
    profile: &VehicleProfile,
    speed_ms: f64,
    bearing_deg: f64,
) -> f64 {
    let env = &profile.environment;
    let relative = (env.wind_direction - bearing_deg).to_radians();
    let airflow = speed_ms + env.wind_speed * relative.cos();

    0.5 * tables.air_density
        * airflow
        * airflow
        * profile.drag_coefficient
        * profile.frontal_area_m2
}

/// Rolling resistance (N) on the provided road class
pub fn rolling_resistance(
    tables: &CostTables,
    profile: &VehicleProfile,
    road_class: RoadClass,
    weather: Weather,
) -> f64 {
    let coefficient = tables.rolling_coefficient.get(road_class);
    let reduction = friction_reduction(tables, road_class, weather);
    coefficient * (1.0 - reduction) * profile.mass_kg * tables.gravity
}

/// Component of gravity (N) acting along an edge. Negative when travelling
/// downhill
pub fn gravity_force(tables: &CostTables, mass_kg: f64, slope: f64) -> f64 {
    mass_kg * tables.gravity * slope.atan().sin()
}

/// Overall efficiency of the vehicle at the provided speed (km/h), including
/// drivetrain losses, within [min_efficiency, 1]
pub fn efficiency(
    tables: &CostTables,
    profile: &VehicleProfile,
    speed_kmh: f64,
) -> f64 {
    let engine = profile
        .powertrain
        .efficiency(speed_kmh, profile.environment.temperature_c);
    (engine * profile.drivetrain_factor).clamp(tables.min_efficiency, 1.0)
}

/// Volume of fuel (L) containing the provided energy (J)
pub fn litres_for_energy(
    tables: &CostTables,
    fuel: FuelType,
    energy_j: f64,
) -> f64 {
    energy_j / tables.energy_density.get(fuel)
}

/// Edge weight functions for both searches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostModel {
    tables: CostTables,
}

impl CostModel {
    pub fn new(tables: CostTables) -> CostModel {
        CostModel { tables }
    }

    pub fn tables(&self) -> &CostTables {
        &self.tables
    }

    /// Weight for the shortest-distance search, which is the edge length
    pub fn edge_cost_distance(&self, edge: &EdgeData) -> f64 {
        edge.length
    }

    /// Litres of fuel needed to traverse the provided edge
    pub fn edge_cost_fuel(
        &self,
        edge: &EdgeData,
        profile: &VehicleProfile,
        context: &TravelContext,
    ) -> f64 {
        let tables = &self.tables;

        let speed_kmh = effective_speed_kmh(tables, edge, context);
        let speed_ms = speed_kmh / KMH_PER_MS;

        let force = aerodynamic_drag(tables, profile, speed_ms, edge.bearing)
            + rolling_resistance(
                tables,
                profile,
                edge.road_class,
                context.weather,
            )
            + gravity_force(tables, profile.mass_kg, edge.slope);

        let work = force * edge.length;
        let energy = work / efficiency(tables, profile, speed_kmh);

        litres_for_energy(tables, profile.powertrain.fuel(), energy)
    }
}
