//! Settings for the engine itself, read from the environment, and the route
//! request options selected by the end user. The RouteRequest struct is what
//! the rest of this package works with; a UserRouteConfig is only ever
//! converted into one.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use geo::Point;
use serde::Deserialize;
use tracing::info;

use crate::common::error::ConfigError;
use crate::common::vehicle::{
    DriveCategory, EngineCategory, FuelType, TransmissionCategory,
    VehicleClass, VehicleSpec, Weather,
};
use crate::loading::providers::{DEFAULT_ELEVATION_BATCH, MapQuery};
use crate::routing::tables::CostTables;

pub const DEFAULT_CACHE_DIR: &str = "cache";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_CITY: &str = "Ankara";
pub const DEFAULT_COUNTRY: &str = "Turkey";

/// Process-wide settings for a running engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub cache_dir: PathBuf,
    pub graph_path: Option<PathBuf>,
    pub bind_addr: String,
    pub cost_tables_path: Option<PathBuf>,
    pub elevation_batch: usize,
    /// Area served by the engine. Map data is cached against this place
    pub city: String,
    pub country: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            graph_path: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cost_tables_path: None,
            elevation_batch: DEFAULT_ELEVATION_BATCH,
            city: DEFAULT_CITY.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
        }
    }
}

impl EngineSettings {
    /// Read settings from ECO_* environment variables, falling back to the
    /// defaults for anything which is not set
    pub fn from_env() -> Result<EngineSettings, ConfigError> {
        EngineSettings::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings using the provided lookup in place of the process
    /// environment. Empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<EngineSettings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());
        let defaults = EngineSettings::default();

        let elevation_batch = match get("ECO_ELEVATION_BATCH") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "ECO_ELEVATION_BATCH",
                        value: raw,
                    });
                }
            },
            None => defaults.elevation_batch,
        };

        let settings = EngineSettings {
            cache_dir: get("ECO_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            graph_path: get("ECO_GRAPH_PATH").map(PathBuf::from),
            bind_addr: get("ECO_BIND_ADDR").unwrap_or(defaults.bind_addr),
            cost_tables_path: get("ECO_COST_TABLES").map(PathBuf::from),
            elevation_batch,
            city: get("ECO_CITY").unwrap_or(defaults.city),
            country: get("ECO_COUNTRY").unwrap_or(defaults.country),
        };

        info!(?settings, "engine settings loaded");
        Ok(settings)
    }

    /// Query for the road network of the configured place
    pub fn map_query(&self) -> MapQuery {
        MapQuery::Place {
            city: self.city.clone(),
            country: self.country.clone(),
        }
    }

    /// Cost tables from the configured file, or the built-in defaults if no
    /// file has been configured
    pub fn load_cost_tables(&self) -> Result<CostTables, ConfigError> {
        match &self.cost_tables_path {
            Some(path) => CostTables::from_json_file(path).map_err(|source| {
                ConfigError::CostTables {
                    path: path.clone(),
                    source,
                }
            }),
            None => Ok(CostTables::default()),
        }
    }
}

fn parse_opt<T: FromStr<Err = ConfigError>>(
    raw: Option<&str>,
) -> Result<Option<T>, ConfigError> {
    raw.map(T::from_str).transpose()
}

/// Vehicle details exactly as they are received from the API
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct UserVehicle {
    pub vehicle_type: Option<String>,
    pub engine_type: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub drive_type: Option<String>,
    pub mass_kg: Option<f64>,
    pub drag_coefficient: Option<f64>,
    pub frontal_area_m2: Option<f64>,
    pub optimal_speed_kmh: Option<f64>,
    pub peak_efficiency: Option<f64>,
}

/// Stores the user's requested route exactly as it is received from the API
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UserRouteConfig {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    #[serde(default)]
    pub vehicle: UserVehicle,
    pub weather: Option<String>,
    pub hour: Option<u8>,
    pub temperature_c: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
}

/// A validated route request. It is not expected that this struct will be
/// built directly from user input; create a UserRouteConfig and convert it
/// with try_into
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub start: Point,
    pub end: Point,
    pub vehicle: VehicleSpec,
    /// Hour of the day to plan for; the current local hour if not set
    pub hour: Option<u8>,
}

fn to_point(
    lat: f64,
    lon: f64,
    lat_field: &'static str,
    lon_field: &'static str,
) -> Result<Point, ConfigError> {
    if !(lat.is_finite() && (-90.0..=90.0).contains(&lat)) {
        return Err(ConfigError::InvalidValue {
            field: lat_field,
            value: lat.to_string(),
        });
    }
    if !(lon.is_finite() && (-180.0..=180.0).contains(&lon)) {
        return Err(ConfigError::InvalidValue {
            field: lon_field,
            value: lon.to_string(),
        });
    }
    Ok(Point::new(lon, lat))
}

impl TryFrom<UserRouteConfig> for RouteRequest {
    type Error = ConfigError;

    fn try_from(config: UserRouteConfig) -> Result<RouteRequest, Self::Error> {
        let start = to_point(
            config.start_lat,
            config.start_lon,
            "start_lat",
            "start_lon",
        )?;
        let end =
            to_point(config.end_lat, config.end_lon, "end_lat", "end_lon")?;

        if let Some(hour) = config.hour {
            if hour > 23 {
                return Err(ConfigError::InvalidValue {
                    field: "hour",
                    value: hour.to_string(),
                });
            }
        }

        let user = config.vehicle;
        let vehicle = VehicleSpec {
            class: parse_opt::<VehicleClass>(user.vehicle_type.as_deref())?,
            mass_kg: user.mass_kg,
            drag_coefficient: user.drag_coefficient,
            frontal_area_m2: user.frontal_area_m2,
            optimal_speed_kmh: user.optimal_speed_kmh,
            peak_efficiency: user.peak_efficiency,
            engine: parse_opt::<EngineCategory>(user.engine_type.as_deref())?,
            fuel: parse_opt::<FuelType>(user.fuel_type.as_deref())?,
            transmission: parse_opt::<TransmissionCategory>(
                user.transmission.as_deref(),
            )?,
            drive: parse_opt::<DriveCategory>(user.drive_type.as_deref())?,
            weather: parse_opt::<Weather>(config.weather.as_deref())?,
            temperature_c: config.temperature_c,
            wind_speed_ms: config.wind_speed,
            wind_direction_deg: config.wind_direction,
        };

        Ok(RouteRequest {
            start,
            end,
            vehicle,
            hour: config.hour,
        })
    }
}
