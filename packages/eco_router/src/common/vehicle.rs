//! Vehicle and environment profiles. A VehicleSpec holds whatever the caller
//! knows about their vehicle (every field is optional), and is resolved once
//! into a VehicleProfile with all defaults applied. The engine category is
//! resolved at the same time into a Powertrain, which carries only the
//! efficiency parameters relevant to that kind of engine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::error::ConfigError;
use crate::routing::tables::{CostTables, EfficiencyCurve};

/// Road surface conditions, affecting both speed and rolling resistance
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    #[default]
    Dry,
    Wet,
    Snow,
    Ice,
}

impl FromStr for Weather {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Weather, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "dry" | "clear" => Ok(Weather::Dry),
            "wet" | "rain" => Ok(Weather::Wet),
            "snow" => Ok(Weather::Snow),
            "ice" => Ok(Weather::Ice),
            _ => Err(invalid("weather", input)),
        }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EngineCategory {
    #[default]
    Standard,
    Diesel,
    Turbo,
    Hybrid,
    Electric,
}

impl FromStr for EngineCategory {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<EngineCategory, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "standard" | "petrol" | "gasoline" => Ok(EngineCategory::Standard),
            "diesel" => Ok(EngineCategory::Diesel),
            "turbo" => Ok(EngineCategory::Turbo),
            "hybrid" => Ok(EngineCategory::Hybrid),
            "electric" | "ev" => Ok(EngineCategory::Electric),
            _ => Err(invalid("engine_type", input)),
        }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    #[default]
    Petrol,
    Diesel,
    Hybrid,
    Electric,
}

impl FromStr for FuelType {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<FuelType, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "petrol" | "gasoline" => Ok(FuelType::Petrol),
            "diesel" => Ok(FuelType::Diesel),
            "hybrid" => Ok(FuelType::Hybrid),
            "electric" => Ok(FuelType::Electric),
            _ => Err(invalid("fuel_type", input)),
        }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionCategory {
    #[default]
    Manual,
    Automatic,
    Cvt,
}

impl FromStr for TransmissionCategory {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<TransmissionCategory, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(TransmissionCategory::Manual),
            "automatic" | "auto" => Ok(TransmissionCategory::Automatic),
            "cvt" => Ok(TransmissionCategory::Cvt),
            _ => Err(invalid("transmission", input)),
        }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DriveCategory {
    #[default]
    Fwd,
    Rwd,
    Awd,
}

impl FromStr for DriveCategory {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<DriveCategory, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "fwd" | "front" => Ok(DriveCategory::Fwd),
            "rwd" | "rear" => Ok(DriveCategory::Rwd),
            "awd" | "4wd" | "all" => Ok(DriveCategory::Awd),
            _ => Err(invalid("drive_type", input)),
        }
    }
}

/// Body presets, supplying mass and aerodynamic defaults for a rough class
/// of vehicle
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Small,
    #[default]
    Medium,
    Large,
    Suv,
}

impl FromStr for VehicleClass {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<VehicleClass, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(VehicleClass::Small),
            "medium" => Ok(VehicleClass::Medium),
            "large" => Ok(VehicleClass::Large),
            "suv" => Ok(VehicleClass::Suv),
            _ => Err(invalid("vehicle_type", input)),
        }
    }
}

/// Mass (kg), drag coefficient and frontal area (m2) for a body preset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPreset {
    pub mass_kg: f64,
    pub drag_coefficient: f64,
    pub frontal_area_m2: f64,
}

impl VehicleClass {
    pub fn body(&self) -> BodyPreset {
        match self {
            VehicleClass::Small => BodyPreset {
                mass_kg: 1100.0,
                drag_coefficient: 0.30,
                frontal_area_m2: 2.0,
            },
            VehicleClass::Medium => BodyPreset {
                mass_kg: 1500.0,
                drag_coefficient: 0.30,
                frontal_area_m2: 2.2,
            },
            VehicleClass::Large => BodyPreset {
                mass_kg: 1900.0,
                drag_coefficient: 0.32,
                frontal_area_m2: 2.4,
            },
            VehicleClass::Suv => BodyPreset {
                mass_kg: 2200.0,
                drag_coefficient: 0.38,
                frontal_area_m2: 2.8,
            },
        }
    }
}

fn invalid(field: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        value: value.to_string(),
    }
}

/// Everything a caller may know about their vehicle and the conditions it is
/// travelling in. Nothing here is required.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSpec {
    pub class: Option<VehicleClass>,
    pub mass_kg: Option<f64>,
    pub drag_coefficient: Option<f64>,
    pub frontal_area_m2: Option<f64>,
    pub optimal_speed_kmh: Option<f64>,
    pub peak_efficiency: Option<f64>,
    pub engine: Option<EngineCategory>,
    pub fuel: Option<FuelType>,
    pub transmission: Option<TransmissionCategory>,
    pub drive: Option<DriveCategory>,
    pub weather: Option<Weather>,
    pub temperature_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
}

/// Ambient conditions stored alongside the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Environment {
    pub weather: Weather,
    pub temperature_c: f64,
    /// m/s
    pub wind_speed: f64,
    /// Degrees clockwise from north which the wind is blowing from
    pub wind_direction: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            weather: Weather::Dry,
            temperature_c: 20.0,
            wind_speed: 0.0,
            wind_direction: 0.0,
        }
    }
}

/// Engine efficiency behaviour, resolved once from the engine category
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Powertrain {
    Combustion {
        fuel: FuelType,
        curve: EfficiencyCurve,
    },
    Hybrid {
        curve: EfficiencyCurve,
        low_speed_bonus: f64,
        low_speed_threshold_kmh: f64,
    },
    Electric {
        curve: EfficiencyCurve,
        comfort_min_c: f64,
        comfort_max_c: f64,
        cold_penalty: f64,
        hot_penalty: f64,
    },
}

impl Powertrain {
    /// Select and tune the efficiency curve for the requested engine. Diesel
    /// and turbo bonuses stack for a turbo with diesel fuel
    pub fn resolve(
        engine: EngineCategory,
        fuel: Option<FuelType>,
        tables: &CostTables,
    ) -> Powertrain {
        match (engine, fuel) {
            (EngineCategory::Electric, _) | (_, Some(FuelType::Electric)) => {
                let table = &tables.electric;
                Powertrain::Electric {
                    curve: table.curve,
                    comfort_min_c: table.comfort_min_c,
                    comfort_max_c: table.comfort_max_c,
                    cold_penalty: table.cold_penalty,
                    hot_penalty: table.hot_penalty,
                }
            }
            (EngineCategory::Hybrid, _) | (_, Some(FuelType::Hybrid)) => {
                let table = &tables.hybrid;
                Powertrain::Hybrid {
                    curve: table.curve,
                    low_speed_bonus: table.low_speed_bonus,
                    low_speed_threshold_kmh: table.low_speed_threshold_kmh,
                }
            }
            (engine, fuel) => {
                let table = &tables.combustion;
                let diesel = engine == EngineCategory::Diesel
                    || fuel == Some(FuelType::Diesel);
                let turbo = engine == EngineCategory::Turbo;

                let mut curve = table.curve;
                if diesel {
                    curve.peak *= 1.0 + table.diesel_bonus;
                }
                if turbo {
                    curve.peak *= 1.0 + table.turbo_bonus;
                }

                let fuel = if diesel {
                    FuelType::Diesel
                } else {
                    FuelType::Petrol
                };

                Powertrain::Combustion { fuel, curve }
            }
        }
    }

    pub fn fuel(&self) -> FuelType {
        match self {
            Powertrain::Combustion { fuel, .. } => *fuel,
            Powertrain::Hybrid { .. } => FuelType::Hybrid,
            Powertrain::Electric { .. } => FuelType::Electric,
        }
    }

    pub fn curve(&self) -> &EfficiencyCurve {
        match self {
            Powertrain::Combustion { curve, .. }
            | Powertrain::Hybrid { curve, .. }
            | Powertrain::Electric { curve, .. } => curve,
        }
    }

    fn curve_mut(&mut self) -> &mut EfficiencyCurve {
        match self {
            Powertrain::Combustion { curve, .. }
            | Powertrain::Hybrid { curve, .. }
            | Powertrain::Electric { curve, .. } => curve,
        }
    }

    /// Raw engine efficiency at the provided speed (km/h) and ambient
    /// temperature (C), before any drivetrain losses or clamping
    pub fn efficiency(&self, speed_kmh: f64, temperature_c: f64) -> f64 {
        let base = self.curve().efficiency(speed_kmh);

        match self {
            Powertrain::Combustion { .. } => base,
            Powertrain::Hybrid {
                low_speed_bonus,
                low_speed_threshold_kmh,
                ..
            } => {
                if speed_kmh < *low_speed_threshold_kmh {
                    base * (1.0 + low_speed_bonus)
                } else {
                    base
                }
            }
            Powertrain::Electric {
                comfort_min_c,
                comfort_max_c,
                cold_penalty,
                hot_penalty,
                ..
            } => {
                if temperature_c < *comfort_min_c {
                    base * (1.0 - cold_penalty)
                } else if temperature_c > *comfort_max_c {
                    base * (1.0 - hot_penalty)
                } else {
                    base
                }
            }
        }
    }
}

/// A fully resolved vehicle, ready to be handed to the cost model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleProfile {
    pub mass_kg: f64,
    pub drag_coefficient: f64,
    pub frontal_area_m2: f64,
    pub powertrain: Powertrain,
    pub transmission: TransmissionCategory,
    pub drive: DriveCategory,
    /// Combined transmission and drive multiplier on engine efficiency
    pub drivetrain_factor: f64,
    pub environment: Environment,
}

/// Use the provided value if it is a usable positive number, otherwise
/// fall back to the default
fn positive_or(field: &str, value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(val) if val.is_finite() && val > 0.0 => val,
        Some(val) => {
            debug!(field, value = val, default, "ignoring unusable value");
            default
        }
        None => default,
    }
}

impl VehicleProfile {
    /// Apply defaults to every missing or unusable field of the spec
    pub fn resolve(spec: &VehicleSpec, tables: &CostTables) -> VehicleProfile {
        let body = spec.class.unwrap_or_default().body();
        let engine = spec.engine.unwrap_or_default();
        let transmission = spec.transmission.unwrap_or_default();
        let drive = spec.drive.unwrap_or_default();

        let mut powertrain = Powertrain::resolve(engine, spec.fuel, tables);
        {
            let curve = powertrain.curve_mut();
            curve.optimal_speed_kmh = positive_or(
                "optimal_speed_kmh",
                spec.optimal_speed_kmh,
                curve.optimal_speed_kmh,
            );
            curve.peak = positive_or(
                "peak_efficiency",
                spec.peak_efficiency,
                curve.peak,
            )
            .min(1.0);
        }

        let defaults = Environment::default();
        let environment = Environment {
            weather: spec.weather.unwrap_or_default(),
            temperature_c: spec
                .temperature_c
                .filter(|t| t.is_finite())
                .unwrap_or(defaults.temperature_c),
            wind_speed: spec
                .wind_speed_ms
                .filter(|w| w.is_finite() && *w >= 0.0)
                .unwrap_or(defaults.wind_speed),
            wind_direction: spec
                .wind_direction_deg
                .filter(|d| d.is_finite())
                .unwrap_or(defaults.wind_direction),
        };

        VehicleProfile {
            mass_kg: positive_or("mass_kg", spec.mass_kg, body.mass_kg),
            drag_coefficient: positive_or(
                "drag_coefficient",
                spec.drag_coefficient,
                body.drag_coefficient,
            ),
            frontal_area_m2: positive_or(
                "frontal_area_m2",
                spec.frontal_area_m2,
                body.frontal_area_m2,
            ),
            powertrain,
            transmission,
            drive,
            drivetrain_factor: tables.transmission_factor.get(transmission)
                * tables.drive_factor.get(drive),
            environment,
        }
    }
}

impl Default for VehicleProfile {
    fn default() -> Self {
        VehicleProfile::resolve(&VehicleSpec::default(), &CostTables::default())
    }
}
