//! Constant tables used by the cost model. These are gathered into a single
//! CostTables struct which is handed to the CostModel, so that tests (or a
//! deployment in a different locale) can swap values without touching any
//! shared state. Every field can be overridden from a JSON file; fields which
//! are left out keep their default value.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::error::ProviderError;
use crate::common::graph_data::RoadClass;
use crate::common::vehicle::{
    DriveCategory, FuelType, TransmissionCategory, Weather,
};

/// A value for each road class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ByRoadClass<T> {
    pub highway: T,
    pub primary: T,
    pub secondary: T,
    pub residential: T,
    pub unpaved: T,
}

impl<T: Copy> ByRoadClass<T> {
    pub fn get(&self, class: RoadClass) -> T {
        match class {
            RoadClass::Highway => self.highway,
            RoadClass::Primary => self.primary,
            RoadClass::Secondary => self.secondary,
            RoadClass::Residential => self.residential,
            RoadClass::Unpaved => self.unpaved,
        }
    }
}

/// A value for each weather condition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ByWeather<T> {
    pub dry: T,
    pub wet: T,
    pub snow: T,
    pub ice: T,
}

impl<T: Copy> ByWeather<T> {
    pub fn get(&self, weather: Weather) -> T {
        match weather {
            Weather::Dry => self.dry,
            Weather::Wet => self.wet,
            Weather::Snow => self.snow,
            Weather::Ice => self.ice,
        }
    }
}

/// Energy content per litre (or per unit of charge) of each fuel, in Joules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyDensity {
    pub petrol: f64,
    pub diesel: f64,
    pub electric: f64,
}

impl EnergyDensity {
    /// Hybrids burn petrol, so share its density
    pub fn get(&self, fuel: FuelType) -> f64 {
        match fuel {
            FuelType::Petrol | FuelType::Hybrid => self.petrol,
            FuelType::Diesel => self.diesel,
            FuelType::Electric => self.electric,
        }
    }
}

/// Multiplier applied to engine efficiency for each transmission
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ByTransmission {
    pub manual: f64,
    pub automatic: f64,
    pub cvt: f64,
}

impl ByTransmission {
    pub fn get(&self, transmission: TransmissionCategory) -> f64 {
        match transmission {
            TransmissionCategory::Manual => self.manual,
            TransmissionCategory::Automatic => self.automatic,
            TransmissionCategory::Cvt => self.cvt,
        }
    }
}

/// Multiplier applied to engine efficiency for each drive layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ByDrive {
    pub fwd: f64,
    pub rwd: f64,
    pub awd: f64,
}

impl ByDrive {
    pub fn get(&self, drive: DriveCategory) -> f64 {
        match drive {
            DriveCategory::Fwd => self.fwd,
            DriveCategory::Rwd => self.rwd,
            DriveCategory::Awd => self.awd,
        }
    }
}

/// A window of the day during which traffic is at peak density. The start
/// hour is inclusive and the end hour exclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl PeakWindow {
    pub fn contains(&self, hour: u8) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Bell-shaped efficiency curve, peaking at `peak` when travelling at
/// `optimal_speed_kmh` and falling away at a rate set by `k`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCurve {
    pub k: f64,
    pub optimal_speed_kmh: f64,
    pub peak: f64,
}

impl EfficiencyCurve {
    pub fn efficiency(&self, speed_kmh: f64) -> f64 {
        let delta = speed_kmh - self.optimal_speed_kmh;
        self.peak * (-self.k * delta * delta).exp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombustionTable {
    pub curve: EfficiencyCurve,
    /// Fractional increase in peak efficiency for diesel engines
    pub diesel_bonus: f64,
    /// Fractional increase in peak efficiency for turbocharged engines
    pub turbo_bonus: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridTable {
    pub curve: EfficiencyCurve,
    /// Fractional increase in efficiency below the threshold speed, where the
    /// electric motor does most of the work
    pub low_speed_bonus: f64,
    pub low_speed_threshold_kmh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElectricTable {
    pub curve: EfficiencyCurve,
    pub comfort_min_c: f64,
    pub comfort_max_c: f64,
    /// Fractional loss of efficiency below comfort_min_c
    pub cold_penalty: f64,
    /// Fractional loss of efficiency above comfort_max_c
    pub hot_penalty: f64,
}

/// Every constant used by the cost model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTables {
    /// Free-flow speed of each road class, km/h
    pub free_flow_kmh: ByRoadClass<f64>,
    /// Density at which traffic stops entirely, vehicles/km
    pub jam_density: ByRoadClass<f64>,
    /// How strongly weather affects each road class, 1.0 being the baseline
    pub weather_sensitivity: ByRoadClass<f64>,
    pub rolling_coefficient: ByRoadClass<f64>,
    pub weather_speed: ByWeather<f64>,
    pub weather_friction_reduction: ByWeather<f64>,
    pub peak_windows: Vec<PeakWindow>,
    /// Traffic density during a peak window, vehicles/km
    pub peak_density: f64,
    /// Traffic density outside of peak windows, vehicles/km
    pub offpeak_density: f64,
    pub min_speed_kmh: f64,
    /// kg/m3
    pub air_density: f64,
    /// m/s2
    pub gravity: f64,
    pub combustion: CombustionTable,
    pub hybrid: HybridTable,
    pub electric: ElectricTable,
    pub transmission_factor: ByTransmission,
    pub drive_factor: ByDrive,
    pub energy_density: EnergyDensity,
    pub min_efficiency: f64,
    /// Lowest fuel weight per edge when falling back to Dijkstra after a
    /// negative cycle has been detected
    pub negative_cycle_floor: f64,
}

impl Default for CostTables {
    fn default() -> Self {
        CostTables {
            free_flow_kmh: ByRoadClass {
                highway: 120.0,
                primary: 90.0,
                secondary: 70.0,
                residential: 50.0,
                unpaved: 40.0,
            },
            jam_density: ByRoadClass {
                highway: 180.0,
                primary: 150.0,
                secondary: 130.0,
                residential: 110.0,
                unpaved: 60.0,
            },
            weather_sensitivity: ByRoadClass {
                highway: 0.8,
                primary: 1.0,
                secondary: 1.1,
                residential: 1.2,
                unpaved: 1.5,
            },
            rolling_coefficient: ByRoadClass {
                highway: 0.010,
                primary: 0.012,
                secondary: 0.013,
                residential: 0.015,
                unpaved: 0.030,
            },
            weather_speed: ByWeather {
                dry: 1.0,
                wet: 0.90,
                snow: 0.70,
                ice: 0.60,
            },
            weather_friction_reduction: ByWeather {
                dry: 0.0,
                wet: 0.2,
                snow: 0.5,
                ice: 0.7,
            },
            peak_windows: vec![
                PeakWindow {
                    start_hour: 7,
                    end_hour: 9,
                },
                PeakWindow {
                    start_hour: 16,
                    end_hour: 19,
                },
            ],
            peak_density: 60.0,
            offpeak_density: 15.0,
            min_speed_kmh: 5.0,
            air_density: 1.225,
            gravity: 9.81,
            combustion: CombustionTable {
                curve: EfficiencyCurve {
                    k: 0.0005,
                    optimal_speed_kmh: 80.0,
                    peak: 0.35,
                },
                diesel_bonus: 0.20,
                turbo_bonus: 0.10,
            },
            hybrid: HybridTable {
                curve: EfficiencyCurve {
                    k: 0.0004,
                    optimal_speed_kmh: 60.0,
                    peak: 0.45,
                },
                low_speed_bonus: 0.15,
                low_speed_threshold_kmh: 30.0,
            },
            electric: ElectricTable {
                curve: EfficiencyCurve {
                    k: 0.0003,
                    optimal_speed_kmh: 50.0,
                    peak: 0.85,
                },
                comfort_min_c: 10.0,
                comfort_max_c: 30.0,
                cold_penalty: 0.15,
                hot_penalty: 0.10,
            },
            transmission_factor: ByTransmission {
                manual: 1.0,
                automatic: 0.97,
                cvt: 1.02,
            },
            drive_factor: ByDrive {
                fwd: 1.0,
                rwd: 0.99,
                awd: 0.96,
            },
            energy_density: EnergyDensity {
                petrol: 46.4e6,
                diesel: 45.6e6,
                electric: 3600.0e6,
            },
            min_efficiency: 0.01,
            negative_cycle_floor: 1e-6,
        }
    }
}

impl CostTables {
    /// Read a set of tables from a JSON file. Any field which is missing from
    /// the file keeps its default value
    pub fn from_json_file(path: &Path) -> Result<CostTables, ProviderError> {
        let reader = BufReader::new(File::open(path)?);
        let tables = serde_json::from_reader(reader)?;
        Ok(tables)
    }

    /// Check whether the provided hour of the day falls inside any of the
    /// configured peak traffic windows
    pub fn is_peak_hour(&self, hour: u8) -> bool {
        self.peak_windows.iter().any(|window| window.contains(hour))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Write;

    /// Peak windows include their start hour but not their end hour
    #[test]
    fn test_is_peak_hour() {
        let tables = CostTables::default();

        assert!(!tables.is_peak_hour(6));
        assert!(tables.is_peak_hour(7));
        assert!(tables.is_peak_hour(8));
        assert!(!tables.is_peak_hour(9));
        assert!(!tables.is_peak_hour(12));
        assert!(tables.is_peak_hour(16));
        assert!(tables.is_peak_hour(18));
        assert!(!tables.is_peak_hour(19));
    }

    /// The curve should peak at its optimal speed and be symmetrical
    /// either side of it
    #[test]
    fn test_efficiency_curve() {
        let curve = EfficiencyCurve {
            k: 0.0005,
            optimal_speed_kmh: 80.0,
            peak: 0.35,
        };

        assert_abs_diff_eq!(curve.efficiency(80.0), 0.35, epsilon = 1e-12);
        assert_abs_diff_eq!(
            curve.efficiency(60.0),
            curve.efficiency(100.0),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            curve.efficiency(60.0),
            0.35 * (-0.2_f64).exp(),
            epsilon = 1e-12
        );
    }

    /// Hybrids are costed using the energy density of petrol
    #[test]
    fn test_energy_density_hybrid() {
        let tables = CostTables::default();
        assert_eq!(
            tables.energy_density.get(FuelType::Hybrid),
            tables.energy_density.get(FuelType::Petrol)
        );
    }

    /// A partial JSON file should only override the fields it contains
    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_speed_kmh": 8.0, "peak_density": 75.0}}"#)
            .unwrap();

        let result = CostTables::from_json_file(file.path()).unwrap();

        let target = CostTables {
            min_speed_kmh: 8.0,
            peak_density: 75.0,
            ..CostTables::default()
        };

        assert_eq!(result, target);
    }

    /// An unreadable file is reported to the caller
    #[test]
    fn test_from_json_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = CostTables::from_json_file(&dir.path().join("nope.json"));

        match result {
            Err(ProviderError::Io(_)) => (),
            _ => panic!("Should have received an IO error"),
        }
    }
}
