//! Run parameters. `SimulationConfig` carries the epidemiological and policy knobs and is shared
//! read-only with every worker for the lifetime of a run. `ScenarioConfig` is the JSON file a run
//! is started from: parameters, duration, pool size, mortality mode and the initial seeds.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EpiError;

fn default_inter_city_coupling() -> f64 {
    0.01
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub infection_rate: f64,
    /// Fraction of contacts removed once distancing is mandatory.
    pub percent_social_distancing: f64,
    /// Infected fraction above which a government escalates.
    pub government_action_timing: f64,
    /// Days from infection until a case resolves.
    pub time_in_hospital: usize,
    pub hospitalization_rate: f64,
    /// Death probability for a hospitalized case; doubled above bed capacity.
    pub mortality_rate: f64,
    /// Scales imported infections from other cities of the same country.
    #[serde(default = "default_inter_city_coupling")]
    pub inter_city_coupling: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            infection_rate: 0.3,
            percent_social_distancing: 0.5,
            government_action_timing: 0.01,
            time_in_hospital: 14,
            hospitalization_rate: 0.1,
            mortality_rate: 0.05,
            inter_city_coupling: default_inter_city_coupling(),
        }
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), EpiError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EpiError::InvalidConfig(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Returns `EpiError::InvalidConfig` if a rate lies outside [0, 1] or
    /// `time_in_hospital` is zero.
    pub fn validate(&self) -> Result<(), EpiError> {
        check_unit_interval("infection_rate", self.infection_rate)?;
        check_unit_interval("percent_social_distancing", self.percent_social_distancing)?;
        check_unit_interval("government_action_timing", self.government_action_timing)?;
        check_unit_interval("hospitalization_rate", self.hospitalization_rate)?;
        check_unit_interval("mortality_rate", self.mortality_rate)?;
        check_unit_interval("inter_city_coupling", self.inter_city_coupling)?;
        if self.time_in_hospital == 0 {
            return Err(EpiError::InvalidConfig(
                "time_in_hospital must be a positive number of days".to_string(),
            ));
        }
        Ok(())
    }

    /// Death probability for cases that could not get a bed.
    #[must_use]
    pub fn overrun_mortality_rate(&self) -> f64 {
        (2.0 * self.mortality_rate).min(1.0)
    }
}

/// How resolved cohorts are split into recovered and deceased.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MortalityMode {
    /// Deaths are the rounded expected value.
    #[default]
    Expected,
    /// Deaths are binomial draws from a per-country, per-day generator.
    Stochastic { seed: u64 },
}

/// Infections placed into a city before the first tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfectionSeed {
    /// Country display name.
    pub country: String,
    pub city: String,
    pub infected: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub simulation: SimulationConfig,
    pub days: u32,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub mortality: MortalityMode,
    #[serde(default)]
    pub seeds: Vec<InfectionSeed>,
}

impl ScenarioConfig {
    /// Reads a scenario from a JSON file and validates it.
    ///
    /// # Errors
    ///
    /// Returns an `EpiError` if the file cannot be opened or parsed, or if the
    /// parameters are invalid.
    pub fn load(path: &Path) -> Result<ScenarioConfig, EpiError> {
        let file = File::open(path).map_err(|error| {
            EpiError::InvalidConfig(format!(
                "could not open scenario file {}: {error}",
                path.display()
            ))
        })?;
        let scenario: ScenarioConfig = serde_json::from_reader(BufReader::new(file))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// # Errors
    ///
    /// Returns `EpiError::InvalidConfig` for invalid parameters or a zero-sized pool.
    pub fn validate(&self) -> Result<(), EpiError> {
        self.simulation.validate()?;
        if self.threads == Some(0) {
            return Err(EpiError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_rates() {
        let config = SimulationConfig {
            mortality_rate: 1.5,
            ..SimulationConfig::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(EpiError::InvalidConfig(ref m)) if m.contains("mortality_rate")));

        let config = SimulationConfig {
            infection_rate: -0.1,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_hospital_stay() {
        let config = SimulationConfig {
            time_in_hospital: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EpiError::InvalidConfig(_))
        ));
    }

    #[test]
    fn overrun_rate_is_capped() {
        let config = SimulationConfig {
            mortality_rate: 0.7,
            ..SimulationConfig::default()
        };
        assert_eq!(config.overrun_mortality_rate(), 1.0);
    }

    #[test]
    fn load_scenario_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "simulation": {{
                    "infection_rate": 0.3,
                    "percent_social_distancing": 0.4,
                    "government_action_timing": 0.05,
                    "time_in_hospital": 10,
                    "hospitalization_rate": 0.1,
                    "mortality_rate": 0.02
                }},
                "days": 30,
                "mortality": {{ "stochastic": {{ "seed": 7 }} }},
                "seeds": [{{ "country": "France", "city": "paris", "infected": 12 }}]
            }}"#
        )
        .unwrap();

        let scenario = ScenarioConfig::load(file.path()).unwrap();
        assert_eq!(scenario.days, 30);
        assert_eq!(scenario.threads, None);
        assert_eq!(scenario.mortality, MortalityMode::Stochastic { seed: 7 });
        assert_eq!(scenario.simulation.inter_city_coupling, 0.01);
        assert_eq!(scenario.seeds[0].infected, 12);
    }

    #[test]
    fn load_rejects_zero_threads() {
        let mut file = NamedTempFile::new().unwrap();
        let scenario = ScenarioConfig {
            simulation: SimulationConfig::default(),
            days: 1,
            threads: Some(0),
            mortality: MortalityMode::Expected,
            seeds: vec![],
        };
        file.write_all(serde_json::to_string(&scenario).unwrap().as_bytes())
            .unwrap();
        assert!(ScenarioConfig::load(file.path()).is_err());
    }

    #[test]
    fn missing_scenario_file() {
        let result = ScenarioConfig::load(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(EpiError::InvalidConfig(_))));
    }
}
