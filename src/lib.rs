//! A compartment model of an epidemic spreading over countries made of cities.
//!
//! Every city tracks susceptible, infected, recovered and deceased counts along with a ring of
//! infection cohorts that resolve after a fixed hospital stay. Each simulated day:
//! * infected people in a city infect its susceptible population at a rate lowered by the
//!   country's distancing policy,
//! * infection also travels between cities of the same country, weighted by population and
//!   decaying with distance,
//! * cohorts that finish their stay recover or die, with mortality doubled for hospitalized
//!   cases beyond the city's share of national hospital beds,
//! * each country escalates its policy from free to recommended to mandatory distancing as its
//!   infected fraction crosses the government action threshold.
//!
//! A [`World`] advances all countries in parallel on a bounded worker pool, one task per
//! country, and appends one [`ledger::DayRecord`] per day once every country has finished. A
//! country whose step fails is frozen at its last valid state without halting the run.
//!
//! ```no_run
//! use epiworld::{ReferenceData, SimulationConfig, WorldBuilder};
//!
//! # fn main() -> Result<(), epiworld::EpiError> {
//! let reference = ReferenceData::load(std::path::Path::new("data"))?;
//! let mut world = WorldBuilder::new(SimulationConfig::default()).build(&reference)?;
//! world.seed_infections("France", "paris", 100)?;
//! let days = world.run(180);
//! println!("{days} days, {} infected", world.total_infected());
//! # Ok(())
//! # }
//! ```
pub mod city;
pub mod config;
pub mod country;
pub mod error;
pub mod geo;
pub mod hashing;
pub mod ledger;
pub mod log;
pub mod policy;
pub mod reference;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod step;
pub mod world;

pub use city::{City, CityId, Compartments};
pub use config::{InfectionSeed, MortalityMode, ScenarioConfig, SimulationConfig};
pub use country::{Country, CountryCode, CountrySnapshot};
pub use error::EpiError;
pub use ledger::{DayRecord, Ledger};
pub use policy::PolicyOrder;
pub use reference::ReferenceData;
pub use world::{StopHandle, TickReport, World, WorldBuilder};
