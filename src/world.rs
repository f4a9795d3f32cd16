//! The world owns every country and drives the daily clock.
//!
//! A tick hands a copy of each healthy country to the worker pool, waits for all of them, and
//! then merges the returned states into the world, applies each merged country's policy
//! transition, and appends one new ledger record. A country whose
//! step fails keeps its state from before that tick and is frozen for the rest of the run: it is
//! no longer dispatched and the ledger repeats its last valid snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, error, info, warn};

use crate::city::{City, CityId};
use crate::config::{InfectionSeed, MortalityMode, SimulationConfig};
use crate::country::{bed_allocation, Country, CountryCode, CountrySnapshot};
use crate::error::EpiError;
use crate::ledger::{DayRecord, Ledger};
use crate::reference::{CityRecord, ReferenceData};
use crate::scheduler::WorkerPool;

/// Consecutive infection-free days after which `run` stops.
pub const EXTINCTION_DAYS: u32 = 2;

/// Cooperative cancellation for `World::run`, checked between ticks.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A country whose step was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryFailure {
    pub country: String,
    /// The day whose step failed.
    pub day: u32,
    pub reason: String,
    /// State the country is held at from then on.
    pub snapshot: CountrySnapshot,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub day: u32,
    /// Countries that failed on this tick.
    pub failures: Vec<CountryFailure>,
}

#[derive(Debug)]
pub struct World {
    config: Arc<SimulationConfig>,
    mortality: MortalityMode,
    countries: IndexMap<String, Country>,
    failures: IndexMap<String, CountryFailure>,
    day: u32,
    ledger: Ledger,
    pool: WorkerPool,
    infection_free_days: u32,
    stop: StopHandle,
}

impl World {
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn mortality(&self) -> MortalityMode {
        self.mortality
    }

    /// Days simulated so far.
    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn threads(&self) -> usize {
        self.pool.size()
    }

    pub fn country(&self, name: &str) -> Option<&Country> {
        self.countries.get(name)
    }

    pub fn countries(&self) -> impl Iterator<Item = &Country> {
        self.countries.values()
    }

    pub fn country_count(&self) -> usize {
        self.countries.len()
    }

    /// Every failure recorded so far, in the order they happened.
    pub fn failures(&self) -> impl Iterator<Item = &CountryFailure> {
        self.failures.values()
    }

    pub fn is_failed(&self, country: &str) -> bool {
        self.failures.contains_key(country)
    }

    pub fn total_infected(&self) -> u64 {
        self.snapshots().values().map(|snapshot| snapshot.infected).sum()
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Moves up to `count` susceptible people of a city into the infected compartment and
    /// returns how many were moved.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::UnknownCountry` or `EpiError::UnknownCity` for a key that is not in
    /// the world.
    pub fn seed_infections(&mut self, country: &str, city: &str, count: u64) -> Result<u64, EpiError> {
        let hospitalization_rate = self.config.hospitalization_rate;
        let target = self
            .countries
            .get_mut(country)
            .ok_or_else(|| EpiError::UnknownCountry(country.to_string()))?;
        let target_city = target
            .cities
            .get_mut(city)
            .ok_or_else(|| EpiError::UnknownCity {
                country: country.to_string(),
                city: city.to_string(),
            })?;
        let seeded = target_city.seed_infections(count, hospitalization_rate);
        if seeded < count {
            warn!("{country}/{city}: only {seeded} of {count} seeded infections found a susceptible host");
        }
        Ok(seeded)
    }

    /// Applies a list of seeds, failing on the first unknown key.
    ///
    /// # Errors
    ///
    /// See [`World::seed_infections`].
    pub fn apply_seeds(&mut self, seeds: &[InfectionSeed]) -> Result<u64, EpiError> {
        let mut total = 0;
        for seed in seeds {
            total += self.seed_infections(&seed.country, &seed.city, seed.infected)?;
        }
        Ok(total)
    }

    /// Current snapshot of every country, holding failed ones at their last valid state.
    fn snapshots(&self) -> IndexMap<String, CountrySnapshot> {
        self.countries
            .iter()
            .map(|(name, country)| {
                let snapshot = self
                    .failures
                    .get(name)
                    .map_or_else(|| country.snapshot(), |failure| failure.snapshot);
                (name.clone(), snapshot)
            })
            .collect()
    }

    fn record_failure(&mut self, index: usize, day: u32, reason: String) -> Option<CountryFailure> {
        let (name, country) = self.countries.get_index(index)?;
        error!("rejected step of {name} on day {day}: {reason}");
        let snapshot = self
            .ledger
            .latest()
            .and_then(|record| record.country(name).copied())
            .unwrap_or_else(|| country.snapshot());
        let failure = CountryFailure {
            country: name.clone(),
            day,
            reason,
            snapshot,
        };
        self.failures.insert(name.clone(), failure.clone());
        Some(failure)
    }

    /// Advances every country by one day and appends the day to the ledger.
    pub fn tick(&mut self) -> TickReport {
        let day = self.day + 1;
        let tasks: Vec<(usize, Country)> = self
            .countries
            .iter()
            .enumerate()
            .filter(|(_, (name, _))| !self.failures.contains_key(*name))
            .map(|(index, (_, country))| (index, country.clone()))
            .collect();
        let mut pending: Vec<usize> = tasks.iter().map(|(index, _)| *index).collect();

        let results = self.pool.dispatch(tasks, &self.config, day, self.mortality);

        let mut failures = Vec::new();
        for result in results {
            pending.retain(|index| *index != result.index);
            match result.outcome {
                Ok(_) => {
                    if let Some((name, country)) = self.countries.get_index_mut(result.index) {
                        *country = result.country;
                        let timing = self.config.government_action_timing;
                        if let Some(previous) = country.update_policy(timing) {
                            info!("{name} moves from {previous} to {} on day {day}", country.policy());
                        }
                    }
                }
                Err(e) => {
                    failures.extend(self.record_failure(result.index, day, e.to_string()));
                }
            }
        }
        for index in pending {
            failures.extend(self.record_failure(
                index,
                day,
                "worker terminated without reporting".to_string(),
            ));
        }

        let record = DayRecord {
            day,
            countries: self.snapshots(),
        };
        let infected = record.total_infected();
        debug!(
            "day {day}: {infected} infected worldwide across {} countries",
            record.countries.len()
        );
        self.ledger.append(record);
        self.day = day;
        if infected == 0 {
            self.infection_free_days += 1;
        } else {
            self.infection_free_days = 0;
        }

        TickReport { day, failures }
    }

    /// Ticks up to `days` times. Stops early when the world has had no infections for
    /// `EXTINCTION_DAYS` consecutive days or the stop handle is raised. Returns the day counter
    /// reached.
    pub fn run(&mut self, days: u32) -> u32 {
        for _ in 0..days {
            if self.infection_free_days >= EXTINCTION_DAYS {
                info!("epidemic extinguished by day {}", self.day);
                break;
            }
            if self.stop.is_stopped() {
                info!("run stopped on request after day {}", self.day);
                break;
            }
            self.tick();
        }
        let totals = self.snapshots().values().fold((0, 0), |(r, d), snapshot| {
            (r + snapshot.recovered, d + snapshot.deceased)
        });
        info!(
            "run ended on day {}: {} recovered, {} deceased, {} failed countries",
            self.day,
            totals.0,
            totals.1,
            self.failures.len()
        );
        self.day
    }
}

#[derive(Debug, Clone)]
pub struct WorldBuilder {
    config: SimulationConfig,
    mortality: MortalityMode,
    threads: Option<usize>,
}

impl WorldBuilder {
    #[must_use]
    pub fn new(config: SimulationConfig) -> WorldBuilder {
        WorldBuilder {
            config,
            mortality: MortalityMode::default(),
            threads: None,
        }
    }

    #[must_use]
    pub fn mortality(mut self, mortality: MortalityMode) -> WorldBuilder {
        self.mortality = mortality;
        self
    }

    /// Worker-pool size; `None` uses the available parallelism.
    #[must_use]
    pub fn threads(mut self, threads: Option<usize>) -> WorldBuilder {
        self.threads = threads;
        self
    }

    /// Builds a world from reference tables. Countries without usable cities or national
    /// statistics are skipped.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::InvalidConfig` for invalid parameters and
    /// `EpiError::DuplicateCountry` if two codes share a display name.
    pub fn build(self, reference: &ReferenceData) -> Result<World, EpiError> {
        self.config.validate()?;
        let by_code = reference.cities_by_country();

        let mut countries = Vec::new();
        for (iso2, name) in &reference.names {
            let code = match CountryCode::new(iso2) {
                Ok(code) => code,
                Err(e) => {
                    warn!("skipping {name}: {e}");
                    continue;
                }
            };
            let Some(records) = by_code.get(code.as_str()) else {
                warn!("skipping {name} ({code}): no cities");
                continue;
            };
            let Some(iso3) = reference.iso3_of(iso2) else {
                warn!("skipping {name} ({code}): no ISO3 code");
                continue;
            };
            let Some(&gdp_per_capita) = reference.gdp_per_capita.get(iso3) else {
                warn!("skipping {name} ({code}): no GDP per capita for {iso3}");
                continue;
            };
            let Some(&beds_per_1000) = reference.beds_per_1000.get(iso3) else {
                warn!("skipping {name} ({code}): no hospital beds for {iso3}");
                continue;
            };

            let cities = self.cities(name, records, beds_per_1000);
            if cities.is_empty() {
                warn!("skipping {name} ({code}): no populated cities");
                continue;
            }
            countries.push(Country::new(
                code,
                name.clone(),
                gdp_per_capita,
                beds_per_1000,
                cities,
            ));
        }
        self.build_from(countries)
    }

    fn cities(&self, country: &str, records: &[&CityRecord], beds_per_1000: f64) -> IndexMap<CityId, City> {
        let mut cities = IndexMap::new();
        for record in records {
            if record.population == 0 {
                continue;
            }
            let id = match CityId::new(&record.city) {
                Ok(id) => id,
                Err(e) => {
                    warn!("{country}: ignoring city row: {e}");
                    continue;
                }
            };
            if cities.contains_key(&id) {
                warn!("{country}: duplicate city {id}, keeping the first record");
                continue;
            }
            let city = City::new(
                id.clone(),
                record.population,
                record.coordinates(),
                bed_allocation(record.population, beds_per_1000),
                self.config.time_in_hospital,
            );
            cities.insert(id, city);
        }
        cities
    }

    /// Builds a world from countries constructed elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::InvalidConfig` for invalid parameters or cities whose cohort ring
    /// does not match `time_in_hospital`, and `EpiError::DuplicateCountry` for repeated names.
    pub fn build_from(self, countries: Vec<Country>) -> Result<World, EpiError> {
        self.config.validate()?;
        let mut by_name = IndexMap::new();
        for country in countries {
            if let Some(city) = country
                .cities()
                .find(|city| city.cohorts().slots() != self.config.time_in_hospital)
            {
                return Err(EpiError::InvalidConfig(format!(
                    "{}/{} tracks {} cohort days but time_in_hospital is {}",
                    country.name(),
                    city.id(),
                    city.cohorts().slots(),
                    self.config.time_in_hospital
                )));
            }
            if by_name.contains_key(country.name()) {
                return Err(EpiError::DuplicateCountry(country.name().to_string()));
            }
            by_name.insert(country.name().to_string(), country);
        }

        let pool = WorkerPool::new(self.threads);
        info!(
            "built world of {} countries and {} cities with {} workers",
            by_name.len(),
            by_name.values().map(Country::city_count).sum::<usize>(),
            pool.size()
        );
        Ok(World {
            config: Arc::new(self.config),
            mortality: self.mortality,
            countries: by_name,
            failures: IndexMap::new(),
            day: 0,
            ledger: Ledger::new(),
            pool,
            infection_free_days: 0,
            stop: StopHandle::default(),
        })
    }
}
