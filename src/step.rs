//! The daily step engine. `advance_country` moves every city of one country forward by one day:
//!
//! 1. local transmission from the city's own infected,
//! 2. imported transmission from the other cities of the same country, drawn from whatever
//!    susceptible pool is left after step 1,
//! 3. resolution of the cohort that has been infected for `time_in_hospital` days, with
//!    mortality doubled for hospitalized cases beyond the city's free beds.
//!
//! Source prevalence for step 2 is read from the start of the day, so the order in which cities
//! are visited does not change the result. New infections are expected values; the part of them
//! that does not make a whole person is carried in the city to the next day.
//!
//! The policy transition is not part of the step. The world applies it to the returned snapshot
//! once every country of the day has been merged.

use log::trace;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Binomial;

use crate::city::{apportion, settle, City, Cohort};
use crate::config::{MortalityMode, SimulationConfig};
use crate::country::{Country, CountrySnapshot};
use crate::error::EpiError;
use crate::geo::{distance, Coordinates};
use crate::hashing::hash_str;

/// Read-only inputs shared by every country's step on a given day.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub config: &'a SimulationConfig,
    /// The day being simulated, counting from 1.
    pub day: u32,
    pub mortality: MortalityMode,
}

/// Splits resolved cases into deaths, either by expectation or by binomial draws.
enum DeathSampler {
    Expected,
    Stochastic(SmallRng),
}

impl DeathSampler {
    fn new(mode: MortalityMode, country: &Country, day: u32) -> DeathSampler {
        match mode {
            MortalityMode::Expected => DeathSampler::Expected,
            MortalityMode::Stochastic { seed } => {
                let seed = seed
                    .wrapping_add(hash_str(country.code().as_str()))
                    .wrapping_add(u64::from(day));
                DeathSampler::Stochastic(SmallRng::seed_from_u64(seed))
            }
        }
    }

    fn deaths(&mut self, count: u64, rate: f64) -> Result<u64, String> {
        match self {
            DeathSampler::Expected => Ok(apportion(count, rate)),
            DeathSampler::Stochastic(rng) => {
                if count == 0 {
                    return Ok(0);
                }
                let binomial = Binomial::new(count, rate).map_err(|e| e.to_string())?;
                Ok(rng.sample(binomial))
            }
        }
    }
}

/// Expected new local infections, `β_eff · (S/N) · I`.
#[allow(clippy::cast_precision_loss)]
pub fn infection_force(effective_rate: f64, susceptible: u64, infected: u64, population: u64) -> f64 {
    if population == 0 || susceptible == 0 || infected == 0 {
        return 0.0;
    }
    effective_rate * (susceptible as f64 / population as f64) * infected as f64
}

/// Start-of-day view of a city as an infection source.
#[derive(Debug, Clone, Copy)]
struct Source {
    coordinates: Coordinates,
    infected: u64,
}

/// Gravity-model pressure on a destination: `Σ w / N_dest` over every other city, capped at 1,
/// where `w = I_src · N_dest / (1 + d)²`.
#[allow(clippy::cast_precision_loss)]
fn import_pressure(destination: usize, city: &City, sources: &[Source]) -> f64 {
    let population = city.population();
    if population == 0 {
        return 0.0;
    }
    let total_weight: f64 = sources
        .iter()
        .enumerate()
        .filter(|(index, source)| *index != destination && source.infected > 0)
        .map(|(_, source)| {
            let decay = 1.0 + distance(source.coordinates, city.coordinates());
            source.infected as f64 * population as f64 / (decay * decay)
        })
        .sum();
    (total_weight / population as f64).min(1.0)
}

/// Resolves a cohort into `(recovered, deceased)`.
fn resolve_cohort(
    cohort: Cohort,
    free_beds: u64,
    config: &SimulationConfig,
    sampler: &mut DeathSampler,
) -> Result<(u64, u64), String> {
    let within_capacity = cohort.hospitalized.min(free_beds);
    let over_capacity = cohort.hospitalized - within_capacity;
    let deceased = sampler.deaths(within_capacity, config.mortality_rate)?
        + sampler.deaths(over_capacity, config.overrun_mortality_rate())?;
    let recovered = cohort.size.checked_sub(deceased).ok_or_else(|| {
        format!("{deceased} deaths exceed resolving cohort of {}", cohort.size)
    })?;
    Ok((recovered, deceased))
}

#[allow(clippy::cast_precision_loss)]
fn advance_city(
    city: &mut City,
    index: usize,
    sources: &[Source],
    effective_rate: f64,
    config: &SimulationConfig,
    sampler: &mut DeathSampler,
) -> Result<(), String> {
    let before = city.compartments;

    let mut carry = city.infection_carry;

    let force = infection_force(
        effective_rate,
        before.susceptible,
        before.infected,
        city.population(),
    );
    let local = settle(&mut carry, force, before.susceptible);
    let remaining = before.susceptible - local;
    let pressure = import_pressure(index, city, sources);
    let imported = settle(
        &mut carry,
        remaining as f64 * config.inter_city_coupling * effective_rate * pressure,
        remaining,
    );
    let new_infections = local + imported;

    let cohort = city.cohorts.take_oldest();
    let free_beds = city
        .bed_capacity()
        .saturating_sub(city.cohorts.occupied_beds());
    let (recovered, deceased) = resolve_cohort(cohort, free_beds, config, sampler)?;

    let infected = (before.infected + new_infections)
        .checked_sub(cohort.size)
        .ok_or_else(|| {
            format!(
                "{}: resolving cohort of {} exceeds {} infected",
                city.id(),
                cohort.size,
                before.infected + new_infections
            )
        })?;

    city.compartments.susceptible = remaining - imported;
    city.compartments.infected = infected;
    city.compartments.recovered += recovered;
    city.compartments.deceased += deceased;
    city.infection_carry = if city.compartments.susceptible == 0 { 0.0 } else { carry };
    city.cohorts
        .admit(new_infections, apportion(new_infections, config.hospitalization_rate));
    Ok(())
}

#[cfg(test)]
/// Steps of a country with this code panic, standing in for a crashing worker.
pub(crate) const PANICKING_CODE: &str = "ZZ";

/// Advances every city of one country by a day and returns the country's end-of-day snapshot.
/// The policy order is left as it was.
///
/// # Errors
///
/// Returns `EpiError::InvariantViolation` if any city ends the day in an inconsistent state.
/// The country is left partially updated in that case and must be discarded by the caller.
pub fn advance_country(
    country: &mut Country,
    context: &StepContext,
) -> Result<CountrySnapshot, EpiError> {
    #[cfg(test)]
    assert!(
        country.code().as_str() != PANICKING_CODE,
        "step of {} aborted",
        country.name()
    );

    let config = context.config;
    let reduction = country
        .policy
        .distancing_reduction(config.percent_social_distancing);
    let effective_rate = config.infection_rate * (1.0 - reduction);
    trace!(
        "stepping {} on day {} with effective rate {}",
        country.name(),
        context.day,
        effective_rate
    );

    let sources: Vec<Source> = country
        .cities
        .values()
        .map(|city| Source {
            coordinates: city.coordinates(),
            infected: city.infected(),
        })
        .collect();
    let mut sampler = DeathSampler::new(context.mortality, country, context.day);

    let name = country.name().to_string();
    for (index, city) in country.cities.values_mut().enumerate() {
        advance_city(city, index, &sources, effective_rate, config, &mut sampler)
            .map_err(|detail| EpiError::invariant(&name, context.day, detail))?;
        city.check_invariants()
            .map_err(|detail| EpiError::invariant(&name, context.day, detail))?;
    }

    Ok(country.snapshot())
}
