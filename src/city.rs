//! Cities are the population centers infection dynamics run on. Each city carries its
//! compartment counts, its share of the national hospital beds, and a ring of infection cohorts
//! that resolve `time_in_hospital` days after they were infected.

use std::borrow::Borrow;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::geo::Coordinates;

/// A city name, unique within its country.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CityId(String);

impl CityId {
    /// # Errors
    ///
    /// Returns `EpiError::InvalidIdentifier` if the name is blank.
    pub fn new(name: &str) -> Result<CityId, EpiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EpiError::InvalidIdentifier(
                "city name must not be empty".to_string(),
            ));
        }
        Ok(CityId(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CityId {
    type Error = EpiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CityId::new(&value)
    }
}

impl From<CityId> for String {
    fn from(value: CityId) -> Self {
        value.0
    }
}

impl Borrow<str> for CityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Susceptible, infected, recovered and deceased counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compartments {
    pub susceptible: u64,
    pub infected: u64,
    pub recovered: u64,
    pub deceased: u64,
}

impl Compartments {
    pub fn total(&self) -> u64 {
        self.susceptible + self.infected + self.recovered + self.deceased
    }

    pub fn accumulate(&mut self, other: &Compartments) {
        self.susceptible += other.susceptible;
        self.infected += other.infected;
        self.recovered += other.recovered;
        self.deceased += other.deceased;
    }
}

/// Rounds an expected count to the nearest integer within `[0, cap]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn bounded(expected: f64, cap: u64) -> u64 {
    let rounded = expected.round();
    if rounded.is_nan() || rounded <= 0.0 {
        0
    } else {
        (rounded as u64).min(cap)
    }
}

/// Rounds `carry + expected` to a count within `[0, cap]` and leaves the rounding remainder in
/// `carry`, so fractional expectations accumulate across days instead of being lost. The
/// remainder is dropped once the cap is hit.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn settle(carry: &mut f64, expected: f64, cap: u64) -> u64 {
    let pending = *carry + expected;
    let count = bounded(pending, cap);
    *carry = if !pending.is_finite() || pending.round() > cap as f64 {
        0.0
    } else {
        pending - count as f64
    };
    count
}

/// `round(count × rate)`, never more than `count`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn apportion(count: u64, rate: f64) -> u64 {
    bounded(count as f64 * rate, count)
}

/// A cohort leaving the ring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cohort {
    pub size: u64,
    /// Members needing a hospital bed.
    pub hospitalized: u64,
}

/// Fixed-size ring of infection cohorts, one slot per day of hospital stay.
///
/// Every tick takes the slot at `head` (the oldest cohort), refills that same slot with the
/// day's new infections and moves `head` forward. A cohort admitted on tick `d` therefore
/// resolves on tick `d + slots()`. Alongside each cohort the ring keeps its hospital need; the
/// sum of those needs is the city's count of occupied beds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortRing {
    infected: Vec<u64>,
    hospitalized: Vec<u64>,
    head: usize,
    occupied_beds: u64,
}

impl CohortRing {
    /// # Panics
    ///
    /// Panics if `time_in_hospital` is zero; configurations are validated before cities are
    /// built.
    #[must_use]
    pub fn new(time_in_hospital: usize) -> CohortRing {
        assert!(time_in_hospital > 0, "time_in_hospital must be positive");
        CohortRing {
            infected: vec![0; time_in_hospital],
            hospitalized: vec![0; time_in_hospital],
            head: 0,
            occupied_beds: 0,
        }
    }

    /// Number of cohort slots, one per day of hospital stay.
    pub fn slots(&self) -> usize {
        self.infected.len()
    }

    /// Sum over all cohorts; equals the city's infected count.
    pub fn total(&self) -> u64 {
        self.infected.iter().sum()
    }

    pub fn occupied_beds(&self) -> u64 {
        self.occupied_beds
    }

    /// The cohort that resolves on the next tick.
    pub fn oldest(&self) -> Cohort {
        Cohort {
            size: self.infected[self.head],
            hospitalized: self.hospitalized[self.head],
        }
    }

    /// Removes the oldest cohort. Its beds are released.
    pub(crate) fn take_oldest(&mut self) -> Cohort {
        let cohort = self.oldest();
        self.infected[self.head] = 0;
        self.hospitalized[self.head] = 0;
        self.occupied_beds = self.occupied_beds.saturating_sub(cohort.hospitalized);
        cohort
    }

    /// Stores today's infections in the slot just vacated and advances the ring.
    pub(crate) fn admit(&mut self, infected: u64, hospitalized: u64) {
        self.infected[self.head] += infected;
        self.hospitalized[self.head] += hospitalized;
        self.occupied_beds += hospitalized;
        self.head = (self.head + 1) % self.slots();
    }

    /// Adds infections to the most recently admitted slot, i.e. as if they had been infected
    /// on the previous tick.
    pub(crate) fn seed(&mut self, infected: u64, hospitalized: u64) {
        let newest = (self.head + self.slots() - 1) % self.slots();
        self.infected[newest] += infected;
        self.hospitalized[newest] += hospitalized;
        self.occupied_beds += hospitalized;
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.hospitalized.iter().sum::<u64>() == self.occupied_beds
            && self
                .infected
                .iter()
                .zip(&self.hospitalized)
                .all(|(infected, hospitalized)| hospitalized <= infected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct City {
    id: CityId,
    population: u64,
    coordinates: Coordinates,
    bed_capacity: u64,
    pub(crate) compartments: Compartments,
    pub(crate) cohorts: CohortRing,
    /// Fractional new infections not yet applied.
    pub(crate) infection_carry: f64,
}

impl City {
    /// Creates a fully susceptible city.
    #[must_use]
    pub fn new(
        id: CityId,
        population: u64,
        coordinates: Coordinates,
        bed_capacity: u64,
        time_in_hospital: usize,
    ) -> City {
        City {
            id,
            population,
            coordinates,
            bed_capacity,
            compartments: Compartments {
                susceptible: population,
                ..Compartments::default()
            },
            cohorts: CohortRing::new(time_in_hospital),
            infection_carry: 0.0,
        }
    }

    pub fn id(&self) -> &CityId {
        &self.id
    }

    pub fn population(&self) -> u64 {
        self.population
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn bed_capacity(&self) -> u64 {
        self.bed_capacity
    }

    pub fn compartments(&self) -> Compartments {
        self.compartments
    }

    pub fn susceptible(&self) -> u64 {
        self.compartments.susceptible
    }

    pub fn infected(&self) -> u64 {
        self.compartments.infected
    }

    pub fn recovered(&self) -> u64 {
        self.compartments.recovered
    }

    pub fn deceased(&self) -> u64 {
        self.compartments.deceased
    }

    pub fn cohorts(&self) -> &CohortRing {
        &self.cohorts
    }

    /// Moves up to `count` susceptible people into the infected compartment. Returns how many
    /// were actually infected.
    pub(crate) fn seed_infections(&mut self, count: u64, hospitalization_rate: f64) -> u64 {
        let count = count.min(self.compartments.susceptible);
        self.compartments.susceptible -= count;
        self.compartments.infected += count;
        self.cohorts
            .seed(count, apportion(count, hospitalization_rate));
        count
    }

    /// Checks conservation and that the cohort ring accounts for every infection.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        let total = self.compartments.total();
        if total != self.population {
            return Err(format!(
                "{}: S+I+R+D = {total} but population is {}",
                self.id, self.population
            ));
        }
        let in_cohorts = self.cohorts.total();
        if in_cohorts != self.compartments.infected {
            return Err(format!(
                "{}: cohorts hold {in_cohorts} infections but I = {}",
                self.id, self.compartments.infected
            ));
        }
        if !self.cohorts.is_consistent() {
            return Err(format!("{}: occupied bed count out of sync", self.id));
        }
        if !(self.infection_carry.is_finite() && self.infection_carry.abs() <= 1.0) {
            return Err(format!(
                "{}: infection carry {} is not a rounding remainder",
                self.id, self.infection_carry
            ));
        }
        Ok(())
    }
}
