use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::city::{City, CityId, Compartments};
use crate::error::EpiError;
use crate::policy::PolicyOrder;

/// An ISO 3166-1 alpha-2 country code, stored upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// # Errors
    ///
    /// Returns `EpiError::InvalidIdentifier` unless `code` is two ASCII letters.
    pub fn new(code: &str) -> Result<CountryCode, EpiError> {
        let code = code.trim();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EpiError::InvalidIdentifier(format!(
                "country code {code:?} is not two ASCII letters"
            )));
        }
        Ok(CountryCode(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CountryCode {
    type Error = EpiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CountryCode::new(&value)
    }
}

impl From<CountryCode> for String {
    fn from(value: CountryCode) -> Self {
        value.0
    }
}

impl Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Beds a city of `population` gets out of a national rate of `beds_per_1000`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn bed_allocation(population: u64, beds_per_1000: f64) -> u64 {
    let beds = (population as f64 * beds_per_1000 / 1000.0).round();
    if beds.is_finite() && beds > 0.0 {
        beds as u64
    } else {
        0
    }
}

/// A country and the cities it owns. The city map is fixed once the country is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    code: CountryCode,
    name: String,
    gdp_per_capita: f64,
    beds_per_1000: f64,
    pub(crate) policy: PolicyOrder,
    pub(crate) cities: IndexMap<CityId, City>,
}

impl Country {
    #[must_use]
    pub fn new(
        code: CountryCode,
        name: String,
        gdp_per_capita: f64,
        beds_per_1000: f64,
        cities: IndexMap<CityId, City>,
    ) -> Country {
        Country {
            code,
            name,
            gdp_per_capita,
            beds_per_1000,
            policy: PolicyOrder::Free,
            cities,
        }
    }

    pub fn code(&self) -> &CountryCode {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gdp_per_capita(&self) -> f64 {
        self.gdp_per_capita
    }

    pub fn beds_per_1000(&self) -> f64 {
        self.beds_per_1000
    }

    pub fn policy(&self) -> PolicyOrder {
        self.policy
    }

    pub fn city(&self, name: &str) -> Option<&City> {
        self.cities.get(name)
    }

    pub fn cities(&self) -> impl Iterator<Item = &City> {
        self.cities.values()
    }

    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    pub fn population(&self) -> u64 {
        self.cities.values().map(City::population).sum()
    }

    /// Aggregate compartments over every city.
    pub fn totals(&self) -> Compartments {
        let mut totals = Compartments::default();
        for city in self.cities.values() {
            totals.accumulate(&city.compartments());
        }
        totals
    }

    /// Runs the day's policy transition on the current totals. Returns the previous order if it
    /// changed.
    pub(crate) fn update_policy(&mut self, government_action_timing: f64) -> Option<PolicyOrder> {
        let totals = self.totals();
        let next = self
            .policy
            .escalate(totals.infected, totals.total(), government_action_timing);
        if next == self.policy {
            return None;
        }
        Some(std::mem::replace(&mut self.policy, next))
    }

    pub fn snapshot(&self) -> CountrySnapshot {
        let totals = self.totals();
        CountrySnapshot {
            susceptible: totals.susceptible,
            infected: totals.infected,
            recovered: totals.recovered,
            deceased: totals.deceased,
            policy: self.policy,
        }
    }
}

/// Aggregate state of a country at the end of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountrySnapshot {
    pub susceptible: u64,
    pub infected: u64,
    pub recovered: u64,
    pub deceased: u64,
    pub policy: PolicyOrder,
}

impl CountrySnapshot {
    pub fn population(&self) -> u64 {
        self.susceptible + self.infected + self.recovered + self.deceased
    }
}
