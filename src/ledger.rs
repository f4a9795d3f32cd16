//! The ledger is the observable output of a run: one `DayRecord` per simulated day, each mapping
//! country names to their end-of-day `CountrySnapshot`. Records are only ever appended by the
//! world's coordinator, after every country of the day has finished.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::country::CountrySnapshot;
use crate::policy::PolicyOrder;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub day: u32,
    pub countries: IndexMap<String, CountrySnapshot>,
}

impl DayRecord {
    pub fn country(&self, name: &str) -> Option<&CountrySnapshot> {
        self.countries.get(name)
    }

    /// World-wide infected count for the day.
    pub fn total_infected(&self) -> u64 {
        self.countries.values().map(|snapshot| snapshot.infected).sum()
    }
}

/// A flattened ledger entry, one per (day, country).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub day: u32,
    pub country: String,
    pub susceptible: u64,
    pub infected: u64,
    pub recovered: u64,
    pub deceased: u64,
    pub policy: PolicyOrder,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    records: Vec<DayRecord>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Ledger {
        Ledger::default()
    }

    pub(crate) fn append(&mut self, record: DayRecord) {
        debug_assert!(
            self.records
                .last()
                .map_or(true, |last| last.day < record.day),
            "ledger days must increase"
        );
        self.records.push(record);
    }

    pub fn records(&self) -> &[DayRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&DayRecord> {
        self.records.last()
    }

    pub fn day(&self, day: u32) -> Option<&DayRecord> {
        self.records
            .binary_search_by_key(&day, |record| record.day)
            .ok()
            .map(|index| &self.records[index])
    }

    /// Time series of one country, in day order.
    pub fn series<'a>(
        &'a self,
        country: &'a str,
    ) -> impl Iterator<Item = (u32, &'a CountrySnapshot)> + 'a {
        self.records
            .iter()
            .filter_map(move |record| record.country(country).map(|s| (record.day, s)))
    }

    /// Every entry as a flat row, day-major.
    pub fn rows(&self) -> impl Iterator<Item = LedgerRow> + '_ {
        self.records.iter().flat_map(|record| {
            record.countries.iter().map(move |(country, snapshot)| LedgerRow {
                day: record.day,
                country: country.clone(),
                susceptible: snapshot.susceptible,
                infected: snapshot.infected,
                recovered: snapshot.recovered,
                deceased: snapshot.deceased,
                policy: snapshot.policy,
            })
        })
    }
}
