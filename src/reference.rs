//! In-memory reference tables a world is built from, and a loader for the cleaned data files:
//!
//! * `cities_database.csv` with columns `Country,City,Population,Latitude,Longitude`
//! * `names.json` mapping ISO2 codes to display names
//! * `iso3.json` mapping ISO2 to ISO3 codes
//! * `gdp-capita.json` and `beds.json`, keyed by ISO3
//!
//! Any file that is missing or cannot be parsed aborts the load.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::geo::Coordinates;
use crate::hashing::HashMap;

pub const CITIES_FILE: &str = "cities_database.csv";
pub const NAMES_FILE: &str = "names.json";
pub const ISO3_FILE: &str = "iso3.json";
pub const GDP_FILE: &str = "gdp-capita.json";
pub const BEDS_FILE: &str = "beds.json";

/// One usable row of the cities database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    /// ISO2 code as found in the file; often lower case.
    pub country: String,
    pub city: String,
    pub population: u64,
    pub latitude: f64,
    pub longitude: f64,
}

impl CityRecord {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Deserialize)]
struct CityRow {
    #[serde(rename = "Country")]
    country: String,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "Population")]
    population: Option<f64>,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub cities: Vec<CityRecord>,
    /// ISO2 to display name, in file order.
    pub names: IndexMap<String, String>,
    pub iso3: HashMap<String, String>,
    /// Keyed by ISO3.
    pub gdp_per_capita: HashMap<String, f64>,
    /// Keyed by ISO3.
    pub beds_per_1000: HashMap<String, f64>,
}

fn open(dir: &Path, artifact: &'static str) -> Result<BufReader<File>, EpiError> {
    let path = dir.join(artifact);
    let file = File::open(&path).map_err(|source| EpiError::MissingReference { artifact, source })?;
    debug!("reading {}", path.display());
    Ok(BufReader::new(file))
}

fn read_json<T: DeserializeOwned>(dir: &Path, artifact: &'static str) -> Result<T, EpiError> {
    let reader = open(dir, artifact)?;
    serde_json::from_reader(reader).map_err(|error| EpiError::MalformedReference {
        artifact,
        reason: error.to_string(),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn read_cities(dir: &Path) -> Result<Vec<CityRecord>, EpiError> {
    let mut reader = csv::Reader::from_reader(open(dir, CITIES_FILE)?);
    let mut cities = Vec::new();
    let mut unpopulated = 0usize;
    let mut out_of_range = 0usize;

    for row in reader.deserialize::<CityRow>() {
        let row = row.map_err(|error| EpiError::MalformedReference {
            artifact: CITIES_FILE,
            reason: error.to_string(),
        })?;
        let Some(population) = row.population.filter(|p| p.is_finite() && *p >= 0.0) else {
            unpopulated += 1;
            continue;
        };
        if !Coordinates::new(row.latitude, row.longitude).is_valid() {
            out_of_range += 1;
            continue;
        }
        cities.push(CityRecord {
            country: row.country,
            city: row.city,
            population: population.round() as u64,
            latitude: row.latitude,
            longitude: row.longitude,
        });
    }

    if unpopulated > 0 {
        debug!("dropped {unpopulated} city rows without a population");
    }
    if out_of_range > 0 {
        warn!("dropped {out_of_range} city rows with out-of-range coordinates");
    }
    Ok(cities)
}

impl ReferenceData {
    /// Loads every reference table from `dir`.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::MissingReference` if a file cannot be opened and
    /// `EpiError::MalformedReference` if one cannot be parsed.
    pub fn load(dir: &Path) -> Result<ReferenceData, EpiError> {
        let reference = ReferenceData {
            cities: read_cities(dir)?,
            names: read_json(dir, NAMES_FILE)?,
            iso3: read_json(dir, ISO3_FILE)?,
            gdp_per_capita: read_json(dir, GDP_FILE)?,
            beds_per_1000: read_json(dir, BEDS_FILE)?,
        };
        debug!(
            "loaded {} cities across {} country names",
            reference.cities.len(),
            reference.names.len()
        );
        Ok(reference)
    }

    /// City rows grouped by upper-cased country code, in file order within each group.
    pub fn cities_by_country(&self) -> HashMap<String, Vec<&CityRecord>> {
        let mut groups: HashMap<String, Vec<&CityRecord>> = HashMap::default();
        for record in &self.cities {
            groups
                .entry(record.country.trim().to_ascii_uppercase())
                .or_default()
                .push(record);
        }
        groups
    }

    pub fn iso3_of(&self, iso2: &str) -> Option<&str> {
        self.iso3
            .get(iso2)
            .or_else(|| self.iso3.get(&iso2.to_ascii_uppercase()))
            .map(String::as_str)
    }
}
