use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use csv::Writer;
use log::info;

use crate::error::EpiError;
use crate::ledger::Ledger;

/// Where and how the ledger is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub directory: PathBuf,
    pub file_prefix: String,
    pub overwrite: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            directory: PathBuf::from("."),
            file_prefix: String::new(),
            overwrite: false,
        }
    }
}

impl ReportOptions {
    /// Sets the directory reports are written to.
    pub fn directory(&mut self, directory: PathBuf) -> &mut ReportOptions {
        self.directory = directory;
        self
    }

    /// Sets a prefix prepended to every report file name.
    pub fn file_prefix(&mut self, file_prefix: String) -> &mut ReportOptions {
        self.file_prefix = file_prefix;
        self
    }

    pub fn overwrite(&mut self, overwrite: bool) -> &mut ReportOptions {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn path_for(&self, short_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{short_name}.csv", self.file_prefix))
    }
}

// Checks that the path can be written under the overwrite setting. Creates all parent
// directories and returns the created file.
fn generate_validate_filepath(path: &Path, overwrite: bool) -> Result<File, EpiError> {
    if path.exists() && !overwrite {
        return Err(EpiError::ReportError(format!(
            "{} already exists; pass --force-overwrite to replace it",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

/// Writes one row per day and country to `{prefix}ledger.csv` and returns the path written.
///
/// # Errors
///
/// Returns `EpiError::ReportError` if the file exists and overwriting is off, or an I/O or CSV
/// error if writing fails.
pub fn write_ledger_csv(ledger: &Ledger, options: &ReportOptions) -> Result<PathBuf, EpiError> {
    let path = options.path_for("ledger");
    let file = generate_validate_filepath(&path, options.overwrite)?;
    let mut writer = Writer::from_writer(file);
    let mut rows = 0usize;
    for row in ledger.rows() {
        writer.serialize(row)?;
        rows += 1;
    }
    writer.flush()?;
    info!("wrote {rows} ledger rows to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::country::CountrySnapshot;
    use crate::ledger::{DayRecord, LedgerRow};
    use crate::policy::PolicyOrder;
    use indexmap::IndexMap;
    use tempfile::tempdir;

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        for day in 1..=2 {
            let mut countries = IndexMap::new();
            countries.insert(
                "France".to_string(),
                CountrySnapshot {
                    susceptible: 90,
                    infected: 10 * u64::from(day),
                    recovered: 0,
                    deceased: 0,
                    policy: PolicyOrder::Mandatory,
                },
            );
            ledger.append(DayRecord { day, countries });
        }
        ledger
    }

    #[test]
    fn writes_rows_with_header() {
        let temp_dir = tempdir().unwrap();
        let mut options = ReportOptions::default();
        options
            .directory(temp_dir.path().join("nested"))
            .file_prefix("run1_".to_string());

        let path = write_ledger_csv(&ledger(), &options).unwrap();
        assert_eq!(path, temp_dir.path().join("nested").join("run1_ledger.csv"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("day,country,susceptible,infected,recovered,deceased,policy\n"));

        let mut reader = csv::Reader::from_path(path).unwrap();
        let rows: Vec<LedgerRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].day, 2);
        assert_eq!(rows[1].infected, 20);
        assert_eq!(rows[1].policy, PolicyOrder::Mandatory);
    }

    #[test]
    fn refuses_to_overwrite() {
        let temp_dir = tempdir().unwrap();
        let mut options = ReportOptions::default();
        options.directory(temp_dir.path().to_path_buf());
        write_ledger_csv(&ledger(), &options).unwrap();

        let error = write_ledger_csv(&ledger(), &options).unwrap_err();
        assert!(matches!(error, EpiError::ReportError(_)));

        options.overwrite(true);
        assert!(write_ledger_csv(&ledger(), &options).is_ok());
    }
}
