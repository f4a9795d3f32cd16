use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `EpiError` and maps other errors to
/// convert to an `EpiError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum EpiError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    InvalidConfig(String),
    MissingReference {
        artifact: &'static str,
        source: io::Error,
    },
    MalformedReference {
        artifact: &'static str,
        reason: String,
    },
    InvalidIdentifier(String),
    UnknownCountry(String),
    UnknownCity {
        country: String,
        city: String,
    },
    DuplicateCountry(String),
    InvariantViolation {
        country: String,
        day: u32,
        detail: String,
    },
    ReportError(String),
    EpiError(String),
}

impl EpiError {
    pub(crate) fn invariant(country: &str, day: u32, detail: impl Into<String>) -> Self {
        EpiError::InvariantViolation {
            country: country.to_string(),
            day,
            detail: detail.into(),
        }
    }
}

impl From<io::Error> for EpiError {
    fn from(error: io::Error) -> Self {
        EpiError::IoError(error)
    }
}

impl From<serde_json::Error> for EpiError {
    fn from(error: serde_json::Error) -> Self {
        EpiError::JsonError(error)
    }
}

impl From<csv::Error> for EpiError {
    fn from(error: csv::Error) -> Self {
        EpiError::CSVError(error)
    }
}

impl From<String> for EpiError {
    fn from(error: String) -> Self {
        EpiError::EpiError(error)
    }
}

impl From<&str> for EpiError {
    fn from(error: &str) -> Self {
        EpiError::EpiError(error.to_string())
    }
}

impl std::error::Error for EpiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EpiError::IoError(error) | EpiError::MissingReference { source: error, .. } => {
                Some(error)
            }
            EpiError::JsonError(error) => Some(error),
            EpiError::CSVError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for EpiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EpiError::IoError(error) => write!(f, "Error: {error}"),
            EpiError::JsonError(error) => write!(f, "Error: {error}"),
            EpiError::CSVError(error) => write!(f, "Error: {error}"),
            EpiError::InvalidConfig(message) => write!(f, "Invalid configuration: {message}"),
            EpiError::MissingReference { artifact, source } => {
                write!(f, "Reference file missing ({artifact}): {source}")
            }
            EpiError::MalformedReference { artifact, reason } => {
                write!(f, "Reference file malformed ({artifact}): {reason}")
            }
            EpiError::InvalidIdentifier(message) => write!(f, "Invalid identifier: {message}"),
            EpiError::UnknownCountry(country) => write!(f, "Unknown country: {country}"),
            EpiError::UnknownCity { country, city } => {
                write!(f, "Unknown city {city} in {country}")
            }
            EpiError::DuplicateCountry(name) => write!(f, "Duplicate country name: {name}"),
            EpiError::InvariantViolation {
                country,
                day,
                detail,
            } => write!(f, "Invariant violated in {country} on day {day}: {detail}"),
            EpiError::ReportError(message) => write!(f, "Report error: {message}"),
            EpiError::EpiError(message) => write!(f, "Error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn missing_reference_names_artifact() {
        let error = EpiError::MissingReference {
            artifact: "GDP per capita table",
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let message = error.to_string();
        assert!(message.contains("GDP per capita table"));
        assert!(message.contains("no such file"));
        assert!(error.source().is_some());
    }

    #[test]
    fn string_conversion() {
        let error: EpiError = "something broke".into();
        assert!(matches!(error, EpiError::EpiError(ref m) if m == "something broke"));
    }

    #[test]
    fn invariant_display() {
        let error = EpiError::invariant("France", 3, "negative susceptible count");
        assert_eq!(
            error.to_string(),
            "Invariant violated in France on day 3: negative susceptible count"
        );
    }
}
