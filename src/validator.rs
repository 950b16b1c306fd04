//! Prediction request validation
//!
//! Requests are checked against the raw JSON, before typed deserialization, so
//! that type errors (a float month, a numeric flight type) are reported with
//! the offending record index instead of as a generic parse failure.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// Top-level key holding the flight records
pub const FLIGHTS_KEY: &str = "flights";

/// Columns every request must carry
pub const REQUIRED_COLUMNS: [&str; 3] = ["OPERA", "TIPOVUELO", "MES"];

/// Accepted flight type codes
pub const VALID_TIPOVUELO: [&str; 2] = ["I", "N"];

/// Validation errors for prediction requests
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing 'flights' key in the request body.")]
    MissingFlights,

    #[error("'flights' must be an array of flight records.")]
    FlightsNotArray,

    #[error("No flight data provided.")]
    NoFlights,

    #[error("Flight record at index {index} is not an object.")]
    RecordNotObject { index: usize },

    #[error("Missing required columns: {}.", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid MES value (not an integer) at index {index}.")]
    MesNotInteger { index: usize },

    #[error("Invalid MES value {value} at index {index}. Must be between 1 and 12.")]
    MesOutOfRange { index: usize, value: i64 },

    #[error("Invalid TIPOVUELO value (not a string) at index {index}.")]
    TipoVueloNotString { index: usize },

    #[error("Invalid TIPOVUELO value '{value}' at index {index}. Must be 'I' or 'N'.")]
    InvalidTipoVuelo { index: usize, value: String },

    #[error("Invalid OPERA value (must be a non-empty string) at index {index}.")]
    InvalidOpera { index: usize },
}

impl ValidationError {
    /// Index of the offending record, for per-record errors
    pub fn index(&self) -> Option<usize> {
        match self {
            ValidationError::RecordNotObject { index }
            | ValidationError::MesNotInteger { index }
            | ValidationError::MesOutOfRange { index, .. }
            | ValidationError::TipoVueloNotString { index }
            | ValidationError::InvalidTipoVuelo { index, .. }
            | ValidationError::InvalidOpera { index } => Some(*index),
            _ => None,
        }
    }
}

/// Validator for inbound prediction requests
pub struct RequestValidator;

impl RequestValidator {
    /// Validate a request body, stopping at the first failure
    pub fn validate(body: &Value) -> Result<(), ValidationError> {
        let flights = Self::flights(body)?;
        for (index, flight) in flights.iter().enumerate() {
            Self::validate_record(index, flight)?;
        }
        Ok(())
    }

    /// Validate a request body and collect every per-record failure
    ///
    /// Request-level failures (missing key, empty batch, missing columns)
    /// are returned as the only entry.
    pub fn validate_all(body: &Value) -> Vec<ValidationError> {
        let flights = match Self::flights(body) {
            Ok(flights) => flights,
            Err(e) => return vec![e],
        };

        flights
            .iter()
            .enumerate()
            .filter_map(|(index, flight)| Self::validate_record(index, flight).err())
            .collect()
    }

    /// Request-level checks; returns the flight list when they pass
    fn flights(body: &Value) -> Result<&Vec<Value>, ValidationError> {
        let flights = body
            .as_object()
            .and_then(|obj| obj.get(FLIGHTS_KEY))
            .ok_or(ValidationError::MissingFlights)?;

        let flights = flights
            .as_array()
            .ok_or(ValidationError::FlightsNotArray)?;

        if flights.is_empty() {
            return Err(ValidationError::NoFlights);
        }

        // A column counts as present if any record carries it
        let present: BTreeSet<&str> = flights
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|obj| obj.keys().map(String::as_str))
            .collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !present.contains(*col))
            .map(|col| col.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(ValidationError::MissingColumns(missing));
        }

        Ok(flights)
    }

    fn validate_record(index: usize, flight: &Value) -> Result<(), ValidationError> {
        let record = flight
            .as_object()
            .ok_or(ValidationError::RecordNotObject { index })?;

        validate_mes(index, record)?;
        validate_tipo_vuelo(index, record)?;
        validate_opera(index, record)
    }
}

fn validate_mes(index: usize, record: &Map<String, Value>) -> Result<(), ValidationError> {
    let mes = record
        .get("MES")
        .and_then(Value::as_i64)
        .ok_or(ValidationError::MesNotInteger { index })?;

    if !(1..=12).contains(&mes) {
        return Err(ValidationError::MesOutOfRange { index, value: mes });
    }
    Ok(())
}

fn validate_tipo_vuelo(index: usize, record: &Map<String, Value>) -> Result<(), ValidationError> {
    let tipo = record
        .get("TIPOVUELO")
        .and_then(Value::as_str)
        .ok_or(ValidationError::TipoVueloNotString { index })?;

    if !VALID_TIPOVUELO.contains(&tipo) {
        return Err(ValidationError::InvalidTipoVuelo {
            index,
            value: tipo.to_string(),
        });
    }
    Ok(())
}

fn validate_opera(index: usize, record: &Map<String, Value>) -> Result<(), ValidationError> {
    match record.get("OPERA").and_then(Value::as_str) {
        Some(opera) if !opera.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidOpera { index }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_valid_request() {
        let body = json!({
            "flights": [
                {"OPERA": "Aerolineas Argentinas", "TIPOVUELO": "N", "MES": 3},
                {"OPERA": "Grupo LATAM", "TIPOVUELO": "I", "MES": 12}
            ]
        });
        assert_eq!(RequestValidator::validate(&body), Ok(()));
        assert!(RequestValidator::validate_all(&body).is_empty());
    }

    #[test]
    fn test_missing_flights_key() {
        assert_eq!(
            RequestValidator::validate(&json!({"data": []})),
            Err(ValidationError::MissingFlights)
        );
        assert_eq!(
            RequestValidator::validate(&json!([1, 2])),
            Err(ValidationError::MissingFlights)
        );
    }

    #[test]
    fn test_empty_flights() {
        assert_eq!(
            RequestValidator::validate(&json!({"flights": []})),
            Err(ValidationError::NoFlights)
        );
    }

    #[test]
    fn test_missing_columns_reported_together() {
        let body = json!({"flights": [{"OPERA": "Grupo LATAM"}]});
        let err = RequestValidator::validate(&body).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingColumns(vec!["TIPOVUELO".to_string(), "MES".to_string()])
        );
        assert_eq!(err.to_string(), "Missing required columns: TIPOVUELO, MES.");
    }

    #[test]
    fn test_month_checks() {
        let body = json!({"flights": [{"OPERA": "Grupo LATAM", "TIPOVUELO": "N", "MES": 13}]});
        assert_eq!(
            RequestValidator::validate(&body),
            Err(ValidationError::MesOutOfRange { index: 0, value: 13 })
        );

        let body = json!({"flights": [{"OPERA": "Grupo LATAM", "TIPOVUELO": "N", "MES": 7.0}]});
        assert_eq!(
            RequestValidator::validate(&body),
            Err(ValidationError::MesNotInteger { index: 0 })
        );

        let body = json!({"flights": [{"OPERA": "Grupo LATAM", "TIPOVUELO": "N", "MES": "7"}]});
        assert_eq!(
            RequestValidator::validate(&body),
            Err(ValidationError::MesNotInteger { index: 0 })
        );
    }

    #[test]
    fn test_flight_type_checks() {
        let body = json!({"flights": [
            {"OPERA": "Grupo LATAM", "TIPOVUELO": "N", "MES": 1},
            {"OPERA": "Grupo LATAM", "TIPOVUELO": "O", "MES": 1}
        ]});
        let err = RequestValidator::validate(&body).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidTipoVuelo {
                index: 1,
                value: "O".to_string()
            }
        );
        assert_eq!(err.index(), Some(1));

        let body = json!({"flights": [{"OPERA": "Grupo LATAM", "TIPOVUELO": 1, "MES": 1}]});
        assert_eq!(
            RequestValidator::validate(&body),
            Err(ValidationError::TipoVueloNotString { index: 0 })
        );
    }

    #[test]
    fn test_opera_checks() {
        let body = json!({"flights": [{"OPERA": "", "TIPOVUELO": "N", "MES": 1}]});
        assert_eq!(
            RequestValidator::validate(&body),
            Err(ValidationError::InvalidOpera { index: 0 })
        );
    }

    #[test]
    fn test_validate_all_collects_every_record() {
        let body = json!({"flights": [
            {"OPERA": "Grupo LATAM", "TIPOVUELO": "N", "MES": 0},
            {"OPERA": "Grupo LATAM", "TIPOVUELO": "I", "MES": 5},
            {"OPERA": "", "TIPOVUELO": "I", "MES": 5},
            "not a record"
        ]});

        let errors = RequestValidator::validate_all(&body);
        let indices: Vec<Option<usize>> = errors.iter().map(ValidationError::index).collect();
        assert_eq!(indices, vec![Some(0), Some(2), Some(3)]);
    }
}
