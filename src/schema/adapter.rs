//! Record batch parsing
//!
//! Training data arrives as a JSON array or NDJSON of dataset rows; prediction
//! requests arrive as a `{"flights": [...]}` body that must pass the request
//! validator before any record reaches the encoder.

use crate::error::DelayError;
use crate::schema::flight::{FlightRecord, FlightType};
use crate::validator::{RequestValidator, ValidationError, FLIGHTS_KEY};
use serde_json::Value;

/// Adapter for turning raw JSON into flight records
pub struct RecordAdapter;

impl RecordAdapter {
    /// Parse a JSON string containing an array of flight records
    pub fn parse_array(json: &str) -> Result<Vec<FlightRecord>, DelayError> {
        let records: Vec<FlightRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) flight records
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FlightRecord>, DelayError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<FlightRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(DelayError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Parse and validate a prediction request body
    ///
    /// Timestamps in the request are ignored; prediction never derives labels.
    pub fn parse_request(json: &str) -> Result<Vec<FlightRecord>, DelayError> {
        let body: Value = serde_json::from_str(json)?;
        Self::records_from_request(&body)
    }

    /// Validate an already-parsed request body and extract its records
    pub fn records_from_request(body: &Value) -> Result<Vec<FlightRecord>, DelayError> {
        RequestValidator::validate(body)?;

        let flights = body
            .get(FLIGHTS_KEY)
            .and_then(Value::as_array)
            .ok_or(ValidationError::MissingFlights)?;

        flights
            .iter()
            .enumerate()
            .map(|(index, flight)| Self::record_from_value(index, flight))
            .collect()
    }

    fn record_from_value(index: usize, flight: &Value) -> Result<FlightRecord, DelayError> {
        let opera = flight
            .get("OPERA")
            .and_then(Value::as_str)
            .ok_or(ValidationError::InvalidOpera { index })?;
        let tipo_vuelo = flight
            .get("TIPOVUELO")
            .and_then(Value::as_str)
            .and_then(FlightType::parse)
            .ok_or(ValidationError::TipoVueloNotString { index })?;
        let mes = flight
            .get("MES")
            .and_then(Value::as_i64)
            .and_then(|m| u8::try_from(m).ok())
            .ok_or(ValidationError::MesNotInteger { index })?;

        Ok(FlightRecord::new(opera, tipo_vuelo, mes))
    }
}
