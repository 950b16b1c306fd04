//! Delay label derivation
//!
//! A flight is labeled delayed when its actual time (`Fecha-O`) is more than
//! the threshold after its scheduled time (`Fecha-I`). Timestamps are naive
//! local date-times; no timezone conversion is applied. Labels are only ever
//! derived for training and evaluation.

use crate::error::DelayError;
use crate::schema::FlightRecord;
use crate::types::Label;
use chrono::NaiveDateTime;

/// Timestamp layout of `Fecha-I` / `Fecha-O`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Minutes past schedule after which a flight counts as delayed
pub const DEFAULT_DELAY_THRESHOLD_MINUTES: f64 = 15.0;

/// Derives binary delay labels from timestamp pairs
#[derive(Debug, Clone, Copy)]
pub struct LabelDeriver {
    threshold_minutes: f64,
}

impl Default for LabelDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_THRESHOLD_MINUTES)
    }
}

impl LabelDeriver {
    pub fn new(threshold_minutes: f64) -> Self {
        Self { threshold_minutes }
    }

    pub fn threshold_minutes(&self) -> f64 {
        self.threshold_minutes
    }

    /// Label every record; the first unparseable record aborts the batch
    pub fn derive_labels(&self, records: &[FlightRecord]) -> Result<Vec<Label>, DelayError> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| self.derive_label(index, record))
            .collect()
    }

    /// Label a single record; `index` is only used for error reporting
    pub fn derive_label(&self, index: usize, record: &FlightRecord) -> Result<Label, DelayError> {
        let diff = delay_minutes(index, record)?;
        Ok(self.classify(diff))
    }

    /// Strictly greater than the threshold is a delay
    pub fn classify(&self, diff_minutes: f64) -> Label {
        if diff_minutes > self.threshold_minutes {
            Label::Delayed
        } else {
            Label::OnTime
        }
    }
}

/// Minutes between scheduled and actual time; negative when early
pub fn delay_minutes(index: usize, record: &FlightRecord) -> Result<f64, DelayError> {
    let scheduled = parse_timestamp(index, "Fecha-I", record.fecha_i.as_deref())?;
    let actual = parse_timestamp(index, "Fecha-O", record.fecha_o.as_deref())?;

    Ok((actual - scheduled).num_seconds() as f64 / 60.0)
}

fn parse_timestamp(
    index: usize,
    field: &'static str,
    value: Option<&str>,
) -> Result<NaiveDateTime, DelayError> {
    let value = value.ok_or(DelayError::MissingTimestamp { index, field })?;

    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| {
        DelayError::TimestampParse {
            index,
            field,
            value: value.to_string(),
        }
    })
}
