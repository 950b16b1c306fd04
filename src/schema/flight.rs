//! Flight record definition
//!
//! Field names follow the source dataset columns (`OPERA`, `TIPOVUELO`, `MES`,
//! `Fecha-I`, `Fecha-O`). Any other dataset columns are ignored on read.

use serde::{Deserialize, Serialize};

/// Flight type: international or national
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightType {
    #[serde(rename = "I")]
    International,
    #[serde(rename = "N")]
    National,
}

impl FlightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightType::International => "I",
            FlightType::National => "N",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "I" => Some(FlightType::International),
            "N" => Some(FlightType::National),
            _ => None,
        }
    }
}

/// One flight leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Operating airline name
    #[serde(rename = "OPERA")]
    pub opera: String,
    /// International or national flight
    #[serde(rename = "TIPOVUELO")]
    pub tipo_vuelo: FlightType,
    /// Month number (1-12)
    #[serde(rename = "MES")]
    pub mes: u8,
    /// Scheduled date-time, `YYYY-MM-DD HH:MM:SS` (training only)
    #[serde(
        rename = "Fecha-I",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub fecha_i: Option<String>,
    /// Actual date-time, `YYYY-MM-DD HH:MM:SS` (training only)
    #[serde(
        rename = "Fecha-O",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub fecha_o: Option<String>,
}

impl FlightRecord {
    /// Record without timestamps, as received for prediction
    pub fn new(opera: impl Into<String>, tipo_vuelo: FlightType, mes: u8) -> Self {
        Self {
            opera: opera.into(),
            tipo_vuelo,
            mes,
            fecha_i: None,
            fecha_o: None,
        }
    }

    /// Attach scheduled and actual timestamps
    pub fn with_times(mut self, scheduled: impl Into<String>, actual: impl Into<String>) -> Self {
        self.fecha_i = Some(scheduled.into());
        self.fecha_o = Some(actual.into());
        self
    }

    pub fn has_times(&self) -> bool {
        self.fecha_i.is_some() && self.fecha_o.is_some()
    }
}
