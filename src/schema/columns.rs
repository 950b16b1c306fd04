//! Fixed feature schema
//!
//! The classifier only ever sees these ten indicator columns, in this order.
//! The set holds the categories that carried the most weight in exploratory
//! training and is fixed at build time; it is never derived from
//! the batch being encoded.

use serde::{Deserialize, Serialize};

/// Number of columns in every feature vector
pub const FEATURE_COUNT: usize = 10;

/// A recognized indicator column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureColumn {
    LatinAmericanWings,
    Month7,
    Month10,
    GrupoLatam,
    Month12,
    International,
    Month4,
    Month11,
    SkyAirline,
    CopaAir,
}

/// Categorical field an indicator column is generated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalField {
    Opera,
    TipoVuelo,
    Mes,
}

impl CategoricalField {
    /// Column-name prefix used by the one-hot expansion
    pub fn prefix(&self) -> &'static str {
        match self {
            CategoricalField::Opera => "OPERA",
            CategoricalField::TipoVuelo => "TIPOVUELO",
            CategoricalField::Mes => "MES",
        }
    }

    /// Indicator name for a category value, e.g. `MES_7`
    pub fn indicator(&self, value: &str) -> String {
        format!("{}_{}", self.prefix(), value)
    }
}

impl FeatureColumn {
    /// Column name as produced by one-hot expansion of the raw field
    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::LatinAmericanWings => "OPERA_Latin American Wings",
            FeatureColumn::Month7 => "MES_7",
            FeatureColumn::Month10 => "MES_10",
            FeatureColumn::GrupoLatam => "OPERA_Grupo LATAM",
            FeatureColumn::Month12 => "MES_12",
            FeatureColumn::International => "TIPOVUELO_I",
            FeatureColumn::Month4 => "MES_4",
            FeatureColumn::Month11 => "MES_11",
            FeatureColumn::SkyAirline => "OPERA_Sky Airline",
            FeatureColumn::CopaAir => "OPERA_Copa Air",
        }
    }

    pub fn field(&self) -> CategoricalField {
        match self {
            FeatureColumn::LatinAmericanWings
            | FeatureColumn::GrupoLatam
            | FeatureColumn::SkyAirline
            | FeatureColumn::CopaAir => CategoricalField::Opera,
            FeatureColumn::International => CategoricalField::TipoVuelo,
            FeatureColumn::Month7
            | FeatureColumn::Month10
            | FeatureColumn::Month12
            | FeatureColumn::Month4
            | FeatureColumn::Month11 => CategoricalField::Mes,
        }
    }
}

impl std::fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const COLUMNS: [FeatureColumn; FEATURE_COUNT] = [
    FeatureColumn::LatinAmericanWings,
    FeatureColumn::Month7,
    FeatureColumn::Month10,
    FeatureColumn::GrupoLatam,
    FeatureColumn::Month12,
    FeatureColumn::International,
    FeatureColumn::Month4,
    FeatureColumn::Month11,
    FeatureColumn::SkyAirline,
    FeatureColumn::CopaAir,
];

/// The ordered, build-time feature space
pub struct FeatureSchema;

impl FeatureSchema {
    pub fn columns() -> &'static [FeatureColumn; FEATURE_COUNT] {
        &COLUMNS
    }

    pub fn names() -> Vec<&'static str> {
        COLUMNS.iter().map(FeatureColumn::name).collect()
    }

    /// Position of a column in every feature vector
    pub fn position(column: FeatureColumn) -> usize {
        // COLUMNS lists every variant exactly once
        COLUMNS.iter().position(|c| *c == column).unwrap_or_default()
    }

    pub fn index_of(name: &str) -> Option<usize> {
        COLUMNS.iter().position(|c| c.name() == name)
    }

    /// Whether a recorded column list is exactly this schema, in order
    pub fn matches<S: AsRef<str>>(names: &[S]) -> bool {
        names.len() == FEATURE_COUNT
            && names
                .iter()
                .zip(COLUMNS.iter())
                .all(|(name, column)| name.as_ref() == column.name())
    }
}
