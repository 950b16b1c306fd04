//! Core types for the delay pipeline
//!
//! This module defines the values that flow between pipeline stages: encoded
//! feature vectors, delay labels, class weights and the prediction response.

use crate::schema::{FeatureColumn, FeatureSchema, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Binary delay label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    /// Departed within the delay threshold (0)
    OnTime,
    /// Departed later than the delay threshold (1)
    Delayed,
}

impl Label {
    pub fn as_u8(&self) -> u8 {
        match self {
            Label::OnTime => 0,
            Label::Delayed => 1,
        }
    }

    /// Regression target used by the solver
    pub fn as_target(&self) -> f64 {
        f64::from(self.as_u8())
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.as_u8()
    }
}

impl TryFrom<u8> for Label {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::OnTime),
            1 => Ok(Label::Delayed),
            other => Err(format!("label must be 0 or 1, got {other}")),
        }
    }
}

/// Schema-aligned indicator vector for a single flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureVector([bool; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [bool; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// Value of a single schema column
    pub fn get(&self, column: FeatureColumn) -> bool {
        self.0[FeatureSchema::position(column)]
    }

    pub fn values(&self) -> &[bool; FEATURE_COUNT] {
        &self.0
    }

    /// Indicators as 0.0 / 1.0 for the linear model
    pub fn as_f64(&self) -> [f64; FEATURE_COUNT] {
        self.0.map(|v| if v { 1.0 } else { 0.0 })
    }

    /// Number of active indicators
    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|v| **v).count()
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Per-class loss multipliers used to correct label imbalance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    /// Weight applied to on-time samples (label 0)
    pub on_time: f64,
    /// Weight applied to delayed samples (label 1)
    pub delayed: f64,
}

impl ClassWeights {
    pub fn weight(&self, label: Label) -> f64 {
        match label {
            Label::OnTime => self.on_time,
            Label::Delayed => self.delayed,
        }
    }
}

/// Encoded features paired with their derived labels
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<Label>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Prediction response body: one label per input flight, in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predict: Vec<Label>,
}
