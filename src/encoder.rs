//! Feature encoding
//!
//! Flight records are one-hot expanded into `<FIELD>_<value>` indicators and
//! aligned to the fixed feature schema: schema columns the record does not
//! produce are false, and indicators the schema does not know are dropped.
//! The schema alone decides the column set, so a record encodes the same way
//! alone or inside any batch.

use crate::error::DelayError;
use crate::labels::LabelDeriver;
use crate::schema::{CategoricalField, FeatureSchema, FlightRecord, FEATURE_COUNT};
use crate::types::{FeatureVector, TrainingSet};
use std::collections::HashSet;
use tracing::debug;

/// Stateless encoder from flight records to schema-aligned vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder {
    label_deriver: LabelDeriver,
}

impl FeatureEncoder {
    pub fn new(label_deriver: LabelDeriver) -> Self {
        Self { label_deriver }
    }

    /// Encode a batch of records, one vector per record in input order
    pub fn encode(records: &[FlightRecord]) -> Vec<FeatureVector> {
        let vectors: Vec<FeatureVector> = records.iter().map(Self::encode_record).collect();

        let unseen = records
            .iter()
            .zip(&vectors)
            .filter(|(_, v)| v.active_count() == 0)
            .count();
        if unseen > 0 {
            debug!(
                unseen,
                total = records.len(),
                "records with no recognized category encode to all-false vectors"
            );
        }

        vectors
    }

    /// Encode a single record
    pub fn encode_record(record: &FlightRecord) -> FeatureVector {
        let generated = indicators(record);

        let mut values = [false; FEATURE_COUNT];
        for (slot, column) in values.iter_mut().zip(FeatureSchema::columns()) {
            *slot = generated.contains(column.name());
        }
        FeatureVector::new(values)
    }

    /// Features for prediction; timestamps are never read
    pub fn encode_for_inference(&self, records: &[FlightRecord]) -> Vec<FeatureVector> {
        Self::encode(records)
    }

    /// Features plus derived delay labels for training
    pub fn encode_for_training(&self, records: &[FlightRecord]) -> Result<TrainingSet, DelayError> {
        let labels = self.label_deriver.derive_labels(records)?;
        let features = Self::encode(records);
        Ok(TrainingSet { features, labels })
    }
}

/// One-hot indicator names generated by a single record
fn indicators(record: &FlightRecord) -> HashSet<String> {
    HashSet::from([
        CategoricalField::Opera.indicator(&record.opera),
        CategoricalField::TipoVuelo.indicator(record.tipo_vuelo.as_str()),
        CategoricalField::Mes.indicator(&record.mes.to_string()),
    ])
}
