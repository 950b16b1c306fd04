//! Classification quality report
//!
//! Summarizes predictions against derived labels: confusion matrix, accuracy
//! and per-class precision, recall, F1 and support.

use crate::error::DelayError;
use crate::types::Label;
use serde::{Deserialize, Serialize};

/// Per-class scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Number of samples whose true label is this class
    pub support: usize,
}

/// Counts of (actual, predicted) pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_on_time: usize,
    pub false_delayed: usize,
    pub false_on_time: usize,
    pub true_delayed: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(actual: &[Label], predicted: &[Label]) -> Self {
        let mut matrix = ConfusionMatrix::default();
        for (a, p) in actual.iter().zip(predicted) {
            match (a, p) {
                (Label::OnTime, Label::OnTime) => matrix.true_on_time += 1,
                (Label::OnTime, Label::Delayed) => matrix.false_delayed += 1,
                (Label::Delayed, Label::OnTime) => matrix.false_on_time += 1,
                (Label::Delayed, Label::Delayed) => matrix.true_delayed += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_on_time + self.false_delayed + self.false_on_time + self.true_delayed
    }

    fn class_metrics(&self, label: Label) -> ClassMetrics {
        let (tp, fp, fn_) = match label {
            Label::OnTime => (self.true_on_time, self.false_on_time, self.false_delayed),
            Label::Delayed => (self.true_delayed, self.false_delayed, self.false_on_time),
        };

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        ClassMetrics {
            precision,
            recall,
            f1_score,
            support: tp + fn_,
        }
    }
}

/// Quality summary for a labeled evaluation set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub on_time: ClassMetrics,
    pub delayed: ClassMetrics,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn from_predictions(actual: &[Label], predicted: &[Label]) -> Result<Self, DelayError> {
        if actual.len() != predicted.len() {
            return Err(DelayError::Classifier(format!(
                "cannot score {} predictions against {} labels",
                predicted.len(),
                actual.len()
            )));
        }
        if actual.is_empty() {
            return Err(DelayError::EmptyLabels);
        }

        let confusion = ConfusionMatrix::from_predictions(actual, predicted);
        Ok(Self {
            accuracy: ratio(confusion.true_on_time + confusion.true_delayed, confusion.total()),
            on_time: confusion.class_metrics(Label::OnTime),
            delayed: confusion.class_metrics(Label::Delayed),
            confusion,
        })
    }

    pub fn class(&self, label: Label) -> &ClassMetrics {
        match label {
            Label::OnTime => &self.on_time,
            Label::Delayed => &self.delayed,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
