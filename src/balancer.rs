//! Class balancing
//!
//! Each class is weighted by the frequency of the *other* class, so the rarer
//! label carries the larger share of the loss. The two weights sum to 1.

use crate::error::DelayError;
use crate::types::{ClassWeights, Label};

/// Computes inverse-frequency class weights
pub struct ClassBalancer;

impl ClassBalancer {
    /// `weight(1) = n0 / n`, `weight(0) = n1 / n`
    pub fn compute_weights(labels: &[Label]) -> Result<ClassWeights, DelayError> {
        if labels.is_empty() {
            return Err(DelayError::EmptyLabels);
        }

        let n = labels.len() as f64;
        let n_delayed = labels.iter().filter(|l| **l == Label::Delayed).count() as f64;
        let n_on_time = n - n_delayed;

        Ok(ClassWeights {
            on_time: n_delayed / n,
            delayed: n_on_time / n,
        })
    }

    /// Per-sample weights for a label sequence
    pub fn sample_weights(labels: &[Label], weights: &ClassWeights) -> Vec<f64> {
        labels.iter().map(|l| weights.weight(*l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[u8]) -> Vec<Label> {
        raw.iter().map(|v| Label::try_from(*v).unwrap()).collect()
    }

    #[test]
    fn test_minority_upweighted() {
        let weights = ClassBalancer::compute_weights(&labels(&[0, 0, 0, 1])).unwrap();
        assert!((weights.delayed - 0.75).abs() < 1e-12);
        assert!((weights.on_time - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_weights_sum_to_one() {
        for raw in [&[0u8, 1][..], &[1, 1, 1, 0, 0], &[0; 7], &[1, 0, 0, 0, 0, 0, 0, 0, 0]] {
            let weights = ClassBalancer::compute_weights(&labels(raw)).unwrap();
            assert!((weights.on_time + weights.delayed - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rarer_class_gets_larger_weight() {
        let weights = ClassBalancer::compute_weights(&labels(&[1, 1, 1, 0, 0])).unwrap();
        assert!(weights.on_time > weights.delayed);
    }

    #[test]
    fn test_single_class() {
        let weights = ClassBalancer::compute_weights(&labels(&[0, 0, 0])).unwrap();
        assert_eq!(weights.on_time, 0.0);
        assert_eq!(weights.delayed, 1.0);
    }

    #[test]
    fn test_empty_labels() {
        assert!(matches!(
            ClassBalancer::compute_weights(&[]),
            Err(DelayError::EmptyLabels)
        ));
    }

    #[test]
    fn test_sample_weights() {
        let l = labels(&[0, 1, 0, 0]);
        let weights = ClassBalancer::compute_weights(&l).unwrap();
        assert_eq!(
            ClassBalancer::sample_weights(&l, &weights),
            vec![0.25, 0.75, 0.25, 0.25]
        );
    }
}
