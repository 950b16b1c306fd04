//! Weighted logistic regression
//!
//! The classifier is a linear decision rule over the ten schema indicators:
//! `z = b + w·x`, delayed when `z > 0`. Fitting minimizes the class-weighted
//! log-loss with an L2 penalty on the coefficients (the intercept is not
//! penalized) using damped Newton steps.
//!
//! Fitted parameters live in a [`ModelArtifact`]. The classifier never keeps a
//! model in memory between calls: `fit` hands the artifact to the store and
//! `predict` reads it back on every call.

use crate::balancer::ClassBalancer;
use crate::error::DelayError;
use crate::schema::{FeatureColumn, FeatureSchema, FEATURE_COUNT};
use crate::store::ModelStore;
use crate::types::{ClassWeights, FeatureVector, Label};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Coefficients plus intercept
const N_PARAMS: usize = FEATURE_COUNT + 1;

/// Armijo sufficient-decrease constant for the line search
const ARMIJO: f64 = 1e-4;

/// Maximum step halvings per Newton iteration
const MAX_HALVINGS: usize = 30;

/// Solver settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Inverse L2 regularization strength (larger is weaker)
    pub regularization: f64,
    /// Maximum Newton iterations
    pub max_iter: usize,
    /// Convergence threshold on the largest gradient component
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            regularization: 1.0,
            max_iter: 100,
            tolerance: 1e-4,
        }
    }
}

/// Persisted parameters of a fitted classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    /// Column names in the order the coefficients apply to
    pub feature_columns: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub class_weights: ClassWeights,
    pub solver: SolverConfig,
    pub n_samples: usize,
    pub n_iter: usize,
    pub converged: bool,
}

impl ModelArtifact {
    /// Reject artifacts that cannot be applied to the current schema
    pub fn check(&self) -> Result<(), DelayError> {
        if !FeatureSchema::matches(&self.feature_columns) {
            return Err(DelayError::Classifier(format!(
                "artifact {} was trained on columns {:?}, expected {:?}",
                self.model_id,
                self.feature_columns,
                FeatureSchema::names()
            )));
        }
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(DelayError::Classifier(format!(
                "artifact {} has {} coefficients, expected {}",
                self.model_id,
                self.coefficients.len(),
                FEATURE_COUNT
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(DelayError::Classifier(format!(
                "artifact {} contains non-finite parameters",
                self.model_id
            )));
        }
        Ok(())
    }

    /// Signed distance to the decision boundary
    pub fn decision_function(&self, features: &FeatureVector) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.as_f64())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    /// One label per row, in input order
    pub fn predict(&self, features: &[FeatureVector]) -> Vec<Label> {
        features
            .iter()
            .map(|x| {
                if self.decision_function(x) > 0.0 {
                    Label::Delayed
                } else {
                    Label::OnTime
                }
            })
            .collect()
    }

    /// Probability of delay per row
    pub fn predict_proba(&self, features: &[FeatureVector]) -> Vec<f64> {
        features
            .iter()
            .map(|x| sigmoid(self.decision_function(x)))
            .collect()
    }

    /// Coefficients keyed by schema column
    pub fn coefficients_by_column(&self) -> Vec<(FeatureColumn, f64)> {
        FeatureSchema::columns()
            .iter()
            .copied()
            .zip(self.coefficients.iter().copied())
            .collect()
    }
}

/// Parameters produced by a single solver run
#[derive(Debug, Clone)]
pub struct FitResult {
    pub coefficients: [f64; FEATURE_COUNT],
    pub intercept: f64,
    pub n_iter: usize,
    pub converged: bool,
}

/// Weighted, L2-regularized logistic regression solver
pub struct LogisticRegression;

impl LogisticRegression {
    /// Fit on encoded features with one weight per sample
    pub fn fit(
        features: &[FeatureVector],
        labels: &[Label],
        sample_weights: &[f64],
        config: &SolverConfig,
    ) -> Result<FitResult, DelayError> {
        if features.len() != labels.len() || labels.len() != sample_weights.len() {
            return Err(DelayError::Classifier(format!(
                "shape mismatch: {} feature rows, {} labels, {} sample weights",
                features.len(),
                labels.len(),
                sample_weights.len()
            )));
        }
        if labels.is_empty() {
            return Err(DelayError::Classifier("cannot fit on zero samples".to_string()));
        }
        if !labels.contains(&Label::OnTime) || !labels.contains(&Label::Delayed) {
            return Err(DelayError::Classifier(
                "this solver needs samples of at least 2 classes in the data".to_string(),
            ));
        }
        if config.regularization <= 0.0 || !config.regularization.is_finite() {
            return Err(DelayError::Classifier(format!(
                "regularization must be positive, got {}",
                config.regularization
            )));
        }
        if sample_weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(DelayError::Classifier(
                "sample weights must be finite and non-negative".to_string(),
            ));
        }

        let total_weight: f64 = sample_weights.iter().sum();
        if total_weight <= 0.0 {
            return Err(DelayError::Classifier(
                "sample weights sum to zero".to_string(),
            ));
        }

        let problem = Problem {
            rows: features.iter().map(augmented).collect(),
            targets: labels.iter().map(Label::as_target).collect(),
            weights: sample_weights.iter().map(|w| w / total_weight).collect(),
            penalty: 1.0 / (config.regularization * total_weight),
        };

        let mut theta = [0.0; N_PARAMS];
        let mut n_iter = 0;
        let mut converged = false;

        while n_iter < config.max_iter {
            let (loss, grad, hess) = problem.evaluate(&theta);
            let grad_norm = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            debug!(iteration = n_iter, loss, grad_norm, "newton step");

            if grad_norm <= config.tolerance {
                converged = true;
                break;
            }

            let direction = solve(hess, grad)?;
            let slope: f64 = grad.iter().zip(&direction).map(|(g, d)| g * d).sum();

            let mut step = 1.0;
            let mut accepted = false;
            for _ in 0..MAX_HALVINGS {
                let candidate = offset(&theta, &direction, -step);
                if problem.loss(&candidate) <= loss - ARMIJO * step * slope {
                    theta = candidate;
                    accepted = true;
                    break;
                }
                step *= 0.5;
            }
            n_iter += 1;

            if !accepted {
                debug!(iteration = n_iter, "line search made no progress");
                break;
            }
        }

        if !converged {
            let (_, grad, _) = problem.evaluate(&theta);
            converged = grad.iter().all(|g| g.abs() <= config.tolerance);
        }
        if !converged {
            warn!(
                max_iter = config.max_iter,
                n_iter, "logistic regression did not converge"
            );
        }

        if theta.iter().any(|v| !v.is_finite()) {
            return Err(DelayError::Classifier(
                "solver produced non-finite parameters".to_string(),
            ));
        }

        let mut coefficients = [0.0; FEATURE_COUNT];
        coefficients.copy_from_slice(&theta[..FEATURE_COUNT]);

        Ok(FitResult {
            coefficients,
            intercept: theta[FEATURE_COUNT],
            n_iter,
            converged,
        })
    }
}

/// Training data in solver form. Weights are normalized to sum to one and the
/// penalty is rescaled to match, which leaves the minimizer unchanged but keeps
/// the gradient tolerance independent of the sample count.
struct Problem {
    rows: Vec<[f64; N_PARAMS]>,
    targets: Vec<f64>,
    weights: Vec<f64>,
    penalty: f64,
}

impl Problem {
    fn loss(&self, theta: &[f64; N_PARAMS]) -> f64 {
        let data: f64 = self
            .rows
            .iter()
            .zip(&self.targets)
            .zip(&self.weights)
            .map(|((x, y), s)| {
                let z = dot(theta, x);
                s * (log1p_exp(z) - y * z)
            })
            .sum();
        data + 0.5 * self.penalty * squared_norm(&theta[..FEATURE_COUNT])
    }

    fn evaluate(
        &self,
        theta: &[f64; N_PARAMS],
    ) -> (f64, [f64; N_PARAMS], [[f64; N_PARAMS]; N_PARAMS]) {
        let mut grad = [0.0; N_PARAMS];
        let mut hess = [[0.0; N_PARAMS]; N_PARAMS];
        let mut data_loss = 0.0;

        for ((x, y), s) in self.rows.iter().zip(&self.targets).zip(&self.weights) {
            let z = dot(theta, x);
            let p = sigmoid(z);
            data_loss += s * (log1p_exp(z) - y * z);

            let residual = s * (p - y);
            let curvature = s * p * (1.0 - p);
            for i in 0..N_PARAMS {
                grad[i] += residual * x[i];
                for j in 0..N_PARAMS {
                    hess[i][j] += curvature * x[i] * x[j];
                }
            }
        }

        for i in 0..FEATURE_COUNT {
            grad[i] += self.penalty * theta[i];
            hess[i][i] += self.penalty;
        }
        // Keeps the system solvable when every intercept term saturates
        hess[FEATURE_COUNT][FEATURE_COUNT] += 1e-12;

        let loss = data_loss + 0.5 * self.penalty * squared_norm(&theta[..FEATURE_COUNT]);
        (loss, grad, hess)
    }
}

/// Classifier bound to an artifact store
pub struct DelayClassifier<S: ModelStore> {
    store: S,
    solver: SolverConfig,
}

impl<S: ModelStore> DelayClassifier<S> {
    pub fn new(store: S) -> Self {
        Self::with_solver(store, SolverConfig::default())
    }

    pub fn with_solver(store: S, solver: SolverConfig) -> Self {
        Self { store, solver }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn solver(&self) -> &SolverConfig {
        &self.solver
    }

    /// Fit a new model and persist it, replacing any previous artifact
    pub fn fit(
        &self,
        features: &[FeatureVector],
        labels: &[Label],
        weights: &ClassWeights,
    ) -> Result<ModelArtifact, DelayError> {
        let sample_weights = ClassBalancer::sample_weights(labels, weights);
        let result = LogisticRegression::fit(features, labels, &sample_weights, &self.solver)?;

        let artifact = ModelArtifact {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            feature_columns: FeatureSchema::names().into_iter().map(String::from).collect(),
            coefficients: result.coefficients.to_vec(),
            intercept: result.intercept,
            class_weights: *weights,
            solver: self.solver,
            n_samples: labels.len(),
            n_iter: result.n_iter,
            converged: result.converged,
        };

        self.store.save(&artifact)?;
        info!(
            model_id = %artifact.model_id,
            n_samples = artifact.n_samples,
            n_iter = artifact.n_iter,
            converged = artifact.converged,
            "model trained and saved"
        );

        Ok(artifact)
    }

    /// Load the latest artifact and classify each row
    pub fn predict(&self, features: &[FeatureVector]) -> Result<Vec<Label>, DelayError> {
        let artifact = self.load_artifact()?;
        Ok(artifact.predict(features))
    }

    /// Load the latest artifact and return delay probabilities
    pub fn predict_proba(&self, features: &[FeatureVector]) -> Result<Vec<f64>, DelayError> {
        let artifact = self.load_artifact()?;
        Ok(artifact.predict_proba(features))
    }

    fn load_artifact(&self) -> Result<ModelArtifact, DelayError> {
        let artifact = self.store.load()?;
        artifact.check()?;
        debug!(model_id = %artifact.model_id, "loaded model artifact");
        Ok(artifact)
    }
}

fn augmented(features: &FeatureVector) -> [f64; N_PARAMS] {
    let mut row = [1.0; N_PARAMS];
    row[..FEATURE_COUNT].copy_from_slice(&features.as_f64());
    row
}

fn dot(a: &[f64; N_PARAMS], b: &[f64; N_PARAMS]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn squared_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn offset(theta: &[f64; N_PARAMS], direction: &[f64; N_PARAMS], scale: f64) -> [f64; N_PARAMS] {
    let mut out = *theta;
    for (o, d) in out.iter_mut().zip(direction) {
        *o += scale * d;
    }
    out
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow
fn log1p_exp(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Solve `a x = b` by Gaussian elimination with partial pivoting
fn solve(
    mut a: [[f64; N_PARAMS]; N_PARAMS],
    mut b: [f64; N_PARAMS],
) -> Result<[f64; N_PARAMS], DelayError> {
    for col in 0..N_PARAMS {
        let pivot = (col..N_PARAMS)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-300 {
            return Err(DelayError::Classifier(
                "singular Hessian in Newton step".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..N_PARAMS {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..N_PARAMS {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; N_PARAMS];
    for row in (0..N_PARAMS).rev() {
        let tail: f64 = (row + 1..N_PARAMS).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::FeatureEncoder;
    use crate::schema::{FlightRecord, FlightType};
    use crate::store::MemoryModelStore;

    fn balanced_set() -> (Vec<FeatureVector>, Vec<Label>) {
        let mut records = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            if i % 2 == 0 {
                records.push(FlightRecord::new("Grupo LATAM", FlightType::International, 7));
                labels.push(if i % 10 == 0 { Label::OnTime } else { Label::Delayed });
            } else {
                records.push(FlightRecord::new("Sky Airline", FlightType::National, 4));
                labels.push(if i % 10 == 1 { Label::Delayed } else { Label::OnTime });
            }
        }
        (FeatureEncoder::encode(&records), labels)
    }

    fn accuracy(predicted: &[Label], actual: &[Label]) -> f64 {
        let hits = predicted.iter().zip(actual).filter(|(p, a)| p == a).count();
        hits as f64 / actual.len() as f64
    }

    #[test]
    fn test_fit_then_predict_beats_majority_baseline() {
        let (features, labels) = balanced_set();
        let weights = ClassBalancer::compute_weights(&labels).unwrap();
        let classifier = DelayClassifier::new(MemoryModelStore::new());

        let artifact = classifier.fit(&features, &labels, &weights).unwrap();
        assert!(artifact.converged);
        assert_eq!(artifact.n_samples, 40);

        let predicted = classifier.predict(&features).unwrap();
        let delayed = labels.iter().filter(|l| **l == Label::Delayed).count();
        let majority = delayed.max(labels.len() - delayed) as f64 / labels.len() as f64;

        assert!(accuracy(&predicted, &labels) >= majority);
        assert!((accuracy(&predicted, &labels) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_predict_is_idempotent() {
        let (features, labels) = balanced_set();
        let weights = ClassBalancer::compute_weights(&labels).unwrap();
        let classifier = DelayClassifier::new(MemoryModelStore::new());
        classifier.fit(&features, &labels, &weights).unwrap();

        let first = classifier.predict(&features).unwrap();
        let second = classifier.predict(&features).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_predict_without_artifact() {
        let classifier = DelayClassifier::new(MemoryModelStore::new());
        let features = FeatureEncoder::encode(&[FlightRecord::new(
            "Grupo LATAM",
            FlightType::International,
            7,
        )]);

        assert!(matches!(
            classifier.predict(&features),
            Err(DelayError::StorageNotFound(_))
        ));
    }

    #[test]
    fn test_class_weights_shift_the_intercept() {
        // All-false rows: the fit reduces to the intercept alone
        let features = vec![FeatureVector::default(); 100];
        let labels: Vec<Label> = (0..100)
            .map(|i| if i < 80 { Label::OnTime } else { Label::Delayed })
            .collect();

        let unweighted = LogisticRegression::fit(
            &features,
            &labels,
            &vec![1.0; 100],
            &SolverConfig::default(),
        )
        .unwrap();
        let balanced = ClassBalancer::compute_weights(&labels).unwrap();
        let weighted = LogisticRegression::fit(
            &features,
            &labels,
            &ClassBalancer::sample_weights(&labels, &balanced),
            &SolverConfig::default(),
        )
        .unwrap();

        assert!((sigmoid(unweighted.intercept) - 0.2).abs() < 1e-3);
        assert!((sigmoid(weighted.intercept) - 0.5).abs() < 1e-3);
        assert!(weighted.coefficients.iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_weighted_fit_is_stationary() {
        // About one row in five is delayed, with rates that differ by carrier and month
        let carriers = ["Grupo LATAM", "Sky Airline", "Copa Air", "Latin American Wings", "JetSmart SPA"];
        let mut state: u64 = 42;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as usize
        };
        let mut records = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..3000 {
            let carrier = next() % carriers.len();
            let month = (next() % 12 + 1) as u8;
            let flight_type = if next() % 3 == 0 {
                FlightType::International
            } else {
                FlightType::National
            };
            let mut rate = 10 + 6 * carrier;
            if matches!(month, 7 | 12) {
                rate += 15;
            }
            if flight_type == FlightType::International {
                rate += 5;
            }
            records.push(FlightRecord::new(carriers[carrier], flight_type, month));
            labels.push(if next() % 100 < rate { Label::Delayed } else { Label::OnTime });
        }
        let features = FeatureEncoder::encode(&records);
        let weights = ClassBalancer::compute_weights(&labels).unwrap();
        let sample_weights = ClassBalancer::sample_weights(&labels, &weights);
        let config = SolverConfig::default();

        let fit = LogisticRegression::fit(&features, &labels, &sample_weights, &config).unwrap();
        assert!(fit.converged);

        // Gradient of C·Σ sᵢ·logloss + ½‖w‖², intercept unpenalized
        let mut grad = [0.0; N_PARAMS];
        for ((x, label), s) in features.iter().zip(&labels).zip(&sample_weights) {
            let x = x.as_f64();
            let z = fit.intercept
                + fit.coefficients.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>();
            let residual = config.regularization * s * (sigmoid(z) - label.as_target());
            for j in 0..FEATURE_COUNT {
                grad[j] += residual * x[j];
            }
            grad[FEATURE_COUNT] += residual;
        }
        for j in 0..FEATURE_COUNT {
            grad[j] += fit.coefficients[j];
        }

        let scale = config.regularization * sample_weights.iter().sum::<f64>();
        let worst = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
        assert!(worst / scale < 1e-3, "gradient {worst} at scale {scale}");
        assert!(fit.coefficients.iter().any(|c| c.abs() > 1e-2));
    }

    #[test]
    fn test_single_class_rejected() {
        let features = vec![FeatureVector::default(); 3];
        let labels = vec![Label::OnTime; 3];
        let err = LogisticRegression::fit(&features, &labels, &[1.0; 3], &SolverConfig::default())
            .unwrap_err();
        assert!(matches!(err, DelayError::Classifier(_)));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let features = vec![FeatureVector::default(); 3];
        let labels = vec![Label::OnTime, Label::Delayed];
        let err = LogisticRegression::fit(&features, &labels, &[1.0; 2], &SolverConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[test]
    fn test_artifact_schema_check() {
        let (features, labels) = balanced_set();
        let weights = ClassBalancer::compute_weights(&labels).unwrap();
        let classifier = DelayClassifier::new(MemoryModelStore::new());
        let mut artifact = classifier.fit(&features, &labels, &weights).unwrap();
        assert!(artifact.check().is_ok());

        artifact.feature_columns.reverse();
        assert!(matches!(artifact.check(), Err(DelayError::Classifier(_))));
    }

    #[test]
    fn test_probabilities_agree_with_labels() {
        let (features, labels) = balanced_set();
        let weights = ClassBalancer::compute_weights(&labels).unwrap();
        let classifier = DelayClassifier::new(MemoryModelStore::new());
        let artifact = classifier.fit(&features, &labels, &weights).unwrap();

        for (p, l) in artifact
            .predict_proba(&features)
            .iter()
            .zip(artifact.predict(&features))
        {
            assert_eq!(*p > 0.5, l == Label::Delayed);
        }
        assert_eq!(artifact.coefficients_by_column().len(), FEATURE_COUNT);
    }

    #[test]
    fn test_solve() {
        let mut a = [[0.0; N_PARAMS]; N_PARAMS];
        let mut b = [0.0; N_PARAMS];
        for i in 0..N_PARAMS {
            a[i][i] = 2.0;
            b[i] = (i + 1) as f64;
        }
        a[0][1] = 1.0;
        let x = solve(a, b).unwrap();
        for i in 1..N_PARAMS {
            assert!((x[i] - (i + 1) as f64 / 2.0).abs() < 1e-12);
        }
        assert!((2.0 * x[0] + x[1] - 1.0).abs() < 1e-12);
    }
}
