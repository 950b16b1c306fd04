//! Flight Delay - delay classification for scheduled flight legs
//!
//! Flight records are turned into a fixed set of ten one-hot indicator columns,
//! labeled from their scheduled and actual departure times, and used to fit a
//! class-weighted logistic regression: records → label derivation → feature
//! encoding → class balancing → fit → artifact store.
//!
//! Prediction requests are validated, encoded the same way, and scored against
//! the artifact currently held by the store.

pub mod balancer;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod types;
pub mod validator;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::{DelayClassifier, ModelArtifact, SolverConfig};
pub use config::DelayConfig;
pub use error::DelayError;
pub use pipeline::{predict_delays, train_delay_model, DelayModel};
pub use store::{FileModelStore, MemoryModelStore, ModelStore};
pub use types::{FeatureVector, Label, PredictionResponse};

// Schema exports
pub use schema::{FeatureColumn, FeatureSchema, FlightRecord, FlightType, RecordAdapter};

// Validation exports
pub use validator::{RequestValidator, ValidationError};

/// Library version recorded in CLI reports
pub const DELAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for CLI reports
pub const PRODUCER_NAME: &str = "flight-delay";
