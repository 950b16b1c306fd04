//! Flight record input schema and the fixed feature schema
//!
//! This module defines the raw flight record read from requests and datasets,
//! the ordered feature columns the classifier is trained on, and the adapter
//! that parses record batches from JSON and NDJSON.

mod adapter;
mod columns;
mod flight;

pub use adapter::*;
pub use columns::*;
pub use flight::*;
