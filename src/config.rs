//! Runtime configuration
//!
//! Settings are read from an optional config file, then overridden by
//! `DELAY_*` environment variables (e.g. `DELAY_MODEL_PATH`).

use crate::classifier::SolverConfig;
use crate::error::DelayError;
use crate::labels::DEFAULT_DELAY_THRESHOLD_MINUTES;
use crate::store::DEFAULT_MODEL_FILE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DELAY";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Where the model artifact is stored
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Minutes past schedule after which a flight counts as delayed
    #[serde(default = "default_delay_threshold")]
    pub delay_threshold_minutes: f64,

    /// Inverse L2 regularization strength
    #[serde(default = "default_regularization")]
    pub regularization: f64,

    /// Maximum solver iterations
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Solver gradient tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_FILE)
}

fn default_delay_threshold() -> f64 {
    DEFAULT_DELAY_THRESHOLD_MINUTES
}

fn default_regularization() -> f64 {
    SolverConfig::default().regularization
}

fn default_max_iter() -> usize {
    SolverConfig::default().max_iter
}

fn default_tolerance() -> f64 {
    SolverConfig::default().tolerance
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            delay_threshold_minutes: default_delay_threshold(),
            regularization: default_regularization(),
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
        }
    }
}

impl DelayConfig {
    /// Load from an optional file, with environment overrides on top
    pub fn load_from(file: Option<&Path>) -> Result<Self, DelayError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: DelayConfig = settings.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    pub fn solver(&self) -> SolverConfig {
        SolverConfig {
            regularization: self.regularization,
            max_iter: self.max_iter,
            tolerance: self.tolerance,
        }
    }

    fn check(&self) -> Result<(), DelayError> {
        if !(self.regularization > 0.0 && self.regularization.is_finite()) {
            return Err(DelayError::Config(config::ConfigError::Message(format!(
                "regularization must be positive, got {}",
                self.regularization
            ))));
        }
        if !(self.tolerance > 0.0) {
            return Err(DelayError::Config(config::ConfigError::Message(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            ))));
        }
        if !self.delay_threshold_minutes.is_finite() {
            return Err(DelayError::Config(config::ConfigError::Message(
                "delay_threshold_minutes must be finite".to_string(),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use std::fs;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    // Every test that loads settings reads the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets `DELAY_*` variables for one test and removes them on drop
    struct EnvVars {
        names: Vec<&'static str>,
        _guard: MutexGuard<'static, ()>,
    }

    impl EnvVars {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            for (name, value) in vars {
                env::set_var(name, value);
            }
            Self {
                names: vars.iter().map(|(name, _)| *name).collect(),
                _guard: guard,
            }
        }
    }

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for name in &self.names {
                env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = DelayConfig::default();
        assert_eq!(config.model_path, PathBuf::from("flight_delay_logreg_model.json"));
        assert_eq!(config.delay_threshold_minutes, 15.0);
        assert_eq!(config.solver(), SolverConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let _env = EnvVars::set(&[]);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("delay.toml");
        fs::write(
            &path,
            "model_path = \"/tmp/models/delay.json\"\nmax_iter = 250\n",
        )
        .unwrap();

        let config = DelayConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/tmp/models/delay.json"));
        assert_eq!(config.max_iter, 250);
        assert_eq!(config.regularization, 1.0);
    }

    #[test]
    fn test_rejects_non_positive_regularization() {
        let _env = EnvVars::set(&[]);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("delay.json");
        fs::write(&path, r#"{"regularization": 0.0}"#).unwrap();

        assert!(matches!(
            DelayConfig::load_from(Some(&path)),
            Err(DelayError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let _env = EnvVars::set(&[]);
        let dir = TempDir::new().unwrap();
        assert!(DelayConfig::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_environment_only() {
        let _env = EnvVars::set(&[
            ("DELAY_MODEL_PATH", "/tmp/delay-env/model.json"),
            ("DELAY_DELAY_THRESHOLD_MINUTES", "20"),
            ("DELAY_MAX_ITER", "7"),
        ]);

        let config = DelayConfig::load_from(None).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/tmp/delay-env/model.json"));
        assert_eq!(config.delay_threshold_minutes, 20.0);
        assert_eq!(config.max_iter, 7);
        assert_eq!(config.tolerance, 1e-4);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("delay.toml");
        fs::write(
            &path,
            "model_path = \"/srv/file.json\"\nmax_iter = 250\nregularization = 0.5\n",
        )
        .unwrap();

        let _env = EnvVars::set(&[
            ("DELAY_MAX_ITER", "40"),
            ("DELAY_DELAY_THRESHOLD_MINUTES", "30.5"),
        ]);

        let config = DelayConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.max_iter, 40);
        assert_eq!(config.delay_threshold_minutes, 30.5);
        assert_eq!(config.model_path, PathBuf::from("/srv/file.json"));
        assert_eq!(config.regularization, 0.5);
    }

    #[test]
    fn test_invalid_environment_value_rejected() {
        let _env = EnvVars::set(&[("DELAY_TOLERANCE", "-1")]);
        assert!(matches!(
            DelayConfig::load_from(None),
            Err(DelayError::Config(_))
        ));
    }
}
