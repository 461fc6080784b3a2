//! Tuning run configuration.

use chrono::{DateTime, Utc};
use hb_types::{invalid_parameter, HbResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::planner::BracketPlanner;

fn default_eta() -> f64 {
    3.0
}

/// Top-level configuration for a tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerConfig {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[serde(default)]
    pub name: String,

    /// Maximum resource allocated to any single configuration (`R`).
    pub max_resource: f64,

    /// Culling factor. 3 or 4 are typical; the theoretical optimum is `e`.
    #[serde(default = "default_eta")]
    pub eta: f64,

    /// Worker slots for parallel execution. `None` runs everything on the
    /// calling thread.
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TunerConfig {
    pub fn new(name: impl Into<String>, max_resource: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            max_resource,
            eta: default_eta(),
            workers: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_eta(mut self, eta: f64) -> Self {
        self.eta = eta;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn validate(&self) -> HbResult<()> {
        BracketPlanner::validate(self.max_resource, self.eta)?;
        if self.workers == Some(0) {
            return Err(invalid_parameter!("workers is 0, but it must be >= 1"));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> HbResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> HbResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::HbError;
    use std::io::Write;

    #[test]
    fn builder_chain() {
        let config = TunerConfig::new("resnet-sweep", 81.0).with_eta(4.0).with_workers(8);
        assert_eq!(config.name, "resnet-sweep");
        assert_eq!(config.max_resource, 81.0);
        assert_eq!(config.eta, 4.0);
        assert_eq!(config.workers, Some(8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let config = TunerConfig::from_json_str(r#"{"max_resource": 27.0}"#).unwrap();
        assert_eq!(config.eta, 3.0);
        assert_eq!(config.workers, None);
        assert!(config.name.is_empty());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = TunerConfig::from_json_str(r#"{"max_resource": 0.5}"#).unwrap_err();
        assert!(matches!(err, HbError::InvalidParameter(_)));

        let err = TunerConfig::from_json_str(r#"{"max_resource": 81, "eta": -1}"#).unwrap_err();
        assert!(matches!(err, HbError::InvalidParameter(_)));

        let err = TunerConfig::new("x", 81.0).with_workers(0).validate().unwrap_err();
        assert!(matches!(err, HbError::InvalidParameter(_)));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = TunerConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, HbError::Serialization(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name": "from-file", "max_resource": 9, "eta": 3, "workers": 2}}"#
        )
        .unwrap();

        let config = TunerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.max_resource, 9.0);
        assert_eq!(config.workers, Some(2));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = TunerConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, HbError::Io(_)));
    }
}
