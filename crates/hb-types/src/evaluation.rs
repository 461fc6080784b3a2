use serde::{Deserialize, Serialize};
use std::fmt;

/// The result of evaluating one configuration at one resource level.
///
/// The configuration is opaque; nothing in the tuner looks inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEvaluation<C> {
    pub config: C,
    pub loss: f64,
}

impl<C> ConfigEvaluation<C> {
    pub fn new(config: C, loss: f64) -> Self {
        Self { config, loss }
    }

    /// True if `self` has a strictly lower loss than `other`.
    pub fn improves_on(&self, other: &ConfigEvaluation<C>) -> bool {
        self.loss < other.loss
    }
}

impl<C: fmt::Display> fmt::Display for ConfigEvaluation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigEvaluation(config={}, loss={:.2})", self.config, self.loss)
    }
}
