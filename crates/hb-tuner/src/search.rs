//! Search spaces and random configuration sampling.

use hb_types::{invalid_argument, HbResult};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::objective::ConfigSampler;

/// One sampled configuration, keyed by dimension name.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// How a single hyperparameter is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dimension {
    /// Uniform on `[low, high]`.
    Uniform { low: f64, high: f64 },
    /// Uniform in log space; both bounds must be positive.
    LogUniform { low: f64, high: f64 },
    /// Uniform integer on `[low, high]`.
    Integer { low: i64, high: i64 },
    Categorical { choices: Vec<serde_json::Value> },
}

impl Dimension {
    fn check(&self, name: &str) -> HbResult<()> {
        let ok = match self {
            Self::Uniform { low, high } => low.is_finite() && high.is_finite() && low <= high,
            Self::LogUniform { low, high } => {
                low.is_finite() && high.is_finite() && *low > 0.0 && low <= high
            }
            Self::Integer { low, high } => low <= high,
            Self::Categorical { choices } => !choices.is_empty(),
        };
        if ok {
            Ok(())
        } else {
            Err(invalid_argument!("dimension {name} cannot be sampled: {:?}", self))
        }
    }

    fn draw(&self, rng: &mut StdRng) -> Option<ParamValue> {
        let value = match self {
            Self::Uniform { low, high } => ParamValue::Real(rng.random_range(*low..=*high)),
            Self::LogUniform { low, high } => {
                let exponent: f64 = rng.random_range(low.ln()..=high.ln());
                ParamValue::Real(exponent.exp().clamp(*low, *high))
            }
            Self::Integer { low, high } => ParamValue::Integer(rng.random_range(*low..=*high)),
            Self::Categorical { choices } => ParamValue::Category(choices.choose(rng)?.clone()),
        };
        Some(value)
    }
}

/// A sampled hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Real(f64),
    Category(serde_json::Value),
}

impl ParamValue {
    /// Numeric view; categories only if they hold a JSON number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            Self::Category(v) => v.as_f64(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Category(serde_json::Value::String(s)) => f.write_str(s),
            Self::Category(v) => write!(f, "{v}"),
        }
    }
}

/// Named dimensions, kept in name order so seeded draws are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    dimensions: BTreeMap<String, Dimension>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a dimension.
    pub fn with_dimension(mut self, name: impl Into<String>, dimension: Dimension) -> Self {
        self.dimensions.insert(name.into(), dimension);
        self
    }

    pub fn uniform(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.with_dimension(name, Dimension::Uniform { low, high })
    }

    pub fn log_uniform(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.with_dimension(name, Dimension::LogUniform { low, high })
    }

    pub fn integer(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.with_dimension(name, Dimension::Integer { low, high })
    }

    pub fn categorical(self, name: impl Into<String>, choices: Vec<serde_json::Value>) -> Self {
        self.with_dimension(name, Dimension::Categorical { choices })
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.get(name)
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Check that every dimension can be sampled.
    pub fn validate(&self) -> HbResult<()> {
        self.dimensions
            .iter()
            .try_for_each(|(name, dimension)| dimension.check(name))
    }
}

/// Independent random draws from a [`SearchSpace`].
///
/// The generator sits behind a mutex so one sampler can serve brackets
/// running on different threads.
#[derive(Debug)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: Mutex<StdRng>,
}

impl RandomSearch {
    pub fn new(space: SearchSpace) -> HbResult<Self> {
        Self::with_rng(space, StdRng::from_rng(&mut rand::rng()))
    }

    /// A sampler with a reproducible sequence.
    pub fn with_seed(space: SearchSpace, seed: u64) -> HbResult<Self> {
        Self::with_rng(space, StdRng::seed_from_u64(seed))
    }

    fn with_rng(space: SearchSpace, rng: StdRng) -> HbResult<Self> {
        space.validate()?;
        Ok(Self {
            space,
            rng: Mutex::new(rng),
        })
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }
}

impl ConfigSampler<ParamSet> for RandomSearch {
    fn sample(&self, count: usize) -> Vec<ParamSet> {
        let mut rng = self.rng.lock();
        (0..count)
            .map(|_| {
                self.space
                    .dimensions
                    .iter()
                    .filter_map(|(name, dimension)| {
                        Some((name.clone(), dimension.draw(&mut rng)?))
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::HbError;
    use serde_json::json;

    fn network_space() -> SearchSpace {
        SearchSpace::new()
            .integer("layers", 2, 8)
            .uniform("dropout", 0.0, 0.5)
            .log_uniform("learning_rate", 1e-5, 1e-1)
    }

    #[test]
    fn draws_stay_within_bounds() {
        let sampler = RandomSearch::new(network_space()).unwrap();
        let configs = sampler.sample(200);
        assert_eq!(configs.len(), 200);

        for config in &configs {
            assert!(matches!(config["layers"], ParamValue::Integer(v) if (2..=8).contains(&v)));
            assert!(matches!(config["dropout"], ParamValue::Real(v) if (0.0..=0.5).contains(&v)));
            assert!(
                matches!(config["learning_rate"], ParamValue::Real(v) if (1e-5..=1e-1).contains(&v))
            );
        }
    }

    #[test]
    fn categorical_draws_come_from_choices() {
        let space = SearchSpace::new().categorical("optimizer", vec![json!("sgd"), json!("adam")]);
        let sampler = RandomSearch::with_seed(space, 3).unwrap();
        let seen: std::collections::BTreeSet<String> = sampler
            .sample(50)
            .iter()
            .map(|config| config["optimizer"].to_string())
            .collect();
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec!["adam", "sgd"]);
    }

    #[test]
    fn same_seed_same_configs() {
        let a = RandomSearch::with_seed(network_space(), 7).unwrap();
        let b = RandomSearch::with_seed(network_space(), 7).unwrap();
        assert_eq!(a.sample(10), b.sample(10));
    }

    #[test]
    fn zero_count_is_empty() {
        let sampler = RandomSearch::new(network_space()).unwrap();
        assert!(sampler.sample(0).is_empty());
    }

    #[test]
    fn unsampleable_dimensions_are_rejected() {
        let spaces = [
            SearchSpace::new().integer("a", 5, 1),
            SearchSpace::new().uniform("b", 1.0, f64::INFINITY),
            SearchSpace::new().log_uniform("c", 0.0, 1.0),
            SearchSpace::new().categorical("d", vec![]),
        ];
        for space in spaces {
            let err = RandomSearch::new(space).unwrap_err();
            assert!(matches!(err, HbError::InvalidArgument(_)));
        }
    }

    #[test]
    fn space_reads_from_tagged_json() {
        let space: SearchSpace = serde_json::from_value(json!({
            "rho": {"kind": "uniform", "low": -100.0, "high": 100.0},
            "width": {"kind": "integer", "low": 16, "high": 512},
        }))
        .unwrap();
        assert_eq!(space.len(), 2);
        assert_eq!(space.dimension("width"), Some(&Dimension::Integer { low: 16, high: 512 }));
        assert!(space.validate().is_ok());
    }

    #[test]
    fn values_display_and_convert() {
        assert_eq!(ParamValue::Integer(3).to_string(), "3");
        assert_eq!(ParamValue::Category(json!("adam")).to_string(), "adam");
        assert_eq!(ParamValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(ParamValue::Category(json!("adam")).as_f64(), None);
    }
}
