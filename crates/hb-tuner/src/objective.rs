//! Collaborator interfaces: where configurations come from and how they are scored.

/// Produces candidate configurations.
pub trait ConfigSampler<C>: Send + Sync {
    /// Return `count` freshly sampled configurations. Returning fewer is
    /// allowed; the bracket then works with what it got.
    fn sample(&self, count: usize) -> Vec<C>;
}

/// Trains/evaluates a configuration with a given amount of resource.
pub trait LossEvaluator<C>: Send + Sync {
    /// Validation loss after a fresh run at `resource`. Lower is better.
    fn evaluate(&self, config: &C, resource: f64) -> anyhow::Result<f64>;
}

impl<C, F> ConfigSampler<C> for F
where
    F: Fn(usize) -> Vec<C> + Send + Sync,
{
    fn sample(&self, count: usize) -> Vec<C> {
        self(count)
    }
}

impl<C, F> LossEvaluator<C> for F
where
    F: Fn(&C, f64) -> anyhow::Result<f64> + Send + Sync,
{
    fn evaluate(&self, config: &C, resource: f64) -> anyhow::Result<f64> {
        self(config, resource)
    }
}
