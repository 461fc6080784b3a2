//! Successive halving: one bracket of the Hyperband schedule.

use std::sync::Arc;

use hb_types::{invalid_parameter, Bracket, ConfigEvaluation, HbError, HbResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn};

use crate::coordinator::evaluate_all;
use crate::executor::{SequentialExecutor, TaskExecutor};
use crate::objective::{ConfigSampler, LossEvaluator};
use crate::planner::BracketPlanner;
use crate::select::select_top_k;

/// What one bracket produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketOutcome<C> {
    pub bracket: Bracket,
    /// The surviving configuration of the last rung. `None` if the sampler
    /// returned no configurations.
    pub best: Option<ConfigEvaluation<C>>,
    /// Evaluator calls made.
    pub evaluations: usize,
    /// Sum of the resource requested across those calls.
    pub resource_allocated: f64,
}

/// Runs brackets against a sampler and an evaluator on an executor.
pub struct SuccessiveHalving<C> {
    sampler: Arc<dyn ConfigSampler<C>>,
    evaluator: Arc<dyn LossEvaluator<C>>,
    executor: Arc<dyn TaskExecutor>,
}

impl<C> SuccessiveHalving<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub fn new(
        sampler: Arc<dyn ConfigSampler<C>>,
        evaluator: Arc<dyn LossEvaluator<C>>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        Self {
            sampler,
            evaluator,
            executor,
        }
    }

    /// Run every rung of `bracket`.
    ///
    /// Each rung is a barrier: all of its evaluations finish before the cull,
    /// and the next rung only sees the survivors. Any evaluation failure
    /// aborts the bracket.
    pub fn run(&self, bracket: &Bracket) -> HbResult<BracketOutcome<C>> {
        let span = info_span!(
            "bracket",
            s = bracket.index,
            n = bracket.population,
            r = bracket.min_resource
        );
        let _enter = span.enter();

        let mut population = self.sampler.sample(bracket.population);
        let mut outcome = BracketOutcome {
            bracket: bracket.clone(),
            best: None,
            evaluations: 0,
            resource_allocated: 0.0,
        };
        if population.is_empty() {
            warn!(requested = bracket.population, "Sampler returned no configurations");
            return Ok(outcome);
        }
        if population.len() < bracket.population {
            warn!(
                requested = bracket.population,
                received = population.len(),
                "Sampler returned fewer configurations than requested"
            );
        }

        let mut losses = Vec::new();
        for rung in bracket.rungs() {
            losses = evaluate_all(&self.executor, &population, rung.resource, &self.evaluator)?;
            outcome.evaluations += population.len();
            outcome.resource_allocated += population.len() as f64 * rung.resource;

            if population.len() > 1 {
                let keep = rung.survivors(bracket.eta).min(population.len());
                (population, losses) = select_top_k(&population, &losses, keep)?;
            }

            debug!(
                rung = rung.index,
                resource = rung.resource,
                survivors = population.len(),
                best_loss = losses.first().copied(),
                "Rung complete"
            );
        }

        outcome.best = population
            .into_iter()
            .zip(losses)
            .next()
            .map(|(config, loss)| ConfigEvaluation::new(config, loss));
        Ok(outcome)
    }
}

/// Run a single standalone bracket of successive halving on the calling
/// thread, sampling `n` configurations with minimum resource `r`.
///
/// The number of rungs is `floor(log_eta(n)) + 1`. Fails with
/// [`HbError::NoResult`] if the sampler returns nothing.
pub fn run_bracket<C, S, E>(
    n: usize,
    r: f64,
    eta: f64,
    sampler: S,
    evaluator: E,
) -> HbResult<ConfigEvaluation<C>>
where
    C: Clone + Send + Sync + 'static,
    S: ConfigSampler<C> + 'static,
    E: LossEvaluator<C> + 'static,
{
    BracketPlanner::validate_eta(eta)?;
    if !r.is_finite() || r <= 0.0 {
        return Err(invalid_parameter!("r is {r:.2}, but it must be > 0"));
    }

    let halving = SuccessiveHalving::<C>::new(
        Arc::new(sampler),
        Arc::new(evaluator),
        Arc::new(SequentialExecutor),
    );
    halving
        .run(&Bracket::standalone(n, r, eta))?
        .best
        .ok_or(HbError::NoResult)
}
