//! Fan-out/fan-in of one rung's evaluations.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use hb_types::{HbError, HbResult};
use tracing::trace;

use crate::executor::{gather, panic_message, submit, TaskExecutor};
use crate::objective::LossEvaluator;

/// Evaluate every configuration at `resource` and return the losses in the
/// same order as `configs`.
///
/// Returns only once every evaluation has finished. On a worker pool each
/// evaluation is its own task and the caller's slot is released while it
/// waits; an inline executor evaluates one after another and stops at the
/// first failure.
pub fn evaluate_all<C>(
    executor: &Arc<dyn TaskExecutor>,
    configs: &[C],
    resource: f64,
    evaluator: &Arc<dyn LossEvaluator<C>>,
) -> HbResult<Vec<f64>>
where
    C: Clone + Send + Sync + 'static,
{
    if executor.runs_inline() {
        return configs
            .iter()
            .map(|config| evaluate_one(evaluator.as_ref(), config, resource))
            .collect();
    }

    let handles = configs
        .iter()
        .cloned()
        .map(|config| {
            let evaluator = Arc::clone(evaluator);
            submit(executor.as_ref(), move || {
                evaluate_one(evaluator.as_ref(), &config, resource)
            })
        })
        .collect::<HbResult<Vec<_>>>()?;

    trace!(tasks = handles.len(), resource, "Dispatched rung evaluations");
    gather(executor.as_ref(), handles)
}

/// One evaluator call. Errors, panics and non-finite losses all become
/// [`HbError::EvaluationFailed`].
pub(crate) fn evaluate_one<C>(
    evaluator: &dyn LossEvaluator<C>,
    config: &C,
    resource: f64,
) -> HbResult<f64> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(config, resource)));
    match outcome {
        Ok(Ok(loss)) if loss.is_finite() => Ok(loss),
        Ok(Ok(loss)) => Err(HbError::evaluation(
            resource,
            format!("evaluator returned non-finite loss {loss}"),
        )),
        Ok(Err(e)) => Err(HbError::evaluation(resource, format!("{e:#}"))),
        Err(payload) => Err(HbError::evaluation(
            resource,
            format!("evaluator panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}
