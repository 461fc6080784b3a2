//! The Hyperband driver.

use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use hb_types::{Bracket, ConfigEvaluation, HbError, HbResult, Schedule};
use tracing::{error, info, info_span, warn, Span};
use uuid::Uuid;

use crate::aggregate::GlobalAggregator;
use crate::config::TunerConfig;
use crate::executor::{guarded, wait_for, SequentialExecutor, SlotYield, TaskExecutor};
use crate::halving::{BracketOutcome, SuccessiveHalving};
use crate::objective::{ConfigSampler, LossEvaluator};
use crate::planner::BracketPlanner;
use crate::pool::WorkerPool;
use crate::status::{TuningState, TuningStatus};

/// Hyperband over an opaque configuration type `C`.
///
/// Brackets are planned once at construction. Each call to [`Tuner::run`]
/// or [`Tuner::step_sequence`] is an independent run over that schedule.
pub struct Tuner<C> {
    id: Uuid,
    name: String,
    schedule: Schedule,
    halving: Arc<SuccessiveHalving<C>>,
    executor: Arc<dyn TaskExecutor>,
}

impl<C> Tuner<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Create a tuner. With no executor everything runs on the calling
    /// thread.
    ///
    /// Fails with [`HbError::InvalidParameter`] if `max_resource < 1` or
    /// `eta <= 0` (or `eta == 1`).
    pub fn new<S, E>(
        sampler: S,
        evaluator: E,
        max_resource: f64,
        eta: f64,
        executor: Option<Arc<dyn TaskExecutor>>,
    ) -> HbResult<Self>
    where
        S: ConfigSampler<C> + 'static,
        E: LossEvaluator<C> + 'static,
    {
        let schedule = BracketPlanner::plan(max_resource, eta)?;
        let executor: Arc<dyn TaskExecutor> =
            executor.unwrap_or_else(|| Arc::new(SequentialExecutor));
        let halving = SuccessiveHalving::<C>::new(
            Arc::new(sampler),
            Arc::new(evaluator),
            Arc::clone(&executor),
        );

        Ok(Self {
            id: Uuid::new_v4(),
            name: "hyperband".to_string(),
            schedule,
            halving: Arc::new(halving),
            executor,
        })
    }

    /// Create a tuner from a validated [`TunerConfig`], starting a worker
    /// pool if `workers` is set.
    pub fn from_config<S, E>(config: &TunerConfig, sampler: S, evaluator: E) -> HbResult<Self>
    where
        S: ConfigSampler<C> + 'static,
        E: LossEvaluator<C> + 'static,
    {
        config.validate()?;
        let executor: Arc<dyn TaskExecutor> = match config.workers {
            Some(slots) => Arc::new(WorkerPool::new(slots)?),
            None => Arc::new(SequentialExecutor),
        };

        let mut tuner = Self::new(
            sampler,
            evaluator,
            config.max_resource,
            config.eta,
            Some(executor),
        )?;
        tuner.id = config.id;
        if !config.name.is_empty() {
            tuner.name = config.name.clone();
        }
        Ok(tuner)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn executor(&self) -> &Arc<dyn TaskExecutor> {
        &self.executor
    }

    /// A lazy sequence yielding the best result so far after each bracket.
    pub fn step_sequence(&self) -> StepSequence<C> {
        let (sender, receiver) = unbounded();
        let pending: VecDeque<Bracket> = self.schedule.brackets.iter().cloned().collect();
        let window = if self.executor.runs_inline() {
            1
        } else {
            pending.len().max(1)
        };

        StepSequence {
            halving: Arc::clone(&self.halving),
            executor: Arc::clone(&self.executor),
            pending,
            window,
            in_flight: 0,
            sender,
            receiver,
            aggregator: GlobalAggregator::new(),
            status: TuningStatus::new(self.id, self.name.clone(), self.schedule.len()),
            span: info_span!("hyperband", run_id = %self.id, name = %self.name),
            finished: false,
        }
    }

    /// Run the whole schedule and return the best configuration.
    pub fn run(&self) -> HbResult<ConfigEvaluation<C>> {
        self.run_with_status().0
    }

    /// Like [`Tuner::run`], also returning the final run status.
    pub fn run_with_status(&self) -> (HbResult<ConfigEvaluation<C>>, TuningStatus) {
        let mut steps = self.step_sequence();
        let mut best = None;
        let mut failure = None;
        for step in steps.by_ref() {
            match step {
                Ok(evaluation) => best = Some(evaluation),
                Err(e) => failure = Some(e),
            }
        }

        let status = steps.status().clone();
        let result = match (failure, best) {
            (Some(e), _) => Err(e),
            (None, Some(best)) => Ok(best),
            (None, None) => Err(HbError::NoResult),
        };
        (result, status)
    }
}

type Completion<C> = HbResult<BracketOutcome<C>>;

/// Best-so-far after each completed bracket.
///
/// Single pass: once exhausted (or after the first error) it only returns
/// `None`. Start a new run with [`Tuner::step_sequence`] to go again.
///
/// With an inline executor each call to `next` runs exactly one bracket.
/// With a worker pool every bracket is submitted on the first call and
/// results are reported in completion order.
pub struct StepSequence<C> {
    halving: Arc<SuccessiveHalving<C>>,
    executor: Arc<dyn TaskExecutor>,
    pending: VecDeque<Bracket>,
    window: usize,
    in_flight: usize,
    sender: Sender<Completion<C>>,
    receiver: Receiver<Completion<C>>,
    aggregator: GlobalAggregator<C>,
    status: TuningStatus,
    span: Span,
    finished: bool,
}

impl<C> StepSequence<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub fn status(&self) -> &TuningStatus {
        &self.status
    }

    pub fn best(&self) -> Option<&ConfigEvaluation<C>> {
        self.aggregator.best()
    }

    fn dispatch(&mut self) -> HbResult<()> {
        while self.in_flight < self.window {
            let Some(bracket) = self.pending.pop_front() else {
                break;
            };
            let halving = Arc::clone(&self.halving);
            let sender = self.sender.clone();
            let span = self.span.clone();
            self.executor.spawn(Box::new(move || {
                let _enter = span.enter();
                let outcome = guarded(|| halving.run(&bracket));
                // The sequence may have been dropped after an earlier failure.
                let _ = sender.send(outcome);
            }))?;
            self.in_flight += 1;
        }
        Ok(())
    }

    fn fail(&mut self, e: HbError) -> HbError {
        error!(error = %e, "Tuning run failed");
        self.status.mark_failed(e.to_string());
        self.finished = true;
        e
    }

    fn finish(&mut self) {
        self.finished = true;
        match self.aggregator.best() {
            Some(best) => {
                self.status.mark_completed();
                info!(
                    best_loss = best.loss,
                    brackets = self.status.brackets_completed,
                    evaluations = self.status.evaluations,
                    resource = self.status.resource_allocated,
                    "Tuning run completed"
                );
            }
            None => {
                warn!("Tuning run finished without evaluating any configuration");
                self.status.mark_failed(HbError::NoResult.to_string());
            }
        }
    }
}

impl<C> Iterator for StepSequence<C>
where
    C: Clone + Send + Sync + 'static,
{
    type Item = HbResult<ConfigEvaluation<C>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        if self.status.state == TuningState::Pending {
            self.status.mark_running();
            info!(
                brackets = self.status.brackets_total,
                executor = self.executor.name(),
                concurrency = self.executor.concurrency(),
                "Tuning run started"
            );
        }

        loop {
            if let Err(e) = self.dispatch() {
                return Some(Err(self.fail(e)));
            }
            if self.in_flight == 0 {
                self.finish();
                return None;
            }

            let completion = {
                // Consuming from inside a pool task must not pin a slot.
                let _yielded = SlotYield::new(self.executor.as_ref());
                wait_for(self.executor.as_ref(), &self.receiver)
            };
            self.in_flight -= 1;

            let outcome = match completion {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => return Some(Err(self.fail(e))),
                Err(e) => return Some(Err(self.fail(e.into()))),
            };

            let winner_loss = outcome.best.as_ref().map(|best| best.loss);
            self.status
                .record_bracket(outcome.evaluations, outcome.resource_allocated, winner_loss);
            info!(
                s = outcome.bracket.index,
                evaluations = outcome.evaluations,
                winner_loss,
                completed = self.status.brackets_completed,
                "Bracket completed"
            );

            if let Some(winner) = outcome.best {
                self.aggregator.offer(winner);
            }
            if let Some(best) = self.aggregator.best() {
                return Some(Ok(best.clone()));
            }
        }
    }
}

impl<C> FusedIterator for StepSequence<C> where C: Clone + Send + Sync + 'static {}
