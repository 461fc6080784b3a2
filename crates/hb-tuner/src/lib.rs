//! # hb-tuner
//!
//! Bandit-based hyperparameter search (Hyperband) for opaque configurations.
//!
//! Provides the bracket planner, top-k culling, the successive-halving loop,
//! sequential and worker-pool executors with nested submission, result
//! aggregation, and a random search-space sampler.

mod aggregate;
mod config;
mod coordinator;
mod executor;
mod halving;
mod objective;
mod planner;
mod pool;
mod search;
mod select;
mod status;
mod tuner;

pub use aggregate::{aggregate, GlobalAggregator};
pub use config::TunerConfig;
pub use coordinator::evaluate_all;
pub use executor::{
    gather, submit, Assist, Job, SequentialExecutor, SlotYield, TaskExecutor, TaskHandle,
};
pub use halving::{run_bracket, BracketOutcome, SuccessiveHalving};
pub use objective::{ConfigSampler, LossEvaluator};
pub use planner::BracketPlanner;
pub use pool::WorkerPool;
pub use search::{Dimension, ParamSet, ParamValue, RandomSearch, SearchSpace};
pub use select::select_top_k;
pub use status::{TuningState, TuningStatus};
pub use tuner::{StepSequence, Tuner};

pub use hb_types::{Bracket, ConfigEvaluation, ExecutorError, HbError, HbResult, Rung, Schedule};
