//! Run lifecycle and progress bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state for a tuning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuningState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status of a tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningStatus {
    pub run_id: Uuid,
    pub name: String,
    pub state: TuningState,
    pub brackets_total: usize,
    pub brackets_completed: usize,
    pub evaluations: usize,
    pub resource_allocated: f64,
    pub best_loss: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TuningStatus {
    pub fn new(run_id: Uuid, name: impl Into<String>, brackets_total: usize) -> Self {
        Self {
            run_id,
            name: name.into(),
            state: TuningState::Pending,
            brackets_total,
            brackets_completed: 0,
            evaluations: 0,
            resource_allocated: 0.0,
            best_loss: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = TuningState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = TuningState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = TuningState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Fold in one finished bracket.
    pub fn record_bracket(
        &mut self,
        evaluations: usize,
        resource_allocated: f64,
        winner_loss: Option<f64>,
    ) {
        self.brackets_completed += 1;
        self.evaluations += evaluations;
        self.resource_allocated += resource_allocated;
        if let Some(loss) = winner_loss {
            if self.best_loss.map_or(true, |best| loss < best) {
                self.best_loss = Some(loss);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, TuningState::Completed | TuningState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lifecycle() {
        let mut status = TuningStatus::new(Uuid::new_v4(), "lifecycle", 5);

        assert_eq!(status.state, TuningState::Pending);
        assert!(status.started_at.is_none());

        status.mark_running();
        assert_eq!(status.state, TuningState::Running);
        assert!(status.started_at.is_some());
        assert!(!status.is_finished());

        status.mark_completed();
        assert_eq!(status.state, TuningState::Completed);
        assert!(status.finished_at.is_some());
        assert!(status.is_finished());
    }

    #[test]
    fn record_bracket_accumulates() {
        let mut status = TuningStatus::new(Uuid::new_v4(), "progress", 3);
        status.record_bracket(13, 27.0, Some(4.0));
        status.record_bracket(5, 15.0, Some(6.0));
        status.record_bracket(0, 0.0, None);

        assert_eq!(status.brackets_completed, 3);
        assert_eq!(status.evaluations, 18);
        assert_eq!(status.resource_allocated, 42.0);
        assert_eq!(status.best_loss, Some(4.0));
    }

    #[test]
    fn failure_keeps_message() {
        let mut status = TuningStatus::new(Uuid::new_v4(), "failing", 1);
        status.mark_running();
        status.mark_failed("evaluator panicked".into());
        assert_eq!(status.state, TuningState::Failed);
        assert_eq!(status.error.as_deref(), Some("evaluator panicked"));
    }
}
