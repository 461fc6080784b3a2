//! Combining bracket winners into one result.

use hb_types::{ConfigEvaluation, HbError, HbResult};

/// Tracks the best evaluation seen so far. The best is only replaced by a
/// strictly lower loss, so the first of several equal losses wins.
#[derive(Debug, Clone)]
pub struct GlobalAggregator<C> {
    best: Option<ConfigEvaluation<C>>,
    offered: usize,
}

impl<C> GlobalAggregator<C> {
    pub fn new() -> Self {
        Self {
            best: None,
            offered: 0,
        }
    }

    /// Offer a bracket winner. Returns `true` if it became the new best.
    pub fn offer(&mut self, candidate: ConfigEvaluation<C>) -> bool {
        self.offered += 1;
        let improved = match &self.best {
            None => true,
            Some(current) => candidate.improves_on(current),
        };
        if improved {
            self.best = Some(candidate);
        }
        improved
    }

    pub fn best(&self) -> Option<&ConfigEvaluation<C>> {
        self.best.as_ref()
    }

    /// Number of candidates offered so far.
    pub fn offered(&self) -> usize {
        self.offered
    }

    pub fn into_best(self) -> HbResult<ConfigEvaluation<C>> {
        self.best.ok_or(HbError::NoResult)
    }
}

impl<C> Default for GlobalAggregator<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// The lowest-loss evaluation in `results`, or [`HbError::NoResult`] if
/// there are none.
pub fn aggregate<C, I>(results: I) -> HbResult<ConfigEvaluation<C>>
where
    I: IntoIterator<Item = ConfigEvaluation<C>>,
{
    let mut aggregator = GlobalAggregator::new();
    for result in results {
        aggregator.offer(result);
    }
    aggregator.into_best()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_minimum_loss() {
        let best = aggregate(vec![
            ConfigEvaluation::new("a", 3.0),
            ConfigEvaluation::new("b", 0.5),
            ConfigEvaluation::new("c", 2.0),
        ])
        .unwrap();
        assert_eq!(best, ConfigEvaluation::new("b", 0.5));
    }

    #[test]
    fn empty_input_is_no_result() {
        let err = aggregate(Vec::<ConfigEvaluation<u8>>::new()).unwrap_err();
        assert!(matches!(err, HbError::NoResult));
    }

    #[test]
    fn best_only_moves_down() {
        let mut aggregator = GlobalAggregator::new();
        assert!(aggregator.offer(ConfigEvaluation::new(1, 2.0)));
        assert!(!aggregator.offer(ConfigEvaluation::new(2, 2.0)));
        assert!(!aggregator.offer(ConfigEvaluation::new(3, 5.0)));
        assert!(aggregator.offer(ConfigEvaluation::new(4, 1.0)));

        assert_eq!(aggregator.offered(), 4);
        assert_eq!(aggregator.best(), Some(&ConfigEvaluation::new(4, 1.0)));
    }
}
