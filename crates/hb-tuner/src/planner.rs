//! Hyperband bracket schedule.

use hb_types::{
    floor_log, invalid_parameter, snapped_ceil, Bracket, HbResult, Schedule,
};
use tracing::{debug, warn};

/// Computes the fixed bracket schedule for a maximum resource `R` and a
/// culling factor `eta`.
pub struct BracketPlanner;

impl BracketPlanner {
    /// Reject `R < 1`, `eta <= 0` and `eta == 1` (and NaN for either).
    pub fn validate(max_resource: f64, eta: f64) -> HbResult<()> {
        if !max_resource.is_finite() || max_resource < 1.0 {
            return Err(invalid_parameter!(
                "R is {max_resource:.2}, but it must be >= 1.0"
            ));
        }
        Self::validate_eta(eta)
    }

    /// Reject `eta <= 0`, `eta == 1` and NaN.
    pub fn validate_eta(eta: f64) -> HbResult<()> {
        if !eta.is_finite() || eta <= 0.0 {
            return Err(invalid_parameter!("eta is {eta:.2}, but it must be > 0"));
        }
        if eta == 1.0 {
            return Err(invalid_parameter!(
                "eta is 1.0; a culling factor of 1 never discards a configuration"
            ));
        }
        Ok(())
    }

    /// Build the schedule. Brackets come out in descending `s`.
    pub fn plan(max_resource: f64, eta: f64) -> HbResult<Schedule> {
        Self::validate(max_resource, eta)?;

        let s_max = floor_log(max_resource, eta) as i64;
        let budget = (s_max + 1) as f64 * max_resource;

        let brackets: Vec<Bracket> = (0..=s_max)
            .rev()
            .map(|s| {
                let exponent = s as i32;
                let population =
                    snapped_ceil(budget * eta.powi(exponent) / (max_resource * (s + 1) as f64));
                let min_resource = max_resource / eta.powi(exponent);
                Bracket::new(s as u32, population as usize, min_resource, eta)
            })
            .collect();

        if brackets.is_empty() {
            warn!(max_resource, eta, s_max, "Schedule has no brackets");
        } else {
            debug!(max_resource, eta, s_max, budget, brackets = brackets.len(), "Planned schedule");
        }

        Ok(Schedule {
            max_resource,
            eta,
            s_max,
            budget,
            brackets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::HbError;

    #[test]
    fn plans_reference_schedule() {
        let schedule = BracketPlanner::plan(81.0, 3.0).unwrap();
        assert_eq!(schedule.s_max, 4);
        assert_eq!(schedule.budget, 405.0);

        let triples: Vec<(u32, usize, f64)> = schedule
            .brackets
            .iter()
            .map(|b| (b.index, b.population, b.min_resource))
            .collect();
        assert_eq!(
            triples,
            vec![
                (4, 81, 1.0),
                (3, 34, 3.0),
                (2, 15, 9.0),
                (1, 8, 27.0),
                (0, 5, 81.0),
            ]
        );
    }

    #[test]
    fn last_rung_of_every_bracket_uses_full_resource() {
        let schedule = BracketPlanner::plan(81.0, 3.0).unwrap();
        for bracket in &schedule.brackets {
            let last = bracket.rungs().last().unwrap();
            assert!((last.resource - 81.0).abs() < 1e-9, "bracket {}", bracket.index);
        }
    }

    #[test]
    fn rejects_small_r() {
        let err = BracketPlanner::plan(0.5, 3.0).unwrap_err();
        assert!(matches!(err, HbError::InvalidParameter(_)));
    }

    #[test]
    fn rejects_non_positive_eta() {
        assert!(matches!(
            BracketPlanner::plan(81.0, 0.0),
            Err(HbError::InvalidParameter(_))
        ));
        assert!(matches!(
            BracketPlanner::plan(81.0, -2.0),
            Err(HbError::InvalidParameter(_))
        ));
        assert!(matches!(
            BracketPlanner::plan(81.0, 1.0),
            Err(HbError::InvalidParameter(_))
        ));
        assert!(matches!(
            BracketPlanner::plan(f64::NAN, 3.0),
            Err(HbError::InvalidParameter(_))
        ));
    }

    #[test]
    fn r_of_one_gives_single_bracket() {
        let schedule = BracketPlanner::plan(1.0, 3.0).unwrap();
        assert_eq!(schedule.s_max, 0);
        assert_eq!(schedule.budget, 1.0);
        assert_eq!(schedule.brackets, vec![Bracket::new(0, 1, 1.0, 3.0)]);
    }

    #[test]
    fn eta_below_one_gives_empty_schedule() {
        let schedule = BracketPlanner::plan(9.0, 0.5).unwrap();
        assert!(schedule.s_max < 0);
        assert!(schedule.is_empty());
    }

    #[test]
    fn s_max_two_gives_three_brackets() {
        let schedule = BracketPlanner::plan(9.0, 3.0).unwrap();
        assert_eq!(schedule.s_max, 2);
        assert_eq!(schedule.budget, 27.0);
        assert_eq!(schedule.len(), 3);
    }
}
