//! Bracket and rung arithmetic shared by the planner and the halving loop.

use serde::{Deserialize, Serialize};

/// Values within this distance of an integer are treated as that integer
/// before flooring or ceiling, so `log_3(81)` is 4 and not 3.9999999999999996.
pub const INTEGER_TOLERANCE: f64 = 1e-9;

/// `floor(value)`, snapping to the nearest integer first if it is within
/// [`INTEGER_TOLERANCE`].
pub fn snapped_floor(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < INTEGER_TOLERANCE {
        nearest
    } else {
        value.floor()
    }
}

/// `ceil(value)`, snapping to the nearest integer first if it is within
/// [`INTEGER_TOLERANCE`].
pub fn snapped_ceil(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < INTEGER_TOLERANCE {
        nearest
    } else {
        value.ceil()
    }
}

/// `floor(log_base(value))`.
pub fn floor_log(value: f64, base: f64) -> f64 {
    snapped_floor(value.log(base))
}

/// One successive-halving run of the Hyperband schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    /// Bracket index `s`; the bracket has `s + 1` rungs.
    pub index: u32,
    /// Initial number of configurations `n`.
    pub population: usize,
    /// Resource given to every configuration in the first rung, `r`.
    pub min_resource: f64,
    /// Culling factor.
    pub eta: f64,
}

impl Bracket {
    pub fn new(index: u32, population: usize, min_resource: f64, eta: f64) -> Self {
        Self {
            index,
            population,
            min_resource,
            eta,
        }
    }

    /// A bracket that is not part of a Hyperband schedule. The rung count is
    /// derived from the population: `s = floor(log_eta(n))`.
    pub fn standalone(population: usize, min_resource: f64, eta: f64) -> Self {
        let index = if population > 1 {
            floor_log(population as f64, eta).max(0.0) as u32
        } else {
            0
        };
        Self::new(index, population, min_resource, eta)
    }

    /// Number of rungs (`s + 1`).
    pub fn rung_count(&self) -> usize {
        self.index as usize + 1
    }

    /// The rungs of this bracket, in execution order.
    pub fn rungs(&self) -> impl Iterator<Item = Rung> + '_ {
        (0..=self.index).map(move |i| Rung {
            index: i,
            population: snapped_floor(self.population as f64 / self.eta.powi(i as i32)) as usize,
            resource: self.min_resource * self.eta.powi(i as i32),
        })
    }

    /// Total resource the schedule nominally allocates to this bracket
    /// (`sum n_i * r_i`).
    pub fn total_resource(&self) -> f64 {
        self.rungs()
            .map(|rung| rung.population as f64 * rung.resource)
            .sum()
    }
}

/// One round of a bracket: a population evaluated at one resource level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rung {
    pub index: u32,
    /// Nominal population size `n_i`.
    pub population: usize,
    /// Resource per evaluation `r_i`.
    pub resource: f64,
}

impl Rung {
    /// How many configurations survive this rung: `max(1, floor(n_i / eta))`.
    pub fn survivors(&self, eta: f64) -> usize {
        let kept = snapped_floor(self.population as f64 / eta);
        if kept >= 1.0 {
            kept as usize
        } else {
            1
        }
    }
}

/// The fixed Hyperband schedule derived from `(R, eta)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Maximum resource per configuration, `R`.
    pub max_resource: f64,
    pub eta: f64,
    /// `floor(log_eta(R))`; negative when the schedule is empty.
    pub s_max: i64,
    /// Nominal per-bracket budget, `B = (s_max + 1) * R`.
    pub budget: f64,
    /// Brackets in descending `s` order.
    pub brackets: Vec<Bracket>,
}

impl Schedule {
    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn total_resource(&self) -> f64 {
        self.brackets.iter().map(Bracket::total_resource).sum()
    }
}
