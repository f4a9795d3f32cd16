//! National intervention levels and the escalation rule that moves a country between them.
//!
//! A country starts out `Free`. Once per day, after its cities have been stepped, the share of
//! its population that is infected is compared against the government action threshold `g`:
//! above `g` the order becomes at least `Recommended`, above `2g` it becomes `Mandatory`. Orders
//! never relax within a run.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Severity-ordered, so `PolicyOrder::Free < PolicyOrder::Mandatory`.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOrder {
    #[default]
    Free,
    Recommended,
    Mandatory,
}

impl PolicyOrder {
    /// Fraction of contacts removed under this order.
    #[must_use]
    pub fn distancing_reduction(self, percent_social_distancing: f64) -> f64 {
        match self {
            PolicyOrder::Free => 0.0,
            PolicyOrder::Recommended => percent_social_distancing * 0.5,
            PolicyOrder::Mandatory => percent_social_distancing,
        }
    }

    /// The order an infected fraction calls for, ignoring history.
    #[must_use]
    pub fn target(infected_fraction: f64, government_action_timing: f64) -> PolicyOrder {
        if infected_fraction > 2.0 * government_action_timing {
            PolicyOrder::Mandatory
        } else if infected_fraction > government_action_timing {
            PolicyOrder::Recommended
        } else {
            PolicyOrder::Free
        }
    }

    /// Applies one day's transition. A country with no population is excluded from the
    /// threshold computation and keeps its current order.
    #[must_use]
    pub fn escalate(
        self,
        infected: u64,
        population: u64,
        government_action_timing: f64,
    ) -> PolicyOrder {
        if population == 0 {
            return self;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = infected as f64 / population as f64;
        self.max(PolicyOrder::target(fraction, government_action_timing))
    }
}

impl Display for PolicyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyOrder::Free => write!(f, "free"),
            PolicyOrder::Recommended => write!(f, "recommended"),
            PolicyOrder::Mandatory => write!(f, "mandatory"),
        }
    }
}
