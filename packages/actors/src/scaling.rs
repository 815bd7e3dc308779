//! The scaling decision made on every check.

use pool_core::ScalingAction;
use serde::{Deserialize, Serialize};

/// Utilization thresholds, as a fraction of one CPU core.
///
/// Below `grow_below` the pool may add a processor when work is waiting; at or
/// above `shrink_above` it sheds an idle one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingPolicy {
    pub grow_below: f64,
    pub shrink_above: f64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            grow_below: 0.5,
            shrink_above: 0.8,
        }
    }
}

/// Inputs to one scaling decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingInput {
    /// Live processors.
    pub current: usize,
    pub min: usize,
    pub max: usize,
    pub utilization: f64,
    /// Pending jobs across the pool's queues.
    pub backlog: u64,
    /// Whether any live processor is idle.
    pub has_idle: bool,
}

impl ScalingPolicy {
    pub fn new(grow_below: f64, shrink_above: f64) -> Self {
        Self {
            grow_below,
            shrink_above,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !(self.grow_below > 0.0 && self.grow_below <= self.shrink_above) {
            return Err(format!(
                "scaling thresholds must satisfy 0 < grow_below <= shrink_above (got {} and {})",
                self.grow_below, self.shrink_above
            ));
        }
        Ok(())
    }

    /// Pick at most one step for this check.
    pub fn decide(&self, input: ScalingInput) -> ScalingAction {
        let ScalingInput {
            current,
            min,
            max,
            utilization,
            backlog,
            has_idle,
        } = input;

        if current < min {
            return ScalingAction::Grow;
        }

        if utilization >= self.shrink_above {
            return if current > min && has_idle {
                ScalingAction::Shrink
            } else {
                ScalingAction::Hold
            };
        }

        if utilization < self.grow_below && backlog > 0 && current < max {
            return ScalingAction::Grow;
        }

        if backlog == 0 && current > min && has_idle {
            return ScalingAction::Shrink;
        }

        ScalingAction::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(current: usize, utilization: f64, backlog: u64, has_idle: bool) -> ScalingInput {
        ScalingInput {
            current,
            min: 1,
            max: 5,
            utilization,
            backlog,
            has_idle,
        }
    }

    #[test]
    fn grows_below_min_regardless_of_load() {
        let policy = ScalingPolicy::default();
        assert_eq!(policy.decide(input(0, 1.0, 0, false)), ScalingAction::Grow);
    }

    #[test]
    fn grows_under_low_load_with_backlog() {
        let policy = ScalingPolicy::default();
        assert_eq!(policy.decide(input(1, 0.1, 10, false)), ScalingAction::Grow);
        assert_eq!(policy.decide(input(4, 0.49, 1, true)), ScalingAction::Grow);
    }

    #[test]
    fn never_grows_past_max() {
        let policy = ScalingPolicy::default();
        assert_eq!(policy.decide(input(5, 0.0, 100, false)), ScalingAction::Hold);
    }

    #[test]
    fn sheds_idle_processor_under_high_load() {
        let policy = ScalingPolicy::default();
        assert_eq!(policy.decide(input(3, 0.9, 10, true)), ScalingAction::Shrink);
        // Nothing idle to remove.
        assert_eq!(policy.decide(input(3, 0.9, 10, false)), ScalingAction::Hold);
        // Already at min.
        assert_eq!(policy.decide(input(1, 0.9, 10, true)), ScalingAction::Hold);
    }

    #[test]
    fn shrinks_when_queue_drains() {
        let policy = ScalingPolicy::default();
        assert_eq!(policy.decide(input(3, 0.1, 0, true)), ScalingAction::Shrink);
        assert_eq!(policy.decide(input(1, 0.1, 0, true)), ScalingAction::Hold);
    }

    #[test]
    fn holds_in_the_middle_band() {
        let policy = ScalingPolicy::default();
        assert_eq!(policy.decide(input(2, 0.6, 10, true)), ScalingAction::Hold);
    }

    #[test]
    fn result_stays_within_bounds() {
        let policy = ScalingPolicy::default();
        for current in 1..=5 {
            for utilization in [0.0, 0.3, 0.5, 0.7, 0.8, 1.0] {
                for backlog in [0, 1, 50] {
                    for has_idle in [false, true] {
                        let next = match policy.decide(input(current, utilization, backlog, has_idle)) {
                            ScalingAction::Grow => current + 1,
                            ScalingAction::Shrink => current - 1,
                            ScalingAction::Hold => current,
                        };
                        assert!((1..=5).contains(&next));
                    }
                }
            }
        }
    }

    #[test]
    fn rejects_inverted_thresholds() {
        assert!(ScalingPolicy::new(0.9, 0.5).validate().is_err());
        assert!(ScalingPolicy::new(0.0, 0.5).validate().is_err());
        assert!(ScalingPolicy::default().validate().is_ok());
    }
}
