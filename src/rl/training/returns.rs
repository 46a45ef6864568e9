//! Target Returns
//!
//! Per-step return targets for one trajectory: a time-decayed bootstrap from
//! the last step's value prediction plus an index-scaled share of the profit.

use serde::{Deserialize, Serialize};

use crate::error::{A3cError, Result};
use crate::rl::core::Trade;

/// Return target for one non-terminal step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepTarget {
    /// Position of the step in the trade
    pub index: usize,
    /// `1 + ln(last_time - step_time)`
    pub time_decay: f64,
    /// `R_i = bootstrap * gamma^time_decay + index * profit_share`
    pub target: f64,
}

/// Equal per-step share of the realized profit
pub fn profit_share(trade: &Trade) -> f64 {
    if trade.is_empty() {
        0.0
    } else {
        trade.profit() / trade.len() as f64
    }
}

/// Targets for every step but the last, latest first.
///
/// The last step only anchors the bootstrap and gets no target. Trades with
/// fewer than two steps yield no targets.
pub fn target_returns(trade: &Trade, gamma: f64) -> Result<Vec<StepTarget>> {
    let steps = trade.steps();
    let Some(last) = steps.last() else {
        return Ok(Vec::new());
    };

    let r = profit_share(trade);
    let bootstrap = last.value_prediction as f64;

    let mut targets = Vec::with_capacity(steps.len() - 1);
    for (index, step) in steps.iter().enumerate().take(steps.len() - 1).rev() {
        let elapsed = last.time - step.time;
        if elapsed <= 0 {
            return Err(A3cError::InvalidTrajectory(format!(
                "step {index} at {} is not before the final step at {}",
                step.time, last.time
            )));
        }
        let time_decay = 1.0 + (elapsed as f64).ln();
        let target = bootstrap * gamma.powf(time_decay) + index as f64 * r;
        targets.push(StepTarget {
            index,
            time_decay,
            target,
        });
    }
    Ok(targets)
}
