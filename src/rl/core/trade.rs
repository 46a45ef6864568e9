//! Trade Trajectories
//!
//! A completed trade from entry to exit, as recorded by the execution layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::action::TradeAction;
use crate::domain::Timestamp;
use crate::frame::Frame;

/// One decision point inside a trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStep {
    /// Decision time (epoch millis)
    pub time: Timestamp,
    /// Frame the network saw at decision time
    pub observation: Frame,
    /// Action head output at decision time
    pub action_probabilities: Vec<f32>,
    /// Value head output at decision time
    pub value_prediction: f32,
    /// Asset -> balance change caused by this step
    pub portfolio_change: BTreeMap<String, f64>,
    pub action: TradeAction,
}

/// Ordered steps of one trajectory plus its realized return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    steps: Vec<TradeStep>,
    profit: f64,
}

impl Trade {
    pub fn new(steps: Vec<TradeStep>, profit: f64) -> Self {
        Self { steps, profit }
    }

    /// Trade whose profit is the net change of `quote_asset` over all steps
    pub fn from_portfolio(steps: Vec<TradeStep>, quote_asset: &str) -> Self {
        let profit = steps
            .iter()
            .filter_map(|step| step.portfolio_change.get(quote_asset))
            .sum();
        Self { steps, profit }
    }

    pub fn steps(&self) -> &[TradeStep] {
        &self.steps
    }

    pub fn profit(&self) -> f64 {
        self.profit
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(time: Timestamp, action: TradeAction, usd: f64) -> TradeStep {
        let mut portfolio_change = BTreeMap::new();
        portfolio_change.insert("USD".to_string(), usd);
        portfolio_change.insert("BTC".to_string(), -usd / 100.0);
        TradeStep {
            time,
            observation: Frame::new(vec![1.0; 25]),
            action_probabilities: vec![0.25; 4],
            value_prediction: 0.0,
            portfolio_change,
            action,
        }
    }

    #[test]
    fn test_profit_from_quote_asset() {
        let trade = Trade::from_portfolio(
            vec![
                step(1_000, TradeAction::Buy, -500.0),
                step(2_000, TradeAction::Hold, 0.0),
                step(3_000, TradeAction::Exit, 530.0),
            ],
            "USD",
        );

        assert_eq!(trade.len(), 3);
        assert!((trade.profit() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_quote_asset_counts_as_zero() {
        let trade = Trade::from_portfolio(vec![step(1_000, TradeAction::Buy, -10.0)], "EUR");
        assert_eq!(trade.profit(), 0.0);
    }
}
