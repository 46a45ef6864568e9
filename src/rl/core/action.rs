//! Action Space
//!
//! The discrete action set scored by the action head.

use serde::{Deserialize, Serialize};

/// Number of discrete actions
pub const NUM_ACTIONS: usize = 4;

/// Discrete trading action
///
/// The index of each variant is the position of its probability in the
/// action head output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TradeAction {
    /// Do nothing, maintain current state
    Hold = 0,
    /// Open or add to a long position
    Buy = 1,
    /// Reduce or short the position
    Sell = 2,
    /// Flatten the whole position
    Exit = 3,
}

impl TradeAction {
    /// Convert from action index
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Hold),
            1 => Some(Self::Buy),
            2 => Some(Self::Sell),
            3 => Some(Self::Exit),
            _ => None,
        }
    }

    /// Convert to action index
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Get all possible actions
    pub fn all() -> &'static [TradeAction] {
        &[Self::Hold, Self::Buy, Self::Sell, Self::Exit]
    }

    /// Most probable action of a distribution; ties resolve to the lower index
    pub fn most_probable(probabilities: &[f32]) -> Option<Self> {
        let mut best: Option<(usize, f32)> = None;
        for (index, &p) in probabilities.iter().enumerate().take(NUM_ACTIONS) {
            if best.map_or(true, |(_, best_p)| p > best_p) {
                best = Some((index, p));
            }
        }
        best.and_then(|(index, _)| Self::from_index(index))
    }

    /// Check if this action changes the position
    pub fn is_trade(&self) -> bool {
        !matches!(self, Self::Hold)
    }
}

impl Default for TradeAction {
    fn default() -> Self {
        Self::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for action in TradeAction::all() {
            assert_eq!(TradeAction::from_index(action.to_index()), Some(*action));
        }
        assert_eq!(TradeAction::from_index(NUM_ACTIONS), None);
    }

    #[test]
    fn test_most_probable() {
        assert_eq!(
            TradeAction::most_probable(&[0.1, 0.2, 0.6, 0.1]),
            Some(TradeAction::Sell)
        );
        assert_eq!(
            TradeAction::most_probable(&[0.25, 0.25, 0.25, 0.25]),
            Some(TradeAction::Hold)
        );
        assert_eq!(TradeAction::most_probable(&[]), None);
    }
}
