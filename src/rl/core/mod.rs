//! Core RL abstractions
//!
//! Discrete actions and the trade trajectories the trainer learns from.

pub mod action;
pub mod trade;

pub use action::{TradeAction, NUM_ACTIONS};
pub use trade::{Trade, TradeStep};
