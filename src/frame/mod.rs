//! Observation Frames
//!
//! Turns an irregular, unordered tick stream into the fixed-length vector the
//! network consumes.

pub mod builder;
pub mod service;

pub use builder::{build_frame, Frame, FrameBuilder};
pub use service::FrameService;

/// Width of the convenience lookback window
pub const ONE_HOUR_MS: i64 = 60 * 60 * 1000;
