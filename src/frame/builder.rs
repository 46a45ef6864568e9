//! Frame Builder
//!
//! Bins price points into equal-width intervals and averages each bin.

use serde::{Deserialize, Serialize};

use crate::domain::{PricePoint, Timestamp};
use crate::error::{A3cError, Result};

/// Fixed-length observation, earliest bin first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame(Vec<f64>);

impl Frame {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Single precision copy for the network input
    pub fn to_f32(&self) -> Vec<f32> {
        self.0.iter().map(|&v| v as f32).collect()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for Frame {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Build a frame of `bin_count` means over `[window_start, window_end)`.
///
/// The window is cut into `bin_count` intervals of
/// `(window_end - window_start) / bin_count` milliseconds; the width must
/// divide exactly. Bin `k` covers `(lo, lo + step]` with
/// `lo = window_start + k * step`, so a tick stamped exactly at
/// `window_start` is outside the frame and one at `window_end` is inside the
/// last bin. Points outside the window are ignored; input order is irrelevant.
///
/// Fails with [`A3cError::EmptyBin`] when any bin has no points.
pub fn build_frame(
    points: &[PricePoint],
    bin_count: usize,
    window_start: Timestamp,
    window_end: Timestamp,
) -> Result<Frame> {
    if bin_count == 0 {
        return Err(A3cError::InvalidWindow("bin count must be positive".into()));
    }
    if window_end <= window_start {
        return Err(A3cError::InvalidWindow(format!(
            "window end {window_end} is not after start {window_start}"
        )));
    }

    let span = window_end - window_start;
    let bins = bin_count as i64;
    if span % bins != 0 {
        return Err(A3cError::InvalidWindow(format!(
            "window of {span}ms is not divisible into {bin_count} bins"
        )));
    }
    let step = span / bins;

    let mut sums = vec![0.0f64; bin_count];
    let mut counts = vec![0usize; bin_count];

    for point in points {
        let offset = point.timestamp - window_start;
        if offset <= 0 || offset > span {
            continue;
        }
        // offset in 1..=span maps onto bins 0..bin_count
        let bin = ((offset - 1) / step) as usize;
        sums[bin] += point.value;
        counts[bin] += 1;
    }

    let mut values = Vec::with_capacity(bin_count);
    for (bin, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
        if count == 0 {
            let lower = window_start + bin as i64 * step;
            return Err(A3cError::EmptyBin {
                bin,
                lower,
                upper: lower + step,
            });
        }
        values.push(sum / count as f64);
    }

    Ok(Frame(values))
}

/// Frame builder bound to a bin count
#[derive(Debug, Clone, Copy)]
pub struct FrameBuilder {
    bin_count: usize,
}

impl FrameBuilder {
    pub fn new(bin_count: usize) -> Self {
        Self { bin_count }
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn build(
        &self,
        points: &[PricePoint],
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> Result<Frame> {
        build_frame(points, self.bin_count, window_start, window_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ONE_HOUR_MS;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn tick(timestamp: i64, value: f64) -> PricePoint {
        PricePoint::new(timestamp, "BTC-USD", value)
    }

    #[test]
    fn test_bin_means_with_unordered_input() {
        let points = vec![
            tick(35, 7.0),
            tick(5, 1.0),
            tick(20, 4.0),
            tick(10, 3.0),
            tick(30, 5.0),
            tick(15, 2.0),
        ];

        let frame = build_frame(&points, 3, 0, 30).unwrap();
        // (0,10] -> 1,3 ; (10,20] -> 2,4 ; (20,30] -> 5 ; 35 is outside
        assert_eq!(frame.values(), &[2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_bin_bounds_are_lower_exclusive_upper_inclusive() {
        let points = vec![tick(0, 100.0), tick(10, 1.0), tick(11, 2.0), tick(20, 3.0)];

        let frame = build_frame(&points, 2, 0, 20).unwrap();
        assert_eq!(frame.values(), &[1.0, 2.5]);
    }

    #[test]
    fn test_empty_bin_is_an_error() {
        let points = vec![tick(5, 1.0), tick(25, 2.0)];

        match build_frame(&points, 3, 0, 30) {
            Err(A3cError::EmptyBin { bin, lower, upper }) => {
                assert_eq!((bin, lower, upper), (1, 10, 20));
            }
            other => panic!("expected EmptyBin, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_uneven_and_empty_windows() {
        let points = vec![tick(5, 1.0)];
        assert!(matches!(
            build_frame(&points, 3, 0, 10),
            Err(A3cError::InvalidWindow(_))
        ));
        assert!(matches!(
            build_frame(&points, 0, 0, 10),
            Err(A3cError::InvalidWindow(_))
        ));
        assert!(matches!(
            build_frame(&points, 1, 10, 10),
            Err(A3cError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_one_tick_per_bin_hour_is_unchanged() {
        let frame_size = 60;
        let step = ONE_HOUR_MS / frame_size as i64;
        let end = 1_700_000_000_000;
        let start = end - ONE_HOUR_MS;
        let points: Vec<_> = (0..frame_size)
            .map(|i| tick(start + (i as i64 + 1) * step, 100.0 + i as f64 * 0.25))
            .collect();

        let frame = FrameBuilder::new(frame_size).build(&points, start, end).unwrap();

        assert_eq!(frame.len(), frame_size);
        for (i, value) in frame.values().iter().enumerate() {
            assert_eq!(*value, 100.0 + i as f64 * 0.25);
        }
    }

    #[test]
    fn test_exact_means_against_brute_force_filter() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut points: Vec<PricePoint> = (0..500)
            .map(|_| tick(rng.gen_range(0..=1_200), rng.gen_range(0.0..100.0)))
            .collect();
        // guarantee every bin of width 100 is populated
        for b in 0..12 {
            points.push(tick(b * 100 + 50, 1.0));
        }

        let frame = build_frame(&points, 12, 0, 1_200).unwrap();
        for (bin, value) in frame.values().iter().enumerate() {
            let lo = bin as i64 * 100;
            let hi = lo + 100;
            let selected: Vec<f64> = points
                .iter()
                .filter(|p| p.timestamp > lo && p.timestamp <= hi)
                .map(|p| p.value)
                .collect();
            let mean = selected.iter().sum::<f64>() / selected.len() as f64;
            assert!((value - mean).abs() < 1e-9, "bin {bin}: {value} vs {mean}");
        }
    }
}
