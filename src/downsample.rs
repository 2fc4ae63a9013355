//! Stride-aligned downsampling of a window into at most `threshold` buckets.
//!
//! Buckets sit on the absolute row-index grid (`k * stride`), not on the window's own origin,
//! so a window that slides by less than a stride keeps its bucket boundaries.

use crate::types::{Bucket, DownsampleResult, Value};
use rayon::prelude::*;
use std::ops::Range;

/// Smallest point budget a caller may request.
pub const MIN_THRESHOLD: usize = 3;

/// Windows at least this long compute their buckets on the rayon pool.
pub const DEFAULT_PARALLEL_MIN_ROWS: usize = 65_536;

/// Clamps a requested point budget up to [`MIN_THRESHOLD`].
#[inline]
pub fn clamp_threshold(threshold: usize) -> usize {
    threshold.max(MIN_THRESHOLD)
}

/// Bucket width for a window of `n` rows and a point budget of `threshold`.
///
/// `ceil(n / threshold)` rounded half-up to an even number (at least 1), so boundaries
/// change half as often as `n` or `threshold` drift.
pub fn derive_stride(n: usize, threshold: usize) -> usize {
    let threshold = threshold.max(1);
    let raw = n.div_ceil(threshold).max(1);
    // round(raw / 2) * 2 with JS-style half-up rounding
    let even = ((raw + 1) / 2) * 2;
    even.max(1)
}

/// Number of buckets produced for `n` rows.
#[inline]
pub fn bucket_count(n: usize, threshold: usize, stride: usize) -> usize {
    threshold.min(n.div_ceil(stride.max(1)))
}

/// Local row range covered by bucket `i` of a window starting at `start_index`.
///
/// The bucket is the absolute cell `[base + i*stride, base + (i+1)*stride)` intersected with
/// the window, where `base` is `start_index` rounded down to a stride multiple.
#[inline]
pub fn bucket_range(i: usize, n: usize, stride: usize, start_index: usize) -> Range<usize> {
    let stride = stride.max(1);
    let base_aligned = (start_index / stride) * stride;
    let abs_start = base_aligned.saturating_add(i.saturating_mul(stride));
    let abs_end = abs_start.saturating_add(stride);
    let local_start = abs_start.saturating_sub(start_index).min(n);
    let local_end = abs_end.saturating_sub(start_index).min(n);
    local_start..local_end
}

/// Downsamples a window of `n = x.len()` rows starting at absolute row `start_index`.
///
/// * `n <= threshold`: the window is returned unchanged (`y_line = y_min = y_max = y`).
/// * otherwise: `min(threshold, ceil(n / stride))` buckets, see [`bucket_range`].
///
/// `threshold` is assumed to have been clamped by the caller; `stride` is normally
/// [`derive_stride`]`(n, threshold)`. `x` and `y` must have equal lengths; extra rows in the
/// longer slice are ignored.
pub fn downsample(
    x: &[Value],
    y: &[Value],
    threshold: usize,
    stride: usize,
    start_index: usize,
) -> DownsampleResult {
    downsample_with(x, y, threshold, stride, start_index, DEFAULT_PARALLEL_MIN_ROWS)
}

/// Like [`downsample`], with an explicit row count at which bucket computation moves onto
/// the rayon pool. The output does not depend on which path runs.
pub fn downsample_with(
    x: &[Value],
    y: &[Value],
    threshold: usize,
    stride: usize,
    start_index: usize,
    parallel_min_rows: usize,
) -> DownsampleResult {
    let n = x.len().min(y.len());
    let (x, y) = (&x[..n], &y[..n]);
    let threshold = threshold.max(1);

    if n <= threshold {
        return DownsampleResult::passthrough(x, y);
    }

    let stride = stride.max(1);
    let buckets = bucket_count(n, threshold, stride);

    if n >= parallel_min_rows {
        let summarized: Vec<Bucket> = (0..buckets)
            .into_par_iter()
            .map(|i| summarize(x, y, bucket_range(i, n, stride, start_index)))
            .collect();
        summarized.into_iter().collect()
    } else {
        (0..buckets)
            .map(|i| summarize(x, y, bucket_range(i, n, stride, start_index)))
            .collect()
    }
}

/// Reduces one non-empty local range to a bucket.
///
/// Mean, min and max only see finite values; a range with none falls back to its first raw `y`.
fn summarize(x: &[Value], y: &[Value], range: Range<usize>) -> Bucket {
    let Range { start, end } = range;
    let len = end.saturating_sub(start).max(1);
    let mid = start + len / 2;

    let mut sum = 0.0;
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in &y[start..end] {
        if v.is_finite() {
            sum += v;
            count += 1;
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
    }

    if count == 0 {
        let first = y[start];
        return Bucket {
            x: x[mid],
            y_line: first,
            y_min: first,
            y_max: first,
        };
    }

    // Clamp the mean into [min, max]; summation rounding can push it a hair outside.
    let mean = (sum / count as f64).clamp(min, max);
    Bucket {
        x: x[mid],
        y_line: mean,
        y_min: min,
        y_max: max,
    }
}
