//! # Largest-Triangle-Three-Buckets Downsampling
//!
//! Reduces a chart series to a target number of points while keeping its
//! visual shape. The first and last points are always kept; the points in
//! between are split into equal-width buckets and each bucket keeps the point
//! forming the largest triangle with the previously kept point and the mean
//! of the next bucket.

use crate::defaults::DOWNSAMPLE_THRESHOLD;

/// One chart point: `[sample index, value]`
pub type Point = [f64; 2];

/// Pair every sample with its index
pub fn indexed_series(data: &[f64]) -> Vec<Point> {
    data.iter()
        .enumerate()
        .map(|(i, &v)| [i as f64, v])
        .collect()
}

/// Downsample raw samples to at most [`DOWNSAMPLE_THRESHOLD`] points
pub fn downsample_series(data: &[f64]) -> Vec<Point> {
    lttb(&indexed_series(data), DOWNSAMPLE_THRESHOLD)
}

/// Downsample `data` to `threshold` points
///
/// Inputs no longer than `threshold`, and any `threshold` of 2 or less, are
/// returned unchanged.
pub fn lttb(data: &[Point], threshold: usize) -> Vec<Point> {
    let n = data.len();
    if n <= threshold || threshold <= 2 {
        return data.to_vec();
    }

    let mut sampled = Vec::with_capacity(threshold);
    let bucket_size = (n - 2) as f64 / (threshold - 2) as f64;
    let bucket_edge = |i: usize| ((i as f64 * bucket_size).floor() as usize + 1).min(n);

    sampled.push(data[0]);

    for i in 0..threshold - 2 {
        // Mean of the next bucket
        let next = &data[bucket_edge(i + 1)..bucket_edge(i + 2)];
        if next.is_empty() {
            continue;
        }
        let (sum_x, sum_y) = next
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p[0], y + p[1]));
        let avg_x = sum_x / next.len() as f64;
        let avg_y = sum_y / next.len() as f64;

        let [a_x, a_y] = sampled[sampled.len() - 1];
        let mut max_area = -1.0;
        let mut chosen = None;

        for point in &data[bucket_edge(i)..bucket_edge(i + 1)] {
            let area =
                ((a_x - avg_x) * (point[1] - a_y) - (a_x - point[0]) * (avg_y - a_y)).abs() * 0.5;
            if area > max_area {
                max_area = area;
                chosen = Some(*point);
            }
        }

        if let Some(point) = chosen {
            sampled.push(point);
        }
    }

    sampled.push(data[n - 1]);
    sampled
}
