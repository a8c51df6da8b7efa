//! # Statistics Engine
//!
//! Per-metric summaries of a run, computed in two quantile dialects:
//!
//! - **Linear**: interpolates between the two nearest ranks, the usual
//!   textbook definition
//! - **Overlay**: picks a single sample with the floor-based rule used by the
//!   Linux overlay tool, so figures match what players see in-game
//!
//! ## FPS From Frame Times
//!
//! When a run has frame times, its FPS statistics are derived from them
//! instead of from the FPS column, which profilers sample at a coarser rate.
//! Percentiles flip because a short frame is a high frame rate:
//! `fps_p97 = 1000 / ft_p03` and `fps_p01 = 1000 / ft_p99`.
//!
//! ## Output
//!
//! [`precompute`] builds one [`PreCalculatedRun`] per run: both stat sets for
//! every present metric plus an LTTB-downsampled chart series. Its JSON shape
//! is what the web client consumes directly.

use crate::downsample::{downsample_series, Point};
use crate::run::{Metric, Run, RunView};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How percentiles are picked from a sorted sample
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum QuantileMethod {
    /// Interpolate between neighbouring ranks
    Linear,
    /// Floor-based single-sample pick of the Linux overlay tool
    Overlay,
}

impl QuantileMethod {
    /// The `p`-th percentile (0..=100) of an ascending slice
    ///
    /// Returns 0 for an empty slice.
    pub fn percentile(self, sorted: &[f64], p: f64) -> f64 {
        match self {
            QuantileMethod::Linear => percentile_linear(sorted, p),
            QuantileMethod::Overlay => percentile_overlay(sorted, p),
        }
    }
}

fn percentile_linear(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper || upper >= sorted.len() {
        return sorted[lower.min(sorted.len() - 1)];
    }

    let fraction = rank - lower as f64;
    sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
}

fn percentile_overlay(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }

    let idx_desc = ((100.0 - p) / 100.0 * n as f64 - 1.0).floor() as i64;
    let idx = (n as i64 - 1 - idx_desc).clamp(0, n as i64 - 1);
    sorted[idx as usize]
}

/// Summary statistics of one metric
///
/// Every float is rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub p01: f64,
    pub p97: f64,
    pub stddev: f64,
    /// Sample variance (divisor `n - 1`)
    pub variance: f64,
    pub count: usize,
    /// `[rounded value, occurrences]` for samples within `[p01, p97]`,
    /// ascending by value
    pub density: Vec<[i64; 2]>,
}

impl MetricStats {
    /// Summarize a raw series; `None` when it is empty
    pub fn compute(data: &[f64], method: QuantileMethod) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let sorted = sorted_copy(data);
        let (avg, variance) = mean_and_variance(data);
        let p01 = method.percentile(&sorted, 1.0);
        let p97 = method.percentile(&sorted, 97.0);

        Some(Self {
            min: round2(sorted[0]),
            max: round2(sorted[sorted.len() - 1]),
            avg: round2(avg),
            median: round2(method.percentile(&sorted, 50.0)),
            p01: round2(p01),
            p97: round2(p97),
            stddev: round2(variance.sqrt()),
            variance: round2(variance),
            count: data.len(),
            density: density(data, p01, p97),
        })
    }

    /// Derive FPS statistics from frame times in milliseconds
    ///
    /// Averages and extremes are inverted from frame-time figures; median,
    /// spread and density come from per-frame FPS (`1000 / ft`, 0 for a zero
    /// frame time). `None` when there are no frame times.
    pub fn from_frame_times(frame_times: &[f64], method: QuantileMethod) -> Option<Self> {
        if frame_times.is_empty() {
            return None;
        }

        let sorted_ft = sorted_copy(frame_times);
        let fps_p97 = invert(method.percentile(&sorted_ft, 3.0));
        let fps_p01 = invert(method.percentile(&sorted_ft, 99.0));

        let avg_ft = frame_times.iter().sum::<f64>() / frame_times.len() as f64;
        let min_fps = invert(sorted_ft[sorted_ft.len() - 1]);
        let max_fps = invert(sorted_ft[0]);

        let fps: Vec<f64> = frame_times.iter().map(|&ft| invert(ft)).collect();
        let (_, variance) = mean_and_variance(&fps);
        let median = method.percentile(&sorted_copy(&fps), 50.0);

        Some(Self {
            min: round2(min_fps),
            max: round2(max_fps),
            avg: round2(invert(avg_ft)),
            median: round2(median),
            p01: round2(fps_p01),
            p97: round2(fps_p97),
            stddev: round2(variance.sqrt()),
            variance: round2(variance),
            count: frame_times.len(),
            density: density(&fps, fps_p01, fps_p97),
        })
    }
}

/// 1000 / x for positive x, 0 otherwise
fn invert(value: f64) -> f64 {
    if value > 0.0 {
        1000.0 / value
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sorted_copy(data: &[f64]) -> Vec<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    sorted
}

fn mean_and_variance(data: &[f64]) -> (f64, f64) {
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    if data.len() <= 1 {
        return (mean, 0.0);
    }
    let sum_sq: f64 = data.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, sum_sq / (n - 1.0))
}

fn density(data: &[f64], low: f64, high: f64) -> Vec<[i64; 2]> {
    let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
    for &value in data {
        if value >= low && value <= high {
            *counts.entry(value.round() as i64).or_insert(0) += 1;
        }
    }
    counts.into_iter().map(|(value, count)| [value, count]).collect()
}

/// Everything the web client needs to chart one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCalculatedRun {
    pub label: String,
    #[serde(rename = "specOS")]
    pub spec_os: String,
    #[serde(rename = "specCPU")]
    pub spec_cpu: String,
    #[serde(rename = "specGPU")]
    pub spec_gpu: String,
    #[serde(rename = "specRAM")]
    pub spec_ram: String,
    pub spec_linux_kernel: String,
    pub spec_linux_scheduler: String,
    /// FPS sample count, or frame-time count when the run has no FPS column
    pub total_data_points: usize,
    /// Downsampled `[index, value]` chart points per metric
    pub series: BTreeMap<Metric, Vec<Point>>,
    /// Linear-interpolation statistics per metric
    pub stats: BTreeMap<Metric, MetricStats>,
    /// Overlay-tool statistics per metric
    #[serde(rename = "statsMangoHud")]
    pub stats_overlay: BTreeMap<Metric, MetricStats>,
}

impl PreCalculatedRun {
    /// Statistics for one method
    pub fn stats_for(&self, method: QuantileMethod) -> &BTreeMap<Metric, MetricStats> {
        match method {
            QuantileMethod::Linear => &self.stats,
            QuantileMethod::Overlay => &self.stats_overlay,
        }
    }

    /// Compute charts and statistics for a (possibly trimmed) run
    pub fn from_view(view: &RunView<'_>) -> Self {
        let run = view.run();
        let fps = view.series(Metric::Fps);
        let frame_time = view.series(Metric::FrameTime);

        let mut result = Self {
            label: run.label.clone(),
            spec_os: run.spec_os.clone(),
            spec_cpu: run.spec_cpu.clone(),
            spec_gpu: run.spec_gpu.clone(),
            spec_ram: run.spec_ram.clone(),
            spec_linux_kernel: run.spec_linux_kernel.clone(),
            spec_linux_scheduler: run.spec_linux_scheduler.clone(),
            total_data_points: if fps.is_empty() { frame_time.len() } else { fps.len() },
            series: BTreeMap::new(),
            stats: BTreeMap::new(),
            stats_overlay: BTreeMap::new(),
        };

        for metric in Metric::ALL {
            let data = view.series(metric);
            if data.is_empty() {
                continue;
            }
            result.series.insert(metric, downsample_series(data));

            // Frame times take precedence for FPS figures
            let source_is_frame_time = metric == Metric::Fps && !frame_time.is_empty();
            if !source_is_frame_time {
                result.insert_stats(metric, |method| MetricStats::compute(data, method));
            }
        }

        if !frame_time.is_empty() {
            result.insert_stats(Metric::Fps, |method| {
                MetricStats::from_frame_times(frame_time, method)
            });
        }

        result
    }

    fn insert_stats<F>(&mut self, metric: Metric, compute: F)
    where
        F: Fn(QuantileMethod) -> Option<MetricStats>,
    {
        if let Some(stats) = compute(QuantileMethod::Linear) {
            self.stats.insert(metric, stats);
        }
        if let Some(stats) = compute(QuantileMethod::Overlay) {
            self.stats_overlay.insert(metric, stats);
        }
    }
}

/// Compute charts and statistics for a whole run
pub fn precompute_run(run: &Run) -> PreCalculatedRun {
    PreCalculatedRun::from_view(&run.trimmed_view(0, 0))
}

/// Compute charts and statistics for every run, in order
pub fn precompute(runs: &[Run]) -> Vec<PreCalculatedRun> {
    runs.iter().map(precompute_run).collect()
}
