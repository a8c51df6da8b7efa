//! # Run Model
//!
//! A [`Run`] is one profiler capture: a label, six hardware/software spec
//! strings, and thirteen index-aligned telemetry series. Series may differ in
//! length (some profilers log sensors at different rates), so the number of
//! data lines of a run is the length of its longest series.
//!
//! The struct layout is part of the version 2 storage schema: fields are
//! encoded positionally, so their order must never change.

use crate::defaults::MAX_PER_RUN_LINES;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The thirteen telemetry series a run can carry
///
/// Declaration order matches the column order of exported CSV files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Metric {
    #[serde(rename = "FPS")]
    Fps,
    #[serde(rename = "FrameTime")]
    FrameTime,
    #[serde(rename = "CPULoad")]
    CpuLoad,
    #[serde(rename = "GPULoad")]
    GpuLoad,
    #[serde(rename = "CPUTemp")]
    CpuTemp,
    #[serde(rename = "CPUPower")]
    CpuPower,
    #[serde(rename = "GPUTemp")]
    GpuTemp,
    #[serde(rename = "GPUCoreClock")]
    GpuCoreClock,
    #[serde(rename = "GPUMemClock")]
    GpuMemClock,
    #[serde(rename = "GPUVRAMUsed")]
    GpuVramUsed,
    #[serde(rename = "GPUPower")]
    GpuPower,
    #[serde(rename = "RAMUsed")]
    RamUsed,
    #[serde(rename = "SwapUsed")]
    SwapUsed,
}

impl Metric {
    /// All metrics in export column order
    pub const ALL: [Metric; 13] = [
        Metric::Fps,
        Metric::FrameTime,
        Metric::CpuLoad,
        Metric::GpuLoad,
        Metric::CpuTemp,
        Metric::CpuPower,
        Metric::GpuTemp,
        Metric::GpuCoreClock,
        Metric::GpuMemClock,
        Metric::GpuVramUsed,
        Metric::GpuPower,
        Metric::RamUsed,
        Metric::SwapUsed,
    ];

    /// Column name used by the Linux overlay dialect
    pub fn column_name(self) -> &'static str {
        match self {
            Metric::Fps => "fps",
            Metric::FrameTime => "frametime",
            Metric::CpuLoad => "cpu_load",
            Metric::GpuLoad => "gpu_load",
            Metric::CpuTemp => "cpu_temp",
            Metric::CpuPower => "cpu_power",
            Metric::GpuTemp => "gpu_temp",
            Metric::GpuCoreClock => "gpu_core_clock",
            Metric::GpuMemClock => "gpu_mem_clock",
            Metric::GpuVramUsed => "gpu_vram_used",
            Metric::GpuPower => "gpu_power",
            Metric::RamUsed => "ram_used",
            Metric::SwapUsed => "swap_used",
        }
    }

    /// Key used for this metric in statistics and series maps
    pub fn key(self) -> &'static str {
        match self {
            Metric::Fps => "FPS",
            Metric::FrameTime => "FrameTime",
            Metric::CpuLoad => "CPULoad",
            Metric::GpuLoad => "GPULoad",
            Metric::CpuTemp => "CPUTemp",
            Metric::CpuPower => "CPUPower",
            Metric::GpuTemp => "GPUTemp",
            Metric::GpuCoreClock => "GPUCoreClock",
            Metric::GpuMemClock => "GPUMemClock",
            Metric::GpuVramUsed => "GPUVRAMUsed",
            Metric::GpuPower => "GPUPower",
            Metric::RamUsed => "RAMUsed",
            Metric::SwapUsed => "SwapUsed",
        }
    }

    /// Resolve a CSV column name from either dialect
    ///
    /// Both the overlay names (`fps`, `cpu_load`, ...) and the hardware-monitor
    /// sensor names (`Framerate`, `CPU usage`, ...) map onto the same metric.
    pub fn from_column(name: &str) -> Option<Metric> {
        let metric = match name {
            "fps" | "Framerate" => Metric::Fps,
            "frametime" | "Frametime" => Metric::FrameTime,
            "cpu_load" | "CPU usage" => Metric::CpuLoad,
            "gpu_load" | "GPU usage" => Metric::GpuLoad,
            "cpu_temp" | "CPU temperature" => Metric::CpuTemp,
            "cpu_power" => Metric::CpuPower,
            "gpu_temp" | "GPU temperature" => Metric::GpuTemp,
            "gpu_core_clock" | "Core clock" => Metric::GpuCoreClock,
            "gpu_mem_clock" | "Memory clock" => Metric::GpuMemClock,
            "gpu_vram_used" | "Memory usage" => Metric::GpuVramUsed,
            "gpu_power" | "Power" => Metric::GpuPower,
            "ram_used" | "RAM usage" => Metric::RamUsed,
            "swap_used" => Metric::SwapUsed,
            _ => return None,
        };
        Some(metric)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single profiler capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(rename = "Label")]
    pub label: String,

    #[serde(rename = "SpecOS")]
    pub spec_os: String,
    #[serde(rename = "SpecCPU")]
    pub spec_cpu: String,
    #[serde(rename = "SpecGPU")]
    pub spec_gpu: String,
    /// Human-readable total RAM, e.g. "15 GB"
    #[serde(rename = "SpecRAM")]
    pub spec_ram: String,
    /// Only populated for Linux overlay captures
    #[serde(rename = "SpecLinuxKernel")]
    pub spec_linux_kernel: String,
    /// Only populated for Linux overlay captures
    #[serde(rename = "SpecLinuxScheduler")]
    pub spec_linux_scheduler: String,

    #[serde(rename = "DataFPS")]
    pub fps: Vec<f64>,
    #[serde(rename = "DataFrameTime")]
    pub frame_time: Vec<f64>,
    #[serde(rename = "DataCPULoad")]
    pub cpu_load: Vec<f64>,
    #[serde(rename = "DataGPULoad")]
    pub gpu_load: Vec<f64>,
    #[serde(rename = "DataCPUTemp")]
    pub cpu_temp: Vec<f64>,
    #[serde(rename = "DataCPUPower")]
    pub cpu_power: Vec<f64>,
    #[serde(rename = "DataGPUTemp")]
    pub gpu_temp: Vec<f64>,
    #[serde(rename = "DataGPUCoreClock")]
    pub gpu_core_clock: Vec<f64>,
    #[serde(rename = "DataGPUMemClock")]
    pub gpu_mem_clock: Vec<f64>,
    #[serde(rename = "DataGPUVRAMUsed")]
    pub gpu_vram_used: Vec<f64>,
    #[serde(rename = "DataGPUPower")]
    pub gpu_power: Vec<f64>,
    #[serde(rename = "DataRAMUsed")]
    pub ram_used: Vec<f64>,
    #[serde(rename = "DataSwapUsed")]
    pub swap_used: Vec<f64>,
}

impl Run {
    /// Create an empty run with the given label
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Borrow the series for `metric`
    pub fn series(&self, metric: Metric) -> &[f64] {
        match metric {
            Metric::Fps => &self.fps,
            Metric::FrameTime => &self.frame_time,
            Metric::CpuLoad => &self.cpu_load,
            Metric::GpuLoad => &self.gpu_load,
            Metric::CpuTemp => &self.cpu_temp,
            Metric::CpuPower => &self.cpu_power,
            Metric::GpuTemp => &self.gpu_temp,
            Metric::GpuCoreClock => &self.gpu_core_clock,
            Metric::GpuMemClock => &self.gpu_mem_clock,
            Metric::GpuVramUsed => &self.gpu_vram_used,
            Metric::GpuPower => &self.gpu_power,
            Metric::RamUsed => &self.ram_used,
            Metric::SwapUsed => &self.swap_used,
        }
    }

    /// Mutably borrow the series for `metric`
    pub fn series_mut(&mut self, metric: Metric) -> &mut Vec<f64> {
        match metric {
            Metric::Fps => &mut self.fps,
            Metric::FrameTime => &mut self.frame_time,
            Metric::CpuLoad => &mut self.cpu_load,
            Metric::GpuLoad => &mut self.gpu_load,
            Metric::CpuTemp => &mut self.cpu_temp,
            Metric::CpuPower => &mut self.cpu_power,
            Metric::GpuTemp => &mut self.gpu_temp,
            Metric::GpuCoreClock => &mut self.gpu_core_clock,
            Metric::GpuMemClock => &mut self.gpu_mem_clock,
            Metric::GpuVramUsed => &mut self.gpu_vram_used,
            Metric::GpuPower => &mut self.gpu_power,
            Metric::RamUsed => &mut self.ram_used,
            Metric::SwapUsed => &mut self.swap_used,
        }
    }

    /// Spec strings in search order: OS, CPU, GPU, RAM, kernel, scheduler
    pub fn specs(&self) -> [&str; 6] {
        [
            &self.spec_os,
            &self.spec_cpu,
            &self.spec_gpu,
            &self.spec_ram,
            &self.spec_linux_kernel,
            &self.spec_linux_scheduler,
        ]
    }

    /// Number of data lines: the length of the longest series
    pub fn run_count(&self) -> usize {
        Metric::ALL
            .iter()
            .map(|&m| self.series(m).len())
            .max()
            .unwrap_or(0)
    }

    /// True when every series is empty
    pub fn is_empty(&self) -> bool {
        Metric::ALL.iter().all(|&m| self.series(m).is_empty())
    }

    /// Shallow view with every series sliced to `[start, end]` (inclusive)
    ///
    /// A negative `start` is treated as 0 and an `end` of zero or less as the
    /// full length; `end` past the series is clamped. When `start` lands after
    /// the clamped end the series is empty in the view.
    pub fn trimmed_view(&self, start: i64, end: i64) -> RunView<'_> {
        let lo = start.max(0) as usize;
        let series = Metric::ALL.map(|metric| {
            let data = self.series(metric);
            let hi = if end <= 0 {
                data.len()
            } else {
                (end as usize).saturating_add(1).min(data.len())
            };
            if lo >= hi {
                &data[..0]
            } else {
                &data[lo..hi]
            }
        });

        RunView { run: self, series }
    }
}

/// Borrowed, trimmed view of a [`Run`]
#[derive(Debug, Clone, Copy)]
pub struct RunView<'a> {
    run: &'a Run,
    series: [&'a [f64]; 13],
}

impl<'a> RunView<'a> {
    /// The run this view was taken from
    pub fn run(&self) -> &'a Run {
        self.run
    }

    /// Label of the underlying run
    pub fn label(&self) -> &'a str {
        &self.run.label
    }

    /// Trimmed series for `metric`
    pub fn series(&self, metric: Metric) -> &'a [f64] {
        self.series[metric as usize]
    }

    /// Number of data lines in the view
    pub fn run_count(&self) -> usize {
        self.series.iter().map(|s| s.len()).max().unwrap_or(0)
    }

    /// Copy the view into an owned run
    pub fn to_run(&self) -> Run {
        let mut run = Run {
            label: self.run.label.clone(),
            spec_os: self.run.spec_os.clone(),
            spec_cpu: self.run.spec_cpu.clone(),
            spec_gpu: self.run.spec_gpu.clone(),
            spec_ram: self.run.spec_ram.clone(),
            spec_linux_kernel: self.run.spec_linux_kernel.clone(),
            spec_linux_scheduler: self.run.spec_linux_scheduler.clone(),
            ..Default::default()
        };
        for metric in Metric::ALL {
            *run.series_mut(metric) = self.series(metric).to_vec();
        }
        run
    }
}

/// Total number of data lines across `runs`
pub fn total_data_lines(runs: &[Run]) -> usize {
    runs.iter().map(Run::run_count).sum()
}

/// Reject any run longer than [`MAX_PER_RUN_LINES`]
///
/// Called by the ingest collaborator before a benchmark is stored.
pub fn validate_per_run_lines(runs: &[Run]) -> Result<()> {
    for run in runs {
        let lines = run.run_count();
        if lines > MAX_PER_RUN_LINES {
            return Err(EngineError::TooManyLines {
                label: run.label.clone(),
                lines,
                max: MAX_PER_RUN_LINES,
            });
        }
    }
    Ok(())
}
