mod chart;
mod stream;
mod viewer;
mod watch;

pub use chart::*;
pub use stream::*;
pub use viewer::*;
pub use watch::*;

use crate::error::{Error, Result};
use crate::record::StreamKind;
use std::path::Path;

/// Display unit for memory, chosen once per render from the largest value
/// across every plotted series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUnit {
    Megabytes,
    Gigabytes,
}

impl MemoryUnit {
    /// Above this many megabytes the chart switches to gigabytes.
    pub const GIGABYTE_THRESHOLD_MB: f64 = 1000.0;

    pub fn for_max(max_mb: f64) -> Self {
        if max_mb > Self::GIGABYTE_THRESHOLD_MB {
            MemoryUnit::Gigabytes
        } else {
            MemoryUnit::Megabytes
        }
    }

    pub fn divisor(self) -> f64 {
        match self {
            MemoryUnit::Megabytes => 1.0,
            MemoryUnit::Gigabytes => 1024.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MemoryUnit::Megabytes => "MB",
            MemoryUnit::Gigabytes => "GB",
        }
    }

    pub fn scale(self, memory_mb: f64) -> f64 {
        memory_mb / self.divisor()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    /// `(seconds, memory)` in the chart's memory unit.
    pub memory: Vec<(f64, f64)>,
    /// `(seconds, cpu percent)`.
    pub cpu: Vec<(f64, f64)>,
}

/// Everything needed to draw a stream, already scaled.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub kind: StreamKind,
    pub unit: MemoryUnit,
    pub series: Vec<ChartSeries>,
}

impl Chart {
    pub const MIN_ROWS: usize = 2;

    /// Builds the chart for a stream. Fails with `DataInsufficient` when the
    /// stream holds fewer than two rows.
    pub fn from_stream(stream: &SampleStream) -> Result<Self> {
        let rows = stream.rows();
        if rows < Self::MIN_ROWS {
            return Err(Error::DataInsufficient { rows });
        }

        let unit = MemoryUnit::for_max(stream.max_memory_mb());
        let series = stream
            .series
            .iter()
            .map(|s| ChartSeries {
                label: s.label.clone(),
                memory: s
                    .points
                    .iter()
                    .map(|p| (p.seconds, unit.scale(p.memory_mb)))
                    .collect(),
                cpu: s.points.iter().map(|p| (p.seconds, p.cpu_percent)).collect(),
            })
            .collect();

        Ok(Self {
            kind: stream.kind,
            unit,
            series,
        })
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            StreamKind::Monitor => "Process Memory Usage",
            StreamKind::Compare => "Memory Usage Comparison",
        }
    }

    pub fn x_label(&self) -> &'static str {
        match self.kind {
            StreamKind::Monitor => "Time (seconds since first sample)",
            StreamKind::Compare => "Time (seconds since process start)",
        }
    }

    pub fn memory_label(&self) -> String {
        format!("Memory ({})", self.unit.label())
    }

    pub fn max_seconds(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.memory.iter().map(|(x, _)| *x))
            .fold(0.0, f64::max)
    }

    pub fn max_memory(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.memory.iter().map(|(_, y)| *y))
            .fold(0.0, f64::max)
    }

    pub fn max_cpu(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.cpu.iter().map(|(_, y)| *y))
            .fold(0.0, f64::max)
    }
}

/// Reads a stream file and builds its chart.
pub fn load_chart(path: &Path) -> Result<Chart> {
    Chart::from_stream(&SampleStream::read(path)?)
}
