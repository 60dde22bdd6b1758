use crate::error::Result;
use crate::sampler::{Sample, SampleSink};
use csv::{StringRecord, Writer, WriterBuilder};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Local wall-clock time without offset, microsecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Column layout of a sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// One process, absolute timestamps.
    Monitor,
    /// Several labelled runs, seconds since each run's own start.
    Compare,
}

impl StreamKind {
    pub const LABEL_COLUMN: &'static str = "command";

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            StreamKind::Monitor => &["timestamp", "cpu_percent", "memory_mb"],
            StreamKind::Compare => &["seconds_elapsed", "cpu_percent", "memory_mb", Self::LABEL_COLUMN],
        }
    }

    /// A label column selects the comparison layout.
    pub fn detect(headers: &StringRecord) -> Self {
        if headers.iter().any(|h| h.trim() == Self::LABEL_COLUMN) {
            StreamKind::Compare
        } else {
            StreamKind::Monitor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRow {
    pub timestamp: String,
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareRow {
    pub seconds_elapsed: f64,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub command: String,
}

/// Append-only writer of a sample stream.
///
/// Every row is flushed to the file before `append` returns, so a reader
/// polling the file only ever sees complete rows.
pub struct Recorder {
    writer: Writer<File>,
    kind: StreamKind,
    path: PathBuf,
    rows: usize,
}

impl Recorder {
    /// Creates (or truncates) `path` and writes the header row.
    pub fn create(path: impl AsRef<Path>, kind: StreamKind) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)?;

        writer.write_record(kind.columns())?;
        writer.flush()?;
        debug!("created {:?} stream at {}", kind, path.display());

        Ok(Self {
            writer,
            kind,
            path,
            rows: 0,
        })
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn append(&mut self, sample: &Sample) -> Result<()> {
        match self.kind {
            StreamKind::Monitor => self.writer.serialize(MonitorRow {
                timestamp: sample.wall_clock.format(TIMESTAMP_FORMAT).to_string(),
                cpu_percent: f64::from(sample.cpu_percent),
                memory_mb: sample.memory_mb,
            })?,
            StreamKind::Compare => self.writer.serialize(CompareRow {
                seconds_elapsed: sample.elapsed.as_secs_f64(),
                cpu_percent: f64::from(sample.cpu_percent),
                memory_mb: sample.memory_mb,
                command: sample.label.clone().unwrap_or_default(),
            })?,
        }
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}

impl SampleSink for Recorder {
    fn record(&mut self, sample: &Sample) -> Result<()> {
        self.append(sample)
    }
}
