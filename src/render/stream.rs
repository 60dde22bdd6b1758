use crate::error::{Error, Result};
use crate::record::{CompareRow, MonitorRow, StreamKind};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use std::fs;
use std::path::Path;

/// Accepts any fraction width, including none.
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Seconds since the start of the series.
    pub seconds: f64,
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<Point>,
}

/// A sample stream as read back from disk, grouped into series.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStream {
    pub kind: StreamKind,
    pub series: Vec<Series>,
}

impl SampleStream {
    pub const SINGLE_SERIES_LABEL: &'static str = "Memory";

    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::SourceUnavailable(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parses stream text. Anything after the last newline is a row still
    /// being written and is ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let complete = match text.rfind('\n') {
            Some(end) => &text[..=end],
            None => "",
        };

        let mut reader = ReaderBuilder::new().from_reader(complete.as_bytes());
        let kind = StreamKind::detect(reader.headers().map_err(parse_error)?);

        let series = match kind {
            StreamKind::Monitor => {
                let rows = reader
                    .deserialize::<MonitorRow>()
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(parse_error)?;
                single_series(rows)?
            }
            StreamKind::Compare => {
                let rows = reader
                    .deserialize::<CompareRow>()
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(parse_error)?;
                labelled_series(rows)
            }
        };

        Ok(Self { kind, series })
    }

    /// Number of data rows across every series.
    pub fn rows(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }

    pub fn max_memory_mb(&self) -> f64 {
        self.points().map(|p| p.memory_mb).fold(0.0, f64::max)
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.series.iter().flat_map(|s| s.points.iter())
    }

    pub fn labels(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.label.as_str()).collect()
    }
}

fn parse_error(err: csv::Error) -> Error {
    Error::Parse {
        line: err.position().map(|p| p.line()).unwrap_or(0),
        message: err.to_string(),
    }
}

fn single_series(rows: Vec<MonitorRow>) -> Result<Vec<Series>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut times = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let time = NaiveDateTime::parse_from_str(row.timestamp.trim(), TIMESTAMP_PARSE_FORMAT)
            .map_err(|err| Error::Parse {
                // +2: one-based, after the header.
                line: i as u64 + 2,
                message: format!("bad timestamp `{}`: {}", row.timestamp, err),
            })?;
        times.push(time);
    }

    let start = times[0];
    let points = rows
        .iter()
        .zip(&times)
        .map(|(row, time)| Point {
            seconds: (*time - start)
                .num_microseconds()
                .map_or(0.0, |us| us as f64 / 1e6),
            cpu_percent: row.cpu_percent,
            memory_mb: row.memory_mb,
        })
        .collect();

    Ok(vec![Series {
        label: SampleStream::SINGLE_SERIES_LABEL.to_string(),
        points,
    }])
}

/// Groups rows by label, in order of first appearance.
fn labelled_series(rows: Vec<CompareRow>) -> Vec<Series> {
    let mut series: Vec<Series> = Vec::new();
    for row in rows {
        let point = Point {
            seconds: row.seconds_elapsed,
            cpu_percent: row.cpu_percent,
            memory_mb: row.memory_mb,
        };
        match series.iter_mut().find(|s| s.label == row.command) {
            Some(existing) => existing.points.push(point),
            None => series.push(Series {
                label: row.command,
                points: vec![point],
            }),
        }
    }
    series
}
