use super::{draw_png, load_chart};
use crate::error::Error;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

pub const WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Result of one watch-mode poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The input file does not exist yet.
    Missing,
    /// Nothing changed since the last chart was written.
    Unchanged,
    /// Fewer than two rows so far.
    Insufficient,
    /// The file could not be parsed or drawn this time.
    Invalid(String),
    Rendered { rows: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Re-renders a growing stream file into a PNG, one poll at a time.
///
/// Every failure is reported as an outcome so the caller can simply retry on
/// the next poll.
#[derive(Debug)]
pub struct WatchSession {
    input: PathBuf,
    output: PathBuf,
    rendered: Option<FileStamp>,
}

impl WatchSession {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            rendered: None,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn poll(&mut self) -> PollOutcome {
        let Some(stamp) = FileStamp::of(&self.input) else {
            return PollOutcome::Missing;
        };
        if self.rendered == Some(stamp) {
            return PollOutcome::Unchanged;
        }

        let chart = match load_chart(&self.input) {
            Ok(chart) => chart,
            Err(Error::SourceUnavailable(_)) => return PollOutcome::Missing,
            Err(Error::DataInsufficient { .. }) => return PollOutcome::Insufficient,
            Err(err) => {
                debug!("watch: {}", err);
                return PollOutcome::Invalid(err.to_string());
            }
        };

        if let Err(err) = draw_png(&chart, &self.output) {
            warn!("watch: {}", err);
            return PollOutcome::Invalid(err.to_string());
        }

        self.rendered = Some(stamp);
        PollOutcome::Rendered {
            rows: chart.series.iter().map(|s| s.memory.len()).sum(),
        }
    }

    /// Startup message naming both files, since the default output name is random.
    pub fn banner(&self, every: Duration) -> String {
        format!(
            "Watch mode: updating {} from {} every {} second(s). Press Ctrl+C to stop.",
            self.output.display(),
            self.input.display(),
            every.as_secs_f64()
        )
    }

    /// Polls forever, printing progress after every poll.
    pub fn run(&mut self, every: Duration) -> ! {
        println!("{}", self.banner(every));
        loop {
            match self.poll() {
                PollOutcome::Missing => println!("Waiting for CSV file: {}", self.input.display()),
                PollOutcome::Unchanged => {}
                PollOutcome::Insufficient => println!("Waiting for more data..."),
                PollOutcome::Invalid(_) => println!("Waiting for valid data..."),
                PollOutcome::Rendered { rows } => {
                    println!("Plot updated: {} ({} rows)", self.output.display(), rows)
                }
            }
            thread::sleep(every);
        }
    }
}
