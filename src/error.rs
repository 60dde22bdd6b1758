use std::path::PathBuf;

use sysinfo::Pid;
use thiserror::Error;

/// Failure of a single per-process query.
///
/// Neither variant is fatal to a sample: the affected process is simply left
/// out of the aggregate for that tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("process {0} is no longer running")]
    Gone(Pid),
    #[error("access to process {0} was denied")]
    AccessDenied(Pid),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("you must specify a command to run or a PID to monitor")]
    InvalidInvocation,

    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no running process with PID {0}")]
    Attach(Pid),

    #[error("failed to write sample stream: {0}")]
    Record(#[from] csv::Error),

    #[error("not enough data points to create plot ({rows} row(s))")]
    DataInsufficient { rows: usize },

    #[error("input file {} does not exist", .0.display())]
    SourceUnavailable(PathBuf),

    #[error("malformed sample stream at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("failed to draw chart: {0}")]
    Chart(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
