mod launcher;
mod monitor;

pub use launcher::*;
pub use monitor::*;
pub use sysinfo::Pid;

use crate::error::ProcessError;

/// CPU and memory of a single process as of the last refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessReading {
    pub pid: Pid,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// Read access to the OS process table.
///
/// `refresh` re-reads the table; every other method answers from the most
/// recent refresh. CPU figures are usage since the previous refresh of the
/// same process, in percent of one core, and a process observed for the first
/// time reports a baseline of `0.0`.
pub trait ProcessSource {
    fn refresh(&mut self);

    /// `false` once the process has exited, including when it is a zombie.
    fn is_alive(&self, pid: Pid) -> bool;

    fn cpu_percent(&self, pid: Pid) -> Result<f32, ProcessError>;

    fn memory_bytes(&self, pid: Pid) -> Result<u64, ProcessError>;

    /// All live descendants of `pid`, recursively. `pid` itself is not included.
    fn children(&self, pid: Pid) -> Vec<Pid>;

    fn reading(&self, pid: Pid) -> Result<ProcessReading, ProcessError> {
        Ok(ProcessReading {
            pid,
            cpu_percent: self.cpu_percent(pid)?,
            memory_bytes: self.memory_bytes(pid)?,
        })
    }
}
