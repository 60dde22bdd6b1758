use super::{ProcessMonitor, ProcessSource};
use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use log::info;
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::Pid;

/// A process being monitored, either started by us or attached to by pid.
///
/// The moment of launch (or attach) is the time origin for elapsed-time samples.
#[derive(Debug)]
pub struct MonitoredProcess {
    pid: Pid,
    started_at: Instant,
    started_wall: DateTime<Local>,
    child: Option<Child>,
}

impl MonitoredProcess {
    /// Starts `command[0]` with the remaining elements as its arguments.
    pub fn launch(command: &[String]) -> Result<Self> {
        let (program, args) = command.split_first().ok_or(Error::InvalidInvocation)?;

        let started_wall = Local::now();
        let started_at = Instant::now();
        let child = Command::new(program)
            .args(args)
            .spawn()
            .map_err(|source| Error::Launch {
                command: command.join(" "),
                source,
            })?;

        let pid = Pid::from_u32(child.id());
        info!("launched `{}` as pid {}", command.join(" "), pid);

        Ok(Self {
            pid,
            started_at,
            started_wall,
            child: Some(child),
        })
    }

    /// Attaches to a process that is already running.
    pub fn attach(pid: Pid) -> Result<Self> {
        let mut monitor = ProcessMonitor::new();
        monitor.refresh_pid(pid);
        if !monitor.is_alive(pid) {
            return Err(Error::Attach(pid));
        }

        info!("attached to pid {}", pid);
        Ok(Self {
            pid,
            started_at: Instant::now(),
            started_wall: Local::now(),
            child: None,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn started_wall(&self) -> DateTime<Local> {
        self.started_wall
    }

    pub fn is_launched(&self) -> bool {
        self.child.is_some()
    }

    /// Blocks until the process exits.
    ///
    /// A launched process is waited on (and reaped) directly and its exit
    /// status returned. An attached process is not our child, so its
    /// presence in the process table is polled every `poll` instead, and no
    /// status is available.
    pub fn wait(&mut self, poll: Duration) -> Result<Option<ExitStatus>> {
        if let Some(child) = self.child.as_mut() {
            let status = child.wait()?;
            info!("pid {} exited with {}", self.pid, status);
            return Ok(Some(status));
        }

        let mut monitor = ProcessMonitor::new();
        loop {
            monitor.refresh_pid(self.pid);
            if !monitor.is_alive(self.pid) {
                info!("pid {} is gone", self.pid);
                return Ok(None);
            }
            thread::sleep(poll);
        }
    }
}
