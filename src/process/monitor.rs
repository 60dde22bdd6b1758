use super::ProcessSource;
use crate::error::ProcessError;
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

/// `ProcessSource` backed by a sysinfo process table.
///
/// The table is kept across refreshes so that sysinfo can compute CPU usage
/// from the delta between two consecutive refreshes of each process.
#[derive(Debug)]
pub struct ProcessMonitor {
    system: System,
}

impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMonitor {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing().with_cpu().with_memory()
    }

    /// Refreshes a single process. Cheaper than a full refresh when only the
    /// liveness of one pid matters.
    pub fn refresh_pid(&mut self, pid: Pid) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            Self::refresh_kind(),
        );
    }

    fn live_process(&self, pid: Pid) -> Result<&Process, ProcessError> {
        match self.system.process(pid) {
            Some(process) if !Self::is_exited(process) => Ok(process),
            _ => Err(ProcessError::Gone(pid)),
        }
    }

    fn is_exited(process: &Process) -> bool {
        matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
    }

    /// Breadth-first walk of the parent links in the current table.
    fn find_descendants(&self, root: Pid) -> Vec<Pid> {
        let mut parent_to_children: HashMap<Pid, Vec<Pid>> = HashMap::new();

        for (pid, process) in self.system.processes() {
            // Threads show up as tasks on Linux; their usage is already part
            // of the owning process.
            if process.thread_kind().is_some() {
                continue;
            }
            if let Some(parent) = process.parent() {
                parent_to_children.entry(parent).or_default().push(*pid);
            }
        }

        let mut queue = VecDeque::from([root]);
        let mut visited = HashSet::from([root]);
        let mut result = Vec::new();

        while let Some(current_pid) = queue.pop_front() {
            if let Some(children) = parent_to_children.get(&current_pid) {
                for &child_pid in children {
                    if visited.insert(child_pid) {
                        result.push(child_pid);
                        queue.push_back(child_pid);
                    }
                }
            }
        }

        result
    }
}

impl ProcessSource for ProcessMonitor {
    fn refresh(&mut self) {
        // Descendants can only be found through the parent links of every
        // process, so the whole table is refreshed.
        let updated = self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            Self::refresh_kind(),
        );
        debug!("refreshed {} processes", updated);
    }

    fn is_alive(&self, pid: Pid) -> bool {
        self.live_process(pid).is_ok()
    }

    fn cpu_percent(&self, pid: Pid) -> Result<f32, ProcessError> {
        self.live_process(pid).map(Process::cpu_usage)
    }

    fn memory_bytes(&self, pid: Pid) -> Result<u64, ProcessError> {
        self.live_process(pid).map(Process::memory)
    }

    fn children(&self, pid: Pid) -> Vec<Pid> {
        self.find_descendants(pid)
    }
}
