//! Fixed-interval sampling of a process tree.
//!
//! A [`Sampler`] aggregates one [`Sample`] per tick from the target process
//! and every descendant that can still be read, and hands it to a
//! [`SampleSink`]. [`SamplerHandle`] runs that loop on its own thread.

use crate::error::{ProcessError, Result};
use crate::process::{Pid, ProcessSource};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One aggregated reading of a process tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Wall-clock time at which the reading was taken.
    pub wall_clock: DateTime<Local>,
    /// Time since the run's origin (launch or attach).
    pub elapsed: Duration,
    pub cpu_percent: f32,
    pub memory_mb: f64,
    /// Number of processes that contributed to this reading.
    pub processes: usize,
    pub label: Option<String>,
}

/// Receives every sample a sampler produces.
pub trait SampleSink {
    fn record(&mut self, sample: &Sample) -> Result<()>;
}

impl SampleSink for Vec<Sample> {
    fn record(&mut self, sample: &Sample) -> Result<()> {
        self.push(sample.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Running,
    Stopped,
}

pub struct Sampler<S> {
    source: S,
    target: Pid,
    interval: Duration,
    origin: Instant,
    label: Option<String>,
    state: SamplerState,
}

impl<S: ProcessSource> Sampler<S> {
    pub fn new(source: S, target: Pid, interval: Duration, origin: Instant) -> Self {
        Self {
            source,
            target,
            interval,
            origin,
            label: None,
            state: SamplerState::Running,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn target(&self) -> Pid {
        self.target
    }

    fn stop(&mut self) {
        if self.state == SamplerState::Running {
            debug!("sampler for pid {} stopped", self.target);
        }
        self.state = SamplerState::Stopped;
    }

    /// Takes one reading.
    ///
    /// Returns `None` once the target has exited; the sampler is then
    /// `Stopped` and every later call also returns `None`. Descendants that
    /// exit or cannot be read mid-tick are left out of the sum.
    pub fn tick(&mut self) -> Option<Sample> {
        if self.state == SamplerState::Stopped {
            return None;
        }

        self.source.refresh();
        if !self.source.is_alive(self.target) {
            self.stop();
            return None;
        }

        let mut cpu_percent = 0.0f32;
        let mut memory_bytes = 0u64;
        let mut processes = 0usize;

        match self.source.reading(self.target) {
            Ok(reading) => {
                cpu_percent += reading.cpu_percent;
                memory_bytes = memory_bytes.saturating_add(reading.memory_bytes);
                processes += 1;
            }
            Err(ProcessError::Gone(_)) => {
                self.stop();
                return None;
            }
            Err(err @ ProcessError::AccessDenied(_)) => {
                debug!("skipping target: {}", err);
            }
        }

        for pid in self.source.children(self.target) {
            match self.source.reading(pid) {
                Ok(reading) => {
                    cpu_percent += reading.cpu_percent;
                    memory_bytes = memory_bytes.saturating_add(reading.memory_bytes);
                    processes += 1;
                }
                Err(err) => debug!("skipping descendant: {}", err),
            }
        }

        Some(Sample {
            wall_clock: Local::now(),
            elapsed: self.origin.elapsed(),
            cpu_percent,
            memory_mb: memory_bytes as f64 / BYTES_PER_MB,
            processes,
            label: self.label.clone(),
        })
    }

    /// Ticks until the target exits or `stop` is raised, sleeping one
    /// interval after every tick. Returns the number of samples recorded.
    ///
    /// A sample the sink fails to record is logged and dropped.
    pub fn run<K: SampleSink>(&mut self, sink: &mut K, stop: &AtomicBool) -> usize {
        let mut recorded = 0;

        while !stop.load(Ordering::Relaxed) {
            let Some(sample) = self.tick() else {
                break;
            };

            match sink.record(&sample) {
                Ok(()) => recorded += 1,
                Err(err) => warn!("dropping sample for pid {}: {}", self.target, err),
            }

            thread::sleep(self.interval);
        }

        self.stop();
        info!("sampled pid {}: {} samples", self.target, recorded);
        recorded
    }
}

/// What a finished sampling thread hands back.
#[derive(Debug)]
pub struct SamplerReport<K> {
    pub sink: K,
    pub samples: usize,
}

/// A sampler running on a dedicated thread.
pub struct SamplerHandle<K> {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<SamplerReport<K>>,
}

impl<K: SampleSink + Send + 'static> SamplerHandle<K> {
    pub fn spawn<S>(mut sampler: Sampler<S>, mut sink: K) -> Self
    where
        S: ProcessSource + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let samples = sampler.run(&mut sink, &stop_flag);
            SamplerReport { sink, samples }
        });

        Self { stop, handle }
    }

    /// Asks the thread to finish after its current tick.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> thread::Result<SamplerReport<K>> {
        self.handle.join()
    }

    pub fn stop_and_join(self) -> thread::Result<SamplerReport<K>> {
        self.stop();
        self.join()
    }
}
