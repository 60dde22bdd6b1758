#![warn(clippy::all, rust_2018_idioms)]

pub mod error;
pub mod process;
pub mod record;
pub mod render;
pub mod sampler;
pub mod session;

pub use error::{Error, ProcessError, Result};
pub use process::{MonitoredProcess, ProcessMonitor, ProcessSource};
pub use record::{Recorder, StreamKind};
pub use sampler::{Sample, Sampler, SamplerHandle};
