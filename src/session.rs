//! The three command modes, each a thin configuration of launcher, sampler
//! and recorder.

use crate::error::{Error, Result};
use crate::process::{MonitoredProcess, Pid, ProcessMonitor};
use crate::record::{Recorder, StreamKind};
use crate::render::{draw_png, load_chart, run_viewer, WatchSession, WATCH_INTERVAL};
use crate::sampler::{Sampler, SamplerHandle};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::thread;
use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);
/// Pause between the two runs of a comparison.
pub const COMPARE_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub command: Vec<String>,
    pub pid: Option<u32>,
    pub interval: Duration,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub command1: Vec<String>,
    pub command2: Vec<String>,
    pub interval: Duration,
    pub output: Option<PathBuf>,
    pub label1: String,
    pub label2: String,
    pub render: bool,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub watch: bool,
    pub view: bool,
}

#[derive(Debug)]
pub struct RunSummary {
    pub pid: Pid,
    pub samples: usize,
    pub status: Option<ExitStatus>,
}

#[derive(Debug)]
pub struct CompareSummary {
    pub stream: PathBuf,
    pub runs: [RunSummary; 2],
    /// Chart written by `--render`, if it could be drawn.
    pub chart: Option<PathBuf>,
}

/// Eight random hex digits.
fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub fn default_stream_name(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}_{}.csv", prefix, unique_suffix()))
}

pub fn default_chart_name(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "metrics".to_string());
    PathBuf::from(format!("{}_plot_{}.png", stem, unique_suffix()))
}

/// Keeps alphanumerics, spaces, `-` and `_`, trims trailing whitespace.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim_end()
        .to_string()
}

pub fn comparison_chart_name(label1: &str, label2: &str) -> PathBuf {
    let name = format!(
        "{}_vs_{}_{}.png",
        sanitize_label(label1),
        sanitize_label(label2),
        unique_suffix()
    );
    PathBuf::from(name.replace(' ', "_"))
}

/// Samples `process` into `recorder` until it exits, then hands the recorder back.
fn record_run(
    mut process: MonitoredProcess,
    recorder: Recorder,
    interval: Duration,
    label: Option<&str>,
) -> Result<(Recorder, RunSummary)> {
    let pid = process.pid();
    let mut sampler = Sampler::new(ProcessMonitor::new(), pid, interval, process.started_at());
    if let Some(label) = label {
        sampler = sampler.with_label(label);
    }

    let handle = SamplerHandle::spawn(sampler, recorder);
    let waited = process.wait(interval);
    let report = handle
        .stop_and_join()
        .map_err(|_| Error::Io(std::io::Error::other("sampling thread panicked")))?;
    let status = waited?;

    Ok((
        report.sink,
        RunSummary {
            pid,
            samples: report.samples,
            status,
        },
    ))
}

/// Runs a command (or attaches to a pid) and records it. Returns the stream path.
pub fn monitor(options: MonitorOptions) -> Result<(PathBuf, RunSummary)> {
    let attached = match options.pid {
        Some(pid) => Some(MonitoredProcess::attach(Pid::from_u32(pid))?),
        None if options.command.is_empty() => return Err(Error::InvalidInvocation),
        None => None,
    };

    // Fail on the output path before anything is spawned.
    let output = options
        .output
        .unwrap_or_else(|| default_stream_name("metrics"));
    let recorder = Recorder::create(&output, StreamKind::Monitor)?;

    let process = match attached {
        Some(process) => process,
        None => MonitoredProcess::launch(&options.command)?,
    };

    let (recorder, summary) = record_run(process, recorder, options.interval, None)?;
    info!("{} rows written to {}", recorder.rows(), recorder.path().display());
    Ok((output, summary))
}

/// Runs both commands one after the other into a single labelled stream.
pub fn compare(options: CompareOptions) -> Result<CompareSummary> {
    if options.command1.is_empty() || options.command2.is_empty() {
        return Err(Error::InvalidInvocation);
    }

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| default_stream_name("comparison"));
    let recorder = Recorder::create(&output, StreamKind::Compare)?;

    println!("Running {}: {}", options.label1, options.command1.join(" "));
    let process = MonitoredProcess::launch(&options.command1)?;
    let (recorder, first) = record_run(process, recorder, options.interval, Some(&options.label1))?;
    println!("{} completed", options.label1);

    thread::sleep(COMPARE_PAUSE);

    println!("Running {}: {}", options.label2, options.command2.join(" "));
    let process = MonitoredProcess::launch(&options.command2)?;
    let (recorder, second) = record_run(process, recorder, options.interval, Some(&options.label2))?;
    println!("{} completed", options.label2);

    info!("{} rows written to {}", recorder.rows(), recorder.path().display());

    let chart = if options.render {
        let path = comparison_chart_name(&options.label1, &options.label2);
        match load_chart(&output).and_then(|chart| draw_png(&chart, &path)) {
            Ok(()) => Some(path),
            Err(err) => {
                log::warn!("comparison chart not drawn: {}", err);
                None
            }
        }
    } else {
        None
    };

    Ok(CompareSummary {
        stream: output,
        runs: [first, second],
        chart,
    })
}

/// Renders once, or keeps rendering in watch/view mode. Returns the chart
/// path of a one-shot render.
pub fn render(options: RenderOptions) -> Result<PathBuf> {
    if options.view {
        run_viewer(options.input.clone(), WATCH_INTERVAL)?;
        return Ok(options.input);
    }

    let output = options
        .output
        .unwrap_or_else(|| default_chart_name(&options.input));

    if options.watch {
        WatchSession::new(options.input, output).run(WATCH_INTERVAL);
    }

    let chart = load_chart(&options.input)?;
    draw_png(&chart, &output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_sanitised_for_file_names() {
        assert_eq!(sanitize_label("gcc -O2 (fast)  "), "gcc -O2 fast");
        assert_eq!(sanitize_label("a/b\\c"), "abc");

        let name = comparison_chart_name("Command 1", "Command 2");
        let name = name.to_string_lossy();
        assert!(name.starts_with("Command_1_vs_Command_2_"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "Command_1_vs_Command_2_".len() + 8 + 4);
    }

    #[test]
    fn default_names_carry_a_random_suffix() {
        let a = default_stream_name("metrics");
        let b = default_stream_name("metrics");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().starts_with("metrics_"));

        let chart = default_chart_name(Path::new("runs/comparison.csv"));
        assert!(chart.to_string_lossy().starts_with("comparison_plot_"));
    }

    #[test]
    fn monitor_without_target_is_invalid_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("metrics.csv");
        let err = monitor(MonitorOptions {
            command: Vec::new(),
            pid: None,
            interval: DEFAULT_INTERVAL,
            output: Some(output.clone()),
        })
        .unwrap_err();

        assert!(matches!(err, Error::InvalidInvocation));
        assert!(!output.exists());
    }

    #[test]
    fn one_shot_render_of_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = render(RenderOptions {
            input: dir.path().join("missing.csv"),
            output: Some(dir.path().join("out.png")),
            watch: false,
            view: false,
        })
        .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }
}
