//! End-to-end runs against real processes.
#![cfg(unix)]

use proctrace::process::{MonitoredProcess, ProcessMonitor};
use proctrace::render::{load_chart, MemoryUnit, SampleStream};
use proctrace::sampler::{Sampler, SamplerState};
use proctrace::session::{self, CompareOptions, MonitorOptions};
use proctrace::{Error, StreamKind};
use std::collections::BTreeSet;
use std::fs;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const INTERVAL: Duration = Duration::from_millis(50);

fn shell(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Test that a monitored command produces a well-formed single-process stream
#[test]
fn test_monitor_writes_complete_rows_until_exit() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("metrics.csv");

    let (path, summary) = session::monitor(MonitorOptions {
        command: shell("sleep 0.6"),
        pid: None,
        interval: INTERVAL,
        output: Some(output.clone()),
    })
    .unwrap();

    assert_eq!(path, output);
    assert!(summary.status.unwrap().success());
    assert!(summary.samples >= 2, "only {} samples", summary.samples);

    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "timestamp,cpu_percent,memory_mb");
    assert_eq!(lines.len(), summary.samples + 1);
    for line in &lines[1..] {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 3);
        let memory: f64 = fields[2].parse().unwrap();
        assert!(memory >= 0.0);
    }
}

/// Test that descendants spawned by the target are part of the aggregate
#[test]
fn test_sampler_counts_descendants() {
    let mut process =
        MonitoredProcess::launch(&shell("sleep 1 & sleep 1 & wait")).unwrap();
    let mut sampler = Sampler::new(
        ProcessMonitor::new(),
        process.pid(),
        INTERVAL,
        process.started_at(),
    );

    thread::sleep(Duration::from_millis(300));
    let sample = sampler.tick().expect("target is still running");
    assert!(sample.processes >= 3, "saw {} processes", sample.processes);
    assert!(sample.memory_mb > 0.0);

    process.wait(INTERVAL).unwrap();
    assert!(sampler.tick().is_none());
    assert_eq!(sampler.state(), SamplerState::Stopped);
}

/// Test that children exiting mid-run never end the run early
#[test]
fn test_short_lived_children_do_not_stop_monitoring() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("metrics.csv");

    let (_, summary) = session::monitor(MonitorOptions {
        command: shell("for i in 1 2 3 4 5 6; do sleep 0.1 & wait; done"),
        pid: None,
        interval: INTERVAL,
        output: Some(output.clone()),
    })
    .unwrap();

    // Six sequential children of ~0.1s each: the run lasts well over the
    // lifetime of any single child.
    assert!(summary.samples >= 3, "only {} samples", summary.samples);
    let stream = SampleStream::read(&output).unwrap();
    assert_eq!(stream.rows(), summary.samples);
}

/// Test that attaching by pid records until the process goes away
#[test]
fn test_monitor_attached_pid() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("attached.csv");

    let mut child = std::process::Command::new("sleep").arg("0.5").spawn().unwrap();
    let pid = child.id();
    let reaper = thread::spawn(move || child.wait());

    let (_, summary) = session::monitor(MonitorOptions {
        command: Vec::new(),
        pid: Some(pid),
        interval: INTERVAL,
        output: Some(output.clone()),
    })
    .unwrap();
    reaper.join().unwrap().unwrap();

    assert!(summary.status.is_none());
    assert!(summary.samples >= 1);
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("timestamp,cpu_percent,memory_mb\n"));
}

/// Test that a command that cannot be started surfaces a launch error
#[test]
fn test_monitor_bad_command() {
    let dir = TempDir::new().unwrap();
    let err = session::monitor(MonitorOptions {
        command: vec!["/no/such/binary".to_string()],
        pid: None,
        interval: INTERVAL,
        output: Some(dir.path().join("metrics.csv")),
    })
    .unwrap_err();
    assert!(matches!(err, Error::Launch { .. }));
}

/// Test that an unwritable output path fails before the command is started
#[test]
fn test_monitor_bad_output_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("started");

    let err = session::monitor(MonitorOptions {
        command: vec!["touch".to_string(), marker.to_string_lossy().into_owned()],
        pid: None,
        interval: INTERVAL,
        output: Some(dir.path().join("missing_dir").join("metrics.csv")),
    })
    .unwrap_err();
    assert!(matches!(err, Error::Record(_)), "unexpected error: {}", err);

    thread::sleep(Duration::from_millis(300));
    assert!(!marker.exists(), "command ran despite the failed output");
}

/// Test that memory held by a child counts while it lives and drops once it exits
#[test]
fn test_child_memory_rises_then_falls() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("metrics.csv");

    // dd keeps a 300 MiB buffer resident while it copies.
    session::monitor(MonitorOptions {
        command: shell("dd if=/dev/zero of=/dev/null bs=300M count=15 2>/dev/null; sleep 0.8"),
        pid: None,
        interval: INTERVAL,
        output: Some(output.clone()),
    })
    .unwrap();

    let stream = SampleStream::read(&output).unwrap();
    let memory: Vec<f64> = stream.series[0].points.iter().map(|p| p.memory_mb).collect();
    let peak = memory.iter().copied().fold(0.0, f64::max);
    let last = *memory.last().unwrap();

    assert!(peak > 250.0, "peak was {} MB: {:?}", peak, memory);
    assert!(last < 50.0, "last row was {} MB: {:?}", last, memory);
}

/// Test that compare runs both commands serially into one labelled stream
#[test]
fn test_compare_produces_two_labelled_series() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("comparison.csv");

    let summary = session::compare(CompareOptions {
        command1: shell("sleep 0.4"),
        command2: shell("sleep 0.4"),
        interval: INTERVAL,
        output: Some(output.clone()),
        label1: "A".to_string(),
        label2: "B".to_string(),
        render: false,
    })
    .unwrap();
    assert!(summary.chart.is_none());

    let stream = SampleStream::read(&output).unwrap();
    assert_eq!(stream.kind, StreamKind::Compare);

    let labels: BTreeSet<&str> = stream.labels().into_iter().collect();
    assert_eq!(labels, BTreeSet::from(["A", "B"]));

    for (series, run) in stream.series.iter().zip(&summary.runs) {
        assert_eq!(series.points.len(), run.samples);
        assert!(series.points.len() >= 2);
        assert!(series.points[0].seconds < 1.0);
        assert!(series
            .points
            .windows(2)
            .all(|w| w[0].seconds <= w[1].seconds));
    }

    // Both runs sit in the same small range, so the chart stays in MB.
    assert_eq!(load_chart(&output).unwrap().unit, MemoryUnit::Megabytes);
}

/// Test that a stream being read while it is written never fails to parse
#[test]
fn test_stream_readable_while_recording() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("live.csv");
    let watched = output.clone();

    let reader = thread::spawn(move || {
        let mut reads = 0;
        for _ in 0..20 {
            match SampleStream::read(&watched) {
                Ok(_) => reads += 1,
                Err(Error::SourceUnavailable(_)) => {}
                Err(err) => panic!("reader saw a torn stream: {}", err),
            }
            thread::sleep(Duration::from_millis(30));
        }
        reads
    });

    session::monitor(MonitorOptions {
        command: shell("sleep 0.6"),
        pid: None,
        interval: Duration::from_millis(20),
        output: Some(output),
    })
    .unwrap();

    assert!(reader.join().unwrap() > 0);
}

/// Test that compare --render draws the comparison chart after both runs
#[test]
fn test_compare_render_writes_png() {
    let dir = TempDir::new().unwrap();

    let summary = session::compare(CompareOptions {
        command1: shell("sleep 0.3"),
        command2: shell("sleep 0.3"),
        interval: INTERVAL,
        output: Some(dir.path().join("comparison.csv")),
        label1: "render one".to_string(),
        label2: "render two".to_string(),
        render: true,
    })
    .unwrap();

    let chart = summary.chart.expect("chart was not drawn");
    let bytes = fs::read(&chart).unwrap();
    fs::remove_file(&chart).unwrap();

    let name = chart.to_string_lossy();
    assert!(name.starts_with("render_one_vs_render_two_"), "chart name {}", name);
    assert!(bytes.starts_with(b"\x89PNG"));
}
