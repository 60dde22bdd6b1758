#![warn(clippy::all, rust_2018_idioms)]

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use proctrace::session::{self, CompareOptions, MonitorOptions, RenderOptions};
use proctrace::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Record CPU and memory usage of a process tree and chart it.
#[derive(Parser, Debug)]
#[command(name = "proctrace", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Monitor a single process
    Monitor(MonitorArgs),
    /// Compare two processes run serially
    Compare(CompareArgs),
    /// Render a chart from recorded CSV data
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// PID of an already running process to monitor
    #[arg(long)]
    pid: Option<u32>,

    /// Sampling interval in seconds
    #[arg(long, default_value = "0.1", value_parser = parse_interval)]
    interval: Duration,

    /// CSV file to write metrics to (default: metrics_<random>.csv)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Command to run, with its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// First command to run
    #[arg(long, num_args = 1.., required = true)]
    command1: Vec<String>,

    /// Second command to run
    #[arg(long, num_args = 1.., required = true)]
    command2: Vec<String>,

    /// Sampling interval in seconds
    #[arg(long, default_value = "0.1", value_parser = parse_interval)]
    interval: Duration,

    /// CSV file to write metrics to (default: comparison_<random>.csv)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Label for the first command
    #[arg(long, default_value = "Command 1")]
    label1: String,

    /// Label for the second command
    #[arg(long, default_value = "Command 2")]
    label2: String,

    /// Render a chart once both runs have finished
    #[arg(long)]
    render: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Input CSV file
    #[arg(long, default_value = "metrics.csv")]
    input: PathBuf,

    /// Output PNG file (default: <input>_plot_<random>.png)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Keep re-rendering the PNG every second as the input grows
    #[arg(long, conflicts_with = "view")]
    watch: bool,

    /// Open a live chart window instead of writing a PNG
    #[arg(long)]
    view: bool,
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s.parse().map_err(|_| format!("`{}` is not a number", s))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("interval must be a positive number of seconds, got {}", s));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Some(command) = Cli::parse().command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Monitor(args) => {
            let result = session::monitor(MonitorOptions {
                command: args.command,
                pid: args.pid,
                interval: args.interval,
                output: args.output,
            });
            match result {
                Ok((output, _)) => {
                    println!("Monitoring complete. Metrics written to {}", output.display())
                }
                Err(Error::InvalidInvocation) => {
                    println!("You must specify a command to run or a PID to monitor.");
                    MonitorArgs::augment_args(clap::Command::new("proctrace monitor"))
                        .print_help()?;
                }
                Err(err) => return Err(err).context("monitoring failed"),
            }
        }
        Commands::Compare(args) => {
            let summary = session::compare(CompareOptions {
                command1: args.command1,
                command2: args.command2,
                interval: args.interval,
                output: args.output,
                label1: args.label1,
                label2: args.label2,
                render: args.render,
            })
            .context("comparison failed")?;

            println!("Comparison complete. Metrics written to {}", summary.stream.display());
            if args.render {
                match summary.chart {
                    Some(chart) => println!("Comparison plot saved to {}", chart.display()),
                    None => println!("Failed to create comparison plot."),
                }
            }
        }
        Commands::Render(args) => {
            let input = args.input.clone();
            match session::render(RenderOptions {
                input: args.input,
                output: args.output,
                watch: args.watch,
                view: args.view,
            }) {
                Ok(_) if args.view => {}
                Ok(output) => println!("Plot saved to {}", output.display()),
                Err(Error::DataInsufficient { .. }) => {
                    println!("Not enough data points to create plot.");
                }
                Err(Error::SourceUnavailable(_)) => {
                    println!("Input file {} does not exist.", input.display());
                }
                Err(err) => return Err(err).with_context(|| format!("rendering {}", input.display())),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn monitor_collects_trailing_command() {
        let cli = Cli::parse_from(["proctrace", "monitor", "--interval", "0.5", "ls", "-la", "/tmp"]);
        let Some(Commands::Monitor(args)) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(args.interval, Duration::from_millis(500));
        assert_eq!(args.command, vec!["ls", "-la", "/tmp"]);
        assert_eq!(args.pid, None);
    }

    #[test]
    fn compare_takes_multi_word_commands() {
        let cli = Cli::parse_from([
            "proctrace", "compare", "--command1", "sleep", "1", "--command2", "sleep", "2",
            "--label1", "A", "--render",
        ]);
        let Some(Commands::Compare(args)) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.command1, vec!["sleep", "1"]);
        assert_eq!(args.command2, vec!["sleep", "2"]);
        assert_eq!(args.label1, "A");
        assert_eq!(args.label2, "Command 2");
        assert!(args.render);
        assert_eq!(args.interval, Duration::from_millis(100));
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-1").is_err());
        assert!(parse_interval("abc").is_err());
        assert_eq!(parse_interval("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn render_defaults_to_metrics_csv() {
        let cli = Cli::parse_from(["proctrace", "render"]);
        let Some(Commands::Render(args)) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.input, PathBuf::from("metrics.csv"));
        assert!(!args.watch && !args.view);
    }
}
