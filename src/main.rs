//! Thin process entry point: argument parsing, logging init, and dispatch
//! into the library. All behavior worth testing lives in the library modules.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use satsuei::browser::ChromiumProvider;
use satsuei::config::{load_diff_config, load_screenshot_config};
use satsuei::diff::DiffEngine;
use satsuei::scenario::run_scenario;
use satsuei::scenario_diff::diff_scenario;
use satsuei::screenshot::run_batch_screenshots;

const DEFAULT_DIFF_DIR: &str = "output/diff";
const DEFAULT_THRESHOLD: f64 = 0.1;

#[derive(Debug, Parser)]
#[command(
    name = "satsuei",
    version,
    about = "Scenario-driven browser screenshot capture and visual diff"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a parameterized browser scenario, capturing a screenshot per step
    Scenario {
        /// Scenario YAML file
        #[arg(long, value_name = "PATH", default_value = "env/scenario.yml")]
        scenario: PathBuf,
        /// CSV parameter file (one scenario run per data row)
        #[arg(long, value_name = "PATH", default_value = "env/params.csv")]
        params: PathBuf,
        /// Screenshot output directory
        #[arg(short, long, value_name = "DIR", default_value = "output/scenario")]
        output: PathBuf,
        /// Run the browser headless (pass `false` to show the window)
        #[arg(
            long,
            num_args = 0..=1,
            default_missing_value = "true",
            default_value_t = true,
            action = ArgAction::Set
        )]
        headless: bool,
    },
    /// Capture a batch of URL screenshots from screenshot.yml
    Screenshot {
        /// Batch configuration file
        #[arg(long, value_name = "PATH", default_value = "screenshot.yml")]
        config: PathBuf,
        /// Number of captures to run in parallel (invalid values fall back to 1)
        #[arg(short, long, default_value = "1", value_parser = parse_concurrency)]
        concurrency: usize,
    },
    /// Compare paired screenshot directories from diff.yml
    Diff {
        /// Diff configuration file
        #[arg(long, value_name = "PATH", default_value = "diff.yml")]
        config: PathBuf,
        /// Pixel difference threshold (0-1), overrides the config value
        /// when parseable as a float
        #[arg(short, long, value_name = "FLOAT")]
        threshold: Option<String>,
    },
    /// Recursively compare two scenario screenshot trees
    ScenarioDiff {
        /// Baseline screenshot tree
        #[arg(long, value_name = "DIR")]
        old: PathBuf,
        /// Candidate screenshot tree
        #[arg(long, value_name = "DIR")]
        new: PathBuf,
        /// Pixel difference threshold (0-1), 0.1 unless parseable as a float
        #[arg(short, long, value_name = "FLOAT")]
        threshold: Option<String>,
    },
}

// Like `parse_concurrency`, an unparseable threshold falls back to the
// default instead of rejecting the invocation.
fn lenient_threshold(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.parse::<f64>().ok()).filter(|t| t.is_finite())
}

// `--concurrency banana` or a non-positive count degrades to sequential
// capture instead of rejecting the invocation.
fn parse_concurrency(s: &str) -> Result<usize, std::convert::Infallible> {
    Ok(s.parse::<i64>()
        .ok()
        .filter(|n| *n >= 1)
        .map(|n| n as usize)
        .unwrap_or(1))
}

#[tokio::main]
async fn main() -> Result<()> {
    satsuei::logging::init_from_env();
    let cli = Cli::parse();

    match cli.command {
        Command::Scenario {
            scenario,
            params,
            output,
            headless,
        } => {
            let provider = ChromiumProvider;
            run_scenario(&scenario, &params, &output, headless, &provider).await?;
        }
        Command::Screenshot {
            config,
            concurrency,
        } => {
            let config = load_screenshot_config(&config)?;
            run_batch_screenshots(&config, concurrency).await?;
        }
        Command::Diff { config, threshold } => {
            let config = load_diff_config(&config)?;
            let threshold = lenient_threshold(threshold)
                .or(config.threshold)
                .unwrap_or(DEFAULT_THRESHOLD);
            let engine = DiffEngine::new(DEFAULT_DIFF_DIR, threshold);
            engine.run_batch(&config)?;
        }
        Command::ScenarioDiff {
            old,
            new,
            threshold,
        } => {
            let threshold = lenient_threshold(threshold).unwrap_or(DEFAULT_THRESHOLD);
            let engine = DiffEngine::new(DEFAULT_DIFF_DIR, threshold);
            diff_scenario(&engine, &old, &new);
        }
    }
    Ok(())
}
