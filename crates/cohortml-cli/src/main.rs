//! cohortml - cohort prediction pipeline CLI
//!
//! Usage:
//!   cohortml --data-file data.csv --outputs-folder out
//!   cohortml --data-file data.csv --is-classification --epochs 10
//!   cohortml --config run.json --skip-zkml --json

use clap::Parser;
use cohortml::pipeline::{Pipeline, PipelineConfig};
use cohortml::traits::Task;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod error;
mod output;

use error::{CliError, Result};

/// cohortml - train, explain and export a cohort prediction model
///
/// Flags override values read from `--config`; anything unset keeps its
/// default.
#[derive(Parser, Debug)]
#[command(name = "cohortml")]
#[command(author, version, about, long_about = None)]
#[command(long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("COHORTML_GIT_SHA"), ")"))]
struct Cli {
    /// Source CSV
    #[arg(long, value_name = "FILE")]
    data_file: Option<PathBuf>,

    /// Artifact directory
    #[arg(long, value_name = "DIR")]
    outputs_folder: Option<PathBuf>,

    /// Predict `target_reg < threshold` instead of regressing it
    #[arg(long)]
    is_classification: bool,

    /// Adam learning rate
    #[arg(long)]
    learning_rate: Option<f32>,

    /// Epochs per fold
    #[arg(long)]
    epochs: Option<usize>,

    /// Fold whose model is exported
    #[arg(long)]
    model_selected: Option<usize>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seed of split, initialisation and sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Train folds in parallel
    #[arg(long)]
    parallel_folds: bool,

    /// Write circuit inputs but do not run the compiler
    #[arg(long)]
    skip_zkml: bool,

    /// `ezkl` executable
    #[arg(long, value_name = "PATH")]
    ezkl_binary: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Config file (or defaults) with the flags applied on top.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path).map_err(|e| {
                CliError::Configuration(format!("{}: {e}", path.display()))
            })?,
            None => PipelineConfig::default(),
        };

        if let Some(path) = &self.data_file {
            config.data_file.clone_from(path);
        }
        if let Some(path) = &self.outputs_folder {
            config.outputs_folder.clone_from(path);
        }
        if self.is_classification {
            config.task = Task::Classification;
        }
        if let Some(lr) = self.learning_rate {
            config.training.learning_rate = lr;
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(fold) = self.model_selected {
            config.training.model_selected = fold;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.parallel_folds {
            config.training.parallel_folds = true;
        }
        if self.skip_zkml {
            config.zkml.enabled = false;
        }
        if let Some(binary) = &self.ezkl_binary {
            config.zkml.ezkl_binary.clone_from(binary);
        }
        Ok(config)
    }

    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.pipeline_config()?;
    tracing::debug!(?config, "resolved configuration");
    let outputs = config.outputs_folder.clone();
    let report = Pipeline::new(config).run()?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::report_json(&report))
                .map_err(|e| CliError::Pipeline(e.to_string()))?
        );
    } else if !cli.quiet {
        output::print_report(&report, &outputs);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "cohortml",
            "--data-file",
            "data.csv",
            "--is-classification",
            "--epochs",
            "4",
            "--model-selected",
            "1",
            "--skip-zkml",
        ]);
        let config = cli.pipeline_config().expect("no config file");
        assert_eq!(config.data_file, PathBuf::from("data.csv"));
        assert_eq!(config.task, Task::Classification);
        assert_eq!(config.training.epochs, 4);
        assert_eq!(config.training.model_selected, 1);
        assert!(!config.zkml.enabled);
        assert_eq!(config.training.learning_rate, 1e-5);
        assert_eq!(config.outputs_folder, PathBuf::from("outputs"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"seed": 7, "training": {"epochs": 9, "hidden_size": 16}}"#)
            .expect("write config");
        let path = path.to_str().expect("utf-8 temp path");
        let cli = Cli::parse_from(["cohortml", "--config", path, "--epochs", "2"]);
        let config = cli.pipeline_config().expect("valid file");
        assert_eq!(config.seed, 7);
        assert_eq!(config.training.epochs, 2);
        assert_eq!(config.training.hidden_size, 16);
    }

    #[test]
    fn test_bad_config_file_is_configuration_error() {
        let cli = Cli::parse_from(["cohortml", "--config", "/nonexistent/run.json"]);
        let err = cli.pipeline_config().expect_err("missing file");
        assert_eq!(err.status(), 2);
    }

    #[test]
    fn test_log_level() {
        assert_eq!(Cli::parse_from(["cohortml", "-v"]).log_level(), "debug");
        assert_eq!(Cli::parse_from(["cohortml", "-q"]).log_level(), "warn");
        assert_eq!(Cli::parse_from(["cohortml"]).log_level(), "info");
    }
}
