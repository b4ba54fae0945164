use std::process::Command;

use anyhow::{bail, Context, Result};
use colored::*;
use tracing::info;

/// Offline batch stages. Each one is an external collaborator invoked as a
/// child process; the live engine never depends on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Logs,
    Pcap,
    Features,
    Predict,
    Report,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Logs => "log preprocessing",
            Stage::Pcap => "pcap feature extraction",
            Stage::Features => "feature dataset build",
            Stage::Predict => "batch prediction",
            Stage::Report => "report generation",
        }
    }

    fn command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Stage::Logs => ("python3", &["scripts/preprocess/log_loader.py"]),
            Stage::Pcap => ("python3", &["scripts/preprocess/pcap_features.py"]),
            Stage::Features => ("python3", &["scripts/preprocess/feature_builder.py"]),
            Stage::Predict => ("python3", &["scripts/models/predict.py"]),
            Stage::Report => ("python3", &["scripts/reporting/html_reporter.py"]),
        }
    }
}

/// Runs one batch stage to completion, inheriting stdio so the stage's own
/// output reaches the operator. Non-zero exit fails the run.
pub fn run_stage(stage: Stage) -> Result<()> {
    let (program, args) = stage.command();
    info!(stage = stage.name(), program, "running batch stage");

    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("failed to launch {} ({program})", stage.name()))?;

    if !status.success() {
        bail!("{} exited with {status}", stage.name());
    }
    Ok(())
}

/// The full offline pipeline, in dependency order.
pub fn run_all() -> Result<()> {
    println!(
        "\n{}\n",
        "=== Running Full Anomaly Detection Pipeline ===".green().bold()
    );
    for stage in [
        Stage::Logs,
        Stage::Pcap,
        Stage::Features,
        Stage::Predict,
        Stage::Report,
    ] {
        run_stage(stage)?;
    }
    println!("\n{}\n", "=== Pipeline Complete ===".green().bold());
    Ok(())
}
