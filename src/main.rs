use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing_subscriber;

use flowscope::capture;
use flowscope::cli::{Cli, Command};
use flowscope::detector::{Detector, ScoringAdapter};
use flowscope::model::{load_model, Scaler};
use flowscope::pipeline::{self, Stage};
use flowscope::sink::PredictionLog;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    match cli.command {
        Command::Run => pipeline::run_all(),
        Command::Logs => pipeline::run_stage(Stage::Logs),
        Command::Pcap => pipeline::run_stage(Stage::Pcap),
        Command::Features => pipeline::run_stage(Stage::Features),
        Command::Predict => pipeline::run_stage(Stage::Predict),
        Command::Report => pipeline::run_stage(Stage::Report),
        Command::Live {
            iface,
            model,
            scaler,
            log,
        } => {
            // Artifacts load before the capture loop starts; a missing or
            // corrupt model is a startup failure, not a runtime one.
            let scaler = Scaler::from_file(&scaler).context("failed to load scaler artifact")?;
            let model = load_model(&model).context("failed to load model artifact")?;
            let sink = PredictionLog::open(&log)?;

            let mut detector = Detector::new(ScoringAdapter::new(scaler, model), sink);
            if let Err(e) = capture::run(&iface, &mut detector) {
                eprintln!("{} {e:#}", "Capture failed:".red().bold());
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
