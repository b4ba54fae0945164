use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flowscope")]
#[command(author = "FlowScope")]
#[command(version = "0.1.0")]
#[command(about = "Live network flow anomaly detection with ML scoring", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full offline pipeline (logs, pcap, features, predict, report)
    Run,
    /// Run log preprocessing
    Logs,
    /// Extract PCAP features
    Pcap,
    /// Build the ML-ready dataset
    Features,
    /// Run batch anomaly predictions
    Predict,
    /// Generate the HTML anomaly report
    Report,
    /// Run real-time anomaly detection from live packet capture
    Live {
        #[arg(long, default_value = "en0", help = "Network interface to capture from")]
        iface: String,

        #[arg(
            long,
            default_value = "model_outputs/iforest.json",
            help = "Fitted anomaly model artifact"
        )]
        model: PathBuf,

        #[arg(
            long,
            default_value = "model_outputs/scaler.json",
            help = "Fitted feature scaler artifact"
        )]
        scaler: PathBuf,

        #[arg(
            long,
            default_value = "data/live/live_predictions.csv",
            help = "Append-only prediction log"
        )]
        log: PathBuf,
    },
}
