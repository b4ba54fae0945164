pub mod features;
pub mod flow;
pub mod scoring;

use anyhow::Result;
use colored::*;
use tracing::info;

use crate::sink::{PredictionLog, PredictionRecord};
use crate::model::Label;

pub use features::{extract, FeatureVector, FEATURE_COUNT};
pub use flow::{FinalizedFlow, FlowKey, FlowTable, PacketMeta, PacketObservation, FLOW_TIMEOUT};
pub use scoring::ScoringAdapter;

/// Seconds since the Unix epoch as a float, the timestamp convention used
/// throughout the flow pipeline and the prediction log.
pub fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// The synchronous per-packet pipeline: flow table update, timeout-driven
/// finalization, feature extraction, scoring, result append. Exclusively
/// owned by the capture loop; one packet runs to completion before the next
/// is read.
pub struct Detector {
    table: FlowTable,
    adapter: ScoringAdapter,
    log: PredictionLog,
}

impl Detector {
    pub fn new(adapter: ScoringAdapter, log: PredictionLog) -> Self {
        Self {
            table: FlowTable::new(),
            adapter,
            log,
        }
    }

    /// Number of flows currently being tracked.
    pub fn open_flows(&self) -> usize {
        self.table.len()
    }

    /// Runs the full pipeline for one captured packet and returns the
    /// records appended for whatever flows this packet finalized. Scoring
    /// and sink errors propagate; the affected flow's observations are
    /// already out of the table and are discarded rather than retried.
    pub fn process_packet(&mut self, packet: &PacketMeta) -> Result<Vec<PredictionRecord>> {
        let finalized = self
            .table
            .ingest(packet.flow_key(), packet.observation(), packet.timestamp);

        let mut records = Vec::with_capacity(finalized.len());
        for flow in finalized {
            let packet_count = flow.observations.len();
            let features = features::extract(&flow);
            let prediction = self.adapter.score(&features)?;
            let record = PredictionRecord {
                key: flow.key,
                anomaly_score: prediction.score,
                label: prediction.label,
                timestamp: epoch_seconds(),
            };
            self.log.append(&record)?;
            report_flow(&record, packet_count);
            records.push(record);
        }
        Ok(records)
    }
}

fn report_flow(record: &PredictionRecord, packet_count: usize) {
    info!(
        flow = %record.key,
        packets = packet_count,
        score = record.anomaly_score,
        label = %record.label,
        "flow finalized"
    );

    let status = match record.label {
        Label::Anomaly => "anomaly".red().bold(),
        Label::Normal => "normal".green(),
    };
    println!("\n{} {}", "Flow ended:".bold(), record.key);
    println!("Status: {status}");
    println!("Anomaly Score: {:.6}", record.anomaly_score);
    println!("{}", "-".repeat(50));
}
