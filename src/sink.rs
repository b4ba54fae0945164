use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::detector::flow::FlowKey;
use crate::model::Label;

/// Column layout shared with the offline batch predictor.
pub const LOG_HEADER: &str = "src_ip,dst_ip,proto,sport,dport,anomaly_score,label,timestamp";

/// One scored flow, appended to the prediction log and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    pub key: FlowKey,
    pub anomaly_score: f64,
    pub label: Label,
    pub timestamp: f64,
}

/// Append-only CSV log of live predictions. The header is written exactly
/// once, when the file is first created; reopening an existing log appends
/// below the prior records.
pub struct PredictionLog {
    file: File,
}

impl PredictionLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create log directory {}", parent.display()))?;
            }
        }
        let write_header = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open prediction log {}", path.display()))?;
        if write_header {
            writeln!(file, "{LOG_HEADER}")
                .with_context(|| format!("failed to write log header to {}", path.display()))?;
        }
        Ok(Self { file })
    }

    /// Appends one record and flushes. I/O failures here are fatal to the
    /// capture loop; nothing is buffered or retried.
    pub fn append(&mut self, record: &PredictionRecord) -> Result<()> {
        writeln!(
            self.file,
            "{},{},{},{},{},{},{},{}",
            record.key.src,
            record.key.dst,
            record.key.protocol,
            record.key.src_port,
            record.key.dst_port,
            record.anomaly_score,
            record.label,
            record.timestamp
        )
        .context("failed to append prediction record")?;
        self.file.flush().context("failed to flush prediction log")?;
        Ok(())
    }
}
