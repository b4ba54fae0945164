use std::net::IpAddr;
use serde::Serialize;
use statrs::statistics::Statistics;

use super::flow::FinalizedFlow;

pub const FEATURE_COUNT: usize = 11;

/// Fixed feature schema shared with the offline training pipeline. The
/// field order is a contract with the fitted model and scaler; reordering
/// anything here requires retraining both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub protocol: f64,
    pub source_port: f64,
    pub destination_port: f64,
    pub packet_count: f64,
    pub byte_count: f64,
    pub flow_duration: f64,
    pub avg_interarrival: f64,
    pub syn_count: f64,
    pub ack_count: f64,
    pub is_internal_source: f64,
    /// Populated only by the offline log-correlation stage. Always 0 on the
    /// live path; it exists to keep both schemas byte-for-byte aligned.
    pub failed_logins_from_source: f64,
}

impl FeatureVector {
    /// Contractual model input order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.protocol,
            self.source_port,
            self.destination_port,
            self.packet_count,
            self.byte_count,
            self.flow_duration,
            self.avg_interarrival,
            self.syn_count,
            self.ack_count,
            self.is_internal_source,
            self.failed_logins_from_source,
        ]
    }
}

/// Summarizes a finalized flow into the fixed feature schema. Deterministic
/// for a given observation multiset: timestamps are sorted before any
/// order-dependent statistic is computed.
pub fn extract(flow: &FinalizedFlow) -> FeatureVector {
    let mut timestamps: Vec<f64> = flow.observations.iter().map(|o| o.timestamp).collect();
    timestamps.sort_by(f64::total_cmp);

    let flow_duration = if timestamps.len() > 1 {
        timestamps[timestamps.len() - 1] - timestamps[0]
    } else {
        0.0
    };

    let avg_interarrival = if timestamps.len() > 1 {
        let deltas: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
        deltas.iter().mean()
    } else {
        0.0
    };

    let byte_count: u64 = flow.observations.iter().map(|o| u64::from(o.length)).sum();
    let syn_count = flow.observations.iter().filter(|o| o.is_syn).count();
    let ack_count = flow.observations.iter().filter(|o| o.is_ack).count();

    FeatureVector {
        protocol: f64::from(flow.key.protocol),
        source_port: f64::from(flow.key.src_port),
        destination_port: f64::from(flow.key.dst_port),
        packet_count: flow.observations.len() as f64,
        byte_count: byte_count as f64,
        flow_duration,
        avg_interarrival,
        syn_count: syn_count as f64,
        ack_count: ack_count as f64,
        is_internal_source: if is_internal(&flow.key.src) { 1.0 } else { 0.0 },
        failed_logins_from_source: 0.0,
    }
}

/// RFC 1918 check as the training pipeline performed it: literal prefixes,
/// so of 172.16.0.0/12 only the 172.16.x.x slice counts as internal.
fn is_internal(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            octets[0] == 10
                || (octets[0] == 172 && octets[1] == 16)
                || (octets[0] == 192 && octets[1] == 168)
        }
        IpAddr::V6(_) => false,
    }
}
