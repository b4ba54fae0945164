use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use serde::{Deserialize, Serialize};

/// Seconds since the last packet on a flow before it is finalized.
pub const FLOW_TIMEOUT: f64 = 5.0;

/// Flow identity tuple. Direction is not normalized: a reply with swapped
/// source/destination is tracked as a separate flow, matching the feature
/// distribution the model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: u8,
    pub src_port: u16,
    pub dst_port: u16,
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.src, self.dst, self.protocol, self.src_port, self.dst_port
        )
    }
}

/// Per-packet projection retained by a flow until finalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketObservation {
    pub timestamp: f64,
    pub length: u32,
    pub is_syn: bool,
    pub is_ack: bool,
}

/// Everything the pipeline keeps from one captured IP packet. Produced by
/// the capture parser; frames without a network layer never get this far.
#[derive(Debug, Clone)]
pub struct PacketMeta {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: u8,
    /// 0 when the packet carries no transport layer.
    pub src_port: u16,
    pub dst_port: u16,
    pub timestamp: f64,
    pub length: u32,
    pub is_syn: bool,
    pub is_ack: bool,
}

impl PacketMeta {
    pub fn flow_key(&self) -> FlowKey {
        FlowKey {
            src: self.src,
            dst: self.dst,
            protocol: self.protocol,
            src_port: self.src_port,
            dst_port: self.dst_port,
        }
    }

    pub fn observation(&self) -> PacketObservation {
        PacketObservation {
            timestamp: self.timestamp,
            length: self.length,
            is_syn: self.is_syn,
            is_ack: self.is_ack,
        }
    }
}

#[derive(Debug)]
struct FlowEntry {
    observations: Vec<PacketObservation>,
    last_seen: f64,
}

/// An idle flow removed from the table, ready for feature extraction.
#[derive(Debug, Clone)]
pub struct FinalizedFlow {
    pub key: FlowKey,
    pub observations: Vec<PacketObservation>,
}

/// In-progress flow registry. Owned exclusively by the capture loop and
/// passed by mutable reference, so finalization needs no locking.
pub struct FlowTable {
    flows: HashMap<FlowKey, FlowEntry>,
    timeout: f64,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::with_timeout(FLOW_TIMEOUT)
    }

    pub fn with_timeout(timeout: f64) -> Self {
        Self {
            flows: HashMap::new(),
            timeout,
        }
    }

    /// Number of flows currently open.
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Records one observation and returns every flow that went idle past
    /// the timeout. Removal and emission happen in the same call, so a flow
    /// is finalized at most once. Note the flow just updated has
    /// `last_seen == now` and can never expire itself; a lone flow is only
    /// closed once a later packet on some other key triggers the scan.
    pub fn ingest(
        &mut self,
        key: FlowKey,
        observation: PacketObservation,
        now: f64,
    ) -> Vec<FinalizedFlow> {
        let entry = self.flows.entry(key).or_insert_with(|| FlowEntry {
            observations: Vec::new(),
            last_seen: now,
        });
        entry.observations.push(observation);
        entry.last_seen = now;

        let expired: Vec<FlowKey> = self
            .flows
            .iter()
            .filter(|(_, entry)| now - entry.last_seen > self.timeout)
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| {
                self.flows.remove(&key).map(|entry| FinalizedFlow {
                    key,
                    observations: entry.observations,
                })
            })
            .collect()
    }
}

impl Default for FlowTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn key(last_octet: u8, src_port: u16) -> FlowKey {
        FlowKey {
            src: IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)),
            dst: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
            protocol: 6,
            src_port,
            dst_port: 80,
        }
    }

    fn obs(timestamp: f64) -> PacketObservation {
        PacketObservation {
            timestamp,
            length: 60,
            is_syn: false,
            is_ack: false,
        }
    }

    #[test]
    fn test_packet_within_timeout_keeps_flow_open() {
        let mut table = FlowTable::new();
        assert!(table.ingest(key(1, 1000), obs(0.0), 0.0).is_empty());
        // Second key arrives exactly at the boundary: not yet expired.
        let finalized = table.ingest(key(2, 2000), obs(5.0), 5.0);
        assert!(finalized.is_empty());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_packet_past_timeout_finalizes_flow() {
        let mut table = FlowTable::new();
        table.ingest(key(1, 1000), obs(0.0), 0.0);
        let finalized = table.ingest(key(2, 2000), obs(5.1), 5.1);
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].key, key(1, 1000));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_single_packet_flow_closed_by_later_traffic() {
        // A one-packet flow with no follow-up is only finalized once a
        // packet on a different key triggers the scan.
        let mut table = FlowTable::new();
        table.ingest(key(1, 1000), obs(0.0), 0.0);
        assert_eq!(table.len(), 1);

        let finalized = table.ingest(key(9, 9999), obs(100.0), 100.0);
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].observations.len(), 1);
    }

    #[test]
    fn test_finalization_is_at_most_once() {
        let mut table = FlowTable::new();
        table.ingest(key(1, 1000), obs(0.0), 0.0);
        let first = table.ingest(key(2, 2000), obs(10.0), 10.0);
        assert_eq!(first.len(), 1);

        // The same key never comes back from a later scan; a new packet on
        // it starts a fresh entry.
        let second = table.ingest(key(1, 1000), obs(20.0), 20.0);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].key, key(2, 2000));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_observations_kept_in_arrival_order() {
        let mut table = FlowTable::new();
        table.ingest(key(1, 1000), obs(0.0), 0.0);
        table.ingest(key(1, 1000), obs(0.3), 0.3);
        table.ingest(key(1, 1000), obs(0.1), 0.4);

        let finalized = table.ingest(key(2, 2000), obs(60.0), 60.0);
        assert_eq!(finalized.len(), 1);
        let timestamps: Vec<f64> = finalized[0]
            .observations
            .iter()
            .map(|o| o.timestamp)
            .collect();
        assert_eq!(timestamps, vec![0.0, 0.3, 0.1]);
    }

    #[test]
    fn test_refreshed_flow_survives_scan() {
        let mut table = FlowTable::new();
        table.ingest(key(1, 1000), obs(0.0), 0.0);
        // Activity at 4.0 resets last_seen, so the flow is still live at 8.0.
        table.ingest(key(1, 1000), obs(4.0), 4.0);
        let finalized = table.ingest(key(2, 2000), obs(8.0), 8.0);
        assert!(finalized.is_empty());
        assert_eq!(table.len(), 2);
    }
}
