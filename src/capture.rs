use std::net::IpAddr;

use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use pnet::datalink::{self, Channel, Config};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::{TcpFlags, TcpPacket};
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;
use tracing::trace;

use crate::detector::{epoch_seconds, Detector, PacketMeta};

/// Blocking capture loop. Each frame runs the full parse -> ingest ->
/// score -> append pipeline to completion before the next frame is read;
/// the loop only returns on a capture or pipeline error. Flows still open
/// when the process is interrupted are not flushed.
pub fn run(interface: &str, detector: &mut Detector) -> Result<()> {
    let iface = datalink::interfaces()
        .into_iter()
        .find(|candidate| candidate.name == interface)
        .ok_or_else(|| anyhow!("network interface not found: {interface}"))?;

    let (_tx, mut rx) = match datalink::channel(&iface, Config::default()) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => bail!("unsupported channel type on interface {interface}"),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("failed to open capture channel on {interface} (are you root?)")
            })
        }
    };

    println!(
        "\n{} {}",
        "Starting live capture on interface:".green().bold(),
        interface.white().bold()
    );
    println!("Press CTRL+C to stop.\n");

    loop {
        let frame = rx
            .next()
            .with_context(|| format!("capture read failed on {interface}"))?;
        let now = epoch_seconds();
        match parse_frame(frame, now) {
            Some(packet) => {
                detector.process_packet(&packet)?;
            }
            // Expected background noise on a live interface: ARP, IPv6,
            // truncated frames. Dropped without touching flow state.
            None => trace!("dropped non-IPv4 frame ({} bytes)", frame.len()),
        }
    }
}

/// Projects one link-layer frame onto the pipeline's packet record.
/// Returns `None` for anything without an IPv4 network layer; packets
/// without a parseable transport layer keep ports 0 rather than failing.
pub fn parse_frame(frame: &[u8], timestamp: f64) -> Option<PacketMeta> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }
    let ipv4 = Ipv4Packet::new(ethernet.payload())?;
    let protocol = ipv4.get_next_level_protocol();

    let (src_port, dst_port, is_syn, is_ack) = match protocol {
        IpNextHeaderProtocols::Tcp => match TcpPacket::new(ipv4.payload()) {
            Some(tcp) => {
                let flags = tcp.get_flags();
                (
                    tcp.get_source(),
                    tcp.get_destination(),
                    flags & TcpFlags::SYN != 0,
                    flags & TcpFlags::ACK != 0,
                )
            }
            None => (0, 0, false, false),
        },
        IpNextHeaderProtocols::Udp => match UdpPacket::new(ipv4.payload()) {
            Some(udp) => (udp.get_source(), udp.get_destination(), false, false),
            None => (0, 0, false, false),
        },
        _ => (0, 0, false, false),
    };

    Some(PacketMeta {
        src: IpAddr::V4(ipv4.get_source()),
        dst: IpAddr::V4(ipv4.get_destination()),
        protocol: protocol.0,
        src_port,
        dst_port,
        timestamp,
        length: frame.len() as u32,
        is_syn,
        is_ack,
    })
}
