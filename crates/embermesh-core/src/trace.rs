//! Hop-by-hop SNR annotation of trace frames.
//!
//! A trace payload carries `tag(4) | auth(4) | flags(1) | path_hashes[..]`:
//! the ordered node hashes the trace should visit. The frame's *path* bytes,
//! unlike flood frames, are the SNR measurements recorded so far, one signed
//! quarter-dB byte per completed hop. When the next expected hop is this
//! node, we append our received SNR and send the frame on immediately:
//! direct-routed traces carry their own addressing, so the flood delay
//! machinery would only add latency.

use tracing::{debug, info, warn};

use embermesh_proto::{MAX_PATH_LEN, Packet, PayloadType, RouteType};

use crate::dispatch::{PacketEvent, PacketProcessor, ProcessingContext, Services, Step};

/// Minimum trace payload: tag + auth + flags.
pub const TRACE_MIN_PAYLOAD: usize = 9;

/// Trace frame processor.
#[derive(Debug, Default)]
pub struct TraceHandler {
    traces_handled: u32,
}

impl TraceHandler {
    /// Fresh handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Traces annotated or completed at this node.
    #[must_use]
    pub fn traces_handled(&self) -> u32 {
        self.traces_handled
    }

    fn handle_complete(packet: &Packet, tag: u32) {
        info!(
            tag = format_args!("{tag:08X}"),
            hops = packet.path.len(),
            "trace complete"
        );
        for (hop, &raw) in packet.path.iter().enumerate() {
            let snr_db = f64::from(raw as i8) / 4.0;
            info!(hop = hop + 1, snr_db, "trace hop");
        }
    }

    fn annotate_and_send(
        packet: &Packet,
        snr_quarter_db: i8,
        now_ms: u64,
        services: &mut Services<'_>,
    ) -> bool {
        if packet.path.len() >= MAX_PATH_LEN {
            warn!("trace path full, cannot append snr");
            return false;
        }

        let mut forward = packet.clone();
        forward.path.push(snr_quarter_db as u8);

        let encoded = match forward.encode_to_vec() {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(%err, "failed to encode trace frame");
                return false;
            }
        };

        if services.tx.is_transmitting() || !services.tx.can_transmit_now(now_ms) {
            debug!("transmitter unavailable, trace not forwarded");
            return false;
        }

        match services.tx.transmit(&encoded, now_ms) {
            Ok(()) => {
                debug!(hop = forward.path.len(), "trace annotated and forwarded");
                true
            }
            Err(err) => {
                warn!(%err, "failed to transmit trace frame");
                false
            }
        }
    }
}

impl PacketProcessor for TraceHandler {
    fn name(&self) -> &'static str {
        "TraceHandler"
    }

    fn priority(&self) -> u8 {
        25
    }

    fn process(
        &mut self,
        event: &PacketEvent,
        ctx: &mut ProcessingContext,
        services: &mut Services<'_>,
    ) -> Step {
        let packet = &event.packet;
        if packet.payload_type != PayloadType::Trace {
            return Step::Continue;
        }

        if packet.route != RouteType::Direct {
            warn!("trace frame with non-direct routing, dropping");
            return Step::Drop;
        }

        if packet.payload.len() < TRACE_MIN_PAYLOAD {
            warn!("trace frame too small, dropping");
            return Step::Drop;
        }

        let tag = u32::from_le_bytes([
            packet.payload[0],
            packet.payload[1],
            packet.payload[2],
            packet.payload[3],
        ]);
        let path_hashes = &packet.payload[TRACE_MIN_PAYLOAD..];

        // Arrived at (or past) the end of the requested route: terminal.
        if packet.path.len() >= path_hashes.len() {
            Self::handle_complete(packet, tag);
            self.traces_handled += 1;
            return Step::Stop;
        }

        if ctx.is_duplicate {
            return Step::Drop;
        }
        if !services.forwarding.enabled {
            return Step::Drop;
        }

        let next_hop = path_hashes[packet.path.len()];
        if next_hop != services.node.node_hash() {
            debug!(
                next_hop = format_args!("{next_hop:02X}"),
                "trace not addressed to us"
            );
            return Step::Drop;
        }

        if Self::annotate_and_send(packet, event.snr_quarter_db, event.received_at_ms, services) {
            self.traces_handled += 1;
            ctx.should_forward = true;
        }

        Step::Stop
    }
}
