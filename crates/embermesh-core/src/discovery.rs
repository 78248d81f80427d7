//! Discovery responder: makes the repeater visible to network mappers.
//!
//! Handles zero-hop DIRECT CONTROL frames whose sub-type nibble is
//! DISCOVER_REQ. Request payload: `flags(1) | type_filter(1) | tag(4) |
//! since(4, optional)`; the response reflects the tag and reports our SNR
//! measurement of the request plus the public key (8-byte prefix when the
//! requester set the prefix-only flag):
//!
//! ```text
//! flags(0x90 | node_type) | snr_quarter_db(1) | tag(4) | pubkey(8 or 32)
//! ```

use tracing::{debug, info, warn};

use embermesh_proto::{Packet, PayloadType, RouteType};

use crate::dispatch::{PacketEvent, PacketProcessor, ProcessingContext, Services, Step};
use crate::transmitter::estimate_airtime_ms;

/// CONTROL sub-type nibble of a discovery request.
pub const CONTROL_DISCOVER_REQ: u8 = 0x80;
/// CONTROL sub-type nibble of a discovery response.
pub const CONTROL_DISCOVER_RESP: u8 = 0x90;
/// Request flag: respond with an 8-byte key prefix instead of the full key.
pub const DISCOVER_PREFIX_ONLY: u8 = 0x01;

/// Advert-type bit position for repeaters in the type filter.
const ADV_TYPE_REPEATER: u8 = 2;

const RESPONSE_RATE_LIMIT_MS: u64 = 60_000;
const TAG_DEDUP_TIMEOUT_MS: u64 = 30_000;
const JITTER_SLOTS: u32 = 10;

#[derive(Debug)]
struct PendingResponse {
    bytes: Vec<u8>,
    due_at_ms: u64,
}

/// Responder for zero-hop discovery probes.
#[derive(Debug, Default)]
pub struct DiscoveryResponder {
    last_response_at_ms: Option<u64>,
    last_request_tag: u32,
    last_request_at_ms: u64,
    pending: Option<PendingResponse>,
}

impl DiscoveryResponder {
    /// Fresh responder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a response waits for its send slot.
    #[must_use]
    pub fn has_pending_response(&self) -> bool {
        self.pending.is_some()
    }

    fn build_response(
        request_flags: u8,
        tag: u32,
        snr_quarter_db: i8,
        services: &Services<'_>,
    ) -> Result<Vec<u8>, embermesh_proto::ProtocolError> {
        let prefix_only = request_flags & DISCOVER_PREFIX_ONLY != 0;
        let key_len = if prefix_only { 8 } else { 32 };

        let mut packet = Packet::new(RouteType::Direct, PayloadType::Control);
        packet.payload.push(CONTROL_DISCOVER_RESP | ADV_TYPE_REPEATER);
        packet.payload.push(snr_quarter_db as u8);
        packet.payload.extend_from_slice(&tag.to_le_bytes());
        packet.payload.extend_from_slice(&services.identity.public_key()[..key_len]);
        packet.encode_to_vec()
    }

    fn response_delay_ms(len: usize, services: &Services<'_>) -> u64 {
        let slot_ms =
            (estimate_airtime_ms(len) as f32 * services.forwarding.tx_delay_factor) as u64;
        let random_slot = u64::from(services.env.random_range(JITTER_SLOTS));
        let hash_slot = u64::from(services.node.node_hash() % 10);
        (random_slot + hash_slot) * slot_ms
    }

    fn retry_delay_ms(len: usize, services: &Services<'_>) -> u64 {
        (estimate_airtime_ms(len) as f32 * services.forwarding.tx_delay_factor) as u64
    }
}

impl PacketProcessor for DiscoveryResponder {
    fn name(&self) -> &'static str {
        "DiscoveryResponder"
    }

    fn priority(&self) -> u8 {
        36
    }

    fn process(
        &mut self,
        event: &PacketEvent,
        _ctx: &mut ProcessingContext,
        services: &mut Services<'_>,
    ) -> Step {
        let packet = &event.packet;
        if packet.payload_type != PayloadType::Control {
            return Step::Continue;
        }

        // Zero-hop DIRECT only: discovery probes address immediate
        // neighbors, forwarded copies are someone else's business.
        if !packet.route.is_direct() || !packet.path.is_empty() {
            return Step::Continue;
        }

        let Some(&flags) = packet.payload.first() else {
            return Step::Continue;
        };
        if flags & 0xF0 != CONTROL_DISCOVER_REQ {
            return Step::Continue;
        }

        if packet.payload.len() < 6 {
            warn!("discovery request too short");
            return Step::Continue;
        }

        let type_filter = packet.payload[1];
        let tag = u32::from_le_bytes([
            packet.payload[2],
            packet.payload[3],
            packet.payload[4],
            packet.payload[5],
        ]);

        if type_filter & (1 << ADV_TYPE_REPEATER) == 0 {
            debug!(type_filter, "repeaters not requested, ignoring discovery");
            return Step::Continue;
        }

        let now = event.received_at_ms;
        if let Some(last) = self.last_response_at_ms {
            if now.saturating_sub(last) < RESPONSE_RATE_LIMIT_MS {
                debug!("discovery rate limited");
                return Step::Continue;
            }
        }

        if tag == self.last_request_tag
            && now.saturating_sub(self.last_request_at_ms) < TAG_DEDUP_TIMEOUT_MS
        {
            debug!(tag = format_args!("{tag:08X}"), "duplicate discovery tag");
            return Step::Continue;
        }
        self.last_request_tag = tag;
        self.last_request_at_ms = now;

        let bytes = match Self::build_response(flags, tag, event.snr_quarter_db, services) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "failed to build discovery response");
                return Step::Continue;
            }
        };

        let jitter = Self::response_delay_ms(bytes.len(), services);
        info!(
            tag = format_args!("{tag:08X}"),
            len = bytes.len(),
            jitter,
            "queued discovery response"
        );
        self.pending = Some(PendingResponse { bytes, due_at_ms: now + jitter });

        Step::Continue
    }

    fn poll(&mut self, now_ms: u64, services: &mut Services<'_>) {
        let Some(pending) = &mut self.pending else {
            return;
        };
        if now_ms < pending.due_at_ms {
            return;
        }

        if services.tx.is_transmitting() {
            pending.due_at_ms = now_ms + Self::retry_delay_ms(pending.bytes.len(), services);
            return;
        }

        if let Err(err) = services.tx.transmit(&pending.bytes, now_ms) {
            debug!(%err, "discovery send failed, rescheduling");
            pending.due_at_ms = now_ms + Self::retry_delay_ms(pending.bytes.len(), services);
            return;
        }

        self.last_response_at_ms = Some(now_ms);
        self.pending = None;
    }

    fn has_pending_work(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestRig;

    fn discover_event(flags: u8, type_filter: u8, tag: u32, at_ms: u64) -> PacketEvent {
        let mut packet = Packet::new(RouteType::Direct, PayloadType::Control);
        packet.payload.push(flags);
        packet.payload.push(type_filter);
        packet.payload.extend_from_slice(&tag.to_le_bytes());
        PacketEvent { packet, rssi_dbm: -85, snr_quarter_db: 14, received_at_ms: at_ms }
    }

    fn drain(rig: &mut TestRig, responder: &mut DiscoveryResponder, from_ms: u64) -> Vec<u8> {
        let baseline = rig.radio.sent().len();
        let mut now = from_ms;
        for _ in 0..50_000 {
            responder.poll(now, &mut rig.services());
            let sent = rig.radio.sent();
            if sent.len() > baseline {
                return sent.last().unwrap().clone();
            }
            now += 100;
        }
        unreachable!("discovery response never transmitted");
    }

    #[test]
    fn prefix_only_request_gets_short_key_reply() {
        let mut rig = TestRig::new();
        let mut responder = DiscoveryResponder::new();

        let event = discover_event(0x81, 0x04, 0x1122_3344, 0);
        let mut ctx = ProcessingContext::default();
        responder.process(&event, &mut ctx, &mut rig.services());
        assert!(responder.has_pending_response());

        let frame = drain(&mut rig, &mut responder, 0);
        let reply = Packet::decode(&frame).unwrap();
        assert_eq!(reply.route, RouteType::Direct);
        assert_eq!(reply.payload_type, PayloadType::Control);
        assert!(reply.path.is_empty());

        assert_eq!(reply.payload[0], 0x92);
        assert_eq!(reply.payload[1] as i8, 14);
        assert_eq!(&reply.payload[2..6], &0x1122_3344u32.to_le_bytes());
        assert_eq!(&reply.payload[6..14], &rig.identity.public_key()[..8]);
        assert_eq!(reply.payload.len(), 14);
    }

    #[test]
    fn full_key_request_gets_whole_key() {
        let mut rig = TestRig::new();
        let mut responder = DiscoveryResponder::new();

        let event = discover_event(0x80, 0x04, 7, 0);
        let mut ctx = ProcessingContext::default();
        responder.process(&event, &mut ctx, &mut rig.services());

        let frame = drain(&mut rig, &mut responder, 0);
        let reply = Packet::decode(&frame).unwrap();
        assert_eq!(reply.payload.len(), 6 + 32);
        assert_eq!(&reply.payload[6..38], rig.identity.public_key());
    }

    #[test]
    fn filter_without_repeater_bit_is_ignored() {
        let mut rig = TestRig::new();
        let mut responder = DiscoveryResponder::new();

        let event = discover_event(0x80, 0x02, 7, 0);
        let mut ctx = ProcessingContext::default();
        responder.process(&event, &mut ctx, &mut rig.services());
        assert!(!responder.has_pending_response());
    }

    #[test]
    fn forwarded_or_flood_probes_are_ignored() {
        let mut rig = TestRig::new();
        let mut responder = DiscoveryResponder::new();

        let mut hop = discover_event(0x80, 0x04, 7, 0);
        hop.packet.path = vec![0x11];
        let mut ctx = ProcessingContext::default();
        responder.process(&hop, &mut ctx, &mut rig.services());
        assert!(!responder.has_pending_response());

        let mut flood = discover_event(0x80, 0x04, 7, 0);
        flood.packet.route = RouteType::Flood;
        let mut ctx = ProcessingContext::default();
        responder.process(&flood, &mut ctx, &mut rig.services());
        assert!(!responder.has_pending_response());
    }

    #[test]
    fn repeated_tag_is_deduplicated() {
        let mut rig = TestRig::new();
        let mut responder = DiscoveryResponder::new();

        let event = discover_event(0x80, 0x04, 42, 0);
        let mut ctx = ProcessingContext::default();
        responder.process(&event, &mut ctx, &mut rig.services());
        assert!(responder.has_pending_response());

        responder.pending = None;
        responder.last_response_at_ms = None;

        // Same tag inside the 30 s window: ignored.
        let copy = discover_event(0x80, 0x04, 42, 10_000);
        let mut ctx = ProcessingContext::default();
        responder.process(&copy, &mut ctx, &mut rig.services());
        assert!(!responder.has_pending_response());

        // Same tag after the window: answered again.
        let late = discover_event(0x80, 0x04, 42, 41_000);
        let mut ctx = ProcessingContext::default();
        responder.process(&late, &mut ctx, &mut rig.services());
        assert!(responder.has_pending_response());
    }

    #[test]
    fn responses_are_rate_limited() {
        let mut rig = TestRig::new();
        let mut responder = DiscoveryResponder::new();

        let event = discover_event(0x80, 0x04, 1, 0);
        let mut ctx = ProcessingContext::default();
        responder.process(&event, &mut ctx, &mut rig.services());
        drain(&mut rig, &mut responder, 0);
        rig.tx.on_tx_done(500);

        let event = discover_event(0x80, 0x04, 2, 30_000);
        let mut ctx = ProcessingContext::default();
        responder.process(&event, &mut ctx, &mut rig.services());
        assert!(!responder.has_pending_response());
    }
}
