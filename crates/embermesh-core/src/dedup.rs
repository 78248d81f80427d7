//! Duplicate suppression.
//!
//! First stage of the pipeline. Fingerprints each frame with FNV-1a over
//! (payload type, payload version, payload bytes) and drops anything seen in
//! the last minute. Direct-routed trace frames additionally fold in the path
//! length: every hop's SNR annotation changes the path, and those copies
//! must stay distinguishable.

use tracing::debug;

use embermesh_proto::{Packet, PayloadType, RouteType};

use crate::dispatch::{PacketEvent, PacketProcessor, ProcessingContext, Services, Step};
use crate::fnv::Fnv1a;
use crate::settings::DedupParams;

#[derive(Debug, Clone, Copy, Default)]
struct CacheEntry {
    hash: u32,
    timestamp_ms: u64,
    valid: bool,
}

/// Content-hash dedup cache with time expiry.
#[derive(Debug)]
pub struct Deduplicator {
    cache: Vec<CacheEntry>,
    next_index: usize,
    timeout_ms: u64,
    duplicate_count: u32,
}

impl Deduplicator {
    /// Cache with the configured size and expiry.
    #[must_use]
    pub fn new(params: &DedupParams) -> Self {
        Self {
            cache: vec![CacheEntry::default(); params.cache_len],
            next_index: 0,
            timeout_ms: params.timeout_ms,
            duplicate_count: 0,
        }
    }

    /// Fingerprint a packet for deduplication.
    #[must_use]
    pub fn packet_hash(packet: &Packet) -> u32 {
        let mut hasher = Fnv1a::new();
        hasher.write_u8(packet.payload_type.bits());
        hasher.write_u8(packet.payload_version);
        hasher.write(&packet.payload);

        if packet.payload_type == PayloadType::Trace && packet.route == RouteType::Direct {
            hasher.write_u8(packet.path.len() as u8);
        }

        hasher.finish()
    }

    /// Duplicates dropped so far.
    #[must_use]
    pub fn duplicate_count(&self) -> u32 {
        self.duplicate_count
    }

    /// Invalidate every entry.
    pub fn reset(&mut self) {
        self.cache.fill(CacheEntry::default());
        self.next_index = 0;
    }

    fn sweep_expired(&mut self, now_ms: u64) {
        for entry in &mut self.cache {
            if entry.valid && now_ms.saturating_sub(entry.timestamp_ms) > self.timeout_ms {
                entry.valid = false;
            }
        }
    }

    fn contains(&self, hash: u32) -> bool {
        self.cache.iter().any(|entry| entry.valid && entry.hash == hash)
    }

    fn insert(&mut self, hash: u32, now_ms: u64) {
        self.cache[self.next_index] = CacheEntry { hash, timestamp_ms: now_ms, valid: true };
        self.next_index = (self.next_index + 1) % self.cache.len();
    }

    fn extract_source_node(packet: &Packet) -> u16 {
        if let Some(codes) = packet.transport_codes {
            return codes[0];
        }
        if packet.path.len() >= 2 {
            return u16::from_le_bytes([packet.path[0], packet.path[1]]);
        }
        0
    }
}

impl PacketProcessor for Deduplicator {
    fn name(&self) -> &'static str {
        "Deduplicator"
    }

    fn priority(&self) -> u8 {
        10
    }

    fn process(
        &mut self,
        event: &PacketEvent,
        ctx: &mut ProcessingContext,
        _services: &mut Services<'_>,
    ) -> Step {
        self.sweep_expired(event.received_at_ms);

        let hash = Self::packet_hash(&event.packet);
        ctx.dedup_hash = hash;

        if self.contains(hash) {
            ctx.is_duplicate = true;
            self.duplicate_count += 1;
            debug!(hash = format_args!("{hash:08X}"), "duplicate detected");
            return Step::Drop;
        }

        self.insert(hash, event.received_at_ms);
        ctx.source_node = Self::extract_source_node(&event.packet);
        ctx.hop_count = event.packet.path.len() as u8;
        Step::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestRig;

    fn flood_event(payload: &[u8], at_ms: u64) -> PacketEvent {
        let mut packet = Packet::new(RouteType::Flood, PayloadType::TxtMsg);
        packet.payload = payload.to_vec();
        PacketEvent { packet, rssi_dbm: -90, snr_quarter_db: 0, received_at_ms: at_ms }
    }

    fn dedup() -> Deduplicator {
        Deduplicator::new(&DedupParams::default())
    }

    #[test]
    fn second_copy_is_dropped() {
        let mut rig = TestRig::new();
        let mut dedup = dedup();

        let mut ctx = ProcessingContext::default();
        let step = dedup.process(&flood_event(b"hello", 0), &mut ctx, &mut rig.services());
        assert_eq!(step, Step::Continue);
        assert!(!ctx.is_duplicate);

        let mut ctx = ProcessingContext::default();
        let step = dedup.process(&flood_event(b"hello", 100), &mut ctx, &mut rig.services());
        assert_eq!(step, Step::Drop);
        assert!(ctx.is_duplicate);
        assert_eq!(dedup.duplicate_count(), 1);
    }

    #[test]
    fn entries_expire_after_timeout() {
        let mut rig = TestRig::new();
        let mut dedup = dedup();

        let mut ctx = ProcessingContext::default();
        dedup.process(&flood_event(b"hello", 0), &mut ctx, &mut rig.services());

        // Just inside the window: still a duplicate.
        let mut ctx = ProcessingContext::default();
        let step = dedup.process(&flood_event(b"hello", 60_000), &mut ctx, &mut rig.services());
        assert_eq!(step, Step::Drop);

        // Past the window: treated as new. (The 60 s probe above refreshed
        // nothing; expiry is measured from first insertion.)
        let mut ctx = ProcessingContext::default();
        let step = dedup.process(&flood_event(b"hello", 60_001), &mut ctx, &mut rig.services());
        assert_eq!(step, Step::Continue);
    }

    #[test]
    fn cache_overflow_replaces_oldest() {
        let mut rig = TestRig::new();
        let mut dedup = Deduplicator::new(&DedupParams { cache_len: 2, timeout_ms: 60_000 });

        for (i, payload) in [b"a", b"b", b"c"].iter().enumerate() {
            let mut ctx = ProcessingContext::default();
            dedup.process(&flood_event(*payload, i as u64), &mut ctx, &mut rig.services());
        }

        // "a" was evicted by "c"; it dispatches as new again.
        let mut ctx = ProcessingContext::default();
        let step = dedup.process(&flood_event(b"a", 10), &mut ctx, &mut rig.services());
        assert_eq!(step, Step::Continue);
    }

    #[test]
    fn direct_trace_hash_varies_with_path_length() {
        let mut packet = Packet::new(RouteType::Direct, PayloadType::Trace);
        packet.payload = vec![0u8; 12];
        let bare = Deduplicator::packet_hash(&packet);

        packet.path.push(0x30);
        let annotated = Deduplicator::packet_hash(&packet);
        assert_ne!(bare, annotated);

        // Flood frames ignore the path for hashing.
        let mut flood = Packet::new(RouteType::Flood, PayloadType::GrpTxt);
        flood.payload = vec![0u8; 12];
        let before = Deduplicator::packet_hash(&flood);
        flood.path.push(0x30);
        assert_eq!(before, Deduplicator::packet_hash(&flood));
    }

    #[test]
    fn source_node_from_transport_codes_or_path() {
        let mut packet = Packet::new(RouteType::TransportFlood, PayloadType::TxtMsg);
        packet.transport_codes = Some([0x1234, 0]);
        assert_eq!(Deduplicator::extract_source_node(&packet), 0x1234);

        let mut packet = Packet::new(RouteType::Flood, PayloadType::TxtMsg);
        packet.path = vec![0x34, 0x12, 0x56];
        assert_eq!(Deduplicator::extract_source_node(&packet), 0x1234);

        let packet = Packet::new(RouteType::Flood, PayloadType::TxtMsg);
        assert_eq!(Deduplicator::extract_source_node(&packet), 0);
    }
}
