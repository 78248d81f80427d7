//! Flood forwarding with SNR-adaptive delay.
//!
//! The repeater's reason to exist. Eligible flood frames get this node's
//! hash appended to their path and are re-transmitted after a delay shaped
//! so that the receiver with the *worst* copy repeats first: a strong SNR
//! means the sender is nearby and another repeater probably heard it too, so
//! strong receivers back off and let the edge of the coverage area extend
//! the flood. A slotted random jitter on top decorrelates repeaters with
//! similar SNR.
//!
//! Delays below the threshold transmit inline; everything else goes to a
//! small priority queue drained from the main loop.

use tracing::{debug, warn};

use embermesh_proto::Packet;

use crate::dispatch::{PacketEvent, PacketProcessor, ProcessingContext, Services, Step};
use crate::settings::ForwardingParams;
use crate::transmitter::estimate_airtime_ms;

/// A frame waiting in the delayed-send queue.
#[derive(Debug, Clone)]
struct DelayedFrame {
    bytes: Vec<u8>,
    scheduled_at_ms: u64,
}

/// Flood forwarder with its delayed-send priority queue.
#[derive(Debug)]
pub struct PacketForwarder {
    params: ForwardingParams,
    queue: Vec<DelayedFrame>,
    forwarded_count: u32,
    dropped_count: u32,
    delayed_count: u32,
}

impl PacketForwarder {
    /// Forwarder with the given parameters.
    #[must_use]
    pub fn new(params: ForwardingParams) -> Self {
        Self {
            params,
            queue: Vec::new(),
            forwarded_count: 0,
            dropped_count: 0,
            delayed_count: 0,
        }
    }

    /// Frames re-transmitted (immediately or from the delay queue).
    #[must_use]
    pub fn forwarded_count(&self) -> u32 {
        self.forwarded_count
    }

    /// Frames dropped (queue full, encode failure, send failure).
    #[must_use]
    pub fn dropped_count(&self) -> u32 {
        self.dropped_count
    }

    /// Frames that went through the delay queue.
    #[must_use]
    pub fn delayed_count(&self) -> u32 {
        self.delayed_count
    }

    /// Frames currently waiting in the delay queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Eligibility gate; first failure wins.
    fn should_forward(&self, event: &PacketEvent, ctx: &ProcessingContext, our_hash: u8) -> bool {
        if ctx.is_duplicate {
            return false;
        }

        if !event.packet.route.is_flood() {
            return false;
        }

        if event.packet.path.len() >= self.params.max_path_len {
            debug!(path_len = event.packet.path.len(), "path too long, not forwarding");
            return false;
        }

        if event.rssi_dbm < self.params.min_rssi_dbm {
            debug!(rssi = event.rssi_dbm, "signal too weak, not forwarding");
            return false;
        }

        // Loop prevention: never repeat a frame we already relayed.
        if event.packet.path.contains(&our_hash) {
            debug!("our hash already in path, not forwarding");
            return false;
        }

        if event.packet.validate().is_err() {
            return false;
        }

        true
    }

    /// Normalized link score in `[0, 1]` from a quarter-dB SNR.
    fn packet_score(snr_quarter_db: i8) -> f32 {
        let snr_db = f32::from(snr_quarter_db) / 4.0;
        ((snr_db + 20.0) / 40.0).clamp(0.0, 1.0)
    }

    /// SNR-shaped component of the forwarding delay.
    fn rx_delay_ms(&self, score: f32, airtime_ms: u64) -> u64 {
        if self.params.rx_delay_base <= 0.0 {
            return 0;
        }

        let multiplier = (self.params.rx_delay_base.powf(0.85 - score) - 1.0).max(0.0);
        (multiplier * airtime_ms as f32) as u64
    }

    /// Slotted random jitter component.
    fn tx_jitter_ms(&self, airtime_ms: u64, services: &Services<'_>) -> u64 {
        let slot_ms = (airtime_ms as f32 * self.params.tx_delay_factor) as u64;
        u64::from(services.env.random_range(self.params.tx_jitter_slots)) * slot_ms
    }

    fn enqueue_delayed(&mut self, bytes: Vec<u8>, scheduled_at_ms: u64) -> bool {
        if self.queue.len() >= self.params.delay_queue_len {
            warn!("delay queue full, dropping frame");
            return false;
        }

        // Keep the queue sorted by due time; ties preserve insertion order.
        let position = self
            .queue
            .iter()
            .position(|entry| entry.scheduled_at_ms > scheduled_at_ms)
            .unwrap_or(self.queue.len());
        self.queue.insert(position, DelayedFrame { bytes, scheduled_at_ms });
        self.delayed_count += 1;
        true
    }

    fn drain_queue(&mut self, now_ms: u64, services: &mut Services<'_>) {
        while let Some(head) = self.queue.first() {
            if now_ms < head.scheduled_at_ms {
                return;
            }
            if services.tx.is_transmitting() {
                return;
            }

            let frame = self.queue.remove(0);
            match services.tx.transmit(&frame.bytes, now_ms) {
                Ok(()) => {
                    self.forwarded_count += 1;
                    debug!(len = frame.bytes.len(), "transmitted delayed frame");
                }
                Err(err) => {
                    // Transient failure: push the frame back one airtime
                    // slot and stop draining this iteration.
                    let airtime = estimate_airtime_ms(frame.bytes.len());
                    let retry_at = now_ms + 2 * airtime;
                    debug!(%err, retry_at, "delayed send failed, rescheduling");
                    if !self.enqueue_delayed(frame.bytes, retry_at) {
                        self.dropped_count += 1;
                    }
                    return;
                }
            }
        }
    }
}

impl PacketProcessor for PacketForwarder {
    fn name(&self) -> &'static str {
        "PacketForwarder"
    }

    fn priority(&self) -> u8 {
        20
    }

    fn process(
        &mut self,
        event: &PacketEvent,
        ctx: &mut ProcessingContext,
        services: &mut Services<'_>,
    ) -> Step {
        if !self.params.enabled {
            return Step::Continue;
        }

        let our_hash = services.node.node_hash();
        if !self.should_forward(event, ctx, our_hash) {
            return Step::Continue;
        }

        ctx.should_forward = true;

        let mut forward: Packet = event.packet.clone();
        forward.path.push(our_hash);

        let mut scratch = vec![0u8; self.params.max_encoded_len];
        let len = match forward.encode(&mut scratch) {
            Ok(len) => len,
            Err(err) => {
                warn!(%err, "failed to encode frame for forwarding");
                self.dropped_count += 1;
                return Step::Continue;
            }
        };
        scratch.truncate(len);

        let airtime = estimate_airtime_ms(len);
        let score = Self::packet_score(event.snr_quarter_db);
        let rx_delay = self.rx_delay_ms(score, airtime);
        let tx_jitter = self.tx_jitter_ms(airtime, services);
        let total_delay = rx_delay + tx_jitter;

        let now = event.received_at_ms;
        if total_delay < self.params.min_delay_threshold_ms {
            match services.tx.transmit(&scratch, now) {
                Ok(()) => {
                    self.forwarded_count += 1;
                    debug!(len, "forwarded immediately");
                }
                Err(err) => {
                    debug!(%err, "immediate forward failed");
                    self.dropped_count += 1;
                }
            }
        } else if self.enqueue_delayed(scratch, now + total_delay) {
            debug!(
                rx_delay,
                tx_jitter,
                total_delay,
                score_pct = (score * 100.0) as u32,
                "queued for delayed forward"
            );
        } else {
            self.dropped_count += 1;
        }

        Step::Continue
    }

    fn poll(&mut self, now_ms: u64, services: &mut Services<'_>) {
        self.drain_queue(now_ms, services);
    }

    fn has_pending_work(&self) -> bool {
        !self.queue.is_empty()
    }
}
