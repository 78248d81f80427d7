//! Priority-ordered processor pipeline.
//!
//! Every received frame is dispatched through the registered processors in
//! ascending priority order. A processor sees the immutable [`PacketEvent`]
//! plus a mutable [`ProcessingContext`] carrying the verdicts of earlier
//! stages, and returns a [`Step`] controlling the rest of the chain.
//!
//! Processors must not block the dispatch thread for longer than a radio
//! send; anything slower is deferred to the per-loop [`PacketProcessor::poll`]
//! hook.

use tracing::debug;

use embermesh_proto::Packet;

use crate::battery::PowerTelemetry;
use crate::channels::ChannelSet;
use crate::engine::LinkStats;
use crate::env::Env;
use crate::identity::Identity;
use crate::neighbors::NeighborTable;
use crate::node::NodeState;
use crate::settings::ForwardingParams;
use crate::time_sync::TimeSync;
use crate::transmitter::Transmitter;

/// Maximum number of registered processors.
pub const MAX_PROCESSORS: usize = 8;

/// A received frame with its radio measurements.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// The decoded frame.
    pub packet: Packet,
    /// Received signal strength in dBm.
    pub rssi_dbm: i16,
    /// Received SNR in quarter-dB units.
    pub snr_quarter_db: i8,
    /// Engine clock at reception.
    pub received_at_ms: u64,
}

/// Verdict a processor returns about the rest of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep running later processors.
    Continue,
    /// End the chain; the packet was handled and side effects stand.
    Stop,
    /// End the chain; the packet is invalid or a duplicate.
    Drop,
}

/// Mutable state threaded through one dispatch.
#[derive(Debug, Clone, Default)]
pub struct ProcessingContext {
    /// Set by the deduplicator when the frame was seen recently.
    pub is_duplicate: bool,
    /// Set by the forwarder when the frame qualified for repeating.
    pub should_forward: bool,
    /// Set when a frame is addressed to this node.
    pub is_for_us: bool,
    /// Hops the frame has taken so far.
    pub hop_count: u8,
    /// Best-effort source node id.
    pub source_node: u16,
    /// Best-effort target node id.
    pub target_node: u16,
    /// Content hash computed by the deduplicator, for later logging.
    pub dedup_hash: u32,
}

/// Shared engine state lent to processors for one call.
///
/// The engine splits itself into the dispatcher on one side and this view on
/// the other, so processors can transmit and mutate node state while the
/// pipeline itself stays borrowed.
pub struct Services<'a> {
    /// Time and randomness.
    pub env: &'a dyn Env,
    /// The transmitter arbiter.
    pub tx: &'a mut Transmitter,
    /// Node identifiers and location.
    pub node: &'a mut NodeState,
    /// Identity keypair for advert signing.
    pub identity: &'a Identity,
    /// Configured text channels.
    pub channels: &'a ChannelSet,
    /// Synchronized wall clock.
    pub time: &'a mut TimeSync,
    /// Advert-fed neighbor table.
    pub neighbors: &'a mut NeighborTable,
    /// Platform battery telemetry.
    pub telemetry: &'a dyn PowerTelemetry,
    /// Receive-side counters.
    pub stats: &'a mut LinkStats,
    /// Forwarding parameters.
    pub forwarding: &'a ForwardingParams,
}

/// A stage of the receive pipeline.
pub trait PacketProcessor {
    /// Stable name, also the idempotency key for registration.
    fn name(&self) -> &'static str;

    /// Smaller runs earlier.
    fn priority(&self) -> u8;

    /// Handle one received frame.
    fn process(
        &mut self,
        event: &PacketEvent,
        ctx: &mut ProcessingContext,
        services: &mut Services<'_>,
    ) -> Step;

    /// Per-main-loop-iteration timer hook (delay queues, pending sends).
    fn poll(&mut self, now_ms: u64, services: &mut Services<'_>) {
        let _ = (now_ms, services);
    }

    /// True while the processor holds deferred work (blocks platform sleep).
    fn has_pending_work(&self) -> bool {
        false
    }
}

/// The processor pipeline.
#[derive(Default)]
pub struct Dispatcher {
    processors: Vec<Box<dyn PacketProcessor>>,
}

impl Dispatcher {
    /// Empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor and re-sort by priority.
    ///
    /// Idempotent by name; registrations beyond [`MAX_PROCESSORS`] are
    /// ignored. Sorting is stable, so equal priorities keep insertion order.
    pub fn add_processor(&mut self, processor: Box<dyn PacketProcessor>) {
        if self.processors.len() >= MAX_PROCESSORS {
            debug!(name = processor.name(), "processor table full, ignoring");
            return;
        }
        if self.processors.iter().any(|p| p.name() == processor.name()) {
            return;
        }

        self.processors.push(processor);
        self.processors.sort_by_key(|p| p.priority());
    }

    /// Number of registered processors.
    #[must_use]
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Run one frame through the pipeline.
    ///
    /// Returns the final verdict: [`Step::Continue`] when every processor
    /// ran, otherwise the verdict that ended the chain.
    pub fn dispatch(&mut self, event: &PacketEvent, services: &mut Services<'_>) -> Step {
        let mut ctx = ProcessingContext::default();

        for processor in &mut self.processors {
            match processor.process(event, &mut ctx, services) {
                Step::Continue => {}
                Step::Stop => {
                    debug!(processor = processor.name(), "pipeline stopped");
                    return Step::Stop;
                }
                Step::Drop => {
                    debug!(processor = processor.name(), "packet dropped");
                    return Step::Drop;
                }
            }
        }

        Step::Continue
    }

    /// Drive every processor's timer hook.
    pub fn poll_all(&mut self, now_ms: u64, services: &mut Services<'_>) {
        for processor in &mut self.processors {
            processor.poll(now_ms, services);
        }
    }

    /// True while any processor holds deferred work.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        self.processors.iter().any(|p| p.has_pending_work())
    }
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names: Vec<_> = self.processors.iter().map(|p| p.name()).collect();
        f.debug_struct("Dispatcher").field("processors", &names).finish()
    }
}
