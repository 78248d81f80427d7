//! The engine aggregate and its cooperative main loop hooks.
//!
//! [`Engine`] owns every component: the RX queue, the processor pipeline,
//! the transmitter arbiter, the channel set, identity and node state, and
//! the battery announcer. The platform glue calls exactly four methods:
//!
//! - [`Engine::handle_rx`] from the radio receive callback,
//! - [`Engine::tick`] from the main loop,
//! - [`Engine::on_tx_done`] / [`Engine::on_tx_timeout`] from the radio's
//!   transmit callbacks.
//!
//! Everything runs on one thread; what would be process-wide singletons on
//! the firmware side is a single owned aggregate here.

use tracing::{debug, warn};

use embermesh_proto::Packet;

use crate::battery::{BatteryAnnouncer, PowerTelemetry};
use crate::channels::ChannelSet;
use crate::commands::CommandHandler;
use crate::dedup::Deduplicator;
use crate::discovery::DiscoveryResponder;
use crate::dispatch::{Dispatcher, PacketEvent, Services};
use crate::env::Env;
use crate::errors::EngineError;
use crate::forward::PacketForwarder;
use crate::identity::Identity;
use crate::logger::PacketLogger;
use crate::neighbors::{NeighborMonitor, NeighborTable};
use crate::node::NodeState;
use crate::radio::RadioDriver;
use crate::rx_queue::RxQueue;
use crate::settings::Settings;
use crate::storage::NvStorage;
use crate::time_sync::TimeSync;
use crate::trace::TraceHandler;
use crate::transmitter::{Transmitter, estimate_airtime_ms};

/// Receive-side counters (the transmitter keeps its own).
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    /// Frames decoded and queued.
    pub rx_count: u32,
    /// Estimated receive airtime in milliseconds.
    pub rx_airtime_ms: u64,
    /// Frames that failed to decode.
    pub decode_failures: u32,
}

impl LinkStats {
    /// Zero the counters (`!status clear`).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The repeater engine.
pub struct Engine {
    settings: Settings,
    env: Box<dyn Env>,
    dispatcher: Dispatcher,
    rx_queue: RxQueue,
    tx: Transmitter,
    identity: Identity,
    node: NodeState,
    channels: ChannelSet,
    time: TimeSync,
    neighbors: NeighborTable,
    telemetry: Box<dyn PowerTelemetry>,
    battery: BatteryAnnouncer,
    stats: LinkStats,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("node", &self.node)
            .field("dispatcher", &self.dispatcher)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Boot the engine: load or create the identity, derive the node state,
    /// set up the channels, and register the standard processor pipeline.
    ///
    /// # Errors
    ///
    /// [`EngineError`] when the channel configuration is unusable. Identity
    /// and location corruption regenerate silently instead of failing.
    pub fn new(
        settings: Settings,
        env: Box<dyn Env>,
        radio: Box<dyn RadioDriver>,
        mut storage: Box<dyn NvStorage>,
        telemetry: Box<dyn PowerTelemetry>,
    ) -> Result<Self, EngineError> {
        let identity = Identity::load_or_generate(storage.as_mut(), env.as_ref());
        let node = NodeState::new(&settings, &identity, storage);
        let channels = ChannelSet::new(&settings.private_channel_keys)?;
        let tx = Transmitter::new(radio, settings.forwarding.airtime_budget_factor);

        let mut dispatcher = Dispatcher::new();
        dispatcher.add_processor(Box::new(Deduplicator::new(&settings.dedup)));
        if settings.forwarding.enabled {
            dispatcher.add_processor(Box::new(PacketForwarder::new(settings.forwarding.clone())));
            dispatcher.add_processor(Box::new(TraceHandler::new()));
        }
        dispatcher.add_processor(Box::new(CommandHandler::new()));
        dispatcher.add_processor(Box::new(DiscoveryResponder::new()));
        dispatcher.add_processor(Box::new(NeighborMonitor::new()));
        dispatcher.add_processor(Box::new(PacketLogger::new()));

        debug!(processors = dispatcher.processor_count(), "pipeline registered");

        Ok(Self {
            rx_queue: RxQueue::new(settings.rx_queue_len),
            settings,
            env,
            dispatcher,
            tx,
            identity,
            node,
            channels,
            time: TimeSync::new(),
            neighbors: NeighborTable::new(),
            telemetry,
            battery: BatteryAnnouncer::new(),
            stats: LinkStats::default(),
        })
    }

    /// Radio receive callback: decode and queue one raw frame.
    ///
    /// Decode failures are counted and logged, never fatal.
    pub fn handle_rx(&mut self, raw: &[u8], rssi_dbm: i16, snr_quarter_db: i8) {
        let packet = match Packet::decode(raw) {
            Ok(packet) => packet,
            Err(err) => {
                self.stats.decode_failures += 1;
                warn!(%err, len = raw.len(), "failed to decode frame");
                return;
            }
        };

        self.stats.rx_count += 1;
        self.stats.rx_airtime_ms += estimate_airtime_ms(raw.len());

        let event = PacketEvent {
            packet,
            rssi_dbm,
            snr_quarter_db,
            received_at_ms: self.env.now_ms(),
        };
        self.rx_queue.push(event);
    }

    /// One main-loop iteration: dispatch queued frames, then drive every
    /// deferred-send timer.
    pub fn tick(&mut self) {
        let now = self.env.now_ms();

        // Split the aggregate so the pipeline and the battery announcer can
        // run against the shared state without aliasing it.
        let Self {
            settings,
            env,
            dispatcher,
            rx_queue,
            tx,
            identity,
            node,
            channels,
            time,
            neighbors,
            telemetry,
            battery,
            stats,
        } = self;
        let mut services = Services {
            env: env.as_ref(),
            tx,
            node,
            identity,
            channels,
            time,
            neighbors,
            telemetry: telemetry.as_ref(),
            stats,
            forwarding: &settings.forwarding,
        };

        while let Some(event) = rx_queue.pop() {
            dispatcher.dispatch(&event, &mut services);
        }

        dispatcher.poll_all(now, &mut services);
        battery.poll(now, &mut services);
    }

    /// Radio callback: the in-flight transmission completed.
    pub fn on_tx_done(&mut self) {
        let now = self.env.now_ms();
        self.tx.on_tx_done(now);
    }

    /// Radio callback: the in-flight transmission timed out.
    pub fn on_tx_timeout(&mut self) {
        let now = self.env.now_ms();
        self.tx.on_tx_timeout(now);
    }

    /// True while any component holds deferred work; gates platform sleep.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        !self.rx_queue.is_empty() || self.tx.is_transmitting() || self.dispatcher.has_pending_work()
    }

    /// Receive counters.
    #[must_use]
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Frames dropped at the RX queue.
    #[must_use]
    pub fn rx_dropped(&self) -> u32 {
        self.rx_queue.dropped()
    }

    /// The transmitter arbiter (counters, busy state).
    #[must_use]
    pub fn transmitter(&self) -> &Transmitter {
        &self.tx
    }

    /// The node identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Node identifiers and location.
    #[must_use]
    pub fn node(&self) -> &NodeState {
        &self.node
    }

    /// The configured channels.
    #[must_use]
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// The advert-fed neighbor table.
    #[must_use]
    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }
}
