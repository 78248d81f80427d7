//! A complete simulated repeater node.

use embermesh_core::{Engine, EngineError, Settings, estimate_airtime_ms};
use embermesh_proto::Packet;

use crate::env::{SimClock, SimEnv};
use crate::radio::{SimRadio, TransmittedFrame};
use crate::storage::MemStorage;
use crate::telemetry::SimTelemetry;

/// A full engine wired to virtual time, radio, storage and telemetry.
///
/// Time only moves through [`TestNode::run_for`], which marches the clock
/// one millisecond at a time, ticks the engine, and completes in-flight
/// transmissions after their computed airtime — so scheduling, jitter and
/// half-duplex arbitration behave exactly as on hardware, just faster.
pub struct TestNode {
    /// The engine under test.
    pub engine: Engine,
    /// Shared virtual clock.
    pub clock: SimClock,
    /// The virtual radio (inspect transmissions here).
    pub radio: SimRadio,
    /// Scriptable telemetry.
    pub telemetry: SimTelemetry,
    /// Shared storage (clone it to survive a "reboot").
    pub storage: MemStorage,
    tx_done_at_ms: Option<u64>,
    completed_sends: usize,
}

impl TestNode {
    /// Node with the standard scenario settings: name "ember", fixed hash
    /// 0x5A, two private channels.
    ///
    /// # Errors
    ///
    /// [`EngineError`] when engine construction fails (it cannot with these
    /// settings).
    pub fn new(seed: u64) -> Result<Self, EngineError> {
        let settings = Settings {
            node_name: "ember".to_owned(),
            fixed_node_hash: Some(0x5A),
            private_channel_keys: vec![
                "00112233445566778899AABBCCDDEEFF".to_owned(),
                "FFEEDDCCBBAA99887766554433221100".to_owned(),
            ],
            ..Settings::default()
        };
        Self::with_settings(settings, seed, MemStorage::new())
    }

    /// Node with explicit settings and storage.
    ///
    /// # Errors
    ///
    /// [`EngineError`] when the channel configuration is unusable.
    pub fn with_settings(
        settings: Settings,
        seed: u64,
        storage: MemStorage,
    ) -> Result<Self, EngineError> {
        let clock = SimClock::new();
        let radio = SimRadio::new(clock.clone());
        let telemetry = SimTelemetry::new();

        let engine = Engine::new(
            settings,
            Box::new(SimEnv::new(clock.clone(), seed)),
            Box::new(radio.clone()),
            Box::new(storage.clone()),
            Box::new(telemetry.clone()),
        )?;

        Ok(Self {
            engine,
            clock,
            radio,
            telemetry,
            storage,
            tx_done_at_ms: None,
            completed_sends: 0,
        })
    }

    /// Inject a frame as if the radio had received it.
    pub fn receive(&mut self, packet: &Packet, rssi_dbm: i16, snr_quarter_db: i8) {
        let raw = packet.encode_to_vec().unwrap_or_default();
        self.receive_raw(&raw, rssi_dbm, snr_quarter_db);
    }

    /// Inject raw bytes as if the radio had received them.
    pub fn receive_raw(&mut self, raw: &[u8], rssi_dbm: i16, snr_quarter_db: i8) {
        self.engine.handle_rx(raw, rssi_dbm, snr_quarter_db);
    }

    /// March virtual time forward, ticking the engine each millisecond.
    pub fn run_for(&mut self, ms: u64) {
        for _ in 0..ms {
            self.clock.advance(1);
            self.complete_due_tx();
            self.engine.tick();
            self.note_new_sends();
        }
    }

    /// Run a single engine tick at the current time.
    pub fn tick(&mut self) {
        self.complete_due_tx();
        self.engine.tick();
        self.note_new_sends();
    }

    fn note_new_sends(&mut self) {
        let sent = self.radio.sent();
        if sent.len() > self.completed_sends && self.tx_done_at_ms.is_none() {
            let frame = &sent[self.completed_sends];
            self.tx_done_at_ms = Some(frame.at_ms + estimate_airtime_ms(frame.bytes.len()));
        }
    }

    fn complete_due_tx(&mut self) {
        if let Some(done_at) = self.tx_done_at_ms {
            if self.clock.now_ms() >= done_at {
                self.engine.on_tx_done();
                self.tx_done_at_ms = None;
                self.completed_sends += 1;
                // A queued send may already be waiting behind this one.
                self.note_new_sends();
            }
        }
    }

    /// All transmissions so far.
    #[must_use]
    pub fn sent(&self) -> Vec<TransmittedFrame> {
        self.radio.sent()
    }

    /// All transmissions, decoded.
    #[must_use]
    pub fn sent_packets(&self) -> Vec<(Packet, u64)> {
        self.radio
            .sent()
            .iter()
            .filter_map(|frame| Packet::decode(&frame.bytes).ok().map(|p| (p, frame.at_ms)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_boots_with_stable_identity() {
        let node = TestNode::new(1).unwrap();
        assert_eq!(node.engine.node().node_hash(), 0x5A);
        assert_eq!(node.engine.channels().private_count(), 2);
    }

    #[test]
    fn reboot_over_shared_storage_keeps_identity() {
        let storage = MemStorage::new();
        let settings = Settings::default();

        let first =
            TestNode::with_settings(settings.clone(), 1, storage.clone()).unwrap();
        let first_key = *first.engine.identity().public_key();

        let second = TestNode::with_settings(settings, 2, storage).unwrap();
        assert_eq!(*second.engine.identity().public_key(), first_key);
    }

    #[test]
    fn different_storage_means_different_identity() {
        let a = TestNode::with_settings(Settings::default(), 1, MemStorage::new()).unwrap();
        let b = TestNode::with_settings(Settings::default(), 2, MemStorage::new()).unwrap();
        assert_ne!(a.engine.identity().public_key(), b.engine.identity().public_key());
    }
}
