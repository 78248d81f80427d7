//! In-crate test doubles: deterministic environment, recording radio,
//! in-memory storage, canned telemetry, and a pre-wired rig bundling the
//! shared state every processor test needs. The full simulation harness
//! lives in `embermesh-harness`; these stay minimal on purpose.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::battery::PowerTelemetry;
use crate::channels::ChannelSet;
use crate::dispatch::Services;
use crate::engine::LinkStats;
use crate::env::Env;
use crate::errors::StorageError;
use crate::identity::Identity;
use crate::neighbors::NeighborTable;
use crate::node::NodeState;
use crate::radio::{RadioDriver, RadioError};
use crate::settings::{ForwardingParams, Settings};
use crate::storage::{NvStorage, Region};
use crate::time_sync::TimeSync;
use crate::transmitter::Transmitter;

/// Deterministic environment with a settable clock and a pinned RNG.
#[derive(Debug, Default)]
pub struct FakeEnv {
    now_ms: Cell<u64>,
    random: Cell<u32>,
    entropy: Cell<u8>,
}

impl FakeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }

    /// Pin the value `random_range` returns (clamped to the bound).
    pub fn set_random(&self, value: u32) {
        self.random.set(value);
    }
}

impl Env for FakeEnv {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn random_range(&self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.random.get().min(bound - 1)
    }

    fn fill_random(&self, buf: &mut [u8]) {
        for byte in buf {
            let next = self.entropy.get().wrapping_add(0x9E);
            self.entropy.set(next);
            *byte = next;
        }
    }
}

/// Radio double recording every successful send.
#[derive(Debug, Clone, Default)]
pub struct RecordingRadio {
    inner: Rc<RefCell<RadioInner>>,
}

#[derive(Debug, Default)]
struct RadioInner {
    sent: Vec<Vec<u8>>,
    fail_next: u32,
    receive_armed: bool,
}

impl RecordingRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames the radio accepted, in send order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.borrow().sent.clone()
    }

    /// Make the next `n` sends fail.
    pub fn fail_next_sends(&self, n: u32) {
        self.inner.borrow_mut().fail_next = n;
    }

    pub fn receive_armed(&self) -> bool {
        self.inner.borrow().receive_armed
    }
}

impl RadioDriver for RecordingRadio {
    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(RadioError("scripted failure".to_owned()));
        }
        inner.sent.push(frame.to_vec());
        inner.receive_armed = false;
        Ok(())
    }

    fn enter_receive(&mut self) {
        self.inner.borrow_mut().receive_armed = true;
    }
}

/// Shared in-memory storage backend.
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    regions: Rc<RefCell<HashMap<Region, Vec<u8>>>>,
}

impl NvStorage for MemStorage {
    fn read(&mut self, region: Region) -> Option<Vec<u8>> {
        self.regions.borrow().get(&region).cloned()
    }

    fn write(&mut self, region: Region, data: &[u8]) -> Result<(), StorageError> {
        self.regions.borrow_mut().insert(region, data.to_vec());
        Ok(())
    }
}

/// Telemetry double with settable readings. Defaults to USB powered.
#[derive(Debug)]
pub struct FixedTelemetry {
    mv: Cell<u16>,
    percent: Cell<u8>,
    projected: Cell<Option<u32>>,
    usb: Cell<bool>,
}

impl Default for FixedTelemetry {
    fn default() -> Self {
        Self {
            mv: Cell::new(5_000),
            percent: Cell::new(100),
            projected: Cell::new(None),
            usb: Cell::new(true),
        }
    }
}

impl FixedTelemetry {
    pub fn set(&self, mv: u16, percent: u8, projected: Option<u32>, usb: bool) {
        self.mv.set(mv);
        self.percent.set(percent);
        self.projected.set(projected);
        self.usb.set(usb);
    }
}

impl PowerTelemetry for FixedTelemetry {
    fn battery_millivolts(&self) -> u16 {
        self.mv.get()
    }

    fn battery_percent(&self) -> u8 {
        self.percent.get()
    }

    fn projected_hours(&self) -> Option<u32> {
        self.projected.get()
    }

    fn usb_powered(&self) -> bool {
        self.usb.get()
    }
}

/// Pre-wired shared state for processor tests: node hash 0x5A, name
/// "ember", two private channels, recording radio.
pub struct TestRig {
    pub env: FakeEnv,
    pub radio: RecordingRadio,
    pub tx: Transmitter,
    pub identity: Identity,
    pub node: NodeState,
    pub channels: ChannelSet,
    pub time: TimeSync,
    pub neighbors: NeighborTable,
    pub telemetry: FixedTelemetry,
    pub stats: LinkStats,
    pub forwarding: ForwardingParams,
}

impl TestRig {
    pub fn new() -> Self {
        let env = FakeEnv::new();
        let radio = RecordingRadio::new();

        let settings = Settings {
            node_name: "ember".to_owned(),
            fixed_node_hash: Some(0x5A),
            private_channel_keys: vec![
                "00112233445566778899AABBCCDDEEFF".to_owned(),
                "FFEEDDCCBBAA99887766554433221100".to_owned(),
            ],
            ..Settings::default()
        };

        let mut boot_storage = MemStorage::default();
        let identity = Identity::load_or_generate(&mut boot_storage, &env);
        let node = NodeState::new(&settings, &identity, Box::new(boot_storage));
        let channels = ChannelSet::new(&settings.private_channel_keys)
            .unwrap_or_else(|_| unreachable!("test channel keys are valid"));
        let forwarding = settings.forwarding.clone();
        let tx = Transmitter::new(Box::new(radio.clone()), forwarding.airtime_budget_factor);

        Self {
            env,
            radio,
            tx,
            identity,
            node,
            channels,
            time: TimeSync::new(),
            neighbors: NeighborTable::new(),
            telemetry: FixedTelemetry::default(),
            stats: LinkStats::default(),
            forwarding,
        }
    }

    /// Borrow the rig as the `Services` view processors expect.
    pub fn services(&mut self) -> Services<'_> {
        Services {
            env: &self.env,
            tx: &mut self.tx,
            node: &mut self.node,
            identity: &self.identity,
            channels: &self.channels,
            time: &mut self.time,
            neighbors: &mut self.neighbors,
            telemetry: &self.telemetry,
            stats: &mut self.stats,
            forwarding: &self.forwarding,
        }
    }
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}
