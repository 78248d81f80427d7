//! Node configuration record.
//!
//! One plain value constructed at startup (from CLI flags, a file, or test
//! code) and handed to [`crate::Engine::new`]. Defaults mirror the reference
//! firmware's compile-time configuration.

/// Forwarding and delay-calculation parameters.
#[derive(Debug, Clone)]
pub struct ForwardingParams {
    /// Master switch for flood forwarding.
    pub enabled: bool,
    /// Frames whose path already has this many hops are not forwarded.
    pub max_path_len: usize,
    /// Frames weaker than this RSSI are not worth repeating.
    pub min_rssi_dbm: i16,
    /// Base of the exponential SNR-to-delay curve.
    pub rx_delay_base: f32,
    /// Jitter slot size as a multiple of the frame airtime.
    pub tx_delay_factor: f32,
    /// Post-TX silence as a multiple of the spent airtime (0 = disabled).
    pub airtime_budget_factor: f32,
    /// Delays below this threshold transmit immediately.
    pub min_delay_threshold_ms: u64,
    /// Number of random jitter slots.
    pub tx_jitter_slots: u32,
    /// Capacity of the delayed-send queue.
    pub delay_queue_len: usize,
    /// Scratch buffer size for encoded frames.
    pub max_encoded_len: usize,
}

impl Default for ForwardingParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_path_len: 64,
            min_rssi_dbm: -120,
            rx_delay_base: 2.5,
            tx_delay_factor: 2.0,
            airtime_budget_factor: 0.0,
            min_delay_threshold_ms: 20,
            tx_jitter_slots: 6,
            delay_queue_len: 4,
            max_encoded_len: 256,
        }
    }
}

/// Deduplication cache parameters.
#[derive(Debug, Clone)]
pub struct DedupParams {
    /// Number of cache slots.
    pub cache_len: usize,
    /// Entries older than this are expired.
    pub timeout_ms: u64,
}

impl Default for DedupParams {
    fn default() -> Self {
        Self { cache_len: 16, timeout_ms: 60_000 }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Human-readable node name used in responses and adverts.
    pub node_name: String,
    /// Private channel secrets as 32-digit hex strings (up to 8).
    pub private_channel_keys: Vec<String>,
    /// Override the public-key-derived node hash.
    pub fixed_node_hash: Option<u8>,
    /// Override the uid-derived node id.
    pub fixed_node_id: Option<u16>,
    /// Platform unique id, folded into the 16-bit node id.
    pub device_uid: [u8; 8],
    /// Initial latitude/longitude in microdegrees (persisted location wins).
    pub initial_location: Option<(i32, i32)>,
    /// Forwarding parameters.
    pub forwarding: ForwardingParams,
    /// Deduplication parameters.
    pub dedup: DedupParams,
    /// RX queue capacity.
    pub rx_queue_len: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node_name: "Embermesh".to_owned(),
            private_channel_keys: Vec::new(),
            fixed_node_hash: None,
            fixed_node_id: None,
            device_uid: [0; 8],
            initial_location: None,
            forwarding: ForwardingParams::default(),
            dedup: DedupParams::default(),
            rx_queue_len: 16,
        }
    }
}
