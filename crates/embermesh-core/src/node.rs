//! Mutable node state: name, derived identifiers, persisted location.

use tracing::{info, warn};

use crate::identity::{Identity, sanitize_node_hash};
use crate::settings::Settings;
use crate::storage::{NvStorage, Region};

/// Magic word guarding the persisted location region (big-endian "LO").
pub const LOCATION_MAGIC: u16 = 0x4C4F;

const LOCATION_LEN: usize = 2 + 4 + 4;

/// Node identifiers and location, owning the storage backend.
pub struct NodeState {
    name: String,
    node_id: u16,
    node_hash: u8,
    location: Option<(i32, i32)>,
    storage: Box<dyn NvStorage>,
}

impl core::fmt::Debug for NodeState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeState")
            .field("name", &self.name)
            .field("node_id", &self.node_id)
            .field("node_hash", &self.node_hash)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl NodeState {
    /// Assemble node state from settings, the loaded identity and storage.
    ///
    /// A persisted location wins over `settings.initial_location`; a
    /// configured fixed hash/id wins over the derived one.
    pub fn new(settings: &Settings, identity: &Identity, mut storage: Box<dyn NvStorage>) -> Self {
        let node_hash = settings.fixed_node_hash.unwrap_or_else(|| identity.node_hash());
        let node_id =
            settings.fixed_node_id.unwrap_or_else(|| derive_node_id(&settings.device_uid));

        let location = load_location(storage.as_mut()).or(settings.initial_location);

        info!(
            node_id = format_args!("{node_id:04X}"),
            node_hash = format_args!("{node_hash:02X}"),
            "node identifiers ready"
        );

        Self { name: settings.node_name.clone(), node_id, node_hash, location, storage }
    }

    /// Node name used in responses and adverts.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 16-bit node id (logging only; not part of the wire protocol).
    #[must_use]
    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// The one-byte node hash appended to flood paths.
    #[must_use]
    pub fn node_hash(&self) -> u8 {
        self.node_hash
    }

    /// Current location in microdegrees, when set.
    #[must_use]
    pub fn location(&self) -> Option<(i32, i32)> {
        self.location
    }

    /// Set and persist the location.
    pub fn set_location(&mut self, lat: i32, lon: i32) {
        self.location = Some((lat, lon));

        let mut bytes = Vec::with_capacity(LOCATION_LEN);
        bytes.extend_from_slice(&LOCATION_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&lat.to_be_bytes());
        bytes.extend_from_slice(&lon.to_be_bytes());

        if let Err(err) = self.storage.write(Region::Location, &bytes) {
            warn!(%err, "failed to persist location");
        }
    }

    /// Clear the location and invalidate the persisted copy.
    pub fn clear_location(&mut self) {
        self.location = None;

        if let Err(err) = self.storage.write(Region::Location, &[0u8; LOCATION_LEN]) {
            warn!(%err, "failed to clear persisted location");
        }
    }
}

fn load_location(storage: &mut dyn NvStorage) -> Option<(i32, i32)> {
    let bytes = storage.read(Region::Location)?;
    if bytes.len() < LOCATION_LEN {
        return None;
    }
    if u16::from_be_bytes([bytes[0], bytes[1]]) != LOCATION_MAGIC {
        return None;
    }

    let lat = i32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    let lon = i32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
    Some((lat, lon))
}

/// Fold an 8-byte platform uid into a sanitized 16-bit node id.
///
/// Never 0x0000, 0xFFFF or below 0x0100; the degenerate cases collapse to
/// `0x7C00 | low_byte`, matching the hash fallback convention.
#[must_use]
pub fn derive_node_id(uid: &[u8; 8]) -> u16 {
    let a = u16::from_be_bytes([uid[0], uid[1]]);
    let b = u16::from_be_bytes([uid[2], uid[3]]);
    let c = u16::from_be_bytes([uid[4], uid[5]]);
    let d = u16::from_be_bytes([uid[6], uid[7]]);
    let id = a ^ b ^ c ^ d;

    if id == 0 || id == 0xFFFF || id < 0x0100 { 0x7C00 | (id & 0x00FF) } else { id }
}

/// Sanitized node hash from an identity byte (re-exported convenience).
#[must_use]
pub fn derive_node_hash(public_key_byte: u8) -> u8 {
    sanitize_node_hash(public_key_byte)
}
