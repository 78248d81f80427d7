//! Advert sub-payload parsing and assembly.
//!
//! An advert payload is `public_key(32) || timestamp(4, LE) ||
//! signature(64) || appdata`, where appdata is a flags byte followed by the
//! optional fields the flags announce: lat/lon as little-endian i32
//! microdegrees, two u16 feature words, and a name terminated by NUL or the
//! end of the frame. The ed25519 signature covers everything except itself:
//! `public_key || timestamp || appdata`.

use crate::errors::{ProtocolError, Result};

/// Fixed advert prefix: key + timestamp + signature. At least one appdata
/// byte (the flags) must follow.
pub const ADVERT_MIN_LEN: usize = 100;
/// Maximum bytes of appdata (flags + optional fields).
pub const ADVERT_MAX_APPDATA: usize = 32;
/// Longest advert name in bytes.
pub const ADVERT_MAX_NAME: usize = ADVERT_MAX_APPDATA - 1;

/// Flags bit: latitude/longitude present.
pub const ADVERT_FLAG_LATLON: u8 = 0x10;
/// Flags bit: feature word 1 present.
pub const ADVERT_FLAG_FEAT1: u8 = 0x20;
/// Flags bit: feature word 2 present.
pub const ADVERT_FLAG_FEAT2: u8 = 0x40;
/// Flags bit: name present.
pub const ADVERT_FLAG_NAME: u8 = 0x80;

/// Role announced in an advert's flags nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertKind {
    /// No declared role.
    None,
    /// Interactive chat node.
    Chat,
    /// Repeater (this firmware).
    Repeater,
    /// Room server.
    Room,
    /// Sensor node.
    Sensor,
    /// Unassigned nibble, preserved verbatim.
    Other(u8),
}

impl AdvertKind {
    /// Decode from the low nibble of the flags byte.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            0 => Self::None,
            1 => Self::Chat,
            2 => Self::Repeater,
            3 => Self::Room,
            4 => Self::Sensor,
            other => Self::Other(other),
        }
    }

    /// Raw nibble value.
    #[must_use]
    pub fn bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Chat => 1,
            Self::Repeater => 2,
            Self::Room => 3,
            Self::Sensor => 4,
            Self::Other(bits) => bits & 0x0F,
        }
    }

    /// Human-readable name for logging.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Chat => "Chat",
            Self::Repeater => "Repeater",
            Self::Room => "Room",
            Self::Sensor => "Sensor",
            Self::Other(_) => "Unknown",
        }
    }
}

/// Parsed advert fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advert {
    /// Announcing node's ed25519 public key.
    pub public_key: [u8; 32],
    /// Sender's wall-clock timestamp in seconds.
    pub timestamp: u32,
    /// Ed25519 signature over `public_key || timestamp || appdata`.
    pub signature: [u8; 64],
    /// Declared role.
    pub kind: AdvertKind,
    /// Latitude/longitude in microdegrees, when announced.
    pub location: Option<(i32, i32)>,
    /// Feature word 1, when announced.
    pub feat1: Option<u16>,
    /// Feature word 2, when announced.
    pub feat2: Option<u16>,
    /// Node name, when announced.
    pub name: Option<String>,
}

impl Advert {
    /// The announcing node's one-byte hash (first byte of its public key).
    #[must_use]
    pub fn node_hash(&self) -> u8 {
        self.public_key[0]
    }

    /// Parse an advert payload.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedAdvert`] when the payload is shorter than
    /// [`ADVERT_MIN_LEN`] or a flagged optional field is truncated. The
    /// packet decoder downgrades this to an unset advert view rather than
    /// failing the frame.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < ADVERT_MIN_LEN {
            return Err(ProtocolError::MalformedAdvert);
        }

        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&payload[0..32]);
        let timestamp = u32::from_le_bytes([payload[32], payload[33], payload[34], payload[35]]);
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&payload[36..100]);

        // Appdata (flags + optional fields) follows the signature and must
        // hold at least the flags byte.
        if payload.len() < ADVERT_MIN_LEN + 1 {
            return Err(ProtocolError::MalformedAdvert);
        }
        let flags = payload[100];
        let kind = AdvertKind::from_bits(flags);
        let mut idx = 101;

        let location = if flags & ADVERT_FLAG_LATLON != 0 {
            if idx + 8 > payload.len() {
                return Err(ProtocolError::MalformedAdvert);
            }
            let lat = i32::from_le_bytes([
                payload[idx],
                payload[idx + 1],
                payload[idx + 2],
                payload[idx + 3],
            ]);
            let lon = i32::from_le_bytes([
                payload[idx + 4],
                payload[idx + 5],
                payload[idx + 6],
                payload[idx + 7],
            ]);
            idx += 8;
            Some((lat, lon))
        } else {
            None
        };

        let feat1 = if flags & ADVERT_FLAG_FEAT1 != 0 {
            if idx + 2 > payload.len() {
                return Err(ProtocolError::MalformedAdvert);
            }
            let v = u16::from_le_bytes([payload[idx], payload[idx + 1]]);
            idx += 2;
            Some(v)
        } else {
            None
        };

        let feat2 = if flags & ADVERT_FLAG_FEAT2 != 0 {
            if idx + 2 > payload.len() {
                return Err(ProtocolError::MalformedAdvert);
            }
            let v = u16::from_le_bytes([payload[idx], payload[idx + 1]]);
            idx += 2;
            Some(v)
        } else {
            None
        };

        let name = if flags & ADVERT_FLAG_NAME != 0 {
            let rest = &payload[idx.min(payload.len())..];
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            let bytes = &rest[..end.min(ADVERT_MAX_NAME)];
            Some(String::from_utf8_lossy(bytes).into_owned())
        } else {
            None
        };

        Ok(Self { public_key, timestamp, signature, kind, location, feat1, feat2, name })
    }

    /// Bytes covered by the advert signature: `public_key || timestamp ||
    /// appdata`.
    #[must_use]
    pub fn signing_data(public_key: &[u8; 32], timestamp: u32, appdata: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 4 + appdata.len());
        out.extend_from_slice(public_key);
        out.extend_from_slice(&timestamp.to_le_bytes());
        out.extend_from_slice(appdata);
        out
    }

    /// Assemble a full advert payload from its parts.
    #[must_use]
    pub fn assemble(
        public_key: &[u8; 32],
        timestamp: u32,
        signature: &[u8; 64],
        appdata: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(ADVERT_MIN_LEN + appdata.len());
        out.extend_from_slice(public_key);
        out.extend_from_slice(&timestamp.to_le_bytes());
        out.extend_from_slice(signature);
        out.extend_from_slice(appdata);
        out
    }
}
