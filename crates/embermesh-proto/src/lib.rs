//! MeshCore-compatible wire format.
//!
//! A frame on the air is:
//!
//! ```text
//! [header: 1 byte] [transport codes: 4 bytes, transport routes only]
//! [path length: 1 byte] [path: 0..=64 bytes] [payload: 0..=184 bytes]
//! ```
//!
//! The header byte packs the route type (bits 0-1), the payload type
//! (bits 2-5) and the payload version (bits 6-7). For flood-routed frames
//! each path byte is a one-byte node hash; for trace frames each path byte
//! is a hop's SNR measurement in quarter-dB.
//!
//! [`Packet`] is the decoded form. [`Packet::decode`] and [`Packet::encode`]
//! are exact inverses for every structurally valid packet; the codec never
//! normalizes, pads or reorders anything, so a decode/encode round trip is
//! byte-identical.

pub mod advert;
pub mod errors;
pub mod header;
pub mod packet;

pub use advert::{Advert, AdvertKind};
pub use errors::{ProtocolError, Result};
pub use header::{PayloadType, RouteType};
pub use packet::Packet;

/// Maximum number of path bytes in a frame.
pub const MAX_PATH_LEN: usize = 64;

/// Maximum payload size in bytes.
pub const MAX_PAYLOAD_LEN: usize = 184;

/// Smallest frame that can possibly decode (header + path length).
pub const MIN_FRAME_LEN: usize = 2;

/// Largest frame the radio will carry.
pub const MAX_FRAME_LEN: usize = 255;
