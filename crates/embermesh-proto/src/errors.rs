//! Protocol error types.
//!
//! Codec errors are values: the receive path drops the frame and keeps
//! running, the transmit path surfaces them to the caller. Nothing here is
//! ever fatal at run time.

use thiserror::Error;

use crate::{MAX_PATH_LEN, MAX_PAYLOAD_LEN};

/// Result alias for codec operations.
pub type Result<T> = core::result::Result<T, ProtocolError>;

/// Errors produced while decoding or encoding a wire frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame ends before a declared field is complete.
    #[error("frame truncated: need at least {expected} bytes, have {actual}")]
    Truncated {
        /// Minimum frame length required at the point of failure.
        expected: usize,
        /// Actual frame length.
        actual: usize,
    },

    /// Declared path length exceeds the protocol maximum.
    #[error("path length {0} exceeds maximum {MAX_PATH_LEN}")]
    PathTooLong(usize),

    /// Payload exceeds the protocol maximum.
    #[error("payload of {0} bytes exceeds maximum {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge(usize),

    /// Transport-routed packet is missing its transport codes.
    #[error("transport route requires transport codes")]
    TransportCodesMissing,

    /// Non-transport route carries transport codes.
    #[error("non-transport route must not carry transport codes")]
    UnexpectedTransportCodes,

    /// Payload version does not fit the 2-bit header field.
    #[error("payload version {0} does not fit in 2 bits")]
    VersionOutOfRange(u8),

    /// Destination buffer cannot hold the encoded frame.
    #[error("encode buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes the encoded frame requires.
        needed: usize,
        /// Bytes the caller provided.
        available: usize,
    },

    /// Advert sub-payload is malformed.
    #[error("malformed advert payload")]
    MalformedAdvert,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_bounds() {
        let msg = ProtocolError::PathTooLong(80).to_string();
        assert!(msg.contains("80"));
        assert!(msg.contains("64"));

        let msg = ProtocolError::PayloadTooLarge(200).to_string();
        assert!(msg.contains("200"));
        assert!(msg.contains("184"));
    }
}
