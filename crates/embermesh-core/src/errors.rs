//! Engine error types.
//!
//! Strongly-typed errors per layer. Transmit errors are transient by nature
//! and never escape the engine: every caller either drops the frame or
//! reschedules with backoff. Storage and configuration errors surface only
//! during construction.

use thiserror::Error;

use embermesh_crypto::CryptoError;
use embermesh_proto::ProtocolError;

/// Errors from the transmitter arbiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransmitError {
    /// A send is already in flight.
    #[error("transmitter busy")]
    Busy,

    /// The post-TX silence period has not elapsed.
    #[error("in silence period for another {remaining_ms} ms")]
    SilencePeriod {
        /// Milliseconds until transmission is allowed again.
        remaining_ms: u64,
    },

    /// Frame is empty or exceeds the radio maximum.
    #[error("invalid frame length {0}")]
    InvalidLength(usize),

    /// The radio driver rejected the send.
    #[error("radio error: {0}")]
    Radio(String),
}

impl TransmitError {
    /// True when retrying later can succeed (busy/silence), false for
    /// caller mistakes and hardware faults.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy | Self::SilencePeriod { .. })
    }
}

/// Errors from the channel layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Message text exceeds the channel maximum.
    #[error("text of {0} bytes exceeds the channel maximum")]
    TextTooLong(usize),

    /// No private channel at the given index.
    #[error("no channel at index {0}")]
    UnknownChannel(usize),

    /// A configured channel secret did not decode to a cipher key.
    #[error("invalid secret for channel {index}: {source}")]
    InvalidSecret {
        /// Channel index in the configuration.
        index: usize,
        /// Decoding failure.
        source: CryptoError,
    },

    /// Encoding the assembled packet failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors from non-volatile storage.
///
/// Corrupt contents are not an error: a bad magic byte reads as absence and
/// triggers regeneration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store failed to persist a region.
    #[error("storage write failed: {0}")]
    Write(String),
}

/// Errors that can abort engine construction.
///
/// Nothing in this enum occurs after startup; the running engine has no
/// fatal errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Channel configuration is unusable.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Identity could not be persisted.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
