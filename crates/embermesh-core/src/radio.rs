//! Radio driver boundary and the fixed modulation parameters.
//!
//! The radio itself is an external collaborator. The engine only needs a
//! blocking send hand-off and a way to re-enter receive mode; everything
//! else (IRQ handling, RSSI/SNR measurement) happens on the platform side
//! and reaches the engine through [`crate::Engine::handle_rx`] and the
//! TX-done/TX-timeout callbacks.

use thiserror::Error;

/// Hard protocol parameters of the shared channel. Peers must match exactly.
pub mod params {
    /// Carrier frequency (EU 869.618 MHz).
    pub const FREQUENCY_HZ: u32 = 869_618_000;
    /// LoRa spreading factor.
    pub const SPREADING_FACTOR: u32 = 8;
    /// Bandwidth in hertz.
    pub const BANDWIDTH_HZ: u32 = 62_500;
    /// Coding rate parameter as the radio takes it.
    pub const CODING_RATE: u32 = 4;
    /// Preamble length in symbols.
    pub const PREAMBLE_LEN: u32 = 16;
    /// LoRa sync word (private networks).
    pub const SYNC_WORD: u8 = 0x12;
    /// Transmit power in dBm (or the platform maximum below it).
    pub const TX_POWER_DBM: i8 = 22;
    /// Radio-enforced TX timeout.
    pub const TX_TIMEOUT_MS: u32 = 3_000;
}

/// Error from the radio driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("radio hardware error: {0}")]
pub struct RadioError(pub String);

/// Platform radio driver.
///
/// The transmitter arbiter is the sole caller of [`RadioDriver::send`]; the
/// driver owns the antenna until it signals TX-done or TX-timeout back to
/// the engine.
pub trait RadioDriver {
    /// Hand a frame to the radio for transmission.
    ///
    /// # Errors
    ///
    /// [`RadioError`] when the hardware rejects the send. The arbiter counts
    /// the failure and re-arms receive; nothing propagates further.
    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError>;

    /// Re-enter continuous receive (boosted LNA where the chip supports it).
    fn enter_receive(&mut self);
}
