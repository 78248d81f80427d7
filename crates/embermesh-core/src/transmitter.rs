//! Transmitter arbiter: half-duplex state and airtime accounting.
//!
//! Single owner of the radio TX path. Exactly one send can be in flight;
//! the radio's TX-done/TX-timeout callbacks return ownership and re-arm
//! receive. Every component that wants to transmit goes through
//! [`Transmitter::transmit`] and handles rejection by dropping or
//! rescheduling.

use tracing::{debug, warn};

use crate::errors::TransmitError;
use crate::radio::{RadioDriver, params};

/// Largest frame the radio accepts.
pub const MAX_TX_LEN: usize = 255;

/// Half-duplex TX arbiter and airtime ledger.
pub struct Transmitter {
    radio: Box<dyn RadioDriver>,
    airtime_budget_factor: f32,
    transmitting: bool,
    tx_start_ms: u64,
    next_allowed_tx_ms: u64,
    transmit_count: u32,
    failure_count: u32,
    total_airtime_ms: u64,
}

impl core::fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transmitter")
            .field("transmitting", &self.transmitting)
            .field("transmit_count", &self.transmit_count)
            .field("failure_count", &self.failure_count)
            .field("total_airtime_ms", &self.total_airtime_ms)
            .finish_non_exhaustive()
    }
}

impl Transmitter {
    /// Wrap a radio driver.
    ///
    /// `airtime_budget_factor` scales the post-TX silence period; zero
    /// disables it (duty cycle is tracked, not enforced).
    #[must_use]
    pub fn new(radio: Box<dyn RadioDriver>, airtime_budget_factor: f32) -> Self {
        Self {
            radio,
            airtime_budget_factor,
            transmitting: false,
            tx_start_ms: 0,
            next_allowed_tx_ms: 0,
            transmit_count: 0,
            failure_count: 0,
            total_airtime_ms: 0,
        }
    }

    /// True while a send is in flight.
    #[must_use]
    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    /// True once the post-TX silence period has elapsed.
    #[must_use]
    pub fn can_transmit_now(&self, now_ms: u64) -> bool {
        now_ms >= self.next_allowed_tx_ms
    }

    /// Hand a frame to the radio.
    ///
    /// # Errors
    ///
    /// - [`TransmitError::Busy`] while a send is in flight
    /// - [`TransmitError::SilencePeriod`] before the silence period elapses
    /// - [`TransmitError::InvalidLength`] for empty or oversized frames
    /// - [`TransmitError::Radio`] when the driver rejects the send (counted
    ///   as a failure, receive re-armed)
    pub fn transmit(&mut self, frame: &[u8], now_ms: u64) -> Result<(), TransmitError> {
        if self.transmitting {
            return Err(TransmitError::Busy);
        }

        if !self.can_transmit_now(now_ms) {
            return Err(TransmitError::SilencePeriod {
                remaining_ms: self.next_allowed_tx_ms - now_ms,
            });
        }

        if frame.is_empty() || frame.len() > MAX_TX_LEN {
            self.failure_count += 1;
            return Err(TransmitError::InvalidLength(frame.len()));
        }

        debug!(len = frame.len(), "transmitting");
        if let Err(err) = self.radio.send(frame) {
            warn!(%err, "radio rejected send");
            self.failure_count += 1;
            self.radio.enter_receive();
            return Err(TransmitError::Radio(err.0));
        }

        self.transmitting = true;
        self.tx_start_ms = now_ms;
        self.transmit_count += 1;
        Ok(())
    }

    /// Radio callback: transmission completed.
    ///
    /// Books the spent airtime, starts the silence period and re-arms
    /// receive.
    pub fn on_tx_done(&mut self, now_ms: u64) {
        self.transmitting = false;

        let airtime = now_ms.saturating_sub(self.tx_start_ms);
        self.total_airtime_ms += airtime;

        let silence = (airtime as f32 * self.airtime_budget_factor) as u64;
        self.next_allowed_tx_ms = now_ms + silence;

        debug!(airtime_ms = airtime, silence_ms = silence, "tx complete");
        self.radio.enter_receive();
    }

    /// Radio callback: transmission timed out.
    pub fn on_tx_timeout(&mut self, _now_ms: u64) {
        warn!("tx timeout, returning to rx");
        self.transmitting = false;
        self.failure_count += 1;
        self.next_allowed_tx_ms = 0;
        self.radio.enter_receive();
    }

    /// Completed transmissions.
    #[must_use]
    pub fn transmit_count(&self) -> u32 {
        self.transmit_count
    }

    /// Rejected or timed-out transmissions.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Total milliseconds spent transmitting.
    #[must_use]
    pub fn total_airtime_ms(&self) -> u64 {
        self.total_airtime_ms
    }

    /// Reset the counters (`!status clear`).
    pub fn reset_stats(&mut self) {
        self.transmit_count = 0;
        self.failure_count = 0;
        self.total_airtime_ms = 0;
    }
}

/// LoRa time-on-air for the compiled modulation, in milliseconds.
///
/// SF8, BW 62.5 kHz, CR 4, 16-symbol preamble, explicit header, CRC on.
/// Monotonically non-decreasing in `len`.
#[must_use]
pub fn estimate_airtime_ms(len: usize) -> u64 {
    let sf = params::SPREADING_FACTOR as f64;
    let cr = params::CODING_RATE as f64;

    let symbol_ms = f64::from(1u32 << params::SPREADING_FACTOR)
        / f64::from(params::BANDWIDTH_HZ)
        * 1000.0;
    let preamble_symbols = f64::from(params::PREAMBLE_LEN) + 4.25;

    let payload_symbols =
        8.0 + (((8.0 * len as f64 - 4.0 * sf + 28.0 + 16.0) / (4.0 * sf)).ceil() * (cr + 4.0))
            .max(0.0);

    ((preamble_symbols + payload_symbols) * symbol_ms) as u64
}
