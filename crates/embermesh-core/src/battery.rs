//! Battery telemetry boundary and the low-battery announcer.
//!
//! Voltage measurement and runtime projection are platform concerns behind
//! [`PowerTelemetry`]. The mesh-side policy lives here: every five minutes
//! the announcer samples the telemetry and broadcasts a distress text on the
//! public channel once when the battery gets low, and once per projection
//! stage as the estimated runtime falls through 72/48/24/12/6/3 hours.
//! Recharging re-arms everything.

use tracing::{info, warn};

use crate::dispatch::Services;

/// Platform battery/power source readings.
pub trait PowerTelemetry {
    /// Battery voltage in millivolts.
    fn battery_millivolts(&self) -> u16;

    /// Estimated charge percentage.
    fn battery_percent(&self) -> u8;

    /// Projected hours of runtime, when enough history exists.
    fn projected_hours(&self) -> Option<u32>;

    /// True while externally powered.
    fn usb_powered(&self) -> bool;
}

/// Telemetry stub for mains-powered deployments: always healthy, never
/// triggers a distress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl PowerTelemetry for NullTelemetry {
    fn battery_millivolts(&self) -> u16 {
        5_000
    }

    fn battery_percent(&self) -> u8 {
        100
    }

    fn projected_hours(&self) -> Option<u32> {
        None
    }

    fn usb_powered(&self) -> bool {
        true
    }
}

const CHECK_INTERVAL_MS: u64 = 5 * 60 * 1000;
const LOW_PERCENT_THRESHOLD: u8 = 15;
const RESET_THRESHOLD: u8 = LOW_PERCENT_THRESHOLD + 5;
const PROJECTION_STEPS_H: [u32; 6] = [72, 48, 24, 12, 6, 3];

/// Public-channel low-battery distress sender.
#[derive(Debug, Default)]
pub struct BatteryAnnouncer {
    last_check_ms: u64,
    checked_once: bool,
    stage_mask: u8,
    low_battery_sent: bool,
}

impl BatteryAnnouncer {
    /// Announcer with everything armed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Periodic tick from the main loop.
    pub fn poll(&mut self, now_ms: u64, services: &mut Services<'_>) {
        if self.checked_once && now_ms.saturating_sub(self.last_check_ms) < CHECK_INTERVAL_MS {
            return;
        }
        self.last_check_ms = now_ms;
        self.checked_once = true;

        if services.telemetry.usb_powered() {
            self.reset();
            return;
        }

        let percent = services.telemetry.battery_percent();
        if percent >= RESET_THRESHOLD {
            self.reset();
        }

        let projected = services.telemetry.projected_hours();

        if percent <= LOW_PERCENT_THRESHOLD && !self.low_battery_sent {
            self.send_distress(now_ms, services, percent, projected);
            self.low_battery_sent = true;
            return;
        }

        if let Some(hours) = projected {
            if let Some(stage) = self.triggered_stage(hours) {
                self.send_distress(now_ms, services, percent, projected);
                self.stage_mask |= 1 << stage;
            }
        }
    }

    fn triggered_stage(&self, hours: u32) -> Option<u8> {
        for (i, &step) in PROJECTION_STEPS_H.iter().enumerate() {
            let bit = 1u8 << i;
            if self.stage_mask & bit == 0 && hours <= step {
                return Some(i as u8);
            }
        }
        None
    }

    fn send_distress(
        &self,
        now_ms: u64,
        services: &mut Services<'_>,
        percent: u8,
        projected: Option<u32>,
    ) {
        let mv = services.telemetry.battery_millivolts();
        let volts = f32::from(mv) / 1000.0;

        let runtime = match projected {
            Some(hours) if hours >= 24 => format!("{}d {}h remaining", hours / 24, hours % 24),
            Some(hours) => format!("{hours}h remaining"),
            None => "collecting data".to_owned(),
        };

        let text = format!(
            "{} {:02X}: LOW BAT {volts:.2}V ({percent}%) - {runtime}",
            services.node.name(),
            services.node.node_hash(),
        );

        let timestamp = services.time.now(now_ms);
        let packet = match services.channels.build_public(&text, timestamp) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%err, "failed to build distress message");
                return;
            }
        };
        let encoded = match packet.encode_to_vec() {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(%err, "failed to encode distress message");
                return;
            }
        };

        // Best effort: a busy transmitter just means we try again at the
        // next stage or check interval.
        match services.tx.transmit(&encoded, now_ms) {
            Ok(()) => info!(percent, mv, "sent low-battery distress"),
            Err(err) => warn!(%err, "could not send low-battery distress"),
        }
    }

    fn reset(&mut self) {
        self.stage_mask = 0;
        self.low_battery_sent = false;
    }
}
