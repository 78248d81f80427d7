//! Private-channel text commands.
//!
//! A group text that decrypts under one of the private channels and starts
//! with `!` (after an optional `"sender: "` prefix) is a management command:
//!
//! - `!ping` — battery and uptime
//! - `!status [clear]` — RX/TX counters and airtime
//! - `!advert` — emit a signed advert
//! - `!location [lat lon | clear]` — query/set/clear the stored location
//! - `!neighbors` / `!neighbours` — strongest neighbors by SNR
//! - `!help` — one-line command hint
//!
//! Commands may carry an `@XX` / `@all` target; a command aimed at another
//! node is ignored without side effects. Responses are rate limited to one
//! per minute, deduplicated against forwarded copies of the same request,
//! and sent after an identity-offset slotted jitter so a channel full of
//! repeaters does not answer in unison.

use tracing::{debug, info, warn};

use embermesh_proto::advert::{ADVERT_FLAG_LATLON, ADVERT_FLAG_NAME, ADVERT_MAX_APPDATA};
use embermesh_proto::{Advert, AdvertKind, Packet, PayloadType, RouteType};

use embermesh_crypto::sign;

use crate::dispatch::{PacketEvent, PacketProcessor, ProcessingContext, Services, Step};
use crate::fnv::fnv1a;
use crate::transmitter::estimate_airtime_ms;

const RESPONSE_RATE_LIMIT_MS: u64 = 60_000;
const DEDUP_TIMEOUT_MS: u64 = 60_000;
const JITTER_SLOTS: u32 = 10;

/// A parsed command, already confirmed to target this node.
#[derive(Debug, PartialEq, Eq)]
struct ParsedCommand<'a> {
    name: &'a str,
    args: &'a str,
}

/// Extract a command from decrypted channel text.
///
/// Returns `None` for ordinary chatter, malformed targets, and commands
/// addressed to another node.
fn parse_command(text: &str, our_hash: u8) -> Option<ParsedCommand<'_>> {
    // Skip an optional "sender: " prefix.
    let content = match text.find(':') {
        Some(pos) => text[pos + 1..].trim_start_matches(' '),
        None => text,
    };

    if !content.starts_with('!') {
        return None;
    }

    let (name, rest) = match content.find(' ') {
        Some(pos) => (&content[..pos], content[pos + 1..].trim_start_matches(' ')),
        None => (content, ""),
    };

    let mut args = rest;
    if let Some(target_and_args) = rest.strip_prefix('@') {
        let (target, after) = match target_and_args.find(' ') {
            Some(pos) => (&target_and_args[..pos], target_and_args[pos + 1..].trim_start_matches(' ')),
            None => (target_and_args, ""),
        };
        args = after;

        if !target.eq_ignore_ascii_case("all") {
            let Ok(hash) = u8::from_str_radix(target, 16) else {
                // Malformed target: ignore the command entirely.
                return None;
            };
            if hash != our_hash {
                return None;
            }
        }
    }

    Some(ParsedCommand { name, args })
}

/// Human-friendly uptime: `3d 4h`, `4h 12m`, `12m 5s` or `5s`.
fn format_uptime(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let seconds = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let minutes = total_minutes % 60;
    let total_hours = total_minutes / 60;
    let hours = total_hours % 24;
    let days = total_hours / 24;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[derive(Debug)]
struct PendingResponse {
    bytes: Vec<u8>,
    due_at_ms: u64,
}

/// Unified handler for all private-channel commands.
#[derive(Debug, Default)]
pub struct CommandHandler {
    last_payload_hash: u32,
    last_payload_at_ms: u64,
    last_response_at_ms: Option<u64>,
    pending: Option<PendingResponse>,
}

impl CommandHandler {
    /// Fresh handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a response waits for its send slot.
    #[must_use]
    pub fn has_pending_response(&self) -> bool {
        self.pending.is_some()
    }

    /// Identity-offset slotted jitter for a response of `len` bytes.
    fn response_delay_ms(len: usize, services: &Services<'_>) -> u64 {
        let airtime = estimate_airtime_ms(len);
        let slot_ms = (airtime as f32 * services.forwarding.tx_delay_factor) as u64;
        let random_slot = u64::from(services.env.random_range(JITTER_SLOTS));
        let hash_slot = u64::from(services.node.node_hash() % 10);
        (random_slot + hash_slot) * slot_ms
    }

    fn retry_delay_ms(len: usize, services: &Services<'_>) -> u64 {
        let airtime = estimate_airtime_ms(len);
        (airtime as f32 * services.forwarding.tx_delay_factor) as u64
    }

    fn queue_text_response(
        &mut self,
        body: &str,
        channel_index: usize,
        now_ms: u64,
        services: &mut Services<'_>,
    ) -> bool {
        let text =
            format!("{} {:02X}: {body}", services.node.name(), services.node.node_hash());
        let timestamp = services.time.now(now_ms);

        let packet = match services.channels.build_private(channel_index, &text, timestamp) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%err, "failed to build command response");
                return false;
            }
        };
        let bytes = match packet.encode_to_vec() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "failed to encode command response");
                return false;
            }
        };

        let jitter = Self::response_delay_ms(bytes.len(), services);
        debug!(len = bytes.len(), jitter, "queued command response");
        self.pending = Some(PendingResponse { bytes, due_at_ms: now_ms + jitter });
        true
    }

    fn handle_ping(
        &mut self,
        channel_index: usize,
        now_ms: u64,
        services: &mut Services<'_>,
    ) -> bool {
        let uptime = format_uptime(now_ms);
        let body = if services.telemetry.usb_powered() {
            format!("USB powered | U:{uptime}")
        } else {
            let volts = f32::from(services.telemetry.battery_millivolts()) / 1000.0;
            let percent = services.telemetry.battery_percent();
            let runtime = match services.telemetry.projected_hours() {
                Some(hours) if hours >= 24 => {
                    format!("{}d {}h remaining", hours / 24, hours % 24)
                }
                Some(hours) => format!("{hours}h remaining"),
                None => "collecting data".to_owned(),
            };
            format!("{volts:.2}V ({percent}%) - {runtime} | U:{uptime}")
        };
        self.queue_text_response(&body, channel_index, now_ms, services)
    }

    fn handle_status(
        &mut self,
        args: &str,
        channel_index: usize,
        now_ms: u64,
        services: &mut Services<'_>,
    ) -> bool {
        let body = if args == "clear" {
            services.stats.reset();
            services.tx.reset_stats();
            "Stats cleared".to_owned()
        } else {
            let rx = services.stats.rx_count;
            let tx = services.tx.transmit_count();
            let airtime_sec =
                (services.stats.rx_airtime_ms + services.tx.total_airtime_ms()) / 1000;
            format!("RX:{rx} TX:{tx} Air:{airtime_sec}s")
        };
        self.queue_text_response(&body, channel_index, now_ms, services)
    }

    fn handle_advert(&mut self, now_ms: u64, services: &mut Services<'_>) -> bool {
        let bytes = match build_advert_frame(now_ms, services) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "failed to build advert");
                return false;
            }
        };

        let jitter = Self::response_delay_ms(bytes.len(), services);
        info!(len = bytes.len(), jitter, "queued advert");
        self.pending = Some(PendingResponse { bytes, due_at_ms: now_ms + jitter });
        true
    }

    fn handle_location(
        &mut self,
        args: &str,
        channel_index: usize,
        now_ms: u64,
        services: &mut Services<'_>,
    ) -> bool {
        let body = if args.is_empty() {
            match services.node.location() {
                Some((lat, lon)) => format!("Loc {lat},{lon}"),
                None => "No loc".to_owned(),
            }
        } else if args == "clear" {
            services.node.clear_location();
            "Loc cleared".to_owned()
        } else {
            let mut parts = args.split_whitespace();
            let lat = parts.next().and_then(|p| p.parse::<i32>().ok());
            let lon = parts.next().and_then(|p| p.parse::<i32>().ok());
            match (lat, lon) {
                (Some(lat), Some(lon)) => {
                    services.node.set_location(lat, lon);
                    "Loc set".to_owned()
                }
                (Some(_), None) => "Bad lon".to_owned(),
                _ => "Bad lat".to_owned(),
            }
        };
        self.queue_text_response(&body, channel_index, now_ms, services)
    }

    fn handle_neighbors(
        &mut self,
        channel_index: usize,
        now_ms: u64,
        services: &mut Services<'_>,
    ) -> bool {
        let count = services.neighbors.len();
        let list = services.neighbors.build_list(crate::channels::MAX_MESSAGE_LEN / 2);
        let body = format!("N:{count} {list}");
        self.queue_text_response(&body, channel_index, now_ms, services)
    }

    fn handle_help(
        &mut self,
        channel_index: usize,
        now_ms: u64,
        services: &mut Services<'_>,
    ) -> bool {
        let body = "!cmd[@XX] | !ping !status[clear] !location[lat lon|clear] \
                    !neighbors !advert !help";
        self.queue_text_response(body, channel_index, now_ms, services)
    }
}

impl PacketProcessor for CommandHandler {
    fn name(&self) -> &'static str {
        "CommandHandler"
    }

    fn priority(&self) -> u8 {
        35
    }

    fn process(
        &mut self,
        event: &PacketEvent,
        _ctx: &mut ProcessingContext,
        services: &mut Services<'_>,
    ) -> Step {
        if event.packet.payload_type != PayloadType::GrpTxt {
            return Step::Continue;
        }

        // Commands only exist on private channels; the public channel never
        // triggers a response.
        let Some(msg) = services.channels.decode_private(&event.packet) else {
            return Step::Continue;
        };

        let now = event.received_at_ms;
        services.time.observe_remote(msg.timestamp, now);

        let Some(command) = parse_command(&msg.text, services.node.node_hash()) else {
            return Step::Continue;
        };

        if let Some(last) = self.last_response_at_ms {
            if now.saturating_sub(last) < RESPONSE_RATE_LIMIT_MS {
                debug!("command rate limited");
                return Step::Continue;
            }
        }

        // Absorb forwarded duplicates of the same request.
        let payload_hash = fnv1a(&event.packet.payload);
        if payload_hash == self.last_payload_hash
            && now.saturating_sub(self.last_payload_at_ms) < DEDUP_TIMEOUT_MS
        {
            return Step::Continue;
        }
        self.last_payload_hash = payload_hash;
        self.last_payload_at_ms = now;

        let handled = match command.name {
            "!ping" => self.handle_ping(msg.channel_index, now, services),
            "!status" => self.handle_status(command.args, msg.channel_index, now, services),
            "!advert" => self.handle_advert(now, services),
            "!location" => self.handle_location(command.args, msg.channel_index, now, services),
            "!neighbors" | "!neighbours" => {
                self.handle_neighbors(msg.channel_index, now, services)
            }
            "!help" => self.handle_help(msg.channel_index, now, services),
            _ => false,
        };

        if handled {
            info!(command = command.name, "processed command");
        }

        Step::Continue
    }

    fn poll(&mut self, now_ms: u64, services: &mut Services<'_>) {
        let Some(pending) = &mut self.pending else {
            return;
        };
        if now_ms < pending.due_at_ms {
            return;
        }

        if services.tx.is_transmitting() {
            pending.due_at_ms = now_ms + Self::retry_delay_ms(pending.bytes.len(), services);
            return;
        }

        if let Err(err) = services.tx.transmit(&pending.bytes, now_ms) {
            debug!(%err, "response send failed, rescheduling");
            pending.due_at_ms = now_ms + Self::retry_delay_ms(pending.bytes.len(), services);
            return;
        }

        self.last_response_at_ms = Some(now_ms);
        self.pending = None;
    }

    fn has_pending_work(&self) -> bool {
        self.pending.is_some()
    }
}

/// Build this node's signed advert frame (flood-routed, empty path).
pub fn build_advert_frame(
    now_ms: u64,
    services: &mut Services<'_>,
) -> Result<Vec<u8>, embermesh_proto::ProtocolError> {
    let mut flags = AdvertKind::Repeater.bits() | ADVERT_FLAG_NAME;
    if services.node.location().is_some() {
        flags |= ADVERT_FLAG_LATLON;
    }

    let mut appdata = Vec::with_capacity(ADVERT_MAX_APPDATA);
    appdata.push(flags);
    if let Some((lat, lon)) = services.node.location() {
        appdata.extend_from_slice(&lat.to_le_bytes());
        appdata.extend_from_slice(&lon.to_le_bytes());
    }

    let name = format!("{} {:02X}", services.node.name(), services.node.node_hash());
    let room = ADVERT_MAX_APPDATA - appdata.len();
    let name_bytes = name.as_bytes();
    appdata.extend_from_slice(&name_bytes[..name_bytes.len().min(room)]);

    let timestamp = services.time.now(now_ms);
    let public_key = *services.identity.public_key();
    let signing_data = Advert::signing_data(&public_key, timestamp, &appdata);
    let signature = sign(services.identity.keypair(), &signing_data);

    let mut packet = Packet::new(RouteType::Flood, PayloadType::Advert);
    packet.payload = Advert::assemble(&public_key, timestamp, &signature, &appdata);
    packet.encode_to_vec()
}
