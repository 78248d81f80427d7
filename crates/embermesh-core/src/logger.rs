//! Tail-of-pipeline packet logger.

use tracing::{debug, info};

use crate::dispatch::{PacketEvent, PacketProcessor, ProcessingContext, Services, Step};

/// Logs every frame that survives the pipeline.
#[derive(Debug, Default)]
pub struct PacketLogger;

impl PacketLogger {
    /// Stateless logger.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PacketProcessor for PacketLogger {
    fn name(&self) -> &'static str {
        "PacketLogger"
    }

    fn priority(&self) -> u8 {
        99
    }

    fn process(
        &mut self,
        event: &PacketEvent,
        ctx: &mut ProcessingContext,
        _services: &mut Services<'_>,
    ) -> Step {
        let packet = &event.packet;
        info!(
            route = packet.route.name(),
            payload = packet.payload_type.name(),
            version = packet.payload_version,
            rssi = event.rssi_dbm,
            snr_q = event.snr_quarter_db,
            hash = format_args!("{:08X}", ctx.dedup_hash),
            "rx packet"
        );

        if let Some(codes) = packet.transport_codes {
            debug!(a = codes[0], b = codes[1], "transport codes");
        }
        debug!(path_len = packet.path.len(), payload_len = packet.payload.len(), "sizes");

        if let Some(advert) = &packet.advert {
            info!(
                kind = advert.kind.name(),
                name = advert.name.as_deref().unwrap_or(""),
                "advert"
            );
            if let Some((lat, lon)) = advert.location {
                info!(
                    lat = format_args!("{}.{:06}", lat / 1_000_000, (lat % 1_000_000).abs()),
                    lon = format_args!("{}.{:06}", lon / 1_000_000, (lon % 1_000_000).abs()),
                    "advert location"
                );
            }
        }

        Step::Continue
    }
}
