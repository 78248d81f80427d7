//! Neighbor table fed from received adverts.
//!
//! Tracks up to eight nearby nodes by the first byte of their advertised
//! public key, with an exponential moving average of the receive SNR
//! (alpha 0.25, weighted toward history). When the table is full a newcomer
//! only displaces the weakest entry if it is strictly stronger.

use tracing::{debug, info};

use embermesh_proto::PayloadType;

use crate::dispatch::{PacketEvent, PacketProcessor, ProcessingContext, Services, Step};

/// Maximum tracked neighbors.
pub const MAX_NEIGHBORS: usize = 8;

/// One tracked neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// First byte of the neighbor's public key.
    pub node_hash: u8,
    /// Moving-average SNR in whole dB.
    pub avg_snr_db: i8,
    /// Samples folded into the average, saturating.
    pub sample_count: u8,
}

/// SNR table of advert senders.
#[derive(Debug, Default)]
pub struct NeighborTable {
    neighbors: Vec<Neighbor>,
}

impl NeighborTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Active neighbor count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// True when no neighbor has been heard.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Neighbor by table index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Neighbor> {
        self.neighbors.get(index)
    }

    /// Fold one SNR sample (whole dB) into the table.
    ///
    /// The reserved hashes 0x00 and 0xFF never belong to a valid identity
    /// and are ignored.
    pub fn update(&mut self, node_hash: u8, snr_db: i8) {
        if node_hash == 0x00 || node_hash == 0xFF {
            return;
        }

        if let Some(neighbor) = self.neighbors.iter_mut().find(|n| n.node_hash == node_hash) {
            neighbor.avg_snr_db =
                ((i16::from(snr_db) + i16::from(neighbor.avg_snr_db) * 3) / 4) as i8;
            neighbor.sample_count = neighbor.sample_count.saturating_add(1);
            debug!(
                hash = format_args!("{node_hash:02X}"),
                avg = neighbor.avg_snr_db,
                "updated neighbor"
            );
            return;
        }

        if self.neighbors.len() < MAX_NEIGHBORS {
            self.neighbors.push(Neighbor { node_hash, avg_snr_db: snr_db, sample_count: 1 });
            info!(hash = format_args!("{node_hash:02X}"), snr_db, "new neighbor");
            return;
        }

        // Table full: the newcomer must beat the weakest link.
        if let Some(weakest) =
            self.neighbors.iter_mut().min_by_key(|n| n.avg_snr_db)
        {
            if snr_db > weakest.avg_snr_db {
                info!(
                    evicted = format_args!("{:02X}", weakest.node_hash),
                    hash = format_args!("{node_hash:02X}"),
                    "replacing weakest neighbor"
                );
                *weakest = Neighbor { node_hash, avg_snr_db: snr_db, sample_count: 1 };
            }
        }
    }

    /// Compact `"HH:snr HH:snr"` list sorted by SNR descending, truncated to
    /// `max_len` bytes.
    #[must_use]
    pub fn build_list(&self, max_len: usize) -> String {
        if self.neighbors.is_empty() {
            let mut s = "No neighbors".to_owned();
            s.truncate(max_len);
            return s;
        }

        let mut sorted = self.neighbors.clone();
        sorted.sort_by(|a, b| b.avg_snr_db.cmp(&a.avg_snr_db));

        let mut out = String::new();
        for (i, neighbor) in sorted.iter().enumerate() {
            let mut part = String::new();
            if i > 0 {
                part.push(' ');
            }
            part.push_str(&format!("{:02X}:{}", neighbor.node_hash, neighbor.avg_snr_db));
            if out.len() + part.len() > max_len {
                break;
            }
            out.push_str(&part);
        }
        out
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.neighbors.clear();
    }
}

/// Pipeline stage feeding the neighbor table from adverts.
#[derive(Debug, Default)]
pub struct NeighborMonitor;

impl NeighborMonitor {
    /// Stateless monitor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PacketProcessor for NeighborMonitor {
    fn name(&self) -> &'static str {
        "NeighborMonitor"
    }

    fn priority(&self) -> u8 {
        50
    }

    fn process(
        &mut self,
        event: &PacketEvent,
        _ctx: &mut ProcessingContext,
        services: &mut Services<'_>,
    ) -> Step {
        if event.packet.payload_type != PayloadType::Advert {
            return Step::Continue;
        }
        let Some(&node_hash) = event.packet.payload.first() else {
            return Step::Continue;
        };

        let snr_db = event.snr_quarter_db / 4;
        services.neighbors.update(node_hash, snr_db);
        Step::Continue
    }
}
