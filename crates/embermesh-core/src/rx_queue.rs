//! Bounded FIFO between the radio receive callback and the main loop.
//!
//! One producer (the receive callback), one consumer (the main loop). On
//! overflow the newest frame is dropped and counted; frames already queued
//! are never displaced.

use std::collections::VecDeque;

use tracing::warn;

use crate::dispatch::PacketEvent;

/// Fixed-capacity receive queue.
#[derive(Debug)]
pub struct RxQueue {
    queue: VecDeque<PacketEvent>,
    capacity: usize,
    dropped: u32,
}

impl RxQueue {
    /// Queue with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { queue: VecDeque::with_capacity(capacity), capacity, dropped: 0 }
    }

    /// Enqueue a received frame; drops it (and counts) when full.
    pub fn push(&mut self, event: PacketEvent) -> bool {
        if self.queue.len() >= self.capacity {
            self.dropped += 1;
            warn!(dropped_total = self.dropped, "rx queue full, dropping frame");
            return false;
        }
        self.queue.push_back(event);
        true
    }

    /// Dequeue the oldest frame.
    pub fn pop(&mut self) -> Option<PacketEvent> {
        self.queue.pop_front()
    }

    /// Frames currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Frames dropped due to overflow.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use embermesh_proto::{Packet, PayloadType, RouteType};

    fn event(marker: u8) -> PacketEvent {
        let mut packet = Packet::new(RouteType::Flood, PayloadType::TxtMsg);
        packet.payload = vec![marker];
        PacketEvent { packet, rssi_dbm: -90, snr_quarter_db: 0, received_at_ms: 0 }
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut queue = RxQueue::new(4);
        for marker in 0..3 {
            assert!(queue.push(event(marker)));
        }
        for marker in 0..3 {
            assert_eq!(queue.pop().unwrap().packet.payload, vec![marker]);
        }
        assert!(queue.pop().is_none());
    }

    #[test]
    fn overflow_drops_newest() {
        let mut queue = RxQueue::new(2);
        assert!(queue.push(event(0)));
        assert!(queue.push(event(1)));
        assert!(!queue.push(event(2)));
        assert_eq!(queue.dropped(), 1);

        // The queued frames survive; the overflow victim is the newest.
        assert_eq!(queue.pop().unwrap().packet.payload, vec![0]);
        assert_eq!(queue.pop().unwrap().packet.payload, vec![1]);
    }
}
