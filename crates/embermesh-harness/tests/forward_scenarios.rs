//! End-to-end flood forwarding scenarios.

use embermesh_harness::TestNode;
use embermesh_proto::{Packet, PayloadType, RouteType};

fn flood_frame(path: &[u8], payload_len: usize) -> Packet {
    let mut packet = Packet::new(RouteType::Flood, PayloadType::GrpTxt);
    packet.path = path.to_vec();
    packet.payload = vec![0xA5; payload_len];
    packet
}

/// S1: a healthy flood frame is re-transmitted with our hash appended,
/// after an SNR-shaped delay.
#[test]
fn flood_forward_with_delay() {
    let mut node = TestNode::new(11).unwrap();

    // 40-byte payload, empty path: encodes to 42 bytes. RSSI -90,
    // SNR +5 dB (quarter-dB 20) scores 0.625.
    let frame = flood_frame(&[], 40);
    assert_eq!(frame.encoded_len(), 42);

    node.receive(&frame, -90, 20);
    node.run_for(15_000);

    let sent = node.sent_packets();
    assert_eq!(sent.len(), 1, "exactly one repeat");

    let (repeated, at_ms) = &sent[0];
    assert_eq!(repeated.path, vec![0x5A]);
    assert_eq!(repeated.payload, frame.payload);
    assert_eq!(node.sent()[0].bytes.len(), 43, "one path byte longer than the input");

    // rx_delay at score 0.625 is roughly a quarter of the 43-byte airtime
    // (~116 ms); jitter adds up to five 2x-airtime slots on top.
    assert!(*at_ms >= 20, "delayed send must not be immediate (sent at {at_ms})");
    assert!(*at_ms <= 6_000, "sent past the worst-case window ({at_ms})");
}

/// S2: a frame whose path already contains our hash is never repeated.
#[test]
fn loop_prevention() {
    let mut node = TestNode::new(12).unwrap();

    node.receive(&flood_frame(&[0x11, 0x5A, 0x22], 40), -90, 20);
    node.run_for(15_000);

    assert!(node.sent().is_empty(), "looped frame must not be re-transmitted");
}

/// S3: an identical copy arriving 100 ms later is suppressed by the dedup
/// cache; only the first copy is repeated.
#[test]
fn duplicate_suppression() {
    let mut node = TestNode::new(13).unwrap();

    let frame = flood_frame(&[], 40);
    node.receive(&frame, -90, 20);
    node.run_for(100);
    node.receive(&frame, -88, 24);
    node.run_for(15_000);

    assert_eq!(node.sent().len(), 1, "duplicate must not be forwarded");
}

/// Signals below the forwarding floor are heard but not repeated.
#[test]
fn weak_signal_not_forwarded() {
    let mut node = TestNode::new(14).unwrap();

    node.receive(&flood_frame(&[], 40), -121, 20);
    node.run_for(15_000);
    assert!(node.sent().is_empty());

    assert_eq!(node.engine.stats().rx_count, 1, "frame still counts as received");
}

/// Direct frames are not flood-forwarded.
#[test]
fn direct_frames_not_forwarded() {
    let mut node = TestNode::new(15).unwrap();

    let mut frame = flood_frame(&[], 40);
    frame.route = RouteType::Direct;
    node.receive(&frame, -90, 20);
    node.run_for(15_000);

    assert!(node.sent().is_empty());
}

/// A frame with 64 path entries has no room for our hash.
#[test]
fn full_path_not_forwarded() {
    let mut node = TestNode::new(16).unwrap();

    node.receive(&flood_frame(&[0x01; 64], 20), -90, 20);
    node.run_for(15_000);

    assert!(node.sent().is_empty());
}

/// Transport-flood frames forward like plain floods, codes preserved.
#[test]
fn transport_flood_is_forwarded_with_codes() {
    let mut node = TestNode::new(17).unwrap();

    let mut frame = Packet::new(RouteType::TransportFlood, PayloadType::TxtMsg);
    frame.transport_codes = Some([0xBEEF, 0x1234]);
    frame.payload = vec![1, 2, 3, 4];
    node.receive(&frame, -90, 20);
    node.run_for(15_000);

    let sent = node.sent_packets();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.transport_codes, Some([0xBEEF, 0x1234]));
    assert_eq!(sent[0].0.path, vec![0x5A]);
}

/// The RX queue bounds memory: flooding the callback drops the newest
/// frames and counts them.
#[test]
fn rx_queue_overflow_drops_newest() {
    let mut node = TestNode::new(18).unwrap();

    for i in 0..20 {
        let mut frame = flood_frame(&[], 8);
        frame.payload[0] = i;
        node.receive(&frame, -90, 20);
    }

    assert_eq!(node.engine.rx_dropped(), 4);
}
