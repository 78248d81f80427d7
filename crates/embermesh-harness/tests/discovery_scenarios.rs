//! Discovery request/response scenarios.

use embermesh_harness::TestNode;
use embermesh_proto::{Packet, PayloadType, RouteType};

fn discover_frame(flags: u8, type_filter: u8, tag: u32) -> Packet {
    let mut packet = Packet::new(RouteType::Direct, PayloadType::Control);
    packet.payload.push(flags);
    packet.payload.push(type_filter);
    packet.payload.extend_from_slice(&tag.to_le_bytes());
    packet
}

/// S6: a zero-hop prefix-only discovery probe for repeaters gets a zero-hop
/// CONTROL reply echoing the tag and our SNR measurement, with an 8-byte
/// key prefix.
#[test]
fn discovery_response() {
    let mut node = TestNode::new(41).unwrap();

    node.receive(&discover_frame(0x81, 0x04, 0x1122_3344), -85, 14);
    node.run_for(60_000);

    let sent = node.sent_packets();
    assert_eq!(sent.len(), 1);

    let (reply, _) = &sent[0];
    assert_eq!(reply.route, RouteType::Direct);
    assert_eq!(reply.payload_type, PayloadType::Control);
    assert!(reply.path.is_empty(), "reply must be zero-hop");

    assert_eq!(reply.payload[0], 0x92);
    assert_eq!(reply.payload[1] as i8, 14);
    assert_eq!(&reply.payload[2..6], &0x1122_3344u32.to_le_bytes());
    assert_eq!(&reply.payload[6..14], &node.engine.identity().public_key()[..8]);
    assert_eq!(reply.payload.len(), 14);
}

/// Without the prefix-only flag the full 32-byte key is returned.
#[test]
fn discovery_full_key() {
    let mut node = TestNode::new(42).unwrap();

    node.receive(&discover_frame(0x80, 0x04, 9), -85, 14);
    node.run_for(60_000);

    let sent = node.sent_packets();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.payload.len(), 6 + 32);
    assert_eq!(&sent[0].0.payload[6..38], node.engine.identity().public_key());
}

/// A type filter without the repeater bit is not for us.
#[test]
fn discovery_wrong_type_ignored() {
    let mut node = TestNode::new(43).unwrap();

    node.receive(&discover_frame(0x81, 0x0A, 9), -85, 14);
    node.run_for(60_000);
    assert!(node.sent().is_empty());
}

/// Forwarded (non-zero-hop) probes are ignored.
#[test]
fn discovery_with_path_ignored() {
    let mut node = TestNode::new(44).unwrap();

    let mut probe = discover_frame(0x81, 0x04, 9);
    probe.path = vec![0x11];
    node.receive(&probe, -85, 14);
    node.run_for(60_000);
    assert!(node.sent().is_empty());
}

/// Discovery responses obey the one-per-minute rate limit; a fresh tag
/// after the window is answered again.
#[test]
fn discovery_rate_limit() {
    let mut node = TestNode::new(45).unwrap();

    node.receive(&discover_frame(0x81, 0x04, 1), -85, 14);
    node.run_for(30_000);
    assert_eq!(node.sent().len(), 1);

    node.receive(&discover_frame(0x81, 0x04, 2), -85, 14);
    node.run_for(40_000);
    assert_eq!(node.sent().len(), 1, "second probe inside the window must be ignored");

    // Well past the window now.
    node.receive(&discover_frame(0x81, 0x04, 3), -85, 14);
    node.run_for(60_000);
    assert_eq!(node.sent().len(), 2);
}
