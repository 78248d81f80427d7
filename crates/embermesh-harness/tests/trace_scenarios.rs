//! Trace-route annotation scenarios.

use embermesh_harness::TestNode;
use embermesh_proto::{Packet, PayloadType, RouteType};

fn trace_frame(path: &[u8], path_hashes: &[u8]) -> Packet {
    let mut packet = Packet::new(RouteType::Direct, PayloadType::Trace);
    packet.payload.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
    packet.payload.extend_from_slice(&0x0000_0001u32.to_le_bytes());
    packet.payload.push(0x00);
    packet.payload.extend_from_slice(path_hashes);
    packet.path = path.to_vec();
    packet
}

/// S4: a trace whose next expected hop is this node gets our SNR appended
/// and goes out immediately, bypassing the flood delay machinery.
#[test]
fn trace_hop_annotation() {
    let mut node = TestNode::new(21).unwrap();

    node.receive(&trace_frame(&[], &[0x5A, 0x7C]), -70, 12);
    node.run_for(2);

    let sent = node.sent_packets();
    assert_eq!(sent.len(), 1);

    let (annotated, at_ms) = &sent[0];
    assert_eq!(annotated.path, vec![0x0C], "+12 quarter-dB appended as hop 1");
    assert_eq!(annotated.payload, trace_frame(&[], &[0x5A, 0x7C]).payload);
    assert_eq!(annotated.route, RouteType::Direct);
    assert!(*at_ms <= 2, "trace must transmit immediately, not via the delay queue");
}

/// A trace addressed to a different next hop dies here.
#[test]
fn trace_for_other_node_dropped() {
    let mut node = TestNode::new(22).unwrap();

    node.receive(&trace_frame(&[], &[0x7C, 0x5A]), -70, 12);
    node.run_for(5_000);

    assert!(node.sent().is_empty());
}

/// A trace that has collected all its hop measurements terminates here,
/// whatever our hash is.
#[test]
fn completed_trace_terminates() {
    let mut node = TestNode::new(23).unwrap();

    node.receive(&trace_frame(&[0x0C, 0x08], &[0x5A, 0x7C]), -70, 12);
    node.run_for(5_000);

    assert!(node.sent().is_empty());
}

/// Each annotated copy of a trace has a longer path, so the dedup cache
/// treats successive hops as distinct; an exact duplicate still dies.
#[test]
fn trace_duplicate_suppression_is_per_hop() {
    let mut node = TestNode::new(24).unwrap();

    let frame = trace_frame(&[], &[0x5A, 0x5A]);
    node.receive(&frame, -70, 12);
    node.run_for(1_000);
    assert_eq!(node.sent().len(), 1);

    // Exact copy of the first frame: duplicate.
    node.receive(&frame, -70, 12);
    node.run_for(1_000);
    assert_eq!(node.sent().len(), 1);

    // The annotated copy (as if echoed back to us) differs in path length,
    // so it dispatches; we are also its second expected hop.
    let annotated = node.sent_packets()[0].0.clone();
    node.receive(&annotated, -70, 8);
    node.run_for(1_000);
    assert_eq!(node.sent().len(), 2);
    assert_eq!(node.sent_packets()[1].0.path, vec![0x0C, 0x08]);
}
