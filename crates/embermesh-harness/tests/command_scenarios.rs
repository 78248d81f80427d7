//! Private-channel command scenarios.

use embermesh_core::{ChannelMessage, ChannelSet};
use embermesh_harness::TestNode;
use embermesh_proto::{Packet, PayloadType, RouteType};

/// The same channel keys the test node is configured with, so tests can
/// play the role of a remote operator.
fn operator_channels() -> ChannelSet {
    ChannelSet::new(&[
        "00112233445566778899AABBCCDDEEFF".to_owned(),
        "FFEEDDCCBBAA99887766554433221100".to_owned(),
    ])
    .unwrap()
}

fn command_frame(channels: &ChannelSet, index: usize, text: &str, ts: u32) -> Packet {
    channels.build_private(index, text, ts).unwrap()
}

/// Decode every transmitted frame that is a readable private-channel text
/// from the node itself.
fn responses(node: &TestNode, channels: &ChannelSet) -> Vec<ChannelMessage> {
    node.sent_packets()
        .iter()
        .filter_map(|(packet, _)| channels.decode_private(packet))
        .filter(|msg| msg.text.starts_with("ember 5A: "))
        .collect()
}

/// S5: `!status` over a private channel answers on the same channel with
/// the counters, and a repeat inside the rate window stays silent.
#[test]
fn status_command_round_trip() {
    let mut node = TestNode::new(31).unwrap();
    let channels = operator_channels();

    let request = command_frame(&channels, 0, "alice: !status", 1_700_000_000);
    node.receive(&request, -80, 8);
    node.run_for(30_000);

    let replies = responses(&node, &channels);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].channel_index, 0);
    assert!(replies[0].text.contains("RX:"), "status text: {}", replies[0].text);
    assert!(replies[0].text.contains("TX:"), "status text: {}", replies[0].text);

    // A second, distinct !status inside the 60 s window is ignored.
    let again = command_frame(&channels, 0, "bob: !status", 1_700_000_040);
    node.receive(&again, -80, 8);
    node.run_for(25_000);
    assert_eq!(responses(&node, &channels).len(), 1, "rate limit must hold");
}

/// The flood-routed command itself is also repeated (the repeater has no
/// idea it was the addressee), independent of the response.
#[test]
fn command_frame_is_still_forwarded() {
    let mut node = TestNode::new(32).unwrap();
    let channels = operator_channels();

    let request = command_frame(&channels, 0, "alice: !help", 1_700_000_000);
    node.receive(&request, -80, 8);
    node.run_for(30_000);

    let forwarded = node
        .sent_packets()
        .iter()
        .filter(|(packet, _)| packet.path == vec![0x5A] && packet.payload == request.payload)
        .count();
    assert_eq!(forwarded, 1);
}

/// `!advert` emits a signed flood advert naming the node.
#[test]
fn advert_command_emits_signed_advert() {
    let mut node = TestNode::new(33).unwrap();
    let channels = operator_channels();

    node.receive(&command_frame(&channels, 1, "!advert", 1_700_000_000), -80, 8);
    node.run_for(60_000);

    let adverts: Vec<_> = node
        .sent_packets()
        .into_iter()
        .filter(|(packet, _)| packet.payload_type == PayloadType::Advert)
        .collect();
    assert_eq!(adverts.len(), 1);

    let advert = adverts[0].0.advert.clone().unwrap();
    assert_eq!(advert.name.as_deref(), Some("ember 5A"));
    assert_eq!(&advert.public_key, node.engine.identity().public_key());
    // Built against the clock synced from the triggering message.
    assert!(advert.timestamp >= 1_700_000_000 && advert.timestamp < 1_700_000_060);
}

/// Commands targeted at another node are ignored; `@all` and our own hash
/// are honored.
#[test]
fn targeted_commands() {
    let mut node = TestNode::new(34).unwrap();
    let channels = operator_channels();

    node.receive(&command_frame(&channels, 0, "!help @7C", 1_700_000_000), -80, 8);
    node.run_for(30_000);
    assert!(responses(&node, &channels).is_empty());

    node.receive(&command_frame(&channels, 0, "!help @5a", 1_700_000_100), -80, 8);
    node.run_for(30_000);
    assert_eq!(responses(&node, &channels).len(), 1);
}

/// Public-channel text must never trigger a command response.
#[test]
fn public_channel_cannot_command() {
    let mut node = TestNode::new(35).unwrap();
    let channels = operator_channels();

    let public = channels.build_public("!status", 1_700_000_000).unwrap();
    node.receive(&public, -80, 8);
    node.run_for(30_000);

    assert!(responses(&node, &channels).is_empty());
}

/// A received channel timestamp synchronizes the node's wall clock; the
/// response carries epoch time, not uptime.
#[test]
fn response_timestamp_is_synced() {
    let mut node = TestNode::new(36).unwrap();
    let channels = operator_channels();

    node.receive(&command_frame(&channels, 0, "!help", 1_700_000_000), -80, 8);
    node.run_for(60_000);

    let replies = responses(&node, &channels);
    assert_eq!(replies.len(), 1);
    assert!(replies[0].timestamp >= 1_700_000_000);
    assert!(replies[0].timestamp < 1_700_000_000 + 120);
}

/// Low battery produces an unauthenticated public broadcast that private
/// channels cannot decode.
#[test]
fn low_battery_distress_is_public() {
    let mut node = TestNode::new(37).unwrap();
    let channels = operator_channels();

    node.telemetry.set(3_050, 10, None, false);
    node.run_for(10);

    let sent = node.sent_packets();
    assert_eq!(sent.len(), 1);
    let (packet, _) = &sent[0];
    assert_eq!(packet.payload_type, PayloadType::GrpTxt);
    assert_eq!(packet.route, RouteType::Flood);
    assert!(channels.decode_private(packet).is_none(), "distress must be public");
}
