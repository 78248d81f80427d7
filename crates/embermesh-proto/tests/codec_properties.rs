//! Cross-module codec properties, exercised through the public API only.

use proptest::prelude::*;

use embermesh_proto::{
    MAX_FRAME_LEN, MAX_PATH_LEN, MAX_PAYLOAD_LEN, Packet, PayloadType, RouteType,
};

fn arbitrary_packet() -> impl Strategy<Value = Packet> {
    (
        0u8..=3,
        0u8..=15,
        0u8..=3,
        any::<[u16; 2]>(),
        prop::collection::vec(any::<u8>(), 0..=MAX_PATH_LEN),
        prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_LEN),
    )
        .prop_map(|(route_bits, type_bits, version, codes, path, payload)| {
            let route = RouteType::from_bits(route_bits);
            Packet {
                route,
                payload_type: PayloadType::from_bits(type_bits),
                payload_version: version,
                transport_codes: route.has_transport_codes().then_some(codes),
                path,
                payload,
                advert: None,
            }
        })
}

proptest! {
    /// Decode of an encode is the identity, and the re-encoded frame is
    /// byte-identical.
    #[test]
    fn round_trip_is_byte_identical(packet in arbitrary_packet()) {
        let wire = packet.encode_to_vec().expect("valid packet encodes");
        prop_assert!(wire.len() <= MAX_FRAME_LEN);

        let decoded = Packet::decode(&wire).expect("own encoding decodes");
        prop_assert_eq!(&decoded, &packet);
        prop_assert_eq!(decoded.encode_to_vec().expect("re-encode"), wire);
    }

    /// The header byte always reconstructs the three header fields.
    #[test]
    fn header_byte_is_derived(packet in arbitrary_packet()) {
        let wire = packet.encode_to_vec().expect("valid packet encodes");
        prop_assert_eq!(wire[0], packet.header_byte());
    }

    /// Arbitrary garbage either decodes cleanly or errors; it never panics,
    /// and a successful decode re-encodes to the same bytes.
    #[test]
    fn garbage_is_total(raw in prop::collection::vec(any::<u8>(), 0..=300)) {
        if let Ok(packet) = Packet::decode(&raw) {
            let rewire = packet.encode_to_vec().expect("decoded packet is valid");
            prop_assert_eq!(rewire, raw);
        }
    }

    /// Truncating a valid frame never yields a packet that re-encodes
    /// longer than the input.
    #[test]
    fn truncation_is_safe(packet in arbitrary_packet(), cut in 0usize..=40) {
        let wire = packet.encode_to_vec().expect("valid packet encodes");
        let cut = cut.min(wire.len());
        let truncated = &wire[..wire.len() - cut];

        if let Ok(decoded) = Packet::decode(truncated) {
            prop_assert!(decoded.encoded_len() <= wire.len());
        }
    }
}
