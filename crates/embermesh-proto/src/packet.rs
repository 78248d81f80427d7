//! Decoded packet and the wire codec.
//!
//! A [`Packet`] holds exactly the information carried on the air. The header
//! byte is never stored: it is re-derived from the route type, payload type
//! and payload version on encode, so a packet can never carry a header byte
//! that disagrees with its fields.
//!
//! # Invariants
//!
//! - `path.len() <= MAX_PATH_LEN` and `payload.len() <= MAX_PAYLOAD_LEN`,
//!   enforced by [`Packet::validate`] before any encode.
//! - `transport_codes.is_some()` exactly when the route type is a transport
//!   variant.
//! - `decode(encode(p)) == p` for every packet that passes validation, and
//!   the re-encoded bytes are identical to the original frame.

use crate::{
    Advert, MAX_FRAME_LEN, MAX_PATH_LEN, MAX_PAYLOAD_LEN, MIN_FRAME_LEN, PayloadType, RouteType,
    errors::{ProtocolError, Result},
    header,
};

/// A decoded wire frame.
///
/// Equality compares the wire fields only; the parsed advert view is derived
/// data and is ignored, so a constructed packet compares equal to its
/// decoded round trip.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Routing discipline for this frame.
    pub route: RouteType,
    /// Payload discriminator.
    pub payload_type: PayloadType,
    /// Payload version (2 bits).
    pub payload_version: u8,
    /// Transport codes, present iff the route is a transport variant.
    pub transport_codes: Option<[u16; 2]>,
    /// Path bytes: node hashes for flood frames, quarter-dB SNR for traces.
    pub path: Vec<u8>,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// Parsed advert sub-payload, populated by [`Packet::decode`] when the
    /// payload type is [`PayloadType::Advert`] and the sub-payload parses.
    pub advert: Option<Advert>,
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.route == other.route
            && self.payload_type == other.payload_type
            && self.payload_version == other.payload_version
            && self.transport_codes == other.transport_codes
            && self.path == other.path
            && self.payload == other.payload
    }
}

impl Eq for Packet {}

impl Packet {
    /// Create an empty packet with the given header fields.
    ///
    /// Transport codes are zeroed when the route type requires them.
    #[must_use]
    pub fn new(route: RouteType, payload_type: PayloadType) -> Self {
        Self {
            route,
            payload_type,
            payload_version: 0,
            transport_codes: route.has_transport_codes().then_some([0, 0]),
            path: Vec::new(),
            payload: Vec::new(),
            advert: None,
        }
    }

    /// The header byte this packet encodes to.
    #[must_use]
    pub fn header_byte(&self) -> u8 {
        header::pack(self.route, self.payload_type, self.payload_version)
    }

    /// Bytes the encoded frame will occupy.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let transport = if self.route.has_transport_codes() { 4 } else { 0 };
        1 + transport + 1 + self.path.len() + self.payload.len()
    }

    /// Check the structural bounds required before encoding.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::PathTooLong`] / [`ProtocolError::PayloadTooLarge`]
    ///   when a field exceeds its wire bound
    /// - [`ProtocolError::VersionOutOfRange`] when the version does not fit
    ///   the 2-bit header field
    /// - [`ProtocolError::TransportCodesMissing`] /
    ///   [`ProtocolError::UnexpectedTransportCodes`] when transport-code
    ///   presence disagrees with the route type
    pub fn validate(&self) -> Result<()> {
        if self.path.len() > MAX_PATH_LEN {
            return Err(ProtocolError::PathTooLong(self.path.len()));
        }

        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge(self.payload.len()));
        }

        if self.payload_version > header::VERSION_MASK {
            return Err(ProtocolError::VersionOutOfRange(self.payload_version));
        }

        if self.route.has_transport_codes() && self.transport_codes.is_none() {
            return Err(ProtocolError::TransportCodesMissing);
        }

        if !self.route.has_transport_codes() && self.transport_codes.is_some() {
            return Err(ProtocolError::UnexpectedTransportCodes);
        }

        Ok(())
    }

    /// Decode a frame from raw radio bytes.
    ///
    /// All validation happens before anything is copied. A malformed advert
    /// sub-payload does not fail the outer decode; it only leaves
    /// [`Packet::advert`] unset.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Truncated`] when the frame ends inside a declared
    ///   field (header, transport codes, path length, path)
    /// - [`ProtocolError::PathTooLong`] when the declared path length
    ///   exceeds [`MAX_PATH_LEN`]
    /// - [`ProtocolError::PayloadTooLarge`] when the trailing payload
    ///   exceeds [`MAX_PAYLOAD_LEN`]
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < MIN_FRAME_LEN {
            return Err(ProtocolError::Truncated { expected: MIN_FRAME_LEN, actual: raw.len() });
        }

        let (route, payload_type, payload_version) = header::unpack(raw[0]);
        let mut idx = 1;

        let transport_codes = if route.has_transport_codes() {
            if idx + 4 > raw.len() {
                return Err(ProtocolError::Truncated { expected: idx + 4, actual: raw.len() });
            }
            let a = u16::from_le_bytes([raw[idx], raw[idx + 1]]);
            let b = u16::from_le_bytes([raw[idx + 2], raw[idx + 3]]);
            idx += 4;
            Some([a, b])
        } else {
            None
        };

        if idx >= raw.len() {
            return Err(ProtocolError::Truncated { expected: idx + 1, actual: raw.len() });
        }
        let path_len = raw[idx] as usize;
        idx += 1;

        if path_len > MAX_PATH_LEN {
            return Err(ProtocolError::PathTooLong(path_len));
        }
        if idx + path_len > raw.len() {
            return Err(ProtocolError::Truncated { expected: idx + path_len, actual: raw.len() });
        }
        let path = raw[idx..idx + path_len].to_vec();
        idx += path_len;

        let payload = raw[idx..].to_vec();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge(payload.len()));
        }

        let advert = if payload_type == PayloadType::Advert && !payload.is_empty() {
            Advert::parse(&payload).ok()
        } else {
            None
        };

        Ok(Self { route, payload_type, payload_version, transport_codes, path, payload, advert })
    }

    /// Encode this packet into `buf`, returning the number of bytes written.
    ///
    /// The buffer beyond the returned length is left untouched.
    ///
    /// # Errors
    ///
    /// - Any [`Packet::validate`] error
    /// - [`ProtocolError::BufferTooSmall`] when `buf` cannot hold the frame
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        self.validate()?;

        let needed = self.encoded_len();
        if needed > buf.len() {
            return Err(ProtocolError::BufferTooSmall { needed, available: buf.len() });
        }

        let mut idx = 0;
        buf[idx] = self.header_byte();
        idx += 1;

        if let Some(codes) = self.transport_codes {
            buf[idx..idx + 2].copy_from_slice(&codes[0].to_le_bytes());
            buf[idx + 2..idx + 4].copy_from_slice(&codes[1].to_le_bytes());
            idx += 4;
        }

        buf[idx] = self.path.len() as u8;
        idx += 1;
        buf[idx..idx + self.path.len()].copy_from_slice(&self.path);
        idx += self.path.len();
        buf[idx..idx + self.payload.len()].copy_from_slice(&self.payload);
        idx += self.payload.len();

        debug_assert_eq!(idx, needed);
        Ok(idx)
    }

    /// Encode into a freshly allocated buffer.
    ///
    /// # Errors
    ///
    /// Any [`Packet::validate`] error.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        let len = self.encode(&mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn arbitrary_packet() -> impl Strategy<Value = Packet> {
        (
            0u8..=3,                                    // route bits
            0u8..=15,                                   // payload type bits
            0u8..=3,                                    // version
            any::<[u16; 2]>(),                          // transport codes
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
        #[test]
        fn packet_round_trip(packet in arbitrary_packet()) {
            let wire = packet.encode_to_vec().expect("should encode");
            let parsed = Packet::decode(&wire).expect("should decode");
            prop_assert_eq!(&packet, &parsed);

            let rewire = parsed.encode_to_vec().expect("should re-encode");
            prop_assert_eq!(wire, rewire);
        }

        #[test]
        fn encode_length_matches(packet in arbitrary_packet()) {
            let mut buf = [0u8; MAX_FRAME_LEN];
            let len = packet.encode(&mut buf).expect("should encode");
            prop_assert_eq!(len, packet.encoded_len());
        }

        #[test]
        fn decode_never_panics(raw in prop::collection::vec(any::<u8>(), 0..300)) {
            let _ = Packet::decode(&raw);
        }
    }

    #[test]
    fn reject_short_frames() {
        assert!(matches!(Packet::decode(&[]), Err(ProtocolError::Truncated { .. })));
        assert!(matches!(Packet::decode(&[0x15]), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn reject_truncated_transport_codes() {
        // TransportFlood route with only 2 of 4 transport-code bytes.
        let raw = [0x00, 0xAA, 0xBB];
        assert!(matches!(Packet::decode(&raw), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn reject_path_overrun() {
        // Flood header, path length 10, but only 3 path bytes present.
        let raw = [0x01, 10, 1, 2, 3];
        assert!(matches!(Packet::decode(&raw), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn reject_path_too_long() {
        let raw = [0x01, 65];
        assert_eq!(Packet::decode(&raw), Err(ProtocolError::PathTooLong(65)));
    }

    #[test]
    fn transport_codes_little_endian() {
        let mut packet = Packet::new(RouteType::TransportFlood, PayloadType::TxtMsg);
        packet.transport_codes = Some([0x1234, 0xABCD]);
        let wire = packet.encode_to_vec().unwrap();
        assert_eq!(&wire[1..5], &[0x34, 0x12, 0xCD, 0xAB]);
    }

    #[test]
    fn empty_path_and_payload_is_two_bytes() {
        let packet = Packet::new(RouteType::Flood, PayloadType::GrpTxt);
        let wire = packet.encode_to_vec().unwrap();
        assert_eq!(wire, vec![0x15, 0x00]);
    }

    #[test]
    fn encode_rejects_small_buffer() {
        let mut packet = Packet::new(RouteType::Flood, PayloadType::TxtMsg);
        packet.payload = vec![0u8; 40];
        let mut buf = [0u8; 16];
        assert_eq!(
            packet.encode(&mut buf),
            Err(ProtocolError::BufferTooSmall { needed: 42, available: 16 })
        );
    }

    #[test]
    fn encode_rejects_mismatched_transport_codes() {
        let mut packet = Packet::new(RouteType::Flood, PayloadType::TxtMsg);
        packet.transport_codes = Some([1, 2]);
        assert_eq!(packet.validate(), Err(ProtocolError::UnexpectedTransportCodes));

        let mut packet = Packet::new(RouteType::TransportDirect, PayloadType::TxtMsg);
        packet.transport_codes = None;
        assert_eq!(packet.validate(), Err(ProtocolError::TransportCodesMissing));
    }
}
