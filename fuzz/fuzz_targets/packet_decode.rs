//! Fuzz target for the wire codec.
//!
//! Arbitrary radio bytes must either decode cleanly or return an error;
//! the decoder must never panic, and a successful decode must re-encode to
//! exactly the input bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;

use embermesh_proto::Packet;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = Packet::decode(data) {
        let rewire = packet.encode_to_vec().expect("decoded packet must re-encode");
        assert_eq!(rewire, data, "re-encode must be byte-identical");
    }
});
