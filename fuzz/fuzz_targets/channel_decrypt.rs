//! Fuzz target for the authenticated channel framing.
//!
//! MAC-then-decrypt over attacker-controlled bytes must never panic, and
//! anything it accepts must round-trip through encrypt-then-MAC.

#![no_main]

use libfuzzer_sys::fuzz_target;

use embermesh_crypto::{encrypt_then_mac, mac_then_decrypt};

const KEY: [u8; 16] = [0x42; 16];

fuzz_target!(|data: &[u8]| {
    if let Ok(plain) = mac_then_decrypt(&KEY, data) {
        // Forging the truncated MAC is feasible for a fuzzer (2 bytes), so
        // accepted frames are not necessarily ours; but whatever decrypts
        // must re-frame to the same ciphertext.
        let reframed = encrypt_then_mac(&KEY, &plain);
        assert_eq!(&reframed[2..], &data[2..]);
    }
});
