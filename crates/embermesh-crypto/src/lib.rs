//! Cryptographic primitives for the Embermesh repeater.
//!
//! Thin, deterministic wrappers over the RustCrypto stack, shaped to match
//! the MeshCore wire formats bit for bit:
//!
//! - SHA-256 and HMAC-SHA256 (channel hashes and the truncated channel MAC)
//! - AES-128 in ECB stream mode with zero padding (channel ciphertext)
//! - encrypt-then-MAC / MAC-then-decrypt framing with a 2-byte MAC
//! - ed25519 keypairs in MeshCore's 64-byte private form, signing and
//!   verification (adverts)
//! - base64/hex decoding for configured channel secrets
//!
//! Everything here is a pure function of its inputs. Callers provide entropy
//! for key generation, which keeps the whole engine deterministic under the
//! simulation harness.
//!
//! # Security
//!
//! - MAC verification compares in constant time (`subtle`); a mismatch is
//!   indistinguishable from a wrong channel.
//! - Private key material is zeroed on drop.
//! - ECB with a per-message timestamp prefix is what the wire protocol
//!   demands; it is inherited, not chosen.

pub mod cipher;
pub mod encoding;
pub mod errors;
pub mod signing;

pub use cipher::{
    CIPHER_BLOCK_LEN, CIPHER_KEY_LEN, MAC_LEN, ecb_decrypt, ecb_encrypt, encrypt_then_mac,
    hmac_sha256, mac_then_decrypt, sha256,
};
pub use encoding::{base64_decode, hex_decode};
pub use errors::CryptoError;
pub use signing::{Keypair, keypair_from_seed, sign, verify};
