//! Symmetric-key authenticated text channels.
//!
//! A channel is a 16-byte secret plus a one-byte channel hash (first byte of
//! SHA-256 of the secret) used as a cheap filter before attempting
//! decryption. Group text payloads are:
//!
//! ```text
//! channel_hash(1) || mac(2) || aes128_ecb( le32(ts) || flags(1) || utf8(text) )
//! ```
//!
//! There is exactly one public channel, keyed from a well-known PSK and used
//! only for the node's own broadcasts; up to eight private channels come
//! from the configuration and are the sole carrier for management commands.

use tracing::warn;

use embermesh_crypto::{
    CIPHER_KEY_LEN, MAC_LEN, base64_decode, encrypt_then_mac, hex_decode, mac_then_decrypt, sha256,
};
use embermesh_proto::{Packet, PayloadType, RouteType};

use crate::errors::ChannelError;

/// Longest channel message including the NUL reserve (10 cipher blocks).
pub const MAX_MESSAGE_LEN: usize = 160;
/// Maximum number of configured private channels.
pub const MAX_PRIVATE_CHANNELS: usize = 8;
/// Well-known public channel PSK (base64).
pub const PUBLIC_CHANNEL_PSK: &str = "izOH6cXN6mrJ5e26oRXNcg==";

const PLAINTEXT_HEADER_LEN: usize = 5; // le32 timestamp + flags byte

/// A decrypted inbound channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Sender's epoch-seconds timestamp.
    pub timestamp: u32,
    /// Message text.
    pub text: String,
    /// Index of the private channel that decrypted it.
    pub channel_index: usize,
}

#[derive(Clone)]
struct Channel {
    secret: [u8; CIPHER_KEY_LEN],
    hash: u8,
}

impl Channel {
    fn from_secret(secret: [u8; CIPHER_KEY_LEN]) -> Self {
        let hash = sha256(&secret)[0];
        Self { secret, hash }
    }
}

impl core::fmt::Debug for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channel")
            .field("hash", &format_args!("{:02X}", self.hash))
            .finish_non_exhaustive()
    }
}

/// The node's configured channels.
#[derive(Debug, Clone)]
pub struct ChannelSet {
    public: Channel,
    private: Vec<Channel>,
}

impl ChannelSet {
    /// Build the channel set from hex-encoded private secrets.
    ///
    /// Invalid keys are skipped with a warning, matching the firmware's
    /// per-channel degradation; channels beyond [`MAX_PRIVATE_CHANNELS`] are
    /// ignored.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidSecret`] only for the built-in public PSK,
    /// which cannot fail unless the constant is corrupted.
    pub fn new(private_keys_hex: &[String]) -> Result<Self, ChannelError> {
        let psk = base64_decode(PUBLIC_CHANNEL_PSK)
            .map_err(|source| ChannelError::InvalidSecret { index: 0, source })?;
        let mut public_secret = [0u8; CIPHER_KEY_LEN];
        if psk.len() != CIPHER_KEY_LEN {
            return Err(ChannelError::InvalidSecret {
                index: 0,
                source: embermesh_crypto::CryptoError::InvalidEncoding("base64"),
            });
        }
        public_secret.copy_from_slice(&psk);

        let mut private = Vec::new();
        for (index, key) in private_keys_hex.iter().take(MAX_PRIVATE_CHANNELS).enumerate() {
            match hex_decode(key) {
                Ok(bytes) if bytes.len() == CIPHER_KEY_LEN => {
                    let mut secret = [0u8; CIPHER_KEY_LEN];
                    secret.copy_from_slice(&bytes);
                    private.push(Channel::from_secret(secret));
                }
                Ok(bytes) => {
                    warn!(index, len = bytes.len(), "private channel key has wrong length");
                }
                Err(err) => {
                    warn!(index, %err, "private channel key is not valid hex");
                }
            }
        }
        if private_keys_hex.len() > MAX_PRIVATE_CHANNELS {
            warn!(
                configured = private_keys_hex.len(),
                "too many private channels, extra ones ignored"
            );
        }

        Ok(Self { public: Channel::from_secret(public_secret), private })
    }

    /// Number of usable private channels.
    #[must_use]
    pub fn private_count(&self) -> usize {
        self.private.len()
    }

    /// Build a group-text packet on a private channel.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::UnknownChannel`] for an out-of-range index
    /// - [`ChannelError::TextTooLong`] when the text exceeds the channel
    ///   maximum
    pub fn build_private(
        &self,
        channel_index: usize,
        text: &str,
        timestamp: u32,
    ) -> Result<Packet, ChannelError> {
        let channel = self
            .private
            .get(channel_index)
            .ok_or(ChannelError::UnknownChannel(channel_index))?;
        Self::build_text_packet(channel, text, timestamp)
    }

    /// Build a group-text packet on the public channel.
    ///
    /// # Errors
    ///
    /// [`ChannelError::TextTooLong`] when the text exceeds the channel
    /// maximum.
    pub fn build_public(&self, text: &str, timestamp: u32) -> Result<Packet, ChannelError> {
        Self::build_text_packet(&self.public, text, timestamp)
    }

    fn build_text_packet(
        channel: &Channel,
        text: &str,
        timestamp: u32,
    ) -> Result<Packet, ChannelError> {
        if text.len() > MAX_MESSAGE_LEN - 1 {
            return Err(ChannelError::TextTooLong(text.len()));
        }

        let mut plain = Vec::with_capacity(PLAINTEXT_HEADER_LEN + text.len());
        plain.extend_from_slice(&timestamp.to_le_bytes());
        plain.push(0); // flags
        plain.extend_from_slice(text.as_bytes());

        let framed = encrypt_then_mac(&channel.secret, &plain);

        let mut packet = Packet::new(RouteType::Flood, PayloadType::GrpTxt);
        packet.payload.push(channel.hash);
        packet.payload.extend_from_slice(&framed);
        packet.validate()?;
        Ok(packet)
    }

    /// Try to decrypt an inbound group text against every private channel.
    ///
    /// Returns `None` for anything that is not a well-formed group text on
    /// one of our channels; callers cannot distinguish a foreign channel
    /// from a forged MAC.
    #[must_use]
    pub fn decode_private(&self, packet: &Packet) -> Option<ChannelMessage> {
        if packet.payload_type != PayloadType::GrpTxt {
            return None;
        }
        if packet.payload.len() <= 1 + MAC_LEN {
            return None;
        }

        for (channel_index, channel) in self.private.iter().enumerate() {
            if let Some((timestamp, text)) = Self::decode_with(channel, packet) {
                return Some(ChannelMessage { timestamp, text, channel_index });
            }
        }
        None
    }

    fn decode_with(channel: &Channel, packet: &Packet) -> Option<(u32, String)> {
        if packet.payload[0] != channel.hash {
            return None;
        }

        let plain = mac_then_decrypt(&channel.secret, &packet.payload[1..]).ok()?;
        if plain.len() < PLAINTEXT_HEADER_LEN {
            return None;
        }

        let timestamp = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]);
        let text_bytes = &plain[PLAINTEXT_HEADER_LEN..];
        let end = text_bytes.iter().position(|&b| b == 0).unwrap_or(text_bytes.len());
        let text = String::from_utf8_lossy(&text_bytes[..end]).into_owned();

        Some((timestamp, text))
    }
}
