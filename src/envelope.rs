//! End-to-end encryption envelope for message bodies.
//!
//! The relay passes message bodies through blind, so encrypted bodies are
//! tagged inside the plaintext carrier field itself:
//!
//! ```text
//! "@Encrypted@ " + base64(nonce[24] ‖ ciphertext+tag)
//! ```
//!
//! Sealing uses XChaCha20-Poly1305 with a fresh random 24-byte nonce per
//! message. Random nonces mean neither side keeps sequence state and the
//! relay stays a pass-through. Opening authenticates before it returns
//! anything: a tampered, truncated, or wrong-key envelope yields
//! [`Error::AuthenticationFailed`], never partial plaintext.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::Error;
use crate::validate::MESSAGE_LIMIT;

/// Recognition marker prefixed to every encrypted body.
pub const MARKER: &str = "@Encrypted@";

/// Key size for XChaCha20-Poly1305.
pub const KEY_SIZE: usize = 32;

/// Nonce size for XChaCha20-Poly1305 (192 bits = 24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag appended to every ciphertext.
const TAG_SIZE: usize = 16;

/// A per-device symmetric envelope key. Zeroized on drop.
pub struct SecretKey {
    key: [u8; KEY_SIZE],
}

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Derive a key from a configured passphrase: the passphrase bytes are
    /// copied into the key, zero-padded or truncated to 32 bytes. This
    /// mirrors what deployed peers do with the same passphrase, so both
    /// ends arrive at the same key without a negotiation step.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let mut key = [0u8; KEY_SIZE];
        let bytes = passphrase.as_bytes();
        let n = bytes.len().min(KEY_SIZE);
        key[..n].copy_from_slice(&bytes[..n]);
        Self { key }
    }

    fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey").finish_non_exhaustive()
    }
}

/// Marker predicate: does this body carry an envelope?
///
/// Pure prefix check so a fetch batch can skip plain messages without
/// paying any decode cost.
pub fn is_sealed(body: &str) -> bool {
    body.starts_with(MARKER)
}

/// Seal a message body into its wire text.
///
/// A fresh random nonce is drawn per call; nonce reuse under the same key
/// breaks confidentiality. Fails with [`Error::SizeExceeded`] when the
/// resulting text would not fit the relay's message limit.
pub fn seal(key: &SecretKey, plaintext: &str) -> Result<String, Error> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| Error::SealFailed)?;

    let mut wire = Vec::with_capacity(NONCE_SIZE + sealed.len());
    wire.extend_from_slice(&nonce);
    wire.extend_from_slice(&sealed);

    let text = format!("{MARKER} {}", BASE64.encode(wire));
    if text.len() > MESSAGE_LIMIT {
        return Err(Error::SizeExceeded);
    }
    Ok(text)
}

/// Open a wire text back into its exact original body.
///
/// Fails closed: every corruption (marker missing, undecodable base64,
/// truncation below nonce+tag, tag mismatch, wrong key) is reported as
/// [`Error::AuthenticationFailed`].
pub fn open(key: &SecretKey, wire: &str) -> Result<String, Error> {
    let encoded = wire
        .strip_prefix(MARKER)
        .ok_or(Error::AuthenticationFailed)?
        .trim_start();

    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| Error::AuthenticationFailed)?;
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::AuthenticationFailed);
    }

    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let plain = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::AuthenticationFailed)?;

    String::from_utf8(plain).map_err(|_| Error::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SecretKey {
        SecretKey::from_bytes([7u8; KEY_SIZE])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        for plaintext in ["", "x", "hello, sealed world", &"p".repeat(300)] {
            let wire = seal(&key, plaintext).unwrap();
            assert!(is_sealed(&wire));
            assert_eq!(open(&key, &wire).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_nonce_is_fresh_per_seal() {
        let key = test_key();
        let a = seal(&key, "same body").unwrap();
        let b = seal(&key, "same body").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let wire = seal(&test_key(), "secret").unwrap();
        let wrong = SecretKey::from_bytes([8u8; KEY_SIZE]);
        assert!(matches!(
            open(&wrong, &wire),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_tamper_detection() {
        let key = test_key();
        let wire = seal(&key, "integrity matters").unwrap();

        // Flip one bit inside the ciphertext portion.
        let encoded = wire.strip_prefix(MARKER).unwrap().trim_start();
        let mut bytes = BASE64.decode(encoded).unwrap();
        let target = NONCE_SIZE + 2;
        bytes[target] ^= 0x01;
        let tampered = format!("{MARKER} {}", BASE64.encode(bytes));

        assert!(matches!(
            open(&key, &tampered),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_malformed_envelopes_fail_closed() {
        let key = test_key();
        assert!(open(&key, "plain text").is_err());
        assert!(open(&key, "@Encrypted@ not!base64!").is_err());
        // Well-formed base64 but shorter than nonce + tag.
        let short = format!("{MARKER} {}", BASE64.encode([0u8; 16]));
        assert!(matches!(
            open(&key, &short),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_marker_predicate() {
        let wire = seal(&test_key(), "ping").unwrap();
        assert!(is_sealed(&wire));
        assert!(!is_sealed("backup finished without errors"));
        assert!(!is_sealed(""));
    }

    #[test]
    fn test_passphrase_padding_matches_exact_bytes() {
        let padded = SecretKey::from_passphrase("short");
        let mut expected = [0u8; KEY_SIZE];
        expected[..5].copy_from_slice(b"short");
        let wire = seal(&padded, "body").unwrap();
        assert_eq!(
            open(&SecretKey::from_bytes(expected), &wire).unwrap(),
            "body"
        );
    }

    #[test]
    fn test_size_ceiling_on_sealed_text() {
        // 512 plaintext chars inflate past the limit once sealed.
        let key = test_key();
        assert!(matches!(
            seal(&key, &"x".repeat(512)),
            Err(Error::SizeExceeded)
        ));
        // A short body stays comfortably inside.
        assert!(seal(&key, "short").unwrap().len() <= MESSAGE_LIMIT);
    }
}
