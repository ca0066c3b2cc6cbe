//! Error taxonomy for the relay protocol client.
//!
//! Errors are grouped by category rather than by call site: every relay
//! operation fails with one of these variants, so callers can decide
//! whether a failure is fatal (login/registration) or survivable (a poll
//! tick) without matching on per-endpoint types.

use crate::validate::ValidationError;

/// Convenience alias used throughout the protocol layers.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between building a request and handing a
/// decoded response (or decrypted message) back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A credential required by this call was never configured.
    /// Raised before any network access.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// The call requires a session secret but login has not happened.
    #[error("device has not logged in")]
    NotAuthenticated,

    /// The call requires a registered device but registration has not
    /// happened on this client.
    #[error("device is not registered with the relay")]
    NotRegistered,

    /// A client-side field rule failed. Never sent over the wire.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Dial, connect, or read failure below the protocol.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The relay answered with HTTP >= 400.
    #[error("relay rejected the request: HTTP {status}")]
    Protocol { status: u16 },

    /// The relay answered 2xx but the JSON did not match the expected shape.
    #[error("malformed relay response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Envelope decryption failed: tag mismatch, wrong key, truncation, or
    /// undecodable encoding. One category for every corruption; nothing
    /// partial is ever returned.
    #[error("envelope authentication failed")]
    AuthenticationFailed,

    /// The AEAD refused to seal. Practically unreachable for bodies within
    /// the relay's size limit.
    #[error("envelope seal failed")]
    SealFailed,

    /// The encrypted wire text would exceed the relay's message limit.
    #[error("encrypted body exceeds the message size limit")]
    SizeExceeded,
}
