//! Client-side field rules for relay identifiers and message fields.
//!
//! Everything here is a pure function over its arguments: no I/O, no
//! client state. The protocol client runs these before any network call
//! so that a bad field never costs a round trip.

use crate::relay::types::PushMessage;

/// Longest accepted user or group key.
pub const USER_KEY_LIMIT: usize = 30;
/// Longest accepted application token.
pub const APP_TOKEN_LIMIT: usize = 30;
/// Longest accepted message body, encrypted or not.
pub const MESSAGE_LIMIT: usize = 512;
/// Longest accepted message title.
pub const TITLE_LIMIT: usize = 100;
/// Longest accepted supplementary url.
pub const URL_LIMIT: usize = 512;
/// Longest accepted supplementary url title.
pub const URL_TITLE_LIMIT: usize = 100;
/// Longest accepted device name.
pub const DEVICE_NAME_LIMIT: usize = 25;
/// Exact length of an emergency receipt token.
pub const RECEIPT_LENGTH: usize = 30;

/// A field rule failure. These abort a call before it reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("device names may only contain letters, numbers, dashes, and underscores, up to {DEVICE_NAME_LIMIT} characters")]
    InvalidDeviceName,
    #[error("user and group keys are case-sensitive alphanumeric strings of up to {USER_KEY_LIMIT} characters")]
    InvalidUserKey,
    #[error("application tokens are case-sensitive alphanumeric strings of up to {APP_TOKEN_LIMIT} characters")]
    InvalidAppToken,
    #[error("receipts are exactly {RECEIPT_LENGTH} alphanumeric characters")]
    InvalidReceipt,
    #[error("a message body must be 1 to {MESSAGE_LIMIT} characters")]
    InvalidMessageLength,
    #[error("titles are limited to {TITLE_LIMIT} characters")]
    TitleTooLong,
    #[error("urls are limited to {URL_LIMIT} characters")]
    UrlTooLong,
    #[error("url titles are limited to {URL_TITLE_LIMIT} characters")]
    UrlTitleTooLong,
    #[error("messages above high priority need a positive expire value")]
    ExpireRequired,
}

fn is_alphanumeric(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Check a device name. An empty name is accepted; it means the device
/// has not been named yet.
pub fn device_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Ok(());
    }
    if name.len() > DEVICE_NAME_LIMIT {
        return Err(ValidationError::InvalidDeviceName);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidDeviceName);
    }
    Ok(())
}

/// Check a user or group key.
pub fn user_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() || key.len() > USER_KEY_LIMIT || !is_alphanumeric(key) {
        return Err(ValidationError::InvalidUserKey);
    }
    Ok(())
}

/// Check an application token.
pub fn app_token(token: &str) -> Result<(), ValidationError> {
    if token.is_empty() || token.len() > APP_TOKEN_LIMIT || !is_alphanumeric(token) {
        return Err(ValidationError::InvalidAppToken);
    }
    Ok(())
}

/// Check an emergency receipt token.
pub fn receipt(receipt: &str) -> Result<(), ValidationError> {
    if receipt.len() != RECEIPT_LENGTH || !is_alphanumeric(receipt) {
        return Err(ValidationError::InvalidReceipt);
    }
    Ok(())
}

/// Check every field rule on an outbound message, including the
/// cross-field rule that emergency-class priorities carry an expiry.
pub fn push_message(message: &PushMessage) -> Result<(), ValidationError> {
    if message.message.is_empty() || message.message.len() > MESSAGE_LIMIT {
        return Err(ValidationError::InvalidMessageLength);
    }
    if message.title.as_deref().unwrap_or("").len() > TITLE_LIMIT {
        return Err(ValidationError::TitleTooLong);
    }
    if message.url.as_deref().unwrap_or("").len() > URL_LIMIT {
        return Err(ValidationError::UrlTooLong);
    }
    if message.url_title.as_deref().unwrap_or("").len() > URL_TITLE_LIMIT {
        return Err(ValidationError::UrlTitleTooLong);
    }
    if message.priority > 1 && message.expire == 0 {
        return Err(ValidationError::ExpireRequired);
    }
    Ok(())
}
