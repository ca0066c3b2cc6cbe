//! Wire types for the relay's JSON API.
//!
//! Response structs deserialize defensively: every field the client does
//! not strictly need carries a default so a shape drift on the relay's
//! side degrades to empty values instead of a decode error.

use serde::Deserialize;

/// Credentials and naming for one device under one account.
#[derive(Clone, Default)]
pub struct Identity {
    pub username: String,
    pub password: String,
    /// Immutable once registered. Empty means "not yet named".
    pub device_name: String,
    /// Random v4, generated once per account and persisted forward.
    pub device_uuid: String,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("device_name", &self.device_name)
            .field("device_uuid", &self.device_uuid)
            .finish_non_exhaustive()
    }
}

/// Whether registering may displace an existing device with the same name.
///
/// Encoded on the wire as the `force` form field: `Replace` = `"1"`,
/// `Keep` = `"0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacePolicy {
    Replace,
    Keep,
}

impl ReplacePolicy {
    pub fn as_wire(self) -> &'static str {
        match self {
            ReplacePolicy::Replace => "1",
            ReplacePolicy::Keep => "0",
        }
    }
}

/// Login response carrying the session secret.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub status: i32,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub id: String,
}

/// Device registration response.
#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    pub status: i32,
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub id: String,
}

/// Bare status/request acknowledgment shared by mutation endpoints.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: i32,
    #[serde(default)]
    pub request: String,
}

/// One queued message exactly as the relay serializes it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: u64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub aid: i64,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub sound: Option<String>,
    #[serde(default)]
    pub acked: i64,
    #[serde(default)]
    pub umid: i64,
    #[serde(default)]
    pub title: String,
}

/// Account-level state returned alongside a fetch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserState {
    #[serde(default)]
    pub quiet_hours: bool,
}

/// Full fetch response.
#[derive(Debug, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub user: Option<UserState>,
    pub status: i32,
    #[serde(default)]
    pub request: String,
}

/// A fetched message after the decryption pass.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: u64,
    pub body: MessageBody,
    pub app: String,
    /// Unresolved icon reference, raw, for a caching collaborator to fetch.
    pub icon: Option<String>,
    pub date: i64,
    pub priority: i64,
    /// Unresolved sound reference, raw.
    pub sound: Option<String>,
    pub acked: bool,
    pub title: String,
}

/// The tri-state body of a fetched message.
///
/// A failed decryption is carried as data next to its reason. It never
/// replaces the body text silently and never fails the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Arrived as plain text.
    Plain(String),
    /// Arrived sealed and opened with the configured key.
    Decrypted(String),
    /// Arrived sealed but could not be opened; holds the failure reason.
    Undecryptable(String),
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Self {
            id: wire.id,
            body: MessageBody::Plain(wire.message),
            app: wire.app,
            icon: wire.icon,
            date: wire.date,
            priority: wire.priority,
            sound: wire.sound,
            acked: wire.acked != 0,
            title: wire.title,
        }
    }
}

/// An outbound message, built per send.
#[derive(Debug, Clone, Default)]
pub struct PushMessage {
    /// Restrict delivery to one named device.
    pub device: Option<String>,
    pub title: Option<String>,
    pub message: String,
    pub priority: i64,
    /// Seconds an emergency message keeps retrying. Required above high
    /// priority.
    pub expire: u32,
    /// Seconds between emergency retries.
    pub retry: u32,
    pub url: Option<String>,
    pub url_title: Option<String>,
    pub timestamp: Option<i64>,
    pub sound: Option<String>,
    /// Callback url invoked by the relay when an emergency message is
    /// acknowledged.
    pub callback: Option<String>,
}

/// Push response body. The interesting part of a push outcome is the
/// accounting headers, captured separately.
#[derive(Debug, Deserialize)]
pub struct PushResponse {
    pub status: i32,
    #[serde(default)]
    pub request: String,
    /// Receipt token, present on emergency-class sends.
    #[serde(default)]
    pub receipt: Option<String>,
}

/// Delivery state of an emergency message, from the receipt endpoint.
#[derive(Debug, Deserialize)]
pub struct ReceiptStatus {
    pub status: i32,
    #[serde(default)]
    pub acknowledged: i64,
    #[serde(default)]
    pub acknowledged_at: i64,
    #[serde(default)]
    pub acknowledged_by: String,
    #[serde(default)]
    pub last_delivered_at: i64,
    #[serde(default)]
    pub expired: i64,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub called_back: i64,
    #[serde(default)]
    pub called_back_at: i64,
}

/// Application quota, overwritten from the `X-Limit-App-*` headers after
/// each push.
#[derive(Debug, Clone, Default)]
pub struct Accounting {
    pub app_limit: Option<String>,
    pub app_remaining: Option<String>,
    pub app_reset: Option<String>,
}

impl Accounting {
    pub(crate) fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        Self {
            app_limit: read("X-Limit-App-Limit"),
            app_remaining: read("X-Limit-App-Remaining"),
            app_reset: read("X-Limit-App-Reset"),
        }
    }
}
