//! Application-wide constants for pushling.
//!
//! Protocol field limits live next to the rules that enforce them in
//! [`crate::validate`]; this module keeps the operational knobs.

use std::time::Duration;

/// Base URL of the notification relay's HTTP API.
pub const API_BASE_URL: &str = "https://api.pushover.net/1";

/// Request timeout applied by the default direct dialer.
///
/// Covers the whole request/response round trip; there is no separate
/// read timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Floor for the configured poll interval.
///
/// Polling faster than this hammers the relay without delivering
/// messages any sooner.
pub const MIN_CHECK_SECONDS: u64 = 5;

/// Poll interval used when the config does not name one.
pub const DEFAULT_CHECK_SECONDS: u64 = 30;

/// Connect timeout used by the SOCKS dialer when the proxy entry does
/// not carry its own.
pub const DEFAULT_PROXY_TIMEOUT_SECONDS: u64 = 60;
