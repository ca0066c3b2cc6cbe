//! Pushling: client engine for the Pushover notification relay.
//!
//! The crate keeps a device's relationship with the relay alive:
//! authenticate, register, poll for queued messages, open end-to-end
//! encrypted bodies, acknowledge receipt, and hand decoded messages to a
//! presentation collaborator. Rendering, sound playback, and asset
//! caching live outside this crate behind [`notify::Notifier`].
//!
//! # Modules
//!
//! - [`relay`] - protocol client and wire types
//! - [`envelope`] - authenticated encryption envelope for message bodies
//! - [`validate`] - pure field rules and protocol limits
//! - [`dialer`] - transport seam (direct or SOCKS5)
//! - [`poller`] - per-account polling lifecycle
//! - [`config`] - configuration file and write-back store
//! - [`notify`] - the outward notification surface

pub mod config;
pub mod constants;
pub mod dialer;
pub mod envelope;
pub mod error;
pub mod notify;
pub mod poller;
pub mod relay;
pub mod validate;

// Re-export commonly used types
pub use config::{Account, Config, ConfigStore, Globals, ProxyEntry};
pub use dialer::{Dialer, DirectDialer, SocksDialer};
pub use error::{Error, Result};
pub use notify::{LogNotifier, Notification, Notifier, Urgency, UrgencyMap};
pub use poller::PollerContext;
pub use relay::{Client, Identity, Message, MessageBody, PushMessage, ReplacePolicy, SessionState};
