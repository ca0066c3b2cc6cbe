//! The relay protocol: wire types and the device lifecycle client.

pub mod client;
pub mod types;

pub use client::{Client, SessionState};
pub use types::{
    Accounting, Identity, Message, MessageBody, PushMessage, PushResponse, ReceiptStatus,
    ReplacePolicy,
};
