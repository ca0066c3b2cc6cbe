//! Protocol client for the notification relay.
//!
//! This module owns the device lifecycle against the relay's HTTP API:
//!
//! ```text
//! Unauthenticated -> Authenticated -> Registered -> Polling
//!        login            register        fetch
//! ```
//!
//! Mutations are form-encoded POSTs, retrieval is query-encoded GET, and
//! every response body is read as text before JSON parsing so transport
//! failures, relay rejections (HTTP >= 400), and shape mismatches stay
//! distinguishable error categories.

use reqwest::blocking::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;

use crate::dialer::Dialer;
use crate::envelope::{self, SecretKey};
use crate::error::{Error, Result};
use crate::validate;

use super::types::{
    Accounting, FetchResponse, Identity, LoginResponse, Message, MessageBody, PushMessage,
    PushResponse, ReceiptStatus, RegisterResponse, ReplacePolicy, StatusResponse,
};

/// Where the client sits in the device lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Registered,
    Polling,
}

/// A device's view of the relay.
///
/// Owns the device identity, the session secret, the most recent fetch
/// batch, and the accounting snapshot. All calls are blocking; the
/// transport is fixed at construction through a [`Dialer`].
pub struct Client {
    http: HttpClient,
    base_url: String,
    identity: Identity,
    device_os: &'static str,
    key: Option<SecretKey>,
    app_token: Option<String>,
    user_key: Option<String>,
    state: SessionState,
    secret: Option<String>,
    server_device_id: Option<String>,
    messages: Vec<Message>,
    quiet_hours: bool,
    accounting: Accounting,
}

impl Client {
    /// Create a client for one device. The dialer is invoked once here;
    /// every later call reuses the client it produced.
    pub fn new(
        base_url: impl Into<String>,
        identity: Identity,
        dialer: &dyn Dialer,
    ) -> Result<Self> {
        Ok(Self {
            http: dialer.dial()?,
            base_url: base_url.into(),
            identity,
            device_os: std::env::consts::OS,
            key: None,
            app_token: None,
            user_key: None,
            state: SessionState::Unauthenticated,
            secret: None,
            server_device_id: None,
            messages: Vec::new(),
            quiet_hours: false,
            accounting: Accounting::default(),
        })
    }

    /// Configure the symmetric envelope key. With a key set, fetched
    /// bodies carrying the envelope marker are decrypted in place and
    /// pushes may be sealed.
    pub fn with_envelope_key(mut self, passphrase: &str) -> Self {
        self.key = Some(SecretKey::from_passphrase(passphrase));
        self
    }

    /// Configure the application token and user key used by the push and
    /// receipt endpoints.
    pub fn with_push_credentials(
        mut self,
        app_token: impl Into<String>,
        user_key: impl Into<String>,
    ) -> Self {
        self.app_token = Some(app_token.into());
        self.user_key = Some(user_key.into());
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The batch populated by the most recent fetch.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Hand the current batch to the caller, leaving the client empty.
    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    /// Whether the account was inside its quiet hours at the last fetch.
    pub fn quiet_hours(&self) -> bool {
        self.quiet_hours
    }

    /// Quota snapshot from the most recent push.
    pub fn accounting(&self) -> &Accounting {
        &self.accounting
    }

    /// Identifier the relay assigned at registration, if any.
    pub fn server_device_id(&self) -> Option<&str> {
        self.server_device_id.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn secret(&self) -> Result<&str> {
        self.secret.as_deref().ok_or(Error::NotAuthenticated)
    }

    fn require_registered(&self) -> Result<()> {
        match self.state {
            SessionState::Registered | SessionState::Polling => Ok(()),
            SessionState::Authenticated => Err(Error::NotRegistered),
            SessionState::Unauthenticated => Err(Error::NotAuthenticated),
        }
    }

    /// Exchange account credentials for a session secret.
    ///
    /// One round trip. On success the client is `Authenticated`. There is
    /// no client-side refresh: a secret invalidated by the relay surfaces
    /// as a `Protocol` error on a later call, and the fix is another
    /// login.
    pub fn login(&mut self) -> Result<()> {
        if self.identity.username.is_empty() || self.identity.password.is_empty() {
            return Err(Error::MissingCredential("username and password"));
        }
        validate::device_name(&self.identity.device_name)?;
        if self.identity.device_uuid.is_empty() {
            return Err(Error::MissingCredential("device uuid"));
        }

        let response = self
            .http
            .post(self.url("/users/login.json"))
            .form(&[
                ("email", self.identity.username.as_str()),
                ("password", self.identity.password.as_str()),
            ])
            .send()?;
        let login: LoginResponse = parse_response(response)?;

        self.secret = Some(login.secret);
        self.state = SessionState::Authenticated;
        log::debug!("logged in, request={}", login.request);
        Ok(())
    }

    /// Register this device under its name and UUID.
    ///
    /// With [`ReplacePolicy::Keep`], re-registering a name the relay
    /// already knows is rejected server-side and surfaces as a
    /// `Protocol` error; no idempotent dedup happens here.
    pub fn register_device(&mut self, replace: ReplacePolicy) -> Result<()> {
        let secret = self.secret()?;
        validate::device_name(&self.identity.device_name)?;

        let response = self
            .http
            .post(self.url("/devices.json"))
            .form(&[
                ("secret", secret),
                ("name", self.identity.device_name.as_str()),
                ("uuid", self.identity.device_uuid.as_str()),
                ("os", self.device_os),
                ("force", replace.as_wire()),
            ])
            .send()?;
        let device: RegisterResponse = parse_response(response)?;

        self.server_device_id = Some(device.id);
        self.state = SessionState::Registered;
        log::info!("device {} registered", self.identity.device_uuid);
        Ok(())
    }

    /// Pull every message queued above the device's high-water mark.
    ///
    /// Returns the fetch count; zero is a normal outcome. The batch is
    /// available through [`Self::messages`] / [`Self::take_messages`].
    ///
    /// When an envelope key is configured, each body carrying the
    /// envelope marker is decrypted through its index in the owned batch.
    /// A failed decryption downgrades that one entry to
    /// [`MessageBody::Undecryptable`] and leaves the rest of the batch
    /// untouched.
    pub fn fetch_messages(&mut self) -> Result<usize> {
        self.require_registered()?;
        let secret = self.secret()?;

        let response = self
            .http
            .get(self.url("/messages.json"))
            .query(&[
                ("secret", secret),
                ("device_id", self.identity.device_uuid.as_str()),
            ])
            .send()?;
        let fetch: FetchResponse = parse_response(response)?;

        let mut batch: Vec<Message> = fetch.messages.into_iter().map(Message::from).collect();
        if let Some(key) = &self.key {
            for i in 0..batch.len() {
                let sealed = match &batch[i].body {
                    MessageBody::Plain(text) if envelope::is_sealed(text) => text.clone(),
                    _ => continue,
                };
                batch[i].body = match envelope::open(key, &sealed) {
                    Ok(plain) => MessageBody::Decrypted(plain),
                    Err(err) => {
                        log::warn!("message {} failed to decrypt: {err}", batch[i].id);
                        MessageBody::Undecryptable(err.to_string())
                    }
                };
            }
        }

        let fetched = batch.len();
        self.messages = batch;
        self.quiet_hours = fetch.user.unwrap_or_default().quiet_hours;
        self.state = SessionState::Polling;
        Ok(fetched)
    }

    /// Advance the relay's high-water mark past `latest_id`.
    ///
    /// Must follow every fetch that yielded messages; skipping it makes
    /// the relay redeliver the same batch on the next poll.
    pub fn acknowledge_up_to(&mut self, latest_id: u64) -> Result<()> {
        self.require_registered()?;
        let secret = self.secret()?;

        let path = format!(
            "/devices/{}/update_highest_message.json",
            self.identity.device_uuid
        );
        let latest = latest_id.to_string();
        let response = self
            .http
            .post(self.url(&path))
            .form(&[("secret", secret), ("message", latest.as_str())])
            .send()?;
        let _ack: StatusResponse = parse_response(response)?;

        log::debug!("acknowledged up to message {latest_id}");
        Ok(())
    }

    /// Submit one outbound message.
    ///
    /// Fields are validated before any network access. With `encrypt`,
    /// the body is replaced by its envelope and the send fails closed
    /// with `SizeExceeded` if the sealed text outgrows the message limit.
    /// The accounting snapshot refreshes from the response headers on
    /// every outcome, since the relay attaches them to 4xx answers too.
    pub fn push_message(&mut self, message: &PushMessage, encrypt: bool) -> Result<PushResponse> {
        let app_token = self
            .app_token
            .clone()
            .ok_or(Error::MissingCredential("application token"))?;
        let user_key = self
            .user_key
            .clone()
            .ok_or(Error::MissingCredential("user key"))?;
        validate::app_token(&app_token)?;
        validate::user_key(&user_key)?;
        validate::device_name(&self.identity.device_name)?;
        validate::push_message(message)?;

        let body = if encrypt {
            let key = self
                .key
                .as_ref()
                .ok_or(Error::MissingCredential("envelope key"))?;
            envelope::seal(key, &message.message)?
        } else {
            message.message.clone()
        };

        let mut form: Vec<(&str, String)> = vec![
            ("token", app_token),
            ("user", user_key),
            ("message", body),
            ("priority", message.priority.to_string()),
        ];
        if let Some(device) = &message.device {
            form.push(("device", device.clone()));
        }
        if let Some(title) = &message.title {
            form.push(("title", title.clone()));
        }
        if let Some(url) = &message.url {
            form.push(("url", url.clone()));
        }
        if let Some(url_title) = &message.url_title {
            form.push(("url_title", url_title.clone()));
        }
        if let Some(sound) = &message.sound {
            form.push(("sound", sound.clone()));
        }
        if let Some(callback) = &message.callback {
            form.push(("callback", callback.clone()));
        }
        if let Some(timestamp) = message.timestamp {
            form.push(("timestamp", timestamp.to_string()));
        }
        if message.expire > 0 {
            form.push(("expire", message.expire.to_string()));
        }
        if message.retry > 0 {
            form.push(("retry", message.retry.to_string()));
        }

        let response = self
            .http
            .post(self.url("/messages.json"))
            .form(&form)
            .send()?;

        // Headers first: 2xx and 4xx both carry the quota snapshot.
        self.accounting = Accounting::from_headers(response.headers());
        parse_response(response)
    }

    /// Look up the delivery state of an emergency message by its receipt.
    pub fn lookup_receipt(&self, receipt: &str) -> Result<ReceiptStatus> {
        let app_token = self
            .app_token
            .as_deref()
            .ok_or(Error::MissingCredential("application token"))?;
        validate::receipt(receipt)?;

        let response = self
            .http
            .get(self.url(&format!("/receipts/{receipt}.json")))
            .query(&[("token", app_token)])
            .send()?;
        parse_response(response)
    }
}

/// Map a raw response into the protocol error taxonomy: HTTP >= 400 is a
/// relay rejection, an unreadable body is a transport failure, and a
/// body that is not the expected JSON shape is a decode failure.
fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(Error::Protocol {
            status: status.as_u16(),
        });
    }
    let body = response.text()?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::DirectDialer;

    fn unreachable_client(identity: Identity) -> Client {
        // Base URL never dialed by these tests; they fail before the wire.
        Client::new("http://127.0.0.1:1", identity, &DirectDialer::default()).unwrap()
    }

    fn full_identity() -> Identity {
        Identity {
            username: "user@example.com".to_string(),
            password: "password".to_string(),
            device_name: "desktop".to_string(),
            device_uuid: "0f3c8e1c-aaaa-bbbb-cccc-000000000000".to_string(),
        }
    }

    #[test]
    fn test_login_requires_credentials() {
        let mut client = unreachable_client(Identity {
            device_uuid: "uuid".to_string(),
            ..Identity::default()
        });
        assert!(matches!(
            client.login(),
            Err(Error::MissingCredential("username and password"))
        ));
    }

    #[test]
    fn test_login_rejects_bad_device_name() {
        let mut client = unreachable_client(Identity {
            device_name: "has spaces".to_string(),
            ..full_identity()
        });
        assert!(matches!(client.login(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_register_requires_login() {
        let mut client = unreachable_client(full_identity());
        assert!(matches!(
            client.register_device(ReplacePolicy::Keep),
            Err(Error::NotAuthenticated)
        ));
    }

    #[test]
    fn test_fetch_and_acknowledge_require_registration() {
        let mut client = unreachable_client(full_identity());
        assert!(matches!(
            client.fetch_messages(),
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            client.acknowledge_up_to(10),
            Err(Error::NotAuthenticated)
        ));
    }

    #[test]
    fn test_push_requires_credentials_before_network() {
        let mut client = unreachable_client(Identity::default());
        let message = PushMessage {
            message: "hello".to_string(),
            ..PushMessage::default()
        };
        assert!(matches!(
            client.push_message(&message, false),
            Err(Error::MissingCredential("application token"))
        ));
    }

    #[test]
    fn test_push_validates_fields_before_network() {
        let mut client = unreachable_client(Identity::default())
            .with_push_credentials("a".repeat(30), "u".repeat(30));
        let message = PushMessage {
            message: String::new(),
            ..PushMessage::default()
        };
        assert!(matches!(
            client.push_message(&message, false),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_encrypted_push_requires_key() {
        let mut client = unreachable_client(Identity::default())
            .with_push_credentials("a".repeat(30), "u".repeat(30));
        let message = PushMessage {
            message: "hello".to_string(),
            ..PushMessage::default()
        };
        assert!(matches!(
            client.push_message(&message, true),
            Err(Error::MissingCredential("envelope key"))
        ));
    }

    #[test]
    fn test_receipt_validated_before_network() {
        let client =
            unreachable_client(Identity::default()).with_push_credentials("a".repeat(30), "u".repeat(30));
        assert!(matches!(
            client.lookup_receipt("too-short"),
            Err(Error::Validation(_))
        ));
    }
}
