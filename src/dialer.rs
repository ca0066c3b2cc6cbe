//! Transport construction seam for the protocol client.
//!
//! Every relay call goes through an HTTP client produced by a [`Dialer`].
//! The client never branches on transport choice itself; callers that
//! need a tunnel hand in a different dialer at construction. This is the
//! only transport extension point in the system.

use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, ClientBuilder};

use crate::constants;
use crate::error::Error;

/// Builds the blocking HTTP client a [`crate::relay::Client`] will use
/// for every request.
pub trait Dialer {
    fn dial(&self) -> Result<HttpClient, Error>;
}

/// Direct dial with a configurable request timeout. The default transport.
#[derive(Debug, Clone)]
pub struct DirectDialer {
    timeout: Duration,
}

impl DirectDialer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The timeout-bearing builder other dialers compose on top of.
    ///
    /// Ambient proxy env vars are ignored: transport choice belongs to
    /// the dialer a caller picked, nothing else.
    pub(crate) fn builder(&self) -> ClientBuilder {
        HttpClient::builder().timeout(self.timeout).no_proxy()
    }
}

impl Default for DirectDialer {
    fn default() -> Self {
        Self::new(constants::HTTP_TIMEOUT)
    }
}

impl Dialer for DirectDialer {
    fn dial(&self) -> Result<HttpClient, Error> {
        self.builder().build().map_err(Error::Transport)
    }
}

/// SOCKS5 proxy dial with optional username/password auth and its own
/// connect timeout.
///
/// The proxy is composed in front of the base [`DirectDialer`]: the
/// base's request timeout still governs the round trip, while the
/// connect timeout only bounds reaching the proxy.
#[derive(Debug, Clone)]
pub struct SocksDialer {
    address: String,
    username: Option<String>,
    password: Option<String>,
    connect_timeout: Duration,
    base: DirectDialer,
}

impl SocksDialer {
    pub fn new(address: impl Into<String>, base: DirectDialer) -> Self {
        Self {
            address: address.into(),
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(constants::DEFAULT_PROXY_TIMEOUT_SECONDS),
            base,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Dialer for SocksDialer {
    fn dial(&self) -> Result<HttpClient, Error> {
        let mut proxy = reqwest::Proxy::all(format!("socks5://{}", self.address))
            .map_err(Error::Transport)?;
        if let (Some(user), Some(pass)) = (self.username.as_deref(), self.password.as_deref()) {
            proxy = proxy.basic_auth(user, pass);
        }

        self.base
            .builder()
            .connect_timeout(self.connect_timeout)
            .proxy(proxy)
            .build()
            .map_err(Error::Transport)
    }
}
