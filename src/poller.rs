//! Per-account polling lifecycle.
//!
//! One call to [`run_account`] owns one device for the process lifetime:
//! login, register-if-unregistered, then poll forever. Login and
//! registration failures are fatal (without an identity there is nothing
//! to retry toward) and end that account's loop by returning the error.
//! Once polling, every failure is logged and the loop simply waits for
//! its next tick; the poll interval is the only backoff.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::ConfigStore;
use crate::dialer::{Dialer, DirectDialer, SocksDialer};
use crate::notify::{Notification, Notifier, UrgencyMap};
use crate::relay::{Client, Identity, ReplacePolicy};

/// Everything a loop needs besides its account slot.
pub struct PollerContext {
    /// Relay API base url.
    pub base_url: String,
    /// Priority-to-urgency mapping handed to the presentation layer.
    pub urgency: UrgencyMap,
    /// Presentation collaborator each non-empty batch is handed to.
    pub notifier: Arc<dyn Notifier>,
}

/// Run one account's loop. Only returns on a fatal setup error; other
/// accounts' loops are unaffected either way.
pub fn run_account(ctx: &PollerContext, store: &Arc<ConfigStore>, index: usize) -> Result<()> {
    let config = store.snapshot();
    let account = config
        .accounts
        .get(index)
        .with_context(|| format!("no account at index {index}"))?
        .clone();
    let interval = Duration::from_secs(config.globals.check_seconds);

    let dialer: Box<dyn Dialer> = match account.proxy.as_deref().and_then(|p| config.proxy_named(p))
    {
        Some(proxy) => {
            let mut socks = SocksDialer::new(proxy.address.clone(), DirectDialer::default())
                .with_connect_timeout(proxy.connect_timeout());
            if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
                socks = socks.with_auth(user.clone(), pass.clone());
            }
            Box::new(socks)
        }
        None => Box::new(DirectDialer::default()),
    };

    let identity = Identity {
        username: account.username.clone(),
        password: account.password.clone(),
        device_name: config.effective_device_name(),
        device_uuid: account.device_uuid.clone(),
    };
    let mut client = Client::new(ctx.base_url.clone(), identity, dialer.as_ref())?;
    if let Some(key) = &account.key {
        client = client.with_envelope_key(key);
    }

    client
        .login()
        .with_context(|| format!("login failed for {}", account.username))?;

    if !account.registered {
        client
            .register_device(ReplacePolicy::Replace)
            .with_context(|| format!("registration failed for {}", account.username))?;
        // A failed flush is not worth killing a registered device over.
        if let Err(e) = store.update_account(index, |entry| entry.registered = true) {
            log::warn!("could not persist registered flag: {e}");
        }
    }

    log::info!(
        "polling for {} every {}s",
        account.username,
        interval.as_secs()
    );

    loop {
        thread::sleep(interval);

        let fetched = match client.fetch_messages() {
            Ok(count) => count,
            Err(e) => {
                log::warn!("fetch failed for {}: {e}", account.username);
                continue;
            }
        };
        if fetched == 0 {
            continue;
        }
        log::info!("fetched {fetched} messages for {}", account.username);

        let batch = client.take_messages();
        let latest = batch.iter().map(|message| message.id).max();

        for message in &batch {
            let notification = Notification::from_message(message, &ctx.urgency);
            if let Err(e) = ctx.notifier.notify(&notification) {
                log::warn!("notifier failed for message {}: {e}", message.id);
            }
        }

        // Acknowledge only after the batch has been handed off; a failure
        // here means the relay redelivers on the next poll.
        if let Some(id) = latest {
            if let Err(e) = client.acknowledge_up_to(id) {
                log::warn!("acknowledge failed for {}: {e}", account.username);
            }
        }
    }
}
