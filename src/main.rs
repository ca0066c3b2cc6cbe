//! Pushling daemon binary.
//!
//! `pushling run` polls every configured account and logs decoded
//! messages through the default notifier; `pushling push` sends a single
//! message and exits.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use pushling::{
    constants, Client, Config, ConfigStore, DirectDialer, Identity, LogNotifier, Notifier,
    PollerContext, PushMessage, UrgencyMap,
};

#[derive(Parser)]
#[command(name = "pushling", version, about = "Desktop client for the Pushover notification relay")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll every configured account for messages (the default).
    Run,
    /// Send one message through the relay and exit.
    Push(PushArgs),
}

#[derive(Args)]
struct PushArgs {
    /// Application token the message is sent under.
    #[arg(long)]
    app_token: String,
    /// User or group key to deliver to.
    #[arg(long)]
    user_key: String,
    /// Envelope passphrase; when set, the body is sent encrypted.
    #[arg(long)]
    key: Option<String>,
    /// Restrict delivery to one named device.
    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    message: String,
    #[arg(long, default_value_t = 0)]
    priority: i64,
    /// Seconds an emergency message keeps retrying.
    #[arg(long, default_value_t = 15)]
    expire: u32,
    /// Seconds between emergency retries.
    #[arg(long, default_value_t = 0)]
    retry: u32,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    url_title: Option<String>,
    #[arg(long)]
    sound: Option<String>,
    /// Callback url the relay invokes when an emergency message is
    /// acknowledged.
    #[arg(long)]
    callback: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(config_path),
        Command::Push(args) => run_push(&args),
    }
}

/// Launch one polling thread per account and keep the process alive for
/// as long as any of them runs. A thread that dies on a fatal
/// login/registration error takes only its own account down.
fn run_daemon(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)?;
    let store = Arc::new(ConfigStore::new(config_path, config));

    ensure_device_uuids(&store)?;

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let accounts = store.snapshot().accounts.len();
    if accounts == 0 {
        anyhow::bail!("no accounts configured");
    }

    let mut handles = Vec::with_capacity(accounts);
    for index in 0..accounts {
        let store = Arc::clone(&store);
        let notifier = Arc::clone(&notifier);
        let handle = thread::Builder::new()
            .name(format!("account-{index}"))
            .spawn(move || {
                let ctx = PollerContext {
                    base_url: constants::API_BASE_URL.to_string(),
                    urgency: UrgencyMap::default(),
                    notifier,
                };
                if let Err(e) = pushling::poller::run_account(&ctx, &store, index) {
                    log::error!("account {index} stopped: {e:#}");
                }
            })
            .context("failed to spawn account thread")?;
        handles.push(handle);
    }

    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

/// Generate and persist a UUID for every account that does not have one
/// yet. Runs before any loop starts so each loop only ever writes its
/// own account entry afterwards.
fn ensure_device_uuids(store: &Arc<ConfigStore>) -> Result<()> {
    for (index, account) in store.snapshot().accounts.iter().enumerate() {
        if !account.device_uuid.is_empty() {
            continue;
        }
        let uuid = uuid::Uuid::new_v4().to_string();
        log::info!("generated device uuid for {}", account.username);
        store.update_account(index, |entry| entry.device_uuid = uuid.clone())?;
    }
    Ok(())
}

fn run_push(args: &PushArgs) -> Result<()> {
    let mut client = Client::new(
        constants::API_BASE_URL,
        Identity::default(),
        &DirectDialer::default(),
    )?
    .with_push_credentials(args.app_token.clone(), args.user_key.clone());
    if let Some(key) = &args.key {
        client = client.with_envelope_key(key);
    }

    let message = PushMessage {
        device: args.device.clone(),
        title: args.title.clone(),
        message: args.message.clone(),
        priority: args.priority,
        expire: args.expire,
        retry: args.retry,
        url: args.url.clone(),
        url_title: args.url_title.clone(),
        timestamp: Some(chrono::Utc::now().timestamp()),
        sound: args.sound.clone(),
        callback: args.callback.clone(),
    };

    let response = client.push_message(&message, args.key.is_some())?;
    log::info!("message sent, request={}", response.request);
    if let Some(receipt) = response.receipt {
        log::info!("emergency receipt: {receipt}");
    }

    let accounting = client.accounting();
    log::info!(
        "app quota: {} of {} remaining, resets at {}",
        accounting.app_remaining.as_deref().unwrap_or("?"),
        accounting.app_limit.as_deref().unwrap_or("?"),
        accounting.app_reset.as_deref().unwrap_or("?")
    );
    Ok(())
}
