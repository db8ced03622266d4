use anyhow::{Context, Result};
use clap::Parser;
use client_core::{ClientConfig, Disposer, RealtimeClient, SessionToken};
use shared::{
    domain::{ChannelId, GuildId},
    protocol::{EventKind, PresencePayload},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

/// Connects to the realtime gateway and logs every event it delivers.
#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured API base URL.
    #[arg(long)]
    api_url: Option<String>,
    /// Bearer token; defaults to REALTIME_TOKEN.
    #[arg(long)]
    token: Option<String>,
    #[arg(long = "channel")]
    channels: Vec<String>,
    #[arg(long = "guild")]
    guilds: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    if let Some(token) = cli.token {
        settings.token = Some(token);
    }
    let token = settings
        .token
        .context("no bearer token; pass --token or set REALTIME_TOKEN")?;
    let config = ClientConfig::new(&settings.api_base_url)?;
    info!(api_base_url = %config.api_base_url, "probe: starting");

    let client = RealtimeClient::new(config, SessionToken::new(token));

    let mut listeners: Vec<Disposer> = EventKind::ALL
        .into_iter()
        .map(|kind| {
            client.dispatcher().register(kind, move |payload| {
                info!(event = kind.as_str(), %payload, "probe: event");
            })
        })
        .collect();
    listeners.push(client.dispatcher().register_typed(
        EventKind::PresenceUpdate,
        |presence: PresencePayload| {
            info!(
                user_id = %presence.user_id,
                status = ?presence.status,
                game = presence.game_name.as_deref().unwrap_or_default(),
                "probe: presence"
            );
        },
    ));

    for channel in cli.channels {
        client.connection().subscribe_channel(ChannelId::new(channel));
    }
    for guild in cli.guilds {
        client.connection().subscribe_guild(GuildId::new(guild));
    }
    client.connect()?;

    let mut state = client.connection().watch_state();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                info!(state = ?current, "probe: connection state");
            }
        }
    }

    for listener in &listeners {
        listener.dispose();
    }
    client.shutdown().await;
    Ok(())
}
