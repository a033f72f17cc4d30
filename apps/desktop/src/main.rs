use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::Parser;
use client_core::{
    gateway::connect_gateway, http::HttpChatApi, load_settings, ChannelSession, FetchState,
    SyncClient, TimelineSnapshot,
};
use shared::domain::ChannelId;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Headless probe: open one channel, page back through its history and print
/// the timeline while gateway events keep it current.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    server_url: String,
    #[arg(long)]
    gateway_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    channel_id: u64,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Older pages to load after the first one.
    #[arg(long, default_value_t = 1)]
    pages: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = load_settings(args.config.as_deref())?;
    let api = Arc::new(HttpChatApi::new(&args.server_url, args.token)?);
    let client = SyncClient::new(api, settings);

    if let Some(gateway_url) = &args.gateway_url {
        let feed = connect_gateway(gateway_url).await?;
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client.run(feed).await;
        });
    }

    let session = client.switch_channel(ChannelId(args.channel_id)).await;
    let mut snapshot = settled(&session).await?;

    for _ in 0..args.pages {
        if snapshot.reached_top {
            break;
        }
        let _ = session.fetch_older().await.await?;
        snapshot = settled(&session).await?;
    }

    if let FetchState::Failed { error, .. } = &snapshot.fetch {
        if error.is_user_visible() {
            warn!(%error, "history is incomplete");
        }
    }
    print_timeline(&snapshot);

    match session.ack_latest().await {
        Ok(true) => info!("marked channel as read"),
        Ok(false) => {}
        Err(err) if err.is_user_visible() => warn!(error = %err, "read ack failed"),
        Err(_) => {}
    }

    if args.gateway_url.is_some() {
        info!("following channel, press ctrl-c to exit");
        let mut updates = session.subscribe();
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let latest = Arc::clone(&updates.borrow_and_update());
                    print_timeline(&latest);
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    }

    client.close_channel().await;
    Ok(())
}

/// Wait until no history fetch is running.
async fn settled(session: &ChannelSession) -> Result<Arc<TimelineSnapshot>> {
    let mut updates = session.subscribe();
    loop {
        let current = Arc::clone(&updates.borrow_and_update());
        if !current.fetch.is_fetching() {
            return Ok(current);
        }
        if updates.changed().await.is_err() {
            bail!("channel session dropped while fetching history");
        }
    }
}

fn print_timeline(snapshot: &TimelineSnapshot) {
    println!(
        "channel {} rev {} ({} messages{})",
        snapshot.channel_id,
        snapshot.revision,
        snapshot.messages.len(),
        if snapshot.reached_top { ", start of history" } else { "" }
    );
    for (message, row) in snapshot.messages.iter().zip(snapshot.rows()).rev() {
        if row.day_divider {
            println!("---- {} ----", message.timestamp.format("%Y-%m-%d"));
        }
        if row.compact {
            println!("          {}", message.content);
        } else {
            println!(
                "[{}] {}: {}",
                message.timestamp.format("%H:%M"),
                message.author.display_name(),
                message.content
            );
        }
    }
}
