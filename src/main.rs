use anyhow::{Context, Result};
use clap::Parser;
use feedcast::{Config, Credentials, PublishOutcome, Publisher};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use feedcast::bsky::XrpcClient;

/// Get the default config file path (~/.config/feedcast/config.toml)
fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("feedcast")
            .join("config.toml"),
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "feedcast",
    about = "Announce the newest feed entry on Bluesky, once",
    after_help = "Credentials are read from BLUESKY_IDENTIFIER and BLUESKY_APP_PASSWORD.\n\
                  Only one run should execute at a time; overlapping runs may double-post."
)]
struct Args {
    /// Feed file to announce from (overrides `feed_path` in the config file)
    #[arg(long, value_name = "FILE")]
    feed: Option<PathBuf>,

    /// Config file (default: ~/.config/feedcast/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Service URL (overrides `service` in the config file)
    #[arg(long, value_name = "URL")]
    service: Option<String>,

    /// Authenticate and check history, but print the post instead of submitting it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match args.config.clone().or_else(default_config_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(service) = args.service {
        config.service = service;
    }

    let feed_path = args
        .feed
        .or_else(|| config.feed_path.clone())
        .context("No feed file given: pass --feed or set feed_path in the config file")?;

    let service = config.service_url().context("Invalid service URL")?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("feedcast/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let publisher = Publisher::new(XrpcClient::new(http, service), Credentials::from_env())
        .with_scan_limits(config.scan_limits())
        .with_fallback_text(config.fallback_text())
        .with_dry_run(args.dry_run);

    match publisher.publish_if_new(&feed_path).await {
        Ok(PublishOutcome::Published(record)) => {
            println!("{}", record.uri);
        }
        Ok(PublishOutcome::AlreadyPosted { link, .. }) => {
            println!("Already posted: {}", link);
        }
        Ok(PublishOutcome::DryRun(record)) => {
            let json = serde_json::to_string_pretty(&record).context("Failed to render post")?;
            println!("{}", json);
        }
        Err(e) => {
            tracing::error!(error = %e, stage = ?e.stage(), "Run aborted");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
