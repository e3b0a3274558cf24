//! BurpeeBootcamp host - drives the interop layer and the offline cache
//! from the command line.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bootcamp_core::gateway::{CacheStorage, GatewayResponse};
use bootcamp_core::{Config, HttpFetcher, Intercept, Interop, LocalStore, OfflineGateway, SoundBank};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the inbound and outbound port channels.
const CHANNEL_BUFFER_SIZE: usize = 32;

const USAGE: &str = "\
Usage: bootcamp <command>

Commands:
  init                 Print the startup message
  send <json>          Dispatch one application event
  listen               Read one JSON event per line from stdin
  install              Install and activate the offline cache
  fetch <path|url>     Route one request through the offline cache
  caches               List cache generations
  config [save]        Print (or save) the effective configuration";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::load().context("Failed to load configuration")?;

    match args.first().map(String::as_str) {
        Some("init") => print_init(&config).await,
        Some("send") => {
            let event = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("send requires a JSON event"))?;
            send_event(&config, event).await
        }
        Some("listen") => listen(&config).await,
        Some("install") => install(&config).await,
        Some("fetch") => {
            let target = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("fetch requires a path or URL"))?;
            fetch(&config, target).await
        }
        Some("caches") => list_caches(&config).await,
        Some("config") => show_config(&config, args.get(1).map(String::as_str)),
        _ => {
            eprintln!("{}", USAGE);
            Ok(())
        }
    }
}

async fn open_interop(config: &Config) -> Result<Interop> {
    let data_dir = config.data_dir()?;
    let store = LocalStore::open(&data_dir)
        .await
        .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;
    let sounds = SoundBank::new(config.assets_dir());
    Ok(Interop::new(store, sounds, &config.version))
}

fn open_gateway(config: &Config) -> Result<OfflineGateway<HttpFetcher>> {
    let storage = CacheStorage::new(config.cache_dir()?);
    Ok(OfflineGateway::new(
        config.origin_url()?,
        &config.version,
        HttpFetcher::new()?,
        storage,
    ))
}

async fn print_init(config: &Config) -> Result<()> {
    let interop = open_interop(config).await?;
    match interop.start().await {
        Some(message) => println!("{}", message.to_port_string()?),
        None => warn!("No startup message produced"),
    }
    interop.shutdown().await;
    Ok(())
}

async fn send_event(config: &Config, event: &str) -> Result<()> {
    let raw: serde_json::Value = serde_json::from_str(event).context("Event is not valid JSON")?;
    let interop = open_interop(config).await?;
    interop.receive(raw).await;
    interop.shutdown().await;
    Ok(())
}

/// Run a full session: startup message to stdout, events from stdin.
async fn listen(config: &Config) -> Result<()> {
    let interop = Arc::new(open_interop(config).await?);

    let (to_interop, inbound) = mpsc::channel::<serde_json::Value>(CHANNEL_BUFFER_SIZE);
    let (outbound, mut to_app) = mpsc::channel::<String>(CHANNEL_BUFFER_SIZE);

    let session = tokio::spawn(Arc::clone(&interop).run(inbound, outbound));
    let printer = tokio::spawn(async move {
        while let Some(message) = to_app.recv().await {
            println!("{}", message);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(raw) => {
                if to_interop.send(raw).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "Ignoring line that is not JSON"),
        }
    }
    drop(to_interop);

    session.await?;
    printer.await?;
    interop.shutdown().await;
    Ok(())
}

async fn install(config: &Config) -> Result<()> {
    let gateway = open_gateway(config)?;
    gateway
        .register()
        .await
        .with_context(|| format!("Failed to install {}", gateway.cache_name()))?;
    info!(cache = %gateway.cache_name(), "Offline cache ready");
    println!("{} active", gateway.cache_name());
    Ok(())
}

async fn fetch(config: &Config, target: &str) -> Result<()> {
    let gateway = open_gateway(config)?;
    if let Err(e) = gateway.register().await {
        warn!(error = %e, "Offline cache unavailable, requests pass through");
    }

    match gateway.handle(target).await? {
        Intercept::PassThrough => println!("{} passed through (not handled by the cache)", target),
        Intercept::Respond(response) => print_response(&response),
    }
    gateway.settle().await;
    Ok(())
}

fn print_response(response: &GatewayResponse) {
    println!(
        "{} {} {:?} {} bytes{}",
        response.status,
        response.url,
        response.source,
        response.body.len(),
        response
            .content_type
            .as_deref()
            .map(|ct| format!(" ({})", ct))
            .unwrap_or_default()
    );
}

async fn list_caches(config: &Config) -> Result<()> {
    let storage = CacheStorage::new(config.cache_dir()?);
    let current = bootcamp_core::gateway::cache_name(&config.version);
    for name in storage.keys().await? {
        let generation = match storage.open(&name).await {
            Ok(generation) => generation,
            Err(e) => {
                warn!(cache = %name, error = %e, "Skipping unreadable cache generation");
                continue;
            }
        };
        let entries = generation.len().await?;
        let sealed = generation.is_sealed().await;
        println!(
            "{}{} {} entries{}",
            if name == current { "* " } else { "  " },
            name,
            entries,
            if sealed { "" } else { " (incomplete)" }
        );
    }
    Ok(())
}

fn show_config(config: &Config, action: Option<&str>) -> Result<()> {
    if action == Some("save") {
        config.save().context("Failed to save configuration")?;
        eprintln!("Configuration saved");
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
