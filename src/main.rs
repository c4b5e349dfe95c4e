mod browser;
mod compose;
mod config;
mod detector;
mod document;
mod error;
mod matcher;
mod notify;
mod registry;
mod store;
mod watcher;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::browser::HttpBrowser;
use crate::config::Settings;
use crate::detector::ChangeDetector;
use crate::document::{DocumentSource, PdfDocuments};
use crate::notify::TelegramNotifier;
use crate::store::{FileStateStore, StateStore};
use crate::watcher::{CycleOutcome, Target, Watcher};

#[derive(Parser)]
#[command(
    name = "pickup_watch",
    about = "Watch the embassy pickup list and report tracked application IDs"
)]
struct Cli {
    /// Settings file (default: ./pickup_watch.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the page until interrupted (default)
    Watch,
    /// Run a single poll cycle and exit
    Once,
    /// Download a document, match IDs, and print the message without sending
    Scan {
        /// Document URL
        url: String,
        /// Marker to put in the message header
        #[arg(long, default_value = "manual scan")]
        marker: String,
    },
    /// Show the last recorded marker
    Status,
}

type LiveWatcher = Watcher<HttpBrowser, PdfDocuments, TelegramNotifier, FileStateStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => {
            let mut watcher = build_watcher(&settings)?;
            let shutdown = shutdown_signal();
            watcher
                .watch(shutdown)
                .await
                .context("Could not open the monitored page")?;
            info!("Stopped after {}", format_duration(t0.elapsed()));
        }
        Commands::Once => {
            let mut watcher = build_watcher(&settings)?;
            let started = watcher.start().await;
            let outcome = match &started {
                Ok(()) => Some(watcher.run_cycle().await),
                Err(_) => None,
            };
            watcher.close().await;
            started.context("Could not open the monitored page")?;

            match outcome {
                Some(Ok(CycleOutcome::Unchanged { marker })) => {
                    println!("Unchanged: {}", marker);
                }
                Some(Ok(CycleOutcome::Notified {
                    marker,
                    result,
                    delivery,
                })) => {
                    println!(
                        "New marker {} ({} found, {} missing, delivery: {:?})",
                        marker,
                        result.found.len(),
                        result.missing.len(),
                        delivery
                    );
                }
                Some(Err(fault)) => return Err(fault).context("Cycle failed"),
                None => {}
            }
        }
        Commands::Scan { url, marker } => {
            let registry = settings.registry()?;
            let docs = PdfDocuments::new(settings.document_timeout(), &settings.user_agent)?;
            let text = docs.extract_text(&url).await?;
            if text.is_empty() {
                warn!(url, "Document has no extractable text");
            }
            let result = matcher::match_ids(&text, &registry);
            println!(
                "{}",
                compose::compose(&marker, &settings.page_url, &result, &registry)
            );
        }
        Commands::Status => {
            let store = FileStateStore::new(&settings.state_path);
            match store.load()? {
                Some(marker) => println!("Last marker: {} ({})", marker, store.path().display()),
                None => println!("No marker recorded yet ({})", store.path().display()),
            }
        }
    }

    Ok(())
}

fn build_watcher(settings: &Settings) -> anyhow::Result<LiveWatcher> {
    let registry = settings.registry()?;
    let browser = HttpBrowser::new(settings.page_timeout(), &settings.user_agent)?;
    let documents = PdfDocuments::new(settings.document_timeout(), &settings.user_agent)?;
    let notifier = TelegramNotifier::new(
        &settings.telegram.api_base,
        settings.telegram.token.clone(),
        settings.telegram.chat_id.clone(),
        settings.delivery_timeout(),
    )?;
    if !notifier.is_configured() {
        warn!("TG_TOKEN or TG_CHAT_ID not set; changes will only be logged");
    }

    let detector = ChangeDetector::open(FileStateStore::new(&settings.state_path))
        .context("Failed to read last-seen marker")?;

    Ok(Watcher::new(
        browser,
        documents,
        notifier,
        detector,
        registry,
        Target::from(settings),
    )
    .with_interval(settings.poll_interval())
    .with_parse_mode(settings.telegram.parse_mode))
}

/// Flips to `true` on Ctrl-C. The loop checks it between cycles.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received; stopping after the current cycle");
                let _ = tx.send(true);
            }
            Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
        }
    });
    rx
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
