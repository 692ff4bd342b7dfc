//! Demo CLI: submit a single scan, watch its progress events stream by,
//! and print the final aggregate stats snapshot. A thin operational
//! wrapper around [`webp_scan_core::Application`] — the library crate
//! does the actual work.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use webp_scan_core::broadcaster::BroadcastEvent;
use webp_scan_core::crawler::ReqwestPageFetcher;
use webp_scan_core::image_analyzer::ReqwestImageProbe;
use webp_scan_core::store::{InMemoryStore, SqliteStore};
use webp_scan_core::{AppConfigBuilder, Application};

#[derive(Parser, Debug)]
#[command(name = "webp-scan-cli", about = "Submit and watch a non-WebP image audit")]
struct Cli {
    /// Site to crawl.
    target_url: String,

    /// Optional SQLite database path; defaults to an in-memory store.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Also build a WebP-conversion manifest on completion.
    #[arg(long)]
    convert: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(AppConfigBuilder::new().build());

    let fetcher = Arc::new(ReqwestPageFetcher::new(config.user_agent(), config.page_fetch_timeout())?);
    let probe = Arc::new(ReqwestImageProbe::new(config.user_agent(), config.page_fetch_timeout())?);

    match cli.db {
        Some(path) => {
            let store = Arc::new(SqliteStore::open(&path).await?);
            run(config, store, fetcher, probe, &cli.target_url, cli.convert).await
        }
        None => {
            let store = Arc::new(InMemoryStore::new());
            run(config, store, fetcher, probe, &cli.target_url, cli.convert).await
        }
    }
}

async fn run<S, F, P>(
    config: Arc<webp_scan_core::AppConfig>,
    store: Arc<S>,
    fetcher: Arc<F>,
    probe: Arc<P>,
    target_url: &str,
    convert_to_webp: bool,
) -> Result<()>
where
    S: webp_scan_core::store::ScanRepository
        + webp_scan_core::store::ImageRepository
        + webp_scan_core::store::CheckpointRepository
        + webp_scan_core::store::ZipRepository
        + webp_scan_core::store::StatsRepository
        + 'static,
    F: webp_scan_core::crawler::PageFetcher + 'static,
    P: webp_scan_core::image_analyzer::ImageProbe + 'static,
{
    let app = Arc::new(Application::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        fetcher,
        probe,
    ));
    app.start_background_tasks().await?;

    let peer = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1));
    let outcome = app
        .submit_scan(target_url, None, peer, None, convert_to_webp)
        .await?
        .map_err(|rejection| anyhow::anyhow!("submission rejected: {rejection:?}"))?;

    println!("submitted scan {} (queue position {:?})", outcome.job.id, outcome.queue_position);

    let mut events = app.broadcaster().subscribe_to_scan(outcome.job.id);
    while let Some(event) = events.recv().await {
        let done = matches!(event, BroadcastEvent::ScanComplete(_) | BroadcastEvent::ScanFailed(_));
        println!("{}", serde_json::to_string(&event)?);
        if done {
            break;
        }
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = app.stats().snapshot().await?;
    println!("aggregate stats: {}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
