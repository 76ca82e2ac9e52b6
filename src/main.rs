mod config;
mod dashboard;
mod error;
mod history;
mod models;
mod normalize;
mod poller;
mod store;

use log::{error, info};
use std::sync::Arc;

use config::DashboardConfig;
use dashboard::run_dashboard;
use history::HistoryClient;
use normalize::SampleNormalizer;
use poller::Poller;
use store::SeriesStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match DashboardConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let http = reqwest::Client::builder().build()?;
    let store = Arc::new(SeriesStore::new());
    let poller = Poller::new(
        HistoryClient::new(http, config.endpoint.clone()),
        SampleNormalizer::new(config.display_zone),
        store.clone(),
        config.merge_policy,
        config.last_n,
    );

    let dashboard = tokio::spawn(run_dashboard(store.subscribe()));

    info!("Starting sensor dashboard");

    // Poll until Ctrl+C
    tokio::select! {
        _ = poller.run(config.poll_interval) => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Program terminated by user. Exiting gracefully."),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    }

    dashboard.abort();
    Ok(())
}
