mod config;
mod engine;
mod error;
mod misc;
mod server;

use crate::config::AppConfig;
use crate::engine::AzureMlScorer;
use crate::server::{AppState, Server};
use anyhow::Result;
use data_ingestion::fetcher::YahooChartFetcher;
use data_ingestion::logger::init_logger;
use feature_processing::pipeline::FeaturePipeline;
use log::*;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logger();

    // Missing scoring endpoint or key stops the process here, not per request.
    let config = AppConfig::load()?;
    info!(
        "🚀Starting prediction server (lookback {}y, target alignment {:?})",
        config.server.lookback_years, config.server.target_alignment
    );

    let provider = YahooChartFetcher::new(config.provider.clone())?;
    let pipeline =
        FeaturePipeline::new(Arc::new(provider)).with_alignment(config.server.target_alignment);
    let scorer = AzureMlScorer::new(&config.scoring)?;
    let state = AppState::new(pipeline, Arc::new(scorer), config.server.lookback_years);
    let server = Server::init(config.server, state);

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, initiating graceful shutdown");
        }
        res = server.run() => {
            if let Err(e) = res {
                error!("HTTP server failed: {:?}", e);
                return Err(e);
            }
        }
    }

    info!("Server has been shut down!");
    Ok(())
}
