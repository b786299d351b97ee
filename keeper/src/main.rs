//! Folio Portfolio Keeper
//!
//! Off-process service that polls the portfolio engine for ready scheduled
//! actions (timers, stop-losses, take-profits, drift rebalances) and
//! executes them.

mod action_queue;
mod config;
mod keeper;
mod oracle_feed;
mod submit;

use anyhow::Result;
use config::{parse_address, Config};
use folio::{Engine, EngineParams};
use keeper::Keeper;
use oracle_feed::FileOracle;
use std::sync::{Arc, Mutex};
use submit::DryRunSubmitter;

/// Engine admin identity used to register the configured feeds.
const ADMIN: folio::Address = [0x0A; 32];

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Folio Portfolio Keeper");

    let config = Config::load().unwrap_or_else(|_| {
        log::warn!("Failed to load config, using local defaults");
        Config::default_local()
    });

    log::info!(
        "Price file: {} (staleness bound {}s)",
        config.price_file,
        config.max_staleness_secs
    );

    let engine = Arc::new(Mutex::new(build_engine(&config)?));
    let price_path = shellexpand::tilde(&config.price_file).into_owned();
    let oracle = FileOracle::new(price_path);
    let submitter = Arc::new(DryRunSubmitter::new());

    let keeper = Keeper::new(engine, oracle, submitter, &config);

    tokio::select! {
        _ = keeper.run() => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("interrupt received, shutting down");
            keeper.stop();
        }
    }

    Ok(())
}

fn build_engine(config: &Config) -> Result<Engine> {
    let params: EngineParams = config.engine_params();
    let mut engine = Engine::new(ADMIN, params);
    for t in &config.tokens {
        let token = parse_address(&t.token)?;
        let feed = parse_address(&t.feed)?;
        engine
            .set_price_feed(ADMIN, token, feed, t.decimals)
            .map_err(|e| anyhow::anyhow!("failed to register feed for {}: {e}", t.token))?;
        log::info!("registered feed for token {} ({} decimals)", t.token, t.decimals);
    }
    Ok(engine)
}
