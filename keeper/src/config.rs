//! Keeper configuration.
//!
//! Loaded from a TOML file (`FOLIO_KEEPER_CONFIG` env var, falling back to
//! `keeper.toml` in the working directory).

use anyhow::{Context, Result};
use folio::Address;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seconds between keeper cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// JSON price file read on every oracle call.
    pub price_file: String,
    #[serde(default = "default_staleness")]
    pub max_staleness_secs: u64,
    /// Cap on ready actions surfaced (and executed) per cycle.
    #[serde(default = "default_batch")]
    pub max_surfaced_per_cycle: usize,
    /// When false the keeper only surfaces ready actions; execution is
    /// left to an external caller.
    #[serde(default)]
    pub execute: bool,
    #[serde(default = "default_fee")]
    pub swap_fee_bps: u16,
    /// Optional bound on rebalance execution price vs oracle, in bps.
    #[serde(default)]
    pub max_execution_deviation_bps: Option<u16>,
    /// Tokens to register at startup.
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Token address, 64 hex chars. All zeros means the native asset.
    pub token: String,
    /// Feed address, 64 hex chars (key into the price file).
    pub feed: String,
    pub decimals: u8,
}

fn default_poll_interval() -> u64 {
    120
}

fn default_staleness() -> u64 {
    3600
}

fn default_batch() -> usize {
    8
}

fn default_fee() -> u16 {
    30
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = std::env::var("FOLIO_KEEPER_CONFIG").unwrap_or_else(|_| "keeper.toml".into());
        let expanded = shellexpand::tilde(&path);
        let raw = std::fs::read_to_string(expanded.as_ref())
            .context(format!("Failed to read config from {path}"))?;
        let config: Self = toml::from_str(&raw).context("Failed to parse keeper config")?;
        anyhow::ensure!(
            config.swap_fee_bps < 10_000,
            "swap_fee_bps must be below 10000, got {}",
            config.swap_fee_bps
        );
        Ok(config)
    }

    /// Fallback used when no config file is present.
    pub fn default_local() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            price_file: "prices.json".into(),
            max_staleness_secs: default_staleness(),
            max_surfaced_per_cycle: default_batch(),
            execute: false,
            swap_fee_bps: default_fee(),
            max_execution_deviation_bps: None,
            tokens: Vec::new(),
        }
    }

    pub fn engine_params(&self) -> folio::EngineParams {
        folio::EngineParams {
            swap_fee_bps: self.swap_fee_bps,
            max_price_staleness_secs: self.max_staleness_secs,
            max_execution_deviation_bps: self.max_execution_deviation_bps,
        }
    }
}

/// Parse a 32-byte address from 64 hex chars.
pub fn parse_address(s: &str) -> Result<Address> {
    let s = s.trim().trim_start_matches("0x");
    anyhow::ensure!(s.len() == 64, "address must be 64 hex chars, got {}", s.len());
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16)
            .context("invalid hex in address")?;
    }
    Ok(out)
}

/// Hex-encode an address for log output and price-file keys.
pub fn format_address(a: &Address) -> String {
    let mut s = String::with_capacity(64);
    for b in a {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let cfg: Config = toml::from_str(
            r#"
            price_file = "~/prices.json"

            [[tokens]]
            token = "0202020202020202020202020202020202020202020202020202020202020202"
            feed = "f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2f2"
            decimals = 6
            "#,
        )
        .unwrap();
        assert_eq!(cfg.poll_interval_secs, 120);
        assert_eq!(cfg.max_surfaced_per_cycle, 8);
        assert!(!cfg.execute);
        assert_eq!(cfg.tokens.len(), 1);
        assert_eq!(cfg.tokens[0].decimals, 6);
    }

    #[test]
    fn address_roundtrip() {
        let a = parse_address(&"ab".repeat(32)).unwrap();
        assert_eq!(a, [0xab; 32]);
        assert_eq!(format_address(&a), "ab".repeat(32));
        assert!(parse_address("1234").is_err());
    }
}
