//! File-backed oracle source.
//!
//! The collaborator-provided oracle shim: a JSON map of hex feed address to
//! `{price, updated_at, decimals}`. The file is re-read on every call so
//! the engine's no-caching contract holds end to end; a read or parse
//! failure surfaces as `FeedUnavailable`, never as a substituted price.

use crate::config::format_address;
use folio::{Address, OracleError, OracleSource};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
struct FeedEntry {
    /// Price in the feed's own fixed-point (see `decimals`).
    price: u64,
    /// Unix seconds of the observation.
    updated_at: u64,
    #[serde(default = "default_decimals")]
    decimals: u8,
}

fn default_decimals() -> u8 {
    8
}

pub struct FileOracle {
    path: PathBuf,
}

impl FileOracle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_entry(&self, feed: &Address) -> Result<FeedEntry, OracleError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            log::debug!("price file {} unreadable: {e}", self.path.display());
            OracleError::FeedUnavailable
        })?;
        let map: BTreeMap<String, FeedEntry> = serde_json::from_str(&raw).map_err(|e| {
            log::debug!("price file {} unparsable: {e}", self.path.display());
            OracleError::FeedUnavailable
        })?;
        map.get(&format_address(feed))
            .cloned()
            .ok_or(OracleError::FeedUnavailable)
    }
}

impl OracleSource for FileOracle {
    fn latest_round_data(&self, feed: &Address) -> Result<(u128, u64), OracleError> {
        let entry = self.read_entry(feed)?;
        Ok((entry.price as u128, entry.updated_at))
    }

    fn decimals(&self, feed: &Address) -> Result<u8, OracleError> {
        Ok(self.read_entry(feed)?.decimals)
    }
}
