//! Run configuration.
//!
//! Parsed from a JSON file before any service starts; a file that does not
//! parse or validate aborts the run. The core only ever sees the validated
//! values.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::auction::Pricing;
use crate::service::operator::TerminationPolicy;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("floor price {floor} above starting price {start}")]
    FloorAboveStart { start: u64, floor: u64 },
    #[error("floor price must be nonzero")]
    ZeroFloor,
    #[error("price decrement must be nonzero")]
    ZeroDecrement,
    #[error("no buyers configured")]
    NoBuyers,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_mode")]
    pub mode: TerminationPolicy,
    #[serde(default)]
    pub quality_lots: bool,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "BuyerCounts::default_population")]
    pub buyers: BuyerCounts,
    #[serde(default)]
    pub coalitions: bool,
    /// Seed for every random draw of the run; a fresh one is taken from the
    /// OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

#[derive(Copy, Clone, Debug, Default, Deserialize)]
pub struct BuyerCounts {
    #[serde(default)]
    pub aggressive: u32,
    #[serde(default)]
    pub typical: u32,
    #[serde(default)]
    pub frugal: u32,
}

impl BuyerCounts {
    pub fn total(&self) -> u32 {
        self.aggressive + self.typical + self.frugal
    }

    fn default_population() -> Self {
        Self {
            aggressive: 1,
            typical: 2,
            frugal: 1,
        }
    }
}

fn default_mode() -> TerminationPolicy {
    TerminationPolicy::Unbounded {
        stock: 30,
        max_unsold_streak: 3,
    }
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            quality_lots: false,
            pricing: Pricing::default(),
            tick_interval_ms: default_tick_interval_ms(),
            buyers: BuyerCounts::default_population(),
            coalitions: false,
            seed: None,
            report_dir: default_report_dir(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pricing.floor > self.pricing.start {
            return Err(ConfigError::FloorAboveStart {
                start: self.pricing.start,
                floor: self.pricing.floor,
            });
        }
        if self.pricing.floor == 0 {
            return Err(ConfigError::ZeroFloor);
        }
        if self.pricing.decrement == 0 {
            return Err(ConfigError::ZeroDecrement);
        }
        if self.buyers.total() == 0 {
            return Err(ConfigError::NoBuyers);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
