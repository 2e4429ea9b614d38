//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed sections.
//! Every field carries a serde default so a partial (or missing) file
//! still yields a usable configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::types::SibylError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub edge: EdgeSection,
    #[serde(default)]
    pub kelly: KellySection,
    #[serde(default)]
    pub risk: RiskSection,
    #[serde(default)]
    pub calibration: CalibrationSection,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub initial_bankroll: f64,
    /// Bankroll at or below which the agent is declared dead.
    pub survival_threshold: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "SIBYL-001".to_string(),
            initial_bankroll: 100.0,
            survival_threshold: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EdgeSection {
    /// Baseline mispricing threshold for categories without an override.
    pub mispricing_threshold: f64,
    /// Minimum absolute edge to consider at all.
    pub noise_floor: f64,
    /// Confidence below which the threshold is stretched.
    pub low_confidence_cutoff: f64,
    /// Threshold multiplier applied to low-confidence estimates.
    pub low_confidence_multiplier: f64,
    /// Per-category overrides, keyed by category name.
    pub category_thresholds: HashMap<String, f64>,
}

impl Default for EdgeSection {
    fn default() -> Self {
        Self {
            mispricing_threshold: 0.08,
            noise_floor: 0.03,
            low_confidence_cutoff: 0.5,
            low_confidence_multiplier: 2.0,
            category_thresholds: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KellySection {
    pub kelly_multiplier: f64,
    pub max_bet_pct: f64,
    pub min_bet: f64,
    pub commission_rate: f64,
}

impl Default for KellySection {
    fn default() -> Self {
        Self {
            kelly_multiplier: 0.25,
            max_bet_pct: 0.06,
            min_bet: 1.0,
            commission_rate: 0.02,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RiskSection {
    pub max_exposure_pct: f64,
    pub category_exposure_pct: f64,
    pub min_liquidity: f64,
    pub max_bets_per_cycle: usize,
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            max_exposure_pct: 0.60,
            category_exposure_pct: 0.30,
            min_liquidity: 500.0,
            max_bets_per_cycle: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationSection {
    pub bin_count: usize,
    /// Mean absolute predicted-vs-observed gap below which the model
    /// counts as well calibrated.
    pub tolerance: f64,
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            bin_count: 10,
            tolerance: 0.05,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// compiled-in defaults; a malformed file is an error.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| SibylError::Config(format!("malformed config file {path}: {e}")))?;
        Ok(config)
    }
}
