//! Mispricing detection.
//!
//! Compares externally supplied fair-value estimates to market prices
//! and identifies actionable edges exceeding category-specific
//! thresholds.

use tracing::{debug, warn};

use crate::config::EdgeSection;
use crate::types::{clamp_probability, Estimate, Market, MarketCategory, Side};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Mispricing thresholds per category. Markets must exceed these to be
/// considered actionable; more uncertain categories require larger
/// edges.
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub weather_threshold: f64,
    pub sports_threshold: f64,
    pub economics_threshold: f64,
    pub politics_threshold: f64,
    pub culture_threshold: f64,
    pub other_threshold: f64,
    /// Minimum absolute edge to consider (noise floor).
    pub noise_floor: f64,
    /// Estimates below this confidence face a stretched threshold.
    pub low_confidence_cutoff: f64,
    /// Factor applied to the threshold for low-confidence estimates.
    pub low_confidence_multiplier: f64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            weather_threshold: 0.06,
            sports_threshold: 0.08,
            economics_threshold: 0.10,
            politics_threshold: 0.12,
            culture_threshold: 0.10,
            other_threshold: 0.10,
            noise_floor: 0.03,
            low_confidence_cutoff: 0.5,
            low_confidence_multiplier: 2.0,
        }
    }
}

impl EdgeConfig {
    /// Build from the TOML section: the baseline threshold everywhere,
    /// then per-category string-keyed overrides. Unknown keys are
    /// warned about and skipped, never fatal.
    pub fn from_section(section: &EdgeSection) -> Self {
        let base = section.mispricing_threshold;
        let mut config = Self {
            weather_threshold: base,
            sports_threshold: base,
            economics_threshold: base,
            politics_threshold: base,
            culture_threshold: base,
            other_threshold: base,
            noise_floor: section.noise_floor,
            low_confidence_cutoff: section.low_confidence_cutoff,
            low_confidence_multiplier: section.low_confidence_multiplier,
        };

        for (key, value) in &section.category_thresholds {
            match key.parse::<MarketCategory>() {
                Ok(MarketCategory::Weather) => config.weather_threshold = *value,
                Ok(MarketCategory::Sports) => config.sports_threshold = *value,
                Ok(MarketCategory::Economics) => config.economics_threshold = *value,
                Ok(MarketCategory::Politics) => config.politics_threshold = *value,
                Ok(MarketCategory::Culture) => config.culture_threshold = *value,
                Ok(MarketCategory::Other) => config.other_threshold = *value,
                Err(_) => {
                    warn!(category = %key, "Unknown category in threshold overrides, ignoring")
                }
            }
        }

        config
    }

    /// The threshold for a given category. Total over the closed enum.
    pub fn threshold_for(&self, category: MarketCategory) -> f64 {
        match category {
            MarketCategory::Weather => self.weather_threshold,
            MarketCategory::Sports => self.sports_threshold,
            MarketCategory::Economics => self.economics_threshold,
            MarketCategory::Politics => self.politics_threshold,
            MarketCategory::Culture => self.culture_threshold,
            MarketCategory::Other => self.other_threshold,
        }
    }

    /// The threshold actually applied to one comparison: the larger of
    /// the noise floor and the category threshold, stretched when the
    /// estimate's confidence is below the cutoff.
    pub fn effective_threshold(&self, category: MarketCategory, confidence: f64) -> f64 {
        let mut threshold = self.threshold_for(category).max(self.noise_floor);
        if confidence < self.low_confidence_cutoff {
            threshold *= self.low_confidence_multiplier;
        }
        threshold
    }
}

// ---------------------------------------------------------------------------
// Edge detection
// ---------------------------------------------------------------------------

/// A detected mispricing. Ephemeral: exists only within a cycle.
#[derive(Debug, Clone)]
pub struct Edge {
    pub market: Market,
    pub estimate: Estimate,
    pub side: Side,
    /// Absolute edge (always positive).
    pub magnitude: f64,
    /// Positive = YES underpriced, negative = YES overpriced.
    pub signed: f64,
}

/// Detects mispricings by comparing fair-value estimates to market
/// prices. Deterministic given identical inputs.
pub struct EdgeDetector {
    config: EdgeConfig,
}

impl EdgeDetector {
    pub fn new(config: EdgeConfig) -> Self {
        Self { config }
    }

    /// Access the edge configuration.
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Find all markets in a batch with actionable edges.
    pub fn find_edges(&self, batch: &[(Market, Estimate)]) -> Vec<Edge> {
        batch
            .iter()
            .filter_map(|(market, estimate)| self.detect_edge(market, estimate))
            .collect()
    }

    /// Check a single market for a mispricing.
    ///
    /// Out-of-range probabilities are clamped before comparison — a
    /// documented caller contract violation, recovered locally.
    pub fn detect_edge(&self, market: &Market, estimate: &Estimate) -> Option<Edge> {
        let fair_value = clamp_probability(estimate.probability);
        let confidence = clamp_probability(estimate.confidence);
        let market_price = clamp_probability(market.price_yes);

        let signed = fair_value - market_price;
        let magnitude = signed.abs();

        let threshold = self.config.effective_threshold(market.category, confidence);
        if magnitude < threshold {
            debug!(
                market_id = %market.id,
                edge = format!("{:.1}%", magnitude * 100.0),
                threshold = format!("{:.1}%", threshold * 100.0),
                confidence = format!("{:.0}%", confidence * 100.0),
                "Edge below effective threshold"
            );
            return None;
        }

        let side = if signed > 0.0 { Side::Yes } else { Side::No };

        debug!(
            market_id = %market.id,
            side = %side,
            edge = format!("{:.1}%", magnitude * 100.0),
            fair_value = format!("{:.1}%", fair_value * 100.0),
            market_price = format!("{:.1}%", market_price * 100.0),
            "Edge detected"
        );

        Some(Edge {
            market: market.clone(),
            estimate: Estimate {
                probability: fair_value,
                confidence,
                ..estimate.clone()
            },
            side,
            magnitude,
            signed,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
