//! Risk manager.
//!
//! Final gatekeeper between sized bets and execution. Enforces
//! liquidity floors, per-market and portfolio exposure caps, a
//! drawdown ladder that rescales bets as the bankroll sinks below its
//! peak, a per-cycle bet cap, and a minimum viable bet.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::config::{KellySection, RiskSection};
use crate::types::{AgentState, BetDecision, MarketCategory};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Cap on total open exposure as a fraction of bankroll.
    pub max_exposure_pct: f64,
    /// Cap on exposure within a single category.
    pub category_exposure_pct: f64,
    /// Markets thinner than this are untradeable.
    pub min_liquidity: f64,
    /// Maximum bets approved in one decision cycle.
    pub max_bets_per_cycle: usize,
    /// Bets below this amount are not worth placing.
    pub min_bet: f64,
    /// Per-market cap, re-applied here in case sizing drifted.
    pub max_bet_pct: f64,
    /// Baseline Kelly multiplier, used to re-scale bets when a
    /// drawdown tier applies a different multiplier.
    pub kelly_multiplier: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_exposure_pct: 0.60,
            category_exposure_pct: 0.30,
            min_liquidity: 500.0,
            max_bets_per_cycle: 5,
            min_bet: 1.0,
            max_bet_pct: 0.06,
            kelly_multiplier: 0.25,
        }
    }
}

impl RiskConfig {
    pub fn from_sections(risk: &RiskSection, kelly: &KellySection) -> Self {
        Self {
            max_exposure_pct: risk.max_exposure_pct,
            category_exposure_pct: risk.category_exposure_pct,
            min_liquidity: risk.min_liquidity,
            max_bets_per_cycle: risk.max_bets_per_cycle,
            min_bet: kelly.min_bet,
            max_bet_pct: kelly.max_bet_pct,
            kelly_multiplier: kelly.kelly_multiplier,
        }
    }
}

// ---------------------------------------------------------------------------
// Drawdown ladder
// ---------------------------------------------------------------------------

/// Maps the bankroll-to-peak ratio onto an effective Kelly multiplier.
/// Deep drawdowns throttle sizing toward survival; running well above
/// the high-water mark loosens it.
pub struct DrawdownTiers;

impl DrawdownTiers {
    pub fn multiplier_for(peak_ratio: f64) -> f64 {
        if peak_ratio > 2.0 {
            0.50
        } else if peak_ratio >= 1.0 {
            0.25
        } else if peak_ratio >= 0.5 {
            0.15
        } else if peak_ratio >= 0.25 {
            0.10
        } else {
            0.05
        }
    }
}

// ---------------------------------------------------------------------------
// Per-cycle exposure tracking
// ---------------------------------------------------------------------------

/// Running exposure within one decision cycle. Owned by the caller so
/// the risk manager itself stays stateless across cycles.
#[derive(Debug, Default, Clone)]
pub struct ExposureTracker {
    total: f64,
    by_category: HashMap<MarketCategory, f64>,
    bets_placed: usize,
}

impl ExposureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker with exposure from positions already open
    /// before this cycle. Seeded exposure counts against caps but not
    /// against the per-cycle bet cap.
    pub fn with_open_positions(positions: &[(MarketCategory, f64)]) -> Self {
        let mut tracker = Self::new();
        for (category, amount) in positions {
            tracker.total += amount;
            *tracker.by_category.entry(*category).or_insert(0.0) += amount;
        }
        tracker
    }

    /// Record an approved bet.
    pub fn record(&mut self, category: MarketCategory, amount: f64) {
        self.total += amount;
        *self.by_category.entry(category).or_insert(0.0) += amount;
        self.bets_placed += 1;
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn category(&self, category: MarketCategory) -> f64 {
        self.by_category.get(&category).copied().unwrap_or(0.0)
    }

    pub fn bets_placed(&self) -> usize {
        self.bets_placed
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why a candidate bet was refused. Carried into the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    LowLiquidity { liquidity: f64, minimum: f64 },
    CategoryCapExceeded { category: MarketCategory },
    TotalExposureCapExceeded,
    CycleCapReached { cap: usize },
    BelowMinimumBet { amount: f64, minimum: f64 },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowLiquidity { liquidity, minimum } => {
                write!(f, "liquidity ${liquidity:.0} below minimum ${minimum:.0}")
            }
            Self::CategoryCapExceeded { category } => {
                write!(f, "{category} category exposure cap exceeded")
            }
            Self::TotalExposureCapExceeded => write!(f, "total exposure cap exceeded"),
            Self::CycleCapReached { cap } => write!(f, "cycle cap of {cap} bets reached"),
            Self::BelowMinimumBet { amount, minimum } => {
                write!(f, "sized ${amount:.2} below minimum bet ${minimum:.2}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Risk manager
// ---------------------------------------------------------------------------

/// Applies the risk checks in a fixed order and returns the approved
/// amount, which may be smaller than the candidate's when a cap
/// shrinks it to remaining headroom or a drawdown tier rescales it.
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn approve(
        &self,
        decision: &BetDecision,
        state: &AgentState,
        tracker: &ExposureTracker,
    ) -> Result<f64, RejectionReason> {
        let bankroll = state.bankroll;
        let market = &decision.market;

        if market.liquidity < self.config.min_liquidity {
            return Err(RejectionReason::LowLiquidity {
                liquidity: market.liquidity,
                minimum: self.config.min_liquidity,
            });
        }

        // Re-apply the per-market cap: bankroll may have moved since
        // sizing, and upstream callers are not trusted to enforce it.
        let per_market_cap = self.config.max_bet_pct * bankroll;
        let mut amount = decision.amount.min(per_market_cap);

        let category_cap = self.config.category_exposure_pct * bankroll;
        let category_headroom = category_cap - tracker.category(market.category);
        if amount > category_headroom {
            if category_headroom < self.config.min_bet {
                return Err(RejectionReason::CategoryCapExceeded {
                    category: market.category,
                });
            }
            debug!(
                market_id = %market.id,
                category = %market.category,
                shrunk_to = format!("${category_headroom:.2}"),
                "Bet shrunk to category headroom"
            );
            amount = category_headroom;
        }

        let total_cap = self.config.max_exposure_pct * bankroll;
        let total_headroom = total_cap - tracker.total();
        if amount > total_headroom {
            if total_headroom < self.config.min_bet {
                return Err(RejectionReason::TotalExposureCapExceeded);
            }
            debug!(
                market_id = %market.id,
                shrunk_to = format!("${total_headroom:.2}"),
                "Bet shrunk to portfolio headroom"
            );
            amount = total_headroom;
        }

        let tier = DrawdownTiers::multiplier_for(state.peak_ratio());
        if self.config.kelly_multiplier > 0.0 && tier != self.config.kelly_multiplier {
            let rescaled = amount * tier / self.config.kelly_multiplier;
            if rescaled < amount {
                warn!(
                    market_id = %market.id,
                    peak_ratio = format!("{:.2}", state.peak_ratio()),
                    tier_multiplier = tier,
                    "Drawdown tier throttling bet"
                );
            }
            // A loosened tier still honors the per-market cap and the
            // exposure headrooms established above.
            amount = rescaled
                .min(per_market_cap)
                .min(category_headroom)
                .min(total_headroom);
        }

        if tracker.bets_placed() >= self.config.max_bets_per_cycle {
            return Err(RejectionReason::CycleCapReached {
                cap: self.config.max_bets_per_cycle,
            });
        }

        if amount < self.config.min_bet {
            return Err(RejectionReason::BelowMinimumBet {
                amount,
                minimum: self.config.min_bet,
            });
        }

        Ok(amount)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
