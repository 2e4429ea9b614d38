//! Shared types for the SIBYL strategy engine.
//!
//! These types form the data model used across the strategy, engine,
//! and backtest modules. They are designed to be stable so that the
//! modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clamp a probability-like value into [0.0, 1.0].
///
/// Out-of-range inputs are a caller contract violation; the core
/// recovers by clamping rather than erroring.
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        return 0.0;
    }
    p.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// An immutable per-cycle snapshot of a prediction market.
///
/// Owned by the caller; the strategy core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    pub category: MarketCategory,
    /// Current YES price (0.0–1.0).
    pub price_yes: f64,
    /// Current NO price (0.0–1.0).
    pub price_no: f64,
    /// 24-hour volume in USD equivalent.
    pub volume_24h: f64,
    /// Available liquidity in USD equivalent.
    pub liquidity: f64,
    /// Market resolution deadline.
    pub deadline: DateTime<Utc>,
    /// Reference probabilities from auxiliary sources.
    #[serde(default)]
    pub cross_refs: Vec<CrossRef>,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] (YES: {:.0}¢ | NO: {:.0}¢ | liq: ${:.0})",
            self.question,
            self.category,
            self.price_yes * 100.0,
            self.price_no * 100.0,
            self.liquidity,
        )
    }
}

impl Market {
    /// The price of the given side.
    pub fn price_for(&self, side: Side) -> f64 {
        match side {
            Side::Yes => self.price_yes,
            Side::No => self.price_no,
        }
    }

    /// The mid-price between YES and the complement of NO.
    pub fn mid_price(&self) -> f64 {
        (self.price_yes + (1.0 - self.price_no)) / 2.0
    }

    /// Spread between YES and (1 - NO) prices, a measure of market efficiency.
    pub fn spread(&self) -> f64 {
        (self.price_yes - (1.0 - self.price_no)).abs()
    }

    /// Whether the market is still active (deadline in the future).
    pub fn is_active(&self) -> bool {
        self.deadline > Utc::now()
    }

    /// Helper to build a test market with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        Market {
            id: "test-001".to_string(),
            question: "Will CPI exceed 3% in Q1 2026?".to_string(),
            category: MarketCategory::Economics,
            price_yes: 0.45,
            price_no: 0.55,
            volume_24h: 5000.0,
            liquidity: 12000.0,
            deadline: Utc::now() + chrono::Duration::days(30),
            cross_refs: vec![CrossRef {
                source: "forecaster-consensus".to_string(),
                probability: 0.52,
            }],
        }
    }
}

/// A reference probability from an auxiliary source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossRef {
    pub source: String,
    pub probability: f64,
}

impl fmt::Display for CrossRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.0}%", self.source, self.probability * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Bet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Market category. A closed enumeration so that threshold and exposure
/// lookups are total — no category is ever silently unhandled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MarketCategory {
    Weather,
    Sports,
    Economics,
    Politics,
    Culture,
    Other,
}

impl MarketCategory {
    /// All known categories (useful for iteration).
    pub const ALL: &'static [MarketCategory] = &[
        MarketCategory::Weather,
        MarketCategory::Sports,
        MarketCategory::Economics,
        MarketCategory::Politics,
        MarketCategory::Culture,
        MarketCategory::Other,
    ];
}

impl fmt::Display for MarketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketCategory::Weather => write!(f, "Weather"),
            MarketCategory::Sports => write!(f, "Sports"),
            MarketCategory::Economics => write!(f, "Economics"),
            MarketCategory::Politics => write!(f, "Politics"),
            MarketCategory::Culture => write!(f, "Culture"),
            MarketCategory::Other => write!(f, "Other"),
        }
    }
}

/// Attempt to parse a string into a MarketCategory (case-insensitive).
impl std::str::FromStr for MarketCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weather" => Ok(MarketCategory::Weather),
            "sports" | "sport" => Ok(MarketCategory::Sports),
            "economics" | "economic" | "econ" => Ok(MarketCategory::Economics),
            "politics" | "political" => Ok(MarketCategory::Politics),
            "culture" | "cultural" | "entertainment" => Ok(MarketCategory::Culture),
            "other" => Ok(MarketCategory::Other),
            _ => Err(anyhow::anyhow!("Unknown market category: {s}")),
        }
    }
}

/// Agent lifecycle status. `Died` is terminal by design: the engine
/// never resumes betting on its own after survival failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Alive,
    Died,
    Paused,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Alive => write!(f, "ALIVE"),
            AgentStatus::Died => write!(f, "DIED"),
            AgentStatus::Paused => write!(f, "PAUSED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Estimate
// ---------------------------------------------------------------------------

/// A fair-value probability estimate for a market, produced by an
/// external estimation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    /// Fair-value probability of the YES outcome (0.0–1.0).
    pub probability: f64,
    /// Self-reported confidence in the estimate (0.0–1.0).
    pub confidence: f64,
    /// Free-text reasoning summary.
    pub rationale: String,
    /// Identifiers of the data sources consulted.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P={:.1}% conf={:.0}%",
            self.probability * 100.0,
            self.confidence * 100.0,
        )
    }
}

impl Estimate {
    /// Build an estimate with probability and confidence clamped into
    /// [0, 1] — the invariant downstream code relies on.
    pub fn clamped(probability: f64, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            probability: clamp_probability(probability),
            confidence: clamp_probability(confidence),
            rationale: rationale.into(),
            sources: Vec::new(),
        }
    }

    /// Whether both fields already sit within their bounds.
    pub fn in_bounds(&self) -> bool {
        (0.0..=1.0).contains(&self.probability) && (0.0..=1.0).contains(&self.confidence)
    }
}

// ---------------------------------------------------------------------------
// Bet decision
// ---------------------------------------------------------------------------

/// A fully computed bet decision: proposed by the Kelly sizer, then
/// approved (possibly shrunk) by the risk manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetDecision {
    pub market: Market,
    pub side: Side,
    /// Fair-value estimate used for the decision.
    pub fair_value: f64,
    /// |fair_value - market_price|.
    pub edge: f64,
    /// Raw (full) Kelly fraction before multiplier and caps.
    pub kelly_fraction: f64,
    /// Final bet amount after caps and risk adjustments.
    pub amount: f64,
    pub confidence: f64,
    pub rationale: String,
}

impl fmt::Display for BetDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | fair={:.0}% mkt={:.0}% edge={:.1}% | kelly={:.1}% bet=${:.2} | conf={:.0}%",
            self.side,
            self.market.question,
            self.fair_value * 100.0,
            self.market_price() * 100.0,
            self.edge * 100.0,
            self.kelly_fraction * 100.0,
            self.amount,
            self.confidence * 100.0,
        )
    }
}

impl BetDecision {
    /// Expected value of this bet: edge × amount.
    pub fn expected_value(&self) -> f64 {
        self.edge * self.amount
    }

    /// The market price on the side we're betting.
    pub fn market_price(&self) -> f64 {
        self.market.price_for(self.side)
    }
}

// ---------------------------------------------------------------------------
// Agent state
// ---------------------------------------------------------------------------

/// The single mutable record of agent health. Owned exclusively by the
/// Accountant; all other components read a snapshot for the duration
/// of a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub bankroll: f64,
    pub peak_bankroll: f64,
    pub total_pnl: f64,
    pub total_costs: f64,
    pub cycle_count: u64,
    pub trades_placed: u64,
    pub trades_won: u64,
    pub trades_lost: u64,
    pub start_time: DateTime<Utc>,
    pub status: AgentStatus,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | bankroll=${:.2} | PnL=${:.2} | cycles={} | trades={} (W{}/L{}) | drawdown={:.1}% | costs=${:.2}",
            self.status,
            self.bankroll,
            self.total_pnl,
            self.cycle_count,
            self.trades_placed,
            self.trades_won,
            self.trades_lost,
            self.drawdown() * 100.0,
            self.total_costs,
        )
    }
}

impl AgentState {
    /// Create a fresh agent state with the given initial bankroll.
    pub fn new(initial_bankroll: f64) -> Self {
        Self {
            bankroll: initial_bankroll,
            peak_bankroll: initial_bankroll,
            total_pnl: 0.0,
            total_costs: 0.0,
            cycle_count: 0,
            trades_placed: 0,
            trades_won: 0,
            trades_lost: 0,
            start_time: Utc::now(),
            status: AgentStatus::Alive,
        }
    }

    /// Win rate as a fraction of resolved trades. 0.0 if none resolved.
    pub fn win_rate(&self) -> f64 {
        let resolved = self.trades_won + self.trades_lost;
        if resolved == 0 {
            0.0
        } else {
            self.trades_won as f64 / resolved as f64
        }
    }

    /// Current drawdown from peak as a fraction (0.0 = at peak).
    pub fn drawdown(&self) -> f64 {
        if self.peak_bankroll <= 0.0 {
            0.0
        } else {
            (1.0 - self.bankroll / self.peak_bankroll).max(0.0)
        }
    }

    /// Bankroll as a fraction of peak — the drawdown tier input.
    pub fn peak_ratio(&self) -> f64 {
        if self.peak_bankroll <= 0.0 {
            0.0
        } else {
            self.bankroll / self.peak_bankroll
        }
    }

    /// Whether the agent is still alive and trading.
    pub fn is_alive(&self) -> bool {
        self.status == AgentStatus::Alive
    }

    /// Update peak bankroll if current is higher.
    pub fn update_peak(&mut self) {
        if self.bankroll > self.peak_bankroll {
            self.peak_bankroll = self.bankroll;
        }
    }

    /// Record a resolved trade outcome against the bankroll.
    pub fn record_resolution(&mut self, pnl: f64, won: bool) {
        self.total_pnl += pnl;
        self.bankroll += pnl;
        if won {
            self.trades_won += 1;
        } else {
            self.trades_lost += 1;
        }
        self.update_peak();
    }
}

// ---------------------------------------------------------------------------
// Resolved market (backtesting)
// ---------------------------------------------------------------------------

/// A market with a known binary outcome, used only by the backtester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedMarket {
    pub market: Market,
    /// Realized outcome: true = YES resolved.
    pub outcome: bool,
    /// Recorded historical estimate, if one was logged.
    pub estimate: Option<Estimate>,
    /// When the market resolved.
    pub resolution_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SIBYL. Raised at the configuration
/// and persistence seams and for malformed replay records; the binary
/// carries them behind `anyhow` contexts.
#[derive(Debug, thiserror::Error)]
pub enum SibylError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid record ({id}): {message}")]
    InvalidRecord { id: String, message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
