//! Kelly criterion position sizing.
//!
//! Converts a detected edge into a dollar amount using fractional
//! Kelly with a hard cap per bet. Sizing never fails: degenerate
//! inputs produce a zero-amount bet the caller can drop.

use tracing::debug;

use crate::config::KellySection;
use crate::strategy::edge::Edge;
use crate::types::{clamp_probability, Side};

/// Sizing parameters. The multiplier shrinks full Kelly (full Kelly
/// assumes perfect probability estimates, which we do not have), the
/// cap bounds any single bet as a fraction of bankroll.
#[derive(Debug, Clone)]
pub struct KellyConfig {
    /// Fraction of full Kelly to actually bet.
    pub kelly_multiplier: f64,
    /// Hard cap on a single bet as a fraction of bankroll.
    pub max_bet_pct: f64,
    /// Round-trip commission charged by the venue.
    pub commission_rate: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            kelly_multiplier: 0.25,
            max_bet_pct: 0.06,
            commission_rate: 0.02,
        }
    }
}

impl KellyConfig {
    pub fn from_section(section: &KellySection) -> Self {
        Self {
            kelly_multiplier: section.kelly_multiplier,
            max_bet_pct: section.max_bet_pct,
            commission_rate: section.commission_rate,
        }
    }
}

/// The outcome of sizing one edge. `amount` is zero when the inputs
/// were degenerate or the edge evaporates after adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedBet {
    /// Full Kelly fraction before any adjustment.
    pub raw_kelly: f64,
    /// Fraction actually bet, after multiplier, commission and cap.
    pub fraction: f64,
    /// Dollar amount. Never negative.
    pub amount: f64,
}

impl SizedBet {
    pub fn zero() -> Self {
        Self {
            raw_kelly: 0.0,
            fraction: 0.0,
            amount: 0.0,
        }
    }
}

/// Fractional Kelly sizer.
pub struct KellySizer {
    config: KellyConfig,
}

impl KellySizer {
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KellyConfig {
        &self.config
    }

    /// Size a bet for the given edge against the current bankroll.
    ///
    /// For a binary contract priced at `price`, a win pays out at
    /// decimal odds `1 / price`, so the net odds are
    /// `b = (1 - price) / price` and full Kelly `(b*p - q) / b`
    /// reduces to `f* = (p - price) / (1 - price)`.
    pub fn size(&self, edge: &Edge, bankroll: f64) -> SizedBet {
        if bankroll <= 0.0 {
            return SizedBet::zero();
        }

        let price = edge.market.price_for(edge.side);
        // Prices at 0 or 1 have no payout structure to size against.
        if !(price > 0.0 && price < 1.0) {
            return SizedBet::zero();
        }

        let win_prob = match edge.side {
            Side::Yes => clamp_probability(edge.estimate.probability),
            Side::No => 1.0 - clamp_probability(edge.estimate.probability),
        };
        let our_edge = win_prob - price;
        if our_edge <= 0.0 {
            return SizedBet::zero();
        }

        let raw_kelly = our_edge / (1.0 - price);
        let fractional = raw_kelly * self.config.kelly_multiplier;
        let after_commission = fractional * (1.0 - self.config.commission_rate);
        let fraction = after_commission.min(self.config.max_bet_pct).max(0.0);
        let amount = fraction * bankroll;

        debug!(
            market_id = %edge.market.id,
            side = %edge.side,
            raw_kelly = format!("{raw_kelly:.4}"),
            fraction = format!("{fraction:.4}"),
            amount = format!("${amount:.2}"),
            "Sized bet"
        );

        SizedBet {
            raw_kelly,
            fraction,
            amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Estimate, Market, MarketCategory};
    use chrono::{Duration, Utc};

    fn make_edge(price_yes: f64, fair_value: f64, side: Side) -> Edge {
        let market = Market {
            id: "m1".to_string(),
            question: "Test".to_string(),
            category: MarketCategory::Weather,
            price_yes,
            price_no: 1.0 - price_yes,
            volume_24h: 1000.0,
            liquidity: 5000.0,
            deadline: Utc::now() + Duration::days(7),
            cross_refs: Vec::new(),
        };
        let signed = fair_value - price_yes;
        Edge {
            market,
            estimate: Estimate::clamped(fair_value, 0.9, "test"),
            side,
            magnitude: signed.abs(),
            signed,
        }
    }

    #[test]
    fn test_cap_binds_on_large_edge() {
        // 20% edge at price 0.40: full Kelly 1/3, quarter Kelly 0.0833,
        // still above the 6% cap after commission, so the cap binds.
        let sizer = KellySizer::new(KellyConfig::default());
        let edge = make_edge(0.40, 0.60, Side::Yes);
        let bet = sizer.size(&edge, 100.0);
        assert!((bet.raw_kelly - 1.0 / 3.0).abs() < 1e-10);
        assert!((bet.fraction - 0.06).abs() < 1e-10);
        assert!((bet.amount - 6.00).abs() < 1e-10);
    }

    #[test]
    fn test_small_edge_below_cap() {
        // 5% edge at price 0.50: full Kelly 0.10, quarter 0.025,
        // commission-adjusted 0.0245. Cap does not bind.
        let sizer = KellySizer::new(KellyConfig::default());
        let edge = make_edge(0.50, 0.55, Side::Yes);
        let bet = sizer.size(&edge, 100.0);
        assert!((bet.raw_kelly - 0.10).abs() < 1e-10);
        assert!((bet.fraction - 0.0245).abs() < 1e-10);
        assert!((bet.amount - 2.45).abs() < 1e-10);
    }

    #[test]
    fn test_no_side_uses_no_price() {
        // YES overpriced at 0.70, fair value 0.50: bet NO at 0.30 with
        // win probability 0.50.
        let sizer = KellySizer::new(KellyConfig::default());
        let edge = make_edge(0.70, 0.50, Side::No);
        let bet = sizer.size(&edge, 100.0);
        // f* = (0.50 - 0.30) / 0.70
        assert!((bet.raw_kelly - 0.20 / 0.70).abs() < 1e-10);
        assert!(bet.amount > 0.0);
    }

    #[test]
    fn test_zero_bankroll_yields_zero() {
        let sizer = KellySizer::new(KellyConfig::default());
        let edge = make_edge(0.40, 0.60, Side::Yes);
        assert_eq!(sizer.size(&edge, 0.0), SizedBet::zero());
        assert_eq!(sizer.size(&edge, -5.0), SizedBet::zero());
    }

    #[test]
    fn test_degenerate_price_yields_zero() {
        let sizer = KellySizer::new(KellyConfig::default());
        let edge = make_edge(0.0, 0.60, Side::Yes);
        assert_eq!(sizer.size(&edge, 100.0), SizedBet::zero());
        let edge = make_edge(1.0, 0.60, Side::Yes);
        assert_eq!(sizer.size(&edge, 100.0), SizedBet::zero());
    }

    #[test]
    fn test_negative_edge_yields_zero() {
        // Side says YES but the fair value sits below the price.
        let sizer = KellySizer::new(KellyConfig::default());
        let edge = make_edge(0.60, 0.55, Side::Yes);
        assert_eq!(sizer.size(&edge, 100.0), SizedBet::zero());
    }

    #[test]
    fn test_commission_shrinks_bet() {
        let edge = make_edge(0.50, 0.55, Side::Yes);
        let with = KellySizer::new(KellyConfig::default());
        let without = KellySizer::new(KellyConfig {
            commission_rate: 0.0,
            ..KellyConfig::default()
        });
        assert!(with.size(&edge, 100.0).amount < without.size(&edge, 100.0).amount);
    }

    #[test]
    fn test_monotone_in_edge() {
        let sizer = KellySizer::new(KellyConfig {
            max_bet_pct: 1.0, // disable the cap for this property
            ..KellyConfig::default()
        });
        let small = sizer.size(&make_edge(0.50, 0.54, Side::Yes), 100.0);
        let large = sizer.size(&make_edge(0.50, 0.62, Side::Yes), 100.0);
        assert!(large.amount > small.amount);
    }

    #[test]
    fn test_monotone_in_bankroll() {
        let sizer = KellySizer::new(KellyConfig::default());
        let edge = make_edge(0.50, 0.58, Side::Yes);
        let poor = sizer.size(&edge, 50.0);
        let rich = sizer.size(&edge, 500.0);
        assert!(rich.amount > poor.amount);
        // Fraction is bankroll-independent
        assert!((rich.fraction - poor.fraction).abs() < 1e-10);
    }

    #[test]
    fn test_amount_never_negative() {
        let sizer = KellySizer::new(KellyConfig::default());
        for fv in [0.0, 0.3, 0.5, 0.7, 1.0] {
            for side in [Side::Yes, Side::No] {
                let bet = sizer.size(&make_edge(0.5, fv, side), 100.0);
                assert!(bet.amount >= 0.0);
            }
        }
    }
}
