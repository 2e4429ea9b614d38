//! Historical backtesting engine.
//!
//! Replays resolved markets chronologically through the full strategy
//! pipeline against a simulated agent, then reports win rate, P&L,
//! Sharpe ratio, max drawdown, and Brier score.

use std::fmt;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::engine::Accountant;
use crate::strategy::{CycleOutcome, StrategyOrchestrator};
use crate::types::{AgentState, MarketCategory, ResolvedMarket, SibylError, Side};

/// One settled bet in the replay ledger.
#[derive(Debug, Clone)]
pub struct BacktestTrade {
    pub market_id: String,
    pub category: MarketCategory,
    pub side: Side,
    pub amount: f64,
    pub price: f64,
    pub edge: f64,
    pub won: bool,
    pub pnl: f64,
}

/// Aggregate results of one replay.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub initial_bankroll: f64,
    pub final_bankroll: f64,
    pub total_pnl: f64,
    pub pnl_pct: f64,
    pub trades: Vec<BacktestTrade>,
    pub wins: usize,
    pub losses: usize,
    /// Fraction of settled trades won; zero when nothing settled.
    pub win_rate: f64,
    /// Annualized at one cycle per day.
    pub sharpe: f64,
    /// Worst peak-to-trough fraction of the balance series.
    pub max_drawdown: f64,
    /// Mean squared error of estimates against outcomes, over every
    /// replayed record that carried an estimate. None when none did.
    pub brier_score: Option<f64>,
    /// Bankroll after each cycle, starting with the initial value.
    pub balance_history: Vec<f64>,
    /// Records dropped for missing estimates or malformed data.
    pub skipped: usize,
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Backtest over {} trades ({} skipped records)", self.trades.len(), self.skipped)?;
        writeln!(
            f,
            "  bankroll: ${:.2} -> ${:.2} ({:+.1}%)",
            self.initial_bankroll,
            self.final_bankroll,
            self.pnl_pct * 100.0
        )?;
        writeln!(
            f,
            "  win rate: {:.1}% ({} W / {} L)",
            self.win_rate * 100.0,
            self.wins,
            self.losses
        )?;
        writeln!(f, "  sharpe (annualized): {:.2}", self.sharpe)?;
        writeln!(f, "  max drawdown: {:.1}%", self.max_drawdown * 100.0)?;
        match self.brier_score {
            Some(brier) => writeln!(f, "  brier score: {brier:.4}"),
            None => writeln!(f, "  brier score: n/a"),
        }
    }
}

/// Replays history through the orchestrator, one cycle per record.
pub struct Backtester {
    orchestrator: StrategyOrchestrator,
    accountant: Accountant,
    commission_rate: f64,
    initial_bankroll: f64,
}

impl Backtester {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            orchestrator: StrategyOrchestrator::from_config(config),
            accountant: Accountant::new(config.agent.survival_threshold),
            commission_rate: config.kelly.commission_rate,
            initial_bankroll: config.agent.initial_bankroll,
        }
    }

    pub fn run(&self, history: &[ResolvedMarket]) -> BacktestReport {
        let mut records: Vec<&ResolvedMarket> = history.iter().collect();
        records.sort_by_key(|r| r.resolution_time);

        let mut state = AgentState::new(self.initial_bankroll);
        let mut trades = Vec::new();
        let mut balance_history = vec![state.bankroll];
        let mut skipped = 0usize;
        let mut brier_sum = 0.0;
        let mut brier_count = 0usize;

        for record in records {
            let Some(estimate) = &record.estimate else {
                warn!(
                    error = %invalid(record, "no recorded estimate"),
                    "Skipping record"
                );
                skipped += 1;
                continue;
            };
            if !is_well_formed(record, estimate.probability) {
                warn!(
                    error = %invalid(record, "non-finite or negative market data"),
                    "Skipping record"
                );
                skipped += 1;
                continue;
            }

            let actual = if record.outcome { 1.0 } else { 0.0 };
            brier_sum += (estimate.probability - actual).powi(2);
            brier_count += 1;

            if !state.is_alive() {
                // Bankroll is gone; keep scoring calibration but stop
                // placing bets.
                continue;
            }

            let batch = vec![(record.market.clone(), estimate.clone())];
            let outcome = self.orchestrator.run_cycle(&batch, &state);
            let CycleOutcome::Completed(result) = outcome else {
                continue;
            };

            for decision in &result.approved {
                let won = (decision.side == Side::Yes) == record.outcome;
                let price = decision.market.price_for(decision.side);
                let net_odds = 1.0 / price - 1.0;
                let pnl = if won {
                    decision.amount * net_odds * (1.0 - self.commission_rate)
                } else {
                    -decision.amount
                };
                self.accountant.record_resolutions(&mut state, &[(pnl, won)]);
                trades.push(BacktestTrade {
                    market_id: decision.market.id.clone(),
                    category: decision.market.category,
                    side: decision.side,
                    amount: decision.amount,
                    price,
                    edge: decision.edge,
                    won,
                    pnl,
                });
            }
            balance_history.push(state.bankroll);
        }

        let wins = trades.iter().filter(|t| t.won).count();
        let losses = trades.len() - wins;
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            wins as f64 / trades.len() as f64
        };
        let total_pnl = state.bankroll - self.initial_bankroll;
        let pnl_pct = if self.initial_bankroll > 0.0 {
            total_pnl / self.initial_bankroll
        } else {
            0.0
        };

        let report = BacktestReport {
            initial_bankroll: self.initial_bankroll,
            final_bankroll: state.bankroll,
            total_pnl,
            pnl_pct,
            wins,
            losses,
            win_rate,
            sharpe: compute_sharpe(&balance_history),
            max_drawdown: compute_max_drawdown(&balance_history),
            brier_score: if brier_count > 0 {
                Some(brier_sum / brier_count as f64)
            } else {
                None
            },
            balance_history,
            skipped,
            trades,
        };
        info!(
            trades = report.trades.len(),
            skipped = report.skipped,
            pnl = format!("${:.2}", report.total_pnl),
            "Backtest complete"
        );
        report
    }
}

fn invalid(record: &ResolvedMarket, message: &str) -> SibylError {
    SibylError::InvalidRecord {
        id: record.market.id.clone(),
        message: message.to_string(),
    }
}

fn is_well_formed(record: &ResolvedMarket, probability: f64) -> bool {
    let m = &record.market;
    probability.is_finite()
        && m.price_yes.is_finite()
        && m.price_no.is_finite()
        && m.liquidity.is_finite()
        && m.liquidity >= 0.0
}

/// Annualized Sharpe over per-cycle returns, one cycle per day.
fn compute_sharpe(balance_history: &[f64]) -> f64 {
    let returns: Vec<f64> = balance_history
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    mean / std * 365.0_f64.sqrt()
}

fn compute_max_drawdown(balance_history: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &balance in balance_history {
        peak = peak.max(balance);
        if peak > 0.0 {
            worst = worst.max((peak - balance) / peak);
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Estimate, Market};
    use chrono::{Duration, TimeZone, Utc};

    fn resolved(
        id: &str,
        price_yes: f64,
        fair: f64,
        outcome: bool,
        day: i64,
    ) -> ResolvedMarket {
        ResolvedMarket {
            market: Market {
                id: id.to_string(),
                question: format!("Test {id}"),
                category: MarketCategory::Sports,
                price_yes,
                price_no: 1.0 - price_yes,
                volume_24h: 1000.0,
                liquidity: 5000.0,
                deadline: Utc::now() + Duration::days(30),
                cross_refs: Vec::new(),
            },
            outcome,
            estimate: Some(Estimate::clamped(fair, 0.9, "backtest")),
            resolution_time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                + Duration::days(day),
        }
    }

    fn no_commission_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.kelly.commission_rate = 0.0;
        config
    }

    #[test]
    fn test_empty_history_is_identity() {
        let backtester = Backtester::new(&AppConfig::default());
        let report = backtester.run(&[]);
        assert_eq!(report.final_bankroll, report.initial_bankroll);
        assert!(report.trades.is_empty());
        assert_eq!(report.total_pnl, 0.0);
        assert_eq!(report.sharpe, 0.0);
        assert_eq!(report.max_drawdown, 0.0);
        assert_eq!(report.brier_score, None);
        assert_eq!(report.balance_history, vec![100.0]);
    }

    #[test]
    fn test_win_credits_net_odds() {
        let backtester = Backtester::new(&no_commission_config());
        // Price 0.40, fair 0.60: approved at $6.00. A win at net odds
        // 1.5 pays $9.00.
        let report = backtester.run(&[resolved("m1", 0.40, 0.60, true, 0)]);
        assert_eq!(report.trades.len(), 1);
        assert!(report.trades[0].won);
        assert!((report.trades[0].pnl - 9.0).abs() < 1e-9);
        assert!((report.final_bankroll - 109.0).abs() < 1e-9);
    }

    #[test]
    fn test_loss_debits_stake() {
        let backtester = Backtester::new(&no_commission_config());
        let report = backtester.run(&[resolved("m1", 0.40, 0.60, false, 0)]);
        assert_eq!(report.trades.len(), 1);
        assert!(!report.trades[0].won);
        assert!((report.trades[0].pnl + 6.0).abs() < 1e-9);
        assert!((report.final_bankroll - 94.0).abs() < 1e-9);
    }

    #[test]
    fn test_commission_reduces_winnings() {
        let backtester = Backtester::new(&AppConfig::default());
        let report = backtester.run(&[resolved("m1", 0.40, 0.60, true, 0)]);
        // $6.00 at net odds 1.5 with 2% commission: 9.00 * 0.98.
        assert!((report.trades[0].pnl - 8.82).abs() < 1e-9);
    }

    #[test]
    fn test_no_side_bet_settles_against_outcome() {
        let backtester = Backtester::new(&no_commission_config());
        // YES overpriced at 0.75, fair 0.50: a NO bet that wins when
        // the market resolves NO.
        let report = backtester.run(&[resolved("m1", 0.75, 0.50, false, 0)]);
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].side, Side::No);
        assert!(report.trades[0].won);
    }

    #[test]
    fn test_records_replayed_chronologically() {
        let backtester = Backtester::new(&no_commission_config());
        // Given out of order; the later (larger) bankroll must size
        // the second-day bet, so its stake exceeds the first day's 6%.
        let history = vec![
            resolved("later", 0.40, 0.60, true, 5),
            resolved("earlier", 0.40, 0.60, true, 1),
        ];
        let report = backtester.run(&history);
        assert_eq!(report.trades[0].market_id, "earlier");
        assert_eq!(report.trades[1].market_id, "later");
        assert!(report.trades[1].amount > report.trades[0].amount);
    }

    #[test]
    fn test_skips_records_without_estimates() {
        let backtester = Backtester::new(&AppConfig::default());
        let mut record = resolved("m1", 0.40, 0.60, true, 0);
        record.estimate = None;
        let report = backtester.run(&[record]);
        assert_eq!(report.skipped, 1);
        assert!(report.trades.is_empty());
        assert_eq!(report.brier_score, None);
    }

    #[test]
    fn test_skips_malformed_records() {
        let backtester = Backtester::new(&AppConfig::default());
        let mut record = resolved("m1", 0.40, 0.60, true, 0);
        record.market.liquidity = f64::NAN;
        let report = backtester.run(&[record]);
        assert_eq!(report.skipped, 1);
        assert!(report.trades.is_empty());
    }

    #[test]
    fn test_brier_scores_all_estimated_records() {
        let backtester = Backtester::new(&AppConfig::default());
        // Neither record produces a bet (no edge), but both carry
        // estimates and count toward Brier.
        let history = vec![
            resolved("m1", 0.50, 0.51, true, 0),
            resolved("m2", 0.50, 0.49, false, 1),
        ];
        let report = backtester.run(&history);
        assert!(report.trades.is_empty());
        // ((0.51-1)^2 + (0.49-0)^2) / 2
        let expected = (0.49_f64.powi(2) + 0.49_f64.powi(2)) / 2.0;
        assert!((report.brier_score.unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        assert_eq!(compute_max_drawdown(&[100.0]), 0.0);
        let dd = compute_max_drawdown(&[100.0, 120.0, 90.0, 110.0]);
        assert!((dd - 0.25).abs() < 1e-10);
    }

    #[test]
    fn test_sharpe_zero_for_flat_series() {
        assert_eq!(compute_sharpe(&[100.0, 100.0, 100.0]), 0.0);
        // Positive drift with variance gives a positive Sharpe.
        assert!(compute_sharpe(&[100.0, 103.0, 104.0, 108.0]) > 0.0);
    }
}
