//! Accountant — cost tracking, P&L, and survival checks.
//!
//! The single writer of `AgentState`. Reconciles each decision cycle,
//! applies resolved-trade P&L, and declares death when the bankroll
//! falls to the survival threshold. Death is terminal: a dead agent
//! never trades again without operator intervention.

use tracing::{info, warn};

use crate::strategy::CycleOutcome;
use crate::types::{AgentState, AgentStatus};

/// Costs incurred during one cycle, outside of bet stakes.
#[derive(Debug, Clone, Default)]
pub struct CycleCosts {
    /// Fair-value estimation fees (external estimator usage).
    pub estimation: f64,
    /// Market data and enrichment fees.
    pub data: f64,
    /// Commissions paid on placed bets.
    pub commissions: f64,
    pub other: f64,
}

impl CycleCosts {
    pub fn total(&self) -> f64 {
        self.estimation + self.data + self.commissions + self.other
    }
}

/// Snapshot emitted after each reconciliation.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub bets_placed: usize,
    pub amount_staked: f64,
    pub costs: f64,
    pub bankroll_after: f64,
    pub status: AgentStatus,
}

pub struct Accountant {
    survival_threshold: f64,
}

impl Accountant {
    pub fn new(survival_threshold: f64) -> Self {
        Self { survival_threshold }
    }

    /// Reconcile one completed cycle: deduct costs, count placed bets,
    /// update the high-water mark, and check survival. A dead or
    /// paused agent is left untouched.
    pub fn reconcile(
        &self,
        state: &mut AgentState,
        outcome: &CycleOutcome,
        costs: &CycleCosts,
    ) -> CycleReport {
        if state.status != AgentStatus::Alive {
            warn!(status = %state.status, "Reconcile skipped: agent is not alive");
            return self.report(state, 0, 0.0, 0.0);
        }

        let (bets_placed, amount_staked) = match outcome {
            CycleOutcome::Empty => (0, 0.0),
            CycleOutcome::Completed(result) => (
                result.approved.len(),
                result.approved.iter().map(|d| d.amount).sum(),
            ),
        };

        let cost_total = costs.total();
        state.bankroll -= cost_total;
        state.total_costs += cost_total;
        state.cycle_count += 1;
        state.trades_placed += bets_placed as u64;
        state.update_peak();
        self.check_survival(state);

        let report = self.report(state, bets_placed, amount_staked, cost_total);
        info!(
            cycle = report.cycle,
            bets = report.bets_placed,
            staked = format!("${:.2}", report.amount_staked),
            costs = format!("${:.2}", report.costs),
            bankroll = format!("${:.2}", report.bankroll_after),
            status = %report.status,
            "Cycle reconciled"
        );
        report
    }

    /// Apply P&L from resolved trades: `(pnl, won)` pairs. Survival is
    /// re-checked after each application, and further resolutions
    /// still settle against a dead agent's books (debts do not vanish
    /// at death, and late wins are still recorded).
    pub fn record_resolutions(&self, state: &mut AgentState, resolutions: &[(f64, bool)]) {
        for &(pnl, won) in resolutions {
            state.record_resolution(pnl, won);
            state.update_peak();
            self.check_survival(state);
        }
    }

    fn check_survival(&self, state: &mut AgentState) {
        if state.status == AgentStatus::Alive && state.bankroll <= self.survival_threshold {
            warn!(
                bankroll = format!("${:.2}", state.bankroll),
                threshold = format!("${:.2}", self.survival_threshold),
                "Bankroll at survival threshold: agent has died"
            );
            state.status = AgentStatus::Died;
        }
    }

    fn report(
        &self,
        state: &AgentState,
        bets_placed: usize,
        amount_staked: f64,
        costs: f64,
    ) -> CycleReport {
        CycleReport {
            cycle: state.cycle_count,
            bets_placed,
            amount_staked,
            costs,
            bankroll_after: state.bankroll,
            status: state.status,
        }
    }
}
