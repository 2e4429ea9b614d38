//! Strategy pipeline — edge detection, Kelly sizing, risk approval.
//!
//! The orchestrator wires the three stages into one decision cycle
//! and keeps a complete audit trail of every candidate considered.

pub mod edge;
pub mod kelly;
pub mod risk;

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::types::{AgentState, BetDecision, Estimate, Market, MarketCategory, Side};

pub use edge::{Edge, EdgeConfig, EdgeDetector};
pub use kelly::{KellyConfig, KellySizer, SizedBet};
pub use risk::{ExposureTracker, RejectionReason, RiskConfig, RiskManager};

/// What happened to one candidate at the risk stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approved { amount: f64 },
    Rejected { reason: RejectionReason },
}

/// One line of the cycle's audit trail. Every candidate that cleared
/// edge detection and sizing appears here, approved or not.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub market_id: String,
    pub category: MarketCategory,
    pub side: Side,
    pub edge: f64,
    pub confidence: f64,
    /// Amount requested before risk checks.
    pub requested: f64,
    pub verdict: Verdict,
}

/// The approved decisions and the audit trail of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleResult {
    pub approved: Vec<BetDecision>,
    pub audit: Vec<AuditRecord>,
    pub edges_found: usize,
}

/// A completed cycle with zero edges is not the same as having seen
/// no markets; callers distinguish the two.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The input batch was empty.
    Empty,
    Completed(CycleResult),
}

/// Runs one decision cycle: detect edges, size them, rank them, then
/// push each through the risk manager in priority order.
pub struct StrategyOrchestrator {
    detector: EdgeDetector,
    sizer: KellySizer,
    risk: RiskManager,
}

impl StrategyOrchestrator {
    pub fn new(detector: EdgeDetector, sizer: KellySizer, risk: RiskManager) -> Self {
        Self {
            detector,
            sizer,
            risk,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            EdgeDetector::new(EdgeConfig::from_section(&config.edge)),
            KellySizer::new(KellyConfig::from_section(&config.kelly)),
            RiskManager::new(RiskConfig::from_sections(&config.risk, &config.kelly)),
        )
    }

    /// Run a cycle with no pre-existing exposure.
    pub fn run_cycle(&self, batch: &[(Market, Estimate)], state: &AgentState) -> CycleOutcome {
        self.run_cycle_with_exposure(batch, state, &[])
    }

    /// Run a cycle seeded with exposure from positions still open from
    /// earlier cycles, so portfolio caps account for them.
    pub fn run_cycle_with_exposure(
        &self,
        batch: &[(Market, Estimate)],
        state: &AgentState,
        open_positions: &[(MarketCategory, f64)],
    ) -> CycleOutcome {
        if batch.is_empty() {
            return CycleOutcome::Empty;
        }

        let edges = self.detector.find_edges(batch);
        let edges_found = edges.len();
        info!(
            markets = batch.len(),
            edges = edges_found,
            "Cycle: edges detected"
        );

        let mut candidates: Vec<(Edge, SizedBet)> = edges
            .into_iter()
            .filter_map(|edge| {
                let sized = self.sizer.size(&edge, state.bankroll);
                if sized.amount > 0.0 {
                    Some((edge, sized))
                } else {
                    debug!(market_id = %edge.market.id, "Edge sized to zero, dropped");
                    None
                }
            })
            .collect();

        // Highest conviction first: edge magnitude weighted by
        // confidence, then deeper liquidity, then market id for a
        // stable total order.
        candidates.sort_by(|a, b| {
            let key_a = a.0.magnitude * a.0.estimate.confidence;
            let key_b = b.0.magnitude * b.0.estimate.confidence;
            key_b
                .total_cmp(&key_a)
                .then_with(|| b.0.market.liquidity.total_cmp(&a.0.market.liquidity))
                .then_with(|| a.0.market.id.cmp(&b.0.market.id))
        });

        let mut tracker = ExposureTracker::with_open_positions(open_positions);
        let mut result = CycleResult {
            edges_found,
            ..CycleResult::default()
        };

        for (edge, sized) in candidates {
            let decision = BetDecision {
                market: edge.market.clone(),
                side: edge.side,
                fair_value: edge.estimate.probability,
                edge: edge.magnitude,
                kelly_fraction: sized.raw_kelly,
                amount: sized.amount,
                confidence: edge.estimate.confidence,
                rationale: edge.estimate.rationale.clone(),
            };

            match self.risk.approve(&decision, state, &tracker) {
                Ok(amount) => {
                    tracker.record(decision.market.category, amount);
                    info!(
                        market_id = %decision.market.id,
                        side = %decision.side,
                        amount = format!("${amount:.2}"),
                        edge = format!("{:.1}%", decision.edge * 100.0),
                        "Bet approved"
                    );
                    result.audit.push(AuditRecord {
                        market_id: decision.market.id.clone(),
                        category: decision.market.category,
                        side: decision.side,
                        edge: decision.edge,
                        confidence: decision.confidence,
                        requested: decision.amount,
                        verdict: Verdict::Approved { amount },
                    });
                    result.approved.push(BetDecision { amount, ..decision });
                }
                Err(reason) => {
                    info!(
                        market_id = %decision.market.id,
                        reason = %reason,
                        "Bet rejected"
                    );
                    result.audit.push(AuditRecord {
                        market_id: decision.market.id.clone(),
                        category: decision.market.category,
                        side: decision.side,
                        edge: decision.edge,
                        confidence: decision.confidence,
                        requested: decision.amount,
                        verdict: Verdict::Rejected { reason },
                    });
                }
            }
        }

        info!(
            approved = result.approved.len(),
            rejected = result.audit.len() - result.approved.len(),
            "Cycle complete"
        );
        CycleOutcome::Completed(result)
    }
}
