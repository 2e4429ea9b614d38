//! Persistence layer.
//!
//! Agent state snapshots persist as pretty-printed JSON so operators
//! can inspect and hand-edit them. Batches, backtest histories, and
//! prediction logs load from JSON files of the same shapes the
//! library types serialize to.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::backtest::CalibrationPoint;
use crate::types::{AgentState, Estimate, Market, ResolvedMarket, SibylError};

pub const DEFAULT_STATE_PATH: &str = "sibyl_state.json";

/// Persist the agent state snapshot.
pub fn save_state(state: &AgentState, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(state).context("Failed to serialize agent state")?;
    fs::write(path, json).with_context(|| format!("Failed to write state file: {path}"))?;
    info!(path, bankroll = format!("${:.2}", state.bankroll), "Agent state saved");
    Ok(())
}

/// Load a previously saved agent state. `Ok(None)` when no snapshot
/// exists; a corrupt snapshot is an error, never silently replaced.
pub fn load_state(path: &str) -> Result<Option<AgentState>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read state file: {path}"))?;
    let state: AgentState = serde_json::from_str(&contents)
        .map_err(|e| SibylError::Storage(format!("corrupt state file {path}: {e}")))?;
    info!(path, status = %state.status, "Agent state restored");
    Ok(Some(state))
}

/// Remove the state snapshot. Missing file is not an error.
pub fn delete_state(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        fs::remove_file(path).with_context(|| format!("Failed to delete state file: {path}"))?;
        warn!(path, "Agent state deleted");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    market: Market,
    estimate: Estimate,
}

/// Load a decision-cycle batch: a JSON array of market/estimate pairs.
pub fn load_batch(path: &str) -> Result<Vec<(Market, Estimate)>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read batch file: {path}"))?;
    let entries: Vec<BatchEntry> = serde_json::from_str(&contents)
        .map_err(|e| SibylError::Storage(format!("malformed batch file {path}: {e}")))?;
    Ok(entries.into_iter().map(|e| (e.market, e.estimate)).collect())
}

/// Load resolved-market history for backtesting.
pub fn load_history(path: &str) -> Result<Vec<ResolvedMarket>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {path}"))?;
    serde_json::from_str(&contents)
        .map_err(|e| SibylError::Storage(format!("malformed history file {path}: {e}")).into())
}

/// Load a logged prediction set for calibration analysis.
pub fn load_predictions(path: &str) -> Result<Vec<CalibrationPoint>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read predictions file: {path}"))?;
    serde_json::from_str(&contents)
        .map_err(|e| SibylError::Storage(format!("malformed predictions file {path}: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentStatus;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(tag: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        std::env::temp_dir()
            .join(format!("sibyl_test_{tag}_{}_{nanos}.json", std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_path("roundtrip");
        let mut state = AgentState::new(75.0);
        state.cycle_count = 12;
        state.trades_won = 3;

        save_state(&state, &path).unwrap();
        let loaded = load_state(&path).unwrap().unwrap();
        assert_eq!(loaded.bankroll, 75.0);
        assert_eq!(loaded.cycle_count, 12);
        assert_eq!(loaded.trades_won, 3);
        assert_eq!(loaded.status, AgentStatus::Alive);

        delete_state(&path).unwrap();
        assert!(load_state(&path).unwrap().is_none());
    }

    #[test]
    fn test_load_missing_state_is_none() {
        assert!(load_state("/tmp/sibyl_definitely_missing.json")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_corrupt_state_errors() {
        let path = temp_path("corrupt");
        fs::write(&path, "{not json").unwrap();
        let err = load_state(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SibylError>(),
            Some(SibylError::Storage(_))
        ));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_malformed_history_is_a_storage_error() {
        let path = temp_path("bad_history");
        fs::write(&path, "[{\"market\": 42}]").unwrap();
        let err = load_history(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SibylError>(),
            Some(SibylError::Storage(_))
        ));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_delete_missing_state_is_ok() {
        delete_state("/tmp/sibyl_definitely_missing.json").unwrap();
    }

    #[test]
    fn test_load_batch() {
        let path = temp_path("batch");
        let json = r#"[
            {
                "market": {
                    "id": "m1",
                    "question": "Will it rain tomorrow?",
                    "category": "Weather",
                    "price_yes": 0.4,
                    "price_no": 0.6,
                    "volume_24h": 1000.0,
                    "liquidity": 5000.0,
                    "deadline": "2026-12-31T00:00:00Z"
                },
                "estimate": {
                    "probability": 0.6,
                    "confidence": 0.9,
                    "rationale": "forecast consensus"
                }
            }
        ]"#;
        fs::write(&path, json).unwrap();
        let batch = load_batch(&path).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].0.id, "m1");
        assert!((batch[0].1.probability - 0.6).abs() < 1e-10);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_predictions() {
        let path = temp_path("predictions");
        let json = r#"[
            {"market_id": "m1", "category": "Sports", "predicted": 0.7, "outcome": true},
            {"market_id": "m2", "category": "Weather", "predicted": 0.2, "outcome": false}
        ]"#;
        fs::write(&path, json).unwrap();
        let points = load_predictions(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert!(points[0].outcome);
        fs::remove_file(&path).unwrap();
    }
}
