//! SIBYL — Strategy & Calibration Engine for Prediction Market Trading
//!
//! Entry point. Loads configuration, initialises structured logging,
//! and drives one of three offline operations from local JSON files:
//! a decision cycle, a backtest replay, or a calibration analysis.

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sibyl::backtest::{Backtester, CalibrationConfig, Calibrator};
use sibyl::config::AppConfig;
use sibyl::engine::{Accountant, CycleCosts};
use sibyl::storage;
use sibyl::strategy::{CycleOutcome, StrategyOrchestrator, Verdict};
use sibyl::types::AgentState;

const USAGE: &str = "usage: sibyl <cycle|backtest|calibrate> <file.json>";

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let (command, path) = match (args.get(1), args.get(2)) {
        (Some(command), Some(path)) => (command.as_str(), path.as_str()),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    let config = AppConfig::load("config.toml")?;
    info!(agent = %config.agent.name, command, "SIBYL starting");

    match command {
        "cycle" => run_cycle(&config, path),
        "backtest" => run_backtest(&config, path),
        "calibrate" => run_calibrate(&config, path),
        other => {
            eprintln!("unknown command: {other}\n{USAGE}");
            std::process::exit(2);
        }
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sibyl=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("SIBYL_LOG_JSON").is_ok() {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Run one decision cycle over a batch file, reconcile, and persist
/// the agent state.
fn run_cycle(config: &AppConfig, path: &str) -> Result<()> {
    let mut state = match storage::load_state(storage::DEFAULT_STATE_PATH)? {
        Some(state) => state,
        None => {
            info!(
                bankroll = format!("${:.2}", config.agent.initial_bankroll),
                "No saved state found, starting fresh"
            );
            AgentState::new(config.agent.initial_bankroll)
        }
    };

    if !state.is_alive() {
        warn!(status = %state.status, "Agent is not alive; refusing to run a cycle");
        println!("{state}");
        return Ok(());
    }

    let batch = storage::load_batch(path)?;
    let orchestrator = StrategyOrchestrator::from_config(config);
    let outcome = orchestrator.run_cycle(&batch, &state);

    match &outcome {
        CycleOutcome::Empty => println!("Batch was empty: nothing to decide."),
        CycleOutcome::Completed(result) => {
            println!(
                "Cycle complete: {} edges, {} approved, {} rejected",
                result.edges_found,
                result.approved.len(),
                result.audit.len() - result.approved.len()
            );
            for decision in &result.approved {
                println!("  PLACE {decision}");
            }
            for record in &result.audit {
                if let Verdict::Rejected { reason } = &record.verdict {
                    println!(
                        "  skip  {} {} ${:.2}: {reason}",
                        record.side, record.market_id, record.requested
                    );
                }
            }
        }
    }

    let accountant = Accountant::new(config.agent.survival_threshold);
    let report = accountant.reconcile(&mut state, &outcome, &CycleCosts::default());
    storage::save_state(&state, storage::DEFAULT_STATE_PATH)?;
    println!(
        "Cycle {}: staked ${:.2} across {} bets | {state}",
        report.cycle, report.amount_staked, report.bets_placed
    );
    Ok(())
}

/// Replay a resolved-market history file and print the report.
fn run_backtest(config: &AppConfig, path: &str) -> Result<()> {
    let history = storage::load_history(path)?;
    let backtester = Backtester::new(config);
    let report = backtester.run(&history);
    println!("{report}");
    Ok(())
}

/// Analyze a logged prediction file and print the calibration report.
fn run_calibrate(config: &AppConfig, path: &str) -> Result<()> {
    let points = storage::load_predictions(path)?;
    let calibrator = Calibrator::new(CalibrationConfig::from_section(&config.calibration));
    let report = calibrator.analyze(&points);
    println!("{report}");
    Ok(())
}
