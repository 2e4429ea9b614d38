//! Historical replay and calibration analysis.

pub mod calibration;
pub mod runner;

pub use calibration::{
    CalibrationBin, CalibrationConfig, CalibrationPoint, CalibrationReport, Calibrator, Diagnosis,
};
pub use runner::{BacktestReport, BacktestTrade, Backtester};
