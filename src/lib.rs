//! SIBYL — Strategy & Calibration Engine for Prediction Market Trading
//!
//! The decision core of a prediction-market trading agent: edge
//! detection, Kelly sizing, risk management, cycle accounting,
//! backtesting, and calibration analysis. Market data, fair-value
//! estimation, and order execution are external collaborators.

pub mod backtest;
pub mod config;
pub mod engine;
pub mod storage;
pub mod strategy;
pub mod types;
