//! Cycle accounting and survival tracking.

pub mod accountant;

pub use accountant::{Accountant, CycleCosts, CycleReport};
