//! Calibration analysis.
//!
//! Measures how well logged probability estimates match realized
//! outcomes: calibration curve over equal-width bins, Brier scores per
//! category, an over/under-confidence diagnosis, and per-category
//! threshold adjustment recommendations. Recommendations are reported
//! only; nothing here mutates strategy configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CalibrationSection;
use crate::types::{clamp_probability, MarketCategory};

/// One logged prediction and its realized outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub market_id: String,
    pub category: MarketCategory,
    pub predicted: f64,
    pub outcome: bool,
}

#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// Number of equal-width bins over [0, 1).
    pub bin_count: usize,
    /// Weighted mean absolute gap below which the model counts as
    /// well calibrated.
    pub tolerance: f64,
    /// Fewer points than this and no diagnosis is attempted.
    pub min_samples: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            bin_count: 10,
            tolerance: 0.05,
            min_samples: 10,
        }
    }
}

impl CalibrationConfig {
    pub fn from_section(section: &CalibrationSection) -> Self {
        Self {
            bin_count: section.bin_count.max(1),
            tolerance: section.tolerance,
            ..Self::default()
        }
    }
}

/// One bin of the calibration curve.
#[derive(Debug, Clone)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean_predicted: f64,
    /// Fraction of outcomes in this bin that resolved YES.
    pub observed: f64,
}

impl CalibrationBin {
    pub fn gap(&self) -> f64 {
        (self.mean_predicted - self.observed).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    WellCalibrated,
    /// Predictions are more extreme than outcomes warrant.
    OverConfident,
    /// Predictions hug 0.5 while outcomes are more decisive.
    UnderConfident,
    InsufficientData,
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::WellCalibrated => "well calibrated",
            Self::OverConfident => "overconfident",
            Self::UnderConfident => "underconfident",
            Self::InsufficientData => "insufficient data",
        };
        write!(f, "{label}")
    }
}

/// Per-category breakdown with a recommended (not applied) threshold
/// adjustment factor.
#[derive(Debug, Clone)]
pub struct CategoryCalibration {
    pub category: MarketCategory,
    pub count: usize,
    pub brier: f64,
    pub diagnosis: Diagnosis,
    /// Multiply the category's edge threshold by this. >1 demands
    /// larger edges, <1 allows smaller ones.
    pub threshold_adjustment: f64,
}

#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub total: usize,
    pub bins: Vec<CalibrationBin>,
    pub brier: Option<f64>,
    pub diagnosis: Diagnosis,
    /// Count-weighted mean absolute gap over populated bins.
    pub weighted_gap: f64,
    pub categories: Vec<CategoryCalibration>,
}

impl fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Calibration over {} predictions: {}", self.total, self.diagnosis)?;
        if let Some(brier) = self.brier {
            writeln!(f, "  brier score: {brier:.4}")?;
        }
        writeln!(f, "  weighted gap: {:.3}", self.weighted_gap)?;
        for bin in self.bins.iter().filter(|b| b.count > 0) {
            writeln!(
                f,
                "  [{:.1}-{:.1}) n={:<4} predicted {:.2} observed {:.2}",
                bin.lower, bin.upper, bin.count, bin.mean_predicted, bin.observed
            )?;
        }
        for cat in &self.categories {
            writeln!(
                f,
                "  {}: n={} brier {:.4} {} (suggested threshold x{:.2})",
                cat.category, cat.count, cat.brier, cat.diagnosis, cat.threshold_adjustment
            )?;
        }
        Ok(())
    }
}

pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, points: &[CalibrationPoint]) -> CalibrationReport {
        let bins = self.build_bins(points);
        let (diagnosis, weighted_gap) = self.diagnose(&bins, points.len());
        let brier = brier_score(points);

        let mut by_category: BTreeMap<MarketCategory, Vec<&CalibrationPoint>> = BTreeMap::new();
        for point in points {
            by_category.entry(point.category).or_default().push(point);
        }
        let categories = by_category
            .into_iter()
            .map(|(category, members)| {
                let owned: Vec<CalibrationPoint> = members.into_iter().cloned().collect();
                let cat_bins = self.build_bins(&owned);
                let (cat_diagnosis, cat_gap) = self.diagnose(&cat_bins, owned.len());
                CategoryCalibration {
                    category,
                    count: owned.len(),
                    brier: brier_score(&owned).unwrap_or(0.0),
                    diagnosis: cat_diagnosis,
                    threshold_adjustment: adjustment_for(cat_diagnosis, cat_gap),
                }
            })
            .collect();

        info!(
            points = points.len(),
            diagnosis = %diagnosis,
            gap = format!("{weighted_gap:.3}"),
            "Calibration analysis complete"
        );

        CalibrationReport {
            total: points.len(),
            bins,
            brier,
            diagnosis,
            weighted_gap,
            categories,
        }
    }

    fn build_bins(&self, points: &[CalibrationPoint]) -> Vec<CalibrationBin> {
        let n = self.config.bin_count;
        let width = 1.0 / n as f64;
        let mut counts = vec![0usize; n];
        let mut predicted_sums = vec![0.0f64; n];
        let mut yes_counts = vec![0usize; n];

        for point in points {
            let p = clamp_probability(point.predicted);
            // Last bin is closed so p = 1.0 lands in it.
            let index = ((p * n as f64) as usize).min(n - 1);
            counts[index] += 1;
            predicted_sums[index] += p;
            if point.outcome {
                yes_counts[index] += 1;
            }
        }

        (0..n)
            .map(|i| CalibrationBin {
                lower: i as f64 * width,
                upper: (i + 1) as f64 * width,
                count: counts[i],
                mean_predicted: if counts[i] > 0 {
                    predicted_sums[i] / counts[i] as f64
                } else {
                    0.0
                },
                observed: if counts[i] > 0 {
                    yes_counts[i] as f64 / counts[i] as f64
                } else {
                    0.0
                },
            })
            .collect()
    }

    fn diagnose(&self, bins: &[CalibrationBin], total: usize) -> (Diagnosis, f64) {
        if total < self.config.min_samples {
            return (Diagnosis::InsufficientData, 0.0);
        }

        let mut gap_sum = 0.0;
        // Positive when predictions sit further from 0.5 than the
        // observed frequencies they map to.
        let mut extremity = 0.0;
        for bin in bins.iter().filter(|b| b.count > 0) {
            let weight = bin.count as f64;
            gap_sum += bin.gap() * weight;
            extremity += ((bin.mean_predicted - 0.5).abs() - (bin.observed - 0.5).abs()) * weight;
        }
        let weighted_gap = gap_sum / total as f64;
        let mean_extremity = extremity / total as f64;

        let diagnosis = if weighted_gap < self.config.tolerance {
            Diagnosis::WellCalibrated
        } else if mean_extremity > 0.0 {
            Diagnosis::OverConfident
        } else {
            Diagnosis::UnderConfident
        };
        (diagnosis, weighted_gap)
    }
}

fn brier_score(points: &[CalibrationPoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let sum: f64 = points
        .iter()
        .map(|p| {
            let actual = if p.outcome { 1.0 } else { 0.0 };
            (clamp_probability(p.predicted) - actual).powi(2)
        })
        .sum();
    Some(sum / points.len() as f64)
}

fn adjustment_for(diagnosis: Diagnosis, weighted_gap: f64) -> f64 {
    match diagnosis {
        // Demand proportionally larger edges from an overconfident
        // estimator; allow modestly smaller ones when it underclaims.
        Diagnosis::OverConfident => (1.0 + weighted_gap).min(1.5),
        Diagnosis::UnderConfident => (1.0 - weighted_gap / 2.0).max(0.75),
        Diagnosis::WellCalibrated | Diagnosis::InsufficientData => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(predicted: f64, outcome: bool) -> CalibrationPoint {
        CalibrationPoint {
            market_id: "m".to_string(),
            category: MarketCategory::Sports,
            predicted,
            outcome,
        }
    }

    /// `per_level` points at each decile midpoint, with outcomes
    /// matching the predicted frequency exactly.
    fn perfectly_calibrated(per_level: usize) -> Vec<CalibrationPoint> {
        let mut points = Vec::new();
        for k in 0..10 {
            let p = 0.05 + 0.1 * k as f64;
            let yes = (p * per_level as f64).round() as usize;
            for i in 0..per_level {
                points.push(point(p, i < yes));
            }
        }
        points
    }

    #[test]
    fn test_perfectly_calibrated_data() {
        let calibrator = Calibrator::new(CalibrationConfig::default());
        let report = calibrator.analyze(&perfectly_calibrated(20));
        assert_eq!(report.diagnosis, Diagnosis::WellCalibrated);
        assert!(report.weighted_gap < 0.05);
        // Brier for a perfectly calibrated forecaster is mean p(1-p).
        let expected: f64 =
            (0..10).map(|k| {
                let p = 0.05 + 0.1 * k as f64;
                p * (1.0 - p)
            }).sum::<f64>() / 10.0;
        assert!((report.brier.unwrap() - expected).abs() < 0.01);
    }

    #[test]
    fn test_overconfident_data() {
        // Predicts 90% but only 60% resolve YES.
        let mut points = Vec::new();
        for i in 0..50 {
            points.push(point(0.9, i % 5 < 3));
        }
        let calibrator = Calibrator::new(CalibrationConfig::default());
        let report = calibrator.analyze(&points);
        assert_eq!(report.diagnosis, Diagnosis::OverConfident);
        let sports = &report.categories[0];
        assert_eq!(sports.category, MarketCategory::Sports);
        assert!(sports.threshold_adjustment > 1.0);
    }

    #[test]
    fn test_underconfident_data() {
        // Predicts 60% but 95% resolve YES.
        let mut points = Vec::new();
        for i in 0..40 {
            points.push(point(0.6, i % 20 != 0));
        }
        let calibrator = Calibrator::new(CalibrationConfig::default());
        let report = calibrator.analyze(&points);
        assert_eq!(report.diagnosis, Diagnosis::UnderConfident);
        assert!(report.categories[0].threshold_adjustment < 1.0);
    }

    #[test]
    fn test_insufficient_data() {
        let calibrator = Calibrator::new(CalibrationConfig::default());
        let report = calibrator.analyze(&[point(0.9, true), point(0.2, false)]);
        assert_eq!(report.diagnosis, Diagnosis::InsufficientData);
        assert_eq!(report.categories[0].threshold_adjustment, 1.0);
    }

    #[test]
    fn test_empty_input() {
        let calibrator = Calibrator::new(CalibrationConfig::default());
        let report = calibrator.analyze(&[]);
        assert_eq!(report.total, 0);
        assert_eq!(report.brier, None);
        assert_eq!(report.diagnosis, Diagnosis::InsufficientData);
        assert!(report.categories.is_empty());
    }

    #[test]
    fn test_unit_probability_lands_in_last_bin() {
        let calibrator = Calibrator::new(CalibrationConfig::default());
        let points: Vec<_> = (0..12).map(|_| point(1.0, true)).collect();
        let report = calibrator.analyze(&points);
        assert_eq!(report.bins[9].count, 12);
        assert_eq!(report.bins[9].observed, 1.0);
        assert_eq!(report.diagnosis, Diagnosis::WellCalibrated);
    }

    #[test]
    fn test_per_category_brier() {
        let mut points: Vec<_> = (0..12).map(|_| point(1.0, true)).collect();
        for _ in 0..12 {
            points.push(CalibrationPoint {
                market_id: "w".to_string(),
                category: MarketCategory::Weather,
                predicted: 0.0,
                outcome: true, // maximally wrong
            });
        }
        let calibrator = Calibrator::new(CalibrationConfig::default());
        let report = calibrator.analyze(&points);
        assert_eq!(report.categories.len(), 2);
        let weather = report
            .categories
            .iter()
            .find(|c| c.category == MarketCategory::Weather)
            .unwrap();
        let sports = report
            .categories
            .iter()
            .find(|c| c.category == MarketCategory::Sports)
            .unwrap();
        assert!((weather.brier - 1.0).abs() < 1e-10);
        assert!(sports.brier < 1e-10);
    }

    #[test]
    fn test_out_of_range_predictions_are_clamped() {
        let calibrator = Calibrator::new(CalibrationConfig::default());
        let points: Vec<_> = (0..12).map(|_| point(1.7, true)).collect();
        let report = calibrator.analyze(&points);
        assert_eq!(report.bins[9].count, 12);
        assert!((report.bins[9].mean_predicted - 1.0).abs() < 1e-10);
    }
}
