//! Synthetic CPI levels for offline runs.
//!
//! Each leaf category follows a seeded random walk with an annual drift and a
//! monthly volatility. `all_items` and `core` are built from their components so
//! that contribution breakdowns reconcile the way real aggregates roughly do.
//! Unadjusted variants add a fixed seasonal swing on top of the adjusted level.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, Months, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing::debug;

use crate::config::{CATEGORIES, HEADLINE_CATEGORY, builtin_weights};
use crate::data::source::{SeriesRequest, TimeSeriesSource};
use crate::domain::TimeSeriesPoint;
use crate::error::AppError;

/// Base index level at the first generated month.
const BASE_LEVEL: f64 = 100.0;

/// Peak-to-trough seasonal amplitude for unadjusted series (fraction of level).
const SEASONAL_AMPLITUDE: f64 = 0.004;

/// (annual drift, monthly volatility) per leaf category.
fn dynamics(category_id: &str) -> (f64, f64) {
    match category_id {
        "core_services" => (0.040, 0.0015),
        "core_goods" => (0.005, 0.0030),
        "food" => (0.025, 0.0020),
        "energy" => (0.030, 0.0250),
        "shelter" => (0.050, 0.0012),
        "gasoline" => (0.030, 0.0400),
        "used_vehicles" => (0.010, 0.0120),
        _ => (0.025, 0.0030),
    }
}

#[derive(Debug, Clone)]
pub struct SampleSource {
    pub seed: u64,
}

impl SampleSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn walk(&self, category_id: &str, months: usize) -> Result<Vec<f64>, AppError> {
        let (drift, vol) = dynamics(category_id);
        let mut rng = StdRng::seed_from_u64(category_seed(self.seed, category_id));
        let normal = Normal::new(0.0, vol)
            .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

        let mut levels = Vec::with_capacity(months);
        let mut level = BASE_LEVEL;
        for _ in 0..months {
            levels.push(level);
            let shock: f64 = normal.sample(&mut rng);
            level *= 1.0 + drift / 12.0 + shock;
            level = level.max(1.0);
        }
        Ok(levels)
    }

    /// Seasonally adjusted levels for every catalog category.
    fn adjusted_levels(&self, months: usize) -> Result<HashMap<&'static str, Vec<f64>>, AppError> {
        let headline = builtin_weights(HEADLINE_CATEGORY);
        let mut levels: HashMap<&'static str, Vec<f64>> = HashMap::new();
        for c in CATEGORIES {
            if c.id != HEADLINE_CATEGORY && c.id != "core" {
                levels.insert(c.id, self.walk(c.id, months)?);
            }
        }

        let combine = |parts: &[(&str, f64)], levels: &HashMap<&'static str, Vec<f64>>| -> Vec<f64> {
            let total: f64 = parts.iter().map(|(_, w)| w).sum();
            (0..months)
                .map(|t| {
                    parts
                        .iter()
                        .map(|(id, w)| levels.get(*id).map_or(0.0, |s| s[t]) * w / total)
                        .sum()
                })
                .collect()
        };

        let headline_parts: Vec<(&str, f64)> = headline.iter().map(|(id, w)| (id.as_str(), w.weight)).collect();
        let core_parts: Vec<(&str, f64)> = headline_parts
            .iter()
            .copied()
            .filter(|(id, _)| *id == "core_services" || *id == "core_goods")
            .collect();

        let all_items = combine(&headline_parts, &levels);
        let core = combine(&core_parts, &levels);
        levels.insert(HEADLINE_CATEGORY, all_items);
        levels.insert("core", core);
        Ok(levels)
    }
}

impl TimeSeriesSource for SampleSource {
    fn name(&self) -> &str {
        "sample"
    }

    fn load(&self, request: &SeriesRequest) -> Result<Vec<TimeSeriesPoint>, AppError> {
        if request.end < request.start {
            return Err(AppError::new(2, "End date is before start date."));
        }
        let months = months_between(request.start, request.end) + 1;
        let levels = self.adjusted_levels(months)?;

        let mut out = Vec::new();
        for id in &request.categories {
            let series = levels
                .get(id.as_str())
                .ok_or_else(|| AppError::new(2, format!("Unknown CPI category '{id}'.")))?;
            for &sa in request.seasonal.flags() {
                for (t, &level) in series.iter().enumerate() {
                    let date = request.start + Months::new(t as u32);
                    let value = if sa { level } else { level * seasonal_factor(date) };
                    out.push(TimeSeriesPoint::new(id.as_str(), date, round3(value), sa));
                }
            }
        }

        debug!(seed = self.seed, months, rows = out.len(), "generated sample CPI series");
        Ok(out)
    }
}

fn category_seed(seed: u64, category_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    category_id.hash(&mut hasher);
    hasher.finish()
}

fn seasonal_factor(date: NaiveDate) -> f64 {
    let phase = 2.0 * PI * (date.month0() as f64) / 12.0;
    1.0 + SEASONAL_AMPLITUDE * phase.sin()
}

fn months_between(start: NaiveDate, end: NaiveDate) -> usize {
    let diff = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    diff.max(0) as usize
}

/// Published CPI levels carry three decimals.
fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
