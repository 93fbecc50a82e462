//! Source abstractions for CPI levels and basket weights.
//!
//! The pipeline never reaches for a global session: every source is passed in
//! explicitly, so tests and the CLI can swap FRED, CSV files or synthetic data.

use std::collections::{BTreeMap, HashMap};

use chrono::{Months, NaiveDate};

use crate::domain::{CategoryWeight, SeasonalFilter, TimeSeriesPoint, month_start};
use crate::error::{AppError, MetricsError};

/// What to load: a category set over an inclusive month range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesRequest {
    pub categories: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub seasonal: SeasonalFilter,
}

impl SeriesRequest {
    pub fn new(categories: Vec<String>, start: NaiveDate, end: NaiveDate, seasonal: SeasonalFilter) -> Self {
        let mut categories = categories;
        categories.sort();
        categories.dedup();
        Self {
            categories,
            start: month_start(start),
            end: month_start(end),
            seasonal,
        }
    }

    /// Same request, starting `months` earlier so lookbacks exist at `start`.
    pub fn with_history(&self, months: u32) -> Self {
        Self {
            start: self.start.checked_sub_months(Months::new(months)).unwrap_or(self.start),
            ..self.clone()
        }
    }

    /// Whether a point falls inside this request.
    pub fn accepts(&self, point: &TimeSeriesPoint) -> bool {
        (self.categories.is_empty() || self.categories.iter().any(|c| c == &point.category_id))
            && point.date >= self.start
            && point.date <= self.end
            && self.seasonal.accepts(point.seasonally_adjusted)
    }
}

/// Supplies CPI observations.
pub trait TimeSeriesSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Rows for the requested categories and range, in any order.
    fn load(&self, request: &SeriesRequest) -> Result<Vec<TimeSeriesPoint>, AppError>;
}

/// Supplies basket weights.
///
/// A category with no weight is a valid answer, not an error.
pub trait WeightSource: Send + Sync {
    fn weights(&self, parent_id: &str) -> Result<HashMap<String, CategoryWeight>, AppError>;
}

/// Weights held in memory (built-in table or loaded from a file).
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    pub rows: Vec<CategoryWeight>,
}

impl WeightTable {
    pub fn new(rows: Vec<CategoryWeight>) -> Self {
        Self { rows }
    }

    /// The built-in relative-importance table.
    pub fn builtin() -> Self {
        let rows = crate::config::CATEGORIES
            .iter()
            .filter_map(|c| {
                let (parent, weight) = c.parent?;
                Some(CategoryWeight {
                    category_id: c.id.to_string(),
                    parent_id: Some(parent.to_string()),
                    weight,
                })
            })
            .collect();
        Self { rows }
    }
}

impl WeightSource for WeightTable {
    fn weights(&self, parent_id: &str) -> Result<HashMap<String, CategoryWeight>, AppError> {
        let mut out = HashMap::new();
        for w in self.rows.iter().filter(|w| w.parent_id.as_deref() == Some(parent_id)) {
            if out.insert(w.category_id.clone(), w.clone()).is_some() {
                return Err(AppError::new(
                    2,
                    format!("Duplicate weight for '{}' under '{parent_id}'.", w.category_id),
                ));
            }
        }
        Ok(out)
    }
}

/// Identifies one series within a loaded data set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub category_id: String,
    pub seasonally_adjusted: bool,
}

/// Group loaded rows into date-sorted per-series vectors.
///
/// Duplicate `(category, date, seasonal flag)` rows are rejected.
pub fn partition_series(
    points: Vec<TimeSeriesPoint>,
) -> Result<BTreeMap<SeriesKey, Vec<TimeSeriesPoint>>, MetricsError> {
    let mut out: BTreeMap<SeriesKey, Vec<TimeSeriesPoint>> = BTreeMap::new();
    for p in points {
        let key = SeriesKey {
            category_id: p.category_id.clone(),
            seasonally_adjusted: p.seasonally_adjusted,
        };
        out.entry(key).or_default().push(p);
    }

    for (key, series) in out.iter_mut() {
        series.sort_by_key(|p| p.date);
        if let Some(w) = series.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(MetricsError::malformed(format!(
                "duplicate observation for '{}' (sa={}) at {}",
                key.category_id, key.seasonally_adjusted, w[0].date
            )));
        }
    }

    Ok(out)
}

/// In-memory source, mostly for tests and pre-loaded data.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub points: Vec<TimeSeriesPoint>,
}

impl TimeSeriesSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn load(&self, request: &SeriesRequest) -> Result<Vec<TimeSeriesPoint>, AppError> {
        Ok(self.points.iter().filter(|p| request.accepts(p)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn request_normalizes_and_extends() {
        let req = SeriesRequest::new(
            vec!["food".into(), "energy".into(), "food".into()],
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            d(2024, 6),
            SeasonalFilter::Adjusted,
        );
        assert_eq!(req.categories, vec!["energy".to_string(), "food".to_string()]);
        assert_eq!(req.start, d(2024, 3));
        assert_eq!(req.with_history(12).start, d(2023, 3));
    }

    #[test]
    fn partition_sorts_and_splits_by_seasonal_flag() {
        let points = vec![
            TimeSeriesPoint::new("food", d(2024, 2), 101.0, true),
            TimeSeriesPoint::new("food", d(2024, 1), 100.0, true),
            TimeSeriesPoint::new("food", d(2024, 1), 99.0, false),
        ];
        let parts = partition_series(points).unwrap();
        assert_eq!(parts.len(), 2);
        let sa = &parts[&SeriesKey {
            category_id: "food".into(),
            seasonally_adjusted: true,
        }];
        assert_eq!(sa[0].date, d(2024, 1));
        assert_eq!(sa[1].date, d(2024, 2));
    }

    #[test]
    fn partition_rejects_duplicates() {
        let points = vec![
            TimeSeriesPoint::new("food", d(2024, 1), 100.0, true),
            TimeSeriesPoint::new("food", d(2024, 1), 100.5, true),
        ];
        assert!(matches!(partition_series(points), Err(MetricsError::MalformedSeries(_))));
    }

    #[test]
    fn weight_table_filters_by_parent() {
        let table = WeightTable::builtin();
        let w = table.weights("all_items").unwrap();
        assert_eq!(w.len(), 4);
        assert!((w["core_services"].weight - 0.58).abs() < 1e-12);
        assert!(table.weights("food").unwrap().is_empty());
    }

    #[test]
    fn duplicate_weights_under_one_parent_are_rejected() {
        let row = |w: f64| CategoryWeight {
            category_id: "food".into(),
            parent_id: Some("all_items".into()),
            weight: w,
        };
        let table = WeightTable::new(vec![row(0.14), row(0.2)]);
        assert_eq!(table.weights("all_items").unwrap_err().exit_code(), 2);
    }

    #[test]
    fn static_source_applies_request() {
        let source = StaticSource {
            points: vec![
                TimeSeriesPoint::new("food", d(2023, 12), 99.0, true),
                TimeSeriesPoint::new("food", d(2024, 1), 100.0, true),
                TimeSeriesPoint::new("food", d(2024, 1), 100.0, false),
                TimeSeriesPoint::new("energy", d(2024, 1), 200.0, true),
            ],
        };
        let req = SeriesRequest::new(vec!["food".into()], d(2024, 1), d(2024, 12), SeasonalFilter::Adjusted);
        let rows = source.load(&req).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 100.0);
    }
}
