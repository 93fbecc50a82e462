//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - CPI observations and basket weights (`TimeSeriesPoint`, `CategoryWeight`)
//! - engine outputs (`MetricResult`, `ContributionReport`, `InflationSummary`, ...)
//! - user-facing selectors (`ChangePeriod`, `SeasonalFilter`, `AiModel`)

pub mod types;

pub use types::*;
