//! Inflation metrics engine.
//!
//! Every function here is pure: it takes fully materialized series and returns
//! values. No I/O, no caching, no shared state. Callers may run categories in
//! parallel; nothing here synchronizes.
//!
//! - percentage changes (`change`)
//! - rolling averages of changes (`average`)
//! - weighted contributions + reconciliation (`contribution`)
//! - latest-point headline metrics (`summary`)

pub mod average;
pub mod change;
pub mod contribution;
pub mod summary;


pub use average::compute_average_change;
pub use change::{change_at, compute_change_series, compute_metric_table, validate_series};
pub use contribution::{DEFAULT_TOLERANCE, compute_contribution, contribution_history, ensure_history_span};
pub use summary::summarize_series;
