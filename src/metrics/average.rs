//! Rolling average of defined percentage changes.

use crate::domain::MetricResult;
use crate::error::MetricsError;

/// Arithmetic mean of the last `window_months` defined changes in `series`.
///
/// Undefined entries (no base, zero base) are skipped, so the window may reach
/// further back than `window_months` positions.
pub fn compute_average_change(series: &[MetricResult], window_months: usize) -> Result<f64, MetricsError> {
    if window_months == 0 {
        return Err(MetricsError::malformed("average window must be at least one month"));
    }
    if series.windows(2).any(|w| w[1].date <= w[0].date) {
        return Err(MetricsError::malformed("change series dates must be strictly increasing"));
    }

    let defined: Vec<f64> = series.iter().filter_map(|r| r.change.value()).collect();
    if defined.len() < window_months {
        return Err(MetricsError::InsufficientData {
            required: window_months,
            available: defined.len(),
        });
    }

    let tail = &defined[defined.len() - window_months..];
    Ok(tail.iter().sum::<f64>() / window_months as f64)
}
