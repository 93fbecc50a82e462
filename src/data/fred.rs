//! FRED API integration for BLS CPI-U series.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{Settings, category};
use crate::data::source::{SeriesRequest, TimeSeriesSource};
use crate::domain::TimeSeriesPoint;
use crate::error::AppError;

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

pub struct FredClient {
    client: Client,
    api_key: String,
}

impl FredClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let api_key = settings
            .fred_api_key
            .clone()
            .ok_or_else(|| AppError::new(2, "Missing FRED_API_KEY in environment (.env)."))?;
        Ok(Self::new(api_key))
    }

    /// Monthly observations for one series, ascending by date.
    pub fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, AppError> {
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("series_id", series_id),
                ("api_key", &self.api_key),
                ("file_type", "json"),
                ("sort_order", "asc"),
                ("frequency", "m"),
                ("observation_start", &start.to_string()),
                ("observation_end", &end.to_string()),
            ])
            .send()
            .map_err(|e| AppError::new(4, format!("FRED request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("FRED request for {series_id} failed with status {}.", resp.status()),
            ));
        }

        let body: ObservationsResponse = resp
            .json()
            .map_err(|e| AppError::new(4, format!("Failed to parse FRED response: {e}")))?;

        let obs = parse_observations(body)?;
        debug!(series_id, n = obs.len(), "fetched FRED series");
        Ok(obs)
    }
}

impl TimeSeriesSource for FredClient {
    fn name(&self) -> &str {
        "fred"
    }

    fn load(&self, request: &SeriesRequest) -> Result<Vec<TimeSeriesPoint>, AppError> {
        let mut out = Vec::new();
        for id in &request.categories {
            let info = category(id)
                .ok_or_else(|| AppError::new(2, format!("Unknown CPI category '{id}'.")))?;
            for &sa in request.seasonal.flags() {
                let series_id = info.fred_series(sa);
                let obs = self.fetch_series(series_id, request.start, request.end)?;
                out.extend(
                    obs.into_iter()
                        .map(|(date, value)| TimeSeriesPoint::new(info.id, date, value, sa)),
                );
            }
        }
        info!(
            categories = request.categories.len(),
            rows = out.len(),
            "loaded CPI series from FRED"
        );
        Ok(out)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

fn parse_observations(body: ObservationsResponse) -> Result<Vec<(NaiveDate, f64)>, AppError> {
    let mut out = Vec::with_capacity(body.observations.len());
    for obs in body.observations {
        let Some(value) = parse_value(&obs.value) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d")
            .map_err(|e| AppError::new(4, format!("Invalid FRED date '{}': {e}", obs.date)))?;
        out.push((date, value));
    }
    out.sort_by_key(|(d, _)| *d);
    Ok(out)
}

/// FRED encodes missing observations as ".".
fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed == "." || trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_observations_and_skips_missing() {
        let json = r#"{
            "observations": [
                {"realtime_start": "2024-07-01", "date": "2024-02-01", "value": "310.326"},
                {"realtime_start": "2024-07-01", "date": "2024-01-01", "value": "309.685"},
                {"realtime_start": "2024-07-01", "date": "2024-03-01", "value": "."}
            ]
        }"#;
        let body: ObservationsResponse = serde_json::from_str(json).unwrap();
        let obs = parse_observations(body).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].0, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!((obs[1].1 - 310.326).abs() < 1e-9);
    }

    #[test]
    fn bad_dates_are_source_errors() {
        let json = r#"{"observations": [{"date": "Jan 2024", "value": "1.0"}]}"#;
        let body: ObservationsResponse = serde_json::from_str(json).unwrap();
        let err = parse_observations(body).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn parse_value_rejects_placeholders() {
        assert_eq!(parse_value("."), None);
        assert_eq!(parse_value("  "), None);
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value(" 301.5 "), Some(301.5));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let settings = Settings::default();
        assert_eq!(FredClient::from_settings(&settings).err().map(|e| e.exit_code()), Some(2));
    }
}
