//! TTL memoization in front of a slow source.
//!
//! Keyed by the full request (category set, date range, seasonal filter). The
//! engine never sees this layer; staleness is decided here by the TTL alone.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::debug;

use crate::data::source::{SeriesRequest, TimeSeriesSource};
use crate::domain::TimeSeriesPoint;
use crate::error::AppError;

const MAX_ENTRIES: u64 = 256;

pub struct CachedSource<S> {
    inner: S,
    cache: Cache<SeriesRequest, Arc<Vec<TimeSeriesPoint>>>,
}

impl<S: TimeSeriesSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl<S: TimeSeriesSource> TimeSeriesSource for CachedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn load(&self, request: &SeriesRequest) -> Result<Vec<TimeSeriesPoint>, AppError> {
        if let Some(hit) = self.cache.get(request) {
            debug!(source = self.inner.name(), rows = hit.len(), "series cache hit");
            return Ok(hit.as_ref().clone());
        }

        let rows = self.inner.load(request)?;
        self.cache.insert(request.clone(), Arc::new(rows.clone()));
        Ok(rows)
    }
}
