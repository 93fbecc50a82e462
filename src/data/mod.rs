//! Data sources: FRED, CSV-backed, synthetic, and a TTL cache wrapper.

pub mod cache;
pub mod fred;
pub mod sample;
pub mod source;

pub use cache::CachedSource;
pub use fred::FredClient;
pub use sample::SampleSource;
pub use source::{
    SeriesKey, SeriesRequest, StaticSource, TimeSeriesSource, WeightSource, WeightTable, partition_series,
};
