//! Reporting: plain-text tables for metrics, contributions and narratives.

pub mod format;

pub use format::*;
