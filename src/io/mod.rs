//! Input/output helpers.
//!
//! - CSV ingest of levels and weights (`ingest`)
//! - CSV exports of levels, change tables and contributions (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
