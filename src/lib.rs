//! `cpi-metrics` library crate.
//!
//! The binary (`cpi`) is a thin wrapper around this library so that:
//!
//! - the metrics engine is testable without spawning processes
//! - sources and narrative backends can be swapped behind traits
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod metrics;
pub mod narrative;
pub mod report;
