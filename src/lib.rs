//! market-dash - query-execution backend for the market analytics dashboard.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod query;
pub mod service;
