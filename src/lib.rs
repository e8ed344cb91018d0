//! lotto-oracle: Lotto 6/45 history collector, frequency analyser and
//! combination recommender.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod relay;
pub mod engine;
pub mod analysis;
pub mod strategy;
pub mod dashboard;
