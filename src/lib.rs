//! Growth analytics engine: time-series aggregation, momentum and fan-value
//! scoring, revenue forecasting, release-date planning, alert rules and
//! next-best actions for tracked artists.
//!
//! The scorers in [`aggregator`], [`scorer`], [`alerts`] and [`actions`] are
//! pure functions over in-memory data. [`db`], [`state`] and [`runner`] host
//! them as a periodic SQLite-backed service.

pub mod actions;
pub mod aggregator;
pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod runner;
pub mod scorer;
pub mod state;
pub mod types;
