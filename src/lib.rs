//! safedash: a safety-analytics dashboard client.
//!
//! Polls a set of chart resources from an analytics backend, normalizes them
//! into typed chart models and keeps them in per-resource slots; uploads
//! spreadsheets; and streams chat answers and chart insights incrementally.

pub mod analytics;
pub mod backend;
pub mod charts;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod stream;
pub mod web;
