//! Data models for receipts, validation results and configuration.

pub mod config;
pub mod metrics;
pub mod receipt;
pub mod validation;
