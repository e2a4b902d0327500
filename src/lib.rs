//! Workforce Sync: identity reconciliation and batch synchronization
//!
//! This crate reconciles employee, schedule, absence and payroll data from an
//! external scheduling platform and a payroll platform into one record store.
//! Spreadsheet imports are mapped and validated before they are written;
//! sync jobs pull the scheduling API with bounded lookback windows; both
//! write through the same chunked batch reconciler. Data quality rules and
//! alert thresholds are evaluated over the converged store.

#![warn(missing_docs)]

pub mod alerts;
pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod quality;
pub mod reconcile;
pub mod store;
pub mod sync;
