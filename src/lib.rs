//! AegisNet Sentinel
//!
//! Client-side core of the AegisNet dashboard: submit network-flow batches or a
//! single flow to the classification service and keep the derived views in sync
//! with the latest result.
//!
//! This library provides:
//! - `csv_ingest`: file validation and CSV preview parsing with a fallback chain
//! - `submission`: per-surface single-flight submit state
//! - `client`: the `Classifier` seam and its HTTP implementation
//! - `result_store`, `chart`, `threat_panel`: the result and its projections
//! - `theme`: persisted neon/magenta theme with timed transitions
//! - `dashboard`: the application controller and its event dispatch table
//! - `runtime`: executes the jobs the dashboard emits
//!
//! Binaries:
//! - `aegisnet-ui`: desktop dashboard

pub mod chart;
pub mod client;
pub mod config;
pub mod csv_ingest;
pub mod dashboard;
pub mod features;
pub mod model;
pub mod result_store;
pub mod runtime;
pub mod submission;
pub mod theme;
pub mod threat_panel;

pub use dashboard::{Command, Dashboard, Event};
pub use model::{AnalysisResult, PredictedLabel, SingleFlowResult, SourceFile, ThreatDetail};
