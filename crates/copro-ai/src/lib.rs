//! Core library for the co-ownership disclosure service.
//!
//! The interesting machinery lives in [`workflows::analysis`]: the pipeline
//! that classifies uploaded co-ownership documents, runs one batched AI
//! extraction over them, reconciles the financial figures, and persists the
//! normalized dossier record.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
