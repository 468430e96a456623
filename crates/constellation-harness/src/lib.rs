//! Campaign tooling around `constellation-core`.
//!
//! This crate provides:
//! - Configuration: environment + CLI resolution of scan and elimination settings
//! - Structured logging: JSONL campaign logs and an artifact index with SHA-256 digests
//! - Report generation: plain, markdown and JSON renderings of derivation and scan results
//! - Campaign runner: derive, scan, checkpoint and log in one place

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod structured_log;

pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use report::{DerivationReport, VerificationReport};
pub use runner::Campaign;
