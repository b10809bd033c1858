//! bessaquire - forensic crawler and classification pipeline for
//! battery-storage planning and permitting procedures.
//!
//! For each municipality the pipeline locates three kinds of authoritative
//! sources (council information system, official gazette, municipal
//! website), harvests candidate items, downloads supporting documents,
//! classifies them against a deterministic domain rule system, extracts
//! structured attributes, and rolls repeated procedures up into persistent
//! project entities with a maturity lifecycle.

// Model types use `from_str` methods that return Option<Self>, not
// Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod classify;
pub mod config;
pub mod crawlers;
pub mod discovery;
pub mod entity;
pub mod extract;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod queue;
pub mod repository;
pub mod storage;
pub mod text;
pub mod worker;

pub use config::Settings;
pub use http::HttpContext;
pub use orchestrator::Orchestrator;
pub use worker::Worker;

/// Initialize tracing with env-filter support. Intended for binaries and
/// long-running workers; tests leave this alone.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
