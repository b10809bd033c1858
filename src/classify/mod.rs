//! Classification: prefilter, candidate gate, relevance rules, typing,
//! confidence, heuristic scores and the container gate.
//!
//! Everything in here is pure and synchronous; the workers call it between
//! their I/O phases.

pub mod classifier;
pub mod container;
pub mod keywords;
pub mod prefilter;
pub mod scoring;

pub use classifier::{classify, is_candidate, Classification};
pub use container::{is_container, validate, SkipReason};
pub use prefilter::{prefilter_score, should_extract};
pub use scoring::{bess_score, grid_score};
