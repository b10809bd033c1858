//! Domain models for the crawl pipeline.
//!
//! All identifiers are opaque string tokens (UUIDs in practice); timestamps
//! are UTC. Row types are plain serde structs so that persistence backends
//! can map them without further conversion.

mod candidate;
mod job;
mod municipality;
mod procedure;
mod project;
mod source;
mod stats;

pub use candidate::{CandidateStatus, CrawlCandidate, DiscoverySource};
pub use job::{DiscoveryJob, ExtractionJob, JobPayload};
pub use municipality::Municipality;
pub use procedure::{LegalBasis, Procedure, ProcedureType, ProjectComponents};
pub use project::{LinkReason, MaturityStage, ProjectEntity, ProjectLink};
pub use source::{DocumentRecord, SourceRecord};
pub use stats::{CrawlCounts, CrawlStat, PhaseTimings, SourceStatus};
