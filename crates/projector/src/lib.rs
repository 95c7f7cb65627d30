//! Projector for the news record system.
//!
//! The projector tails the command store's commit log and turns every
//! committed revision into a [`query_store::NewsProjection`] upsert. It
//! provides:
//! - [`Projector`]: per-id ordered, idempotent application with a durable checkpoint
//! - [`ProjectorWorker`]: the background loop driving a projector until cancelled
//! - [`to_projection`]: the mapping from a revision to its read document

pub mod error;
pub mod mapping;
pub mod projector;
pub mod worker;

pub use error::{ProjectorError, Result};
pub use mapping::to_projection;
pub use projector::{ApplyOutcome, BatchReport, Projector, ProjectorConfig};
pub use worker::{ProjectorWorker, WorkerConfig};
