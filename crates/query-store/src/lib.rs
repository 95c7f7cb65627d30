//! Query side of the news record system.
//!
//! This crate provides:
//! - [`NewsProjection`], the denormalized current state of an article
//! - [`QueryStore`] trait with a monotone, idempotent `upsert`
//! - [`NewsFilter`] for searching projections
//! - In-memory and sled-backed store implementations

pub mod error;
pub mod filter;
pub mod memory;
pub mod projection;
pub mod sled_store;
pub mod store;

pub use common::{LogPosition, NewsId, NewsType, Version};
pub use error::{QueryStoreError, Result};
pub use filter::NewsFilter;
pub use memory::InMemoryQueryStore;
pub use projection::{NewsProjection, UpsertOutcome};
pub use sled_store::SledQueryStore;
pub use store::{QueryStore, QueryStoreExt};
