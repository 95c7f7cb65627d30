//! Command side of the news record system.
//!
//! Every change to an article is appended as a new immutable revision keyed
//! by `(id, version)`, guarded by optimistic concurrency. The store's commit
//! log is what the projector tails to keep the query side in sync.

pub mod error;
pub mod feed;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::{LogPosition, NewsId, NewsType, Version};
pub use error::{CommandStoreError, Result};
pub use feed::CommitFeed;
pub use memory::InMemoryCommandStore;
pub use postgres::PostgresCommandStore;
pub use record::{
    CommittedRevision, NewsFields, NewsRecord, RevisionDraft, RevisionKind,
    UnknownRevisionKind, ValidationError,
};
pub use store::{CommandStore, CommandStoreExt};
