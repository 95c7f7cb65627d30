//! News service facade.
//!
//! [`NewsService`] is the only entry point callers need: writes are appended
//! to the command store as new revisions, reads are served from the query
//! store. The facade never writes to the query store; the projector does.

pub mod config;
pub mod error;
pub mod patch;
pub mod service;

pub use command_store::{NewsFields, NewsRecord, ValidationError};
pub use common::{NewsId, NewsType, RetryPolicy, Version};
pub use config::ServiceConfig;
pub use error::{NewsError, Result};
pub use patch::NewsPatch;
pub use query_store::{NewsFilter, NewsProjection};
pub use service::{Created, NewsService};
