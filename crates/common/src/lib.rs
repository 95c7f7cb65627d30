//! Identifier types and retry helpers shared by the command and query sides.

pub mod retry;
pub mod types;

pub use retry::{RetryError, RetryPolicy, Transient, retry};
pub use types::{InvalidNewsType, LogPosition, NewsId, NewsType, Version};
