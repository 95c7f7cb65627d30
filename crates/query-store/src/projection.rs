//! The denormalized read view of a news article.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{NewsId, NewsType, Version};

/// Current state of one news article as served to readers.
///
/// `version` is the command-side revision this document was derived from.
/// Readers use it to detect staleness; the store uses it to refuse regressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsProjection {
    pub id: NewsId,
    pub version: Version,
    pub title: String,
    pub content: String,
    pub author: String,
    pub news_type: NewsType,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retired_at: Option<DateTime<Utc>>,
}

impl NewsProjection {
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    pub fn is_retired(&self) -> bool {
        self.retired_at.is_some()
    }
}

/// Result of a monotone upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No document existed for the id.
    Inserted,
    /// An older document was replaced.
    Replaced { previous: Version },
    /// The stored document is as new or newer; nothing was written.
    Stale { current: Version },
}

impl UpsertOutcome {
    /// Returns true when the call changed the store.
    pub fn is_applied(&self) -> bool {
        !matches!(self, Self::Stale { .. })
    }
}
