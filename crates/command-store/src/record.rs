use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{LogPosition, NewsId, NewsType, Version};

/// Maximum title length, in characters.
pub const TITLE_MAX_LEN: usize = 200;
/// Maximum author length, in characters.
pub const AUTHOR_MAX_LEN: usize = 50;
/// Maximum length of a single tag, in characters.
pub const TAG_MAX_LEN: usize = 50;

/// Descriptive attributes of a news article supplied by writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsFields {
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewsFields {
    /// Creates fields with no tags.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author: author.into(),
            tags: Vec::new(),
        }
    }

    /// Replaces the tag list.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Checks the length and presence rules of every attribute.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_bounded("title", &self.title, TITLE_MAX_LEN)?;
        if self.content.trim().is_empty() {
            return Err(ValidationError::Empty { field: "content" });
        }
        check_bounded("author", &self.author, AUTHOR_MAX_LEN)?;
        for tag in &self.tags {
            check_bounded("tag", tag, TAG_MAX_LEN)?;
        }
        Ok(())
    }
}

fn check_bounded(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, max, len });
    }
    Ok(())
}

/// A field of a news write failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is {len} characters long, at most {max} are allowed")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },
}

/// What a revision did to the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Created,
    Updated,
    Published,
    /// Tombstone: the article is logically deleted from here on.
    Retired,
}

impl RevisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Published => "published",
            Self::Retired => "retired",
        }
    }
}

impl std::fmt::Display for RevisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored revision kind name that is not one of [`RevisionKind`]'s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown revision kind {0:?}")]
pub struct UnknownRevisionKind(pub String);

impl std::str::FromStr for RevisionKind {
    type Err = UnknownRevisionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "published" => Ok(Self::Published),
            "retired" => Ok(Self::Retired),
            other => Err(UnknownRevisionKind(other.to_string())),
        }
    }
}

/// The full next state of an article, ready to be appended.
///
/// The store stamps id, version and commit time; everything else is
/// decided by the writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionDraft {
    pub kind: RevisionKind,
    pub news_type: NewsType,
    pub fields: NewsFields,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl RevisionDraft {
    /// Draft of the first revision of an article.
    pub fn created(news_type: NewsType, fields: NewsFields, now: DateTime<Utc>) -> Self {
        Self {
            kind: RevisionKind::Created,
            news_type,
            fields,
            created_at: now,
            published_at: None,
            retired_at: None,
        }
    }

    /// Draft carrying the state of `record` forward, to be modified by the caller.
    pub fn following(record: &NewsRecord, kind: RevisionKind) -> Self {
        Self {
            kind,
            news_type: record.news_type.clone(),
            fields: record.fields(),
            created_at: record.created_at,
            published_at: record.published_at,
            retired_at: record.retired_at,
        }
    }
}

/// One committed, immutable revision of a news article.
///
/// `(id, version)` is unique; a new state is always a new row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: NewsId,
    pub version: Version,
    pub kind: RevisionKind,
    pub title: String,
    pub content: String,
    pub author: String,
    pub news_type: NewsType,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub retired_at: Option<DateTime<Utc>>,
    pub committed_at: DateTime<Utc>,
}

impl NewsRecord {
    /// Materializes a draft as the revision `version` of `id`.
    pub fn from_draft(
        id: NewsId,
        version: Version,
        draft: RevisionDraft,
        committed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            version,
            kind: draft.kind,
            title: draft.fields.title,
            content: draft.fields.content,
            author: draft.fields.author,
            news_type: draft.news_type,
            tags: draft.fields.tags,
            created_at: draft.created_at,
            published_at: draft.published_at,
            retired_at: draft.retired_at,
            committed_at,
        }
    }

    /// Returns a copy of the writer-supplied attributes.
    pub fn fields(&self) -> NewsFields {
        NewsFields {
            title: self.title.clone(),
            content: self.content.clone(),
            author: self.author.clone(),
            tags: self.tags.clone(),
        }
    }

    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    pub fn is_retired(&self) -> bool {
        self.retired_at.is_some()
    }
}

/// A revision together with where it sits in the commit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedRevision {
    pub position: LogPosition,
    pub record: NewsRecord,
}
