use command_store::NewsFields;
use serde::{Deserialize, Serialize};

/// A partial update of an article's attributes.
///
/// Fields left as `None` keep the value of the revision being updated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl NewsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.author.is_none()
            && self.tags.is_none()
    }

    /// Applies the patch on top of `base`.
    pub fn apply_to(self, base: NewsFields) -> NewsFields {
        NewsFields {
            title: self.title.unwrap_or(base.title),
            content: self.content.unwrap_or(base.content),
            author: self.author.unwrap_or(base.author),
            tags: self.tags.unwrap_or(base.tags),
        }
    }
}
