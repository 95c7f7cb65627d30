use chrono::{DateTime, Utc};

use crate::{NewsProjection, NewsType};

/// Builder for constructing projection queries.
///
/// Allows filtering projections by news type, author, tag, publication
/// state and publication time. Results are ordered by id.
#[derive(Debug, Clone, Default)]
pub struct NewsFilter {
    /// Filter by news type.
    pub news_type: Option<NewsType>,

    /// Filter by exact author.
    pub author: Option<String>,

    /// Filter by projections carrying this tag.
    pub tag: Option<String>,

    /// `Some(true)` keeps only published articles, `Some(false)` only drafts.
    pub published: Option<bool>,

    /// Whether retired (tombstoned) articles are returned.
    pub include_retired: bool,

    /// Filter by articles published at or after this time.
    pub published_from: Option<DateTime<Utc>>,

    /// Filter by articles published at or before this time.
    pub published_to: Option<DateTime<Utc>>,

    /// Maximum number of projections to return.
    pub limit: Option<usize>,

    /// Number of projections to skip.
    pub offset: Option<usize>,
}

impl NewsFilter {
    /// Creates a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn news_type(mut self, news_type: NewsType) -> Self {
        self.news_type = Some(news_type);
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Keeps only published articles.
    pub fn published_only(mut self) -> Self {
        self.published = Some(true);
        self
    }

    /// Keeps only unpublished articles.
    pub fn drafts_only(mut self) -> Self {
        self.published = Some(false);
        self
    }

    pub fn include_retired(mut self) -> Self {
        self.include_retired = true;
        self
    }

    pub fn published_from(mut self, from: DateTime<Utc>) -> Self {
        self.published_from = Some(from);
        self
    }

    pub fn published_to(mut self, to: DateTime<Utc>) -> Self {
        self.published_to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the projection satisfies every criterion (paging aside).
    pub fn matches(&self, projection: &NewsProjection) -> bool {
        if !self.include_retired && projection.is_retired() {
            return false;
        }
        if let Some(ref news_type) = self.news_type
            && &projection.news_type != news_type
        {
            return false;
        }
        if let Some(ref author) = self.author
            && &projection.author != author
        {
            return false;
        }
        if let Some(ref tag) = self.tag
            && !projection.tags.contains(tag)
        {
            return false;
        }
        if let Some(published) = self.published
            && projection.is_published() != published
        {
            return false;
        }
        if self.published_from.is_some() || self.published_to.is_some() {
            let Some(published_at) = projection.published_at else {
                return false;
            };
            if let Some(from) = self.published_from
                && published_at < from
            {
                return false;
            }
            if let Some(to) = self.published_to
                && published_at > to
            {
                return false;
            }
        }
        true
    }

    /// Filters, orders by id and pages an iterator of projections.
    pub fn apply<I>(&self, projections: I) -> Vec<NewsProjection>
    where
        I: IntoIterator<Item = NewsProjection>,
    {
        let mut matched: Vec<_> = projections
            .into_iter()
            .filter(|p| self.matches(p))
            .collect();
        matched.sort_by_key(|p| p.id);

        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        matched.into_iter().skip(offset).take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::fixtures::projection;
    use chrono::Duration;

    #[test]
    fn empty_filter_hides_only_retired() {
        let live = projection(1, 1, "live");
        let mut retired = projection(2, 3, "gone");
        retired.retired_at = Some(Utc::now());

        let filter = NewsFilter::new();
        assert!(filter.matches(&live));
        assert!(!filter.matches(&retired));
        assert!(NewsFilter::new().include_retired().matches(&retired));
    }

    #[test]
    fn filters_by_type_author_and_tag() {
        let mut p = projection(1, 1, "t");
        p.author = "ana".into();
        p.tags = vec!["election".into()];

        assert!(NewsFilter::new().author("ana").tag("election").matches(&p));
        assert!(!NewsFilter::new().author("bob").matches(&p));
        assert!(!NewsFilter::new().tag("football").matches(&p));
        assert!(
            !NewsFilter::new()
                .news_type(NewsType::parse("sports").unwrap())
                .matches(&p)
        );
    }

    #[test]
    fn publication_window_excludes_drafts() {
        let now = Utc::now();
        let draft = projection(1, 1, "draft");
        let mut published = projection(2, 2, "out");
        published.published_at = Some(now);

        let window = NewsFilter::new()
            .published_from(now - Duration::hours(1))
            .published_to(now + Duration::hours(1));
        assert!(!window.matches(&draft));
        assert!(window.matches(&published));

        assert!(NewsFilter::new().published_only().matches(&published));
        assert!(NewsFilter::new().drafts_only().matches(&draft));
        assert!(!NewsFilter::new().drafts_only().matches(&published));
    }

    #[test]
    fn apply_orders_and_pages() {
        let items = vec![
            projection(3, 1, "c"),
            projection(1, 1, "a"),
            projection(2, 1, "b"),
        ];
        let page = NewsFilter::new().offset(1).limit(1).apply(items);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "b");
    }
}
