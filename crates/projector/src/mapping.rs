use command_store::NewsRecord;
use query_store::NewsProjection;

/// Builds the read document for a committed revision.
///
/// The document carries the revision's version so the query store can order
/// writes for the same id.
pub fn to_projection(record: &NewsRecord) -> NewsProjection {
    NewsProjection {
        id: record.id,
        version: record.version,
        title: record.title.clone(),
        content: record.content.clone(),
        author: record.author.clone(),
        news_type: record.news_type.clone(),
        tags: record.tags.clone(),
        created_at: record.created_at,
        published_at: record.published_at,
        retired_at: record.retired_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use command_store::{NewsFields, NewsId, NewsType, RevisionDraft, Version};

    #[test]
    fn projection_mirrors_the_revision() {
        let now = Utc::now();
        let mut draft = RevisionDraft::created(
            NewsType::default(),
            NewsFields::new("Title", "Body", "Author").with_tags(["a", "b"]),
            now,
        );
        draft.published_at = Some(now);
        let record = NewsRecord::from_draft(NewsId::new(7), Version::new(3), draft, now);

        let projection = to_projection(&record);

        assert_eq!(projection.id, NewsId::new(7));
        assert_eq!(projection.version, Version::new(3));
        assert_eq!(projection.title, "Title");
        assert_eq!(projection.tags, vec!["a", "b"]);
        assert!(projection.is_published());
        assert!(!projection.is_retired());
    }
}
