//! Durability of the sled-backed query store across reopen.

use chrono::Utc;
use query_store::{
    LogPosition, NewsFilter, NewsId, NewsProjection, NewsType, QueryStore, SledQueryStore,
    UpsertOutcome, Version,
};

fn projection(id: i64, version: i64, title: &str) -> NewsProjection {
    NewsProjection {
        id: NewsId::new(id),
        version: Version::new(version),
        title: title.to_string(),
        content: "content".to_string(),
        author: "desk".to_string(),
        news_type: NewsType::parse("sports").unwrap(),
        tags: vec!["league".to_string()],
        created_at: Utc::now(),
        published_at: None,
        retired_at: None,
    }
}

#[tokio::test]
async fn documents_and_checkpoint_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("query-db");

    {
        let store = SledQueryStore::open(&path).unwrap();
        store.upsert(projection(1, 1, "kickoff")).await.unwrap();
        store.upsert(projection(1, 2, "final score")).await.unwrap();
        store.upsert(projection(2, 1, "transfer")).await.unwrap();
        store.save_checkpoint(LogPosition::new(3)).await.unwrap();
    }

    let store = SledQueryStore::open(&path).unwrap();
    assert_eq!(store.load_checkpoint().await.unwrap(), LogPosition::new(3));

    let stored = store.get(NewsId::new(1)).await.unwrap().unwrap();
    assert_eq!(stored.title, "final score");
    assert_eq!(stored.version, Version::new(2));

    // Re-delivery after a restart is a no-op.
    let outcome = store.upsert(projection(1, 2, "final score")).await.unwrap();
    assert_eq!(
        outcome,
        UpsertOutcome::Stale {
            current: Version::new(2)
        }
    );

    let sports = store
        .query(&NewsFilter::new().news_type(NewsType::parse("sports").unwrap()))
        .await
        .unwrap();
    assert_eq!(sports.len(), 2);
}

#[tokio::test]
async fn clear_resets_documents_and_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let store = SledQueryStore::open(dir.path().join("query-db")).unwrap();

    store.upsert(projection(1, 1, "a")).await.unwrap();
    store.save_checkpoint(LogPosition::new(1)).await.unwrap();
    store.clear().await.unwrap();

    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(store.load_checkpoint().await.unwrap(), LogPosition::start());
}
