use std::sync::Barrier;
use std::thread;

use super::*;
use crate::models::{
    EHentaiSearchMetadata, MangaDexSearchMetadata, NHentaiSearchMetadata, RaisedTag,
};

fn db() -> Database {
    Database::open_in_memory().unwrap()
}

fn search(db: &Database, source: i64, name: &str) -> i64 {
    db.insert_saved_search(&NewSavedSearch::new(source, name).with_query(name))
        .unwrap()
}

fn feed_ids(db: &Database, scope: FeedScope) -> Vec<i64> {
    db.list_feed(scope)
        .unwrap()
        .into_iter()
        .map(|v| v.feed.id)
        .collect()
}

fn gallery(manga_id: i64, gid: &str) -> EHentaiSearchMetadata {
    let mut meta = EHentaiSearchMetadata::new(manga_id, gid, "token", true);
    meta.set_title(Some(format!("Gallery {gid}")));
    meta.base.tags = vec![
        RaisedTag::new(Some("female"), "glasses", EHentaiSearchMetadata::TAG_TYPE_NORMAL),
        RaisedTag::new(Some("language"), "english", EHentaiSearchMetadata::TAG_TYPE_NORMAL),
    ];
    meta.average_rating = Some(4.25);
    meta
}

#[test]
fn test_open_in_memory() {
    let db = db();
    assert_eq!(db.schema_versions().unwrap(), vec![1, 2, 3]);
    assert_eq!(db.count_metadata().unwrap(), 0);
    assert!(db.path().is_none());
}

#[test]
fn test_reopen_file_keeps_rows() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("yomu.db");
    {
        let db = Database::open(&path).unwrap();
        search(&db, 1, "kept");
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(db.list_saved_searches(1).unwrap()[0].name, "kept");
}

#[test]
fn test_from_config_creates_data_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.set_data_dir(dir.path().join("nested").join("data"));
    config.feed.max_global_entries = 1;

    let db = Database::from_config(&config).unwrap();
    assert!(config.database_path().exists());

    db.insert_feed(&NewFeedSavedSearch::global(1, None)).unwrap();
    let err = db.insert_feed(&NewFeedSavedSearch::global(2, None)).unwrap_err();
    assert!(matches!(err, YomuError::FeedLimitReached { limit: 1 }));
}

// ─── Saved searches ───────────────────────────────────────

#[test]
fn test_saved_search_crud() {
    let db = db();
    let id = db
        .insert_saved_search(
            &NewSavedSearch::new(10, "Popular english")
                .with_query("language:english")
                .with_filters(r#"[{"name":"Sort","state":2}]"#),
        )
        .unwrap();

    let mut stored = db.get_saved_search(id).unwrap();
    assert_eq!(stored.source, 10);
    assert_eq!(stored.query.as_deref(), Some("language:english"));

    stored.name = "Renamed".to_string();
    db.update_saved_search(&stored).unwrap();
    assert_eq!(db.get_saved_search(id).unwrap().name, "Renamed");

    db.delete_saved_search(id).unwrap();
    assert!(matches!(
        db.get_saved_search(id),
        Err(YomuError::SavedSearchNotFound(_))
    ));
}

#[test]
fn test_saved_search_by_source_and_count() {
    let db = db();
    search(&db, 1, "beta");
    search(&db, 1, "Alpha");
    search(&db, 2, "other");

    let names: Vec<String> = db
        .list_saved_searches(1)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Alpha", "beta"]);
    assert_eq!(db.count_saved_searches(1).unwrap(), 2);
    assert_eq!(db.count_saved_searches(3).unwrap(), 0);
    assert_eq!(db.list_all_saved_searches().unwrap().len(), 3);
}

#[test]
fn test_insert_all_is_atomic() {
    let db = db();
    let ids = db
        .insert_saved_searches(&[NewSavedSearch::new(1, "a"), NewSavedSearch::new(1, "b")])
        .unwrap();
    assert_eq!(ids.len(), 2);

    let err = db
        .insert_saved_searches(&[NewSavedSearch::new(1, "c"), NewSavedSearch::new(1, "")])
        .unwrap_err();
    assert!(matches!(err, YomuError::ValidationError(_)));
    assert_eq!(db.count_saved_searches(1).unwrap(), 2);
}

#[test]
fn test_update_or_delete_missing_saved_search() {
    let db = db();
    let ghost = SavedSearch {
        id: 99,
        source: 1,
        name: "ghost".to_string(),
        query: None,
        filters_json: None,
    };
    assert!(matches!(
        db.update_saved_search(&ghost),
        Err(YomuError::SavedSearchNotFound(99))
    ));
    assert!(db.delete_saved_search(99).unwrap_err().is_not_found());
}

#[test]
fn test_source_of_search_in_feed_is_fixed() {
    let db = db();
    let s = search(&db, 1, "followed");
    let entry = db.insert_feed(&NewFeedSavedSearch::for_source(1, Some(s))).unwrap();

    let mut moved = db.get_saved_search(s).unwrap();
    moved.source = 2;
    assert!(matches!(
        db.update_saved_search(&moved),
        Err(YomuError::ValidationError(_))
    ));
    assert_eq!(db.get_saved_search(s).unwrap().source, 1);

    // Other fields can still change, and the source once the feed lets go.
    let mut renamed = db.get_saved_search(s).unwrap();
    renamed.name = "renamed".to_string();
    db.update_saved_search(&renamed).unwrap();

    db.delete_feed(entry).unwrap();
    db.update_saved_search(&moved).unwrap();
    assert_eq!(db.get_saved_search(s).unwrap().source, 2);
}

// ─── Feed ─────────────────────────────────────────────────

#[test]
fn test_feed_entries_append_in_their_own_list() {
    let db = db();
    let s1 = search(&db, 1, "one");
    let s2 = search(&db, 2, "two");

    let g1 = db.insert_feed(&NewFeedSavedSearch::global(1, Some(s1))).unwrap();
    let l1 = db.insert_feed(&NewFeedSavedSearch::for_source(1, None)).unwrap();
    let g2 = db.insert_feed(&NewFeedSavedSearch::global(2, Some(s2))).unwrap();
    let l2 = db.insert_feed(&NewFeedSavedSearch::for_source(1, Some(s1))).unwrap();

    assert_eq!(feed_ids(&db, FeedScope::Global), vec![g1, g2]);
    assert_eq!(feed_ids(&db, FeedScope::Source(1)), vec![l1, l2]);
    assert!(feed_ids(&db, FeedScope::Source(2)).is_empty());
    assert_eq!(db.count_feed(FeedScope::Global).unwrap(), 2);

    let view = db.list_feed(FeedScope::Global).unwrap();
    assert_eq!(view[0].display_name(), "one");
    let local = db.list_feed(FeedScope::Source(1)).unwrap();
    assert_eq!(local[0].display_name(), "Latest");

    let in_feed = db.list_saved_searches_in_feed(FeedScope::Source(1)).unwrap();
    assert_eq!(in_feed.len(), 1);
    assert_eq!(in_feed[0].id, s1);
}

#[test]
fn test_deleting_saved_search_cascades_to_feed() {
    let db = db();
    let s = search(&db, 1, "cascade");
    let feed = db.insert_feed(&NewFeedSavedSearch::global(1, Some(s))).unwrap();
    let latest = db.insert_feed(&NewFeedSavedSearch::global(1, None)).unwrap();

    db.delete_saved_search(s).unwrap();

    assert!(matches!(db.get_feed(feed), Err(YomuError::FeedNotFound(_))));
    assert_eq!(feed_ids(&db, FeedScope::Global), vec![latest]);
}

#[test]
fn test_feed_rejects_bad_references() {
    let db = db();
    let s = search(&db, 1, "mine");

    assert!(matches!(
        db.insert_feed(&NewFeedSavedSearch::global(1, Some(404))),
        Err(YomuError::SavedSearchNotFound(404))
    ));
    assert!(matches!(
        db.insert_feed(&NewFeedSavedSearch::global(2, Some(s))),
        Err(YomuError::ValidationError(_))
    ));

    db.insert_feed(&NewFeedSavedSearch::global(1, Some(s))).unwrap();
    assert!(matches!(
        db.insert_feed(&NewFeedSavedSearch::global(1, Some(s))),
        Err(YomuError::ValidationError(_))
    ));
    db.insert_feed(&NewFeedSavedSearch::for_source(1, Some(s))).unwrap();
}

#[test]
fn test_feed_limit_per_scope() {
    let db = db().with_feed_limits(FeedConfig {
        max_global_entries: 2,
        max_source_entries: 1,
    });
    db.insert_feed(&NewFeedSavedSearch::global(1, None)).unwrap();
    db.insert_feed(&NewFeedSavedSearch::global(2, None)).unwrap();
    assert!(matches!(
        db.insert_feed(&NewFeedSavedSearch::global(3, None)),
        Err(YomuError::FeedLimitReached { limit: 2 })
    ));

    db.insert_feed(&NewFeedSavedSearch::for_source(1, None)).unwrap();
    db.insert_feed(&NewFeedSavedSearch::for_source(2, None)).unwrap();
    let s = search(&db, 1, "x");
    assert!(matches!(
        db.insert_feed(&NewFeedSavedSearch::for_source(1, Some(s))),
        Err(YomuError::FeedLimitReached { limit: 1 })
    ));
}

#[test]
fn test_insert_feeds_batch_checks() {
    let db = db().with_feed_limits(FeedConfig {
        max_global_entries: 2,
        max_source_entries: 5,
    });
    let err = db
        .insert_feeds(&[
            NewFeedSavedSearch::global(1, None),
            NewFeedSavedSearch::global(2, None),
            NewFeedSavedSearch::global(3, None),
        ])
        .unwrap_err();
    assert!(matches!(err, YomuError::FeedLimitReached { limit: 2 }));
    assert_eq!(db.count_feed(FeedScope::Global).unwrap(), 0);

    let err = db
        .insert_feeds(&[
            NewFeedSavedSearch::for_source(1, None),
            NewFeedSavedSearch::for_source(1, None),
        ])
        .unwrap_err();
    assert!(matches!(err, YomuError::ValidationError(_)));

    let ids = db
        .insert_feeds(&[
            NewFeedSavedSearch::global(1, None),
            NewFeedSavedSearch::for_source(1, None),
        ])
        .unwrap();
    assert_eq!(ids.len(), 2);
}

#[test]
fn test_swap_and_move_to_bottom() {
    let db = db();
    let ids: Vec<i64> = (1..=4)
        .map(|source| db.insert_feed(&NewFeedSavedSearch::global(source, None)).unwrap())
        .collect();

    db.swap_feed(ids[0], ids[2]).unwrap();
    assert_eq!(feed_ids(&db, FeedScope::Global), vec![ids[2], ids[1], ids[0], ids[3]]);

    db.move_feed_to_bottom(ids[2]).unwrap();
    assert_eq!(feed_ids(&db, FeedScope::Global), vec![ids[1], ids[0], ids[3], ids[2]]);

    // Already last.
    db.move_feed_to_bottom(ids[2]).unwrap();
    assert_eq!(feed_ids(&db, FeedScope::Global), vec![ids[1], ids[0], ids[3], ids[2]]);
}

#[test]
fn test_swap_across_feeds_rejected() {
    let db = db();
    let global = db.insert_feed(&NewFeedSavedSearch::global(1, None)).unwrap();
    let local = db.insert_feed(&NewFeedSavedSearch::for_source(1, None)).unwrap();
    assert!(matches!(
        db.swap_feed(global, local),
        Err(YomuError::ValidationError(_))
    ));
    assert!(matches!(db.swap_feed(global, 77), Err(YomuError::FeedNotFound(77))));
}

#[test]
fn test_reorder_reuses_positions() {
    let db = db();
    let ids: Vec<i64> = (1..=5)
        .map(|source| db.insert_feed(&NewFeedSavedSearch::global(source, None)).unwrap())
        .collect();

    // Reverse the middle three, the ends stay put.
    db.reorder_feed(&[ids[3], ids[2], ids[1]]).unwrap();
    assert_eq!(
        feed_ids(&db, FeedScope::Global),
        vec![ids[0], ids[3], ids[2], ids[1], ids[4]]
    );

    assert!(matches!(
        db.reorder_feed(&[ids[0], ids[0]]),
        Err(YomuError::ValidationError(_))
    ));
}

#[test]
fn test_reordering_keeps_untouched_entries_in_order() {
    let db = db();
    let ids: Vec<i64> = (1..=6)
        .map(|source| db.insert_feed(&NewFeedSavedSearch::global(source, None)).unwrap())
        .collect();

    let ops: Vec<(&str, Vec<i64>)> = vec![
        ("swap", vec![ids[0], ids[5]]),
        ("bottom", vec![ids[2]]),
        ("swap", vec![ids[1], ids[3]]),
        ("reorder", vec![ids[4], ids[0]]),
        ("bottom", vec![ids[5]]),
        ("reorder", vec![ids[2], ids[1], ids[3]]),
    ];

    for (op, touched) in ops {
        let before = feed_ids(&db, FeedScope::Global);
        match op {
            "swap" => db.swap_feed(touched[0], touched[1]).unwrap(),
            "bottom" => db.move_feed_to_bottom(touched[0]).unwrap(),
            _ => db.reorder_feed(&touched).unwrap(),
        }
        let after = feed_ids(&db, FeedScope::Global);

        assert_eq!(after.len(), before.len());
        let untouched = |order: &[i64]| -> Vec<i64> {
            order.iter().copied().filter(|id| !touched.contains(id)).collect()
        };
        assert_eq!(untouched(&before), untouched(&after), "after {op} {touched:?}");
    }
}

/// Give entries of the global list the same order, bypassing the store.
fn tie_orders(db: &Database, ids: &[i64], order: i64) {
    let repo = SqliteFeedSavedSearchRepository::new(db.pool.get_connection());
    for &id in ids {
        let mut feed = repo.find_by_id(&id).unwrap().unwrap();
        feed.feed_order = order;
        repo.save(&feed).unwrap();
    }
}

#[test]
fn test_swap_entries_sharing_an_order() {
    let db = db();
    let ids: Vec<i64> = (1..=3)
        .map(|source| db.insert_feed(&NewFeedSavedSearch::global(source, None)).unwrap())
        .collect();
    tie_orders(&db, &[ids[0], ids[1]], 0);
    assert_eq!(feed_ids(&db, FeedScope::Global), ids);

    db.swap_feed(ids[0], ids[1]).unwrap();
    assert_eq!(feed_ids(&db, FeedScope::Global), vec![ids[1], ids[0], ids[2]]);
}

#[test]
fn test_reorder_entries_sharing_an_order() {
    let db = db();
    let ids: Vec<i64> = (1..=4)
        .map(|source| db.insert_feed(&NewFeedSavedSearch::global(source, None)).unwrap())
        .collect();
    tie_orders(&db, &ids[1..3], 5);
    assert_eq!(feed_ids(&db, FeedScope::Global), vec![ids[0], ids[3], ids[1], ids[2]]);

    db.reorder_feed(&[ids[2], ids[1]]).unwrap();
    assert_eq!(feed_ids(&db, FeedScope::Global), vec![ids[0], ids[3], ids[2], ids[1]]);
}

/// Run `insert` for each entry on its own thread, all released at once.
fn insert_concurrently(db: &Database, feeds: &[NewFeedSavedSearch]) -> Vec<Result<i64>> {
    let barrier = Barrier::new(feeds.len());
    thread::scope(|scope| {
        let handles: Vec<_> = feeds
            .iter()
            .map(|feed| {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    db.insert_feed(feed)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn test_concurrent_inserts_respect_limit() {
    for _ in 0..50 {
        let db = db().with_feed_limits(FeedConfig {
            max_global_entries: 1,
            max_source_entries: 20,
        });
        let results = insert_concurrently(
            &db,
            &[NewFeedSavedSearch::global(1, None), NewFeedSavedSearch::global(2, None)],
        );
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(YomuError::FeedLimitReached { limit: 1 }))));
        assert_eq!(db.count_feed(FeedScope::Global).unwrap(), 1);
    }
}

#[test]
fn test_concurrent_duplicate_inserts() {
    for _ in 0..50 {
        let db = db();
        let entry = NewFeedSavedSearch::global(1, None);
        let results = insert_concurrently(&db, &[entry.clone(), entry.clone(), entry]);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(db.count_feed(FeedScope::Global).unwrap(), 1);
    }
}

// ─── Metadata ─────────────────────────────────────────────

#[test]
fn test_metadata_roundtrip_through_store() {
    let db = db();
    let meta = gallery(1, "100");
    db.save_metadata(&meta).unwrap();

    let raised: EHentaiSearchMetadata = db.get_raised_metadata(1).unwrap().unwrap();
    assert_eq!(raised, meta);

    let flat = db.get_flat_metadata(1).unwrap().unwrap();
    assert!(flat.tags.iter().all(|t| t.id.is_some()));
    assert_eq!(flat.metadata.extra_version, EHentaiSearchMetadata::EXTRA_VERSION);
}

#[test]
fn test_save_replaces_tags_and_titles() {
    let db = db();
    let mut meta = gallery(1, "100");
    db.save_metadata(&meta).unwrap();

    meta.base.tags.truncate(1);
    meta.set_title(Some("Renamed".to_string()));
    db.save_metadata(&meta).unwrap();

    let flat = db.get_flat_metadata(1).unwrap().unwrap();
    assert_eq!(flat.tags.len(), 1);
    assert_eq!(flat.titles.len(), 1);
    assert_eq!(flat.titles[0].title, "Renamed");
    assert_eq!(db.count_metadata().unwrap(), 1);
}

#[test]
fn test_wrong_type_reads_as_unavailable() {
    let db = db();
    db.save_metadata(&gallery(1, "100")).unwrap();

    assert!(db.get_raised_metadata::<MangaDexSearchMetadata>(1).unwrap().is_none());
    assert!(db.get_raised_metadata::<NHentaiSearchMetadata>(1).unwrap().is_none());
    assert!(db.get_raised_metadata::<EHentaiSearchMetadata>(2).unwrap().is_none());
}

#[test]
fn test_delete_metadata_cascades() {
    let db = db();
    db.save_metadata(&gallery(1, "100")).unwrap();
    db.delete_metadata(1).unwrap();

    assert!(db.get_flat_metadata(1).unwrap().is_none());
    assert!(db.find_manga_by_tag(Some("female"), "glasses").unwrap().is_empty());
    assert!(matches!(
        db.delete_metadata(1),
        Err(YomuError::MetadataNotFound(1))
    ));
}

#[test]
fn test_lookups() {
    let db = db();
    db.save_metadata(&gallery(1, "100")).unwrap();
    db.save_metadata(&gallery(2, "200")).unwrap();
    let mut md = MangaDexSearchMetadata::new(3, "uuid-3");
    md.base.tags = vec![RaisedTag::new(None, "glasses", 0)];
    db.save_metadata(&md).unwrap();

    assert_eq!(db.find_manga_by_indexed_extra("200").unwrap(), vec![2]);
    assert_eq!(db.find_manga_by_indexed_extra("uuid-3").unwrap(), vec![3]);
    assert_eq!(db.find_manga_by_tag(Some("female"), "glasses").unwrap(), vec![1, 2]);
    assert_eq!(db.find_manga_by_tag(None, "glasses").unwrap(), vec![3]);
}

// ─── Change notification ──────────────────────────────────

#[test]
fn test_writes_are_announced() {
    let db = db();
    let mut rx = db.subscribe();

    let s = search(&db, 1, "watched");
    assert_eq!(rx.try_recv().unwrap(), TableChange::SavedSearch);

    db.insert_feed(&NewFeedSavedSearch::global(1, Some(s))).unwrap();
    assert_eq!(rx.try_recv().unwrap(), TableChange::FeedSavedSearch);

    db.delete_saved_search(s).unwrap();
    assert_eq!(rx.try_recv().unwrap(), TableChange::SavedSearch);
    assert_eq!(rx.try_recv().unwrap(), TableChange::FeedSavedSearch);

    // Reads and failed writes stay quiet.
    db.list_all_saved_searches().unwrap();
    assert!(db.delete_feed(12345).is_err());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_subscriber_receives_metadata_change() {
    let db = db();
    let mut rx = db.subscribe();
    db.save_metadata(&gallery(9, "900")).unwrap();
    assert_eq!(rx.recv().await.unwrap(), TableChange::SearchMetadata);
}
