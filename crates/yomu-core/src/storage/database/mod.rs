mod connection;
mod migrations;
mod schema;

pub use connection::{ConnectionPool, TableChange};
pub use migrations::{get_applied_versions, run_migrations, Migration};
pub use schema::{init_schema, SCHEMA_VERSION};

use std::path::Path;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::{AppConfig, FeedConfig};
use crate::error::{Result, YomuError};
use crate::models::{
    FeedEntryView, FeedSavedSearch, FeedScope, FlatMetadata, NewFeedSavedSearch, NewSavedSearch,
    RaisedSearchMetadata, SavedSearch,
};

use super::repositories::{
    FeedSavedSearchRepository, Repository, SavedSearchRepository, SearchMetadataRepository,
    SqliteFeedSavedSearchRepository, SqliteSavedSearchRepository, SqliteSearchMetadataRepository,
};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// Store for search metadata, saved searches and feeds.
///
/// Every write goes through here and is announced on [`Database::subscribe`]
/// once it is committed.
pub struct Database {
    pool: ConnectionPool,
    feed_limits: FeedConfig,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        Ok(Self {
            pool,
            feed_limits: FeedConfig::default(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self {
            pool,
            feed_limits: FeedConfig::default(),
        })
    }

    /// Open the database file under the configured data directory.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let path = config.database_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::open(&path)?.with_feed_limits(config.feed.clone()))
    }

    pub fn with_feed_limits(mut self, limits: FeedConfig) -> Self {
        self.feed_limits = limits;
        self
    }

    pub fn path(&self) -> Option<&str> {
        self.pool.path()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.pool.subscribe()
    }

    pub fn schema_versions(&self) -> Result<Vec<u32>> {
        let conn = self.pool.get_connection();
        migrations::get_applied_versions(&conn)
    }

    // ─── Metadata ──────────────────────────────────────────

    pub fn save_flat_metadata(&self, flat: &FlatMetadata) -> Result<()> {
        {
            let conn = self.pool.get_connection();
            let repo = SqliteSearchMetadataRepository::new(conn);
            repo.save(flat)?;
        }
        debug!(
            manga_id = flat.manga_id(),
            tags = flat.tags.len(),
            titles = flat.titles.len(),
            "saved metadata"
        );
        self.pool.notify(TableChange::SearchMetadata);
        Ok(())
    }

    pub fn save_metadata<T: RaisedSearchMetadata>(&self, metadata: &T) -> Result<()> {
        self.save_flat_metadata(&metadata.flatten()?)
    }

    pub fn get_flat_metadata(&self, manga_id: i64) -> Result<Option<FlatMetadata>> {
        let conn = self.pool.get_connection();
        let repo = SqliteSearchMetadataRepository::new(conn);
        repo.find_by_id(&manga_id)
    }

    /// Load and raise metadata. A row that no longer decodes as `T` counts as
    /// missing metadata; the caller is expected to fetch it again.
    pub fn get_raised_metadata<T: RaisedSearchMetadata>(&self, manga_id: i64) -> Result<Option<T>> {
        let Some(flat) = self.get_flat_metadata(manga_id)? else {
            return Ok(None);
        };
        match flat.raise::<T>() {
            Ok(raised) => Ok(Some(raised)),
            Err(err @ YomuError::MetadataDecode { .. }) => {
                warn!(
                    manga_id,
                    extra_version = flat.metadata.extra_version,
                    expected_version = T::EXTRA_VERSION,
                    error = %err,
                    "stored metadata is unusable"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn delete_metadata(&self, manga_id: i64) -> Result<()> {
        let deleted = {
            let conn = self.pool.get_connection();
            let repo = SqliteSearchMetadataRepository::new(conn);
            repo.delete(&manga_id)?
        };
        if !deleted {
            return Err(YomuError::MetadataNotFound(manga_id));
        }
        self.pool.notify(TableChange::SearchMetadata);
        Ok(())
    }

    pub fn find_manga_by_indexed_extra(&self, indexed_extra: &str) -> Result<Vec<i64>> {
        let conn = self.pool.get_connection();
        let repo = SqliteSearchMetadataRepository::new(conn);
        repo.find_by_indexed_extra(indexed_extra)
    }

    pub fn find_manga_by_tag(&self, namespace: Option<&str>, name: &str) -> Result<Vec<i64>> {
        let conn = self.pool.get_connection();
        let repo = SqliteSearchMetadataRepository::new(conn);
        repo.find_by_tag(namespace, name)
    }

    pub fn count_metadata(&self) -> Result<usize> {
        let conn = self.pool.get_connection();
        let repo = SqliteSearchMetadataRepository::new(conn);
        repo.count()
    }

    // ─── Saved searches ────────────────────────────────────

    pub fn get_saved_search(&self, id: i64) -> Result<SavedSearch> {
        let conn = self.pool.get_connection();
        let repo = SqliteSavedSearchRepository::new(conn);
        repo.find_by_id(&id)?.ok_or(YomuError::SavedSearchNotFound(id))
    }

    pub fn list_saved_searches(&self, source: i64) -> Result<Vec<SavedSearch>> {
        let conn = self.pool.get_connection();
        let repo = SqliteSavedSearchRepository::new(conn);
        repo.list_by_source(source)
    }

    pub fn list_all_saved_searches(&self) -> Result<Vec<SavedSearch>> {
        let conn = self.pool.get_connection();
        let repo = SqliteSavedSearchRepository::new(conn);
        repo.list_all()
    }

    pub fn count_saved_searches(&self, source: i64) -> Result<usize> {
        let conn = self.pool.get_connection();
        let repo = SqliteSavedSearchRepository::new(conn);
        repo.count_by_source(source)
    }

    pub fn list_saved_searches_in_feed(&self, scope: FeedScope) -> Result<Vec<SavedSearch>> {
        let conn = self.pool.get_connection();
        let repo = SqliteSavedSearchRepository::new(conn);
        match scope {
            FeedScope::Global => repo.list_in_global_feed(),
            FeedScope::Source(source) => repo.list_in_feed_by_source(source),
        }
    }

    pub fn insert_saved_search(&self, search: &NewSavedSearch) -> Result<i64> {
        search.validate()?;
        let id = {
            let conn = self.pool.get_connection();
            let repo = SqliteSavedSearchRepository::new(conn);
            repo.insert(search)?
        };
        debug!(id, source = search.source, name = %search.name, "inserted saved search");
        self.pool.notify(TableChange::SavedSearch);
        Ok(id)
    }

    pub fn insert_saved_searches(&self, searches: &[NewSavedSearch]) -> Result<Vec<i64>> {
        for search in searches {
            search.validate()?;
        }
        let ids = {
            let conn = self.pool.get_connection();
            let repo = SqliteSavedSearchRepository::new(conn);
            repo.insert_all(searches)?
        };
        debug!(count = ids.len(), "inserted saved searches");
        self.pool.notify(TableChange::SavedSearch);
        Ok(ids)
    }

    /// The source of a search that feed entries point at cannot change, since
    /// an entry and its search must share a source.
    pub fn update_saved_search(&self, search: &SavedSearch) -> Result<()> {
        NewSavedSearch {
            source: search.source,
            name: search.name.clone(),
            query: search.query.clone(),
            filters_json: search.filters_json.clone(),
        }
        .validate()?;
        {
            let conn = self.pool.get_connection();
            let repo = SqliteSavedSearchRepository::new(conn);
            let existing = repo
                .find_by_id(&search.id)?
                .ok_or(YomuError::SavedSearchNotFound(search.id))?;
            if existing.source != search.source {
                let referenced = repo.count_feed_references(search.id)?;
                if referenced > 0 {
                    return Err(YomuError::ValidationError(format!(
                        "saved search {} is in {referenced} feed entries of source {}",
                        search.id, existing.source
                    )));
                }
            }
            repo.save(search)?;
        }
        self.pool.notify(TableChange::SavedSearch);
        Ok(())
    }

    /// Feed entries pointing at the search are removed with it.
    pub fn delete_saved_search(&self, id: i64) -> Result<()> {
        let deleted = {
            let conn = self.pool.get_connection();
            let repo = SqliteSavedSearchRepository::new(conn);
            repo.delete(&id)?
        };
        if !deleted {
            return Err(YomuError::SavedSearchNotFound(id));
        }
        debug!(id, "deleted saved search");
        self.pool.notify(TableChange::SavedSearch);
        self.pool.notify(TableChange::FeedSavedSearch);
        Ok(())
    }

    // ─── Feed ──────────────────────────────────────────────

    pub fn get_feed(&self, id: i64) -> Result<FeedSavedSearch> {
        let conn = self.pool.get_connection();
        let repo = SqliteFeedSavedSearchRepository::new(conn);
        repo.find_by_id(&id)?.ok_or(YomuError::FeedNotFound(id))
    }

    pub fn list_feed(&self, scope: FeedScope) -> Result<Vec<FeedEntryView>> {
        let conn = self.pool.get_connection();
        let repo = SqliteFeedSavedSearchRepository::new(conn);
        match scope {
            FeedScope::Global => repo.list_global_with_searches(),
            FeedScope::Source(source) => repo.list_by_source_with_searches(source),
        }
    }

    pub fn count_feed(&self, scope: FeedScope) -> Result<usize> {
        let conn = self.pool.get_connection();
        let repo = SqliteFeedSavedSearchRepository::new(conn);
        match scope {
            FeedScope::Global => repo.count_global(),
            FeedScope::Source(source) => repo.count_by_source(source),
        }
    }

    /// Checked against the saved search it refers to, the entries already in
    /// its feed and the feed limit, under the same lock as the insert.
    pub fn insert_feed(&self, feed: &NewFeedSavedSearch) -> Result<i64> {
        let ids = {
            let conn = self.pool.get_connection();
            let repo = SqliteFeedSavedSearchRepository::new(conn);
            repo.insert_checked(std::slice::from_ref(feed), &self.feed_limits)?
        };
        let id = ids
            .first()
            .copied()
            .ok_or_else(|| YomuError::ValidationError("feed entry was not inserted".to_string()))?;
        debug!(id, source = feed.source, global = feed.global, "inserted feed entry");
        self.pool.notify(TableChange::FeedSavedSearch);
        Ok(id)
    }

    /// All or nothing: one rejected entry rolls back the batch.
    pub fn insert_feeds(&self, feeds: &[NewFeedSavedSearch]) -> Result<Vec<i64>> {
        for (i, feed) in feeds.iter().enumerate() {
            if feeds[..i].contains(feed) {
                return Err(YomuError::ValidationError(
                    "the same search is listed twice".to_string(),
                ));
            }
        }
        let ids = {
            let conn = self.pool.get_connection();
            let repo = SqliteFeedSavedSearchRepository::new(conn);
            repo.insert_checked(feeds, &self.feed_limits)?
        };
        debug!(count = ids.len(), "inserted feed entries");
        self.pool.notify(TableChange::FeedSavedSearch);
        Ok(ids)
    }

    pub fn delete_feed(&self, id: i64) -> Result<()> {
        let deleted = {
            let conn = self.pool.get_connection();
            let repo = SqliteFeedSavedSearchRepository::new(conn);
            repo.delete(&id)?
        };
        if !deleted {
            return Err(YomuError::FeedNotFound(id));
        }
        self.pool.notify(TableChange::FeedSavedSearch);
        Ok(())
    }

    pub fn swap_feed(&self, first: i64, second: i64) -> Result<()> {
        {
            let conn = self.pool.get_connection();
            let repo = SqliteFeedSavedSearchRepository::new(conn);
            repo.swap_order(first, second)?;
        }
        self.pool.notify(TableChange::FeedSavedSearch);
        Ok(())
    }

    pub fn move_feed_to_bottom(&self, id: i64) -> Result<()> {
        {
            let conn = self.pool.get_connection();
            let repo = SqliteFeedSavedSearchRepository::new(conn);
            repo.move_to_bottom(id)?;
        }
        self.pool.notify(TableChange::FeedSavedSearch);
        Ok(())
    }

    pub fn reorder_feed(&self, ids: &[i64]) -> Result<()> {
        {
            let conn = self.pool.get_connection();
            let repo = SqliteFeedSavedSearchRepository::new(conn);
            repo.reorder(ids)?;
        }
        self.pool.notify(TableChange::FeedSavedSearch);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
