use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::sync::MutexGuard;

use crate::config::FeedConfig;
use crate::error::{Result, YomuError};
use crate::models::{FeedEntryView, FeedSavedSearch, FeedScope, NewFeedSavedSearch, SavedSearch};

use super::Repository;

const COLUMNS: &str = "feed_saved_search._id, feed_saved_search.source, feed_saved_search.saved_search, feed_saved_search.global, feed_saved_search.feed_order";

/// Feed entries live in ordered lists: one global list and one list per
/// source. `feed_order` is only compared within a list and may have gaps.
pub trait FeedSavedSearchRepository: Repository<Entity = FeedSavedSearch, Id = i64> {
    fn list_global(&self) -> Result<Vec<FeedSavedSearch>>;
    fn list_by_source(&self, source: i64) -> Result<Vec<FeedSavedSearch>>;
    fn list_global_with_searches(&self) -> Result<Vec<FeedEntryView>>;
    fn list_by_source_with_searches(&self, source: i64) -> Result<Vec<FeedEntryView>>;
    fn count_global(&self) -> Result<usize>;
    fn count_by_source(&self, source: i64) -> Result<usize>;
    /// An existing entry with the same list, source and saved search.
    fn find_matching(&self, feed: &NewFeedSavedSearch) -> Result<Option<FeedSavedSearch>>;
    /// Append at the bottom of the entry's list.
    fn insert(&self, feed: &NewFeedSavedSearch) -> Result<i64>;
    fn insert_all(&self, feeds: &[NewFeedSavedSearch]) -> Result<Vec<i64>>;
    /// Insert `feeds` in one transaction, rejecting the whole batch if any
    /// entry refers to a missing or foreign saved search, is already in its
    /// list, or would grow its list past `limits`.
    fn insert_checked(&self, feeds: &[NewFeedSavedSearch], limits: &FeedConfig) -> Result<Vec<i64>>;
    /// Exchange the positions of two entries of the same list.
    fn swap_order(&self, first: i64, second: i64) -> Result<()>;
    fn move_to_bottom(&self, id: i64) -> Result<()>;
    /// Put `ids` in the given sequence, reusing the positions they already
    /// occupy. Entries not listed keep their positions.
    fn reorder(&self, ids: &[i64]) -> Result<()>;
}

pub struct SqliteFeedSavedSearchRepository<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> SqliteFeedSavedSearchRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    fn row_to_feed(row: &rusqlite::Row) -> rusqlite::Result<FeedSavedSearch> {
        Ok(FeedSavedSearch {
            id: row.get(0)?,
            source: row.get(1)?,
            saved_search: row.get(2)?,
            global: row.get(3)?,
            feed_order: row.get(4)?,
        })
    }

    /// Feed columns followed by the joined saved search columns.
    fn row_to_view(row: &rusqlite::Row) -> rusqlite::Result<FeedEntryView> {
        let feed = Self::row_to_feed(row)?;
        let search_id: Option<i64> = row.get(5)?;
        let saved_search = match search_id {
            Some(id) => Some(SavedSearch {
                id,
                source: row.get(6)?,
                name: row.get(7)?,
                query: row.get(8)?,
                filters_json: row.get(9)?,
            }),
            None => None,
        };
        Ok(FeedEntryView { feed, saved_search })
    }

    /// `WHERE` condition selecting one list, and the source bound to `?1`.
    fn scope_clause(scope: FeedScope, table: &str) -> (String, Option<i64>) {
        match scope {
            FeedScope::Global => (format!("{table}.global = 1"), None),
            FeedScope::Source(source) => (
                format!("{table}.global = 0 AND {table}.source = ?1"),
                Some(source),
            ),
        }
    }

    fn list_scope(&self, scope: FeedScope) -> Result<Vec<FeedSavedSearch>> {
        Self::list_with(&self.conn, scope)
    }

    fn list_with(conn: &Connection, scope: FeedScope) -> Result<Vec<FeedSavedSearch>> {
        let (clause, source) = Self::scope_clause(scope, "feed_saved_search");
        let sql = format!(
            "SELECT {COLUMNS} FROM feed_saved_search WHERE {clause} ORDER BY feed_order, _id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = match source {
            Some(source) => stmt.query_map(params![source], Self::row_to_feed)?,
            None => stmt.query_map([], Self::row_to_feed)?,
        };
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn list_scope_with_searches(&self, scope: FeedScope) -> Result<Vec<FeedEntryView>> {
        let (clause, source) = Self::scope_clause(scope, "feed_saved_search");
        let sql = format!(
            "SELECT {COLUMNS}, saved_search._id, saved_search.source, saved_search.name, saved_search.query, saved_search.filters_json
             FROM feed_saved_search
             LEFT JOIN saved_search ON saved_search._id = feed_saved_search.saved_search
             WHERE {clause}
             ORDER BY feed_saved_search.feed_order, feed_saved_search._id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match source {
            Some(source) => stmt.query_map(params![source], Self::row_to_view)?,
            None => stmt.query_map([], Self::row_to_view)?,
        };
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn count_with(conn: &Connection, scope: FeedScope) -> Result<usize> {
        let (clause, source) = Self::scope_clause(scope, "feed_saved_search");
        let sql = format!("SELECT COUNT(*) FROM feed_saved_search WHERE {clause}");
        let count: i64 = match source {
            Some(source) => conn.query_row(&sql, params![source], |row| row.get(0))?,
            None => conn.query_row(&sql, [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }

    fn find_matching_with(
        conn: &Connection,
        feed: &NewFeedSavedSearch,
    ) -> Result<Option<FeedSavedSearch>> {
        let found = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM feed_saved_search
                     WHERE global = ?1 AND source = ?2 AND saved_search IS ?3
                     LIMIT 1"
                ),
                params![feed.global, feed.source, feed.saved_search],
                Self::row_to_feed,
            )
            .optional()?;
        Ok(found)
    }

    fn check_new(conn: &Connection, feed: &NewFeedSavedSearch, limits: &FeedConfig) -> Result<()> {
        if let Some(search_id) = feed.saved_search {
            let source: i64 = conn
                .query_row(
                    "SELECT source FROM saved_search WHERE _id = ?1",
                    params![search_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(YomuError::SavedSearchNotFound(search_id))?;
            if source != feed.source {
                return Err(YomuError::ValidationError(format!(
                    "saved search {search_id} belongs to source {source}, not {}",
                    feed.source
                )));
            }
        }

        if Self::find_matching_with(conn, feed)?.is_some() {
            return Err(YomuError::ValidationError(
                "this search is already in the feed".to_string(),
            ));
        }

        let scope = feed.scope();
        let limit = limits.limit_for(scope);
        if Self::count_with(conn, scope)? >= limit {
            return Err(YomuError::FeedLimitReached { limit });
        }
        Ok(())
    }

    /// Give every entry of the list its own order when two of them share one,
    /// keeping the order they are read in.
    fn split_ties(conn: &Connection, scope: FeedScope) -> Result<()> {
        let entries = Self::list_with(conn, scope)?;
        if entries.windows(2).all(|w| w[0].feed_order != w[1].feed_order) {
            return Ok(());
        }
        for (position, entry) in entries.iter().enumerate() {
            Self::set_order(conn, entry.id, position as i64)?;
        }
        Ok(())
    }

    fn max_order(conn: &Connection, scope: FeedScope) -> Result<Option<i64>> {
        let (clause, source) = Self::scope_clause(scope, "feed_saved_search");
        let sql = format!("SELECT MAX(feed_order) FROM feed_saved_search WHERE {clause}");
        let max: Option<i64> = match source {
            Some(source) => conn.query_row(&sql, params![source], |row| row.get(0))?,
            None => conn.query_row(&sql, [], |row| row.get(0))?,
        };
        Ok(max)
    }

    fn find_with(conn: &Connection, id: i64) -> Result<FeedSavedSearch> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM feed_saved_search WHERE _id = ?1"),
            params![id],
            Self::row_to_feed,
        )
        .optional()?
        .ok_or(YomuError::FeedNotFound(id))
    }

    fn set_order(conn: &Connection, id: i64, order: i64) -> Result<()> {
        conn.execute(
            "UPDATE feed_saved_search SET feed_order = ?1 WHERE _id = ?2",
            params![order, id],
        )?;
        Ok(())
    }

    fn insert_with(conn: &Connection, feed: &NewFeedSavedSearch) -> Result<i64> {
        let order = Self::max_order(conn, feed.scope())?.map_or(0, |max| max + 1);
        conn.execute(
            "INSERT INTO feed_saved_search (source, saved_search, global, feed_order) VALUES (?1, ?2, ?3, ?4)",
            params![feed.source, feed.saved_search, feed.global, order],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl<'a> Repository for SqliteFeedSavedSearchRepository<'a> {
    type Entity = FeedSavedSearch;
    type Id = i64;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        match Self::find_with(&self.conn, *id) {
            Ok(feed) => Ok(Some(feed)),
            Err(YomuError::FeedNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, feed: &Self::Entity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO feed_saved_search (_id, source, saved_search, global, feed_order)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(_id) DO UPDATE SET
                source = excluded.source,
                saved_search = excluded.saved_search,
                global = excluded.global,
                feed_order = excluded.feed_order",
            params![
                feed.id,
                feed.source,
                feed.saved_search,
                feed.global,
                feed.feed_order
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM feed_saved_search WHERE _id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

impl<'a> FeedSavedSearchRepository for SqliteFeedSavedSearchRepository<'a> {
    fn list_global(&self) -> Result<Vec<FeedSavedSearch>> {
        self.list_scope(FeedScope::Global)
    }

    fn list_by_source(&self, source: i64) -> Result<Vec<FeedSavedSearch>> {
        self.list_scope(FeedScope::Source(source))
    }

    fn list_global_with_searches(&self) -> Result<Vec<FeedEntryView>> {
        self.list_scope_with_searches(FeedScope::Global)
    }

    fn list_by_source_with_searches(&self, source: i64) -> Result<Vec<FeedEntryView>> {
        self.list_scope_with_searches(FeedScope::Source(source))
    }

    fn count_global(&self) -> Result<usize> {
        Self::count_with(&self.conn, FeedScope::Global)
    }

    fn count_by_source(&self, source: i64) -> Result<usize> {
        Self::count_with(&self.conn, FeedScope::Source(source))
    }

    fn find_matching(&self, feed: &NewFeedSavedSearch) -> Result<Option<FeedSavedSearch>> {
        Self::find_matching_with(&self.conn, feed)
    }

    fn insert(&self, feed: &NewFeedSavedSearch) -> Result<i64> {
        Self::insert_with(&self.conn, feed)
    }

    fn insert_all(&self, feeds: &[NewFeedSavedSearch]) -> Result<Vec<i64>> {
        let tx = self.conn.unchecked_transaction()?;
        let ids = feeds
            .iter()
            .map(|feed| Self::insert_with(&tx, feed))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(ids)
    }

    fn insert_checked(&self, feeds: &[NewFeedSavedSearch], limits: &FeedConfig) -> Result<Vec<i64>> {
        let tx = self.conn.unchecked_transaction()?;
        let ids = feeds
            .iter()
            .map(|feed| {
                Self::check_new(&tx, feed, limits)?;
                Self::insert_with(&tx, feed)
            })
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(ids)
    }

    fn swap_order(&self, first: i64, second: i64) -> Result<()> {
        if first == second {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        let a = Self::find_with(&tx, first)?;
        let b = Self::find_with(&tx, second)?;
        if a.scope() != b.scope() {
            return Err(YomuError::ValidationError(format!(
                "feed entries {first} and {second} belong to different feeds"
            )));
        }
        Self::split_ties(&tx, a.scope())?;
        let a = Self::find_with(&tx, first)?;
        let b = Self::find_with(&tx, second)?;
        Self::set_order(&tx, a.id, b.feed_order)?;
        Self::set_order(&tx, b.id, a.feed_order)?;
        tx.commit()?;
        Ok(())
    }

    fn move_to_bottom(&self, id: i64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let feed = Self::find_with(&tx, id)?;
        let last = self
            .list_scope(feed.scope())?
            .last()
            .map(|f| (f.id, f.feed_order));
        if let Some((last_id, last_order)) = last
            && last_id != feed.id
        {
            Self::set_order(&tx, feed.id, last_order + 1)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn reorder(&self, ids: &[i64]) -> Result<()> {
        let mut seen = HashSet::new();
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(YomuError::ValidationError(format!(
                "feed entry {dup} listed twice"
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        let entries = ids
            .iter()
            .map(|&id| Self::find_with(&tx, id))
            .collect::<Result<Vec<_>>>()?;

        if let Some(first) = entries.first() {
            if entries.iter().any(|e| e.scope() != first.scope()) {
                return Err(YomuError::ValidationError(
                    "cannot reorder entries of different feeds together".to_string(),
                ));
            }
            Self::split_ties(&tx, first.scope())?;
        }
        let entries = ids
            .iter()
            .map(|&id| Self::find_with(&tx, id))
            .collect::<Result<Vec<_>>>()?;

        // Slots are the current (order, id) pairs sorted the way lists are read.
        let mut slots: Vec<(i64, i64)> = entries.iter().map(|e| (e.feed_order, e.id)).collect();
        slots.sort_unstable();

        for (entry, (order, _)) in entries.iter().zip(slots) {
            Self::set_order(&tx, entry.id, order)?;
        }
        tx.commit()?;
        Ok(())
    }
}
