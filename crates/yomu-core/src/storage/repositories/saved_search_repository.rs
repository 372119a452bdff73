use rusqlite::{params, Connection};
use std::sync::MutexGuard;

use crate::error::Result;
use crate::models::{NewSavedSearch, SavedSearch};

use super::Repository;

const COLUMNS: &str = "saved_search._id, saved_search.source, saved_search.name, saved_search.query, saved_search.filters_json";

pub trait SavedSearchRepository: Repository<Entity = SavedSearch, Id = i64> {
    fn list_by_source(&self, source: i64) -> Result<Vec<SavedSearch>>;
    fn list_all(&self) -> Result<Vec<SavedSearch>>;
    fn count_by_source(&self, source: i64) -> Result<usize>;
    fn insert(&self, search: &NewSavedSearch) -> Result<i64>;
    fn insert_all(&self, searches: &[NewSavedSearch]) -> Result<Vec<i64>>;
    /// Saved searches of `source` that have an entry in that source's feed.
    fn list_in_feed_by_source(&self, source: i64) -> Result<Vec<SavedSearch>>;
    /// Saved searches that have an entry in the global feed.
    fn list_in_global_feed(&self) -> Result<Vec<SavedSearch>>;
    /// Number of feed entries, in any list, pointing at the search.
    fn count_feed_references(&self, id: i64) -> Result<usize>;
}

pub struct SqliteSavedSearchRepository<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> SqliteSavedSearchRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    fn row_to_saved_search(row: &rusqlite::Row) -> rusqlite::Result<SavedSearch> {
        Ok(SavedSearch {
            id: row.get(0)?,
            source: row.get(1)?,
            name: row.get(2)?,
            query: row.get(3)?,
            filters_json: row.get(4)?,
        })
    }

    fn query_list(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<SavedSearch>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_saved_search)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn insert_with(conn: &Connection, search: &NewSavedSearch) -> Result<i64> {
        conn.execute(
            "INSERT INTO saved_search (source, name, query, filters_json) VALUES (?1, ?2, ?3, ?4)",
            params![search.source, search.name, search.query, search.filters_json],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl<'a> Repository for SqliteSavedSearchRepository<'a> {
    type Entity = SavedSearch;
    type Id = i64;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let result = self.conn.query_row(
            &format!("SELECT {COLUMNS} FROM saved_search WHERE _id = ?1"),
            params![id],
            Self::row_to_saved_search,
        );

        match result {
            Ok(search) => Ok(Some(search)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Update in place, or insert with the given id.
    fn save(&self, search: &Self::Entity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO saved_search (_id, source, name, query, filters_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(_id) DO UPDATE SET
                source = excluded.source,
                name = excluded.name,
                query = excluded.query,
                filters_json = excluded.filters_json",
            params![
                search.id,
                search.source,
                search.name,
                search.query,
                search.filters_json
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM saved_search WHERE _id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

impl<'a> SavedSearchRepository for SqliteSavedSearchRepository<'a> {
    fn list_by_source(&self, source: i64) -> Result<Vec<SavedSearch>> {
        self.query_list(
            &format!("SELECT {COLUMNS} FROM saved_search WHERE source = ?1 ORDER BY name COLLATE NOCASE, _id"),
            params![source],
        )
    }

    fn list_all(&self) -> Result<Vec<SavedSearch>> {
        self.query_list(
            &format!("SELECT {COLUMNS} FROM saved_search ORDER BY source, name COLLATE NOCASE, _id"),
            [],
        )
    }

    fn count_by_source(&self, source: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM saved_search WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert(&self, search: &NewSavedSearch) -> Result<i64> {
        Self::insert_with(&self.conn, search)
    }

    fn insert_all(&self, searches: &[NewSavedSearch]) -> Result<Vec<i64>> {
        let tx = self.conn.unchecked_transaction()?;
        let ids = searches
            .iter()
            .map(|search| Self::insert_with(&tx, search))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(ids)
    }

    fn list_in_feed_by_source(&self, source: i64) -> Result<Vec<SavedSearch>> {
        self.query_list(
            &format!(
                "SELECT {COLUMNS} FROM saved_search
                 JOIN feed_saved_search ON feed_saved_search.saved_search = saved_search._id
                 WHERE feed_saved_search.global = 0 AND feed_saved_search.source = ?1
                 ORDER BY feed_saved_search.feed_order, feed_saved_search._id"
            ),
            params![source],
        )
    }

    fn list_in_global_feed(&self) -> Result<Vec<SavedSearch>> {
        self.query_list(
            &format!(
                "SELECT {COLUMNS} FROM saved_search
                 JOIN feed_saved_search ON feed_saved_search.saved_search = saved_search._id
                 WHERE feed_saved_search.global = 1
                 ORDER BY feed_saved_search.feed_order, feed_saved_search._id"
            ),
            [],
        )
    }

    fn count_feed_references(&self, id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM feed_saved_search WHERE saved_search = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
