use rusqlite::{params, Connection, OptionalExtension};
use std::sync::MutexGuard;

use crate::error::Result;
use crate::models::{FlatMetadata, SearchMetadata, SearchTag, SearchTitle};

use super::Repository;

pub trait SearchMetadataRepository: Repository<Entity = FlatMetadata, Id = i64> {
    fn find_metadata(&self, manga_id: i64) -> Result<Option<SearchMetadata>>;
    fn list_tags(&self, manga_id: i64) -> Result<Vec<SearchTag>>;
    fn list_titles(&self, manga_id: i64) -> Result<Vec<SearchTitle>>;
    fn find_by_indexed_extra(&self, indexed_extra: &str) -> Result<Vec<i64>>;
    fn find_by_tag(&self, namespace: Option<&str>, name: &str) -> Result<Vec<i64>>;
    fn count(&self) -> Result<usize>;
}

pub struct SqliteSearchMetadataRepository<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> SqliteSearchMetadataRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    fn row_to_metadata(row: &rusqlite::Row) -> rusqlite::Result<SearchMetadata> {
        Ok(SearchMetadata {
            manga_id: row.get(0)?,
            uploader: row.get(1)?,
            extra: row.get(2)?,
            indexed_extra: row.get(3)?,
            extra_version: row.get(4)?,
        })
    }

    fn manga_ids(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl<'a> Repository for SqliteSearchMetadataRepository<'a> {
    type Entity = FlatMetadata;
    type Id = i64;

    fn find_by_id(&self, manga_id: &Self::Id) -> Result<Option<Self::Entity>> {
        let Some(metadata) = self.find_metadata(*manga_id)? else {
            return Ok(None);
        };
        Ok(Some(FlatMetadata {
            metadata,
            tags: self.list_tags(*manga_id)?,
            titles: self.list_titles(*manga_id)?,
        }))
    }

    /// Replace everything stored for the manga in one transaction.
    fn save(&self, flat: &Self::Entity) -> Result<()> {
        let meta = &flat.metadata;
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO search_metadata (manga_id, uploader, extra, indexed_extra, extra_version)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(manga_id) DO UPDATE SET
                uploader = excluded.uploader,
                extra = excluded.extra,
                indexed_extra = excluded.indexed_extra,
                extra_version = excluded.extra_version",
            params![
                meta.manga_id,
                meta.uploader,
                meta.extra,
                meta.indexed_extra,
                meta.extra_version
            ],
        )?;
        tx.execute("DELETE FROM search_tags WHERE manga_id = ?1", params![meta.manga_id])?;
        tx.execute("DELETE FROM search_titles WHERE manga_id = ?1", params![meta.manga_id])?;

        {
            let mut insert_tag = tx.prepare(
                "INSERT INTO search_tags (manga_id, namespace, name, type) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for tag in &flat.tags {
                insert_tag.execute(params![meta.manga_id, tag.namespace, tag.name, tag.tag_type])?;
            }

            let mut insert_title = tx.prepare(
                "INSERT INTO search_titles (manga_id, title, type) VALUES (?1, ?2, ?3)",
            )?;
            for title in &flat.titles {
                insert_title.execute(params![meta.manga_id, title.title, title.title_type])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Tags and titles go with the metadata row through `ON DELETE CASCADE`.
    fn delete(&self, manga_id: &Self::Id) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM search_metadata WHERE manga_id = ?1",
            params![manga_id],
        )?;
        Ok(deleted > 0)
    }
}

impl<'a> SearchMetadataRepository for SqliteSearchMetadataRepository<'a> {
    fn find_metadata(&self, manga_id: i64) -> Result<Option<SearchMetadata>> {
        let metadata = self
            .conn
            .query_row(
                "SELECT manga_id, uploader, extra, indexed_extra, extra_version
                 FROM search_metadata WHERE manga_id = ?1",
                params![manga_id],
                Self::row_to_metadata,
            )
            .optional()?;
        Ok(metadata)
    }

    fn list_tags(&self, manga_id: i64) -> Result<Vec<SearchTag>> {
        let mut stmt = self.conn.prepare(
            "SELECT _id, manga_id, namespace, name, type FROM search_tags WHERE manga_id = ?1 ORDER BY _id",
        )?;
        let rows = stmt.query_map(params![manga_id], |row| {
            Ok(SearchTag {
                id: row.get(0)?,
                manga_id: row.get(1)?,
                namespace: row.get(2)?,
                name: row.get(3)?,
                tag_type: row.get(4)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn list_titles(&self, manga_id: i64) -> Result<Vec<SearchTitle>> {
        let mut stmt = self.conn.prepare(
            "SELECT _id, manga_id, title, type FROM search_titles WHERE manga_id = ?1 ORDER BY _id",
        )?;
        let rows = stmt.query_map(params![manga_id], |row| {
            Ok(SearchTitle {
                id: row.get(0)?,
                manga_id: row.get(1)?,
                title: row.get(2)?,
                title_type: row.get(3)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn find_by_indexed_extra(&self, indexed_extra: &str) -> Result<Vec<i64>> {
        self.manga_ids(
            "SELECT manga_id FROM search_metadata WHERE indexed_extra = ?1 ORDER BY manga_id",
            params![indexed_extra],
        )
    }

    fn find_by_tag(&self, namespace: Option<&str>, name: &str) -> Result<Vec<i64>> {
        self.manga_ids(
            "SELECT DISTINCT manga_id FROM search_tags
             WHERE namespace IS ?1 AND name = ?2
             ORDER BY manga_id",
            params![namespace, name],
        )
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM search_metadata", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
