use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 3;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS search_metadata (
            manga_id      INTEGER PRIMARY KEY,
            uploader      TEXT,
            extra         TEXT NOT NULL,
            indexed_extra TEXT,
            extra_version INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS search_tags (
            _id       INTEGER PRIMARY KEY AUTOINCREMENT,
            manga_id  INTEGER NOT NULL REFERENCES search_metadata(manga_id) ON DELETE CASCADE,
            namespace TEXT,
            name      TEXT NOT NULL,
            type      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS search_titles (
            _id      INTEGER PRIMARY KEY AUTOINCREMENT,
            manga_id INTEGER NOT NULL REFERENCES search_metadata(manga_id) ON DELETE CASCADE,
            title    TEXT NOT NULL,
            type     INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS saved_search (
            _id          INTEGER PRIMARY KEY AUTOINCREMENT,
            source       INTEGER NOT NULL,
            name         TEXT NOT NULL,
            query        TEXT,
            filters_json TEXT
        );

        CREATE TABLE IF NOT EXISTS feed_saved_search (
            _id          INTEGER PRIMARY KEY AUTOINCREMENT,
            source       INTEGER NOT NULL,
            saved_search INTEGER REFERENCES saved_search(_id) ON DELETE CASCADE,
            global       INTEGER NOT NULL DEFAULT 0,
            feed_order   INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_search_metadata_indexed_extra ON search_metadata(indexed_extra);
        CREATE INDEX IF NOT EXISTS idx_search_tags_manga             ON search_tags(manga_id);
        CREATE INDEX IF NOT EXISTS idx_search_tags_namespace_name    ON search_tags(namespace, name);
        CREATE INDEX IF NOT EXISTS idx_search_titles_manga           ON search_titles(manga_id);
        CREATE INDEX IF NOT EXISTS idx_search_titles_title           ON search_titles(title);
        CREATE INDEX IF NOT EXISTS idx_saved_search_source           ON saved_search(source);
        CREATE INDEX IF NOT EXISTS idx_feed_saved_search_scope       ON feed_saved_search(global, source, feed_order);
        CREATE INDEX IF NOT EXISTS idx_feed_saved_search_search      ON feed_saved_search(saved_search);
        ",
    )?;
    Ok(())
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    create_tables(conn)?;
    create_indexes(conn)?;
    Ok(())
}
