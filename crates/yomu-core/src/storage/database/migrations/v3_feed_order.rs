use rusqlite::Connection;

use super::Migration;
use crate::error::Result;

pub struct V3FeedOrder;

impl Migration for V3FeedOrder {
    fn version(&self) -> u32 {
        3
    }

    fn description(&self) -> &'static str {
        "Add feed_order column to feed_saved_search, seeded from insertion order"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        let has_column: bool = conn
            .prepare("SELECT 1 FROM pragma_table_info('feed_saved_search') WHERE name='feed_order'")?
            .exists([])?;

        if !has_column {
            conn.execute_batch(
                "
                ALTER TABLE feed_saved_search ADD COLUMN feed_order INTEGER NOT NULL DEFAULT 0;
                UPDATE feed_saved_search SET feed_order = _id;
                CREATE INDEX IF NOT EXISTS idx_feed_saved_search_scope
                    ON feed_saved_search(global, source, feed_order);
                ",
            )?;
        }
        Ok(())
    }
}
