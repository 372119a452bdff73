use rusqlite::Connection;

use super::Migration;
use crate::error::Result;

pub struct V2ExtraVersion;

impl Migration for V2ExtraVersion {
    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Add extra_version column to search_metadata"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        let has_column: bool = conn
            .prepare("SELECT 1 FROM pragma_table_info('search_metadata') WHERE name='extra_version'")?
            .exists([])?;

        if !has_column {
            conn.execute_batch(
                "ALTER TABLE search_metadata ADD COLUMN extra_version INTEGER NOT NULL DEFAULT 0;",
            )?;
        }
        Ok(())
    }
}
