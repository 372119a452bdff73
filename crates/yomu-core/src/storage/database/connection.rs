use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tokio::sync::broadcast;

use super::schema::apply_pragmas;
use crate::error::Result;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Table touched by a write, broadcast to subscribers after it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableChange {
    SearchMetadata,
    SavedSearch,
    FeedSavedSearch,
}

pub struct ConnectionPool {
    path: Option<String>,
    connection: Mutex<Connection>,
    changes: broadcast::Sender<TableChange>,
}

impl ConnectionPool {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        Ok(Self::with_connection(
            Some(path.to_string_lossy().to_string()),
            conn,
        ))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_pragmas(&conn)?;
        Ok(Self::with_connection(None, conn))
    }

    fn with_connection(path: Option<String>, conn: Connection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path,
            connection: Mutex::new(conn),
            changes,
        }
    }

    /// A panic while holding the lock leaves SQLite itself consistent, so a
    /// poisoned mutex is still usable.
    pub fn get_connection(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.changes.subscribe()
    }

    pub fn notify(&self, change: TableChange) {
        // No receivers is not an error.
        let _ = self.changes.send(change);
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}
