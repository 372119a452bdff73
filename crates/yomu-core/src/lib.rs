pub mod config;
pub mod error;
pub mod migration;
pub mod models;
pub mod storage;

pub use config::AppConfig;
pub use error::{Result, YomuError};
pub use models::*;

pub use migration::{plan_migration, MigrationInput, MigrationPlan};

pub use storage::database::{open_database, open_in_memory, ConnectionPool, Database, TableChange};

pub use storage::repositories::{
    FeedSavedSearchRepository, Repository, SavedSearchRepository, SearchMetadataRepository,
    SqliteFeedSavedSearchRepository, SqliteSavedSearchRepository, SqliteSearchMetadataRepository,
};
