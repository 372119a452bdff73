mod feed_saved_search_repository;
mod saved_search_repository;
mod search_metadata_repository;

pub use feed_saved_search_repository::{FeedSavedSearchRepository, SqliteFeedSavedSearchRepository};
pub use saved_search_repository::{SavedSearchRepository, SqliteSavedSearchRepository};
pub use search_metadata_repository::{SearchMetadataRepository, SqliteSearchMetadataRepository};

use crate::error::Result;

pub trait Repository {
    type Entity;
    type Id;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>>;
    fn save(&self, entity: &Self::Entity) -> Result<()>;
    fn delete(&self, id: &Self::Id) -> Result<bool>;
}
