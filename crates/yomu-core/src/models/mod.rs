pub mod library;
pub mod metadata;
pub mod migration_flags;
pub mod saved_search;
pub mod sources;

pub use library::*;
pub use metadata::*;
pub use migration_flags::*;
pub use saved_search::*;
pub use sources::*;
