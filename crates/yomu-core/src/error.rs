use thiserror::Error;

/// All errors that can occur in yomu-core.
#[derive(Debug, Error)]
pub enum YomuError {
    #[error("Saved search not found: {0}")]
    SavedSearchNotFound(i64),

    #[error("Feed entry not found: {0}")]
    FeedNotFound(i64),

    #[error("Metadata not found for manga: {0}")]
    MetadataNotFound(i64),

    #[error("Feed limit reached: at most {limit} entries allowed")]
    FeedLimitReached { limit: usize },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Failed to decode metadata of manga {manga_id}: {source}")]
    MetadataDecode {
        manga_id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl YomuError {
    /// True for the variants that mean "the row is not there".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SavedSearchNotFound(_) | Self::FeedNotFound(_) | Self::MetadataNotFound(_)
        )
    }
}

/// Exit codes used by the CLI.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    Conflict = 7,
}

pub type Result<T> = std::result::Result<T, YomuError>;
