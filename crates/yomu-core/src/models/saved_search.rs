use serde::{Deserialize, Serialize};

use crate::error::{Result, YomuError};

/// A filter query stored for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSearch {
    pub id: i64,
    pub source: i64,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Serialized filter list, opaque to the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters_json: Option<String>,
}

/// Values for a saved search that has no row yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSavedSearch {
    pub source: i64,
    pub name: String,
    pub query: Option<String>,
    pub filters_json: Option<String>,
}

impl NewSavedSearch {
    pub fn new(source: i64, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            query: None,
            filters_json: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_filters(mut self, filters_json: impl Into<String>) -> Self {
        self.filters_json = Some(filters_json.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(YomuError::ValidationError(
                "saved search name must not be empty".to_string(),
            ));
        }
        if let Some(filters) = &self.filters_json {
            serde_json::from_str::<serde_json::Value>(filters).map_err(|e| {
                YomuError::ValidationError(format!("filters are not valid JSON: {e}"))
            })?;
        }
        Ok(())
    }
}

/// An entry in a feed. `saved_search == None` shows the source's latest list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSavedSearch {
    pub id: i64,
    pub source: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_search: Option<i64>,
    pub global: bool,
    pub feed_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeedSavedSearch {
    pub source: i64,
    pub saved_search: Option<i64>,
    pub global: bool,
}

impl NewFeedSavedSearch {
    pub fn global(source: i64, saved_search: Option<i64>) -> Self {
        Self {
            source,
            saved_search,
            global: true,
        }
    }

    pub fn for_source(source: i64, saved_search: Option<i64>) -> Self {
        Self {
            source,
            saved_search,
            global: false,
        }
    }
}

/// Which ordered list a feed entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "source", rename_all = "snake_case")]
pub enum FeedScope {
    Global,
    Source(i64),
}

impl FeedSavedSearch {
    pub fn scope(&self) -> FeedScope {
        if self.global {
            FeedScope::Global
        } else {
            FeedScope::Source(self.source)
        }
    }
}

impl NewFeedSavedSearch {
    pub fn scope(&self) -> FeedScope {
        if self.global {
            FeedScope::Global
        } else {
            FeedScope::Source(self.source)
        }
    }
}

/// A feed entry joined with the search it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntryView {
    pub feed: FeedSavedSearch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_search: Option<SavedSearch>,
}

impl FeedEntryView {
    pub fn display_name(&self) -> &str {
        self.saved_search
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("Latest")
    }
}
