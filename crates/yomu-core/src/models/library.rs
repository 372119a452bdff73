use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a manga as the migration planner sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: i64,
    pub source: i64,
    pub title: String,
    pub favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_custom_cover: bool,
    #[serde(default)]
    pub download_count: usize,
}

impl LibraryEntry {
    pub fn new(id: i64, source: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            source,
            title: title.into(),
            favorite: false,
            date_added: None,
            has_custom_cover: false,
            download_count: 0,
        }
    }

    pub fn has_downloads(&self) -> bool {
        self.download_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub manga_id: i64,
    /// Negative when the source title did not yield a number.
    pub chapter_number: f64,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub bookmark: bool,
    #[serde(default)]
    pub last_page_read: i64,
}

impl Chapter {
    pub fn is_recognized_number(&self) -> bool {
        self.chapter_number >= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub manga_id: i64,
    pub tracker_id: i64,
    pub remote_id: i64,
    pub title: String,
    pub last_chapter_read: f64,
    pub status: i64,
    pub score: f64,
}

/// User overrides kept next to a manga.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_genre: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

impl MangaExtras {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
