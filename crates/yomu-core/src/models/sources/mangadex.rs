use serde::{Deserialize, Serialize};

use crate::models::metadata::{MetadataBase, RaisedSearchMetadata};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MangaDexSearchMetadata {
    #[serde(skip)]
    pub base: MetadataBase,

    pub md_uuid: String,

    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub lang_flag: Option<String>,
    #[serde(default)]
    pub last_chapter_number: Option<i32>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub status: Option<i32>,
    #[serde(default)]
    pub follow_status: Option<i32>,
}

impl MangaDexSearchMetadata {
    pub const TITLE_TYPE_MAIN: i32 = 0;
    pub const TITLE_TYPE_ALT: i32 = 1;

    pub fn new(manga_id: i64, md_uuid: impl Into<String>) -> Self {
        Self {
            base: MetadataBase {
                manga_id,
                ..MetadataBase::default()
            },
            md_uuid: md_uuid.into(),
            ..Self::default()
        }
    }

    pub fn alt_titles(&self) -> Vec<&str> {
        self.base
            .titles
            .iter()
            .filter(|t| t.title_type == Self::TITLE_TYPE_ALT)
            .map(|t| t.title.as_str())
            .collect()
    }
}

impl RaisedSearchMetadata for MangaDexSearchMetadata {
    const EXTRA_VERSION: i32 = 2;

    fn base(&self) -> &MetadataBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MetadataBase {
        &mut self.base
    }

    fn indexed_extra(&self) -> Option<String> {
        Some(self.md_uuid.clone())
    }
}
