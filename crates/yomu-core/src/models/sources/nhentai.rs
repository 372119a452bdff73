use serde::{Deserialize, Serialize};

use crate::models::metadata::{MetadataBase, RaisedSearchMetadata};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NHentaiSearchMetadata {
    #[serde(skip)]
    pub base: MetadataBase,

    pub nh_id: i64,

    /// Unix seconds.
    #[serde(default)]
    pub upload_date: Option<i64>,
    #[serde(default)]
    pub favorites_count: Option<i64>,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub preferred_title: Option<i32>,
    /// One letter per page: `j`, `p` or `g`.
    #[serde(default)]
    pub page_image_types: Vec<String>,
}

impl NHentaiSearchMetadata {
    pub const TITLE_TYPE_JAPANESE: i32 = 0;
    pub const TITLE_TYPE_ENGLISH: i32 = 1;
    pub const TITLE_TYPE_SHORT: i32 = 2;

    pub fn new(manga_id: i64, nh_id: i64) -> Self {
        Self {
            base: MetadataBase {
                manga_id,
                ..MetadataBase::default()
            },
            nh_id,
            ..Self::default()
        }
    }

    pub fn japanese_title(&self) -> Option<&str> {
        self.title_of_type(Self::TITLE_TYPE_JAPANESE)
    }

    pub fn english_title(&self) -> Option<&str> {
        self.title_of_type(Self::TITLE_TYPE_ENGLISH)
    }

    pub fn short_title(&self) -> Option<&str> {
        self.title_of_type(Self::TITLE_TYPE_SHORT)
    }

    /// Title picked by `preferred_title`, else the first of english, japanese, short.
    pub fn display_title(&self) -> Option<&str> {
        self.preferred_title
            .and_then(|t| self.title_of_type(t))
            .or_else(|| self.english_title())
            .or_else(|| self.japanese_title())
            .or_else(|| self.short_title())
    }

    pub fn page_count(&self) -> usize {
        self.page_image_types.len()
    }
}

impl RaisedSearchMetadata for NHentaiSearchMetadata {
    const EXTRA_VERSION: i32 = 1;

    fn base(&self) -> &MetadataBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MetadataBase {
        &mut self.base
    }

    fn indexed_extra(&self) -> Option<String> {
        Some(self.nh_id.to_string())
    }
}
