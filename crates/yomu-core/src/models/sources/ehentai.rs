use serde::{Deserialize, Serialize};

use crate::models::metadata::{MetadataBase, RaisedSearchMetadata, RaisedTag, TAG_TYPE_VIRTUAL};

/// Gallery metadata from E-Hentai / ExHentai.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EHentaiSearchMetadata {
    #[serde(skip)]
    pub base: MetadataBase,

    pub gid: String,
    pub token: String,
    pub exh: bool,

    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    /// Unix millis.
    #[serde(default)]
    pub date_posted: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub visible: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub translated: Option<bool>,
    #[serde(default)]
    pub favorites: Option<i32>,
    #[serde(default)]
    pub rating_count: Option<i32>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub aged: bool,
    /// Unix millis, 0 when never checked.
    #[serde(default)]
    pub last_update_check: i64,
}

impl EHentaiSearchMetadata {
    pub const TITLE_TYPE_TITLE: i32 = 0;
    pub const TITLE_TYPE_ALT_TITLE: i32 = 1;

    pub const TAG_TYPE_NORMAL: i32 = 0;
    pub const TAG_TYPE_LIGHT: i32 = 1;
    pub const TAG_TYPE_WEAK: i32 = 2;

    pub const EH_GENRE_NAMESPACE: &'static str = "genre";

    pub fn new(manga_id: i64, gid: impl Into<String>, token: impl Into<String>, exh: bool) -> Self {
        Self {
            base: MetadataBase {
                manga_id,
                ..MetadataBase::default()
            },
            gid: gid.into(),
            token: token.into(),
            exh,
            ..Self::default()
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title_of_type(Self::TITLE_TYPE_TITLE)
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.replace_title_of_type(Self::TITLE_TYPE_TITLE, title);
    }

    pub fn alt_title(&self) -> Option<&str> {
        self.title_of_type(Self::TITLE_TYPE_ALT_TITLE)
    }

    pub fn set_alt_title(&mut self, title: Option<String>) {
        self.replace_title_of_type(Self::TITLE_TYPE_ALT_TITLE, title);
    }

    pub fn gallery_url(&self) -> String {
        let host = if self.exh { "exhentai.org" } else { "e-hentai.org" };
        format!("https://{host}/g/{}/{}/", self.gid, self.token)
    }

    /// Replace the derived genre tag with one built from `genre`.
    pub fn refresh_genre_tag(&mut self) {
        let tags = &mut self.base.tags;
        tags.retain(|t| !(t.is_virtual() && t.namespace.as_deref() == Some(Self::EH_GENRE_NAMESPACE)));
        if let Some(genre) = &self.genre {
            tags.push(RaisedTag::new(
                Some(Self::EH_GENRE_NAMESPACE),
                genre.clone(),
                TAG_TYPE_VIRTUAL,
            ));
        }
    }
}

impl RaisedSearchMetadata for EHentaiSearchMetadata {
    const EXTRA_VERSION: i32 = 1;

    fn base(&self) -> &MetadataBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MetadataBase {
        &mut self.base
    }

    fn indexed_extra(&self) -> Option<String> {
        Some(self.gid.clone())
    }

    fn refresh_virtual_tags(&mut self) {
        self.refresh_genre_tag();
    }
}
