//! Generic stored metadata and the typed per-source view over it.
//!
//! A source indexes a manga into three row kinds: one [`SearchMetadata`] row
//! whose `extra` column carries the source-specific fields as JSON, plus
//! ordered [`SearchTag`] and [`SearchTitle`] rows. [`FlatMetadata`] bundles the
//! three; [`FlatMetadata::raise`] turns the bundle into a concrete
//! [`RaisedSearchMetadata`] type and [`RaisedSearchMetadata::flatten`] goes back.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, YomuError};

/// Tags derived from other fields. Kept on the raised object, never stored.
pub const TAG_TYPE_VIRTUAL: i32 = -2;

/// Tag type used when a source does not distinguish tag strength.
pub const TAG_TYPE_DEFAULT: i32 = 0;

/// Row in `search_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub manga_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    /// Source-specific fields, JSON encoded.
    pub extra: String,
    /// Secondary lookup key, e.g. a gallery id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_extra: Option<String>,
    pub extra_version: i32,
}

/// Row in `search_tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub manga_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    pub tag_type: i32,
}

/// Row in `search_titles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTitle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub manga_id: i64,
    pub title: String,
    pub title_type: i32,
}

/// Everything stored for one manga, as rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatMetadata {
    pub metadata: SearchMetadata,
    pub tags: Vec<SearchTag>,
    pub titles: Vec<SearchTitle>,
}

impl FlatMetadata {
    pub fn manga_id(&self) -> i64 {
        self.metadata.manga_id
    }

    /// Decode `extra` into `T` and fill in the common fields.
    ///
    /// `T` must describe exactly the stored shape: a field the type does not
    /// declare, or a missing required field, is a [`YomuError::MetadataDecode`].
    pub fn raise<T: RaisedSearchMetadata>(&self) -> Result<T> {
        let mut raised: T = serde_json::from_str(&self.metadata.extra).map_err(|source| {
            YomuError::MetadataDecode {
                manga_id: self.metadata.manga_id,
                source,
            }
        })?;
        self.fill_base_fields(raised.base_mut());
        raised.refresh_virtual_tags();
        Ok(raised)
    }

    fn fill_base_fields(&self, base: &mut MetadataBase) {
        base.manga_id = self.metadata.manga_id;
        base.uploader = self.metadata.uploader.clone();
        base.tags.extend(self.tags.iter().map(|t| RaisedTag {
            namespace: t.namespace.clone(),
            name: t.name.clone(),
            tag_type: t.tag_type,
        }));
        base.titles.extend(self.titles.iter().map(|t| RaisedTitle {
            title: t.title.clone(),
            title_type: t.title_type,
        }));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaisedTag {
    pub namespace: Option<String>,
    pub name: String,
    pub tag_type: i32,
}

impl RaisedTag {
    pub fn new(namespace: Option<&str>, name: impl Into<String>, tag_type: i32) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
            tag_type,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.tag_type == TAG_TYPE_VIRTUAL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaisedTitle {
    pub title: String,
    pub title_type: i32,
}

/// Fields every raised type carries, filled from rows rather than `extra`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataBase {
    pub manga_id: i64,
    pub uploader: Option<String>,
    pub tags: Vec<RaisedTag>,
    pub titles: Vec<RaisedTitle>,
}

/// A typed, per-source metadata object.
///
/// Implementors keep their [`MetadataBase`] in a `#[serde(skip)]` field so that
/// only the source's own fields end up in `extra`.
pub trait RaisedSearchMetadata: Serialize + DeserializeOwned {
    /// Bumped when the shape of `extra` changes.
    const EXTRA_VERSION: i32;

    fn base(&self) -> &MetadataBase;
    fn base_mut(&mut self) -> &mut MetadataBase;

    fn indexed_extra(&self) -> Option<String> {
        None
    }

    /// Rebuild tags derived from the source's own fields. `flatten` drops
    /// virtual tags, `raise` calls this to put them back.
    fn refresh_virtual_tags(&mut self) {}

    fn flatten(&self) -> Result<FlatMetadata> {
        let base = self.base();
        let manga_id = base.manga_id;
        let metadata = SearchMetadata {
            manga_id,
            uploader: base.uploader.clone(),
            extra: serde_json::to_string(self)?,
            indexed_extra: self.indexed_extra(),
            extra_version: Self::EXTRA_VERSION,
        };
        let tags = base
            .tags
            .iter()
            .filter(|t| !t.is_virtual())
            .map(|t| SearchTag {
                id: None,
                manga_id,
                namespace: t.namespace.clone(),
                name: t.name.clone(),
                tag_type: t.tag_type,
            })
            .collect();
        let titles = base
            .titles
            .iter()
            .map(|t| SearchTitle {
                id: None,
                manga_id,
                title: t.title.clone(),
                title_type: t.title_type,
            })
            .collect();
        Ok(FlatMetadata {
            metadata,
            tags,
            titles,
        })
    }

    fn title_of_type(&self, title_type: i32) -> Option<&str> {
        self.base()
            .titles
            .iter()
            .find(|t| t.title_type == title_type)
            .map(|t| t.title.as_str())
    }

    /// Drop every title of `title_type`, then append `title` if given.
    fn replace_title_of_type(&mut self, title_type: i32, title: Option<String>) {
        let titles = &mut self.base_mut().titles;
        titles.retain(|t| t.title_type != title_type);
        if let Some(title) = title {
            titles.push(RaisedTitle { title, title_type });
        }
    }

    fn tags_of_namespace(&self, namespace: &str) -> Vec<&RaisedTag> {
        self.base()
            .tags
            .iter()
            .filter(|t| t.namespace.as_deref() == Some(namespace))
            .collect()
    }

    /// `namespace: name` pairs of stored tags, comma separated.
    fn tags_to_genre_string(&self) -> String {
        self.base()
            .tags
            .iter()
            .filter(|t| !t.is_virtual())
            .map(|t| match &t.namespace {
                Some(ns) => format!("{ns}: {}", t.name),
                None => t.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One line per namespace, namespaces sorted, tag order kept.
    fn tags_to_description(&self) -> String {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for tag in self.base().tags.iter().filter(|t| !t.is_virtual()) {
            groups
                .entry(tag.namespace.as_deref().unwrap_or("misc"))
                .or_default()
                .push(&tag.name);
        }
        groups
            .into_iter()
            .map(|(ns, names)| format!("{ns}: {}", names.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct SampleMetadata {
        #[serde(skip)]
        base: MetadataBase,
        code: String,
        #[serde(default)]
        pages: Option<u32>,
    }

    impl RaisedSearchMetadata for SampleMetadata {
        const EXTRA_VERSION: i32 = 3;

        fn base(&self) -> &MetadataBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut MetadataBase {
            &mut self.base
        }

        fn indexed_extra(&self) -> Option<String> {
            Some(self.code.clone())
        }
    }

    fn sample() -> SampleMetadata {
        SampleMetadata {
            base: MetadataBase {
                manga_id: 7,
                uploader: Some("uploader".to_string()),
                tags: vec![
                    RaisedTag::new(Some("female"), "glasses", 0),
                    RaisedTag::new(None, "oneshot", 1),
                    RaisedTag::new(Some("artist"), "someone", 0),
                ],
                titles: vec![
                    RaisedTitle { title: "Main".to_string(), title_type: 0 },
                    RaisedTitle { title: "Alt".to_string(), title_type: 1 },
                ],
            },
            code: "abc".to_string(),
            pages: Some(24),
        }
    }

    #[test]
    fn test_flatten_then_raise_reconstructs() {
        let original = sample();
        let flat = original.flatten().unwrap();
        let raised: SampleMetadata = flat.raise().unwrap();
        assert_eq!(raised, original);
    }

    #[test]
    fn test_flatten_writes_rows() {
        let flat = sample().flatten().unwrap();
        assert_eq!(flat.metadata.manga_id, 7);
        assert_eq!(flat.metadata.indexed_extra.as_deref(), Some("abc"));
        assert_eq!(flat.metadata.extra_version, 3);
        assert_eq!(flat.metadata.extra, r#"{"code":"abc","pages":24}"#);
        assert_eq!(flat.tags.len(), 3);
        assert!(flat.tags.iter().all(|t| t.manga_id == 7 && t.id.is_none()));
        assert_eq!(flat.titles[1].title, "Alt");
    }

    #[test]
    fn test_virtual_tags_not_stored() {
        let mut meta = sample();
        meta.base.tags.push(RaisedTag::new(Some("genre"), "doujinshi", TAG_TYPE_VIRTUAL));
        let flat = meta.flatten().unwrap();
        assert_eq!(flat.tags.len(), 3);
        assert!(flat.tags.iter().all(|t| t.tag_type != TAG_TYPE_VIRTUAL));
    }

    #[test]
    fn test_raise_rejects_unknown_fields() {
        let mut flat = sample().flatten().unwrap();
        flat.metadata.extra = r#"{"code":"abc","gid":"1"}"#.to_string();
        let err = flat.raise::<SampleMetadata>().unwrap_err();
        assert!(matches!(err, YomuError::MetadataDecode { manga_id: 7, .. }));
    }

    #[test]
    fn test_raise_rejects_missing_required_field() {
        let mut flat = sample().flatten().unwrap();
        flat.metadata.extra = r#"{"pages":1}"#.to_string();
        assert!(flat.raise::<SampleMetadata>().is_err());
    }

    #[test]
    fn test_raise_rejects_garbage() {
        let mut flat = sample().flatten().unwrap();
        flat.metadata.extra = "not json".to_string();
        assert!(flat.raise::<SampleMetadata>().is_err());
    }

    #[test]
    fn test_title_helpers() {
        let mut meta = sample();
        assert_eq!(meta.title_of_type(1), Some("Alt"));
        meta.replace_title_of_type(1, Some("Other".to_string()));
        assert_eq!(meta.title_of_type(1), Some("Other"));
        meta.replace_title_of_type(0, None);
        assert_eq!(meta.title_of_type(0), None);
        assert_eq!(meta.base.titles.len(), 1);
    }

    #[test]
    fn test_tag_strings() {
        let meta = sample();
        assert_eq!(
            meta.tags_to_genre_string(),
            "female: glasses, oneshot, artist: someone"
        );
        assert_eq!(
            meta.tags_to_description(),
            "artist: someone\nfemale: glasses\nmisc: oneshot"
        );
        assert_eq!(meta.tags_of_namespace("female").len(), 1);
    }
}
