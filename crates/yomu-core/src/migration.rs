//! Decide what a migration writes, given [`MigrationFlags`].
//!
//! Planning is pure: it reads snapshots of both entries and returns the
//! changes the caller applies to its library store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Chapter, LibraryEntry, MangaExtras, MigrationFlags, Track};

/// Everything known about the entry being migrated and its destination.
#[derive(Debug, Clone, Copy)]
pub struct MigrationInput<'a> {
    pub from: &'a LibraryEntry,
    pub to: &'a LibraryEntry,
    pub from_chapters: &'a [Chapter],
    pub to_chapters: &'a [Chapter],
    pub from_categories: &'a [i64],
    pub from_tracks: &'a [Track],
    pub from_extras: &'a MangaExtras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterUpdate {
    pub chapter_id: i64,
    pub read: bool,
    pub bookmark: bool,
    pub last_page_read: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryUpdate {
    pub manga_id: i64,
    pub favorite: bool,
    pub date_added: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub chapter_updates: Vec<ChapterUpdate>,
    /// `None` leaves the destination's categories alone.
    pub categories: Option<Vec<i64>>,
    pub tracks: Vec<Track>,
    pub copy_custom_cover: bool,
    pub extras: Option<MangaExtras>,
    pub delete_downloads: bool,
    /// Only set when the source entry is replaced.
    pub from_update: Option<EntryUpdate>,
    pub to_update: EntryUpdate,
}

/// Build the plan for moving `input.from` onto `input.to`.
///
/// With `replace` the source entry leaves the library and the destination
/// inherits its `date_added`; otherwise the destination is added as a copy.
pub fn plan_migration(
    input: MigrationInput<'_>,
    flags: MigrationFlags,
    replace: bool,
    now: DateTime<Utc>,
) -> MigrationPlan {
    let chapter_updates = if flags.has_chapters() {
        migrate_chapters(input.from_chapters, input.to_chapters)
    } else {
        Vec::new()
    };

    let categories = flags
        .has_categories()
        .then(|| input.from_categories.to_vec());

    let tracks = if flags.has_track() {
        input
            .from_tracks
            .iter()
            .map(|t| Track {
                manga_id: input.to.id,
                ..t.clone()
            })
            .collect()
    } else {
        Vec::new()
    };

    let extras = (flags.has_extra() && !input.from_extras.is_empty())
        .then(|| input.from_extras.clone());

    let from_update = replace.then(|| EntryUpdate {
        manga_id: input.from.id,
        favorite: false,
        date_added: input.from.date_added,
    });

    let to_update = EntryUpdate {
        manga_id: input.to.id,
        favorite: true,
        date_added: if replace {
            input.from.date_added
        } else {
            Some(now)
        },
    };

    let plan = MigrationPlan {
        chapter_updates,
        categories,
        tracks,
        copy_custom_cover: flags.has_custom_cover() && input.from.has_custom_cover,
        extras,
        delete_downloads: replace && flags.has_delete_downloaded() && input.from.has_downloads(),
        from_update,
        to_update,
    };

    debug!(
        from = input.from.id,
        to = input.to.id,
        %flags,
        replace,
        chapters = plan.chapter_updates.len(),
        tracks = plan.tracks.len(),
        "planned migration"
    );

    plan
}

/// Carry read state onto the destination chapters.
///
/// A recognized chapter is read when its number is at or below the highest
/// read number of the source. Bookmark and page progress come from the source
/// chapter with the same number. Unchanged chapters are left out.
fn migrate_chapters(from: &[Chapter], to: &[Chapter]) -> Vec<ChapterUpdate> {
    let max_read = from
        .iter()
        .filter(|c| c.read && c.is_recognized_number())
        .map(|c| c.chapter_number)
        .fold(None, |max: Option<f64>, n| Some(max.map_or(n, |m| m.max(n))));

    to.iter()
        .filter(|c| c.is_recognized_number())
        .filter_map(|chapter| {
            let mut update = ChapterUpdate {
                chapter_id: chapter.id,
                read: chapter.read,
                bookmark: chapter.bookmark,
                last_page_read: chapter.last_page_read,
            };

            if let Some(prev) = from
                .iter()
                .find(|p| p.is_recognized_number() && p.chapter_number == chapter.chapter_number)
            {
                update.bookmark = prev.bookmark;
                if !chapter.read {
                    update.last_page_read = prev.last_page_read;
                }
            }

            if max_read.is_some_and(|max| chapter.chapter_number <= max) {
                update.read = true;
            }

            let changed = update.read != chapter.read
                || update.bookmark != chapter.bookmark
                || update.last_page_read != chapter.last_page_read;
            changed.then_some(update)
        })
        .collect()
}
