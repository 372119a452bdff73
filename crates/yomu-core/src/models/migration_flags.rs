use std::fmt;

use serde::{Deserialize, Serialize};

/// What carries over when a library entry moves to another source.
///
/// A plain bitmask. Every combination is valid and bits the type does not
/// know about survive a round trip through [`MigrationFlags::bits`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationFlags(u32);

impl MigrationFlags {
    pub const NONE: Self = Self(0);
    pub const CHAPTERS: Self = Self(0b00_0001);
    pub const CATEGORIES: Self = Self(0b00_0010);
    pub const TRACK: Self = Self(0b00_0100);
    pub const CUSTOM_COVER: Self = Self(0b00_1000);
    pub const EXTRA: Self = Self(0b01_0000);
    pub const DELETE_DOWNLOADED: Self = Self(0b10_0000);

    pub const DEFAULT: Self = Self(
        Self::CHAPTERS.0 | Self::CATEGORIES.0 | Self::TRACK.0 | Self::CUSTOM_COVER.0 | Self::EXTRA.0,
    );

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn has_chapters(self) -> bool {
        self.intersects(Self::CHAPTERS)
    }

    pub const fn has_categories(self) -> bool {
        self.intersects(Self::CATEGORIES)
    }

    pub const fn has_track(self) -> bool {
        self.intersects(Self::TRACK)
    }

    pub const fn has_custom_cover(self) -> bool {
        self.intersects(Self::CUSTOM_COVER)
    }

    pub const fn has_extra(self) -> bool {
        self.intersects(Self::EXTRA)
    }

    pub const fn has_delete_downloaded(self) -> bool {
        self.intersects(Self::DELETE_DOWNLOADED)
    }

    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Flags that apply to an entry: the cover flag only when it has a custom
    /// cover, the delete flag only when something is downloaded.
    pub fn available_for(has_custom_cover: bool, has_downloads: bool) -> Vec<MigrationFlag> {
        MigrationFlag::ALL
            .into_iter()
            .filter(|flag| match flag {
                MigrationFlag::CustomCover => has_custom_cover,
                MigrationFlag::DeleteDownloaded => has_downloads,
                _ => true,
            })
            .collect()
    }

    /// Indices into `available` of the flags set in `self`.
    pub fn enabled_positions(self, available: &[MigrationFlag]) -> Vec<usize> {
        available
            .iter()
            .enumerate()
            .filter(|(_, flag)| self.intersects(flag.bit()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Inverse of [`enabled_positions`](Self::enabled_positions). Positions
    /// past the end of `available` are ignored.
    pub fn from_positions(available: &[MigrationFlag], positions: &[usize]) -> Self {
        positions
            .iter()
            .filter_map(|&i| available.get(i))
            .fold(Self::NONE, |acc, flag| acc.with(flag.bit()))
    }

    pub fn iter(self) -> impl Iterator<Item = MigrationFlag> {
        MigrationFlag::ALL
            .into_iter()
            .filter(move |flag| self.intersects(flag.bit()))
    }
}

impl std::ops::BitOr for MigrationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl std::ops::BitAnd for MigrationFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl From<u32> for MigrationFlags {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Display for MigrationFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(MigrationFlag::label).collect();
        if labels.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", labels.join(", "))
        }
    }
}

/// A single named bit of [`MigrationFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationFlag {
    Chapters,
    Categories,
    Track,
    CustomCover,
    Extra,
    DeleteDownloaded,
}

impl MigrationFlag {
    pub const ALL: [MigrationFlag; 6] = [
        MigrationFlag::Chapters,
        MigrationFlag::Categories,
        MigrationFlag::Track,
        MigrationFlag::CustomCover,
        MigrationFlag::Extra,
        MigrationFlag::DeleteDownloaded,
    ];

    pub const fn bit(self) -> MigrationFlags {
        match self {
            MigrationFlag::Chapters => MigrationFlags::CHAPTERS,
            MigrationFlag::Categories => MigrationFlags::CATEGORIES,
            MigrationFlag::Track => MigrationFlags::TRACK,
            MigrationFlag::CustomCover => MigrationFlags::CUSTOM_COVER,
            MigrationFlag::Extra => MigrationFlags::EXTRA,
            MigrationFlag::DeleteDownloaded => MigrationFlags::DELETE_DOWNLOADED,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            MigrationFlag::Chapters => "chapters",
            MigrationFlag::Categories => "categories",
            MigrationFlag::Track => "tracking",
            MigrationFlag::CustomCover => "custom cover",
            MigrationFlag::Extra => "extra",
            MigrationFlag::DeleteDownloaded => "delete downloaded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_match_bitwise_and() {
        for bits in 0u32..128 {
            let f = MigrationFlags::from_bits(bits);
            assert_eq!(f.has_chapters(), bits & 0b00_0001 != 0);
            assert_eq!(f.has_categories(), bits & 0b00_0010 != 0);
            assert_eq!(f.has_track(), bits & 0b00_0100 != 0);
            assert_eq!(f.has_custom_cover(), bits & 0b00_1000 != 0);
            assert_eq!(f.has_extra(), bits & 0b01_0000 != 0);
            assert_eq!(f.has_delete_downloaded(), bits & 0b10_0000 != 0);
        }
    }

    #[test]
    fn test_unknown_bits_preserved() {
        let f = MigrationFlags::from_bits(0x8000_0001);
        assert!(f.has_chapters());
        assert_eq!(f.bits(), 0x8000_0001);
        assert_eq!(f.iter().count(), 1);
    }

    #[test]
    fn test_with_without() {
        let f = MigrationFlags::NONE | MigrationFlags::TRACK | MigrationFlags::EXTRA;
        assert!(f.has_track() && f.has_extra());
        let f = f.without(MigrationFlags::TRACK);
        assert!(!f.has_track());
        assert!(f.has_extra());
    }

    #[test]
    fn test_available_flags() {
        let all = MigrationFlags::available_for(true, true);
        assert_eq!(all.len(), 6);

        let plain = MigrationFlags::available_for(false, false);
        assert_eq!(
            plain,
            vec![
                MigrationFlag::Chapters,
                MigrationFlag::Categories,
                MigrationFlag::Track,
                MigrationFlag::Extra,
            ]
        );
    }

    #[test]
    fn test_positions_roundtrip_against_available() {
        let available = MigrationFlags::available_for(false, true);
        let flags = MigrationFlags::CATEGORIES | MigrationFlags::DELETE_DOWNLOADED;
        let positions = flags.enabled_positions(&available);
        assert_eq!(positions, vec![1, 4]);
        assert_eq!(MigrationFlags::from_positions(&available, &positions), flags);
    }

    #[test]
    fn test_positions_ignore_unavailable_flags() {
        let available = MigrationFlags::available_for(false, false);
        let flags = MigrationFlags::CUSTOM_COVER | MigrationFlags::CHAPTERS;
        assert_eq!(flags.enabled_positions(&available), vec![0]);
        assert_eq!(
            MigrationFlags::from_positions(&available, &[0, 99]),
            MigrationFlags::CHAPTERS
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(MigrationFlags::NONE.to_string(), "none");
        assert_eq!(
            (MigrationFlags::CHAPTERS | MigrationFlags::TRACK).to_string(),
            "chapters, tracking"
        );
    }
}
