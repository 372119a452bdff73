//! Raised metadata types for the sources that index galleries.

mod ehentai;
mod mangadex;
mod nhentai;

pub use ehentai::EHentaiSearchMetadata;
pub use mangadex::MangaDexSearchMetadata;
pub use nhentai::NHentaiSearchMetadata;
