use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MEDIA_EXTENSION: &str = "mp3";
pub const IMAGE_EXTENSION: &str = "jpg";

/// Identity and display fields of a chart song, as parsed and as archived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub album_id: i64,
}

impl SongRecord {
    pub fn hydrate(self, documents: &Path) -> Song {
        let media_path = media_path(documents, self.id);
        let image_path = image_path(documents, self.album_id);
        Song {
            record: self,
            media_path,
            image_path,
        }
    }
}

/// A song with its local file locations resolved. The paths are derived from
/// the record and are ignored by equality.
#[derive(Clone, Debug)]
pub struct Song {
    pub record: SongRecord,
    pub media_path: PathBuf,
    pub image_path: PathBuf,
}

impl Song {
    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn album_id(&self) -> i64 {
        self.record.album_id
    }

    pub fn title(&self) -> &str {
        &self.record.title
    }

    pub fn artist(&self) -> &str {
        &self.record.artist
    }
}

impl PartialEq for Song {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Eq for Song {}

pub fn media_path(documents: &Path, song_id: i64) -> PathBuf {
    documents.join(format!("{}.{}", song_id, MEDIA_EXTENSION))
}

pub fn image_path(documents: &Path, album_id: i64) -> PathBuf {
    documents.join(format!("{}.{}", album_id, IMAGE_EXTENSION))
}

/// Parses the integer identity out of a file name such as `101.mp3`.
pub fn identity_from_path(path: &Path) -> Option<i64> {
    let stem = path.file_stem()?.to_str()?;
    stem.parse::<i64>().ok()
}
