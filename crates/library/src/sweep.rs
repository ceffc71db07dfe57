use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use common::{identity_from_path, IMAGE_EXTENSION, MEDIA_EXTENSION};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::SongIndex;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub media_scanned: usize,
    pub media_deleted: usize,
    pub image_scanned: usize,
    pub image_deleted: usize,
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} media files\n{}/{} image files",
            self.media_deleted, self.media_scanned, self.image_deleted, self.image_scanned
        )
    }
}

#[derive(Clone, Copy)]
enum FileKind {
    Media,
    Image,
}

/// Deletes media and image files in `dir` whose identity is not in `index`.
///
/// Only files directly inside `dir` named `<integer>.mp3` or `<integer>.jpg`
/// are considered. Returns `None` when `dir` cannot be listed.
pub fn sweep_orphans(dir: &Path, index: &SongIndex) -> Option<CleanupReport> {
    sweep_with(dir, index, |path| fs::remove_file(path))
}

fn sweep_with<F>(dir: &Path, index: &SongIndex, mut remove: F) -> Option<CleanupReport>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut report = CleanupReport::default();

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .max_depth(1)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                warn!("Cannot list {:?}: {}", dir, err);
                return None;
            }
            Err(err) => {
                debug!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let kind = match file_kind(path) {
            Some(kind) => kind,
            None => continue,
        };
        let identity = match identity_from_path(path) {
            Some(identity) => identity,
            None => continue,
        };

        let (known, scanned, deleted) = match kind {
            FileKind::Media => (
                index.contains_song(identity),
                &mut report.media_scanned,
                &mut report.media_deleted,
            ),
            FileKind::Image => (
                index.contains_album(identity),
                &mut report.image_scanned,
                &mut report.image_deleted,
            ),
        };
        *scanned += 1;
        if known {
            continue;
        }
        match remove(path) {
            Ok(()) => {
                debug!("Removed orphan {:?}", path);
                *deleted += 1;
            }
            Err(err) => warn!("Failed to remove {:?}: {}", path, err),
        }
    }

    info!(
        "Cleanup of {:?}: {} of {} media, {} of {} images removed",
        dir, report.media_deleted, report.media_scanned, report.image_deleted, report.image_scanned
    );
    Some(report)
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        MEDIA_EXTENSION => Some(FileKind::Media),
        IMAGE_EXTENSION => Some(FileKind::Image),
        _ => None,
    }
}
