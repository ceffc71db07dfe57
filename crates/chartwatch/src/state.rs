use serde::Serialize;

use crate::cache::{CacheState, LibraryCache};

#[derive(Clone)]
pub struct AppState {
    pub cache: LibraryCache,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct LibraryStatusResponse {
    pub state: CacheState,
    pub count: usize,
    pub message: String,
}

#[derive(Serialize)]
pub struct SongResponse {
    pub ordinal: usize,
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub album_id: i64,
    pub media_cached: bool,
    pub image_cached: bool,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub media_scanned: usize,
    pub media_deleted: usize,
    pub image_scanned: usize,
    pub image_deleted: usize,
    pub message: String,
}
