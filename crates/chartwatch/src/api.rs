use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::warn;

use crate::cache::CacheState;
use crate::state::{
    AppState, CleanupResponse, ErrorResponse, HealthResponse, LibraryStatusResponse,
    RefreshResponse, SongResponse,
};

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/library", get(library_status))
        .route("/api/v1/library/songs/:ordinal", get(get_song))
        .route("/api/v1/library/refresh", post(refresh))
        .route("/api/v1/library/cleanup", post(cleanup))
        .with_state(state)
}

pub fn json_error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn library_status(State(state): State<AppState>) -> Json<LibraryStatusResponse> {
    let count = state.cache.count();
    let message = if count == 0 {
        "No song cached".to_string()
    } else {
        format!("{} songs cached", count)
    };
    Json(LibraryStatusResponse {
        state: state.cache.state(),
        count,
        message,
    })
}

async fn get_song(State(state): State<AppState>, AxumPath(ordinal): AxumPath<usize>) -> Response {
    let song = match state.cache.get(ordinal) {
        Some(song) => song,
        None => return json_error_response(StatusCode::NOT_FOUND, "song not found"),
    };
    Json(SongResponse {
        ordinal,
        id: song.id(),
        title: song.record.title.clone(),
        artist: song.record.artist.clone(),
        album_id: song.album_id(),
        media_cached: song.media_path.is_file(),
        image_cached: song.image_path.is_file(),
    })
    .into_response()
}

async fn refresh(State(state): State<AppState>) -> Response {
    match state.cache.fetch().await {
        Ok(count) => Json(RefreshResponse { count }).into_response(),
        Err(err) => json_error_response(StatusCode::BAD_GATEWAY, err.to_string()),
    }
}

async fn cleanup(State(state): State<AppState>) -> Response {
    if !matches!(state.cache.state(), CacheState::Ready | CacheState::Refreshing) {
        return json_error_response(StatusCode::CONFLICT, "library is not ready");
    }
    let cache = state.cache.clone();
    let report = match tokio::task::spawn_blocking(move || cache.cleanup()).await {
        Ok(report) => report,
        Err(err) => {
            warn!("Cleanup task failed: {}", err);
            return json_error_response(StatusCode::INTERNAL_SERVER_ERROR, "cleanup failed");
        }
    };
    match report {
        Some(report) => Json(CleanupResponse {
            media_scanned: report.media_scanned,
            media_deleted: report.media_deleted,
            image_scanned: report.image_scanned,
            image_deleted: report.image_deleted,
            message: report.to_string(),
        })
        .into_response(),
        None => json_error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "documents directory is not readable",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::api_router;
    use crate::cache::LibraryCache;
    use crate::fetch::ChartFetcher;
    use crate::state::AppState;
    use common::SongRecord;
    use library::ArchiveStore;
    use reqwest::{Client, StatusCode};
    use serde_json::Value;
    use std::path::Path;

    async fn spawn_api(documents: &Path, archive: &Path, seed: Option<Vec<SongRecord>>) -> String {
        let fetcher = ChartFetcher::new(
            Client::new(),
            "http://127.0.0.1:9/chart/current",
            documents.to_path_buf(),
        );
        let store = ArchiveStore::new(archive.to_path_buf());
        if let Some(records) = &seed {
            store.save(records).unwrap();
        }
        let cache = LibraryCache::new(documents.to_path_buf(), store, fetcher, false);
        if seed.is_some() {
            assert!(cache.load().await.restored());
        }
        let app = api_router(AppState { cache });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn seeded() -> Vec<SongRecord> {
        vec![SongRecord {
            id: 5,
            title: "Super Shy".to_string(),
            artist: "NewJeans".to_string(),
            album_id: 50,
        }]
    }

    #[tokio::test]
    async fn empty_library_reports_no_songs() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_api(dir.path(), &dir.path().join("songs.redb"), None).await;
        let client = Client::new();

        let status: Value = client
            .get(format!("{}/api/v1/library", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["count"], 0);
        assert_eq!(status["state"], "empty");
        assert_eq!(status["message"], "No song cached");

        let missing = client
            .get(format!("{}/api/v1/library/songs/0", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cleanup_before_first_load_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("7.mp3"), b"x").unwrap();
        let base = spawn_api(dir.path(), &dir.path().join("songs.redb"), None).await;

        let response = Client::new()
            .post(format!("{}/api/v1/library/cleanup", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(dir.path().join("7.mp3").exists());
    }

    #[tokio::test]
    async fn cleanup_reports_counts_or_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let documents = dir.path().join("documents");
        std::fs::create_dir(&documents).unwrap();
        std::fs::write(documents.join("5.mp3"), b"x").unwrap();
        std::fs::write(documents.join("7.mp3"), b"x").unwrap();
        let base = spawn_api(&documents, &dir.path().join("songs.redb"), Some(seeded())).await;
        let client = Client::new();

        let song: Value = client
            .get(format!("{}/api/v1/library/songs/0", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(song["id"], 5);
        assert_eq!(song["media_cached"], true);

        let report: Value = client
            .post(format!("{}/api/v1/library/cleanup", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report["media_deleted"], 1);
        assert_eq!(report["message"], "1/2 media files\n0/0 image files");
        assert!(documents.join("5.mp3").exists());
        assert!(!documents.join("7.mp3").exists());

        std::fs::remove_dir_all(&documents).unwrap();
        let unavailable = client
            .post(format!("{}/api/v1/library/cleanup", base))
            .send()
            .await
            .unwrap();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn refresh_failure_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_api(dir.path(), &dir.path().join("songs.redb"), None).await;

        let response = Client::new()
            .post(format!("{}/api/v1/library/refresh", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
