//! HTTP API server.
//!
//! Exposes search and the indexed video list as JSON under `/api`.

use crate::cli::Output;
use crate::clips::Clip;
use crate::config::Settings;
use crate::error::LecternError;
use crate::orchestrator::Orchestrator;
use crate::vector_store::IndexedVideo;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    if !orchestrator.keyword_index().is_indexed() {
        Output::warning("Keyword index not built; searches use semantic results only.");
    }

    let app = router(Arc::new(AppState { orchestrator }));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Lectern API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /api/health");
    Output::kv("Search", "POST /api/search");
    Output::kv("Videos", "GET  /api/videos");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/search", post(search))
        .route("/api/videos", get(list_videos))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
struct SearchResponse {
    clips: Vec<Clip>,
    query: String,
}

#[derive(Serialize)]
struct VideoListResponse {
    videos: Vec<IndexedVideo>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn status_for(error: &LecternError) -> StatusCode {
    match error {
        LecternError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: LecternError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        warn!("Request failed: {}", error);
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let keyword_index = state.orchestrator.keyword_index();
    Json(serde_json::json!({
        "status": "ok",
        "keyword_index": {
            "indexed": keyword_index.is_indexed(),
            "fragments": keyword_index.len(),
        },
    }))
}

async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> Response {
    match state.orchestrator.search(&req.query, req.top_k).await {
        Ok(clips) => Json(SearchResponse {
            clips,
            query: req.query,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_videos(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.list_videos().await {
        Ok(videos) => Json(VideoListResponse {
            total: videos.len(),
            videos,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::OpenAIEmbedder;
    use crate::keyword::{Bm25Params, KeywordIndex};
    use crate::vector_store::MemoryVectorStore;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> Arc<AppState> {
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Arc::new(KeywordIndex::new(
                dir.path().join("keyword_index.json"),
                Bm25Params::default(),
            )),
            Arc::new(OpenAIEmbedder::new().unwrap()),
            Arc::new(MemoryVectorStore::new()),
        );
        Arc::new(AppState { orchestrator })
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&LecternError::InvalidInput("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&LecternError::NotIndexed),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_search_rejects_zero_top_k() {
        let dir = TempDir::new().unwrap();
        let response = search(
            State(state(&dir)),
            Json(SearchRequest {
                query: "graphs".to_string(),
                top_k: 0,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blank_search_is_ok() {
        let dir = TempDir::new().unwrap();
        let response = search(
            State(state(&dir)),
            Json(SearchRequest {
                query: "  ".to_string(),
                top_k: 5,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_video_list() {
        let dir = TempDir::new().unwrap();
        let response = list_videos(State(state(&dir))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_router_builds() {
        let dir = TempDir::new().unwrap();
        let _router = router(state(&dir));
    }
}
