//! Route modules for the chunk relay server

pub mod health;
pub mod upload;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let timeout = state.config().server.request_timeout();

    Router::new()
        .merge(health::router())
        .merge(upload::router())
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::upload::{compute_hash, UploadMetadata, CHUNK_HASH_HEADER};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state(temp_dir: &TempDir) -> AppState {
        let mut config = Config::default();
        config.storage.chunk_dir = temp_dir.path().join("chunks");
        config.storage.output_dir = temp_dir.path().join("out");
        config.storage.ledger_path = temp_dir.path().join("fileInfoDB.json");
        config.upload.fixed_chunk_size = Some(4);
        AppState::new(config)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, data: &[u8]) -> UploadMetadata {
        let payload = serde_json::json!({
            "fileName": "digits.txt",
            "fileSize": data.len(),
            "fileHash": compute_hash(data),
        });
        let response = app
            .clone()
            .oneshot(
                Request::post("/register_file")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_value(body_json(response).await).unwrap()
    }

    fn chunk_request(id: &str, sequence: &str, data: &'static [u8], hash: &str) -> Request<Body> {
        Request::post(format!("/upload_chunk/{}/{}", id, sequence))
            .header("content-type", "application/octet-stream")
            .header(CHUNK_HASH_HEADER, hash)
            .body(Body::from(data))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(test_state(&temp_dir));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let health = body_json(response).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["service"], "chunk-relay");
        assert_eq!(health["trackedUploads"], 0);

        register(&app, b"0123456789").await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["trackedUploads"], 1);
    }

    #[tokio::test]
    async fn test_register_returns_plan() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(test_state(&temp_dir));

        let metadata = register(&app, b"0123456789").await;
        assert_eq!(metadata.chunk_size, 4);
        assert_eq!(metadata.total_chunks, 3);
        assert_eq!(metadata.file_size, 10);
    }

    #[tokio::test]
    async fn test_malformed_registration_is_bad_request() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(test_state(&temp_dir));

        let response = app
            .oneshot(
                Request::post("/register_file")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"fileName\": 12"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_chunk_input_errors() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(test_state(&temp_dir));
        let hash = compute_hash(b"0123");

        let missing_hash = Request::post("/upload_chunk/abc/1")
            .body(Body::from("0123"))
            .unwrap();
        let response = app.clone().oneshot(missing_hash).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "MISSING_CHUNK_HASH");

        let response = app
            .clone()
            .oneshot(chunk_request("abc", "one", b"0123", &hash))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_SEQUENCE");

        let response = app
            .oneshot(chunk_request("a.b", "1", b"0123", &hash))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tampered_chunk_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(test_state(&temp_dir));
        let metadata = register(&app, b"0123456789").await;

        let response = app
            .oneshot(chunk_request(&metadata.id, "1", b"0124", &compute_hash(b"0123")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "CHUNK_HASH_MISMATCH");
    }

    #[tokio::test]
    async fn test_status_reports_missing_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(test_state(&temp_dir));
        let metadata = register(&app, b"0123456789").await;

        let response = app
            .clone()
            .oneshot(chunk_request(&metadata.id, "2", b"4567", &compute_hash(b"4567")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/upload_status/{}", metadata.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "pending");
        assert_eq!(json["receivedChunks"], serde_json::json!([2]));
        assert_eq!(json["missingChunks"], serde_json::json!([1, 3]));

        let response = app
            .oneshot(
                Request::get("/upload_status/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_complete_unknown_upload_is_server_error() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(test_state(&temp_dir));

        let response = app
            .oneshot(
                Request::get("/complete_upload/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "METADATA_NOT_FOUND");
    }
}
