//! HTTP room API: create, query and leave rooms.
//!
//! Errors are returned as `{"error": "..."}` with a matching status code.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use twentyone_protocol::{CreatedRoom, PlayerId, RoomId, RoomSummary};
use twentyone_room::{Departure, Registry, RoomError};

use crate::dispatch::announce_departure;

const LOG_TARGET: &str = "twentyone::http";

/// Builds the room API router over a shared registry.
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/api/room/create", post(create_room))
        .route("/api/room/:room_id", get(query_room).delete(leave_room))
        .layer(middleware::from_fn(log_requests))
        .with_state(registry)
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => {
                tracing::error!(target: LOG_TARGET, %message, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::NotFound(_) => ApiError::NotFound("room not found".into()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_room(
    State(registry): State<Arc<Registry>>,
) -> Result<Json<CreatedRoom>, ApiError> {
    let room = registry.create_room()?;
    Ok(Json(CreatedRoom {
        room_id: room.id().clone(),
    }))
}

async fn query_room(
    State(registry): State<Arc<Registry>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSummary>, ApiError> {
    let room = registry
        .room(&RoomId::new(room_id))
        .ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    Ok(Json(room.info()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaveParams {
    #[serde(default)]
    player_id: Option<String>,
}

async fn leave_room(
    State(registry): State<Arc<Registry>>,
    Path(room_id): Path<String>,
    Query(params): Query<LeaveParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let player_id = params
        .player_id
        .filter(|id| !id.is_empty())
        .map(PlayerId::new)
        .ok_or_else(|| ApiError::BadRequest("missing playerId".into()))?;
    let room_id = RoomId::new(room_id);

    match registry.leave_room(&room_id, &player_id) {
        Departure::Left(room) => {
            tracing::info!(%room_id, %player_id, "player left over http");
            announce_departure(&room);
        }
        Departure::Closed => {
            tracing::info!(%room_id, %player_id, "last player left over http");
        }
        Departure::Absent => {}
    }
    Ok(Json(json!({ "message": "left room" })))
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Logs each request with its status and duration.
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    tracing::debug!(target: LOG_TARGET, %method, %path, "incoming request");

    let start = Instant::now();
    let response = next.run(request).await;

    tracing::info!(
        target: LOG_TARGET,
        %method,
        %path,
        status = response.status().as_u16(),
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "request completed"
    );
    response
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Method;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    async fn call(
        app: Router,
        method: Method,
        uri: &str,
    ) -> (StatusCode, Value) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_create_then_query() {
        let registry = Arc::new(Registry::default());
        let (status, body) =
            call(router(Arc::clone(&registry)), Method::POST, "/api/room/create")
                .await;
        assert_eq!(status, StatusCode::OK);
        let room_id = body["roomId"].as_str().unwrap().to_owned();
        assert_eq!(room_id.len(), 5);

        let (status, body) = call(
            router(registry),
            Method::GET,
            &format!("/api/room/{room_id}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"roomId": room_id, "playerCount": 0, "status": "waiting"})
        );
    }

    #[tokio::test]
    async fn test_query_missing_room_is_404() {
        let app = router(Arc::new(Registry::default()));
        let (status, body) = call(app, Method::GET, "/api/room/99999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "room not found"}));
    }

    #[tokio::test]
    async fn test_leave_requires_player_id() {
        let registry = Arc::new(Registry::default());
        let room = registry.create_room().unwrap();
        for uri in [
            format!("/api/room/{}", room.id()),
            format!("/api/room/{}?playerId=", room.id()),
        ] {
            let (status, body) =
                call(router(Arc::clone(&registry)), Method::DELETE, &uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({"error": "missing playerId"}));
        }
    }

    #[tokio::test]
    async fn test_leave_removes_player_and_is_idempotent() {
        let registry = Arc::new(Registry::default());
        let room = registry.create_room().unwrap();
        let room_id = room.id().clone();
        registry
            .join_room(&room_id, &PlayerId::from("a"), "A", None)
            .unwrap();
        registry
            .join_room(&room_id, &PlayerId::from("b"), "B", None)
            .unwrap();

        let uri = format!("/api/room/{room_id}?playerId=a");
        for _ in 0..2 {
            let (status, body) =
                call(router(Arc::clone(&registry)), Method::DELETE, &uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"message": "left room"}));
        }
        assert_eq!(room.player_count(), 1);

        // The last player out deletes the room.
        let uri = format!("/api/room/{room_id}?playerId=b");
        call(router(Arc::clone(&registry)), Method::DELETE, &uri).await;
        assert!(registry.room(&room_id).is_none());
    }
}
