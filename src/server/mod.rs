//! HTTP 接口（axum）
//!
//! - GET  /health
//! - POST /games、GET /games、GET /games/:id
//! - POST /games/:id/rounds：批量回合，返回 {game, round}
//! - POST /games/:id/rounds/stream：SSE 流式回合；校验类错误在第一个事件之前以普通 HTTP 错误返回

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures_util::stream;
use serde::Deserialize;

use crate::core::GameError;
use crate::delivery::RoundService;
use crate::game::{CreateGameParams, Game};
use crate::round::RoundOutcome;

#[derive(Debug, Deserialize)]
pub struct RoundRequest {
    #[serde(default)]
    pub question: String,
}

/// GameError 到 HTTP 状态码的映射，响应体 {"error": "..."}
#[derive(Debug)]
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            GameError::Validation(_) => StatusCode::BAD_REQUEST,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::State(_) | GameError::Conflict(_) => StatusCode::CONFLICT,
            GameError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            GameError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), "request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn router(service: RoundService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/games", post(create_game).get(list_games))
        .route("/games/:id", get(get_game))
        .route("/games/:id/rounds", post(play_round))
        .route("/games/:id/rounds/stream", post(play_round_stream))
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /games：缺省或非正数参数使用默认值
async fn create_game(
    State(service): State<RoundService>,
    body: Option<Json<CreateGameParams>>,
) -> Result<(StatusCode, Json<Game>), ApiError> {
    let params = body.map(|Json(p)| p).unwrap_or_default();
    let game = service.create_game(params).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

async fn list_games(State(service): State<RoundService>) -> Result<Json<Vec<Game>>, ApiError> {
    Ok(Json(service.list_games().await?))
}

async fn get_game(
    State(service): State<RoundService>,
    Path(id): Path<String>,
) -> Result<Json<Game>, ApiError> {
    Ok(Json(service.get_game(&id).await?))
}

async fn play_round(
    State(service): State<RoundService>,
    Path(id): Path<String>,
    Json(req): Json<RoundRequest>,
) -> Result<Json<RoundOutcome>, ApiError> {
    Ok(Json(service.play_round(&id, &req.question).await?))
}

/// 客户端断开时响应体被丢弃，RoundStream 随之丢弃并取消后台回合
async fn play_round_stream(
    State(service): State<RoundService>,
    Path(id): Path<String>,
    Json(req): Json<RoundRequest>,
) -> Result<Response, ApiError> {
    let round_stream = service.play_round_stream(&id, &req.question).await?;

    let body = stream::unfold(round_stream, |mut rs| async move {
        let event = rs.next_event().await?;
        Some((event.encode().map(Bytes::from), rs))
    });

    let mut res = Response::new(Body::from_stream(body));
    let headers = res.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(res)
}
