//! HTTP binding of the handshake endpoints.
//!
//! Every failure caused by what the peer sent collapses into one opaque
//! `401 AUTHENTICATION_FAILED`; the specific code is only logged.

use std::sync::Arc;

use axum::extract::State as AxumState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use fieldlink_protocol::handshake::{LoginRequest, LoginResponse, PreKeyRequest, PreKeyResponse};
use fieldlink_protocol::{HandshakeServer, ProtocolError};

type SharedServer = Arc<HandshakeServer>;

pub fn router(server: SharedServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/self/prekey", post(handle_prekey))
        .route("/self/login", post(handle_login))
        .route("/self/logout", post(handle_logout))
        .route("/self/detail", post(handle_detail))
        .route("/health", get(|| async { "ok" }))
        .layer(cors)
        .with_state(server)
}

#[derive(Debug)]
pub enum ApiError {
    Protocol(ProtocolError),
    Internal(String),
}

impl From<ProtocolError> for ApiError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Protocol(ProtocolError::MissingParameter(name)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "MISSING_PARAMETER", "parameter": name }),
            ),
            Self::Protocol(e) if e.is_authentication_failure() => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "AUTHENTICATION_FAILED" }),
            ),
            Self::Protocol(e) => {
                tracing::error!(code = e.code(), error = %e, "handshake failed internally");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "INTERNAL_ERROR" }),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "request failed internally");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "INTERNAL_ERROR" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Run a handshake step off the async runtime; login includes password hashing.
async fn blocking<T, F>(server: SharedServer, step: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&HandshakeServer) -> Result<T, ProtocolError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || step(&server))
        .await
        .map_err(|e| ApiError::Internal(format!("handshake task panicked: {e}")))?
        .map_err(ApiError::from)
}

async fn handle_prekey(
    AxumState(server): AxumState<SharedServer>,
    Json(req): Json<PreKeyRequest>,
) -> Result<Json<PreKeyResponse>, ApiError> {
    let response = blocking(server, move |s| s.issue_prekey(&req))
        .await
        .inspect_err(|e| {
            if let ApiError::Protocol(e) = e {
                tracing::warn!(code = e.code(), "pre-key request rejected");
            }
        })?;
    Ok(Json(response))
}

async fn handle_login(
    AxumState(server): AxumState<SharedServer>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    Ok(Json(blocking(server, move |s| s.login(&req)).await?))
}

async fn handle_logout(
    AxumState(server): AxumState<SharedServer>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = bearer_token(&headers).ok_or(ProtocolError::MissingParameter("authorization"))?;
    server.logout(&token).inspect_err(|e| {
        tracing::warn!(code = e.code(), "logout rejected");
    })?;
    Ok(Json(json!({})))
}

/// Describe the session behind the bearer token, renewing it.
async fn handle_detail(
    AxumState(server): AxumState<SharedServer>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = bearer_token(&headers).ok_or(ProtocolError::MissingParameter("authorization"))?;
    let session = server.resolve_session(&token).inspect_err(|e| {
        tracing::warn!(code = e.code(), "session lookup rejected");
    })?;
    Ok(Json(json!({
        "user_id": session.user.user_id,
        "organization_uid": session.user.organization_uid,
        "issued_at": session.issued_at.to_rfc3339(),
    })))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}
