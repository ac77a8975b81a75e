//! HTTP transport: bounded body reading, auth, CORS, SSE framing.
//!
//! The transport never parses domain objects; it normalizes the request,
//! hands the bytes to the router, and writes whatever plan comes back as
//! JSON, a single SSE event, or a long-lived stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::{Stream, StreamExt};
use serde_json::json;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::Runtime;
use super::router::{self, RpcHeaders};
use crate::config::protocol;
use crate::model::revision::sha256_hex;

/// Create the axum router for the MCP server.
pub fn create_router(runtime: Arc<Runtime>) -> Router {
    let base_path = runtime.config.base_path.clone();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("last-event-id"),
        ])
        .max_age(protocol::CORS_MAX_AGE);

    let mut app = Router::new().route(
        &base_path,
        get(handle_mcp_get)
            .post(handle_mcp_post)
            .delete(handle_mcp_delete)
            .options(handle_mcp_options),
    );
    if base_path != "/" {
        app = app.route("/", get(health_check));
    }
    app.route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(handle_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(runtime)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "ashfox-mcp",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness_check(State(runtime): State<Arc<Runtime>>) -> impl IntoResponse {
    Json(json!({
        "status": "ready",
        "service": "ashfox-mcp",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": runtime.sessions.count().await,
        "tools": runtime.registry.len(),
    }))
}

async fn handle_metrics(State(runtime): State<Arc<Runtime>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        runtime.metrics.render(),
    )
        .into_response()
}

/// Build a low-level HTTP error body: `{"error":{"code","message"}}`.
fn http_error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "error": { "code": code, "message": message } }))).into_response()
}

/// Bearer check; `Ok` carries the principal fingerprint when auth is on.
fn check_auth(runtime: &Runtime, headers: &HeaderMap) -> Result<Option<String>, Response> {
    let Some(expected) = &runtime.config.auth_token else {
        return Ok(None);
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == expected => Ok(Some(sha256_hex(token.as_bytes())[..16].to_string())),
        _ => Err(http_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        )),
    }
}

fn wants_sse(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

fn rpc_headers(headers: &HeaderMap, principal: Option<String>) -> RpcHeaders {
    let read = |name: &str| {
        headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    };
    RpcHeaders {
        session_id: read(protocol::SESSION_HEADER),
        protocol_version: read(protocol::VERSION_HEADER),
        principal,
    }
}

enum BodyError {
    TooLarge,
    Timeout,
    Aborted,
}

/// Read the request body bounded by the size cap and the read timeout.
async fn read_body(body: Body) -> Result<Vec<u8>, BodyError> {
    let collect = async {
        let mut stream = body.into_data_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|_| BodyError::Aborted)?;
            if buf.len() + chunk.len() > protocol::MAX_BODY_BYTES {
                return Err(BodyError::TooLarge);
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    };
    match tokio::time::timeout(protocol::BODY_READ_TIMEOUT, collect).await {
        Ok(result) => result,
        Err(_) => Err(BodyError::Timeout),
    }
}

async fn handle_mcp_post(State(runtime): State<Arc<Runtime>>, request: Request) -> Response {
    let headers = request.headers().clone();

    let principal = match check_auth(&runtime, &headers) {
        Ok(principal) => principal,
        Err(response) => {
            runtime.metrics.record_request("POST", 401);
            return response;
        }
    };

    let json_content = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !json_content {
        runtime.metrics.record_request("POST", 415);
        return http_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            "Content-Type must be application/json",
        );
    }

    let body = match read_body(request.into_body()).await {
        Ok(body) => body,
        Err(BodyError::TooLarge) => {
            runtime.metrics.record_request("POST", 413);
            return http_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "payload too large",
            );
        }
        Err(BodyError::Timeout) => {
            runtime.metrics.record_request("POST", 408);
            return http_error(
                StatusCode::REQUEST_TIMEOUT,
                "request_timeout",
                "timed out reading request body",
            );
        }
        Err(BodyError::Aborted) => {
            runtime.metrics.record_request("POST", 499);
            let status =
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return http_error(status, "request_aborted", "client closed request");
        }
    };

    let rpc = rpc_headers(&headers, principal);
    let outcome = router::handle_rpc(&runtime, &rpc, &body).await;
    runtime.metrics.record_request(&outcome.method_label, outcome.status);

    let mut response = match &outcome.response {
        None => StatusCode::ACCEPTED.into_response(),
        Some(payload) => {
            if wants_sse(&headers) {
                // a single SSE event, then the connection closes
                let data = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
                let frame = format!("id: 0\nevent: message\ndata: {data}\n\n");
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    frame,
                )
                    .into_response()
            } else {
                Json(payload).into_response()
            }
        }
    };
    if let Some(session) = &outcome.session {
        if let Ok(value) = HeaderValue::from_str(&session.id) {
            response.headers_mut().insert(protocol::SESSION_HEADER, value);
        }
    }
    response
}

async fn handle_mcp_get(State(runtime): State<Arc<Runtime>>, headers: HeaderMap) -> Response {
    if let Err(response) = check_auth(&runtime, &headers) {
        runtime.metrics.record_request("GET", 401);
        return response;
    }
    if !wants_sse(&headers) {
        runtime.metrics.record_request("GET", 406);
        return http_error(
            StatusCode::NOT_ACCEPTABLE,
            "not_acceptable",
            "GET requires Accept: text/event-stream",
        );
    }

    let session_id = headers
        .get(protocol::SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let session = match session_id {
        Some(id) => runtime.sessions.get(&id).await,
        None => None,
    };
    let Some(session) = session else {
        runtime.metrics.record_request("GET", 404);
        return http_error(StatusCode::NOT_FOUND, "unknown_session", "unknown session");
    };

    tracing::info!(session_id = %session.id, "SSE stream attached");
    runtime.metrics.record_request("GET", 200);

    let guard = session.attach_sse(Arc::clone(&runtime.metrics));
    let receiver = session.subscribe();
    let stream = event_stream(guard, receiver);

    let mut response = Sse::new(stream)
        .keep_alive(
            KeepAlive::new().interval(protocol::SSE_KEEPALIVE).text("keepalive"),
        )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&session.id) {
        response.headers_mut().insert(protocol::SESSION_HEADER, value);
    }
    response
        .headers_mut()
        .insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    response
}

/// Live events until the session closes, the client disconnects, or the
/// subscriber lags past the buffer (slow-consumer eviction).
fn event_stream(
    guard: super::session::SseGuard,
    mut receiver: broadcast::Receiver<super::session::SessionEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let _guard = guard;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if event.event == CLOSE_EVENT {
                        break;
                    }
                    yield Ok(event.to_sse_event());
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "SSE subscriber lagged, closing stream");
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Internal event name that terminates attached streams.
pub const CLOSE_EVENT: &str = "__session_closed";

async fn handle_mcp_delete(State(runtime): State<Arc<Runtime>>, headers: HeaderMap) -> Response {
    if let Err(response) = check_auth(&runtime, &headers) {
        runtime.metrics.record_request("DELETE", 401);
        return response;
    }
    let session_id = headers
        .get(protocol::SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(session_id) = session_id else {
        runtime.metrics.record_request("DELETE", 404);
        return http_error(StatusCode::NOT_FOUND, "unknown_session", "unknown session");
    };
    if let Some(session) = runtime.sessions.get(&session_id).await {
        session.notify(CLOSE_EVENT, "{}");
    }
    if runtime.sessions.remove(&session_id).await {
        runtime.metrics.record_request("DELETE", 200);
        Json(json!({ "ok": true })).into_response()
    } else {
        runtime.metrics.record_request("DELETE", 404);
        http_error(StatusCode::NOT_FOUND, "unknown_session", "unknown session")
    }
}

async fn handle_mcp_options() -> StatusCode {
    StatusCode::NO_CONTENT
}
