//! JSON-RPC 2.0 method routing and session resolution.

use std::borrow::Cow;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use super::Runtime;
use super::dispatch::{self, DispatchContext};
use super::session::Session;
use crate::config::protocol;
use crate::error::rpc;

/// Methods allowed to mint an implicit session when `Mcp-Session-Id` is
/// absent.
const IMPLICIT_METHODS: &[&str] = &[
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/read",
    "resources/templates/list",
    "ping",
];

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            result: None,
            error: Some(JsonRpcError { code, message: message.into() }),
            id,
        }
    }
}

/// Headers the router cares about.
#[derive(Debug, Clone, Default)]
pub struct RpcHeaders {
    pub session_id: Option<String>,
    pub protocol_version: Option<String>,
    /// Fingerprint of the authenticated principal, when auth is configured.
    pub principal: Option<String>,
}

/// What the transport should write back.
#[derive(Debug)]
pub struct RpcOutcome {
    /// 200 for responses, 202 for accepted notifications.
    pub status: u16,
    /// Absent for accepted notifications.
    pub response: Option<JsonRpcResponse>,
    /// Session to surface via `Mcp-Session-Id`.
    pub session: Option<Arc<Session>>,
    /// Label for the request counter: the RPC method, or "invalid".
    pub method_label: String,
}

impl RpcOutcome {
    fn respond(response: JsonRpcResponse, session: Option<Arc<Session>>, label: &str) -> Self {
        Self { status: 200, response: Some(response), session, method_label: label.to_string() }
    }

    fn accepted(session: Option<Arc<Session>>, label: &str) -> Self {
        Self { status: 202, response: None, session, method_label: label.to_string() }
    }
}

/// Pick the protocol version: the requested one when supported, the default
/// otherwise.
#[must_use]
pub fn negotiate_version(requested: Option<&str>) -> &'static str {
    match requested {
        Some(requested) => protocol::SUPPORTED_VERSIONS
            .iter()
            .find(|v| **v == requested)
            .copied()
            .unwrap_or(protocol::DEFAULT_VERSION),
        None => protocol::DEFAULT_VERSION,
    }
}

/// Decode and dispatch one JSON-RPC request body.
pub async fn handle_rpc(runtime: &Runtime, headers: &RpcHeaders, body: &[u8]) -> RpcOutcome {
    runtime.sessions.maybe_prune().await;

    let Ok(request) = serde_json::from_slice::<Value>(body) else {
        return RpcOutcome::respond(
            JsonRpcResponse::error(Value::Null, rpc::PARSE_ERROR, "Parse error"),
            None,
            "invalid",
        );
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let is_notification = id.is_null();
    let jsonrpc_ok = request.get("jsonrpc").and_then(Value::as_str) == Some("2.0");
    let method = request.get("method").and_then(Value::as_str).map(String::from);
    let (Some(method), true) = (method, jsonrpc_ok) else {
        return RpcOutcome::respond(
            JsonRpcResponse::error(id, rpc::INVALID_REQUEST, "Invalid Request"),
            None,
            "invalid",
        );
    };
    let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

    if method == "initialize" {
        if is_notification {
            return RpcOutcome::respond(
                JsonRpcResponse::error(
                    id,
                    rpc::INVALID_REQUEST,
                    "initialize requires a non-null id",
                ),
                None,
                &method,
            );
        }
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let version = negotiate_version(requested);
        let session = runtime.sessions.create(version, false).await;
        if let Some(principal) = &headers.principal {
            session.bind_principal(principal.clone()).await;
        }
        tracing::info!(session_id = %session.id, version, "initialize");
        let result = json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": true },
                "resources": { "listChanged": false },
            },
            "serverInfo": {
                "name": "ashfox-mcp",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        return RpcOutcome::respond(
            JsonRpcResponse::success(id, result),
            Some(session),
            &method,
        );
    }

    // resolve the session: explicit header, or implicit for the discovery set
    let session = match &headers.session_id {
        Some(session_id) => match runtime.sessions.get(session_id).await {
            Some(session) => session,
            None => {
                return RpcOutcome::respond(
                    JsonRpcResponse::error(id, rpc::NOT_INITIALIZED, "Unknown session"),
                    None,
                    &method,
                );
            }
        },
        None if IMPLICIT_METHODS.contains(&method.as_str()) => {
            runtime.sessions.create(protocol::DEFAULT_VERSION, true).await
        }
        None => {
            return RpcOutcome::respond(
                JsonRpcResponse::error(
                    id,
                    rpc::NOT_INITIALIZED,
                    "Session required; call initialize first",
                ),
                None,
                &method,
            );
        }
    };

    if let Some(requested) = &headers.protocol_version {
        let stored = session.protocol_version().await;
        if !requested.is_empty() && *requested != stored {
            return RpcOutcome::respond(
                JsonRpcResponse::error(
                    id,
                    rpc::INVALID_REQUEST,
                    format!("Protocol version mismatch: session negotiated {stored}"),
                ),
                Some(session),
                &method,
            );
        }
    }

    if method == "notifications/initialized" {
        session.mark_initialized();
        if is_notification {
            return RpcOutcome::accepted(Some(session), &method);
        }
        return RpcOutcome::respond(
            JsonRpcResponse::success(id, json!({})),
            Some(session),
            &method,
        );
    }

    if !session.is_initialized() {
        return RpcOutcome::respond(
            JsonRpcResponse::error(id, rpc::NOT_INITIALIZED, "Server not initialized"),
            Some(session),
            &method,
        );
    }

    let response = match method.as_str() {
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => {
            JsonRpcResponse::success(id, json!({ "tools": runtime.registry.list_value() }))
        }
        "tools/call" => {
            let ctx = DispatchContext {
                session: Arc::clone(&session),
                editor: Arc::clone(&runtime.editor),
                snapshot: Arc::clone(&runtime.snapshot),
                trace: Arc::clone(&runtime.trace),
            };
            match dispatch::call_tool(&runtime.registry, &ctx, &params).await {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err((code, message)) => JsonRpcResponse::error(id, code, message),
            }
        }
        "resources/list" => {
            JsonRpcResponse::success(id, json!({ "resources": runtime.resources.list() }))
        }
        "resources/templates/list" => JsonRpcResponse::success(
            id,
            json!({ "resourceTemplates": runtime.resources.list_templates() }),
        ),
        "resources/read" => match params.get("uri").and_then(Value::as_str) {
            Some(uri) => match runtime.resources.read(uri) {
                Ok(content) => JsonRpcResponse::success(
                    id,
                    json!({
                        "contents": [{
                            "uri": content.uri,
                            "mimeType": content.mime_type,
                            "text": content.text,
                        }]
                    }),
                ),
                Err(e) => JsonRpcResponse::error(
                    id,
                    rpc::INVALID_PARAMS,
                    format!("Resource not found: {}", e.message),
                ),
            },
            None => JsonRpcResponse::error(id, rpc::INVALID_PARAMS, "Missing 'uri' parameter"),
        },
        unknown => {
            if is_notification {
                return RpcOutcome::accepted(Some(session), unknown);
            }
            JsonRpcResponse::error(id, rpc::METHOD_NOT_FOUND, format!("Method not found: {unknown}"))
        }
    };

    if is_notification {
        return RpcOutcome::accepted(Some(session), &method);
    }
    RpcOutcome::respond(response, Some(session), &method)
}
