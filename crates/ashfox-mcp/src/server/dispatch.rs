//! Tool dispatch: registry lookup, schema validation, response pipeline.

use std::sync::Arc;
use std::time::Instant;

use jsonschema::Validator;
use serde_json::{Value, json};

use super::session::Session;
use crate::error::{ToolError, rpc};
use crate::logging;
use crate::model::diff;
use crate::ports::{EditorPort, SnapshotPort};
use crate::tools::{McpTool, ToolContext, ToolOutput, register_all_tools};
use crate::trace::{TraceEntry, TraceRecorder};

/// A tool paired with its compiled input validator.
struct RegisteredTool {
    tool: Box<dyn McpTool>,
    validator: Validator,
}

/// Read-mostly registry of all exposed tools.
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Compile the default tool set.
    #[must_use]
    pub fn new() -> Self {
        Self::from_tools(register_all_tools())
    }

    /// Compile an explicit tool set; tools whose schema fails to compile are
    /// dropped with a warning.
    #[must_use]
    pub fn from_tools(tools: Vec<Box<dyn McpTool>>) -> Self {
        let mut entries = Vec::with_capacity(tools.len());
        for tool in tools {
            match jsonschema::validator_for(&tool.input_schema()) {
                Ok(validator) => entries.push(RegisteredTool { tool, validator }),
                Err(e) => {
                    tracing::warn!(tool = tool.name(), error = %e, "schema failed to compile");
                }
            }
        }
        Self { entries }
    }

    /// An empty registry (hot-reload in progress).
    #[must_use]
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `tools/list` payload.
    #[must_use]
    pub fn list_value(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|entry| {
                json!({
                    "name": entry.tool.name(),
                    "description": entry.tool.description(),
                    "inputSchema": entry.tool.input_schema(),
                })
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<&RegisteredTool> {
        self.entries.iter().find(|entry| entry.tool.name() == name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.entries.len()).finish()
    }
}

/// Everything a `tools/call` needs beyond the registry.
pub struct DispatchContext {
    pub session: Arc<Session>,
    pub editor: Arc<dyn EditorPort>,
    pub snapshot: Arc<dyn SnapshotPort>,
    pub trace: Arc<TraceRecorder>,
}

/// Handle `tools/call`.
///
/// # Errors
///
/// Protocol-level failures (unknown tool, schema violation) surface as
/// JSON-RPC errors; tool failures come back as an `isError` result with
/// HTTP 200 semantics.
pub async fn call_tool(
    registry: &ToolRegistry,
    ctx: &DispatchContext,
    params: &Value,
) -> Result<Value, (i32, String)> {
    if registry.is_empty() {
        return Ok(error_result(&ToolError::registry_empty()));
    }

    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return Err((rpc::INVALID_PARAMS, "Missing 'name' parameter".to_string()));
    };
    let Some(entry) = registry.find(name) else {
        return Err((rpc::INVALID_PARAMS, format!("Unknown tool: {name}")));
    };

    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    if let Some(violation) = entry.validator.iter_errors(&arguments).next() {
        return Err((
            rpc::INVALID_PARAMS,
            format!("invalid arguments at {}: {}", violation.instance_path(), violation),
        ));
    }

    let include_state = arguments.get("includeState").and_then(Value::as_bool).unwrap_or(false);
    let include_diff = arguments.get("includeDiff").and_then(Value::as_bool).unwrap_or(false);

    let before = if include_diff {
        Some(ctx.session.project.snapshot().await)
    } else {
        None
    };

    let tool_ctx = ToolContext::new(
        Arc::clone(&ctx.session.project),
        Arc::clone(&ctx.editor),
        Arc::clone(&ctx.snapshot),
    );

    let started = Instant::now();
    let outcome = entry.tool.execute(&tool_ctx, arguments).await;
    let duration_ms = started.elapsed().as_millis() as u64;
    let revision = ctx.session.project.revision().await;
    let ok = outcome.is_ok();

    ctx.trace.record(TraceEntry {
        tool: name.to_string(),
        revision: revision.clone(),
        duration_ms,
        ok,
        at: chrono::Utc::now(),
    });
    tracing::debug!(
        tool = name,
        ok,
        duration_ms,
        meta = %logging::meta_string(&json!({ "revision": revision })),
        "tool call finished"
    );

    match outcome {
        Ok(output) => {
            let mut meta = json!({});
            if include_state || include_diff {
                let (state, revision) = ctx.session.project.snapshot().await;
                if include_state {
                    meta["state"] = diff::summarize(&state, &revision);
                }
                if let Some((before_state, before_rev)) = before {
                    meta["diff"] = diff::diff(&before_state, &before_rev, &state, &revision);
                }
            }
            Ok(success_result(&output, meta))
        }
        Err(error) => Ok(error_result(&error)),
    }
}

fn success_result(output: &ToolOutput, mut meta: Value) -> Value {
    let text = serde_json::to_string(&output.data).unwrap_or_else(|_| "{}".to_string());
    if !output.next_actions.is_empty() {
        meta["nextActions"] = json!(output.next_actions);
    }
    let mut result = json!({
        "isError": false,
        "content": [{ "type": "text", "text": text }],
        "structuredContent": output.data,
    });
    if meta.as_object().is_some_and(|m| !m.is_empty()) {
        result["meta"] = meta;
    }
    result
}

fn error_result(error: &ToolError) -> Value {
    let mut result = json!({
        "isError": true,
        "content": [{ "type": "text", "text": error.message }],
        "structuredContent": { "ok": false, "error": error.to_wire() },
    });
    if error.code.retry_after_refresh() {
        result["meta"] = json!({ "retryAfterRefresh": true, "maxAttempts": 2 });
    }
    result
}
