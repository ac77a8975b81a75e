//! Fixed and templated MCP resources.

use std::sync::Arc;

use serde_json::{Value, json};
use url::Url;

use crate::error::{ToolError, ToolResult};
use crate::presets;
use crate::trace::TraceRecorder;

/// A readable resource body.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

struct FixedEntry {
    uri: &'static str,
    name: &'static str,
    description: &'static str,
    mime_type: &'static str,
    text: &'static str,
}

const GUIDES: &[FixedEntry] = &[
    FixedEntry {
        uri: "ashfox://guides/getting-started",
        name: "Getting started",
        description: "First steps: initialize, discover tools, create a project.",
        mime_type: "text/markdown",
        text: "# Getting started\n\n\
            1. Call `initialize`, then `notifications/initialized`.\n\
            2. Call `tools/list` to discover the tool catalogue.\n\
            3. Call `get_project_state` and note the `revision`.\n\
            4. Build the rig with `add_bone` / `add_cube`, passing `ifRevision` each time.\n",
    },
    FixedEntry {
        uri: "ashfox://guides/revision-workflow",
        name: "Revision workflow",
        description: "How the optimistic-concurrency gate works and how to recover.",
        mime_type: "text/markdown",
        text: "# Revision workflow\n\n\
            Every mutating tool requires `ifRevision`. On \
            `invalid_state_revision_mismatch`, re-run `get_project_state` and retry \
            once with the fresh revision. Composite tools (`apply_blueprint`, \
            `apply_preset`) assert one outer revision for the whole batch.\n",
    },
    FixedEntry {
        uri: "ashfox://guides/export-pipeline",
        name: "Export pipeline",
        description: "Deterministic geometry and animation artifacts.",
        mime_type: "text/markdown",
        text: "# Export pipeline\n\n\
            `export_model` assembles byte-stable artifacts from the current \
            snapshot: a `*.geo.json` geometry file and a `*.animation.json` clip \
            file. Each response carries the SHA-256 of every artifact; identical \
            state always yields identical bytes.\n",
    },
];

/// Read-mostly resource catalogue.
pub struct ResourceStore {
    trace: Arc<TraceRecorder>,
}

impl ResourceStore {
    #[must_use]
    pub fn new(trace: Arc<TraceRecorder>) -> Self {
        Self { trace }
    }

    /// Fixed resource listing for `resources/list`.
    #[must_use]
    pub fn list(&self) -> Vec<Value> {
        let mut out: Vec<Value> = GUIDES
            .iter()
            .map(|entry| {
                json!({
                    "uri": entry.uri,
                    "name": entry.name,
                    "description": entry.description,
                    "mimeType": entry.mime_type,
                })
            })
            .collect();
        out.push(json!({
            "uri": "ashfox://trace/recent",
            "name": "Recent tool calls",
            "description": "Ring buffer of recent tool invocations with revisions and timings.",
            "mimeType": "application/json",
        }));
        out
    }

    /// Template listing for `resources/templates/list`.
    #[must_use]
    pub fn list_templates(&self) -> Vec<Value> {
        vec![json!({
            "uriTemplate": "ashfox://presets/{name}",
            "name": "Preset blueprint",
            "description": format!(
                "Blueprint operations for a starter rig; names: {}",
                presets::PRESET_NAMES.join(", ")
            ),
            "mimeType": "application/json",
        })]
    }

    /// Resolve and read a URI.
    ///
    /// # Errors
    ///
    /// `resource_not_found` for anything the catalogue does not know.
    pub fn read(&self, uri: &str) -> ToolResult<ResourceContent> {
        let parsed = Url::parse(uri)
            .map_err(|_| ToolError::resource_not_found(format!("invalid resource uri: {uri}")))?;
        if parsed.scheme() != "ashfox" {
            return Err(ToolError::resource_not_found(format!("unknown resource: {uri}")));
        }

        if let Some(entry) = GUIDES.iter().find(|entry| entry.uri == uri) {
            return Ok(ResourceContent {
                uri: uri.to_string(),
                mime_type: entry.mime_type.to_string(),
                text: entry.text.to_string(),
            });
        }

        if uri == "ashfox://trace/recent" {
            let text = serde_json::to_string_pretty(&self.trace.recent())
                .unwrap_or_else(|_| "[]".to_string());
            return Ok(ResourceContent {
                uri: uri.to_string(),
                mime_type: "application/json".to_string(),
                text,
            });
        }

        if parsed.host_str() == Some("presets") {
            let name = parsed.path().trim_start_matches('/');
            let ops = presets::preset(name)
                .map_err(|_| ToolError::resource_not_found(format!("unknown preset: {name}")))?;
            let text = serde_json::to_string_pretty(&ops).unwrap_or_else(|_| "[]".to_string());
            return Ok(ResourceContent {
                uri: uri.to_string(),
                mime_type: "application/json".to_string(),
                text,
            });
        }

        Err(ToolError::resource_not_found(format!("unknown resource: {uri}")))
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ResourceStore {
        ResourceStore::new(Arc::new(TraceRecorder::new()))
    }

    #[test]
    fn test_list_contains_guides() {
        let listing = store().list();
        assert!(listing.iter().any(|r| r["uri"] == "ashfox://guides/getting-started"));
        assert!(listing.iter().any(|r| r["uri"] == "ashfox://trace/recent"));
    }

    #[test]
    fn test_read_guide() {
        let content = store().read("ashfox://guides/revision-workflow").unwrap();
        assert_eq!(content.mime_type, "text/markdown");
        assert!(content.text.contains("ifRevision"));
    }

    #[test]
    fn test_read_preset_template() {
        let content = store().read("ashfox://presets/biped").unwrap();
        assert_eq!(content.mime_type, "application/json");
        let ops: Vec<Value> = serde_json::from_str(&content.text).unwrap();
        assert!(!ops.is_empty());
    }

    #[test]
    fn test_unknown_uri() {
        let err = store().read("ashfox://nope/what").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ResourceNotFound);
        let err = store().read("http://example.com").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ResourceNotFound);
    }
}
