//! MCP tool implementations.
//!
//! Each tool:
//! 1. Parses its arguments (already schema-validated by the dispatcher)
//! 2. Runs the mutation through the session's revision-guarded store
//! 3. Mirrors the change to the bound editor
//! 4. Returns a typed result the dispatcher wraps as `CallToolResult`

mod animation;
mod blueprint;
mod export;
mod model;
mod project;
mod texture;

pub use animation::*;
pub use blueprint::*;
pub use export::*;
pub use model::*;
pub use project::*;
pub use texture::*;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{ToolError, ToolResult};
use crate::model::ProjectStore;
use crate::ports::{EditorOp, EditorPort, SnapshotPort};

/// Tool execution context, bound to one session for one call.
pub struct ToolContext {
    /// The session's project state.
    pub store: Arc<ProjectStore>,
    /// Editor integration seam.
    pub editor: Arc<dyn EditorPort>,
    /// Host snapshot seam.
    pub snapshot: Arc<dyn SnapshotPort>,
}

impl ToolContext {
    #[must_use]
    pub fn new(
        store: Arc<ProjectStore>,
        editor: Arc<dyn EditorPort>,
        snapshot: Arc<dyn SnapshotPort>,
    ) -> Self {
        Self { store, editor, snapshot }
    }

    /// Mirror a semantic operation into the editor, mapping capability gaps
    /// and I/O failures to tool errors.
    pub async fn mirror(&self, op: EditorOp) -> ToolResult<()> {
        let caps = self.editor.capabilities();
        let supported = match op.capability() {
            "model" => caps.model,
            "textures" => caps.textures,
            "animations" => caps.animations,
            _ => false,
        };
        if !supported {
            return Err(ToolError::not_implemented(op.capability()));
        }
        self.editor.apply(op).await.map_err(ToolError::from)
    }
}

/// A successful tool result.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Structured payload returned to the agent.
    pub data: Value,
    /// Suggested follow-up tools.
    pub next_actions: Vec<&'static str>,
}

impl ToolOutput {
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self { data, next_actions: Vec::new() }
    }

    #[must_use]
    pub fn with_next_actions(mut self, next_actions: Vec<&'static str>) -> Self {
        self.next_actions = next_actions;
        self
    }
}

/// Trait for MCP tools.
#[async_trait::async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name (e.g. "add_bone").
    fn name(&self) -> &'static str;

    /// Tool description for the agent.
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters; `additionalProperties` is false.
    fn input_schema(&self) -> Value;

    /// Whether this tool mutates project state (and so takes `ifRevision`).
    fn mutating(&self) -> bool {
        false
    }

    /// Execute the tool with validated input.
    async fn execute(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput>;
}

/// Parse validated arguments into a typed struct.
pub(crate) fn parse_args<T: DeserializeOwned>(input: Value) -> ToolResult<T> {
    serde_json::from_value(input)
        .map_err(|e| ToolError::invalid_payload(format!("invalid arguments: {e}")))
}

/// Build an object schema with `additionalProperties: false`.
pub(crate) fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Same, plus the common mutating-tool arguments.
pub(crate) fn mutating_schema(mut properties: Value, required: &[&str]) -> Value {
    if let Some(map) = properties.as_object_mut() {
        map.insert(
            "ifRevision".to_string(),
            json!({
                "type": "string",
                "description": "Revision returned by get_project_state; required unless bypassed"
            }),
        );
        map.insert(
            "includeState".to_string(),
            json!({ "type": "boolean", "description": "Attach the project summary to meta.state" }),
        );
        map.insert(
            "includeDiff".to_string(),
            json!({ "type": "boolean", "description": "Attach a before/after diff to meta.diff" }),
        );
    }
    object_schema(properties, required)
}

/// Schema fragment for a numeric triple.
pub(crate) fn triple_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "number" },
        "minItems": 3,
        "maxItems": 3,
        "description": description,
    })
}

/// Register all tools.
#[must_use]
pub fn register_all_tools() -> Vec<Box<dyn McpTool>> {
    vec![
        // Project tools (2)
        Box::new(project::GetProjectStateTool),
        Box::new(project::CreateProjectTool),
        // Model tools (6)
        Box::new(model::AddBoneTool),
        Box::new(model::UpdateBoneTool),
        Box::new(model::DeleteBoneTool),
        Box::new(model::AddCubeTool),
        Box::new(model::UpdateCubeTool),
        Box::new(model::DeleteCubeTool),
        // Texture tools (4)
        Box::new(texture::AddTextureTool),
        Box::new(texture::UpdateTextureTool),
        Box::new(texture::DeleteTextureTool),
        Box::new(texture::GetTextureUsageTool),
        // Animation tools (5)
        Box::new(animation::CreateAnimationTool),
        Box::new(animation::UpdateAnimationTool),
        Box::new(animation::DeleteAnimationTool),
        Box::new(animation::SetKeyframesTool),
        Box::new(animation::SetTriggersTool),
        // Export tool (1)
        Box::new(export::ExportModelTool),
        // Composite tools (2)
        Box::new(blueprint::ApplyBlueprintTool),
        Box::new(blueprint::ApplyPresetTool),
    ]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_are_unique() {
        let tools = register_all_tools();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
        assert!(before >= 20);
    }

    #[test]
    fn test_schemas_are_closed() {
        for tool in register_all_tools() {
            let schema = tool.input_schema();
            assert_eq!(
                schema["additionalProperties"], false,
                "{} must close its schema",
                tool.name()
            );
        }
    }

    #[test]
    fn test_mutating_tools_take_if_revision() {
        for tool in register_all_tools() {
            if tool.mutating() {
                let schema = tool.input_schema();
                assert!(
                    schema["properties"]["ifRevision"].is_object(),
                    "{} must accept ifRevision",
                    tool.name()
                );
            }
        }
    }
}
