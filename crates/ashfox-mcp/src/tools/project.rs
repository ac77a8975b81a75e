//! Project tools: get_project_state, create_project.

use serde::Deserialize;
use serde_json::{Value, json};

use super::{McpTool, ToolContext, ToolOutput, mutating_schema, object_schema, parse_args};
use crate::error::{ToolError, ToolResult};
use crate::model::{MutationEffect, ProjectState, diff::summarize, usage};

/// Read the current project summary and revision.
pub struct GetProjectStateTool;

#[async_trait::async_trait]
impl McpTool for GetProjectStateTool {
    fn name(&self) -> &'static str {
        "get_project_state"
    }

    fn description(&self) -> &'static str {
        "Read the current project tree, its revision, and the derived texture usage digest."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "includeUsage": {
                    "type": "boolean",
                    "description": "Also derive the per-face texture usage mapping",
                    "default": false
                }
            }),
            &[],
        )
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            #[serde(default)]
            include_usage: bool,
        }
        let args: Args = parse_args(input)?;

        let (state, revision) = ctx.store.snapshot().await;
        let texture_usage = usage::derive_texture_usage(&state);
        let mut data = json!({
            "project": summarize(&state, &revision),
            "revision": revision,
            "uvUsageId": texture_usage.uv_usage_id,
        });
        if args.include_usage {
            data["textureUsage"] = usage::to_value(&texture_usage);
        }
        Ok(ToolOutput::new(data).with_next_actions(vec!["add_bone", "apply_preset"]))
    }
}

/// Start a fresh project, optionally seeded from the host snapshot.
pub struct CreateProjectTool;

#[async_trait::async_trait]
impl McpTool for CreateProjectTool {
    fn name(&self) -> &'static str {
        "create_project"
    }

    fn description(&self) -> &'static str {
        "Replace the session's project with a fresh one; optionally merge the host's current model."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "format": {
                    "type": "string",
                    "description": "Format descriptor, e.g. \"block\" or \"free\"",
                    "default": "free"
                },
                "uvPixelsPerBlock": { "type": "integer", "minimum": 1 },
                "loadExisting": {
                    "type": "boolean",
                    "description": "Merge the host editor's current model into the new project",
                    "default": false
                }
            }),
            &["name"],
        )
    }

    fn mutating(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            name: String,
            #[serde(default = "default_format")]
            format: String,
            uv_pixels_per_block: Option<u32>,
            #[serde(default)]
            load_existing: bool,
            if_revision: Option<String>,
        }
        fn default_format() -> String {
            "free".to_string()
        }
        let args: Args = parse_args(input)?;

        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                let mut fresh = ProjectState::new(args.name.clone(), args.format.clone());
                if let Some(uv) = args.uv_pixels_per_block {
                    fresh.uv_pixels_per_block = uv;
                }
                fresh.animation_time_policy = state.animation_time_policy;
                *state = fresh;
                Ok(MutationEffect::Changed)
            })
            .await?;

        let outcome = if args.load_existing {
            match ctx.snapshot.read_snapshot() {
                Some(snapshot) => ctx.store.merge_snapshot(snapshot).await?,
                None => {
                    return Err(ToolError::invalid_state(
                        "loadExisting requested but the host has no project",
                    ));
                }
            }
        } else {
            outcome
        };

        Ok(ToolOutput::new(json!({
            "revision": outcome.revision,
            "name": args.name,
            "format": args.format,
        }))
        .with_next_actions(vec!["get_project_state", "add_bone"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::context;

    #[tokio::test]
    async fn test_get_project_state_shape() {
        let (ctx, _) = context();
        let output = GetProjectStateTool
            .execute(&ctx, json!({ "includeUsage": true }))
            .await
            .unwrap();
        assert!(output.data["revision"].is_string());
        assert!(output.data["project"]["bones"].is_array());
        assert!(output.data["textureUsage"]["entries"].is_object());
    }

    #[tokio::test]
    async fn test_create_project_resets() {
        let (ctx, _) = context();
        let output = CreateProjectTool
            .execute(&ctx, json!({ "name": "fox", "format": "block" }))
            .await
            .unwrap();
        assert_eq!(output.data["name"], "fox");

        let (state, _) = ctx.store.snapshot().await;
        assert_eq!(state.name, "fox");
        assert_eq!(state.format, "block");
        assert!(state.bones.is_empty());
    }

    #[tokio::test]
    async fn test_create_project_merges_host_snapshot() {
        use std::sync::Arc;

        use crate::config::Limits;
        use crate::model::{Bone, ProjectStore};
        use crate::ports::{FixedSnapshot, MemoryEditor};

        let mut host = ProjectState::new("host-model", "block");
        host.bones.push(Bone {
            id: None,
            name: "root".into(),
            parent: None,
            pivot: [0.0; 3],
            rotation: None,
            scale: None,
            visibility: None,
        });
        let ctx = ToolContext::new(
            Arc::new(ProjectStore::new(false, Limits::default())),
            Arc::new(MemoryEditor::new()),
            Arc::new(FixedSnapshot(host)),
        );

        CreateProjectTool
            .execute(&ctx, json!({ "name": "fox", "loadExisting": true }))
            .await
            .unwrap();
        let (state, _) = ctx.store.snapshot().await;
        assert_eq!(state.name, "host-model");
        assert_eq!(state.bones.len(), 1);
    }

    #[tokio::test]
    async fn test_create_project_load_existing_without_host() {
        let (ctx, _) = context();
        let err = CreateProjectTool
            .execute(&ctx, json!({ "name": "fox", "loadExisting": true }))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidState);
    }
}
