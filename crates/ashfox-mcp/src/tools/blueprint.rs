//! Composite tools: apply a whole blueprint under one revision assertion.
//!
//! The planner parses and deterministically orders the operations; the
//! applier runs them with the revision gate bypassed, one committed mutation
//! per operation. A snapshot taken up front restores the pre-call state on
//! any sub-failure, and the error reports which operations had applied.

use serde_json::{Value, json};

use super::{McpTool, ToolContext, ToolOutput, mutating_schema, parse_args};
use crate::error::{ToolError, ToolResult};
use crate::presets::{self, BlueprintOp};

/// Parse, order, and apply a list of blueprint operations.
async fn apply_ops(
    ctx: &ToolContext,
    if_revision: Option<&str>,
    mut ops: Vec<BlueprintOp>,
) -> ToolResult<(String, Vec<String>)> {
    if ops.is_empty() {
        return Err(ToolError::invalid_payload("blueprint has no operations"));
    }
    ops.sort_by_key(BlueprintOp::sort_key);

    // assert the outer revision once, against the untouched state
    let (rollback, current) = ctx.store.snapshot().await;
    match if_revision {
        None if ctx.store.requires_revision() && !ctx.store.bypassing() => {
            return Err(ToolError::revision_required());
        }
        Some(provided) if provided != current => {
            return Err(ToolError::revision_mismatch(provided, current));
        }
        _ => {}
    }

    let bypass = ctx.store.revision_guard_bypass();
    let mut applied: Vec<String> = Vec::with_capacity(ops.len());
    let mut revision = current;
    for op in &ops {
        match ctx.store.mutate(None, |state| op.apply(state)).await {
            Ok(outcome) => {
                revision = outcome.revision;
                applied.push(op.label());
            }
            Err(err) => {
                drop(bypass);
                ctx.store.restore(rollback).await;
                return Err(ToolError::new(
                    err.code,
                    format!("blueprint failed at {}: {}", op.label(), err.message),
                )
                .with_details(json!({
                    "failedOp": op.label(),
                    "applied": applied,
                    "rolledBack": true,
                })));
            }
        }
    }
    drop(bypass);
    Ok((revision, applied))
}

/// Apply an agent-supplied blueprint.
pub struct ApplyBlueprintTool;

#[async_trait::async_trait]
impl McpTool for ApplyBlueprintTool {
    fn name(&self) -> &'static str {
        "apply_blueprint"
    }

    fn description(&self) -> &'static str {
        "Apply a list of model operations as one composite mutation under a single \
         revision assertion. On any sub-failure the whole batch rolls back."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "operations": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "op": {
                                "type": "string",
                                "enum": [
                                    "addBone", "addCube", "addTexture", "createAnimation",
                                    "setKeyframes", "setTriggers", "deleteBone", "deleteCube",
                                    "deleteTexture", "deleteAnimation"
                                ]
                            }
                        },
                        "required": ["op"]
                    },
                    "description": "Operations; ordered deterministically before applying"
                }
            }),
            &["operations"],
        )
    }

    fn mutating(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        let if_revision = input
            .get("ifRevision")
            .and_then(Value::as_str)
            .map(String::from);
        let raw = input
            .get("operations")
            .cloned()
            .ok_or_else(|| ToolError::invalid_payload("operations is required"))?;
        let ops: Vec<BlueprintOp> = parse_args(raw)?;
        let count = ops.len();

        let (revision, applied) = apply_ops(ctx, if_revision.as_deref(), ops).await?;
        Ok(ToolOutput::new(json!({
            "revision": revision,
            "applied": applied,
            "operationCount": count,
        }))
        .with_next_actions(vec!["get_project_state", "export_model"]))
    }
}

/// Apply a named preset blueprint.
pub struct ApplyPresetTool;

#[async_trait::async_trait]
impl McpTool for ApplyPresetTool {
    fn name(&self) -> &'static str {
        "apply_preset"
    }

    fn description(&self) -> &'static str {
        "Generate a starter rig from a named preset (cuboid, biped, quadruped)."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "preset": { "type": "string", "enum": presets::PRESET_NAMES }
            }),
            &["preset"],
        )
    }

    fn mutating(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            preset: String,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;
        let ops = presets::preset(&args.preset)?;

        let (revision, applied) = apply_ops(ctx, args.if_revision.as_deref(), ops).await?;
        Ok(ToolOutput::new(json!({
            "revision": revision,
            "preset": args.preset,
            "applied": applied,
        }))
        .with_next_actions(vec!["create_animation", "export_model"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{context, gated_context};

    #[tokio::test]
    async fn test_preset_applies_under_one_revision() {
        let ctx = gated_context();
        let revision = ctx.store.revision().await;
        let output = ApplyPresetTool
            .execute(&ctx, json!({ "preset": "biped", "ifRevision": revision }))
            .await
            .unwrap();
        assert!(output.data["applied"].as_array().unwrap().len() > 5);

        let (state, _) = ctx.store.snapshot().await;
        assert!(state.bone("head").is_some());
        assert!(!ctx.store.bypassing());
    }

    #[tokio::test]
    async fn test_blueprint_rolls_back_on_failure() {
        let (ctx, _) = context();
        let before = ctx.store.revision().await;
        // second op references a bone the blueprint never creates
        let err = ApplyBlueprintTool
            .execute(
                &ctx,
                json!({
                    "operations": [
                        { "op": "addBone", "bone": { "name": "root", "pivot": [0, 0, 0] } },
                        { "op": "addCube", "cube": {
                            "name": "c", "bone": "ghost",
                            "from": [0, 0, 0], "to": [1, 1, 1]
                        } }
                    ]
                }),
            )
            .await
            .unwrap_err();

        let details = err.details.unwrap();
        assert_eq!(details["rolledBack"], true);
        assert_eq!(details["applied"].as_array().unwrap().len(), 1);

        let (state, after) = ctx.store.snapshot().await;
        assert!(state.bones.is_empty());
        assert_eq!(before, after);
        assert!(!ctx.store.bypassing());
    }

    #[tokio::test]
    async fn test_blueprint_orders_ops() {
        let (ctx, _) = context();
        // cube listed before its bone; the planner reorders
        ApplyBlueprintTool
            .execute(
                &ctx,
                json!({
                    "operations": [
                        { "op": "addCube", "cube": {
                            "name": "c", "bone": "root",
                            "from": [0, 0, 0], "to": [1, 1, 1]
                        } },
                        { "op": "addBone", "bone": { "name": "root", "pivot": [0, 0, 0] } }
                    ]
                }),
            )
            .await
            .unwrap();
        let (state, _) = ctx.store.snapshot().await;
        assert_eq!(state.cubes.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_outer_revision() {
        let ctx = gated_context();
        let err = ApplyPresetTool
            .execute(&ctx, json!({ "preset": "cuboid", "ifRevision": "stale" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidStateRevisionMismatch);
    }

    #[tokio::test]
    async fn test_empty_blueprint_rejected() {
        let (ctx, _) = context();
        let err = ApplyBlueprintTool
            .execute(&ctx, json!({ "operations": [] }))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidPayload);
    }
}
