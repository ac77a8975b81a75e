//! Model tools: bones and cubes.

use serde::Deserialize;
use serde_json::{Value, json};

use super::{McpTool, ToolContext, ToolOutput, mutating_schema, parse_args, triple_schema};
use crate::error::ToolResult;
use crate::model::{Bone, Cube, DetachPolicy, mutate};
use crate::ports::EditorOp;

/// Add a bone to the model tree.
pub struct AddBoneTool;

#[async_trait::async_trait]
impl McpTool for AddBoneTool {
    fn name(&self) -> &'static str {
        "add_bone"
    }

    fn description(&self) -> &'static str {
        "Add a named bone, optionally parented to an existing one."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "parent": { "type": "string" },
                "pivot": triple_schema("Pivot point [x, y, z]"),
                "rotation": triple_schema("Initial rotation in degrees"),
                "visibility": { "type": "boolean" }
            }),
            &["name", "pivot"],
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
            parent: Option<String>,
            pivot: [f64; 3],
            rotation: Option<[f64; 3]>,
            visibility: Option<bool>,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;

        let bone = Bone {
            id: None,
            name: args.name.clone(),
            parent: args.parent,
            pivot: args.pivot,
            rotation: args.rotation,
            scale: None,
            visibility: args.visibility,
        };
        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| mutate::add_bone(state, bone.clone()))
            .await?;
        ctx.mirror(EditorOp::UpsertBone(bone)).await?;

        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "bone": args.name }))
            .with_next_actions(vec!["add_cube"]))
    }
}

/// Update fields of an existing bone.
pub struct UpdateBoneTool;

#[async_trait::async_trait]
impl McpTool for UpdateBoneTool {
    fn name(&self) -> &'static str {
        "update_bone"
    }

    fn description(&self) -> &'static str {
        "Update a bone's name, parent, pivot, rotation, scale, or visibility. \
         An empty-string parent detaches the bone to the root."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "newName": { "type": "string", "minLength": 1 },
                "parent": { "type": "string" },
                "pivot": triple_schema("Pivot point [x, y, z]"),
                "rotation": triple_schema("Rotation in degrees"),
                "scale": triple_schema("Per-axis scale"),
                "visibility": { "type": "boolean" }
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
            #[serde(flatten)]
            patch: mutate::BonePatch,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;
        let final_name = args.patch.new_name.clone().unwrap_or_else(|| args.name.clone());

        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::update_bone(state, &args.name, args.patch.clone())
            })
            .await?;

        let (state, _) = ctx.store.snapshot().await;
        if let Some(bone) = state.bone(&final_name) {
            ctx.mirror(EditorOp::UpsertBone(bone.clone())).await?;
        }
        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "bone": final_name })))
    }
}

/// Delete a bone and detach its subtree.
pub struct DeleteBoneTool;

#[async_trait::async_trait]
impl McpTool for DeleteBoneTool {
    fn name(&self) -> &'static str {
        "delete_bone"
    }

    fn description(&self) -> &'static str {
        "Delete a bone. Policy \"cascade\" (default) removes descendants and their cubes; \
         \"reparent\" detaches descendants to the root."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "policy": { "type": "string", "enum": ["cascade", "reparent"] }
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
            #[serde(default)]
            policy: DetachPolicy,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;

        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::delete_bone(state, &args.name, args.policy)
            })
            .await?;
        ctx.mirror(EditorOp::DeleteBone(args.name.clone())).await?;

        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "deleted": args.name })))
    }
}

/// Add a cube to a bone.
pub struct AddCubeTool;

#[async_trait::async_trait]
impl McpTool for AddCubeTool {
    fn name(&self) -> &'static str {
        "add_cube"
    }

    fn description(&self) -> &'static str {
        "Add an axis-aligned cube attached to an existing bone."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "bone": { "type": "string", "minLength": 1 },
                "from": triple_schema("Lower corner [x, y, z]"),
                "to": triple_schema("Upper corner [x, y, z]"),
                "uv": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 2,
                    "maxItems": 2,
                    "description": "UV offset [u, v]; must fit the texture resolution"
                },
                "inflate": { "type": "number" },
                "mirror": { "type": "boolean" }
            }),
            &["name", "bone", "from", "to"],
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
            bone: String,
            from: [f64; 3],
            to: [f64; 3],
            uv: Option<[f64; 2]>,
            inflate: Option<f64>,
            mirror: Option<bool>,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;

        let cube = Cube {
            id: None,
            name: args.name.clone(),
            bone: args.bone,
            from: args.from,
            to: args.to,
            uv: args.uv,
            inflate: args.inflate,
            mirror: args.mirror,
            faces: None,
        };
        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| mutate::add_cube(state, cube.clone()))
            .await?;
        ctx.mirror(EditorOp::UpsertCube(cube)).await?;

        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "cube": args.name })))
    }
}

/// Update fields of an existing cube.
pub struct UpdateCubeTool;

#[async_trait::async_trait]
impl McpTool for UpdateCubeTool {
    fn name(&self) -> &'static str {
        "update_cube"
    }

    fn description(&self) -> &'static str {
        "Update a cube's name, bone, bounds, uv, inflate, or mirror flag."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "newName": { "type": "string", "minLength": 1 },
                "bone": { "type": "string" },
                "from": triple_schema("Lower corner [x, y, z]"),
                "to": triple_schema("Upper corner [x, y, z]"),
                "uv": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 2,
                    "maxItems": 2
                },
                "inflate": { "type": "number" },
                "mirror": { "type": "boolean" }
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
            #[serde(flatten)]
            patch: mutate::CubePatch,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;
        let final_name = args.patch.new_name.clone().unwrap_or_else(|| args.name.clone());

        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::update_cube(state, &args.name, args.patch.clone())
            })
            .await?;

        let (state, _) = ctx.store.snapshot().await;
        if let Some(cube) = state.cube(&final_name) {
            ctx.mirror(EditorOp::UpsertCube(cube.clone())).await?;
        }
        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "cube": final_name })))
    }
}

/// Delete a cube.
pub struct DeleteCubeTool;

#[async_trait::async_trait]
impl McpTool for DeleteCubeTool {
    fn name(&self) -> &'static str {
        "delete_cube"
    }

    fn description(&self) -> &'static str {
        "Delete a cube by name."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(json!({ "name": { "type": "string", "minLength": 1 } }), &["name"])
    }

    fn mutating(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            name: String,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;

        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| mutate::delete_cube(state, &args.name))
            .await?;
        ctx.mirror(EditorOp::DeleteCube(args.name.clone())).await?;

        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "deleted": args.name })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{context, gated_context};

    #[tokio::test]
    async fn test_add_bone_and_cube() {
        let (ctx, editor) = context();
        AddBoneTool
            .execute(&ctx, json!({ "name": "root", "pivot": [0, 0, 0] }))
            .await
            .unwrap();
        let output = AddCubeTool
            .execute(
                &ctx,
                json!({ "name": "c", "bone": "root", "from": [0, 0, 0], "to": [1, 1, 1] }),
            )
            .await
            .unwrap();
        assert!(output.data["revision"].is_string());
        assert_eq!(editor.ops().len(), 2);
    }

    #[tokio::test]
    async fn test_add_cube_unknown_bone() {
        let (ctx, _) = context();
        let err = AddCubeTool
            .execute(
                &ctx,
                json!({ "name": "c", "bone": "ghost", "from": [0, 0, 0], "to": [1, 1, 1] }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn test_revision_gate_on_mutating_tool() {
        let ctx = gated_context();
        let err = AddBoneTool
            .execute(&ctx, json!({ "name": "root", "pivot": [0, 0, 0] }))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidState);

        let revision = ctx.store.revision().await;
        AddBoneTool
            .execute(&ctx, json!({ "name": "root", "pivot": [0, 0, 0], "ifRevision": revision }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_bone_cascades() {
        let (ctx, _) = context();
        AddBoneTool
            .execute(&ctx, json!({ "name": "root", "pivot": [0, 0, 0] }))
            .await
            .unwrap();
        AddCubeTool
            .execute(
                &ctx,
                json!({ "name": "c", "bone": "root", "from": [0, 0, 0], "to": [1, 1, 1] }),
            )
            .await
            .unwrap();
        DeleteBoneTool.execute(&ctx, json!({ "name": "root" })).await.unwrap();

        let (state, _) = ctx.store.snapshot().await;
        assert!(state.bones.is_empty());
        assert!(state.cubes.is_empty());
    }

    #[tokio::test]
    async fn test_update_bone_rename() {
        let (ctx, _) = context();
        AddBoneTool
            .execute(&ctx, json!({ "name": "root", "pivot": [0, 0, 0] }))
            .await
            .unwrap();
        let output = UpdateBoneTool
            .execute(&ctx, json!({ "name": "root", "newName": "base" }))
            .await
            .unwrap();
        assert_eq!(output.data["bone"], "base");

        let (state, _) = ctx.store.snapshot().await;
        assert!(state.bone("base").is_some());
        assert!(state.bone("root").is_none());
    }
}
