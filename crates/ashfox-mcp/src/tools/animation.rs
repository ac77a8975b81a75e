//! Animation tools: clips, keyframes, triggers.

use serde::Deserialize;
use serde_json::{Value, json};

use super::{McpTool, ToolContext, ToolOutput, mutating_schema, parse_args};
use crate::error::ToolResult;
use crate::model::{Animation, ChannelKind, Keyframe, TriggerKey, TriggerKind, mutate};
use crate::ports::EditorOp;

fn keyframe_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "time": { "type": "number", "minimum": 0 },
                "value": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 3,
                    "maxItems": 3
                },
                "interp": { "type": "string" },
                "easing": { "type": "string" },
                "easingArgs": { "type": "array", "items": { "type": "number" } },
                "pre": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 3,
                    "maxItems": 3
                },
                "post": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 3,
                    "maxItems": 3
                }
            },
            "required": ["time", "value"],
            "additionalProperties": false
        }
    })
}

/// Create an animation clip.
pub struct CreateAnimationTool;

#[async_trait::async_trait]
impl McpTool for CreateAnimationTool {
    fn name(&self) -> &'static str {
        "create_animation"
    }

    fn description(&self) -> &'static str {
        "Create an empty animation clip with a length, loop flag, and fps."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "length": { "type": "number", "exclusiveMinimum": 0 },
                "loop": { "type": "boolean", "default": false },
                "fps": { "type": "number", "exclusiveMinimum": 0, "default": 20 }
            }),
            &["name", "length"],
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
            length: f64,
            #[serde(rename = "loop", default)]
            looped: bool,
            #[serde(default = "default_fps")]
            fps: f64,
            if_revision: Option<String>,
        }
        fn default_fps() -> f64 {
            20.0
        }
        let args: Args = parse_args(input)?;

        let animation = Animation {
            id: None,
            name: args.name.clone(),
            length: args.length,
            looped: args.looped,
            fps: args.fps,
            channels: Vec::new(),
            triggers: Vec::new(),
        };
        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::create_animation(state, animation.clone())
            })
            .await?;
        ctx.mirror(EditorOp::UpsertAnimation(animation)).await?;

        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "animation": args.name }))
            .with_next_actions(vec!["set_keyframes"]))
    }
}

/// Update an animation clip's header.
pub struct UpdateAnimationTool;

#[async_trait::async_trait]
impl McpTool for UpdateAnimationTool {
    fn name(&self) -> &'static str {
        "update_animation"
    }

    fn description(&self) -> &'static str {
        "Update an animation's name, length, loop flag, or fps."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "newName": { "type": "string", "minLength": 1 },
                "length": { "type": "number", "exclusiveMinimum": 0 },
                "loop": { "type": "boolean" },
                "fps": { "type": "number", "exclusiveMinimum": 0 }
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
            patch: mutate::AnimationPatch,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;
        let final_name = args.patch.new_name.clone().unwrap_or_else(|| args.name.clone());

        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::update_animation(state, &args.name, args.patch.clone())
            })
            .await?;

        let (state, _) = ctx.store.snapshot().await;
        if let Some(animation) = state.animation(&final_name) {
            ctx.mirror(EditorOp::UpsertAnimation(animation.clone())).await?;
        }
        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "animation": final_name })))
    }
}

/// Delete an animation clip.
pub struct DeleteAnimationTool;

#[async_trait::async_trait]
impl McpTool for DeleteAnimationTool {
    fn name(&self) -> &'static str {
        "delete_animation"
    }

    fn description(&self) -> &'static str {
        "Delete an animation clip by name."
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
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::delete_animation(state, &args.name)
            })
            .await?;
        ctx.mirror(EditorOp::DeleteAnimation(args.name.clone())).await?;

        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "deleted": args.name })))
    }
}

/// Merge keyframes into a (bone, channel) track.
pub struct SetKeyframesTool;

#[async_trait::async_trait]
impl McpTool for SetKeyframesTool {
    fn name(&self) -> &'static str {
        "set_keyframes"
    }

    fn description(&self) -> &'static str {
        "Merge keyframes into one bone channel. Times landing in the same bucket replace \
         the existing value; new times insert in order."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "animation": { "type": "string", "minLength": 1 },
                "bone": { "type": "string", "minLength": 1 },
                "channel": { "type": "string", "enum": ["rot", "pos", "scale"] },
                "keys": keyframe_schema()
            }),
            &["animation", "bone", "channel", "keys"],
        )
    }

    fn mutating(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            animation: String,
            bone: String,
            channel: ChannelKind,
            keys: Vec<Keyframe>,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;

        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::set_keyframes(
                    state,
                    &args.animation,
                    &args.bone,
                    args.channel,
                    args.keys.clone(),
                )
            })
            .await?;

        let (state, _) = ctx.store.snapshot().await;
        if let Some(animation) = state.animation(&args.animation) {
            ctx.mirror(EditorOp::UpsertAnimation(animation.clone())).await?;
        }
        let key_count = state
            .animation(&args.animation)
            .and_then(|a| a.channel(&args.bone, args.channel))
            .map_or(0, |c| c.keys.len());
        Ok(ToolOutput::new(json!({
            "revision": outcome.revision,
            "animation": args.animation,
            "bone": args.bone,
            "keyCount": key_count,
        })))
    }
}

/// Merge trigger keys into a typed track.
pub struct SetTriggersTool;

#[async_trait::async_trait]
impl McpTool for SetTriggersTool {
    fn name(&self) -> &'static str {
        "set_triggers"
    }

    fn description(&self) -> &'static str {
        "Merge sound, particle, or timeline trigger keys into an animation."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "animation": { "type": "string", "minLength": 1 },
                "type": { "type": "string", "enum": ["sound", "particle", "timeline"] },
                "keys": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "time": { "type": "number", "minimum": 0 },
                            "value": { "type": "string" }
                        },
                        "required": ["time", "value"],
                        "additionalProperties": false
                    }
                }
            }),
            &["animation", "type", "keys"],
        )
    }

    fn mutating(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            animation: String,
            #[serde(rename = "type")]
            kind: TriggerKind,
            keys: Vec<TriggerKey>,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;

        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::set_triggers(state, &args.animation, args.kind, args.keys.clone())
            })
            .await?;

        let (state, _) = ctx.store.snapshot().await;
        if let Some(animation) = state.animation(&args.animation) {
            ctx.mirror(EditorOp::UpsertAnimation(animation.clone())).await?;
        }
        Ok(ToolOutput::new(json!({
            "revision": outcome.revision,
            "animation": args.animation,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::context;

    async fn rigged() -> ToolContext {
        let (ctx, _) = context();
        crate::tools::AddBoneTool
            .execute(&ctx, json!({ "name": "root", "pivot": [0, 0, 0] }))
            .await
            .unwrap();
        CreateAnimationTool
            .execute(&ctx, json!({ "name": "idle", "length": 1.0, "loop": true }))
            .await
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_keyframes_bucket_merge() {
        let ctx = rigged().await;
        SetKeyframesTool
            .execute(
                &ctx,
                json!({
                    "animation": "idle", "bone": "root", "channel": "rot",
                    "keys": [{ "time": 0.5, "value": [0, 1, 0] }]
                }),
            )
            .await
            .unwrap();
        let output = SetKeyframesTool
            .execute(
                &ctx,
                json!({
                    "animation": "idle", "bone": "root", "channel": "rot",
                    "keys": [{ "time": 0.50005, "value": [0, 2, 0] }]
                }),
            )
            .await
            .unwrap();
        assert_eq!(output.data["keyCount"], 1);
    }

    #[tokio::test]
    async fn test_zero_length_clip_rejected() {
        let (ctx, _) = context();
        let err = CreateAnimationTool
            .execute(&ctx, json!({ "name": "idle", "length": 0.0 }))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidPayload);
    }

    #[tokio::test]
    async fn test_triggers_merge() {
        let ctx = rigged().await;
        SetTriggersTool
            .execute(
                &ctx,
                json!({
                    "animation": "idle", "type": "sound",
                    "keys": [{ "time": 0.0, "value": "step" }]
                }),
            )
            .await
            .unwrap();
        let (state, _) = ctx.store.snapshot().await;
        assert_eq!(state.animations[0].triggers.len(), 1);
        assert_eq!(state.animations[0].triggers[0].keys[0].value, "step");
    }

    #[tokio::test]
    async fn test_keyframes_unknown_animation() {
        let ctx = rigged().await;
        let err = SetKeyframesTool
            .execute(
                &ctx,
                json!({
                    "animation": "sprint", "bone": "root", "channel": "rot",
                    "keys": [{ "time": 0.0, "value": [0, 0, 0] }]
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidState);
    }
}
