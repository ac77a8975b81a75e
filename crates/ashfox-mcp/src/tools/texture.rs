//! Texture tools.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{McpTool, ToolContext, ToolOutput, mutating_schema, object_schema, parse_args};
use crate::error::{ToolError, ToolResult};
use crate::model::{MutationEffect, Texture, mutate, revision::sha256_hex, usage};
use crate::ports::EditorOp;

/// Hash an embedded payload; accepts raw base64 or a data: URI.
fn content_hash_of(data: &str) -> ToolResult<String> {
    let encoded = data.rsplit(',').next().unwrap_or(data);
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| ToolError::invalid_payload(format!("texture data is not base64: {e}")))?;
    Ok(sha256_hex(&bytes))
}

/// Register a texture.
pub struct AddTextureTool;

#[async_trait::async_trait]
impl McpTool for AddTextureTool {
    fn name(&self) -> &'static str {
        "add_texture"
    }

    fn description(&self) -> &'static str {
        "Register a texture by name and dimensions; an optional base64 payload is hashed \
         for change detection."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "width": { "type": "integer", "minimum": 1 },
                "height": { "type": "integer", "minimum": 1 },
                "data": { "type": "string", "description": "Base64 pixels or a data: URI" }
            }),
            &["name", "width", "height"],
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
            width: u32,
            height: u32,
            data: Option<String>,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;

        let content_hash = args.data.as_deref().map(content_hash_of).transpose()?;
        let texture = Texture {
            id: None,
            name: args.name.clone(),
            width: args.width,
            height: args.height,
            content_hash,
            meta: None,
        };
        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::add_texture(state, texture.clone())
            })
            .await?;
        ctx.mirror(EditorOp::UpsertTexture(texture)).await?;

        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "texture": args.name })))
    }
}

/// Replace a texture's dimensions or payload.
pub struct UpdateTextureTool;

#[async_trait::async_trait]
impl McpTool for UpdateTextureTool {
    fn name(&self) -> &'static str {
        "update_texture"
    }

    fn description(&self) -> &'static str {
        "Update a texture. An identical payload at identical dimensions is a no-op and \
         leaves the revision unchanged."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "newName": { "type": "string", "minLength": 1 },
                "width": { "type": "integer", "minimum": 1 },
                "height": { "type": "integer", "minimum": 1 },
                "data": { "type": "string", "description": "Base64 pixels or a data: URI" }
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
            new_name: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            data: Option<String>,
            if_revision: Option<String>,
        }
        let args: Args = parse_args(input)?;

        let content_hash = args.data.as_deref().map(content_hash_of).transpose()?;
        let patch = mutate::TexturePatch {
            new_name: args.new_name.clone(),
            width: args.width,
            height: args.height,
            content_hash,
        };
        let final_name = args.new_name.unwrap_or_else(|| args.name.clone());

        let mut no_change = false;
        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                let effect = mutate::update_texture(state, &args.name, patch.clone())?;
                no_change = effect == MutationEffect::NoChange;
                Ok(effect)
            })
            .await?;

        if !no_change {
            let (state, _) = ctx.store.snapshot().await;
            if let Some(texture) = state.texture(&final_name) {
                ctx.mirror(EditorOp::UpsertTexture(texture.clone())).await?;
            }
        }
        Ok(ToolOutput::new(json!({
            "revision": outcome.revision,
            "texture": final_name,
            "noChange": no_change,
        })))
    }
}

/// Remove a texture.
pub struct DeleteTextureTool;

#[async_trait::async_trait]
impl McpTool for DeleteTextureTool {
    fn name(&self) -> &'static str {
        "delete_texture"
    }

    fn description(&self) -> &'static str {
        "Delete a texture by name."
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
                mutate::delete_texture(state, &args.name)
            })
            .await?;
        ctx.mirror(EditorOp::DeleteTexture(args.name.clone())).await?;

        Ok(ToolOutput::new(json!({ "revision": outcome.revision, "deleted": args.name })))
    }
}

/// Derive which cube faces reference which texture.
pub struct GetTextureUsageTool;

#[async_trait::async_trait]
impl McpTool for GetTextureUsageTool {
    fn name(&self) -> &'static str {
        "get_texture_usage"
    }

    fn description(&self) -> &'static str {
        "Derive the per-face texture usage mapping, unresolved references included."
    }

    fn input_schema(&self) -> Value {
        object_schema(json!({}), &[])
    }

    async fn execute(&self, ctx: &ToolContext, _input: Value) -> ToolResult<ToolOutput> {
        let (state, revision) = ctx.store.snapshot().await;
        let texture_usage = usage::derive_texture_usage(&state);
        Ok(ToolOutput::new(json!({
            "revision": revision,
            "uvUsageId": texture_usage.uv_usage_id,
            "usage": usage::to_value(&texture_usage),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::context;

    #[tokio::test]
    async fn test_add_and_update_texture() {
        let (ctx, _) = context();
        AddTextureTool
            .execute(&ctx, json!({ "name": "skin", "width": 64, "height": 64, "data": "AAAA" }))
            .await
            .unwrap();
        let before = ctx.store.revision().await;

        // identical payload: revision must not move
        let output = UpdateTextureTool
            .execute(&ctx, json!({ "name": "skin", "width": 64, "height": 64, "data": "AAAA" }))
            .await
            .unwrap();
        assert_eq!(output.data["noChange"], true);
        assert_eq!(ctx.store.revision().await, before);

        // new payload: revision moves
        let output = UpdateTextureTool
            .execute(&ctx, json!({ "name": "skin", "data": "BBBB" }))
            .await
            .unwrap();
        assert_eq!(output.data["noChange"], false);
        assert_ne!(ctx.store.revision().await, before);
    }

    #[tokio::test]
    async fn test_bad_base64_rejected() {
        let (ctx, _) = context();
        let err = AddTextureTool
            .execute(&ctx, json!({ "name": "skin", "width": 8, "height": 8, "data": "!!" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidPayload);
    }

    #[tokio::test]
    async fn test_oversized_texture_rejected() {
        let (ctx, _) = context();
        let err = AddTextureTool
            .execute(&ctx, json!({ "name": "huge", "width": 100_000, "height": 8 }))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidPayload);
    }

    #[tokio::test]
    async fn test_usage_tool_shape() {
        let (ctx, _) = context();
        let output = GetTextureUsageTool.execute(&ctx, json!({})).await.unwrap();
        assert!(output.data["uvUsageId"].is_string());
        assert!(output.data["usage"]["unresolved"].is_array());
    }
}
