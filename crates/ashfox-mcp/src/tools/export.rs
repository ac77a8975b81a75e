//! Export tool: deterministic artifact assembly over the editor port.

use serde::Deserialize;
use serde_json::{Value, json};

use super::{McpTool, ToolContext, ToolOutput, mutating_schema, parse_args};
use crate::error::{ToolError, ToolResult};
use crate::export::{self, ExportKind};
use crate::model::{MutationEffect, mutate};

/// Assemble geometry/animation artifacts from the current snapshot.
pub struct ExportModelTool;

#[async_trait::async_trait]
impl McpTool for ExportModelTool {
    fn name(&self) -> &'static str {
        "export_model"
    }

    fn description(&self) -> &'static str {
        "Assemble byte-stable export artifacts. With a path, files are written through the \
         editor; otherwise artifact text is returned inline. Identical state yields \
         identical bytes."
    }

    fn input_schema(&self) -> Value {
        mutating_schema(
            json!({
                "format": {
                    "type": "string",
                    "enum": ["geometry", "animation", "bundle"],
                    "default": "bundle"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to write artifacts into, via the editor"
                }
            }),
            &[],
        )
    }

    fn mutating(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> ToolResult<ToolOutput> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            #[serde(default = "default_format")]
            format: String,
            path: Option<String>,
            if_revision: Option<String>,
        }
        fn default_format() -> String {
            "bundle".to_string()
        }
        let args: Args = parse_args(input)?;
        let kind = ExportKind::parse(&args.format)?;

        // the revision gate applies to exports too; the mutation clears the
        // dirty flag once the artifacts are handed off
        let outcome = ctx
            .store
            .mutate(args.if_revision.as_deref(), |state| {
                mutate::mark_exported(state);
                Ok(MutationEffect::Changed)
            })
            .await?;

        let (state, _) = ctx.store.snapshot().await;
        let artifacts = export::build(&state, kind);

        let mut written = Vec::new();
        if let Some(dir) = &args.path {
            if !ctx.editor.capabilities().files {
                return Err(ToolError::not_implemented("files"));
            }
            for artifact in &artifacts {
                let path = format!("{}/{}", dir.trim_end_matches('/'), artifact.file_name);
                ctx.editor
                    .write_file(&path, artifact.text.as_bytes())
                    .await
                    .map_err(ToolError::from)?;
                written.push(path);
            }
        }

        let inline = args.path.is_none();
        let files: Vec<Value> = artifacts
            .iter()
            .map(|artifact| {
                let mut entry = json!({
                    "fileName": artifact.file_name,
                    "sha256": artifact.sha256,
                    "bytes": artifact.text.len(),
                });
                if inline {
                    entry["text"] = json!(artifact.text);
                }
                entry
            })
            .collect();

        Ok(ToolOutput::new(json!({
            "revision": outcome.revision,
            "format": args.format,
            "files": files,
            "written": written,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::context;

    async fn rigged() -> (crate::tools::ToolContext, std::sync::Arc<crate::ports::MemoryEditor>)
    {
        let (ctx, editor) = context();
        crate::tools::AddBoneTool
            .execute(&ctx, json!({ "name": "root", "pivot": [0, 0, 0] }))
            .await
            .unwrap();
        crate::tools::AddCubeTool
            .execute(
                &ctx,
                json!({ "name": "cube", "bone": "root", "from": [0, 0, 0], "to": [4, 4, 4] }),
            )
            .await
            .unwrap();
        (ctx, editor)
    }

    #[tokio::test]
    async fn test_inline_export() {
        let (ctx, _) = rigged().await;
        let output = ExportModelTool
            .execute(&ctx, json!({ "format": "geometry" }))
            .await
            .unwrap();
        let files = output.data["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0]["text"].as_str().unwrap().contains("minecraft:geometry"));
    }

    #[tokio::test]
    async fn test_export_writes_through_editor() {
        let (ctx, editor) = rigged().await;
        ExportModelTool
            .execute(&ctx, json!({ "format": "bundle", "path": "out" }))
            .await
            .unwrap();
        let paths = editor.file_paths();
        assert_eq!(paths, vec!["out/untitled.animation.json", "out/untitled.geo.json"]);
    }

    #[tokio::test]
    async fn test_export_is_deterministic() {
        let (ctx, _) = rigged().await;
        let a = ExportModelTool.execute(&ctx, json!({})).await.unwrap();
        let b = ExportModelTool.execute(&ctx, json!({})).await.unwrap();
        assert_eq!(a.data["files"][0]["sha256"], b.data["files"][0]["sha256"]);
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let (ctx, _) = rigged().await;
        let err = ExportModelTool
            .execute(&ctx, json!({ "format": "gltf" }))
            .await
            .unwrap_err();
        // schema would have caught this too; the service guards regardless
        assert_eq!(err.code, crate::error::ErrorCode::UnsupportedFormat);
    }
}
