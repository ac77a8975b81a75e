//! Seams to the host editor.
//!
//! The core never touches a 3-D modeling runtime directly; it drives an
//! [`EditorPort`] with semantic operations and reads back through a
//! [`SnapshotPort`]. Capabilities are explicit flags, not runtime sniffing:
//! an unsupported capability returns `not_implemented`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::PortError;
use crate::model::{Animation, Bone, Cube, ProjectState, Texture};

/// What the bound editor can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorCaps {
    pub model: bool,
    pub textures: bool,
    pub animations: bool,
    pub files: bool,
    pub preview: bool,
}

impl EditorCaps {
    /// Everything supported.
    #[must_use]
    pub const fn all() -> Self {
        Self { model: true, textures: true, animations: true, files: true, preview: true }
    }

    /// Nothing supported.
    #[must_use]
    pub const fn none() -> Self {
        Self { model: false, textures: false, animations: false, files: false, preview: false }
    }
}

/// A semantic operation mirrored to the host editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorOp {
    UpsertBone(Bone),
    DeleteBone(String),
    UpsertCube(Cube),
    DeleteCube(String),
    UpsertTexture(Texture),
    DeleteTexture(String),
    UpsertAnimation(Animation),
    DeleteAnimation(String),
}

impl EditorOp {
    /// Capability group this operation belongs to.
    #[must_use]
    pub const fn capability(&self) -> &'static str {
        match self {
            Self::UpsertBone(_) | Self::DeleteBone(_) | Self::UpsertCube(_)
            | Self::DeleteCube(_) => "model",
            Self::UpsertTexture(_) | Self::DeleteTexture(_) => "textures",
            Self::UpsertAnimation(_) | Self::DeleteAnimation(_) => "animations",
        }
    }
}

/// Interface to the graphical-editor integration layer.
#[async_trait]
pub trait EditorPort: Send + Sync {
    /// Capability flags of the bound editor.
    fn capabilities(&self) -> EditorCaps;

    /// Mirror one semantic operation into the host.
    async fn apply(&self, op: EditorOp) -> Result<(), PortError>;

    /// Write an artifact into the host's workspace.
    async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), PortError>;

    /// Render a preview image of the current model.
    async fn render_preview(&self, name: &str) -> Result<Vec<u8>, PortError>;
}

/// Interface for reading the host's current model back into the core.
pub trait SnapshotPort: Send + Sync {
    /// Read a normalized snapshot, or `None` when the host has no project.
    fn read_snapshot(&self) -> Option<ProjectState>;
}

/// The default binding: keeps mirrored operations and written files in
/// memory. Also the test double.
#[derive(Default)]
pub struct MemoryEditor {
    ops: Mutex<Vec<EditorOp>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations mirrored so far.
    #[must_use]
    pub fn ops(&self) -> Vec<EditorOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    /// A written file's bytes.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().ok().and_then(|files| files.get(path).cloned())
    }

    /// Paths written so far, sorted.
    #[must_use]
    pub fn file_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }
}

#[async_trait]
impl EditorPort for MemoryEditor {
    fn capabilities(&self) -> EditorCaps {
        EditorCaps { preview: false, ..EditorCaps::all() }
    }

    async fn apply(&self, op: EditorOp) -> Result<(), PortError> {
        self.ops
            .lock()
            .map_err(|_| PortError::Io("editor op log poisoned".to_string()))?
            .push(op);
        Ok(())
    }

    async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), PortError> {
        self.files
            .lock()
            .map_err(|_| PortError::Io("editor file store poisoned".to_string()))?
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn render_preview(&self, _name: &str) -> Result<Vec<u8>, PortError> {
        Err(PortError::NotImplemented("preview".to_string()))
    }
}

/// A binding with no capabilities at all; every call is `not_implemented`.
#[derive(Debug, Default)]
pub struct NullEditor;

#[async_trait]
impl EditorPort for NullEditor {
    fn capabilities(&self) -> EditorCaps {
        EditorCaps::none()
    }

    async fn apply(&self, op: EditorOp) -> Result<(), PortError> {
        Err(PortError::NotImplemented(op.capability().to_string()))
    }

    async fn write_file(&self, _path: &str, _bytes: &[u8]) -> Result<(), PortError> {
        Err(PortError::NotImplemented("files".to_string()))
    }

    async fn render_preview(&self, _name: &str) -> Result<Vec<u8>, PortError> {
        Err(PortError::NotImplemented("preview".to_string()))
    }
}

/// A snapshot port with nothing to offer.
#[derive(Debug, Default)]
pub struct NullSnapshot;

impl SnapshotPort for NullSnapshot {
    fn read_snapshot(&self) -> Option<ProjectState> {
        None
    }
}

/// A snapshot port returning a fixed state; used in tests.
pub struct FixedSnapshot(pub ProjectState);

impl SnapshotPort for FixedSnapshot {
    fn read_snapshot(&self) -> Option<ProjectState> {
        Some(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(name: &str) -> Bone {
        Bone {
            id: None,
            name: name.to_string(),
            parent: None,
            pivot: [0.0; 3],
            rotation: None,
            scale: None,
            visibility: None,
        }
    }

    #[tokio::test]
    async fn test_memory_editor_records() {
        let editor = MemoryEditor::new();
        editor.apply(EditorOp::UpsertBone(bone("root"))).await.unwrap();
        editor.write_file("out/model.geo.json", b"{}").await.unwrap();

        assert_eq!(editor.ops().len(), 1);
        assert_eq!(editor.file("out/model.geo.json").unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_null_editor_reports_missing_capability() {
        let editor = NullEditor;
        let err = editor.apply(EditorOp::DeleteBone("root".into())).await.unwrap_err();
        assert!(matches!(err, PortError::NotImplemented(cap) if cap == "model"));
    }

    #[test]
    fn test_op_capability_groups() {
        assert_eq!(EditorOp::DeleteCube("c".into()).capability(), "model");
        assert_eq!(EditorOp::DeleteTexture("t".into()).capability(), "textures");
        assert_eq!(EditorOp::DeleteAnimation("a".into()).capability(), "animations");
    }
}
