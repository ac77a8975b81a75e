//! Deterministic export artifact assembly.
//!
//! Two exports of the same snapshot produce identical bytes; the SHA-256 of
//! each artifact ships alongside it so callers can verify.

pub mod animation;
pub mod geometry;
pub mod json;

use serde::Serialize;

use crate::error::{ToolError, ToolResult};
use crate::model::{ProjectState, revision::sha256_hex};

/// Which artifacts to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Geometry,
    Animation,
    Bundle,
}

impl ExportKind {
    /// Parse the wire name.
    ///
    /// # Errors
    ///
    /// `unsupported_format` for anything else.
    pub fn parse(raw: &str) -> ToolResult<Self> {
        match raw {
            "geometry" => Ok(Self::Geometry),
            "animation" => Ok(Self::Animation),
            "bundle" => Ok(Self::Bundle),
            other => Err(ToolError::unsupported_format(other)),
        }
    }
}

/// One assembled artifact.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Suggested file name, derived from the project name.
    pub file_name: String,
    /// Serialized JSON body.
    pub text: String,
    /// Hex SHA-256 of the body.
    pub sha256: String,
}

impl Artifact {
    fn new(file_name: String, text: String) -> Self {
        let sha256 = sha256_hex(text.as_bytes());
        Self { file_name, text, sha256 }
    }
}

/// Assemble the requested artifacts from a normalized snapshot.
#[must_use]
pub fn build(state: &ProjectState, kind: ExportKind) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    if matches!(kind, ExportKind::Geometry | ExportKind::Bundle) {
        artifacts.push(Artifact::new(
            format!("{}.geo.json", state.name),
            geometry::build(state).to_json(),
        ));
    }
    if matches!(kind, ExportKind::Animation | ExportKind::Bundle) {
        artifacts.push(Artifact::new(
            format!("{}.animation.json", state.name),
            animation::build(state).to_json(),
        ));
    }
    artifacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::normalize::normalize;
    use crate::model::{Animation, Bone, Channel, ChannelKind, Cube, Keyframe};

    fn fixture() -> ProjectState {
        let mut state = ProjectState::new("model", "block");
        state.bones.push(Bone {
            id: None,
            name: "root".into(),
            parent: None,
            pivot: [0.0; 3],
            rotation: None,
            scale: None,
            visibility: None,
        });
        state.cubes.push(Cube {
            id: None,
            name: "cube".into(),
            bone: "root".into(),
            from: [0.0; 3],
            to: [4.0; 3],
            uv: None,
            inflate: None,
            mirror: None,
            faces: None,
        });
        state.animations.push(Animation {
            id: None,
            name: "idle".into(),
            length: 1.0,
            looped: true,
            fps: 20.0,
            channels: vec![Channel {
                bone: "root".into(),
                channel: ChannelKind::Rot,
                keys: vec![Keyframe {
                    time: 0.0,
                    value: [0.0, 10.0, 0.0],
                    interp: None,
                    easing: None,
                    easing_args: None,
                    pre: None,
                    post: None,
                }],
            }],
            triggers: vec![],
        });
        normalize(&mut state);
        state
    }

    #[test]
    fn test_bundle_contains_both() {
        let artifacts = build(&fixture(), ExportKind::Bundle);
        let names: Vec<&str> = artifacts.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["model.geo.json", "model.animation.json"]);
    }

    #[test]
    fn test_byte_stable_across_runs() {
        let state = fixture();
        let a = build(&state, ExportKind::Bundle);
        let b = build(&state.clone(), ExportKind::Bundle);
        assert_eq!(a, b);
        assert_eq!(a[0].sha256, b[0].sha256);
        assert_eq!(a[1].sha256, b[1].sha256);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = ExportKind::parse("gltf").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::UnsupportedFormat);
    }
}
