//! Derived texture usage: which cube faces reference which texture.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::project::ProjectState;
use super::revision::sha256_hex;
use crate::export::json::canonical_string;

/// One face-level texture reference.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageRef {
    pub cube: String,
    pub face: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv: Option<[f64; 4]>,
}

/// Per-texture usage mapping plus unresolved references.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextureUsage {
    /// Texture key -> referencing faces, deterministically ordered.
    pub entries: BTreeMap<String, Vec<UsageRef>>,
    /// Face references naming a texture the project does not have.
    pub unresolved: Vec<UsageRef>,
    /// Identity digest of the normalized mapping plus project resolution.
    pub uv_usage_id: String,
}

/// Walk the cubes of a normalized state and derive the usage mapping.
#[must_use]
pub fn derive_texture_usage(state: &ProjectState) -> TextureUsage {
    let mut entries: BTreeMap<String, Vec<UsageRef>> = BTreeMap::new();
    let mut unresolved = Vec::new();

    for cube in &state.cubes {
        let Some(faces) = &cube.faces else { continue };
        for (face, detail) in faces {
            let Some(texture) = &detail.texture else { continue };
            let usage = UsageRef { cube: cube.name.clone(), face: face.clone(), uv: detail.uv };
            if state.texture(texture).is_some() {
                entries.entry(texture.clone()).or_default().push(usage);
            } else {
                unresolved.push(usage);
            }
        }
    }

    let uv_usage_id = usage_digest(state, &entries, &unresolved);
    TextureUsage { entries, unresolved, uv_usage_id }
}

fn usage_digest(
    state: &ProjectState,
    entries: &BTreeMap<String, Vec<UsageRef>>,
    unresolved: &[UsageRef],
) -> String {
    let payload = serde_json::json!({
        "project": { "id": state.id, "name": state.name },
        "resolution": state.texture_resolution().map(|(w, h)| vec![w, h]),
        "entries": entries,
        "unresolved": unresolved,
    });
    sha256_hex(canonical_string(&payload).as_bytes())[..16].to_string()
}

/// Serialize for tool output.
#[must_use]
pub fn to_value(usage: &TextureUsage) -> Value {
    serde_json::to_value(usage).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::{Bone, Cube, Face, Texture};

    fn state_with_faces() -> ProjectState {
        let mut state = ProjectState::default();
        state.bones.push(Bone {
            id: None,
            name: "root".into(),
            parent: None,
            pivot: [0.0; 3],
            rotation: None,
            scale: None,
            visibility: None,
        });
        state.textures.push(Texture {
            id: None,
            name: "skin".into(),
            width: 64,
            height: 64,
            content_hash: None,
            meta: None,
        });
        let mut faces = BTreeMap::new();
        faces.insert(
            "north".to_string(),
            Face { uv: Some([0.0, 0.0, 16.0, 16.0]), texture: Some("skin".into()), rotation: None },
        );
        faces.insert(
            "south".to_string(),
            Face { uv: None, texture: Some("ghost".into()), rotation: None },
        );
        state.cubes.push(Cube {
            id: None,
            name: "body".into(),
            bone: "root".into(),
            from: [0.0; 3],
            to: [4.0; 3],
            uv: None,
            inflate: None,
            mirror: None,
            faces: Some(faces),
        });
        state
    }

    #[test]
    fn test_usage_resolution() {
        let usage = derive_texture_usage(&state_with_faces());
        assert_eq!(usage.entries["skin"].len(), 1);
        assert_eq!(usage.entries["skin"][0].face, "north");
        assert_eq!(usage.unresolved.len(), 1);
        assert_eq!(usage.unresolved[0].face, "south");
    }

    #[test]
    fn test_usage_id_is_stable() {
        let a = derive_texture_usage(&state_with_faces());
        let b = derive_texture_usage(&state_with_faces());
        assert_eq!(a.uv_usage_id, b.uv_usage_id);
    }

    #[test]
    fn test_usage_id_tracks_mapping() {
        let state = state_with_faces();
        let a = derive_texture_usage(&state);
        let mut changed = state;
        if let Some(faces) = &mut changed.cubes[0].faces {
            faces.remove("south");
        }
        let b = derive_texture_usage(&changed);
        assert_ne!(a.uv_usage_id, b.uv_usage_id);
    }
}
