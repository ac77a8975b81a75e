//! Geometry artifact assembly.
//!
//! The emitted cube origin mirrors the X axis: `origin = [-to.x, from.y,
//! from.z]`, `size = to - from`. Bones and cubes follow the normalized
//! ordering, so the artifact is byte-stable for a given snapshot.

use super::json::Doc;
use crate::model::{Cube, ProjectState};

/// Geometry schema version emitted in every artifact.
pub const FORMAT_VERSION: &str = "1.12.0";

/// Build the geometry document for a normalized snapshot.
#[must_use]
pub fn build(state: &ProjectState) -> Doc {
    let mut description = Doc::obj();
    description.push("identifier", Doc::Str(format!("geometry.{}", state.name)));
    if let Some((width, height)) = state.texture_resolution() {
        description.push("texture_width", Doc::Int(i64::from(width)));
        description.push("texture_height", Doc::Int(i64::from(height)));
    }

    let mut bones = Vec::with_capacity(state.bones.len());
    for bone in &state.bones {
        let mut entry = Doc::obj();
        entry.push("name", Doc::Str(bone.name.clone()));
        entry.push_opt("parent", bone.parent.clone().map(Doc::Str));
        entry.push("pivot", Doc::triple(bone.pivot));
        entry.push_opt("rotation", bone.rotation.map(Doc::triple));

        let cubes: Vec<Doc> = state
            .cubes
            .iter()
            .filter(|c| c.bone == bone.name)
            .map(cube_doc)
            .collect();
        if !cubes.is_empty() {
            entry.push("cubes", Doc::Arr(cubes));
        }
        bones.push(entry);
    }

    let mut geometry = Doc::obj();
    geometry.push("description", description);
    geometry.push("bones", Doc::Arr(bones));

    let mut root = Doc::obj();
    root.push("format_version", Doc::Str(FORMAT_VERSION.to_string()));
    root.push("minecraft:geometry", Doc::Arr(vec![geometry]));
    root
}

fn cube_doc(cube: &Cube) -> Doc {
    let mut doc = Doc::obj();
    // mirror the X axis
    doc.push(
        "origin",
        Doc::Arr(vec![
            Doc::num(-cube.to[0]),
            Doc::num(cube.from[1]),
            Doc::num(cube.from[2]),
        ]),
    );
    doc.push(
        "size",
        Doc::Arr(vec![
            Doc::num(cube.to[0] - cube.from[0]),
            Doc::num(cube.to[1] - cube.from[1]),
            Doc::num(cube.to[2] - cube.from[2]),
        ]),
    );
    doc.push_opt(
        "uv",
        cube.uv.map(|[u, v]| Doc::Arr(vec![Doc::num(u), Doc::num(v)])),
    );
    doc.push_opt("inflate", cube.inflate.map(Doc::num));
    doc.push_opt("mirror", cube.mirror.map(Doc::Bool));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::normalize::normalize;
    use crate::model::{Bone, Cube};

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
            from: [0.0, 0.0, 0.0],
            to: [4.0, 4.0, 4.0],
            uv: None,
            inflate: None,
            mirror: None,
            faces: None,
        });
        normalize(&mut state);
        state
    }

    #[test]
    fn test_origin_mirrors_x() {
        let json = build(&fixture()).to_json();
        assert!(json.contains(r#""origin":[-4,0,0]"#), "got {json}");
        assert!(json.contains(r#""size":[4,4,4]"#));
    }

    #[test]
    fn test_header() {
        let json = build(&fixture()).to_json();
        assert!(json.starts_with(r#"{"format_version":"1.12.0","minecraft:geometry":"#));
        assert!(json.contains(r#""identifier":"geometry.model""#));
    }

    #[test]
    fn test_boneless_state_emits_empty_bones() {
        let state = ProjectState::new("empty", "block");
        let json = build(&state).to_json();
        assert!(json.contains(r#""bones":[]"#));
    }
}
