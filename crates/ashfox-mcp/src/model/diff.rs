//! Compact state summaries and diffs attached to tool responses.

use serde_json::{Value, json};

use super::project::ProjectState;
use super::revision::sha256_hex;
use crate::export::json::canonical_string;

/// A compact, agent-facing view of the project.
#[must_use]
pub fn summarize(state: &ProjectState, revision: &str) -> Value {
    json!({
        "id": state.id,
        "name": state.name,
        "format": state.format,
        "formatId": state.format_id,
        "dirty": state.dirty,
        "uvPixelsPerBlock": state.uv_pixels_per_block,
        "revision": revision,
        "bones": state.bones.iter().map(|b| json!({
            "name": b.name,
            "parent": b.parent,
            "pivot": b.pivot,
        })).collect::<Vec<_>>(),
        "cubes": state.cubes.iter().map(|c| json!({
            "name": c.name,
            "bone": c.bone,
            "from": c.from,
            "to": c.to,
        })).collect::<Vec<_>>(),
        "textures": state.textures.iter().map(|t| json!({
            "name": t.name,
            "width": t.width,
            "height": t.height,
        })).collect::<Vec<_>>(),
        "animations": state.animations.iter().map(|a| json!({
            "name": a.name,
            "length": a.length,
            "loop": a.looped,
            "fps": a.fps,
            "channels": a.channels.len(),
        })).collect::<Vec<_>>(),
    })
}

/// Per-collection added/removed/changed names between two states.
#[must_use]
pub fn diff(before: &ProjectState, before_rev: &str, after: &ProjectState, after_rev: &str) -> Value {
    json!({
        "revision": { "before": before_rev, "after": after_rev },
        "bones": collection_diff(
            before.bones.iter().map(|b| (b.name.clone(), entity_digest(b))).collect(),
            after.bones.iter().map(|b| (b.name.clone(), entity_digest(b))).collect(),
        ),
        "cubes": collection_diff(
            before.cubes.iter().map(|c| (c.name.clone(), entity_digest(c))).collect(),
            after.cubes.iter().map(|c| (c.name.clone(), entity_digest(c))).collect(),
        ),
        "textures": collection_diff(
            before.textures.iter().map(|t| (t.name.clone(), entity_digest(t))).collect(),
            after.textures.iter().map(|t| (t.name.clone(), entity_digest(t))).collect(),
        ),
        "animations": collection_diff(
            before.animations.iter().map(|a| (a.name.clone(), entity_digest(a))).collect(),
            after.animations.iter().map(|a| (a.name.clone(), entity_digest(a))).collect(),
        ),
    })
}

fn entity_digest<T: serde::Serialize>(entity: &T) -> String {
    let value = serde_json::to_value(entity).unwrap_or_default();
    sha256_hex(canonical_string(&value).as_bytes())[..12].to_string()
}

fn collection_diff(before: Vec<(String, String)>, after: Vec<(String, String)>) -> Value {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();

    for (name, digest) in &after {
        match before.iter().find(|(n, _)| n == name) {
            None => added.push(name.clone()),
            Some((_, prev)) if prev != digest => changed.push(name.clone()),
            Some(_) => {}
        }
    }
    for (name, _) in &before {
        if !after.iter().any(|(n, _)| n == name) {
            removed.push(name.clone());
        }
    }
    json!({ "added": added, "removed": removed, "changed": changed })
}
