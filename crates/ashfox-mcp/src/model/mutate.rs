//! Mutation operations over the project tree.
//!
//! Mutators validate their own preconditions and leave the state
//! structurally sound; the store re-validates, normalizes, and re-hashes
//! before committing, so a failed mutator never leaks a partial write.

use serde::{Deserialize, Serialize};

use super::normalize::{merge_keys, merge_trigger_keys};
use super::project::{
    Animation, Bone, Channel, ChannelKind, Cube, Keyframe, ProjectState, Texture, Trigger,
    TriggerKey, TriggerKind,
};
use crate::error::{ToolError, ToolResult};

/// Whether a mutation actually changed the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEffect {
    Changed,
    NoChange,
}

/// What happens to descendants when a bone is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetachPolicy {
    /// Remove descendant bones and their cubes.
    #[default]
    Cascade,
    /// Detach descendant bones to the root level, keeping their cubes.
    Reparent,
}

/// Partial bone update; absent fields keep their value. An empty-string
/// parent detaches the bone to the root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonePatch {
    pub new_name: Option<String>,
    pub parent: Option<String>,
    pub pivot: Option<[f64; 3]>,
    pub rotation: Option<[f64; 3]>,
    pub scale: Option<[f64; 3]>,
    pub visibility: Option<bool>,
}

/// Partial cube update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CubePatch {
    pub new_name: Option<String>,
    pub bone: Option<String>,
    pub from: Option<[f64; 3]>,
    pub to: Option<[f64; 3]>,
    pub uv: Option<[f64; 2]>,
    pub inflate: Option<f64>,
    pub mirror: Option<bool>,
}

/// Partial texture update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TexturePatch {
    pub new_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub content_hash: Option<String>,
}

/// Partial animation header update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationPatch {
    pub new_name: Option<String>,
    pub length: Option<f64>,
    #[serde(rename = "loop")]
    pub looped: Option<bool>,
    pub fps: Option<f64>,
}

pub fn add_bone(state: &mut ProjectState, bone: Bone) -> ToolResult<MutationEffect> {
    if bone.name.trim().is_empty() {
        return Err(ToolError::invalid_payload("bone name must not be empty"));
    }
    if state.bone(&bone.name).is_some() {
        return Err(ToolError::invalid_state(format!("bone {} already exists", bone.name)));
    }
    if let Some(parent) = &bone.parent {
        if state.bone(parent).is_none() {
            return Err(ToolError::invalid_state(format!("parent bone {parent} not found")));
        }
    }
    check_triple(&bone.pivot, "pivot")?;
    state.bones.push(bone);
    Ok(MutationEffect::Changed)
}

pub fn update_bone(
    state: &mut ProjectState,
    name: &str,
    patch: BonePatch,
) -> ToolResult<MutationEffect> {
    if state.bone(name).is_none() {
        return Err(ToolError::invalid_state(format!("bone {name} not found")));
    }
    if let Some(new_name) = &patch.new_name {
        if new_name != name && state.bone(new_name).is_some() {
            return Err(ToolError::invalid_state(format!("bone {new_name} already exists")));
        }
    }
    if let Some(parent) = &patch.parent {
        if !parent.is_empty() {
            if parent == name {
                return Err(ToolError::invalid_state("bone cannot parent itself"));
            }
            if state.bone(parent).is_none() {
                return Err(ToolError::invalid_state(format!("parent bone {parent} not found")));
            }
            if state.descendants_of(name).contains(parent) {
                return Err(ToolError::invalid_state(format!(
                    "parenting {name} under its descendant {parent} would form a cycle"
                )));
            }
        }
    }
    if let Some(pivot) = &patch.pivot {
        check_triple(pivot, "pivot")?;
    }

    let old_name = name.to_string();
    let bone = state
        .bones
        .iter_mut()
        .find(|b| b.name == old_name)
        .ok_or_else(|| ToolError::invalid_state(format!("bone {old_name} not found")))?;
    if let Some(new_name) = patch.new_name.clone() {
        bone.name = new_name;
    }
    if let Some(parent) = patch.parent {
        bone.parent = if parent.is_empty() { None } else { Some(parent) };
    }
    if let Some(pivot) = patch.pivot {
        bone.pivot = pivot;
    }
    if let Some(rotation) = patch.rotation {
        bone.rotation = Some(rotation);
    }
    if let Some(scale) = patch.scale {
        bone.scale = Some(scale);
    }
    if let Some(visibility) = patch.visibility {
        bone.visibility = Some(visibility);
    }

    // follow a rename through dependents
    if let Some(new_name) = &patch.new_name {
        if *new_name != old_name {
            for child in &mut state.bones {
                if child.parent.as_deref() == Some(old_name.as_str()) {
                    child.parent = Some(new_name.clone());
                }
            }
            for cube in &mut state.cubes {
                if cube.bone == old_name {
                    cube.bone = new_name.clone();
                }
            }
            for animation in &mut state.animations {
                for channel in &mut animation.channels {
                    if channel.bone == old_name {
                        channel.bone = new_name.clone();
                    }
                }
            }
        }
    }
    Ok(MutationEffect::Changed)
}

pub fn delete_bone(
    state: &mut ProjectState,
    name: &str,
    policy: DetachPolicy,
) -> ToolResult<MutationEffect> {
    if state.bone(name).is_none() {
        return Err(ToolError::invalid_state(format!("bone {name} not found")));
    }
    let descendants = state.descendants_of(name);

    match policy {
        DetachPolicy::Cascade => {
            let mut doomed: Vec<String> = descendants;
            doomed.push(name.to_string());
            state.bones.retain(|b| !doomed.contains(&b.name));
            state.cubes.retain(|c| !doomed.contains(&c.bone));
            for animation in &mut state.animations {
                animation.channels.retain(|ch| !doomed.contains(&ch.bone));
            }
        }
        DetachPolicy::Reparent => {
            for bone in &mut state.bones {
                if bone.parent.as_deref() == Some(name) {
                    bone.parent = None;
                }
            }
            state.bones.retain(|b| b.name != name);
            state.cubes.retain(|c| c.bone != name);
            for animation in &mut state.animations {
                animation.channels.retain(|ch| ch.bone != name);
            }
        }
    }
    Ok(MutationEffect::Changed)
}

pub fn add_cube(state: &mut ProjectState, cube: Cube) -> ToolResult<MutationEffect> {
    if cube.name.trim().is_empty() {
        return Err(ToolError::invalid_payload("cube name must not be empty"));
    }
    if state.cube(&cube.name).is_some() {
        return Err(ToolError::invalid_state(format!("cube {} already exists", cube.name)));
    }
    if state.bone(&cube.bone).is_none() {
        return Err(ToolError::invalid_state(format!("bone {} not found", cube.bone)));
    }
    check_triple(&cube.from, "from")?;
    check_triple(&cube.to, "to")?;
    check_uv_fits(state, cube.uv.as_ref(), cube.faces.as_ref())?;
    state.cubes.push(cube);
    Ok(MutationEffect::Changed)
}

pub fn update_cube(
    state: &mut ProjectState,
    name: &str,
    patch: CubePatch,
) -> ToolResult<MutationEffect> {
    if state.cube(name).is_none() {
        return Err(ToolError::invalid_state(format!("cube {name} not found")));
    }
    if let Some(new_name) = &patch.new_name {
        if new_name != name && state.cube(new_name).is_some() {
            return Err(ToolError::invalid_state(format!("cube {new_name} already exists")));
        }
    }
    if let Some(bone) = &patch.bone {
        if state.bone(bone).is_none() {
            return Err(ToolError::invalid_state(format!("bone {bone} not found")));
        }
    }
    if let Some(from) = &patch.from {
        check_triple(from, "from")?;
    }
    if let Some(to) = &patch.to {
        check_triple(to, "to")?;
    }
    check_uv_fits(state, patch.uv.as_ref(), None)?;

    let cube = state
        .cubes
        .iter_mut()
        .find(|c| c.name == name)
        .ok_or_else(|| ToolError::invalid_state(format!("cube {name} not found")))?;
    if let Some(new_name) = patch.new_name {
        cube.name = new_name;
    }
    if let Some(bone) = patch.bone {
        cube.bone = bone;
    }
    if let Some(from) = patch.from {
        cube.from = from;
    }
    if let Some(to) = patch.to {
        cube.to = to;
    }
    if let Some(uv) = patch.uv {
        cube.uv = Some(uv);
    }
    if let Some(inflate) = patch.inflate {
        cube.inflate = Some(inflate);
    }
    if let Some(mirror) = patch.mirror {
        cube.mirror = Some(mirror);
    }
    Ok(MutationEffect::Changed)
}

pub fn delete_cube(state: &mut ProjectState, name: &str) -> ToolResult<MutationEffect> {
    if state.cube(name).is_none() {
        return Err(ToolError::invalid_state(format!("cube {name} not found")));
    }
    state.cubes.retain(|c| c.name != name);
    Ok(MutationEffect::Changed)
}

pub fn add_texture(state: &mut ProjectState, texture: Texture) -> ToolResult<MutationEffect> {
    if texture.name.trim().is_empty() {
        return Err(ToolError::invalid_payload("texture name must not be empty"));
    }
    if state.texture(&texture.name).is_some() {
        return Err(ToolError::invalid_state(format!(
            "texture {} already exists",
            texture.name
        )));
    }
    state.textures.push(texture);
    Ok(MutationEffect::Changed)
}

pub fn update_texture(
    state: &mut ProjectState,
    name: &str,
    patch: TexturePatch,
) -> ToolResult<MutationEffect> {
    let current = state
        .texture(name)
        .ok_or_else(|| ToolError::invalid_state(format!("texture {name} not found")))?;

    // identical payload and dimensions: report no_change, keep the revision
    let same_hash = match (&patch.content_hash, &current.content_hash) {
        (Some(next), Some(prev)) => next == prev,
        _ => false,
    };
    let same_dims = patch.width.is_none_or(|w| w == current.width)
        && patch.height.is_none_or(|h| h == current.height);
    if same_hash && same_dims && patch.new_name.is_none() {
        return Ok(MutationEffect::NoChange);
    }

    if let Some(new_name) = &patch.new_name {
        if new_name != name && state.texture(new_name).is_some() {
            return Err(ToolError::invalid_state(format!(
                "texture {new_name} already exists"
            )));
        }
    }
    let texture = state
        .textures
        .iter_mut()
        .find(|t| t.name == name)
        .ok_or_else(|| ToolError::invalid_state(format!("texture {name} not found")))?;
    if let Some(new_name) = patch.new_name {
        texture.name = new_name;
    }
    if let Some(width) = patch.width {
        texture.width = width;
    }
    if let Some(height) = patch.height {
        texture.height = height;
    }
    if let Some(content_hash) = patch.content_hash {
        texture.content_hash = Some(content_hash);
    }
    Ok(MutationEffect::Changed)
}

pub fn delete_texture(state: &mut ProjectState, name: &str) -> ToolResult<MutationEffect> {
    if state.texture(name).is_none() {
        return Err(ToolError::invalid_state(format!("texture {name} not found")));
    }
    state.textures.retain(|t| t.name != name);
    Ok(MutationEffect::Changed)
}

pub fn create_animation(
    state: &mut ProjectState,
    animation: Animation,
) -> ToolResult<MutationEffect> {
    if animation.name.trim().is_empty() {
        return Err(ToolError::invalid_payload("animation name must not be empty"));
    }
    if state.animation(&animation.name).is_some() {
        return Err(ToolError::invalid_state(format!(
            "animation {} already exists",
            animation.name
        )));
    }
    state.animations.push(animation);
    Ok(MutationEffect::Changed)
}

pub fn update_animation(
    state: &mut ProjectState,
    name: &str,
    patch: AnimationPatch,
) -> ToolResult<MutationEffect> {
    if state.animation(name).is_none() {
        return Err(ToolError::invalid_state(format!("animation {name} not found")));
    }
    if let Some(new_name) = &patch.new_name {
        if new_name != name && state.animation(new_name).is_some() {
            return Err(ToolError::invalid_state(format!(
                "animation {new_name} already exists"
            )));
        }
    }
    let animation = state
        .animations
        .iter_mut()
        .find(|a| a.name == name)
        .ok_or_else(|| ToolError::invalid_state(format!("animation {name} not found")))?;
    if let Some(new_name) = patch.new_name {
        animation.name = new_name;
    }
    if let Some(length) = patch.length {
        animation.length = length;
    }
    if let Some(looped) = patch.looped {
        animation.looped = looped;
    }
    if let Some(fps) = patch.fps {
        animation.fps = fps;
    }
    Ok(MutationEffect::Changed)
}

pub fn delete_animation(state: &mut ProjectState, name: &str) -> ToolResult<MutationEffect> {
    if state.animation(name).is_none() {
        return Err(ToolError::invalid_state(format!("animation {name} not found")));
    }
    state.animations.retain(|a| a.name != name);
    Ok(MutationEffect::Changed)
}

/// Merge keyframes into the (bone, channel) track: same bucket replaces the
/// value, otherwise the key is inserted in time order.
pub fn set_keyframes(
    state: &mut ProjectState,
    animation_name: &str,
    bone: &str,
    kind: ChannelKind,
    keys: Vec<Keyframe>,
) -> ToolResult<MutationEffect> {
    if state.bone(bone).is_none() {
        return Err(ToolError::invalid_state(format!("bone {bone} not found")));
    }
    for key in &keys {
        if !key.time.is_finite() || key.time < 0.0 {
            return Err(ToolError::invalid_payload(format!(
                "keyframe time {} must be a finite non-negative number",
                key.time
            )));
        }
        check_triple(&key.value, "value")?;
    }
    let policy = state.animation_time_policy;
    let animation = state
        .animations
        .iter_mut()
        .find(|a| a.name == animation_name)
        .ok_or_else(|| ToolError::invalid_state(format!("animation {animation_name} not found")))?;

    let idx = match animation
        .channels
        .iter()
        .position(|c| c.bone == bone && c.channel == kind)
    {
        Some(idx) => idx,
        None => {
            animation.channels.push(Channel {
                bone: bone.to_string(),
                channel: kind,
                keys: Vec::new(),
            });
            animation.channels.len() - 1
        }
    };
    let channel = &mut animation.channels[idx];
    let mut combined = std::mem::take(&mut channel.keys);
    combined.extend(keys);
    channel.keys = merge_keys(combined, policy);
    Ok(MutationEffect::Changed)
}

/// Merge trigger keys into the typed track.
pub fn set_triggers(
    state: &mut ProjectState,
    animation_name: &str,
    kind: TriggerKind,
    keys: Vec<TriggerKey>,
) -> ToolResult<MutationEffect> {
    for key in &keys {
        if !key.time.is_finite() || key.time < 0.0 {
            return Err(ToolError::invalid_payload(format!(
                "trigger time {} must be a finite non-negative number",
                key.time
            )));
        }
    }
    let policy = state.animation_time_policy;
    let animation = state
        .animations
        .iter_mut()
        .find(|a| a.name == animation_name)
        .ok_or_else(|| ToolError::invalid_state(format!("animation {animation_name} not found")))?;

    let idx = match animation.triggers.iter().position(|t| t.kind == kind) {
        Some(idx) => idx,
        None => {
            animation.triggers.push(Trigger { kind, keys: Vec::new() });
            animation.triggers.len() - 1
        }
    };
    let trigger = &mut animation.triggers[idx];
    let mut combined = std::mem::take(&mut trigger.keys);
    combined.extend(keys);
    trigger.keys = merge_trigger_keys(combined, policy);
    Ok(MutationEffect::Changed)
}

/// Clear the unsaved-changes flag once artifacts have been handed off.
pub fn mark_exported(state: &mut ProjectState) {
    state.dirty = false;
}

fn check_triple(values: &[f64; 3], what: &str) -> ToolResult<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ToolError::invalid_payload(format!("{what} must contain finite numbers")));
    }
    Ok(())
}

/// A UV reference must fit inside the current texture resolution.
fn check_uv_fits(
    state: &ProjectState,
    uv: Option<&[f64; 2]>,
    faces: Option<&std::collections::BTreeMap<String, super::project::Face>>,
) -> ToolResult<()> {
    let Some((width, height)) = state.texture_resolution() else {
        return Ok(());
    };
    let (width, height) = (f64::from(width), f64::from(height));
    if let Some([u, v]) = uv {
        if *u < 0.0 || *v < 0.0 || *u > width || *v > height {
            return Err(ToolError::invalid_payload(format!(
                "uv [{u}, {v}] outside texture resolution {width}x{height}"
            )));
        }
    }
    if let Some(faces) = faces {
        for (face, detail) in faces {
            if let Some([x1, y1, x2, y2]) = detail.uv {
                let fits = x1 >= 0.0
                    && y1 >= 0.0
                    && x1 <= width
                    && x2 <= width
                    && y1 <= height
                    && y2 <= height;
                if !fits {
                    return Err(ToolError::invalid_payload(format!(
                        "face {face} uv outside texture resolution {width}x{height}"
                    )));
                }
            }
        }
    }
    Ok(())
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

    fn cube(name: &str, bone: &str) -> Cube {
        Cube {
            id: None,
            name: name.to_string(),
            bone: bone.to_string(),
            from: [0.0; 3],
            to: [1.0; 3],
            uv: None,
            inflate: None,
            mirror: None,
            faces: None,
        }
    }

    #[test]
    fn test_add_bone_rejects_duplicates() {
        let mut state = ProjectState::default();
        add_bone(&mut state, bone("root")).unwrap();
        let err = add_bone(&mut state, bone("root")).unwrap_err();
        assert!(err.message.contains("already exists"));
    }

    #[test]
    fn test_delete_bone_cascade() {
        let mut state = ProjectState::default();
        add_bone(&mut state, bone("root")).unwrap();
        let mut child = bone("child");
        child.parent = Some("root".into());
        add_bone(&mut state, child).unwrap();
        add_cube(&mut state, cube("c1", "root")).unwrap();
        add_cube(&mut state, cube("c2", "child")).unwrap();

        delete_bone(&mut state, "root", DetachPolicy::Cascade).unwrap();
        assert!(state.bones.is_empty());
        assert!(state.cubes.is_empty());
    }

    #[test]
    fn test_delete_bone_reparent() {
        let mut state = ProjectState::default();
        add_bone(&mut state, bone("root")).unwrap();
        let mut child = bone("child");
        child.parent = Some("root".into());
        add_bone(&mut state, child).unwrap();
        add_cube(&mut state, cube("c1", "root")).unwrap();
        add_cube(&mut state, cube("c2", "child")).unwrap();

        delete_bone(&mut state, "root", DetachPolicy::Reparent).unwrap();
        assert_eq!(state.bones.len(), 1);
        assert_eq!(state.bones[0].parent, None);
        // the deleted bone's own cubes go, the survivor's cubes stay
        assert_eq!(state.cubes.len(), 1);
        assert_eq!(state.cubes[0].name, "c2");
    }

    #[test]
    fn test_rename_follows_dependents() {
        let mut state = ProjectState::default();
        add_bone(&mut state, bone("root")).unwrap();
        add_cube(&mut state, cube("c", "root")).unwrap();
        set_keyframes(
            &mut state,
            "idle",
            "root",
            ChannelKind::Rot,
            vec![],
        )
        .unwrap_err(); // no animation yet
        create_animation(
            &mut state,
            Animation {
                id: None,
                name: "idle".into(),
                length: 1.0,
                looped: true,
                fps: 20.0,
                channels: vec![],
                triggers: vec![],
            },
        )
        .unwrap();
        set_keyframes(
            &mut state,
            "idle",
            "root",
            ChannelKind::Rot,
            vec![Keyframe {
                time: 0.0,
                value: [0.0, 10.0, 0.0],
                interp: None,
                easing: None,
                easing_args: None,
                pre: None,
                post: None,
            }],
        )
        .unwrap();

        update_bone(
            &mut state,
            "root",
            BonePatch { new_name: Some("base".into()), ..BonePatch::default() },
        )
        .unwrap();
        assert_eq!(state.cubes[0].bone, "base");
        assert_eq!(state.animations[0].channels[0].bone, "base");
    }

    #[test]
    fn test_parent_cycle_rejected() {
        let mut state = ProjectState::default();
        add_bone(&mut state, bone("a")).unwrap();
        let mut b = bone("b");
        b.parent = Some("a".into());
        add_bone(&mut state, b).unwrap();

        let err = update_bone(
            &mut state,
            "a",
            BonePatch { parent: Some("b".into()), ..BonePatch::default() },
        )
        .unwrap_err();
        assert!(err.message.contains("cycle"));
    }

    #[test]
    fn test_texture_no_change() {
        let mut state = ProjectState::default();
        add_texture(
            &mut state,
            Texture {
                id: None,
                name: "skin".into(),
                width: 64,
                height: 64,
                content_hash: Some("abc".into()),
                meta: None,
            },
        )
        .unwrap();

        let effect = update_texture(
            &mut state,
            "skin",
            TexturePatch {
                content_hash: Some("abc".into()),
                width: Some(64),
                height: Some(64),
                ..TexturePatch::default()
            },
        )
        .unwrap();
        assert_eq!(effect, MutationEffect::NoChange);

        let effect = update_texture(
            &mut state,
            "skin",
            TexturePatch { content_hash: Some("def".into()), ..TexturePatch::default() },
        )
        .unwrap();
        assert_eq!(effect, MutationEffect::Changed);
    }

    #[test]
    fn test_uv_must_fit_texture() {
        let mut state = ProjectState::default();
        add_bone(&mut state, bone("root")).unwrap();
        add_texture(
            &mut state,
            Texture {
                id: None,
                name: "skin".into(),
                width: 16,
                height: 16,
                content_hash: None,
                meta: None,
            },
        )
        .unwrap();

        let mut c = cube("c", "root");
        c.uv = Some([20.0, 0.0]);
        assert!(add_cube(&mut state, c).is_err());

        let mut c = cube("c", "root");
        c.uv = Some([8.0, 8.0]);
        assert!(add_cube(&mut state, c).is_ok());
    }

    #[test]
    fn test_set_keyframes_same_bucket_replaces() {
        let mut state = ProjectState::default();
        add_bone(&mut state, bone("root")).unwrap();
        create_animation(
            &mut state,
            Animation {
                id: None,
                name: "idle".into(),
                length: 1.0,
                looped: true,
                fps: 20.0,
                channels: vec![],
                triggers: vec![],
            },
        )
        .unwrap();

        let key = |time: f64, y: f64| Keyframe {
            time,
            value: [0.0, y, 0.0],
            interp: None,
            easing: None,
            easing_args: None,
            pre: None,
            post: None,
        };
        set_keyframes(&mut state, "idle", "root", ChannelKind::Rot, vec![key(0.5, 1.0)]).unwrap();
        set_keyframes(&mut state, "idle", "root", ChannelKind::Rot, vec![key(0.500_05, 2.0)])
            .unwrap();

        let channel = state.animations[0].channel("root", ChannelKind::Rot).unwrap();
        assert_eq!(channel.keys.len(), 1);
        assert_eq!(channel.keys[0].value[1], 2.0);
    }
}
