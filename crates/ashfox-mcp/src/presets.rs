//! Blueprint operations and the starter-rig preset catalogue.
//!
//! A blueprint is a list of declarative operations applied as one composite
//! mutation. Presets are canned blueprints for common rigs; they are also
//! readable as templated resources.

use serde::{Deserialize, Serialize};

use crate::error::{ToolError, ToolResult};
use crate::model::{
    Animation, Bone, ChannelKind, Cube, DetachPolicy, Keyframe, MutationEffect, ProjectState,
    Texture, TriggerKey, TriggerKind, mutate,
};

/// One declarative blueprint operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum BlueprintOp {
    AddBone {
        bone: Bone,
    },
    AddCube {
        cube: Cube,
    },
    AddTexture {
        texture: Texture,
    },
    CreateAnimation {
        animation: Animation,
    },
    SetKeyframes {
        animation: String,
        bone: String,
        channel: ChannelKind,
        keys: Vec<Keyframe>,
    },
    SetTriggers {
        animation: String,
        #[serde(rename = "type")]
        kind: TriggerKind,
        keys: Vec<TriggerKey>,
    },
    DeleteBone {
        name: String,
        #[serde(default)]
        policy: DetachPolicy,
    },
    DeleteCube {
        name: String,
    },
    DeleteTexture {
        name: String,
    },
    DeleteAnimation {
        name: String,
    },
}

impl BlueprintOp {
    /// Short label used in partial-apply reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::AddBone { bone } => format!("addBone:{}", bone.name),
            Self::AddCube { cube } => format!("addCube:{}", cube.name),
            Self::AddTexture { texture } => format!("addTexture:{}", texture.name),
            Self::CreateAnimation { animation } => format!("createAnimation:{}", animation.name),
            Self::SetKeyframes { animation, bone, .. } => {
                format!("setKeyframes:{animation}/{bone}")
            }
            Self::SetTriggers { animation, .. } => format!("setTriggers:{animation}"),
            Self::DeleteBone { name, .. } => format!("deleteBone:{name}"),
            Self::DeleteCube { name } => format!("deleteCube:{name}"),
            Self::DeleteTexture { name } => format!("deleteTexture:{name}"),
            Self::DeleteAnimation { name } => format!("deleteAnimation:{name}"),
        }
    }

    /// Deterministic application order: structure before content before
    /// deletions, names breaking ties.
    #[must_use]
    pub fn sort_key(&self) -> (u8, String) {
        match self {
            Self::AddBone { bone } => (0, bone.name.clone()),
            Self::AddTexture { texture } => (1, texture.name.clone()),
            Self::AddCube { cube } => (2, cube.name.clone()),
            Self::CreateAnimation { animation } => (3, animation.name.clone()),
            Self::SetKeyframes { animation, bone, channel, .. } => {
                (4, format!("{animation}/{bone}/{channel:?}"))
            }
            Self::SetTriggers { animation, kind, .. } => (5, format!("{animation}/{kind:?}")),
            Self::DeleteCube { name } => (6, name.clone()),
            Self::DeleteBone { name, .. } => (7, name.clone()),
            Self::DeleteTexture { name } => (8, name.clone()),
            Self::DeleteAnimation { name } => (9, name.clone()),
        }
    }

    /// Apply this operation to a working state.
    pub fn apply(&self, state: &mut ProjectState) -> ToolResult<MutationEffect> {
        match self.clone() {
            Self::AddBone { bone } => mutate::add_bone(state, bone),
            Self::AddCube { cube } => mutate::add_cube(state, cube),
            Self::AddTexture { texture } => mutate::add_texture(state, texture),
            Self::CreateAnimation { animation } => mutate::create_animation(state, animation),
            Self::SetKeyframes { animation, bone, channel, keys } => {
                mutate::set_keyframes(state, &animation, &bone, channel, keys)
            }
            Self::SetTriggers { animation, kind, keys } => {
                mutate::set_triggers(state, &animation, kind, keys)
            }
            Self::DeleteBone { name, policy } => mutate::delete_bone(state, &name, policy),
            Self::DeleteCube { name } => mutate::delete_cube(state, &name),
            Self::DeleteTexture { name } => mutate::delete_texture(state, &name),
            Self::DeleteAnimation { name } => mutate::delete_animation(state, &name),
        }
    }
}

/// Names of the canned presets.
pub const PRESET_NAMES: &[&str] = &["cuboid", "biped", "quadruped"];

/// Look up a preset blueprint by name.
///
/// # Errors
///
/// `invalid_payload` for an unknown preset name.
pub fn preset(name: &str) -> ToolResult<Vec<BlueprintOp>> {
    match name {
        "cuboid" => Ok(cuboid()),
        "biped" => Ok(biped()),
        "quadruped" => Ok(quadruped()),
        other => Err(ToolError::invalid_payload(format!(
            "unknown preset {other}; expected one of {PRESET_NAMES:?}"
        ))),
    }
}

fn bone(name: &str, parent: Option<&str>, pivot: [f64; 3]) -> BlueprintOp {
    BlueprintOp::AddBone {
        bone: Bone {
            id: None,
            name: name.to_string(),
            parent: parent.map(String::from),
            pivot,
            rotation: None,
            scale: None,
            visibility: None,
        },
    }
}

fn cube(name: &str, bone: &str, from: [f64; 3], to: [f64; 3]) -> BlueprintOp {
    BlueprintOp::AddCube {
        cube: Cube {
            id: None,
            name: name.to_string(),
            bone: bone.to_string(),
            from,
            to,
            uv: Some([0.0, 0.0]),
            inflate: None,
            mirror: None,
            faces: None,
        },
    }
}

fn cuboid() -> Vec<BlueprintOp> {
    vec![
        bone("root", None, [0.0, 0.0, 0.0]),
        cube("body", "root", [-4.0, 0.0, -4.0], [4.0, 8.0, 4.0]),
    ]
}

fn biped() -> Vec<BlueprintOp> {
    vec![
        bone("root", None, [0.0, 0.0, 0.0]),
        bone("body", Some("root"), [0.0, 12.0, 0.0]),
        bone("head", Some("body"), [0.0, 24.0, 0.0]),
        bone("arm_left", Some("body"), [5.0, 22.0, 0.0]),
        bone("arm_right", Some("body"), [-5.0, 22.0, 0.0]),
        bone("leg_left", Some("root"), [2.0, 12.0, 0.0]),
        bone("leg_right", Some("root"), [-2.0, 12.0, 0.0]),
        cube("torso", "body", [-4.0, 12.0, -2.0], [4.0, 24.0, 2.0]),
        cube("skull", "head", [-4.0, 24.0, -4.0], [4.0, 32.0, 4.0]),
        cube("arm_left_box", "arm_left", [4.0, 12.0, -2.0], [8.0, 24.0, 2.0]),
        cube("arm_right_box", "arm_right", [-8.0, 12.0, -2.0], [-4.0, 24.0, 2.0]),
        cube("leg_left_box", "leg_left", [0.0, 0.0, -2.0], [4.0, 12.0, 2.0]),
        cube("leg_right_box", "leg_right", [-4.0, 0.0, -2.0], [0.0, 12.0, 2.0]),
    ]
}

fn quadruped() -> Vec<BlueprintOp> {
    vec![
        bone("root", None, [0.0, 0.0, 0.0]),
        bone("body", Some("root"), [0.0, 8.0, 0.0]),
        bone("head", Some("body"), [0.0, 12.0, -8.0]),
        bone("leg_front_left", Some("body"), [3.0, 6.0, -5.0]),
        bone("leg_front_right", Some("body"), [-3.0, 6.0, -5.0]),
        bone("leg_back_left", Some("body"), [3.0, 6.0, 5.0]),
        bone("leg_back_right", Some("body"), [-3.0, 6.0, 5.0]),
        cube("trunk", "body", [-4.0, 6.0, -8.0], [4.0, 14.0, 8.0]),
        cube("skull", "head", [-3.0, 10.0, -14.0], [3.0, 16.0, -8.0]),
        cube("leg_fl", "leg_front_left", [2.0, 0.0, -6.0], [4.0, 6.0, -4.0]),
        cube("leg_fr", "leg_front_right", [-4.0, 0.0, -6.0], [-2.0, 6.0, -4.0]),
        cube("leg_bl", "leg_back_left", [2.0, 0.0, 4.0], [4.0, 6.0, 6.0]),
        cube("leg_br", "leg_back_right", [-4.0, 0.0, 4.0], [-2.0, 6.0, 6.0]),
    ]
}
