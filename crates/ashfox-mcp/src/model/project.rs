//! Session-scoped project model: bones, cubes, textures, animations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Limits, limits};
use crate::error::{ToolError, ToolResult};

/// Keyframe time identification policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimePolicy {
    /// Tolerance when comparing bucketed times.
    pub time_epsilon: f64,
    /// Bucket width, in seconds.
    pub bucket_precision: f64,
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self {
            time_epsilon: limits::TIME_EPSILON,
            bucket_precision: limits::BUCKET_PRECISION,
        }
    }
}

impl TimePolicy {
    /// Snap a time onto its bucket.
    #[must_use]
    pub fn bucket(&self, time: f64) -> f64 {
        if self.bucket_precision <= 0.0 {
            return time;
        }
        (time / self.bucket_precision).round() * self.bucket_precision
    }

    /// Whether two bucketed times identify the same keyframe.
    #[must_use]
    pub fn same_time(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.time_epsilon
    }
}

/// A named joint in the model tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub pivot: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<bool>,
}

/// One face of a cube.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Face {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

/// An axis-aligned box attached to a bone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cube {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub bone: String,
    pub from: [f64; 3],
    pub to: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faces: Option<BTreeMap<String, Face>>,
}

/// Texture metadata; pixel payloads never enter the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Texture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Animated attribute of a bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Rot,
    Pos,
    Scale,
}

impl ChannelKind {
    /// Key used for this channel in exported animation JSON.
    #[must_use]
    pub const fn export_key(self) -> &'static str {
        match self {
            Self::Rot => "rotation",
            Self::Pos => "position",
            Self::Scale => "scale",
        }
    }
}

/// A single keyframe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    pub time: f64,
    pub value: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing_args: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<[f64; 3]>,
}

impl Keyframe {
    /// Whether this key carries easing data beyond the bare value.
    #[must_use]
    pub fn has_easing(&self) -> bool {
        self.easing.is_some() || self.pre.is_some() || self.post.is_some()
    }
}

/// A (bone, attribute) keyframe track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub bone: String,
    pub channel: ChannelKind,
    pub keys: Vec<Keyframe>,
}

/// Trigger track kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Sound,
    Particle,
    Timeline,
}

/// One timed trigger value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerKey {
    pub time: f64,
    pub value: String,
}

/// A trigger track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    pub keys: Vec<TriggerKey>,
}

/// An animation clip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub length: f64,
    #[serde(rename = "loop")]
    pub looped: bool,
    pub fps: f64,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

impl Animation {
    /// Find a channel track by bone and kind.
    #[must_use]
    pub fn channel(&self, bone: &str, kind: ChannelKind) -> Option<&Channel> {
        self.channels.iter().find(|c| c.bone == bone && c.channel == kind)
    }
}

/// The session-scoped project tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub id: String,
    pub name: String,
    pub format: String,
    pub format_id: String,
    pub dirty: bool,
    pub uv_pixels_per_block: u32,
    #[serde(default)]
    pub bones: Vec<Bone>,
    #[serde(default)]
    pub cubes: Vec<Cube>,
    #[serde(default)]
    pub textures: Vec<Texture>,
    #[serde(default)]
    pub animations: Vec<Animation>,
    #[serde(default)]
    pub animation_time_policy: TimePolicy,
}

impl ProjectState {
    /// Create an empty project.
    #[must_use]
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        let name = name.into();
        let format = format.into();
        Self {
            id: format!("project.{name}"),
            format_id: format.clone(),
            name,
            format,
            dirty: false,
            uv_pixels_per_block: 16,
            bones: Vec::new(),
            cubes: Vec::new(),
            textures: Vec::new(),
            animations: Vec::new(),
            animation_time_policy: TimePolicy::default(),
        }
    }

    #[must_use]
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }

    #[must_use]
    pub fn cube(&self, name: &str) -> Option<&Cube> {
        self.cubes.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&Texture> {
        self.textures.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Names of all bones whose parent chain includes `root`.
    #[must_use]
    pub fn descendants_of(&self, root: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut frontier = vec![root.to_string()];
        while let Some(current) = frontier.pop() {
            for bone in &self.bones {
                if bone.parent.as_deref() == Some(current.as_str()) {
                    frontier.push(bone.name.clone());
                    out.push(bone.name.clone());
                }
            }
        }
        out
    }

    /// Largest texture resolution currently loaded, if any.
    #[must_use]
    pub fn texture_resolution(&self) -> Option<(u32, u32)> {
        self.textures
            .iter()
            .map(|t| (t.width, t.height))
            .reduce(|(w1, h1), (w2, h2)| (w1.max(w2), h1.max(h2)))
    }

    /// Check the structural invariants against the configured limits.
    ///
    /// # Errors
    ///
    /// Returns `invalid_state` when a reference or uniqueness invariant is
    /// broken, `invalid_payload` when a bound is exceeded.
    pub fn validate(&self, limits: &Limits) -> ToolResult<()> {
        let mut seen = std::collections::HashSet::new();
        for bone in &self.bones {
            if !seen.insert(bone.name.as_str()) {
                return Err(ToolError::invalid_state(format!(
                    "duplicate bone name: {}",
                    bone.name
                )));
            }
            if let Some(parent) = &bone.parent {
                if self.bone(parent).is_none() {
                    return Err(ToolError::invalid_state(format!(
                        "bone {} references missing parent {parent}",
                        bone.name
                    )));
                }
            }
        }

        if self.cubes.len() > limits.max_cubes {
            return Err(ToolError::invalid_payload(format!(
                "cube count {} exceeds limit {}",
                self.cubes.len(),
                limits.max_cubes
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for cube in &self.cubes {
            if !seen.insert(cube.name.as_str()) {
                return Err(ToolError::invalid_state(format!(
                    "duplicate cube name: {}",
                    cube.name
                )));
            }
            if self.bone(&cube.bone).is_none() {
                return Err(ToolError::invalid_state(format!(
                    "cube {} references missing bone {}",
                    cube.name, cube.bone
                )));
            }
            for axis in 0..3 {
                if !cube.from[axis].is_finite() || !cube.to[axis].is_finite() {
                    return Err(ToolError::invalid_payload(format!(
                        "cube {} has non-finite bounds",
                        cube.name
                    )));
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        for texture in &self.textures {
            if !seen.insert(texture.name.as_str()) {
                return Err(ToolError::invalid_state(format!(
                    "duplicate texture name: {}",
                    texture.name
                )));
            }
            if texture.width == 0 || texture.height == 0 {
                return Err(ToolError::invalid_payload(format!(
                    "texture {} must have positive dimensions",
                    texture.name
                )));
            }
            if texture.width > limits.max_texture_size || texture.height > limits.max_texture_size
            {
                return Err(ToolError::invalid_payload(format!(
                    "texture {} exceeds {}px limit",
                    texture.name, limits.max_texture_size
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for animation in &self.animations {
            if !seen.insert(animation.name.as_str()) {
                return Err(ToolError::invalid_state(format!(
                    "duplicate animation name: {}",
                    animation.name
                )));
            }
            if animation.length <= 0.0 || !animation.length.is_finite() {
                return Err(ToolError::invalid_payload(format!(
                    "animation {} must have length > 0",
                    animation.name
                )));
            }
            if animation.fps <= 0.0 || !animation.fps.is_finite() {
                return Err(ToolError::invalid_payload(format!(
                    "animation {} must have fps > 0",
                    animation.name
                )));
            }
            if animation.length > limits.max_animation_seconds {
                return Err(ToolError::invalid_payload(format!(
                    "animation {} exceeds {}s limit",
                    animation.name, limits.max_animation_seconds
                )));
            }
            for channel in &animation.channels {
                if self.bone(&channel.bone).is_none() {
                    return Err(ToolError::invalid_state(format!(
                        "animation {} animates missing bone {}",
                        animation.name, channel.bone
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::new("untitled", "free")
    }
}
