//! Animation artifact assembly.
//!
//! Channels emit keyed objects whose keys are the fixed-precision string of
//! the bucketed time. Rotation values are Y-negated relative to the source;
//! position and scale pass through unchanged. Keys with easing data emit an
//! object, bare keys a 3-tuple.

use super::json::{Doc, format_time_key};
use crate::model::{Animation, ChannelKind, Keyframe, ProjectState, TriggerKind};

/// Build the animation document for a normalized snapshot.
#[must_use]
pub fn build(state: &ProjectState) -> Doc {
    let mut animations = Doc::obj();
    for animation in &state.animations {
        animations.push(animation.name.clone(), animation_doc(animation));
    }
    let mut root = Doc::obj();
    root.push("animations", animations);
    root
}

fn animation_doc(animation: &Animation) -> Doc {
    let mut doc = Doc::obj();
    doc.push("animation_length", Doc::num(animation.length));
    doc.push("loop", Doc::Bool(animation.looped));

    let mut bones = Doc::obj();
    let mut current: Option<(String, Doc)> = None;
    for channel in &animation.channels {
        if channel.keys.is_empty() {
            continue;
        }
        let keyed = channel_doc(channel.channel, &channel.keys);
        match &mut current {
            Some((bone, entry)) if *bone == channel.bone => {
                entry.push(channel.channel.export_key(), keyed);
            }
            _ => {
                if let Some((bone, entry)) = current.take() {
                    bones.push(bone, entry);
                }
                let mut entry = Doc::obj();
                entry.push(channel.channel.export_key(), keyed);
                current = Some((channel.bone.clone(), entry));
            }
        }
    }
    if let Some((bone, entry)) = current.take() {
        bones.push(bone, entry);
    }
    doc.push("bones", bones);

    for trigger in &animation.triggers {
        if trigger.keys.is_empty() {
            continue;
        }
        let mut keyed = Doc::obj();
        for key in &trigger.keys {
            let value = match trigger.kind {
                TriggerKind::Sound | TriggerKind::Particle => {
                    let mut effect = Doc::obj();
                    effect.push("effect", Doc::Str(key.value.clone()));
                    effect
                }
                TriggerKind::Timeline => Doc::Str(key.value.clone()),
            };
            keyed.push(format_time_key(key.time), value);
        }
        let field = match trigger.kind {
            TriggerKind::Sound => "sound_effects",
            TriggerKind::Particle => "particle_effects",
            TriggerKind::Timeline => "timeline",
        };
        doc.push(field, keyed);
    }
    doc
}

fn channel_doc(kind: ChannelKind, keys: &[Keyframe]) -> Doc {
    let mut keyed = Doc::obj();
    for key in keys {
        keyed.push(format_time_key(key.time), key_doc(kind, key));
    }
    keyed
}

fn key_doc(kind: ChannelKind, key: &Keyframe) -> Doc {
    if key.has_easing() {
        let mut doc = Doc::obj();
        doc.push_opt("pre", key.pre.map(|v| value_doc(kind, v)));
        doc.push(
            "post",
            key.post.map_or_else(|| value_doc(kind, key.value), |v| value_doc(kind, v)),
        );
        doc.push_opt("easing", key.easing.clone().map(Doc::Str));
        doc.push_opt(
            "easingArgs",
            key.easing_args
                .clone()
                .map(|args| Doc::Arr(args.into_iter().map(Doc::num).collect())),
        );
        doc
    } else {
        value_doc(kind, key.value)
    }
}

fn value_doc(kind: ChannelKind, value: [f64; 3]) -> Doc {
    let adjusted = match kind {
        ChannelKind::Rot => [value[0], -value[1], value[2]],
        ChannelKind::Pos | ChannelKind::Scale => value,
    };
    Doc::triple(adjusted)
}
