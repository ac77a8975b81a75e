//! Canonical ordering and keyframe bucketing.
//!
//! Normalization runs before revision hashing and before export, so that two
//! semantically equal states serialize identically.

use super::project::{Keyframe, ProjectState, TimePolicy, TriggerKey};

/// Normalize a project in place: deterministic entity ordering, bucketed and
/// merged keyframe times, `-0.0` collapsed to `0.0`.
pub fn normalize(state: &mut ProjectState) {
    let policy = state.animation_time_policy;

    state.bones.sort_by(|a, b| {
        let ka = (a.parent.clone().unwrap_or_default(), a.name.clone());
        let kb = (b.parent.clone().unwrap_or_default(), b.name.clone());
        ka.cmp(&kb)
    });
    for bone in &mut state.bones {
        clean_triple(&mut bone.pivot);
        if let Some(rotation) = &mut bone.rotation {
            clean_triple(rotation);
        }
        if let Some(scale) = &mut bone.scale {
            clean_triple(scale);
        }
    }

    state.cubes.sort_by(|a, b| (&a.bone, &a.name).cmp(&(&b.bone, &b.name)));
    for cube in &mut state.cubes {
        clean_triple(&mut cube.from);
        clean_triple(&mut cube.to);
    }

    state.textures.sort_by(|a, b| a.name.cmp(&b.name));

    state.animations.sort_by(|a, b| a.name.cmp(&b.name));
    for animation in &mut state.animations {
        animation
            .channels
            .sort_by(|a, b| (&a.bone, a.channel).cmp(&(&b.bone, b.channel)));
        for channel in &mut animation.channels {
            channel.keys = merge_keys(std::mem::take(&mut channel.keys), policy);
        }
        animation.channels.retain(|c| !c.keys.is_empty());

        animation.triggers.sort_by_key(|t| t.kind);
        for trigger in &mut animation.triggers {
            trigger.keys = merge_trigger_keys(std::mem::take(&mut trigger.keys), policy);
        }
        animation.triggers.retain(|t| !t.keys.is_empty());
    }
}

/// Bucket keyframe times and merge duplicates, last write wins. The result is
/// strictly ordered by time.
#[must_use]
pub fn merge_keys(keys: Vec<Keyframe>, policy: TimePolicy) -> Vec<Keyframe> {
    let mut merged: Vec<Keyframe> = Vec::with_capacity(keys.len());
    for mut key in keys {
        key.time = policy.bucket(key.time);
        clean_triple(&mut key.value);
        if let Some(pre) = &mut key.pre {
            clean_triple(pre);
        }
        if let Some(post) = &mut key.post {
            clean_triple(post);
        }
        match merged.iter().position(|k| policy.same_time(k.time, key.time)) {
            Some(idx) => merged[idx] = key,
            None => merged.push(key),
        }
    }
    merged.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

/// Same bucketing rules for trigger keys.
#[must_use]
pub fn merge_trigger_keys(keys: Vec<TriggerKey>, policy: TimePolicy) -> Vec<TriggerKey> {
    let mut merged: Vec<TriggerKey> = Vec::with_capacity(keys.len());
    for mut key in keys {
        key.time = policy.bucket(key.time);
        match merged.iter().position(|k| policy.same_time(k.time, key.time)) {
            Some(idx) => merged[idx] = key,
            None => merged.push(key),
        }
    }
    merged.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

fn clean_triple(values: &mut [f64; 3]) {
    for v in values {
        if *v == 0.0 {
            *v = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::{Animation, Bone, Channel, ChannelKind};

    fn key(time: f64, value: [f64; 3]) -> Keyframe {
        Keyframe {
            time,
            value,
            interp: None,
            easing: None,
            easing_args: None,
            pre: None,
            post: None,
        }
    }

    #[test]
    fn test_merge_same_bucket_last_wins() {
        let policy = TimePolicy::default();
        let merged = merge_keys(
            vec![key(0.5, [1.0, 0.0, 0.0]), key(0.500_05, [2.0, 0.0, 0.0])],
            policy,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, [2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_merge_orders_by_time() {
        let policy = TimePolicy::default();
        let merged = merge_keys(
            vec![key(1.0, [1.0; 3]), key(0.0, [0.0; 3]), key(0.5, [0.5; 3])],
            policy,
        );
        let times: Vec<f64> = merged.iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_normalize_sorts_everything() {
        let mut state = ProjectState::default();
        state.bones = vec![
            Bone {
                id: None,
                name: "zeta".into(),
                parent: None,
                pivot: [0.0; 3],
                rotation: None,
                scale: None,
                visibility: None,
            },
            Bone {
                id: None,
                name: "alpha".into(),
                parent: None,
                pivot: [-0.0, 0.0, 0.0],
                rotation: None,
                scale: None,
                visibility: None,
            },
        ];
        state.animations = vec![Animation {
            id: None,
            name: "idle".into(),
            length: 1.0,
            looped: true,
            fps: 20.0,
            channels: vec![
                Channel { bone: "zeta".into(), channel: ChannelKind::Rot, keys: vec![key(0.0, [0.0; 3])] },
                Channel { bone: "alpha".into(), channel: ChannelKind::Rot, keys: vec![] },
            ],
            triggers: vec![],
        }];

        normalize(&mut state);

        assert_eq!(state.bones[0].name, "alpha");
        assert!(state.bones[0].pivot[0].is_sign_positive());
        // empty channel dropped, remaining sorted
        assert_eq!(state.animations[0].channels.len(), 1);
        assert_eq!(state.animations[0].channels[0].bone, "zeta");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut state = ProjectState::default();
        state.bones = vec![Bone {
            id: None,
            name: "root".into(),
            parent: None,
            pivot: [0.0; 3],
            rotation: None,
            scale: None,
            visibility: None,
        }];
        normalize(&mut state);
        let once = state.clone();
        normalize(&mut state);
        assert_eq!(state, once);
    }
}
