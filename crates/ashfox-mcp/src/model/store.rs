//! Revision-guarded owner of a session's project state.
//!
//! All writes go through [`ProjectStore::mutate`]: the gate is checked and
//! the mutation applied to a working copy under one lock acquisition, and the
//! copy only replaces the live state after validation, normalization, and
//! re-hashing succeed. A rejected mutation therefore never leaves a partial
//! write behind.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Mutex;

use super::mutate::MutationEffect;
use super::normalize::normalize;
use super::project::ProjectState;
use super::revision::compute_revision;
use crate::config::Limits;
use crate::error::{ToolError, ToolResult};

struct Inner {
    state: ProjectState,
    revision: String,
}

/// Outcome of a committed mutation.
#[derive(Debug, Clone)]
pub struct MutateOutcome {
    /// Revision after the call.
    pub revision: String,
    /// Whether the state actually changed.
    pub changed: bool,
}

/// Thread-safe project state with optimistic-concurrency gating.
pub struct ProjectStore {
    inner: Mutex<Inner>,
    bypass_depth: AtomicU32,
    require_revision: bool,
    limits: Limits,
}

impl ProjectStore {
    /// Create a store around a fresh default project.
    #[must_use]
    pub fn new(require_revision: bool, limits: Limits) -> Self {
        Self::with_state(ProjectState::default(), require_revision, limits)
    }

    /// Create a store around an existing state.
    #[must_use]
    pub fn with_state(mut state: ProjectState, require_revision: bool, limits: Limits) -> Self {
        normalize(&mut state);
        let revision = compute_revision(&state);
        Self {
            inner: Mutex::new(Inner { state, revision }),
            bypass_depth: AtomicU32::new(0),
            require_revision,
            limits,
        }
    }

    /// Current revision token.
    pub async fn revision(&self) -> String {
        self.inner.lock().await.revision.clone()
    }

    /// Normalized copy of the state plus its revision.
    pub async fn snapshot(&self) -> (ProjectState, String) {
        let inner = self.inner.lock().await;
        (inner.state.clone(), inner.revision.clone())
    }

    /// Replace the live state wholesale (transactional rollback).
    pub async fn restore(&self, state: ProjectState) {
        let mut inner = self.inner.lock().await;
        let revision = compute_revision(&state);
        inner.state = state;
        inner.revision = revision;
    }

    /// Merge an externally-read snapshot: entities are upserted by name, the
    /// project header is taken from the incoming state.
    pub async fn merge_snapshot(&self, incoming: ProjectState) -> ToolResult<MutateOutcome> {
        let guard = self.revision_guard_bypass();
        let outcome = self
            .mutate(None, |state| {
                state.name = incoming.name.clone();
                state.format = incoming.format.clone();
                state.format_id = incoming.format_id.clone();
                state.uv_pixels_per_block = incoming.uv_pixels_per_block;
                for bone in &incoming.bones {
                    upsert_by_name(&mut state.bones, bone.clone(), |b| b.name.clone());
                }
                for cube in &incoming.cubes {
                    upsert_by_name(&mut state.cubes, cube.clone(), |c| c.name.clone());
                }
                for texture in &incoming.textures {
                    upsert_by_name(&mut state.textures, texture.clone(), |t| t.name.clone());
                }
                for animation in &incoming.animations {
                    upsert_by_name(&mut state.animations, animation.clone(), |a| a.name.clone());
                }
                Ok(MutationEffect::Changed)
            })
            .await;
        drop(guard);
        outcome
    }

    /// Run a mutation under the revision gate.
    ///
    /// # Errors
    ///
    /// `invalid_state` when the policy demands a revision and none was given,
    /// `invalid_state_revision_mismatch` when the given revision is stale,
    /// or whatever the mutator itself rejects with. On any error the live
    /// state is untouched.
    pub async fn mutate<F>(&self, if_revision: Option<&str>, f: F) -> ToolResult<MutateOutcome>
    where
        F: FnOnce(&mut ProjectState) -> ToolResult<MutationEffect>,
    {
        let mut inner = self.inner.lock().await;

        if self.bypass_depth.load(Ordering::Acquire) == 0 {
            match if_revision {
                None if self.require_revision => return Err(ToolError::revision_required()),
                Some(provided) if provided != inner.revision => {
                    return Err(ToolError::revision_mismatch(provided, inner.revision.clone()));
                }
                _ => {}
            }
        }

        let mut working = inner.state.clone();
        let effect = f(&mut working)?;
        if effect == MutationEffect::NoChange {
            return Ok(MutateOutcome { revision: inner.revision.clone(), changed: false });
        }

        working.validate(&self.limits)?;
        normalize(&mut working);
        let revision = compute_revision(&working);
        let changed = revision != inner.revision;
        if changed {
            working.dirty = true;
        }
        inner.state = working;
        inner.revision = revision.clone();
        Ok(MutateOutcome { revision, changed })
    }

    /// Suspend revision gating while the returned guard lives. Reentrant:
    /// nested guards keep the gate open until the last one drops.
    #[must_use]
    pub fn revision_guard_bypass(&self) -> BypassGuard<'_> {
        self.bypass_depth.fetch_add(1, Ordering::AcqRel);
        BypassGuard { store: self }
    }

    /// Whether the gate is currently bypassed.
    #[must_use]
    pub fn bypassing(&self) -> bool {
        self.bypass_depth.load(Ordering::Acquire) > 0
    }

    /// Whether the policy demands `ifRevision` on mutations.
    #[must_use]
    pub const fn requires_revision(&self) -> bool {
        self.require_revision
    }
}

impl std::fmt::Debug for ProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectStore")
            .field("require_revision", &self.require_revision)
            .finish()
    }
}

/// RAII scope suspending the revision gate.
pub struct BypassGuard<'a> {
    store: &'a ProjectStore,
}

impl Drop for BypassGuard<'_> {
    fn drop(&mut self) {
        self.store.bypass_depth.fetch_sub(1, Ordering::AcqRel);
    }
}

fn upsert_by_name<T, K: FnMut(&T) -> String>(items: &mut Vec<T>, item: T, mut key: K) {
    let name = key(&item);
    match items.iter().position(|existing| key(existing) == name) {
        Some(idx) => items[idx] = item,
        None => items.push(item),
    }
}

/// Convenience used by tests and composite appliers.
pub type SharedProjectStore = Arc<ProjectStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mutate::{self};
    use crate::model::project::Bone;

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
    async fn test_revision_required() {
        let store = ProjectStore::new(true, Limits::default());
        let err = store
            .mutate(None, |state| mutate::add_bone(state, bone("root")))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidState);
        assert!(err.fix.is_some());
    }

    #[tokio::test]
    async fn test_revision_mismatch_preserves_state() {
        let store = ProjectStore::new(true, Limits::default());
        let r0 = store.revision().await;
        store
            .mutate(Some(&r0), |state| mutate::add_bone(state, bone("root")))
            .await
            .unwrap();
        let (before, r1) = store.snapshot().await;
        assert_ne!(r0, r1);

        let err = store
            .mutate(Some(&r0), |state| mutate::add_bone(state, bone("other")))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidStateRevisionMismatch);
        let details = err.details.unwrap();
        assert_eq!(details["expected"], r0);
        assert_eq!(details["currentRevision"], r1);

        let (after, r_after) = store.snapshot().await;
        assert_eq!(before, after);
        assert_eq!(r1, r_after);
    }

    #[tokio::test]
    async fn test_failed_mutator_rolls_back() {
        let store = ProjectStore::new(true, Limits::default());
        let r0 = store.revision().await;
        let err = store
            .mutate(Some(&r0), |state| {
                mutate::add_bone(state, bone("root"))?;
                Err(ToolError::invalid_payload("late failure"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidPayload);
        let (state, revision) = store.snapshot().await;
        assert!(state.bones.is_empty());
        assert_eq!(revision, r0);
    }

    #[tokio::test]
    async fn test_bypass_guard_is_reentrant() {
        let store = ProjectStore::new(true, Limits::default());
        let outer = store.revision_guard_bypass();
        {
            let _inner = store.revision_guard_bypass();
            store
                .mutate(None, |state| mutate::add_bone(state, bone("a")))
                .await
                .unwrap();
        }
        assert!(store.bypassing());
        store
            .mutate(None, |state| mutate::add_bone(state, bone("b")))
            .await
            .unwrap();
        drop(outer);
        assert!(!store.bypassing());
        assert!(
            store
                .mutate(None, |state| mutate::add_bone(state, bone("c")))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_identical_sequences_yield_identical_revisions() {
        let run = || async {
            let store = ProjectStore::new(false, Limits::default());
            store
                .mutate(None, |state| mutate::add_bone(state, bone("root")))
                .await
                .unwrap();
            store
                .mutate(None, |state| {
                    let mut child = bone("child");
                    child.parent = Some("root".into());
                    mutate::add_bone(state, child)
                })
                .await
                .unwrap();
            store.revision().await
        };
        assert_eq!(run().await, run().await);
    }

    #[tokio::test]
    async fn test_merge_snapshot_upserts() {
        let store = ProjectStore::new(true, Limits::default());
        let r0 = store.revision().await;
        store
            .mutate(Some(&r0), |state| mutate::add_bone(state, bone("root")))
            .await
            .unwrap();

        let mut incoming = ProjectState::new("imported", "block");
        incoming.bones.push(bone("root"));
        incoming.bones.push(bone("extra"));
        store.merge_snapshot(incoming).await.unwrap();

        let (state, _) = store.snapshot().await;
        assert_eq!(state.name, "imported");
        assert_eq!(state.bones.len(), 2);
    }
}
