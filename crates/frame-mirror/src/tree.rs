//! Frame entities and the owning frame-tree store.
//!
//! Frames live in a single table keyed by protocol frame id; parent/child
//! edges are id references through that table, never direct object links.
//! The store is only mutated from the dispatcher, so the recursive teardown
//! paths run to completion between any two external reads.

use std::collections::HashMap;

use pagemirror_core_types::{ExecutionContextId, FrameId, FrameInstanceId, LoaderId};
use serde::Serialize;
use tracing::debug;

use crate::error::{MirrorError, MirrorErrorKind};
use crate::events::{FramePayload, FrameTreeSnapshot, TreeEvent};

/// One node of the document hierarchy.
#[derive(Clone, Debug)]
pub(crate) struct Frame {
    pub id: FrameId,
    pub instance: FrameInstanceId,
    pub parent_id: Option<FrameId>,
    pub children: Vec<FrameId>,
    pub loader_id: LoaderId,
    pub url: String,
    pub name: String,
    pub lifecycle: HashMap<String, LoaderId>,
    pub default_context: Option<ExecutionContextId>,
}

impl Frame {
    fn new(id: FrameId, parent_id: Option<FrameId>) -> Self {
        Self {
            id,
            instance: FrameInstanceId::new(),
            parent_id,
            children: Vec::new(),
            loader_id: LoaderId::default(),
            url: String::new(),
            name: String::new(),
            lifecycle: HashMap::new(),
            default_context: None,
        }
    }

    pub(crate) fn view(&self) -> FrameView {
        FrameView {
            id: self.id.clone(),
            instance: self.instance,
            parent_id: self.parent_id.clone(),
            children: self.children.clone(),
            loader_id: self.loader_id.clone(),
            url: self.url.clone(),
            name: self.name.clone(),
            default_context: self.default_context,
        }
    }
}

/// Snapshot of one frame, safe to hand to other threads and tasks.
#[derive(Clone, Debug, Serialize)]
pub struct FrameView {
    pub id: FrameId,
    pub instance: FrameInstanceId,
    pub parent_id: Option<FrameId>,
    pub children: Vec<FrameId>,
    pub loader_id: LoaderId,
    pub url: String,
    pub name: String,
    pub default_context: Option<ExecutionContextId>,
}

impl FrameView {
    pub fn is_main(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Owning table of attached frames plus the current root.
#[derive(Default)]
pub struct FrameTreeStore {
    frames: HashMap<FrameId, Frame>,
    main_frame: Option<FrameId>,
}

impl FrameTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new child frame. Duplicate ids and unknown parents are benign
    /// races and leave the store untouched.
    pub(crate) fn attach(
        &mut self,
        frame_id: FrameId,
        parent_id: FrameId,
        out: &mut Vec<TreeEvent>,
    ) {
        if self.frames.contains_key(&frame_id) {
            debug!(target: "frame-mirror", frame = %frame_id, "duplicate attach ignored");
            return;
        }
        let Some(parent) = self.frames.get_mut(&parent_id) else {
            debug!(
                target: "frame-mirror",
                frame = %frame_id,
                parent = %parent_id,
                "attach for unknown parent ignored"
            );
            return;
        };
        parent.children.push(frame_id.clone());
        let frame = Frame::new(frame_id.clone(), Some(parent_id));
        out.push(TreeEvent::Attached(frame.view()));
        self.frames.insert(frame_id, frame);
    }

    /// Apply a navigation payload. An empty parent marks a root navigation,
    /// which rekeys the existing main frame without replacing the instance.
    /// Returns the ids of frames removed by the subtree teardown so the
    /// caller can drop their execution contexts in the same dispatch.
    pub(crate) fn navigate(
        &mut self,
        payload: &FramePayload,
        out: &mut Vec<TreeEvent>,
    ) -> Result<Vec<FrameId>, MirrorError> {
        let mut removed = Vec::new();
        let target_id = if payload.parent().is_none() {
            match self.main_frame.clone() {
                Some(old_id) => {
                    self.discard_children(&old_id, out, &mut removed);
                    if old_id != payload.id {
                        // Cross-document navigation in the same tab: the key
                        // changes, the frame object does not.
                        if let Some(frame) = self.frames.remove(&old_id) {
                            self.frames.insert(payload.id.clone(), frame);
                        }
                        self.main_frame = Some(payload.id.clone());
                    }
                    payload.id.clone()
                }
                None => {
                    self.frames
                        .insert(payload.id.clone(), Frame::new(payload.id.clone(), None));
                    self.main_frame = Some(payload.id.clone());
                    payload.id.clone()
                }
            }
        } else {
            if !self.frames.contains_key(&payload.id) {
                // The protocol promises attach-before-navigate for subframes.
                return Err(MirrorError::new(MirrorErrorKind::TreeDesync).with_hint(format!(
                    "navigation for unattached subframe {}",
                    payload.id
                )));
            }
            self.discard_children(&payload.id, out, &mut removed);
            payload.id.clone()
        };

        if let Some(frame) = self.frames.get_mut(&target_id) {
            frame.id = target_id.clone();
            frame.url = payload.url.clone();
            frame.name = payload.name.clone();
            frame.loader_id = payload.loader_id.clone();
            frame.lifecycle.clear();
            out.push(TreeEvent::Navigated(frame.view()));
        }
        Ok(removed)
    }

    /// A navigation discards the previous document's subtree.
    fn discard_children(
        &mut self,
        frame_id: &FrameId,
        out: &mut Vec<TreeEvent>,
        removed: &mut Vec<FrameId>,
    ) {
        let children = self
            .frames
            .get(frame_id)
            .map(|frame| frame.children.clone())
            .unwrap_or_default();
        for child in &children {
            self.detach(child, out, removed);
        }
    }

    /// Remove a frame and its descendants, leaves first. Each removed node is
    /// emitted as a `Detached` event and collected into `removed`.
    pub(crate) fn detach(
        &mut self,
        frame_id: &FrameId,
        out: &mut Vec<TreeEvent>,
        removed: &mut Vec<FrameId>,
    ) {
        let children = match self.frames.get(frame_id) {
            Some(frame) => frame.children.clone(),
            None => return,
        };
        for child in &children {
            self.detach(child, out, removed);
        }
        if let Some(frame) = self.frames.remove(frame_id) {
            if self.main_frame.as_ref() == Some(frame_id) {
                self.main_frame = None;
            }
            if let Some(parent_id) = frame.parent_id.as_ref() {
                if let Some(parent) = self.frames.get_mut(parent_id) {
                    parent.children.retain(|child| child != frame_id);
                }
            }
            removed.push(frame_id.clone());
            out.push(TreeEvent::Detached(frame.view()));
        }
    }

    /// Seed the store from a nested snapshot, equivalent to replaying the
    /// incremental attach/navigate stream in order.
    pub(crate) fn bootstrap(
        &mut self,
        snapshot: &FrameTreeSnapshot,
        out: &mut Vec<TreeEvent>,
    ) -> Result<Vec<FrameId>, MirrorError> {
        let mut removed = Vec::new();
        self.seed(snapshot, out, &mut removed)?;
        Ok(removed)
    }

    fn seed(
        &mut self,
        snapshot: &FrameTreeSnapshot,
        out: &mut Vec<TreeEvent>,
        removed: &mut Vec<FrameId>,
    ) -> Result<(), MirrorError> {
        if let Some(parent) = snapshot.frame.parent() {
            self.attach(snapshot.frame.id.clone(), parent.clone(), out);
        }
        removed.extend(self.navigate(&snapshot.frame, out)?);
        for child in &snapshot.children {
            self.seed(child, out, removed)?;
        }
        Ok(())
    }

    /// Record a lifecycle milestone for the frame's current load; returns the
    /// frame snapshot, or `None` when the frame is already gone.
    pub(crate) fn record_lifecycle(
        &mut self,
        frame_id: &FrameId,
        name: &str,
        loader_id: LoaderId,
    ) -> Option<FrameView> {
        let frame = self.frames.get_mut(frame_id)?;
        frame.lifecycle.insert(name.to_string(), loader_id);
        Some(frame.view())
    }

    pub(crate) fn frame_mut(&mut self, frame_id: &FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(frame_id)
    }

    pub fn main_frame(&self) -> Option<FrameView> {
        self.main_frame
            .as_ref()
            .and_then(|id| self.frames.get(id))
            .map(Frame::view)
    }

    pub fn frame(&self, frame_id: &FrameId) -> Option<FrameView> {
        self.frames.get(frame_id).map(Frame::view)
    }

    pub fn contains(&self, frame_id: &FrameId) -> bool {
        self.frames.contains_key(frame_id)
    }

    pub fn frames(&self) -> Vec<FrameView> {
        self.frames.values().map(Frame::view).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Loader that most recently fired the named lifecycle event, used to
    /// detect events from a superseded navigation.
    pub fn lifecycle_loader(&self, frame_id: &FrameId, name: &str) -> Option<LoaderId> {
        self.frames
            .get(frame_id)
            .and_then(|frame| frame.lifecycle.get(name))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TreeEventKind;

    fn root_payload(id: &str) -> FramePayload {
        FramePayload {
            id: FrameId::from(id),
            parent_id: None,
            loader_id: LoaderId::from("L0"),
            url: format!("https://example.com/{id}"),
            name: String::new(),
        }
    }

    fn child_payload(id: &str, parent: &str) -> FramePayload {
        FramePayload {
            parent_id: Some(FrameId::from(parent)),
            ..root_payload(id)
        }
    }

    fn seeded_root(store: &mut FrameTreeStore) {
        let mut out = Vec::new();
        store
            .navigate(&root_payload("A"), &mut out)
            .expect("root navigation");
    }

    #[test]
    fn attach_with_unknown_parent_is_a_noop() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        let mut out = Vec::new();
        store.attach(FrameId::from("B"), FrameId::from("missing"), &mut out);
        assert!(out.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_attach_is_a_noop() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        let mut out = Vec::new();
        store.attach(FrameId::from("B"), FrameId::from("A"), &mut out);
        store.attach(FrameId::from("B"), FrameId::from("A"), &mut out);
        assert_eq!(out.len(), 1);
        let root = store.main_frame().expect("main frame");
        assert_eq!(root.children, vec![FrameId::from("B")]);
    }

    #[test]
    fn exactly_one_frame_has_no_parent() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        let mut out = Vec::new();
        store.attach(FrameId::from("B"), FrameId::from("A"), &mut out);
        store.attach(FrameId::from("C"), FrameId::from("B"), &mut out);
        let roots: Vec<_> = store
            .frames()
            .into_iter()
            .filter(FrameView::is_main)
            .collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, FrameId::from("A"));
    }

    #[test]
    fn detach_removes_subtree_leaves_first() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        let mut out = Vec::new();
        store.attach(FrameId::from("B"), FrameId::from("A"), &mut out);
        store.attach(FrameId::from("C"), FrameId::from("B"), &mut out);
        store.attach(FrameId::from("D"), FrameId::from("C"), &mut out);

        let mut events = Vec::new();
        let mut removed = Vec::new();
        store.detach(&FrameId::from("B"), &mut events, &mut removed);

        assert_eq!(
            removed,
            vec![FrameId::from("D"), FrameId::from("C"), FrameId::from("B")]
        );
        assert!(events
            .iter()
            .all(|event| event.kind() == TreeEventKind::Detached));
        assert_eq!(store.len(), 1);
        let root = store.main_frame().expect("main frame survives");
        assert!(root.children.is_empty(), "no dangling child references");
    }

    #[test]
    fn detach_of_unknown_frame_is_a_noop() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        let mut events = Vec::new();
        let mut removed = Vec::new();
        store.detach(&FrameId::from("nope"), &mut events, &mut removed);
        assert!(events.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn detaching_root_clears_main_frame() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        let mut events = Vec::new();
        let mut removed = Vec::new();
        store.detach(&FrameId::from("A"), &mut events, &mut removed);
        assert!(store.main_frame().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn root_renavigation_preserves_instance_identity() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        let before = store.main_frame().expect("main frame");

        let mut out = Vec::new();
        store
            .navigate(&root_payload("A2"), &mut out)
            .expect("renavigation");

        assert!(store.frame(&FrameId::from("A")).is_none());
        let after = store.main_frame().expect("main frame after renavigation");
        assert_eq!(after.id, FrameId::from("A2"));
        assert_eq!(after.instance, before.instance);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn navigation_discards_previous_children_first() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        let mut out = Vec::new();
        store.attach(FrameId::from("B"), FrameId::from("A"), &mut out);
        store.attach(FrameId::from("C"), FrameId::from("A"), &mut out);

        let mut events = Vec::new();
        store
            .navigate(&root_payload("A"), &mut events)
            .expect("renavigation");

        let kinds: Vec<_> = events.iter().map(TreeEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                TreeEventKind::Detached,
                TreeEventKind::Detached,
                TreeEventKind::Navigated
            ]
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn subframe_navigation_without_attach_is_a_fault() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        let mut out = Vec::new();
        let err = store
            .navigate(&child_payload("B", "A"), &mut out)
            .expect_err("must fault");
        assert_eq!(err.kind, MirrorErrorKind::TreeDesync);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn navigation_clears_lifecycle_record() {
        let mut store = FrameTreeStore::new();
        seeded_root(&mut store);
        store.record_lifecycle(&FrameId::from("A"), "load", LoaderId::from("L0"));
        assert_eq!(
            store.lifecycle_loader(&FrameId::from("A"), "load"),
            Some(LoaderId::from("L0"))
        );

        let mut out = Vec::new();
        let mut payload = root_payload("A");
        payload.loader_id = LoaderId::from("L1");
        store.navigate(&payload, &mut out).expect("renavigation");
        assert!(store.lifecycle_loader(&FrameId::from("A"), "load").is_none());
    }

    #[test]
    fn bootstrap_matches_incremental_replay() {
        let snapshot = FrameTreeSnapshot {
            frame: root_payload("A"),
            children: vec![
                FrameTreeSnapshot {
                    frame: child_payload("B", "A"),
                    children: vec![FrameTreeSnapshot {
                        frame: child_payload("D", "B"),
                        children: Vec::new(),
                    }],
                },
                FrameTreeSnapshot {
                    frame: child_payload("C", "A"),
                    children: Vec::new(),
                },
            ],
        };

        let mut store = FrameTreeStore::new();
        let mut out = Vec::new();
        store.bootstrap(&snapshot, &mut out).expect("bootstrap");

        assert_eq!(store.len(), 4);
        let root = store.main_frame().expect("main frame");
        assert_eq!(root.id, FrameId::from("A"));
        assert_eq!(root.children, vec![FrameId::from("B"), FrameId::from("C")]);
        let b = store.frame(&FrameId::from("B")).expect("frame B");
        assert_eq!(b.parent_id, Some(FrameId::from("A")));
        assert_eq!(b.children, vec![FrameId::from("D")]);
        let d = store.frame(&FrameId::from("D")).expect("frame D");
        assert_eq!(d.parent_id, Some(FrameId::from("B")));
    }
}
