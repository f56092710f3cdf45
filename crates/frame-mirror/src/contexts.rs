//! Execution context registry and the default-context binding on frames.

use std::collections::HashMap;

use pagemirror_core_types::{ExecutionContextId, FrameId};
use serde_json::Value;

use crate::events::ContextPayload;
use crate::tree::FrameTreeStore;

/// A JavaScript realm descriptor, optionally bound to one frame.
#[derive(Clone, Debug)]
pub(crate) struct ExecutionContext {
    pub id: ExecutionContextId,
    pub frame_id: Option<FrameId>,
    pub is_default: bool,
    pub aux_data: Value,
}

impl ExecutionContext {
    pub(crate) fn view(&self) -> ContextView {
        ContextView {
            id: self.id,
            frame_id: self.frame_id.clone(),
            is_default: self.is_default,
            aux_data: self.aux_data.clone(),
        }
    }
}

/// Snapshot of one execution context.
#[derive(Clone, Debug)]
pub struct ContextView {
    pub id: ExecutionContextId,
    pub frame_id: Option<FrameId>,
    pub is_default: bool,
    pub aux_data: Value,
}

/// Owning table of live execution contexts, keyed by session-unique id.
#[derive(Default)]
pub struct ExecutionContextRegistry {
    contexts: HashMap<ExecutionContextId, ExecutionContext>,
}

impl ExecutionContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a context and bind it as its frame's default when applicable.
    /// Ids are session-unique; a duplicate id overwrites the stale entry.
    pub(crate) fn create(&mut self, payload: &ContextPayload, tree: &mut FrameTreeStore) {
        let context = ExecutionContext {
            id: payload.id,
            frame_id: payload.frame_id.clone().filter(|id| !id.is_empty()),
            is_default: payload.is_default,
            aux_data: payload.aux_data.clone(),
        };
        if context.is_default {
            if let Some(frame_id) = context.frame_id.as_ref() {
                if let Some(frame) = tree.frame_mut(frame_id) {
                    frame.default_context = Some(context.id);
                }
            }
        }
        self.contexts.insert(context.id, context);
    }

    /// Remove a context; unknown ids are a benign race.
    pub(crate) fn destroy(&mut self, id: ExecutionContextId, tree: &mut FrameTreeStore) {
        if let Some(context) = self.contexts.remove(&id) {
            Self::unbind(&context, tree);
        }
    }

    /// Remove every context and clear each affected frame's default binding.
    /// Idempotent on an empty registry.
    pub(crate) fn clear(&mut self, tree: &mut FrameTreeStore) {
        for (_, context) in self.contexts.drain() {
            Self::unbind(&context, tree);
        }
    }

    /// Repoint contexts at a root frame that navigation rekeyed. The frame
    /// object survives the rekey, so its contexts must follow the new id.
    pub(crate) fn rebind_frame(&mut self, old: &FrameId, new: &FrameId) {
        for context in self.contexts.values_mut() {
            if context.frame_id.as_ref() == Some(old) {
                context.frame_id = Some(new.clone());
            }
        }
    }

    /// Drop contexts bound to frames that were just removed from the tree.
    pub(crate) fn purge_frames(&mut self, removed: &[FrameId]) {
        if removed.is_empty() {
            return;
        }
        self.contexts.retain(|_, context| {
            context
                .frame_id
                .as_ref()
                .map(|frame_id| !removed.contains(frame_id))
                .unwrap_or(true)
        });
    }

    fn unbind(context: &ExecutionContext, tree: &mut FrameTreeStore) {
        if let Some(frame_id) = context.frame_id.as_ref() {
            if let Some(frame) = tree.frame_mut(frame_id) {
                if frame.default_context == Some(context.id) {
                    frame.default_context = None;
                }
            }
        }
    }

    pub fn get(&self, id: &ExecutionContextId) -> Option<ContextView> {
        self.contexts.get(id).map(ExecutionContext::view)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
