//! Serialized notification dispatcher and read surface.
//!
//! All mutations of the frame tree and the context registry happen inside one
//! write-lock acquisition per notification, on the single task draining the
//! notice source. Derived events are published after the lock is released, so
//! a slow subscriber can never stall dispatch, and readers on other threads
//! only ever observe the store between whole dispatches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pagemirror_core_types::{ExecutionContextId, FrameId, LoaderId};
use pagemirror_event_bus::Bus;
use parking_lot::RwLock;
use tokio::select;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::contexts::{ContextView, ExecutionContextRegistry};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{MirrorError, MirrorErrorKind};
use crate::events::{FrameTreeSnapshot, Notification, PageNotice, TreeEvent};
use crate::handles::{Handle, HandleFactory, RemoteObject, ValueHandleFactory};
use crate::source::NoticeSource;
use crate::tree::{FrameTreeStore, FrameView};

/// Tuning knobs for one mirror instance.
#[derive(Clone, Debug)]
pub struct MirrorConfig {
    /// Broadcast buffer for derived tree events.
    pub event_buffer: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self { event_buffer: 512 }
    }
}

struct SessionState {
    tree: FrameTreeStore,
    contexts: ExecutionContextRegistry,
}

impl SessionState {
    fn apply(&mut self, notice: PageNotice, out: &mut Vec<TreeEvent>) -> Result<(), MirrorError> {
        match notice {
            PageNotice::FrameAttached {
                frame_id,
                parent_frame_id,
            } => {
                self.tree.attach(frame_id, parent_frame_id, out);
            }
            PageNotice::FrameNavigated { frame } => {
                let rekeyed_from = match frame.parent() {
                    None => self
                        .tree
                        .main_frame()
                        .map(|view| view.id)
                        .filter(|id| *id != frame.id),
                    Some(_) => None,
                };
                let removed = self.tree.navigate(&frame, out)?;
                self.contexts.purge_frames(&removed);
                if let Some(old_id) = rekeyed_from {
                    self.contexts.rebind_frame(&old_id, &frame.id);
                }
            }
            PageNotice::FrameDetached { frame_id } => {
                let mut removed = Vec::new();
                self.tree.detach(&frame_id, out, &mut removed);
                self.contexts.purge_frames(&removed);
            }
            PageNotice::ContextCreated { context } => {
                self.contexts.create(&context, &mut self.tree);
            }
            PageNotice::ContextDestroyed { id } => {
                self.contexts.destroy(id, &mut self.tree);
            }
            PageNotice::ContextsCleared => {
                self.contexts.clear(&mut self.tree);
            }
            PageNotice::Lifecycle {
                frame_id,
                loader_id,
                name,
            } => {
                match self
                    .tree
                    .record_lifecycle(&frame_id, &name, loader_id.clone())
                {
                    Some(frame) => out.push(TreeEvent::Lifecycle {
                        frame,
                        name,
                        loader_id,
                    }),
                    None => {
                        // Expected for frames detached while the event was in flight.
                        debug!(
                            target: "frame-mirror",
                            frame = %frame_id,
                            event = %name,
                            "lifecycle event for unknown frame dropped"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

/// Per-session mirror of the remote frame tree and execution contexts.
pub struct FrameMirror {
    state: RwLock<SessionState>,
    bus: Arc<Bus<TreeEvent>>,
    diagnostics: Arc<dyn DiagnosticSink>,
    factory: Arc<dyn HandleFactory>,
    desynced: AtomicBool,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FrameMirror {
    pub fn new(cfg: MirrorConfig) -> Arc<Self> {
        Self::with_capabilities(cfg, Arc::new(TracingSink), Arc::new(ValueHandleFactory))
    }

    pub fn with_capabilities(
        cfg: MirrorConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
        factory: Arc<dyn HandleFactory>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(SessionState {
                tree: FrameTreeStore::new(),
                contexts: ExecutionContextRegistry::new(),
            }),
            bus: Bus::new(cfg.event_buffer),
            diagnostics,
            factory,
            desynced: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the dispatch loop draining `source`. The loop exits when the
    /// source ends or `shutdown` is called.
    pub async fn start(self: &Arc<Self>, source: Arc<dyn NoticeSource>) {
        let mirror = Arc::clone(self);
        let task = tokio::spawn(async move { mirror.run(source).await });
        self.tasks.lock().await.push(task);
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut tasks = self.tasks.lock().await;
        while let Some(task) = tasks.pop() {
            let _ = task.await;
        }
    }

    async fn run(self: Arc<Self>, source: Arc<dyn NoticeSource>) {
        debug!(target: "frame-mirror", "dispatch loop entered");
        loop {
            select! {
                _ = self.shutdown.cancelled() => break,
                notice = source.next_notice() => match notice {
                    Some(notification) => self.handle_notification(&notification),
                    None => break,
                },
            }
        }
        debug!(target: "frame-mirror", "dispatch loop exiting");
    }

    /// Decode and apply one transport envelope. Serialized by construction
    /// when driven from [`start`]; direct callers must uphold per-session
    /// delivery ordering themselves.
    ///
    /// [`start`]: FrameMirror::start
    pub fn handle_notification(&self, notification: &Notification) {
        if self.is_desynced() {
            self.diagnostics.warning(&format!(
                "dropping {} notification: mirror desynchronized",
                notification.method
            ));
            return;
        }
        match PageNotice::decode(notification) {
            Ok(Some(notice)) => {
                let _ = self.apply(notice);
            }
            Ok(None) => {
                debug!(target: "frame-mirror", method = %notification.method, "unhandled notification");
            }
            Err(err) => {
                self.diagnostics
                    .warning(&format!("failed to decode {}: {err}", notification.method));
            }
        }
    }

    /// Apply one decoded notice. Invariant violations latch the mirror: the
    /// session keeps serving reads, but further incremental updates are
    /// dropped rather than applied to a corrupted model.
    pub fn apply(&self, notice: PageNotice) -> Result<(), MirrorError> {
        if self.is_desynced() {
            return Err(MirrorError::new(MirrorErrorKind::TreeDesync)
                .with_hint("mirror already desynchronized"));
        }
        let mut out = Vec::new();
        let result = self.state.write().apply(notice, &mut out);
        self.publish(out);
        if let Err(err) = &result {
            self.mark_desynced(err);
        }
        result
    }

    /// Seed the store from a one-shot full-tree snapshot. Produces the same
    /// state and events as replaying the equivalent attach/navigate stream.
    pub fn bootstrap(&self, snapshot: &FrameTreeSnapshot) -> Result<(), MirrorError> {
        let mut out = Vec::new();
        let result = {
            let mut state = self.state.write();
            state
                .tree
                .bootstrap(snapshot, &mut out)
                .map(|removed| state.contexts.purge_frames(&removed))
        };
        self.publish(out);
        if let Err(err) = &result {
            self.mark_desynced(err);
        }
        result
    }

    fn publish(&self, events: Vec<TreeEvent>) {
        for event in events {
            self.bus.publish(event);
        }
    }

    fn mark_desynced(&self, err: &MirrorError) {
        self.desynced.store(true, Ordering::SeqCst);
        self.diagnostics
            .warning(&format!("frame mirror desynchronized: {err}"));
    }

    /// True once an invariant violation stopped incremental updates.
    pub fn is_desynced(&self) -> bool {
        self.desynced.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.bus.subscribe()
    }

    pub fn events(&self) -> Arc<Bus<TreeEvent>> {
        Arc::clone(&self.bus)
    }

    pub fn main_frame(&self) -> Option<FrameView> {
        self.state.read().tree.main_frame()
    }

    pub fn frame(&self, frame_id: &FrameId) -> Option<FrameView> {
        self.state.read().tree.frame(frame_id)
    }

    pub fn frames(&self) -> Vec<FrameView> {
        self.state.read().tree.frames()
    }

    pub fn frame_count(&self) -> usize {
        self.state.read().tree.len()
    }

    pub fn lifecycle_loader(&self, frame_id: &FrameId, name: &str) -> Option<LoaderId> {
        self.state.read().tree.lifecycle_loader(frame_id, name)
    }

    pub fn context(&self, id: ExecutionContextId) -> Option<ContextView> {
        self.state.read().contexts.get(&id)
    }

    pub fn context_count(&self) -> usize {
        self.state.read().contexts.len()
    }

    /// Default execution context currently bound to a frame.
    pub fn default_context(&self, frame_id: &FrameId) -> Option<ContextView> {
        let state = self.state.read();
        state
            .tree
            .frame(frame_id)
            .and_then(|frame| frame.default_context)
            .and_then(|id| state.contexts.get(&id))
    }

    /// Route a remote object to the embedder's handle constructors. A missing
    /// context is degraded, not fatal: the handle is built with an empty
    /// binding and a diagnostic is emitted.
    pub fn resolve_handle(&self, context_id: ExecutionContextId, object: RemoteObject) -> Handle {
        let context = self.state.read().contexts.get(&context_id);
        if context.is_none() {
            self.diagnostics.warning(&format!(
                "no execution context {context_id} for remote object; resolving with empty binding"
            ));
        }
        if object.is_node() {
            self.factory.dom_handle(context, object)
        } else {
            self.factory.generic_handle(context, object)
        }
    }
}
