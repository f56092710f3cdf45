//! Live mirror of a remote page's document-frame hierarchy and per-frame
//! JavaScript execution contexts.
//!
//! One [`FrameMirror`] tracks one debugging session. It consumes the ordered
//! notification stream from the transport (via a [`NoticeSource`]), keeps the
//! frame tree and execution-context registry consistent through attaches,
//! navigations and detaches, and republishes derived [`TreeEvent`]s to
//! subscribers. Consumers build their own waiting and timeout logic on top of
//! those events; the mirror itself never polls, retries, or times out.

pub mod contexts;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod handles;
pub mod mirror;
pub mod source;
pub mod tree;

pub use contexts::{ContextView, ExecutionContextRegistry};
pub use diagnostics::{DiagnosticSink, NoopSink, TracingSink};
pub use error::{MirrorError, MirrorErrorKind};
pub use events::{
    ContextPayload, FramePayload, FrameTreeSnapshot, Notification, PageNotice, TreeEvent,
    TreeEventKind,
};
pub use handles::{DomHandle, GenericHandle, Handle, HandleFactory, RemoteObject, ValueHandleFactory};
pub use mirror::{FrameMirror, MirrorConfig};
pub use source::{NoticeSource, QueueSource};
pub use tree::{FrameTreeStore, FrameView};

pub use pagemirror_core_types::{ExecutionContextId, FrameId, FrameInstanceId, LoaderId};
