//! Notification decoding and derived output events.
//!
//! Input arrives as `{method, params}` envelopes from the transport. Only the
//! closed set of methods below is mirrored; everything else is reported as
//! unhandled by the dispatcher and skipped.

use pagemirror_core_types::{ExecutionContextId, FrameId, LoaderId};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{MirrorError, MirrorErrorKind};
use crate::tree::FrameView;

/// One protocol notification as delivered by the transport.
#[derive(Clone, Debug)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Navigation payload for one frame.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload {
    pub id: FrameId,
    #[serde(default)]
    pub parent_id: Option<FrameId>,
    #[serde(default)]
    pub loader_id: LoaderId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
}

impl FramePayload {
    /// An absent or empty parent id marks a root navigation.
    pub fn parent(&self) -> Option<&FrameId> {
        self.parent_id.as_ref().filter(|id| !id.is_empty())
    }
}

/// Execution context payload.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPayload {
    pub id: ExecutionContextId,
    #[serde(default)]
    pub frame_id: Option<FrameId>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub aux_data: Value,
}

/// One-shot nested frame-tree snapshot consumed at session start.
#[derive(Clone, Debug, Deserialize)]
pub struct FrameTreeSnapshot {
    pub frame: FramePayload,
    #[serde(default)]
    pub children: Vec<FrameTreeSnapshot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrameAttachedParams {
    frame_id: FrameId,
    #[serde(default)]
    parent_frame_id: FrameId,
}

#[derive(Debug, Deserialize)]
struct FrameNavigatedParams {
    frame: FramePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrameDetachedParams {
    frame_id: FrameId,
}

#[derive(Debug, Deserialize)]
struct ContextCreatedParams {
    context: ContextPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextDestroyedParams {
    execution_context_id: ExecutionContextId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifecycleParams {
    frame_id: FrameId,
    #[serde(default)]
    loader_id: LoaderId,
    name: String,
}

/// Decoded notification ready for dispatch.
#[derive(Clone, Debug)]
pub enum PageNotice {
    FrameAttached {
        frame_id: FrameId,
        parent_frame_id: FrameId,
    },
    FrameNavigated {
        frame: FramePayload,
    },
    FrameDetached {
        frame_id: FrameId,
    },
    ContextCreated {
        context: ContextPayload,
    },
    ContextDestroyed {
        id: ExecutionContextId,
    },
    ContextsCleared,
    Lifecycle {
        frame_id: FrameId,
        loader_id: LoaderId,
        name: String,
    },
}

impl PageNotice {
    /// Decode a transport envelope; `Ok(None)` for methods outside the
    /// mirrored set.
    pub fn decode(notification: &Notification) -> Result<Option<Self>, MirrorError> {
        let notice = match notification.method.as_str() {
            "Page.frameAttached" => {
                let params: FrameAttachedParams = parse(&notification.params)?;
                PageNotice::FrameAttached {
                    frame_id: params.frame_id,
                    parent_frame_id: params.parent_frame_id,
                }
            }
            "Page.frameNavigated" => {
                let params: FrameNavigatedParams = parse(&notification.params)?;
                PageNotice::FrameNavigated {
                    frame: params.frame,
                }
            }
            "Page.frameDetached" => {
                let params: FrameDetachedParams = parse(&notification.params)?;
                PageNotice::FrameDetached {
                    frame_id: params.frame_id,
                }
            }
            "Runtime.executionContextCreated" => {
                let params: ContextCreatedParams = parse(&notification.params)?;
                PageNotice::ContextCreated {
                    context: params.context,
                }
            }
            "Runtime.executionContextDestroyed" => {
                let params: ContextDestroyedParams = parse(&notification.params)?;
                PageNotice::ContextDestroyed {
                    id: params.execution_context_id,
                }
            }
            "Runtime.executionContextsCleared" => PageNotice::ContextsCleared,
            "Page.lifecycleEvent" => {
                let params: LifecycleParams = parse(&notification.params)?;
                PageNotice::Lifecycle {
                    frame_id: params.frame_id,
                    loader_id: params.loader_id,
                    name: params.name,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(notice))
    }
}

fn parse<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T, MirrorError> {
    serde_json::from_value(params.clone())
        .map_err(|err| MirrorError::new(MirrorErrorKind::Decode).with_hint(err.to_string()))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TreeEventKind {
    Attached,
    Detached,
    Navigated,
    Lifecycle,
}

/// Derived lifecycle event republished to subscribers, carrying a snapshot of
/// the affected frame.
#[derive(Clone, Debug)]
pub enum TreeEvent {
    Attached(FrameView),
    Detached(FrameView),
    Navigated(FrameView),
    Lifecycle {
        frame: FrameView,
        name: String,
        loader_id: LoaderId,
    },
}

impl TreeEvent {
    pub fn kind(&self) -> TreeEventKind {
        match self {
            TreeEvent::Attached(_) => TreeEventKind::Attached,
            TreeEvent::Detached(_) => TreeEventKind::Detached,
            TreeEvent::Navigated(_) => TreeEventKind::Navigated,
            TreeEvent::Lifecycle { .. } => TreeEventKind::Lifecycle,
        }
    }

    pub fn frame(&self) -> &FrameView {
        match self {
            TreeEvent::Attached(frame)
            | TreeEvent::Detached(frame)
            | TreeEvent::Navigated(frame) => frame,
            TreeEvent::Lifecycle { frame, .. } => frame,
        }
    }
}
