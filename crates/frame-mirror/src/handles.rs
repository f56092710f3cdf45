//! Handle resolution boundary.
//!
//! The mirror never builds real DOM or object handles; it only routes a
//! resolved context plus the raw remote-object descriptor to the embedder's
//! constructors. The `subtype` discriminant is inspected here and nowhere
//! else.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contexts::ContextView;

/// Remote-object descriptor as delivered by the protocol.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type", default)]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl RemoteObject {
    pub fn is_node(&self) -> bool {
        self.subtype.as_deref() == Some("node")
    }
}

/// Opaque value produced by an embedder's handle constructors.
pub struct Handle(Box<dyn Any + Send + Sync>);

impl Handle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn downcast<T: Any>(self) -> Result<Box<T>, Handle> {
        self.0.downcast().map_err(Handle)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handle(..)")
    }
}

/// Capability constructing handles for resolved remote objects.
pub trait HandleFactory: Send + Sync {
    fn dom_handle(&self, context: Option<ContextView>, object: RemoteObject) -> Handle;
    fn generic_handle(&self, context: Option<ContextView>, object: RemoteObject) -> Handle;
}

/// A DOM-bound handle produced by the default factory.
#[derive(Debug)]
pub struct DomHandle {
    pub context: Option<ContextView>,
    pub object: RemoteObject,
}

/// A generic remote-object handle produced by the default factory.
#[derive(Debug)]
pub struct GenericHandle {
    pub context: Option<ContextView>,
    pub object: RemoteObject,
}

/// Default factory wrapping the raw descriptor. Embedders with real handle
/// types supply their own implementation.
pub struct ValueHandleFactory;

impl HandleFactory for ValueHandleFactory {
    fn dom_handle(&self, context: Option<ContextView>, object: RemoteObject) -> Handle {
        Handle::new(DomHandle { context, object })
    }

    fn generic_handle(&self, context: Option<ContextView>, object: RemoteObject) -> Handle {
        Handle::new(GenericHandle { context, object })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_subtype_is_detected() {
        let object: RemoteObject = serde_json::from_value(json!({
            "type": "object",
            "subtype": "node",
            "objectId": "obj-1"
        }))
        .expect("descriptor");
        assert!(object.is_node());
    }

    #[test]
    fn missing_subtype_is_generic() {
        let object: RemoteObject =
            serde_json::from_value(json!({ "type": "string", "value": "hi" })).expect("descriptor");
        assert!(!object.is_node());
    }

    #[test]
    fn handle_downcast_round_trip() {
        let handle = Handle::new(GenericHandle {
            context: None,
            object: RemoteObject::default(),
        });
        assert!(handle.downcast_ref::<GenericHandle>().is_some());
        assert!(handle.downcast_ref::<DomHandle>().is_none());
    }
}
