use std::fmt;

use thiserror::Error;

/// High-level error categories surfaced by the mirror.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum MirrorErrorKind {
    /// The in-memory model no longer matches the remote session's true state.
    #[error("frame tree desynchronized")]
    TreeDesync,
    #[error("malformed notification payload")]
    Decode,
}

/// Error with a machine-readable kind and an optional human hint.
#[derive(Clone, Debug)]
pub struct MirrorError {
    pub kind: MirrorErrorKind,
    pub hint: Option<String>,
}

impl MirrorError {
    pub fn new(kind: MirrorErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for MirrorError {}
