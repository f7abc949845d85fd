use thiserror::Error;

use crate::identity::InstanceId;
use crate::ledger::SlotKind;
use crate::node::HandlerRef;

/// A component broke the rules of hooks, or the persisted ledger cannot be
/// read back. Always fatal for the cycle that detects it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("`{instance}` slot {slot}: hook is `{found}` but the ledger recorded `{expected}`")]
    KindMismatch {
        instance: InstanceId,
        slot: usize,
        expected: SlotKind,
        found: SlotKind,
    },
    #[error("`{instance}` called {found} hooks but its ledger holds {expected}")]
    CountMismatch {
        instance: InstanceId,
        expected: usize,
        found: usize,
    },
    #[error("`{instance}` slot {slot}: stored value does not fit the hook's type ({message})")]
    ValueMismatch {
        instance: InstanceId,
        slot: usize,
        message: String,
    },
    #[error("ledger blob is malformed: {0}")]
    Decode(String),
    #[error("ledger blob version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },
}

/// Returned by component functions.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    Failed(String),
}

impl ComponentError {
    pub fn msg(message: impl Into<String>) -> Self {
        ComponentError::Failed(message.into())
    }
}

/// Returned by event handlers. Panics inside a handler are reported the same
/// way.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to encode: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch targets an empty tree")]
    EmptyTree,
    #[error("no node at {path:?}")]
    MissingNode { path: Vec<usize> },
    #[error("index {index} out of bounds under {parent:?} ({len} children)")]
    IndexOutOfBounds {
        parent: Vec<usize>,
        index: usize,
        len: usize,
    },
    #[error("the root node cannot be removed or moved")]
    RootOperation,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("post type `{0}` is registered twice")]
    DuplicatePostType(String),
}

/// Fatal for the current cycle; the previously committed tree and ledgers
/// stay authoritative.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("duplicate key `{key}` among the children of `{parent}`")]
    DuplicateKey { parent: String, key: String },
    #[error("component `{instance}` failed: {message}")]
    Component { instance: InstanceId, message: String },
    #[error("build did not settle after {passes} passes")]
    BuildDidNotSettle { passes: usize },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("unknown post type `{0}`")]
    UnknownPostType(String),
}

impl EngineError {
    pub(crate) fn from_component(instance: &InstanceId, err: ComponentError) -> Self {
        match err {
            ComponentError::Ledger(e) => EngineError::Ledger(e),
            ComponentError::Failed(message) => EngineError::Component {
                instance: instance.clone(),
                message,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The target disappeared since the client last saw the tree. Callers
    /// usually drop the event.
    #[error("`{handler}` is not reachable from the committed tree")]
    StaleTarget { handler: HandlerRef },
    #[error("handler `{handler}` failed: {message}")]
    HandlerFailed { handler: HandlerRef, message: String },
    #[error(transparent)]
    Fatal(#[from] EngineError),
}

impl DispatchError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DispatchError::Fatal(_))
    }
}

impl From<LedgerError> for DispatchError {
    fn from(err: LedgerError) -> Self {
        DispatchError::Fatal(EngineError::Ledger(err))
    }
}
