pub use crate::config::EngineConfig;
pub use crate::context::RenderContext;
pub use crate::dispatch::EventRecord;
pub use crate::element::{
    Component, ComponentResult, Element, ElementType, Handler, HandlerResult, Prop, Props,
};
pub use crate::engine::{CycleMetrics, Engine, RenderResult, Update};
pub use crate::error::{ComponentError, DispatchError, EngineError, HandlerError, LedgerError};
pub use crate::hooks::{AsyncState, IntervalController, Scope, State};
pub use crate::interval::{IntervalDescriptor, due_ticks};
pub use crate::ledger::SlotStatus;
pub use crate::node::{HandlerRef, Node};
pub use crate::reconcile::{Patch, PatchOp};
pub use crate::registry::{PostHeight, PostRegistry, PostType};
pub use crate::resolver::SlotError;
pub use serde_json::{Value, json};
