//! Event dispatch by state replay.
//!
//! Nothing survives between requests except the committed tree and the
//! ledger blob, so a handler closure has to be recreated before it can run:
//! the dispatcher replays a build against a working copy of the ledgers,
//! looks the handler up by reference, runs it to completion, and builds once
//! more with whatever the handler wrote. The prior blob is only ever read.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::builder::{Build, TreeBuilder};
use crate::config::EngineConfig;
use crate::context::RenderContext;
use crate::element::Component;
use crate::error::DispatchError;
use crate::ledger::{LedgerStore, Slot};
use crate::node::{HandlerRef, Node};

/// Inbound event: which handler to run and what to pass it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub handler: HandlerRef,
    #[serde(default)]
    pub payload: Value,
}

impl EventRecord {
    pub fn new(handler: impl Into<HandlerRef>, payload: Value) -> Self {
        Self {
            handler: handler.into(),
            payload,
        }
    }
}

/// Result of a dispatch that ran its handler and rebuilt: the new build
/// and the working ledgers it was built against.
pub(crate) struct Dispatched {
    pub build: Build,
    pub ledgers: LedgerStore,
}

pub(crate) async fn dispatch(
    root: &Component,
    context: Rc<RenderContext>,
    config: &EngineConfig,
    event: &EventRecord,
    prior_tree: &Node,
    prior_ledgers: &[u8],
) -> Result<Dispatched, DispatchError> {
    let handler_ref = &event.handler;
    let working = LedgerStore::decode(prior_ledgers)?;
    ensure_reachable(handler_ref, prior_tree, &working)?;

    let ledgers = Rc::new(RefCell::new(working));
    let builder = TreeBuilder::new(root, context, config, ledgers.clone());

    log::debug!("dispatch: replaying build for `{handler_ref}`");
    let replay = builder.build().await?;
    let Some(handler) = replay.handlers.get(handler_ref).cloned() else {
        log::warn!("dispatch: `{handler_ref}` was not recreated by the replay build");
        return Err(DispatchError::StaleTarget {
            handler: handler_ref.clone(),
        });
    };
    drop(replay);

    let invoked = match catch_unwind(AssertUnwindSafe(|| handler.call(event.payload.clone()))) {
        Ok(fut) => AssertUnwindSafe(fut)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panic_message(panic).into())),
        Err(panic) => Err(panic_message(panic).into()),
    };
    if let Err(e) = invoked {
        log::error!("dispatch: handler `{handler_ref}` failed: {e}");
        return Err(DispatchError::HandlerFailed {
            handler: handler_ref.clone(),
            message: e.message().to_string(),
        });
    }

    log::debug!("dispatch: `{handler_ref}` done; rebuilding");
    let build = builder.build().await?;
    let ledgers = ledgers.take();
    Ok(Dispatched { build, ledgers })
}

/// A handler is reachable when the prior tree references it, or, for an
/// interval, when its slot exists and is running.
fn ensure_reachable(
    handler: &HandlerRef,
    prior_tree: &Node,
    ledgers: &LedgerStore,
) -> Result<(), DispatchError> {
    let reachable = match handler.as_interval() {
        Some((instance, slot)) => matches!(
            ledgers.get(&instance).and_then(|l| l.slots().get(slot)),
            Some(Slot::Interval { running: true, .. })
        ),
        None => prior_tree.find_handler(handler).is_some(),
    };
    if reachable {
        Ok(())
    } else {
        log::warn!("dispatch: `{handler}` is stale; event dropped");
        Err(DispatchError::StaleTarget {
            handler: handler.clone(),
        })
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(s) => format!("panicked: {s}"),
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(s) => format!("panicked: {s}"),
            Err(_) => "panicked".to_string(),
        },
    }
}
