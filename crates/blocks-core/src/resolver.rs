//! Async state resolver.
//!
//! Initializers started during a pass are collected here and joined together
//! once the pass is over. Completion order does not matter: outcomes are
//! written back in start order, and the builder runs another pass that reads
//! the settled slots synchronously.

use std::cell::RefCell;

use futures_util::future::{LocalBoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::InstanceId;
use crate::ledger::{InstanceKey, LedgerStore};

/// An async initializer that failed. Reported on every render that touches
/// the slot until the component retries it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotError {
    pub instance: InstanceId,
    pub slot: usize,
    pub message: String,
}

pub(crate) struct PendingInit {
    key: InstanceKey,
    slot: usize,
    instance: InstanceId,
    future: LocalBoxFuture<'static, Result<Value, String>>,
}

#[derive(Default)]
pub(crate) struct Resolver {
    pending: Vec<PendingInit>,
}

impl Resolver {
    pub fn start(
        &mut self,
        key: InstanceKey,
        slot: usize,
        instance: InstanceId,
        future: LocalBoxFuture<'static, Result<Value, String>>,
    ) {
        log::debug!("resolver: starting initializer for `{instance}` slot {slot}");
        self.pending.push(PendingInit {
            key,
            slot,
            instance,
            future,
        });
    }

    pub fn take(&mut self) -> Vec<PendingInit> {
        std::mem::take(&mut self.pending)
    }
}

/// Runs every initializer in `batch` concurrently and records the outcomes.
/// Returns how many failed.
pub(crate) async fn settle(batch: Vec<PendingInit>, ledgers: &RefCell<LedgerStore>) -> usize {
    let (targets, futures): (Vec<_>, Vec<_>) = batch
        .into_iter()
        .map(|p| ((p.key, p.slot, p.instance), p.future))
        .unzip();

    let outcomes = join_all(futures).await;

    let mut failed = 0;
    let mut ledgers = ledgers.borrow_mut();
    for ((key, slot, instance), outcome) in targets.into_iter().zip(outcomes) {
        if let Err(message) = &outcome {
            failed += 1;
            log::warn!("resolver: `{instance}` slot {slot} initializer failed: {message}");
        }
        ledgers.settle(key, slot, outcome);
    }
    failed
}
