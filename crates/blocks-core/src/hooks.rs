//! # Hooks
//!
//! Every component receives a `Scope` bound to its instance identity. Hook
//! calls consume the instance's ledger slots in call order, exactly like
//! `remember` does for a composition: the Nth hook call always refers to the
//! Nth slot. Calling hooks conditionally, or a different number of times, is
//! detected and aborts the cycle.
//!
//! ```rust,ignore
//! fn Counter(cx: &Scope, _props: &Props) -> ComponentResult {
//!     let count = cx.use_state(0i64)?;
//!     let on_press = {
//!         let count = count.clone();
//!         move || count.update(|c| *c += 1)
//!     };
//!     Ok(Some(VStack(vec![
//!         Text(format!("Count: {}", count.get())),
//!         Button("Increment", on_press),
//!     ])))
//! }
//! ```

use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::future::Future;
use std::rc::Rc;

use futures_util::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::builder::{IntervalSite, PassState};
use crate::context::RenderContext;
use crate::element::Handler;
use crate::error::LedgerError;
use crate::identity::{InstanceId, TreePath};
use crate::ledger::{InstanceKey, LedgerStore, Slot, SlotKind, SlotStatus};
use crate::node::HandlerRef;
use crate::resolver::SlotError;

/// Hook cursor for one component instance during one build pass.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    instance: InstanceId,
    key: InstanceKey,
    path: TreePath,
    cursor: Cell<usize>,
    /// Slot count recorded by earlier renders; zero for a new instance.
    prior_len: usize,
    pass: Rc<PassState>,
}

impl Scope {
    pub(crate) fn enter(pass: Rc<PassState>, path: TreePath) -> Self {
        let instance = path.instance_id();
        let (key, prior_len) = {
            let mut ledgers = pass.ledgers.borrow_mut();
            let key = ledgers.entry(&instance);
            (key, ledgers.slot_count(key))
        };
        pass.visited.borrow_mut().insert(key);
        Scope {
            inner: Rc::new(ScopeInner {
                instance,
                key,
                path,
                cursor: Cell::new(0),
                prior_len,
                pass,
            }),
        }
    }

    /// Checks the total hook count once the component has returned.
    pub(crate) fn finish(&self) -> Result<(), LedgerError> {
        let used = self.inner.cursor.get();
        let prior = self.inner.prior_len;
        if prior > 0 && used != prior {
            return Err(LedgerError::CountMismatch {
                instance: self.inner.instance.clone(),
                expected: prior,
                found: used,
            });
        }
        Ok(())
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.inner.instance
    }

    pub(crate) fn path(&self) -> &TreePath {
        &self.inner.path
    }

    pub fn context(&self) -> &RenderContext {
        &self.inner.pass.context
    }

    pub fn service<T: 'static>(&self) -> Option<Rc<T>> {
        self.inner.pass.context.service::<T>()
    }

    /// Claims the next slot. `true` means the slot does not exist yet and
    /// the caller must push it.
    fn next_slot(&self, kind: SlotKind) -> Result<(usize, bool), LedgerError> {
        let index = self.inner.cursor.get();
        self.inner.cursor.set(index + 1);

        let ledgers = self.inner.pass.ledgers.borrow();
        match ledgers.slot(self.inner.key, index) {
            Some(slot) if slot.kind() == kind => Ok((index, false)),
            Some(slot) => Err(LedgerError::KindMismatch {
                instance: self.inner.instance.clone(),
                slot: index,
                expected: slot.kind(),
                found: kind,
            }),
            None if self.inner.prior_len > 0 => Err(LedgerError::CountMismatch {
                instance: self.inner.instance.clone(),
                expected: self.inner.prior_len,
                found: index + 1,
            }),
            None => Ok((index, true)),
        }
    }

    fn push_slot(&self, slot: Slot) {
        self.inner
            .pass
            .ledgers
            .borrow_mut()
            .push(self.inner.key, slot);
    }

    fn handle(&self, index: usize) -> SlotHandle {
        SlotHandle {
            ledgers: self.inner.pass.ledgers.clone(),
            key: self.inner.key,
            index,
            instance: self.inner.instance.clone(),
        }
    }

    fn decode<T: DeserializeOwned>(&self, index: usize, value: Value) -> Result<T, LedgerError> {
        serde_json::from_value(value).map_err(|e| LedgerError::ValueMismatch {
            instance: self.inner.instance.clone(),
            slot: index,
            message: e.to_string(),
        })
    }

    fn encode<T: Serialize>(&self, index: usize, value: &T) -> Result<Value, LedgerError> {
        serde_json::to_value(value).map_err(|e| LedgerError::ValueMismatch {
            instance: self.inner.instance.clone(),
            slot: index,
            message: e.to_string(),
        })
    }

    pub fn use_state<T>(&self, initial: T) -> Result<State<T>, LedgerError>
    where
        T: Serialize + DeserializeOwned + Clone + 'static,
    {
        self.use_state_with(move || initial)
    }

    /// `init` runs only when the slot is created.
    pub fn use_state_with<T>(&self, init: impl FnOnce() -> T) -> Result<State<T>, LedgerError>
    where
        T: Serialize + DeserializeOwned + Clone + 'static,
    {
        let (index, fresh) = self.next_slot(SlotKind::State)?;
        let value = if fresh {
            let value = init();
            let stored = self.encode(index, &value)?;
            self.push_slot(Slot::state(stored));
            value
        } else {
            let stored = self
                .inner
                .pass
                .ledgers
                .borrow()
                .slot(self.inner.key, index)
                .and_then(Slot::value)
                .cloned()
                .unwrap_or_default();
            self.decode(index, stored)?
        };
        Ok(State {
            cell: Rc::new(RefCell::new(value)),
            slot: self.handle(index),
        })
    }

    /// State whose initial value comes from async work. The initializer
    /// starts when the slot is created and is joined before the build
    /// completes; once it has resolved or failed it is never re-run unless
    /// `AsyncState::retry` is called.
    pub fn use_state_async<T, E, F, Fut>(&self, init: F) -> Result<AsyncState<T>, LedgerError>
    where
        T: Serialize + DeserializeOwned + Clone + 'static,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        let (index, fresh) = self.next_slot(SlotKind::State)?;
        if fresh {
            self.push_slot(Slot::pending());
        }

        let (stored, status, error) = match self
            .inner
            .pass
            .ledgers
            .borrow()
            .slot(self.inner.key, index)
        {
            Some(Slot::State {
                value,
                status,
                error,
            }) => (value.clone(), *status, error.clone()),
            _ => (Value::Null, SlotStatus::Pending, None),
        };

        let value = match status {
            SlotStatus::Resolved => Some(self.decode::<T>(index, stored)?),
            SlotStatus::Pending => {
                let fut = init();
                let started = async move {
                    match fut.await {
                        Ok(v) => serde_json::to_value(v).map_err(|e| e.to_string()),
                        Err(e) => Err(e.to_string()),
                    }
                };
                self.inner.pass.resolver.borrow_mut().start(
                    self.inner.key,
                    index,
                    self.inner.instance.clone(),
                    started.boxed_local(),
                );
                None
            }
            SlotStatus::Failed => {
                self.inner.pass.errors.borrow_mut().push(SlotError {
                    instance: self.inner.instance.clone(),
                    slot: index,
                    message: error.clone().unwrap_or_default(),
                });
                None
            }
        };

        Ok(AsyncState {
            status: Cell::new(status),
            value: Rc::new(RefCell::new(value)),
            error,
            slot: self.handle(index),
        })
    }

    /// Registers a recurring callback. The engine never runs a timer: the
    /// slot's `{period_ms, running}` descriptor is published with each
    /// render, and the external poller dispatches interval events while it
    /// is running. New intervals start stopped.
    pub fn use_interval<F>(&self, period_ms: u64, callback: F) -> Result<IntervalController, LedgerError>
    where
        F: Fn() + 'static,
    {
        self.use_interval_with(period_ms, Handler::new(move |_| callback()))
    }

    pub fn use_interval_with(
        &self,
        period_ms: u64,
        handler: Handler,
    ) -> Result<IntervalController, LedgerError> {
        let min = self.inner.pass.config.min_interval_ms;
        let period = if period_ms < min {
            log::warn!(
                "use_interval: `{}` asked for {period_ms}ms; clamping to {min}ms",
                self.inner.instance
            );
            min
        } else {
            period_ms
        };

        let (index, fresh) = self.next_slot(SlotKind::Interval)?;
        if fresh {
            self.push_slot(Slot::interval(period));
        } else if let Some(Slot::Interval { period_ms, .. }) = self
            .inner
            .pass
            .ledgers
            .borrow_mut()
            .slot_mut(self.inner.key, index)
        {
            *period_ms = period;
        }

        let handler_ref = HandlerRef::interval(&self.inner.instance, index);
        self.inner
            .pass
            .handlers
            .borrow_mut()
            .insert(handler_ref.clone(), handler);
        self.inner.pass.intervals.borrow_mut().push(IntervalSite {
            key: self.inner.key,
            slot: index,
            instance: self.inner.instance.clone(),
            handler: handler_ref.clone(),
        });

        Ok(IntervalController {
            slot: self.handle(index),
            handler: handler_ref,
        })
    }
}

/// Location of one slot in the cycle's working ledgers.
#[derive(Clone)]
struct SlotHandle {
    ledgers: Rc<RefCell<LedgerStore>>,
    key: InstanceKey,
    index: usize,
    instance: InstanceId,
}

impl SlotHandle {
    fn with_slot<R>(&self, f: impl FnOnce(&mut Slot) -> R) -> Option<R> {
        let mut ledgers = self.ledgers.borrow_mut();
        ledgers.slot_mut(self.key, self.index).map(f)
    }

    fn write_state(&self, value: Value, status: SlotStatus) {
        let written = self.with_slot(|slot| {
            *slot = Slot::State {
                value,
                status,
                error: None,
            }
        });
        if written.is_none() {
            log::warn!("`{}` slot {} is gone; write dropped", self.instance, self.index);
        }
    }
}

/// Handle to a state slot. Setters write straight into the cycle's ledgers;
/// the new value shows up in the build that follows the handler.
pub struct State<T> {
    cell: Rc<RefCell<T>>,
    slot: SlotHandle,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            slot: self.slot.clone(),
        }
    }
}

impl<T: Serialize + Clone> State<T> {
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }

    pub fn set(&self, value: T) {
        match serde_json::to_value(&value) {
            Ok(stored) => self.slot.write_state(stored, SlotStatus::Resolved),
            Err(e) => log::error!(
                "`{}` slot {}: value does not serialize: {e}",
                self.slot.instance,
                self.slot.index
            ),
        }
        *self.cell.borrow_mut() = value;
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }
}

/// Handle to a state slot fed by an async initializer.
pub struct AsyncState<T> {
    status: Cell<SlotStatus>,
    value: Rc<RefCell<Option<T>>>,
    error: Option<String>,
    slot: SlotHandle,
}

impl<T> Clone for AsyncState<T> {
    fn clone(&self) -> Self {
        Self {
            status: Cell::new(self.status.get()),
            value: self.value.clone(),
            error: self.error.clone(),
            slot: self.slot.clone(),
        }
    }
}

impl<T: Serialize + Clone> AsyncState<T> {
    pub fn status(&self) -> SlotStatus {
        self.status.get()
    }

    pub fn is_loading(&self) -> bool {
        self.status.get() == SlotStatus::Pending
    }

    pub fn value(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set(&self, value: T) {
        match serde_json::to_value(&value) {
            Ok(stored) => self.slot.write_state(stored, SlotStatus::Resolved),
            Err(e) => {
                log::error!(
                    "`{}` slot {}: value does not serialize: {e}",
                    self.slot.instance,
                    self.slot.index
                );
                return;
            }
        }
        self.status.set(SlotStatus::Resolved);
        *self.value.borrow_mut() = Some(value);
    }

    /// Forgets the outcome so the next build runs the initializer again.
    pub fn retry(&self) {
        self.slot.write_state(Value::Null, SlotStatus::Pending);
        self.status.set(SlotStatus::Pending);
        *self.value.borrow_mut() = None;
    }
}

/// Start/stop control for an interval slot. Changes take effect on the
/// poller's next decision, not immediately.
#[derive(Clone)]
pub struct IntervalController {
    slot: SlotHandle,
    handler: HandlerRef,
}

impl IntervalController {
    pub fn start(&self) {
        self.set_running(true);
    }

    pub fn stop(&self) {
        self.set_running(false);
    }

    fn set_running(&self, on: bool) {
        self.slot.with_slot(|slot| {
            if let Slot::Interval { running, .. } = slot {
                *running = on;
            }
        });
    }

    pub fn is_running(&self) -> bool {
        self.slot
            .with_slot(|slot| matches!(slot, Slot::Interval { running: true, .. }))
            .unwrap_or(false)
    }

    pub fn period_ms(&self) -> Option<u64> {
        self.slot
            .with_slot(|slot| match slot {
                Slot::Interval { period_ms, .. } => Some(*period_ms),
                Slot::State { .. } => None,
            })
            .flatten()
    }

    pub fn handler_ref(&self) -> &HandlerRef {
        &self.handler
    }
}
