//! # Blocks
//!
//! A server-side component engine for interactive posts. A post is a tree of
//! components; nothing runs between requests, so every request carries the
//! last committed tree and an opaque ledger blob, and gets back a patch plus
//! a new blob.
//!
//! ## Components and hooks
//!
//! Components are plain functions that receive a `Scope` and their `Props`
//! and return an `Element`:
//!
//! ```rust,ignore
//! use blocks_core::prelude::*;
//! use blocks_ui::*;
//!
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
//!
//! - `use_state` / `use_state_with` are order-based: the Nth hook call of an
//!   instance always refers to the Nth ledger slot.
//! - `use_state_async` starts its initializer once, when the slot is created.
//!   The build waits for every started initializer before it completes.
//! - `use_interval` publishes a `{period_ms, running}` descriptor; an
//!   external poller turns it into tick events.
//!
//! ## A request cycle
//!
//! ```rust,ignore
//! let engine = Engine::new(EngineConfig::from_env());
//! let root = Component::new("Counter", Counter);
//! let ctx = RenderContext::new("t3_post");
//!
//! // First render: full tree, fresh ledgers.
//! let first = pollster::block_on(engine.render(&root, &ctx, None, None))?;
//!
//! // A press: replay, run the handler, rebuild, diff.
//! let press = EventRecord::new(first.handlers.first().unwrap().clone(), Value::Null);
//! let next = pollster::block_on(
//!     engine.handle_event(&root, &ctx, &press, &first.tree, &first.ledgers),
//! )?;
//! ```
//!
//! Errors are split by who has to act on them: `EngineError` aborts the cycle
//! and leaves the caller's snapshot authoritative, `DispatchError::StaleTarget`
//! and `DispatchError::HandlerFailed` are per-event and recoverable, and
//! failed async initializers come back in `RenderResult::errors`.

mod builder;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod element;
pub mod encode;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod interval;
pub mod ledger;
pub mod node;
pub mod prelude;
pub mod reconcile;
pub mod registry;
mod resolver;

pub use config::*;
pub use context::*;
pub use dispatch::EventRecord;
pub use element::*;
pub use encode::{Fallback, decode, decode_patch, encode, encode_fallback, encode_patch};
pub use engine::*;
pub use error::*;
pub use hooks::*;
pub use identity::{InstanceId, TreePath};
pub use interval::*;
pub use ledger::{InstanceLedger, LEDGER_VERSION, LedgerStore, Slot, SlotKind, SlotStatus};
pub use node::*;
pub use reconcile::*;
pub use registry::*;
pub use resolver::SlotError;
