//! Engine facade: one call per request.
//!
//! Every cycle starts from the caller's committed snapshot (tree and ledger
//! blob) and ends with a complete new snapshot. Nothing is written anywhere
//! else, so a failed or abandoned cycle can be retried from the same input.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::builder::{Build, TreeBuilder};
use crate::config::EngineConfig;
use crate::context::RenderContext;
use crate::dispatch::{self, Dispatched, EventRecord};
use crate::element::Component;
use crate::encode::{self, Fallback};
use crate::error::{DispatchError, EngineError};
use crate::interval::IntervalDescriptor;
use crate::ledger::LedgerStore;
use crate::node::{HandlerRef, Node};
use crate::reconcile::{Patch, diff};
use crate::registry::{PostRegistry, PostType};
use crate::resolver::SlotError;

/// What the transport sends to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Update {
    /// No prior tree was supplied.
    Full(Node),
    Patch(Patch),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub passes: usize,
    pub build_ms: f32,
    pub nodes: usize,
}

#[derive(Clone, Debug)]
pub struct RenderResult {
    pub update: Update,
    /// The full committed tree, for the caller to persist and hand back.
    pub tree: Node,
    /// `tree` in wire form.
    pub encoded: Vec<u8>,
    pub ledgers: Vec<u8>,
    pub intervals: Vec<IntervalDescriptor>,
    /// Every handler reference that can receive an event next cycle.
    pub handlers: BTreeSet<HandlerRef>,
    /// Async initializers that failed. Recoverable.
    pub errors: Vec<SlotError>,
    pub metrics: CycleMetrics,
}

impl RenderResult {
    pub fn patch(&self) -> Option<&Patch> {
        match &self.update {
            Update::Patch(p) => Some(p),
            Update::Full(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    registry: Rc<PostRegistry>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: Rc::default(),
        }
    }

    pub fn with_registry(mut self, registry: PostRegistry) -> Self {
        self.registry = Rc::new(registry);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &PostRegistry {
        &self.registry
    }

    /// Builds `root` from `prior_ledgers` (`None` for a new post). With a
    /// `prior_tree` the update is a patch against it, otherwise the full tree.
    pub async fn render(
        &self,
        root: &Component,
        ctx: &RenderContext,
        prior_ledgers: Option<&[u8]>,
        prior_tree: Option<&Node>,
    ) -> Result<RenderResult, EngineError> {
        let started = Instant::now();
        let ledgers = LedgerStore::decode(prior_ledgers.unwrap_or_default())?;
        let ledgers = Rc::new(RefCell::new(ledgers));

        let build = TreeBuilder::new(root, Rc::new(ctx.clone()), &self.config, ledgers.clone())
            .build()
            .await?;
        let ledgers = ledgers.take();
        let result = commit(build, &ledgers, prior_tree, started)?;
        log::info!(
            "render `{}`: {} nodes, {} pass(es), {:.2}ms",
            root.name(),
            result.metrics.nodes,
            result.metrics.passes,
            result.metrics.build_ms
        );
        Ok(result)
    }

    /// Runs `event` against the committed snapshot and returns the patch
    /// from `prior_tree` to the new tree.
    pub async fn handle_event(
        &self,
        root: &Component,
        ctx: &RenderContext,
        event: &EventRecord,
        prior_tree: &Node,
        prior_ledgers: &[u8],
    ) -> Result<RenderResult, DispatchError> {
        let started = Instant::now();
        let Dispatched { build, ledgers } = dispatch::dispatch(
            root,
            Rc::new(ctx.clone()),
            &self.config,
            event,
            prior_tree,
            prior_ledgers,
        )
        .await?;
        let result = commit(build, &ledgers, Some(prior_tree), started)?;
        log::info!(
            "event `{}`: {} op(s), {:.2}ms",
            event.handler,
            result.patch().map_or(0, Patch::len),
            result.metrics.build_ms
        );
        Ok(result)
    }

    pub async fn render_post(
        &self,
        post_type: &str,
        ctx: &RenderContext,
        prior_ledgers: Option<&[u8]>,
        prior_tree: Option<&Node>,
    ) -> Result<RenderResult, EngineError> {
        let post = self.post_type(post_type)?;
        self.render(&post.root, ctx, prior_ledgers, prior_tree).await
    }

    pub async fn handle_post_event(
        &self,
        post_type: &str,
        ctx: &RenderContext,
        event: &EventRecord,
        prior_tree: &Node,
        prior_ledgers: &[u8],
    ) -> Result<RenderResult, DispatchError> {
        let post = self.post_type(post_type)?;
        self.handle_event(&post.root, ctx, event, prior_tree, prior_ledgers)
            .await
    }

    pub fn encode_fallback(&self, tree: &Node) -> Fallback {
        encode::encode_fallback(tree)
    }

    fn post_type(&self, name: &str) -> Result<Rc<PostType>, EngineError> {
        self.registry
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPostType(name.to_string()))
    }
}

/// Turns a settled build into the snapshot handed back to the caller.
fn commit(
    build: Build,
    ledgers: &LedgerStore,
    prior_tree: Option<&Node>,
    started: Instant,
) -> Result<RenderResult, EngineError> {
    let Build {
        tree,
        intervals,
        errors,
        passes,
        ..
    } = build;

    let blob = ledgers.encode()?;
    let encoded = encode::encode(&tree)?;

    let update = match prior_tree {
        Some(prior) => Update::Patch(diff(prior, &tree)),
        None => Update::Full(tree.clone()),
    };

    let mut handlers = tree.handlers();
    handlers.extend(
        intervals
            .iter()
            .filter(|i| i.running)
            .map(|i| i.handler.clone()),
    );

    for e in &errors {
        log::warn!("`{}` slot {} failed to initialize: {}", e.instance, e.slot, e.message);
    }

    let nodes = tree.count();
    Ok(RenderResult {
        update,
        tree,
        encoded,
        ledgers: blob,
        intervals,
        handlers,
        errors,
        metrics: CycleMetrics {
            passes,
            build_ms: started.elapsed().as_secs_f32() * 1000.0,
            nodes,
        },
    })
}
