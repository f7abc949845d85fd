//! Component tree builder.
//!
//! A build evaluates the root component into a committed `Node` tree. One
//! build may take several passes: a pass that starts async initializers is
//! thrown away, the initializers are joined, and the tree is evaluated again
//! against the settled ledgers.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;

use crate::config::EngineConfig;
use crate::context::RenderContext;
use crate::element::{Component, Element, ElementType, Handler, Prop, Props};
use crate::error::EngineError;
use crate::hooks::Scope;
use crate::identity::{InstanceId, TreePath};
use crate::interval::IntervalDescriptor;
use crate::ledger::{InstanceKey, LedgerStore, Slot};
use crate::node::{HandlerRef, Node, PropValue};
use crate::resolver::{self, Resolver, SlotError};

/// An interval slot registered during a pass.
pub(crate) struct IntervalSite {
    pub key: InstanceKey,
    pub slot: usize,
    pub instance: InstanceId,
    pub handler: HandlerRef,
}

/// Everything one pass collects on the side while it evaluates components.
pub(crate) struct PassState {
    pub ledgers: Rc<RefCell<LedgerStore>>,
    pub context: Rc<RenderContext>,
    pub config: EngineConfig,
    pub resolver: RefCell<Resolver>,
    pub handlers: RefCell<HashMap<HandlerRef, Handler>>,
    pub intervals: RefCell<Vec<IntervalSite>>,
    pub errors: RefCell<Vec<SlotError>>,
    pub visited: RefCell<HashSet<InstanceKey>>,
}

impl PassState {
    fn new(
        ledgers: Rc<RefCell<LedgerStore>>,
        context: Rc<RenderContext>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledgers,
            context,
            config,
            resolver: RefCell::new(Resolver::default()),
            handlers: RefCell::new(HashMap::new()),
            intervals: RefCell::new(Vec::new()),
            errors: RefCell::new(Vec::new()),
            visited: RefCell::new(HashSet::new()),
        }
    }
}

/// Output of a settled build.
pub(crate) struct Build {
    pub tree: Node,
    pub handlers: HashMap<HandlerRef, Handler>,
    pub intervals: Vec<IntervalDescriptor>,
    pub errors: Vec<SlotError>,
    pub passes: usize,
}

pub(crate) struct TreeBuilder<'a> {
    root: &'a Component,
    context: Rc<RenderContext>,
    config: &'a EngineConfig,
    ledgers: Rc<RefCell<LedgerStore>>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        root: &'a Component,
        context: Rc<RenderContext>,
        config: &'a EngineConfig,
        ledgers: Rc<RefCell<LedgerStore>>,
    ) -> Self {
        Self {
            root,
            context,
            config,
            ledgers,
        }
    }

    pub async fn build(&self) -> Result<Build, EngineError> {
        let mut passes = 0;
        loop {
            passes += 1;
            if passes > self.config.max_build_passes {
                return Err(EngineError::BuildDidNotSettle {
                    passes: self.config.max_build_passes,
                });
            }

            let pass = Rc::new(PassState::new(
                self.ledgers.clone(),
                self.context.clone(),
                self.config.clone(),
            ));
            let rendered = build_element(&pass, self.root.element(), TreePath::root()).await?;

            let batch = pass.resolver.borrow_mut().take();
            if !batch.is_empty() {
                log::debug!(
                    "build: pass {passes} started {} initializer(s); joining",
                    batch.len()
                );
                resolver::settle(batch, &self.ledgers).await;
                continue;
            }

            let visited = pass.visited.take();
            for dropped in self.ledgers.borrow_mut().retain_visited(&visited) {
                log::warn!("build: `{dropped}` left the tree; ledger dropped");
            }

            let intervals = self.describe_intervals(&pass);
            let tree = Node::root(rendered.into_iter().collect());
            log::debug!("build: settled after {passes} pass(es), {} nodes", tree.count());
            return Ok(Build {
                tree,
                handlers: pass.handlers.take(),
                intervals,
                errors: pass.errors.take(),
                passes,
            });
        }
    }

    fn describe_intervals(&self, pass: &PassState) -> Vec<IntervalDescriptor> {
        let ledgers = self.ledgers.borrow();
        pass.intervals
            .borrow()
            .iter()
            .filter_map(|site| match ledgers.slot(site.key, site.slot) {
                Some(Slot::Interval { period_ms, running }) => Some(IntervalDescriptor {
                    handler: site.handler.clone(),
                    instance: site.instance.clone(),
                    slot: site.slot,
                    period_ms: *period_ms,
                    running: *running,
                }),
                _ => None,
            })
            .collect()
    }
}

fn check_unique_keys<'k>(
    keys: impl IntoIterator<Item = Option<&'k str>>,
    parent: &TreePath,
) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for key in keys.into_iter().flatten() {
        if !seen.insert(key) {
            return Err(EngineError::DuplicateKey {
                parent: parent.to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

fn build_element<'p>(
    pass: &'p Rc<PassState>,
    element: Element,
    path: TreePath,
) -> LocalBoxFuture<'p, Result<Option<Node>, EngineError>> {
    async move {
        let Element {
            kind,
            props,
            children,
            key,
            id,
        } = element;

        match kind {
            ElementType::Intrinsic(tag) => {
                check_unique_keys(children.iter().map(|c| c.key.as_deref()), &path)?;

                let mut node_props = BTreeMap::new();
                for (name, prop) in props {
                    let value = match prop {
                        Prop::Value(v) => PropValue::Value(v),
                        Prop::Handler(handler) => {
                            let handler_ref = path.handler_ref(&name);
                            pass.handlers
                                .borrow_mut()
                                .insert(handler_ref.clone(), handler);
                            PropValue::Handler(handler_ref)
                        }
                    };
                    node_props.insert(name, value);
                }

                let mut nodes = Vec::with_capacity(children.len());
                for (index, child) in children.into_iter().enumerate() {
                    let child_path = path.child(index, child.key.as_deref());
                    if let Some(node) = build_element(pass, child, child_path).await? {
                        nodes.push(node);
                    }
                }
                // A component's output may carry its own key.
                check_unique_keys(nodes.iter().map(|n| n.key.as_deref()), &path)?;

                Ok(Some(Node {
                    tag,
                    props: node_props,
                    children: nodes,
                    key,
                    id,
                }))
            }
            ElementType::Component(component) => {
                let scope = Scope::enter(pass.clone(), path.component(component.name()));
                let instance = scope.instance_id().clone();
                let props = Props::from_element(props, children, key.clone());

                let output = component
                    .invoke(scope.clone(), props)
                    .await
                    .map_err(|e| EngineError::from_component(&instance, e))?;
                scope.finish()?;

                let Some(mut output) = output else {
                    return Ok(None);
                };
                // The component's key identifies its output among siblings.
                if output.key.is_none() {
                    output.key = key;
                }
                if output.id.is_none() {
                    output.id = id;
                }
                build_element(pass, output, scope.path().clone()).await
            }
        }
    }
    .boxed_local()
}
