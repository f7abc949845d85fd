//! The committed tree.
//!
//! A `Node` is what a build produces once every component has been expanded:
//! intrinsic tags only, handler props replaced by `HandlerRef`s. It is plain
//! data, so it can be encoded, persisted, diffed, and handed back on the next
//! request.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use crate::identity::InstanceId;

/// Tag of the node that wraps every committed tree.
pub const ROOT_TAG: &str = "root";

/// Child-index path from the root.
pub type NodePath = SmallVec<[usize; 8]>;

const INTERVAL_MARKER: &str = "@interval:";

/// Reference to an event handler reachable from a committed tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerRef(String);

impl HandlerRef {
    pub fn new(raw: impl Into<String>) -> Self {
        HandlerRef(raw.into())
    }

    pub fn interval(instance: &InstanceId, slot: usize) -> Self {
        HandlerRef(format!("{instance}{INTERVAL_MARKER}{slot}"))
    }

    /// `Some((instance, slot))` for interval handler refs.
    pub fn as_interval(&self) -> Option<(InstanceId, usize)> {
        let (instance, slot) = self.0.rsplit_once(INTERVAL_MARKER)?;
        let slot = slot.parse().ok()?;
        Some((InstanceId::from(instance), slot))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for HandlerRef {
    fn from(raw: String) -> Self {
        HandlerRef(raw)
    }
}

impl From<&str> for HandlerRef {
    fn from(s: &str) -> Self {
        HandlerRef::new(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropValue {
    Value(Value),
    Handler(HandlerRef),
}

impl PropValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropValue::Value(v) => Some(v),
            PropValue::Handler(_) => None,
        }
    }

    pub fn as_handler(&self) -> Option<&HandlerRef> {
        match self {
            PropValue::Handler(h) => Some(h),
            PropValue::Value(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, PropValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Node {
            tag: tag.into(),
            props: BTreeMap::new(),
            children: Vec::new(),
            key: None,
            id: None,
        }
    }

    pub fn root(children: Vec<Node>) -> Self {
        Node::new(ROOT_TAG).with_children(children)
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), PropValue::Value(value.into()));
        self
    }

    pub fn with_handler(mut self, name: impl Into<String>, handler: HandlerRef) -> Self {
        self.props.insert(name.into(), PropValue::Handler(handler));
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn value(&self, prop: &str) -> Option<&Value> {
        self.props.get(prop).and_then(PropValue::as_value)
    }

    pub fn str_prop(&self, prop: &str) -> Option<&str> {
        self.value(prop).and_then(Value::as_str)
    }

    pub fn handler(&self, prop: &str) -> Option<&HandlerRef> {
        self.props.get(prop).and_then(PropValue::as_handler)
    }

    pub fn get(&self, path: &[usize]) -> Option<&Node> {
        let mut cur = self;
        for &i in path {
            cur = cur.children.get(i)?;
        }
        Some(cur)
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }

    /// Every handler reference reachable from this subtree.
    pub fn handlers(&self) -> BTreeSet<HandlerRef> {
        let mut out = BTreeSet::new();
        self.collect_handlers(&mut out);
        out
    }

    fn collect_handlers(&self, out: &mut BTreeSet<HandlerRef>) {
        out.extend(self.props.values().filter_map(PropValue::as_handler).cloned());
        for child in &self.children {
            child.collect_handlers(out);
        }
    }

    /// First node (pre-order) whose props reference `handler`.
    pub fn find_handler(&self, handler: &HandlerRef) -> Option<&Node> {
        if self.props.values().any(|p| p.as_handler() == Some(handler)) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_handler(handler))
    }
}
