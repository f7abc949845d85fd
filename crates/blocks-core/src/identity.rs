use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::node::HandlerRef;

/// Stable identity of a component instance, derived from its position in the
/// tree. Two renders of the same logical instance produce the same id, which
/// is what lines their ledgers up.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        InstanceId(s.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Index(usize),
    Key(Rc<str>),
    Component(Rc<str>),
}

/// Structural path of an element while building: child positions (or keys)
/// and the names of the components entered along the way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreePath {
    segments: Vec<Segment>,
}

impl TreePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Explicit keys win over positions so reordered keyed siblings keep
    /// their identity.
    pub fn child(&self, index: usize, key: Option<&str>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(match key {
            Some(k) => Segment::Key(Rc::from(k)),
            None => Segment::Index(index),
        });
        Self { segments }
    }

    pub fn component(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Component(Rc::from(name)));
        Self { segments }
    }

    pub fn instance_id(&self) -> InstanceId {
        InstanceId(self.to_string())
    }

    pub fn handler_ref(&self, prop: &str) -> HandlerRef {
        HandlerRef::new(format!("{self}#{}", escape(prop)))
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match seg {
                Segment::Index(n) => write!(f, "{n}")?,
                Segment::Key(k) => write!(f, "k:{}", escape(k))?,
                Segment::Component(name) => f.write_str(&escape(name))?,
            }
        }
        Ok(())
    }
}

// Keeps '/', '#' and '@' free for the path and handler-ref syntax.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '#' => out.push_str("%23"),
            '@' => out.push_str("%40"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_children_ignore_position() {
        let root = TreePath::root().component("App");
        let a = root.child(0, Some("a")).component("Row");
        let b = root.child(5, Some("a")).component("Row");
        assert_eq!(a.instance_id(), b.instance_id());
        assert_eq!(a.instance_id().as_str(), "App/k:a/Row");
    }

    #[test]
    fn unkeyed_children_use_position() {
        let root = TreePath::root().component("App");
        assert_ne!(
            root.child(0, None).component("Row").instance_id(),
            root.child(1, None).component("Row").instance_id()
        );
    }

    #[test]
    fn separators_in_keys_are_escaped() {
        let path = TreePath::root().component("App").child(0, Some("a/b#c"));
        assert_eq!(path.to_string(), "App/k:a%2Fb%23c");
        assert_eq!(path.handler_ref("onPress").as_str(), "App/k:a%2Fb%23c#onPress");
    }
}
