//! # Reconciler
//!
//! `diff` compares two committed trees and emits a `Patch`. Ops are applied
//! in order and every path refers to the tree as it stands when that op is
//! applied.
//!
//! Per node:
//!
//! - different tag, key or id: `Replace`, no recursion;
//! - otherwise: `UpdateProps` for changed props, then the children.
//!
//! Children are matched by key first. Unkeyed children are matched by
//! position among the unkeyed children only, so a keyed sibling moving
//! around does not shift them. Unmatched old children are removed,
//! matched ones are moved into place (the longest run already in order
//! stays put), then unmatched new children are inserted.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::PatchError;
use crate::node::{Node, NodePath, PropValue};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    Insert {
        parent: NodePath,
        index: usize,
        node: Node,
    },
    Remove {
        path: NodePath,
    },
    /// Removes the child at `from`, then inserts it at `to`.
    Move {
        parent: NodePath,
        from: usize,
        to: usize,
    },
    Replace {
        path: NodePath,
        node: Node,
    },
    UpdateProps {
        path: NodePath,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        set: BTreeMap<String, PropValue>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        unset: Vec<String>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    ops: Vec<PatchOp>,
}

impl Patch {
    /// Mounts `node` as the whole tree.
    pub fn mount(node: Node) -> Self {
        Patch {
            ops: vec![PatchOp::Insert {
                parent: NodePath::new(),
                index: 0,
                node,
            }],
        }
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn apply(&self, base: Option<Node>) -> Result<Node, PatchError> {
        let mut root = base;
        for op in &self.ops {
            apply_op(&mut root, op)?;
        }
        root.ok_or(PatchError::EmptyTree)
    }
}

/// `None` for `old` means nothing was committed yet.
pub fn reconcile(old: Option<&Node>, new: &Node) -> Patch {
    match old {
        Some(old) => diff(old, new),
        None => Patch::mount(new.clone()),
    }
}

pub fn diff(old: &Node, new: &Node) -> Patch {
    let mut ops = Vec::new();
    diff_node(old, new, &NodePath::new(), &mut ops);
    Patch { ops }
}

fn child_path(parent: &NodePath, index: usize) -> NodePath {
    let mut path = parent.clone();
    path.push(index);
    path
}

fn diff_node(old: &Node, new: &Node, path: &NodePath, ops: &mut Vec<PatchOp>) {
    if old.tag != new.tag || old.key != new.key || old.id != new.id {
        ops.push(PatchOp::Replace {
            path: path.clone(),
            node: new.clone(),
        });
        return;
    }

    let set: BTreeMap<String, PropValue> = new
        .props
        .iter()
        .filter(|(name, value)| old.props.get(*name) != Some(*value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let unset: Vec<String> = old
        .props
        .keys()
        .filter(|name| !new.props.contains_key(*name))
        .cloned()
        .collect();
    if !set.is_empty() || !unset.is_empty() {
        ops.push(PatchOp::UpdateProps {
            path: path.clone(),
            set,
            unset,
        });
    }

    diff_children(&old.children, &new.children, path, ops);
}

/// For each new child, the index of the old child it continues, if any.
fn match_children(old: &[Node], new: &[Node]) -> Vec<Option<usize>> {
    let mut keyed: HashMap<&str, usize> = HashMap::new();
    let mut unkeyed = Vec::new();
    for (i, child) in old.iter().enumerate() {
        match child.key.as_deref() {
            Some(k) => {
                keyed.entry(k).or_insert(i);
            }
            None => unkeyed.push(i),
        }
    }

    let mut taken = vec![false; old.len()];
    let mut next_unkeyed = unkeyed.into_iter();
    new.iter()
        .map(|child| {
            let candidate = match child.key.as_deref() {
                Some(k) => keyed.get(k).copied(),
                None => next_unkeyed.next(),
            };
            match candidate {
                Some(i) if !taken[i] => {
                    taken[i] = true;
                    Some(i)
                }
                _ => None,
            }
        })
        .collect()
}

/// Marks the members of one longest strictly increasing subsequence.
fn longest_increasing(seq: &[usize]) -> Vec<bool> {
    // tails[l] = index into seq of the smallest tail of an increasing run of length l + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &v) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < v);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut keep = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        keep[i] = true;
        cursor = prev[i];
    }
    keep
}

fn diff_children(old: &[Node], new: &[Node], parent: &NodePath, ops: &mut Vec<PatchOp>) {
    let matches = match_children(old, new);

    let mut matched = vec![false; old.len()];
    for &o in matches.iter().flatten() {
        matched[o] = true;
    }

    // Highest index first so the remaining indices stay valid.
    for i in (0..old.len()).rev() {
        if !matched[i] {
            ops.push(PatchOp::Remove {
                path: child_path(parent, i),
            });
        }
    }

    // Old indices still in place, in their current order.
    let mut current: Vec<usize> = (0..old.len()).filter(|&i| matched[i]).collect();

    // Wanted order of the survivors.
    let order: Vec<usize> = matches.iter().flatten().copied().collect();
    let stable = longest_increasing(&order);

    // Walk backwards, parking each out-of-order child right before the
    // child that must follow it.
    for k in (0..order.len()).rev() {
        if stable[k] {
            continue;
        }
        let Some(from) = current.iter().position(|&o| o == order[k]) else {
            continue;
        };
        let moved = current.remove(from);
        let to = match order.get(k + 1) {
            Some(next) => current
                .iter()
                .position(|o| o == next)
                .unwrap_or(current.len()),
            None => current.len(),
        };
        current.insert(to, moved);
        if from != to {
            ops.push(PatchOp::Move {
                parent: parent.clone(),
                from,
                to,
            });
        }
    }

    for (j, m) in matches.iter().enumerate() {
        if m.is_none() {
            ops.push(PatchOp::Insert {
                parent: parent.clone(),
                index: j,
                node: new[j].clone(),
            });
        }
    }

    for (j, m) in matches.iter().enumerate() {
        if let Some(o) = *m {
            diff_node(&old[o], &new[j], &child_path(parent, j), ops);
        }
    }
}

fn node_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> Result<&'a mut Node, PatchError> {
    let mut cur = root;
    for (depth, &i) in path.iter().enumerate() {
        cur = cur
            .children
            .get_mut(i)
            .ok_or_else(|| PatchError::MissingNode {
                path: path[..=depth].to_vec(),
            })?;
    }
    Ok(cur)
}

fn apply_op(root: &mut Option<Node>, op: &PatchOp) -> Result<(), PatchError> {
    if let PatchOp::Insert {
        parent,
        index: 0,
        node,
    } = op
        && parent.is_empty()
        && root.is_none()
    {
        *root = Some(node.clone());
        return Ok(());
    }

    let tree = root.as_mut().ok_or(PatchError::EmptyTree)?;
    match op {
        PatchOp::Insert {
            parent,
            index,
            node,
        } => {
            let p = node_at_mut(tree, parent)?;
            if *index > p.children.len() {
                return Err(PatchError::IndexOutOfBounds {
                    parent: parent.to_vec(),
                    index: *index,
                    len: p.children.len(),
                });
            }
            p.children.insert(*index, node.clone());
        }
        PatchOp::Remove { path } => {
            let (&last, parent) = path.split_last().ok_or(PatchError::RootOperation)?;
            let p = node_at_mut(tree, parent)?;
            if last >= p.children.len() {
                return Err(PatchError::IndexOutOfBounds {
                    parent: parent.to_vec(),
                    index: last,
                    len: p.children.len(),
                });
            }
            p.children.remove(last);
        }
        PatchOp::Move { parent, from, to } => {
            let p = node_at_mut(tree, parent)?;
            let len = p.children.len();
            if *from >= len || *to >= len {
                return Err(PatchError::IndexOutOfBounds {
                    parent: parent.to_vec(),
                    index: (*from).max(*to),
                    len,
                });
            }
            let moved = p.children.remove(*from);
            p.children.insert(*to, moved);
        }
        PatchOp::Replace { path, node } => {
            *node_at_mut(tree, path)? = node.clone();
        }
        PatchOp::UpdateProps { path, set, unset } => {
            let n = node_at_mut(tree, path)?;
            for (name, value) in set {
                n.props.insert(name.clone(), value.clone());
            }
            for name in unset {
                n.props.remove(name);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn text(key: Option<&str>, s: &str) -> Node {
        let n = Node::new("text").with_prop("text", s);
        match key {
            Some(k) => n.with_key(k),
            None => n,
        }
    }

    fn keyed(keys: &[&str]) -> Node {
        Node::root(vec![
            Node::new("vstack").with_children(keys.iter().map(|k| text(Some(*k), k)).collect()),
        ])
    }

    fn assert_applies(old: &Node, new: &Node) -> Patch {
        let patch = diff(old, new);
        assert_eq!(patch.apply(Some(old.clone())).as_ref(), Ok(new));
        patch
    }

    #[test]
    fn identical_trees_diff_to_nothing() {
        let t = keyed(&["a", "b", "c"]);
        assert!(diff(&t, &t).is_empty());
    }

    #[test]
    fn rotation_is_a_single_move() {
        let patch = assert_applies(&keyed(&["1", "2", "3"]), &keyed(&["3", "1", "2"]));
        assert_eq!(
            patch.ops(),
            &[PatchOp::Move {
                parent: smallvec![0],
                from: 2,
                to: 0
            }]
        );
    }

    #[test]
    fn rotation_the_other_way_is_a_single_move() {
        let patch = assert_applies(&keyed(&["1", "2", "3"]), &keyed(&["2", "3", "1"]));
        assert_eq!(patch.len(), 1);
        assert!(matches!(patch.ops()[0], PatchOp::Move { .. }));
    }

    #[test]
    fn reversal_and_churn() {
        assert_applies(&keyed(&["a", "b", "c", "d", "e"]), &keyed(&["e", "d", "c", "b", "a"]));
        assert_applies(&keyed(&["a", "b", "c"]), &keyed(&["x", "c", "y", "a"]));
        assert_applies(&keyed(&["a", "b", "c"]), &keyed(&[]));
        assert_applies(&keyed(&[]), &keyed(&["a", "b"]));
    }

    #[test]
    fn prop_change_is_an_update_not_a_replace() {
        let old = Node::root(vec![text(None, "Count: 0")]);
        let new = Node::root(vec![text(None, "Count: 1")]);
        let patch = assert_applies(&old, &new);
        assert_eq!(patch.len(), 1);
        match &patch.ops()[0] {
            PatchOp::UpdateProps { path, set, unset } => {
                assert_eq!(path.as_slice(), &[0]);
                assert_eq!(set.len(), 1);
                assert!(unset.is_empty());
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn tag_change_is_a_replace() {
        let old = Node::root(vec![text(None, "x")]);
        let new = Node::root(vec![Node::new("button").with_prop("text", "x")]);
        let patch = assert_applies(&old, &new);
        assert!(matches!(patch.ops(), [PatchOp::Replace { .. }]));
    }

    #[test]
    fn unkeyed_children_match_among_themselves() {
        let old = Node::root(vec![text(None, "u0"), text(Some("k"), "k"), text(None, "u1")]);
        let new = Node::root(vec![text(Some("k"), "k"), text(None, "u0"), text(None, "u1")]);
        let patch = assert_applies(&old, &new);
        assert!(
            patch
                .ops()
                .iter()
                .all(|op| matches!(op, PatchOp::Move { .. }))
        );
    }

    #[test]
    fn removed_prop_is_unset() {
        let old = Node::root(vec![Node::new("text").with_prop("a", 1).with_prop("b", 2)]);
        let new = Node::root(vec![Node::new("text").with_prop("a", 1)]);
        let patch = assert_applies(&old, &new);
        assert!(matches!(
            &patch.ops()[0],
            PatchOp::UpdateProps { unset, .. } if unset == &vec!["b".to_string()]
        ));
    }

    #[test]
    fn mount_builds_from_nothing() {
        let t = keyed(&["a"]);
        assert_eq!(reconcile(None, &t).apply(None), Ok(t));
    }

    #[test]
    fn bad_patches_are_rejected() {
        let t = keyed(&["a"]);
        let bad = Patch {
            ops: vec![PatchOp::Remove {
                path: smallvec![0, 7],
            }],
        };
        assert!(matches!(
            bad.apply(Some(t.clone())),
            Err(PatchError::IndexOutOfBounds { index: 7, .. })
        ));
        assert_eq!(
            Patch {
                ops: vec![PatchOp::Remove {
                    path: NodePath::new()
                }]
            }
            .apply(Some(t)),
            Err(PatchError::RootOperation)
        );
    }

    #[test]
    fn lis_marks_a_longest_run() {
        assert_eq!(longest_increasing(&[2, 0, 1]), vec![false, true, true]);
        assert_eq!(longest_increasing(&[]), Vec::<bool>::new());
        assert_eq!(
            longest_increasing(&[0, 1, 2]).iter().filter(|k| **k).count(),
            3
        );
    }
}
