// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Structural comparison of committed and transaction forests.
//!
//! The engine walks every (committed root, transaction root) pair and
//! produces one [`DatastoreDiff`] per meaningful changed node, keyed by the
//! node's full path. Full paths are rebuilt from the root: every segment is
//! module-prefixed and list entries carry their key leaf values in declared
//! order, so a given node always yields the same path string regardless of
//! traversal order.
//!
//! Elementary changes are finer-grained than the published diffs: a list
//! entry with three changed leaves produces three elementary change
//! records. Pure reorderings are discarded (ordering is not a semantic
//! change here), records whose normalized before and after coincide are
//! dropped as movement artifacts, and duplicate paths collapse first-seen
//! wins.

use crate::{
    document::{Node, entry_key_values},
    path::{Path, Segment},
    schema::SchemaContext,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Classification of a published diff entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiffType::Create => "create",
            DiffType::Update => "update",
            DiffType::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// One semantic change between the committed and transaction forests.
///
/// `path` is the fully keyed, per-segment module-prefixed address of the
/// changed node. `before`/`after` are the node's serialized forms; the
/// absent side of a create or delete is an empty object.
#[derive(Debug, Clone)]
pub struct DatastoreDiff {
    pub before: Value,
    pub after: Value,
    pub kind: DiffType,
    pub path: Path,
}

/// Elementary change kinds produced by the tree walk. `Moved` records pure
/// reorderings and never reaches the published map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Created,
    Deleted,
    Changed,
    Moved,
}

struct Change<'a> {
    kind: ChangeKind,
    path: Path,
    before: Option<&'a Node>,
    after: Option<&'a Node>,
}

/// Diffs every root pair into a path-keyed map of published diffs.
pub(crate) fn diff_roots(
    pairs: &[(&str, Option<&Node>, Option<&Node>)],
    schema: &dyn SchemaContext,
) -> BTreeMap<Path, DatastoreDiff> {
    let mut changes = Vec::new();
    for &(module, committed, transaction) in pairs {
        if committed.is_none() && transaction.is_none() {
            continue;
        }
        diff_children(
            module,
            committed.and_then(Node::as_container),
            transaction.and_then(Node::as_container),
            &Path::root(),
            schema,
            &mut changes,
        );
    }

    let mut out = BTreeMap::new();
    for change in changes {
        if change.kind == ChangeKind::Moved {
            continue;
        }
        let before = change.before.map_or_else(empty_object, Node::to_json);
        let after = change.after.map_or_else(empty_object, Node::to_json);
        if before == after {
            continue;
        }
        let kind = match change.kind {
            ChangeKind::Created => DiffType::Create,
            ChangeKind::Deleted => DiffType::Delete,
            ChangeKind::Changed => DiffType::Update,
            ChangeKind::Moved => continue,
        };
        if !out.contains_key(&change.path) {
            out.insert(
                change.path.clone(),
                DatastoreDiff {
                    before,
                    after,
                    kind,
                    path: change.path,
                },
            );
        }
    }
    out
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn diff_children<'a>(
    module: &str,
    before: Option<&'a BTreeMap<String, Node>>,
    after: Option<&'a BTreeMap<String, Node>>,
    at: &Path,
    schema: &dyn SchemaContext,
    out: &mut Vec<Change<'a>>,
) {
    let names: BTreeSet<&str> = before
        .into_iter()
        .flat_map(|m| m.keys())
        .chain(after.into_iter().flat_map(|m| m.keys()))
        .map(String::as_str)
        .collect();
    for name in names {
        let seg_path = at.join(Segment::new(name).with_module(module));
        let b = before.and_then(|m| m.get(name));
        let a = after.and_then(|m| m.get(name));
        match (b, a) {
            (Some(b), Some(a)) => diff_nodes(module, b, a, &seg_path, schema, out),
            (Some(b), None) => out.push(Change {
                kind: ChangeKind::Deleted,
                path: seg_path,
                before: Some(b),
                after: None,
            }),
            (None, Some(a)) => out.push(Change {
                kind: ChangeKind::Created,
                path: seg_path,
                before: None,
                after: Some(a),
            }),
            (None, None) => {}
        }
    }
}

fn diff_nodes<'a>(
    module: &str,
    before: &'a Node,
    after: &'a Node,
    at: &Path,
    schema: &dyn SchemaContext,
    out: &mut Vec<Change<'a>>,
) {
    match (before, after) {
        (Node::Container(b), Node::Container(a)) => {
            diff_children(module, Some(b), Some(a), at, schema, out);
        }
        (Node::List(b), Node::List(a)) => {
            diff_lists(module, before, after, b, a, at, schema, out);
        }
        (Node::LeafList(b), Node::LeafList(a)) => {
            if b != a {
                out.push(Change {
                    kind: ChangeKind::Changed,
                    path: at.clone(),
                    before: Some(before),
                    after: Some(after),
                });
            }
        }
        (Node::Leaf(b), Node::Leaf(a)) => {
            if b != a {
                out.push(Change {
                    kind: ChangeKind::Changed,
                    path: at.clone(),
                    before: Some(before),
                    after: Some(after),
                });
            }
        }
        // A node switched kind entirely.
        _ => out.push(Change {
            kind: ChangeKind::Changed,
            path: at.clone(),
            before: Some(before),
            after: Some(after),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn diff_lists<'a>(
    module: &str,
    before_node: &'a Node,
    after_node: &'a Node,
    before: &'a [Node],
    after: &'a [Node],
    at: &Path,
    schema: &dyn SchemaContext,
    out: &mut Vec<Change<'a>>,
) {
    let declared = schema.list_keys(&at.unkeyed());
    if declared.is_empty() {
        // Without declared keys entries have no identity; any difference is
        // a whole-list change.
        if before != after {
            out.push(Change {
                kind: ChangeKind::Changed,
                path: at.clone(),
                before: Some(before_node),
                after: Some(after_node),
            });
        }
        return;
    }

    let mut after_by_key: BTreeMap<Vec<(String, String)>, usize> = BTreeMap::new();
    for (i, entry) in after.iter().enumerate() {
        if let Some(kvs) = entry_key_values(entry, &declared) {
            after_by_key.insert(kvs, i);
        }
    }

    let mut matched: BTreeSet<usize> = BTreeSet::new();
    let mut max_seen: Option<usize> = None;
    for entry in before {
        let Some(kvs) = entry_key_values(entry, &declared) else {
            // Unidentifiable entry; without keys it can only be reported at
            // the list path itself.
            out.push(Change {
                kind: ChangeKind::Deleted,
                path: at.clone(),
                before: Some(entry),
                after: None,
            });
            continue;
        };
        let entry_path = at.with_last_segment_keys(kvs.clone());
        match after_by_key.get(&kvs) {
            Some(&i) => {
                matched.insert(i);
                if max_seen.is_some_and(|m| i < m) {
                    out.push(Change {
                        kind: ChangeKind::Moved,
                        path: entry_path.clone(),
                        before: Some(entry),
                        after: Some(&after[i]),
                    });
                }
                max_seen = Some(max_seen.map_or(i, |m| m.max(i)));
                diff_children(
                    module,
                    entry.as_container(),
                    after[i].as_container(),
                    &entry_path,
                    schema,
                    out,
                );
            }
            None => out.push(Change {
                kind: ChangeKind::Deleted,
                path: entry_path,
                before: Some(entry),
                after: None,
            }),
        }
    }
    for (i, entry) in after.iter().enumerate() {
        if matched.contains(&i) {
            continue;
        }
        let path = match entry_key_values(entry, &declared) {
            Some(kvs) => at.with_last_segment_keys(kvs),
            None => at.clone(),
        };
        out.push(Change {
            kind: ChangeKind::Created,
            path,
            before: None,
            after: Some(entry),
        });
    }
}
