// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The owned document-tree model and its JSON boundary.
//!
//! Every public datastore API moves documents as [`serde_json::Value`]; the
//! datastore itself operates on [`Node`] trees. A node is a container
//! (object), a list of container entries, a leaf-list of scalars, or a
//! single [`LeafValue`] scalar. Trees are plain owned values: duplicating a
//! forest is a deep [`Clone`], and committed and transaction forests can
//! never alias each other.
//!
//! A forest holds one root container per module. The root container's
//! children are the module's top-level subtrees, so a JSON document such as
//! `{"openconfig-interfaces:interfaces": {...}}` becomes the child
//! `interfaces` of the `openconfig-interfaces` root. Object keys inside a
//! subtree are stored without module prefixes; the owning module is implied
//! by the root.

use crate::{
    error::DatastoreError,
    path::{Path, Segment},
    schema::SchemaContext,
};
use serde_json::Value;
use std::collections::{BTreeMap, btree_map::Entry};
use std::fmt;

/// A scalar held by a leaf or leaf-list node.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
}

impl LeafValue {
    pub(crate) fn from_json(value: &Value) -> Option<LeafValue> {
        match value {
            Value::Null => Some(LeafValue::Null),
            Value::Bool(b) => Some(LeafValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(LeafValue::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(LeafValue::Uint(u))
                } else {
                    n.as_f64().map(LeafValue::Double)
                }
            }
            Value::String(s) => Some(LeafValue::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        match self {
            LeafValue::Null => Value::Null,
            LeafValue::Bool(b) => Value::from(*b),
            LeafValue::Int(i) => Value::from(*i),
            LeafValue::Uint(u) => Value::from(*u),
            LeafValue::Double(d) => Value::from(*d),
            LeafValue::String(s) => Value::from(s.clone()),
        }
    }

    /// The string form used in `[key='value']` predicates.
    pub fn as_key_string(&self) -> String {
        match self {
            LeafValue::Null => String::new(),
            LeafValue::Bool(b) => b.to_string(),
            LeafValue::Int(i) => i.to_string(),
            LeafValue::Uint(u) => u.to_string(),
            LeafValue::Double(d) => d.to_string(),
            LeafValue::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for LeafValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key_string())
    }
}

/// One node of a document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An object; children keyed by unprefixed name, in name order.
    Container(BTreeMap<String, Node>),
    /// A list; every entry is a [`Node::Container`].
    List(Vec<Node>),
    /// A list of scalars.
    LeafList(Vec<LeafValue>),
    /// A single scalar.
    Leaf(LeafValue),
}

impl Node {
    pub(crate) fn empty_container() -> Node {
        Node::Container(BTreeMap::new())
    }

    pub(crate) fn as_container(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Container(children) => Some(children),
            _ => None,
        }
    }

    pub(crate) fn as_container_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match self {
            Node::Container(children) => Some(children),
            _ => None,
        }
    }

    pub(crate) fn is_empty_container(&self) -> bool {
        matches!(self, Node::Container(children) if children.is_empty())
    }

    /// Builds a tree from a JSON value. Object keys lose any module prefix;
    /// arrays become lists (all objects) or leaf-lists (all scalars).
    pub fn from_json(value: Value) -> Result<Node, DatastoreError> {
        match value {
            Value::Object(map) => {
                let mut children = BTreeMap::new();
                for (key, child) in map {
                    children.insert(local_name(&key).to_string(), Node::from_json(child)?);
                }
                Ok(Node::Container(children))
            }
            Value::Array(items) => {
                if items.iter().all(|i| i.is_object()) {
                    let entries = items
                        .into_iter()
                        .map(Node::from_json)
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Node::List(entries))
                } else if items.iter().all(|i| !i.is_object() && !i.is_array()) {
                    let leaves = items
                        .iter()
                        .filter_map(LeafValue::from_json)
                        .collect::<Vec<_>>();
                    Ok(Node::LeafList(leaves))
                } else {
                    Err(DatastoreError::UnsupportedDocument(
                        "an array must hold only objects or only scalars".to_string(),
                    ))
                }
            }
            scalar => match LeafValue::from_json(&scalar) {
                Some(leaf) => Ok(Node::Leaf(leaf)),
                None => Err(DatastoreError::UnsupportedDocument(
                    "value is neither object, array nor scalar".to_string(),
                )),
            },
        }
    }

    /// Renders the tree back to JSON with plain (unprefixed) keys.
    pub fn to_json(&self) -> Value {
        match self {
            Node::Container(children) => Value::Object(
                children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Node::List(entries) => Value::Array(entries.iter().map(Node::to_json).collect()),
            Node::LeafList(leaves) => Value::Array(leaves.iter().map(LeafValue::to_json).collect()),
            Node::Leaf(leaf) => leaf.to_json(),
        }
    }
}

/// Per-module document roots, iterated in module-name order.
pub(crate) type Forest = BTreeMap<String, Node>;

/// Strips a `module:` prefix from an object key.
pub(crate) fn local_name(key: &str) -> &str {
    key.split_once(':').map(|(_, name)| name).unwrap_or(key)
}

/// The string form of a scalar JSON value for key predicates.
pub(crate) fn json_key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Splits a top-level JSON document into per-module root containers. Every
/// top-level key must carry a module prefix.
pub(crate) fn forest_from_json(doc: Value) -> Result<Forest, DatastoreError> {
    let Value::Object(map) = doc else {
        return Err(DatastoreError::UnsupportedDocument(
            "a top-level document must be an object".to_string(),
        ));
    };
    let mut forest = Forest::new();
    for (key, value) in map {
        let Some((module, name)) = key.split_once(':') else {
            return Err(DatastoreError::MissingModule(format!("/{key}")));
        };
        let node = Node::from_json(value)?;
        if let Some(children) = forest
            .entry(module.to_string())
            .or_insert_with(Node::empty_container)
            .as_container_mut()
        {
            children.insert(name.to_string(), node);
        }
    }
    Ok(forest)
}

/// Renders a whole forest with `module:name` top-level keys.
pub(crate) fn forest_to_json(forest: &Forest) -> Value {
    let mut out = serde_json::Map::new();
    for (module, root) in forest {
        let Some(children) = root.as_container() else {
            continue;
        };
        for (name, node) in children {
            out.insert(format!("{module}:{name}"), node.to_json());
        }
    }
    Value::Object(out)
}

/// Resolves a segment's key predicates against the schema: a predicate with
/// no key name (`['v']`) takes the list's first declared key.
pub(crate) fn resolved_keys(
    seg: &Segment,
    list_path: &Path,
    schema: &dyn SchemaContext,
) -> Vec<(String, String)> {
    let declared = schema.list_keys(list_path);
    seg.keys()
        .iter()
        .map(|(k, v)| {
            let name = if k.is_empty() {
                declared.first().cloned().unwrap_or_default()
            } else {
                k.clone()
            };
            (name, v.clone())
        })
        .collect()
}

/// Whether a list entry carries all the given key leaf values.
pub(crate) fn matches_key_values(entry: &Node, keys: &[(String, String)]) -> bool {
    keys.iter().all(|(k, v)| {
        !k.is_empty()
            && entry
                .as_container()
                .and_then(|children| children.get(k))
                .and_then(|n| match n {
                    Node::Leaf(leaf) => Some(leaf.as_key_string()),
                    _ => None,
                })
                .is_some_and(|s| s == *v)
    })
}

/// Reads the declared key leaf values out of a list entry, in declared
/// order. `None` when any key leaf is missing.
pub(crate) fn entry_key_values(entry: &Node, declared: &[String]) -> Option<Vec<(String, String)>> {
    declared
        .iter()
        .map(|k| {
            entry
                .as_container()
                .and_then(|children| children.get(k))
                .and_then(|n| match n {
                    Node::Leaf(leaf) => Some((k.clone(), leaf.as_key_string())),
                    _ => None,
                })
        })
        .collect()
}

/// A node matched by [`resolve`], with enough context to render it the way
/// reads wrap results.
pub(crate) struct ResolvedNode<'a> {
    pub node: &'a Node,
    /// Whether the match is a single list entry (rendered as a one-element
    /// array).
    pub is_entry: bool,
}

/// All nodes a path addresses inside a module root container.
///
/// A keyed segment filters list entries; an unkeyed intermediate segment
/// descends into every entry; an unkeyed terminal list segment addresses
/// the list itself as one node.
pub(crate) fn resolve<'a>(
    root: &'a Node,
    path: &Path,
    schema: &dyn SchemaContext,
) -> Vec<ResolvedNode<'a>> {
    let mut matches = Vec::new();
    resolve_rec(root, path, 0, schema, &mut matches);
    matches
}

fn resolve_rec<'a>(
    node: &'a Node,
    path: &Path,
    index: usize,
    schema: &dyn SchemaContext,
    out: &mut Vec<ResolvedNode<'a>>,
) {
    let Some(seg) = path.segments().get(index) else {
        return;
    };
    let last = index + 1 == path.depth();
    let Some(children) = node.as_container() else {
        return;
    };
    let Some(child) = children.get(seg.name()) else {
        return;
    };
    match child {
        Node::List(entries) => {
            if seg.has_keys() {
                let keys = resolved_keys(seg, &path.truncated(index + 1).unkeyed(), schema);
                for entry in entries.iter().filter(|e| matches_key_values(e, &keys)) {
                    if last {
                        out.push(ResolvedNode {
                            node: entry,
                            is_entry: true,
                        });
                    } else {
                        resolve_rec(entry, path, index + 1, schema, out);
                    }
                }
            } else if last {
                out.push(ResolvedNode {
                    node: child,
                    is_entry: false,
                });
            } else {
                for entry in entries {
                    resolve_rec(entry, path, index + 1, schema, out);
                }
            }
        }
        other => {
            // A key predicate only ever selects list entries.
            if seg.has_keys() {
                return;
            }
            if last {
                out.push(ResolvedNode {
                    node: other,
                    is_entry: false,
                });
            } else {
                resolve_rec(other, path, index + 1, schema, out);
            }
        }
    }
}

/// Reads the unique node at `path` from a forest and wraps it the way the
/// public read API renders documents: `{"<module>:<name>": ...}`, with list
/// entries wrapped in a one-element array. Missing nodes read as `{}`.
pub(crate) fn read_wrapped(
    forest: &Forest,
    path: &Path,
    schema: &dyn SchemaContext,
) -> Result<Value, DatastoreError> {
    let Some(module) = path.first_module_name() else {
        return Err(DatastoreError::MissingModule(path.to_string()));
    };
    let Some(root) = forest.get(module) else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let found = resolve(root, path, schema);
    match found.as_slice() {
        [] => Ok(Value::Object(serde_json::Map::new())),
        [only] => {
            let name = path
                .last_segment()
                .map(Segment::name)
                .unwrap_or_default();
            let inner = if only.is_entry {
                Value::Array(vec![only.node.to_json()])
            } else {
                only.node.to_json()
            };
            let mut wrapper = serde_json::Map::new();
            wrapper.insert(format!("{module}:{name}"), inner);
            Ok(Value::Object(wrapper))
        }
        many => Err(DatastoreError::AmbiguousPath {
            path: path.to_string(),
            matched: many.len(),
        }),
    }
}

/// Structurally merges `src` into `dst`. Containers upsert children, keyed
/// lists match entries on their declared key leaves, everything else is
/// replaced. Fields absent from `src` are never removed.
pub(crate) fn merge_node(dst: &mut Node, src: Node, at: &Path, schema: &dyn SchemaContext) {
    match (&mut *dst, src) {
        (Node::Container(dst_children), Node::Container(src_children)) => {
            for (name, child) in src_children {
                let child_at = at.join(Segment::new(name.clone()));
                match dst_children.entry(name) {
                    Entry::Occupied(mut e) => merge_node(e.get_mut(), child, &child_at, schema),
                    Entry::Vacant(e) => {
                        e.insert(child);
                    }
                }
            }
        }
        (Node::List(dst_entries), Node::List(src_entries)) => {
            let declared = schema.list_keys(&at.unkeyed());
            if declared.is_empty() {
                *dst_entries = src_entries;
            } else {
                for entry in src_entries {
                    let Some(kvs) = entry_key_values(&entry, &declared) else {
                        dst_entries.push(entry);
                        continue;
                    };
                    match dst_entries
                        .iter()
                        .position(|e| matches_key_values(e, &kvs))
                    {
                        Some(i) => merge_node(&mut dst_entries[i], entry, at, schema),
                        None => dst_entries.push(entry),
                    }
                }
            }
        }
        (slot, src) => *slot = src,
    }
}

/// Merges a per-module root fragment into a forest, installing the root if
/// the module was never written.
pub(crate) fn merge_into_forest(
    forest: &mut Forest,
    module: &str,
    fragment: Node,
    schema: &dyn SchemaContext,
) {
    let root = forest
        .entry(module.to_string())
        .or_insert_with(Node::empty_container);
    let Node::Container(fragment_children) = fragment else {
        return;
    };
    let Some(root_children) = root.as_container_mut() else {
        return;
    };
    for (name, node) in fragment_children {
        let at = Path::root().join(Segment::new(name.clone()).with_module(module));
        match root_children.entry(name) {
            Entry::Occupied(mut e) => merge_node(e.get_mut(), node, &at, schema),
            Entry::Vacant(e) => {
                e.insert(node);
            }
        }
    }
}

/// Rebuilds the minimal ancestor chain a path implies around a document,
/// producing a per-module root fragment ready for [`merge_into_forest`].
///
/// The document may be wrapped the way reads render it (a single key naming
/// the path's last segment) or be the bare fragment. List segments along
/// the chain become single-entry lists with the path's key predicates
/// injected as leaves.
pub(crate) fn fragment_for_path(
    path: &Path,
    doc: Value,
    schema: &dyn SchemaContext,
) -> Result<Node, DatastoreError> {
    let Some(last) = path.last_segment() else {
        return Err(DatastoreError::MissingModule(path.to_string()));
    };
    let inner = unwrap_wrapper(doc, last.name());
    let unkeyed = path.unkeyed();

    let mut node = if last.has_keys() || schema.is_list(&unkeyed) {
        let entries_json = match inner {
            Value::Array(items) => items,
            obj @ Value::Object(_) => vec![obj],
            other => {
                return Err(DatastoreError::MalformedDocument {
                    path: path.to_string(),
                    reason: format!("a list fragment must be an object or an array, got `{other}`"),
                });
            }
        };
        let keys = resolved_keys(last, &unkeyed, schema);
        let mut entries = Vec::with_capacity(entries_json.len());
        for item in entries_json {
            let mut entry = Node::from_json(item)?;
            if let Some(children) = entry.as_container_mut() {
                for (k, v) in &keys {
                    if !k.is_empty() {
                        children
                            .entry(k.clone())
                            .or_insert_with(|| Node::Leaf(LeafValue::String(v.clone())));
                    }
                }
            }
            entries.push(entry);
        }
        Node::List(entries)
    } else {
        Node::from_json(inner)?
    };

    let mut child_name = last.name().to_string();
    for index in (0..path.depth() - 1).rev() {
        let seg = &path.segments()[index];
        let seg_path = path.truncated(index + 1).unkeyed();
        let mut children = BTreeMap::new();
        children.insert(child_name, node);
        node = if seg.has_keys() || schema.is_list(&seg_path) {
            for (k, v) in resolved_keys(seg, &seg_path, schema) {
                if !k.is_empty() {
                    children
                        .entry(k)
                        .or_insert_with(|| Node::Leaf(LeafValue::String(v)));
                }
            }
            Node::List(vec![Node::Container(children)])
        } else {
            Node::Container(children)
        };
        child_name = seg.name().to_string();
    }

    let mut root = BTreeMap::new();
    root.insert(child_name, node);
    Ok(Node::Container(root))
}

fn unwrap_wrapper(doc: Value, name: &str) -> Value {
    match doc {
        Value::Object(mut map) if map.len() == 1 => {
            let key = map.keys().next().cloned();
            match key {
                Some(k) if local_name(&k) == name => map.remove(&k).unwrap_or(Value::Null),
                _ => Value::Object(map),
            }
        }
        other => other,
    }
}

/// Removes every node a path addresses inside a module root container,
/// returning how many were removed. Lists left without entries are removed
/// from their parent.
pub(crate) fn remove_at(root: &mut Node, path: &Path, schema: &dyn SchemaContext) -> usize {
    remove_rec(root, path, 0, schema)
}

fn remove_rec(node: &mut Node, path: &Path, index: usize, schema: &dyn SchemaContext) -> usize {
    let Some(seg) = path.segments().get(index) else {
        return 0;
    };
    let last = index + 1 == path.depth();
    let Some(children) = node.as_container_mut() else {
        return 0;
    };
    let Some(child) = children.get_mut(seg.name()) else {
        return 0;
    };
    if last {
        if seg.has_keys() {
            if let Node::List(entries) = child {
                let keys = resolved_keys(seg, &path.truncated(index + 1).unkeyed(), schema);
                let before = entries.len();
                entries.retain(|e| !matches_key_values(e, &keys));
                let removed = before - entries.len();
                if entries.is_empty() && removed > 0 {
                    children.remove(seg.name());
                }
                return removed;
            }
            return 0;
        }
        return children.remove(seg.name()).map_or(0, |_| 1);
    }
    match child {
        Node::List(entries) => {
            let keys = resolved_keys(seg, &path.truncated(index + 1).unkeyed(), schema);
            let select_all = !seg.has_keys();
            let mut removed = 0;
            for entry in entries.iter_mut() {
                if select_all || matches_key_values(entry, &keys) {
                    removed += remove_rec(entry, path, index + 1, schema);
                }
            }
            removed
        }
        other => remove_rec(other, path, index + 1, schema),
    }
}
