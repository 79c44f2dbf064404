// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Routing of raw diffs onto registered watch paths.
//!
//! Consumers register the paths they care about as [`DiffPath`]es; the
//! router maps every raw diff entry onto the registrations it satisfies and
//! re-scopes the result to the registration's granularity. Three mechanisms
//! cooperate:
//!
//! 1. **Splitting**: a created or deleted subtree is re-announced at every
//!    nested container and list entry it contains, so a watch registered
//!    deep inside a freshly created subtree still fires with a diff scoped
//!    to its own node. Split candidates keep the enclosing document intact.
//! 2. **Matching**: subtree-covering registrations match any structural
//!    descendant. Without the subtree flag, create and delete diffs match
//!    only registrations structurally equal to the candidate path (prefixes
//!    and keys ignored), and update diffs match their deepest registered
//!    ancestor, no more than one segment above the change. Each candidate
//!    is claimed by at most one registration, exact matches taking
//!    precedence over subtree coverage; an exact match promotes the
//!    registration to subtree coverage for the remainder of that raw diff.
//! 3. **Unification**: the first match at a given unified path re-reads the
//!    whole before/after documents at that path, so the watcher sees its
//!    full surrounding context rather than the elementary change; later
//!    candidates unifying to the same path pass through unchanged.
//!
//! Diff entries no registration claims are reported as unhandled, keyed by
//! their concrete (keyed) paths.

use crate::{
    diff::{DatastoreDiff, DiffType},
    document::{Forest, json_key_string, local_name, read_wrapped},
    error::DatastoreError,
    path::{Path, Segment},
    schema::SchemaContext,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A registered watch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPath {
    pub path: Path,
    /// Whether the watch also covers every descendant of `path`. The
    /// router may enable this internally after an exact match; it never
    /// clears a flag the registrant set.
    pub subtree: bool,
}

impl DiffPath {
    pub fn new(path: Path, subtree: bool) -> Self {
        DiffPath { path, subtree }
    }
}

/// The outcome of routing a transaction's diff over registered watches.
#[derive(Debug, Default)]
pub struct DiffResult {
    /// Matched diffs keyed by the registered path, in registration
    /// spelling; several diffs may land under one registration.
    pub diffs: BTreeMap<Path, Vec<DatastoreDiff>>,
    /// Concrete paths of diff entries no registration matched.
    pub unhandled: Vec<Path>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty() && self.unhandled.is_empty()
    }
}

/// Routes raw diffs onto the registered paths.
pub(crate) fn route(
    raw: BTreeMap<Path, DatastoreDiff>,
    registered: &[DiffPath],
    committed: &Forest,
    transaction: &Forest,
    schema: &dyn SchemaContext,
) -> Result<DiffResult, DatastoreError> {
    let mut result = DiffResult::default();
    let mut used: BTreeSet<Path> = BTreeSet::new();

    for diff in raw.into_values() {
        let candidates = match diff.kind {
            DiffType::Update => vec![diff],
            DiffType::Create | DiffType::Delete => split_candidates(diff, schema),
        };
        // Promotions are scoped to this raw diff.
        let mut watches: Vec<DiffPath> = registered.to_vec();

        for candidate in candidates {
            let mut matched = false;
            match candidate.kind {
                DiffType::Update => {
                    if let Some(i) = best_update_watch(&candidate.path, &watches) {
                        emit(
                            &mut result,
                            &mut used,
                            &watches[i].path,
                            &candidate,
                            committed,
                            transaction,
                            schema,
                        )?;
                        matched = true;
                    }
                }
                DiffType::Create | DiffType::Delete => {
                    // A candidate is claimed by at most one registration:
                    // an exact match wins over subtree coverage, earlier
                    // registrations win within each kind.
                    let exact = watches
                        .iter()
                        .position(|w| candidate.path.equals_unprefixed_unkeyed(&w.path));
                    let chosen = exact.or_else(|| {
                        watches.iter().position(|w| {
                            w.subtree && candidate.path.is_descendant_of_unprefixed(&w.path)
                        })
                    });
                    if let Some(i) = chosen {
                        if exact.is_some() {
                            watches[i].subtree = true;
                        }
                        emit(
                            &mut result,
                            &mut used,
                            &watches[i].path,
                            &candidate,
                            committed,
                            transaction,
                            schema,
                        )?;
                        matched = true;
                    }
                }
            }
            if !matched {
                result.unhandled.push(candidate.path);
            }
        }
    }
    Ok(result)
}

/// The deepest registered ancestor-or-equal of an update's path, bounded to
/// one segment above the change unless the watch covers subtrees. Ties keep
/// the first registration, preserving input order.
fn best_update_watch(path: &Path, watches: &[DiffPath]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, watch) in watches.iter().enumerate() {
        let Some(distance) = path.segment_distance(&watch.path) else {
            continue;
        };
        if !watch.subtree && distance > 1 {
            continue;
        }
        if best.is_none_or(|j| watches[j].path.depth() < watch.path.depth()) {
            best = Some(i);
        }
    }
    best
}

fn emit(
    result: &mut DiffResult,
    used: &mut BTreeSet<Path>,
    watch_path: &Path,
    candidate: &DatastoreDiff,
    committed: &Forest,
    transaction: &Forest,
    schema: &dyn SchemaContext,
) -> Result<(), DatastoreError> {
    let unified = if candidate.path.depth() > watch_path.depth() {
        candidate.path.truncated(watch_path.depth())
    } else {
        candidate.path.clone()
    };
    let entry = if used.insert(unified.clone()) {
        DatastoreDiff {
            before: read_wrapped(committed, &unified, schema)?,
            after: read_wrapped(transaction, &unified, schema)?,
            kind: candidate.kind,
            path: unified,
        }
    } else {
        candidate.clone()
    };
    result
        .diffs
        .entry(watch_path.clone())
        .or_default()
        .push(entry);
    Ok(())
}

/// Re-announces a created/deleted subtree at every nested container and
/// list entry. The candidate list starts with the diff itself; appended
/// segments come from the document's plain keys, and list entries carry
/// their key leaf values in declared order. Candidates keep the base
/// diff's documents unchanged — only their paths are scoped.
fn split_candidates(diff: DatastoreDiff, schema: &dyn SchemaContext) -> Vec<DatastoreDiff> {
    let doc = match diff.kind {
        DiffType::Delete => diff.before.clone(),
        _ => diff.after.clone(),
    };
    let base_path = diff.path.clone();
    let template = diff.clone();
    let mut out = vec![diff];
    split_walk(&doc, &base_path, &template, schema, &mut out);
    out
}

fn split_walk(
    value: &Value,
    at: &Path,
    template: &DatastoreDiff,
    schema: &dyn SchemaContext,
    out: &mut Vec<DatastoreDiff>,
) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        match child {
            Value::Object(_) => {
                let path = at.join(Segment::new(local_name(key)));
                out.push(rescoped(template, path.clone()));
                split_walk(child, &path, template, schema, out);
            }
            Value::Array(items) => {
                let list_path = at.join(Segment::new(local_name(key)));
                let declared = schema.list_keys(&list_path.unkeyed());
                for item in items {
                    let Value::Object(entry) = item else {
                        continue;
                    };
                    let keys: Vec<(String, String)> = declared
                        .iter()
                        .filter_map(|k| {
                            entry.get(k).and_then(json_key_string).map(|v| (k.clone(), v))
                        })
                        .collect();
                    let path = list_path.with_last_segment_keys(keys);
                    out.push(rescoped(template, path.clone()));
                    split_walk(item, &path, template, schema, out);
                }
            }
            _ => {}
        }
    }
}

fn rescoped(template: &DatastoreDiff, path: Path) -> DatastoreDiff {
    DatastoreDiff {
        before: template.before.clone(),
        after: template.after.clone(),
        kind: template.kind,
        path,
    }
}
