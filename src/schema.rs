// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Schema knowledge the datastore depends on.
//!
//! The datastore itself is schema-agnostic: it only needs to know which
//! unkeyed paths address lists, which key leaves identify a list entry (in
//! declared order), and whether a module root is valid. That contract is
//! [`SchemaContext`]. Production deployments back it with a compiled model
//! registry; [`StaticSchema`] is a programmatic implementation for tests and
//! for consumers with a fixed, known model surface.

use crate::{document::Node, path::Path};
use std::collections::BTreeMap;
use thiserror::Error;

/// How strictly [`SchemaContext::validate`] should judge a module root.
///
/// Operational datastores hold whatever a device actually reports, and a
/// device rarely implements every optional part of a model. Mandatory-node
/// and leaf-reference checks are therefore relaxed in [`Permissive`] mode
/// and enforced only in [`Strict`] mode (config datastores).
///
/// [`Permissive`]: ValidationMode::Permissive
/// [`Strict`]: ValidationMode::Strict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Strict,
    Permissive,
}

/// A schema rule violation, reported with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SchemaViolation {
    message: String,
}

impl SchemaViolation {
    pub fn new(message: impl Into<String>) -> Self {
        SchemaViolation {
            message: message.into(),
        }
    }
}

/// Schema oracle consumed by the datastore.
///
/// Paths handed to `is_list` and `list_keys` are unkeyed; implementations
/// must compare them by module and segment names, not by prefix spelling.
pub trait SchemaContext: Send + Sync {
    /// Whether the unkeyed path addresses a list node.
    fn is_list(&self, path: &Path) -> bool;

    /// The declared key leaf names of the list at `path`, in declared
    /// order. Empty when `path` is not a known list.
    fn list_keys(&self, path: &Path) -> Vec<String>;

    /// Validates one module root. Called once per module root during
    /// transaction validation.
    fn validate(
        &self,
        module: &str,
        root: &Node,
        mode: ValidationMode,
    ) -> Result<(), SchemaViolation>;
}

/// A fixed, programmatic [`SchemaContext`].
///
/// ```
/// use yangstore::StaticSchema;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = StaticSchema::builder()
///     .list("/openconfig-interfaces:interfaces/interface", ["name"])
///     .mandatory("/openconfig-interfaces:interfaces/interface", "config")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    /// Canonical unkeyed path -> declared key leaf names.
    lists: BTreeMap<String, Vec<String>>,
    /// Canonical unkeyed path -> child node that must exist, strict mode
    /// only.
    mandatory: Vec<(String, String)>,
}

impl StaticSchema {
    pub fn builder() -> StaticSchemaBuilder {
        StaticSchemaBuilder::default()
    }

    /// Canonical lookup form: owning module plus unprefixed segment names.
    fn canonical(path: &Path) -> String {
        let mut out = String::new();
        for (i, seg) in path.segments().iter().enumerate() {
            out.push('/');
            if i == 0 {
                if let Some(module) = path.first_module_name() {
                    out.push_str(module);
                    out.push(':');
                }
            }
            out.push_str(seg.name());
        }
        out
    }

    /// All nodes addressed by the canonical path inside `root`, descending
    /// through every entry of intermediate lists.
    fn resolve_all<'a>(root: &'a Node, names: &[&str]) -> Vec<&'a Node> {
        let mut frontier = vec![root];
        for name in names {
            let mut next = Vec::new();
            for node in frontier {
                let Some(children) = node.as_container() else {
                    continue;
                };
                match children.get(*name) {
                    Some(Node::List(entries)) => next.extend(entries),
                    Some(child) => next.push(child),
                    None => {}
                }
            }
            frontier = next;
        }
        frontier
    }
}

impl SchemaContext for StaticSchema {
    fn is_list(&self, path: &Path) -> bool {
        self.lists.contains_key(&Self::canonical(path))
    }

    fn list_keys(&self, path: &Path) -> Vec<String> {
        self.lists
            .get(&Self::canonical(path))
            .cloned()
            .unwrap_or_default()
    }

    fn validate(
        &self,
        module: &str,
        root: &Node,
        mode: ValidationMode,
    ) -> Result<(), SchemaViolation> {
        if mode == ValidationMode::Permissive {
            return Ok(());
        }
        for (canonical, child) in &self.mandatory {
            let Some(rest) = canonical.strip_prefix('/') else {
                continue;
            };
            let mut names: Vec<&str> = rest.split('/').collect();
            let Some(first) = names.first_mut() else {
                continue;
            };
            let Some((rule_module, first_name)) = first.split_once(':') else {
                continue;
            };
            if rule_module != module {
                continue;
            }
            *first = first_name;
            for node in Self::resolve_all(root, &names) {
                let present = node
                    .as_container()
                    .is_some_and(|children| children.contains_key(child));
                if !present {
                    return Err(SchemaViolation::new(format!(
                        "missing mandatory node `{child}` under `{canonical}`"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`StaticSchema`]. Path strings are parsed on `build`.
#[derive(Debug, Default)]
pub struct StaticSchemaBuilder {
    lists: Vec<(String, Vec<String>)>,
    mandatory: Vec<(String, String)>,
}

impl StaticSchemaBuilder {
    /// Declares the list at `path` and its key leaves in declared order.
    pub fn list(
        mut self,
        path: &str,
        keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.lists
            .push((path.to_string(), keys.into_iter().map(Into::into).collect()));
        self
    }

    /// Requires `child` to exist under every node at `path` (strict mode
    /// only).
    pub fn mandatory(mut self, path: &str, child: &str) -> Self {
        self.mandatory.push((path.to_string(), child.to_string()));
        self
    }

    pub fn build(self) -> Result<StaticSchema, crate::path::PathParseError> {
        let mut schema = StaticSchema::default();
        for (path, keys) in self.lists {
            let parsed = Path::parse(&path)?;
            schema
                .lists
                .insert(StaticSchema::canonical(&parsed.unkeyed()), keys);
        }
        for (path, child) in self.mandatory {
            let parsed = Path::parse(&path)?;
            schema
                .mandatory
                .push((StaticSchema::canonical(&parsed.unkeyed()), child));
        }
        Ok(schema)
    }
}
