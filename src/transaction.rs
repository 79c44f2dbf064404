// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The unit of work against a datastore.
//!
//! A [`DatastoreTransaction`] works on a private deep copy of the committed
//! forests. Reads see the transaction's own uncommitted changes; the
//! committed side stays untouched until [`commit`](DatastoreTransaction::commit)
//! promotes the working forest in one logical step. Dropping an open
//! transaction rolls it back and releases the single-writer slot — the
//! safety net for callers that forget explicit lifecycle management, not a
//! replacement for it.
//!
//! The state machine is Open → Committed | Aborted. Terminal states absorb
//! every further call as [`DatastoreError::TransactionFinalized`].

use crate::{
    datastore::{DatastoreKind, lock},
    diff::{DatastoreDiff, diff_roots},
    document::{
        forest_from_json, forest_to_json, fragment_for_path, merge_into_forest, read_wrapped,
        remove_at,
    },
    error::DatastoreError,
    path::Path,
    schema::SchemaContext,
    store::DatastoreState,
    subscription::{DiffPath, DiffResult, route},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// A read/write transaction over one datastore's working forest.
///
/// Constructed only through [`Datastore::new_tx`](crate::Datastore::new_tx),
/// which enforces that at most one transaction is open per datastore.
pub struct DatastoreTransaction {
    state: Arc<Mutex<DatastoreState>>,
    schema: Arc<dyn SchemaContext>,
    kind: DatastoreKind,
    finalized: bool,
}

impl DatastoreTransaction {
    pub(crate) fn new(
        state: Arc<Mutex<DatastoreState>>,
        schema: Arc<dyn SchemaContext>,
        kind: DatastoreKind,
    ) -> Self {
        DatastoreTransaction {
            state,
            schema,
            kind,
            finalized: false,
        }
    }

    fn guard(&self) -> Result<(), DatastoreError> {
        if self.finalized {
            Err(DatastoreError::TransactionFinalized)
        } else {
            Ok(())
        }
    }

    /// Reads the unique node at `path` from the working forest.
    ///
    /// Returns `{}` when nothing matches; fails when the path matches more
    /// than one node or names no module.
    pub fn read(&self, path: &Path) -> Result<Value, DatastoreError> {
        self.guard()?;
        let state = lock(&self.state);
        read_wrapped(state.transaction(), path, self.schema.as_ref())
    }

    /// Like [`read`](Self::read), but against the committed forest — the
    /// "before" view, unaffected by this transaction's writes.
    pub fn read_committed(&self, path: &Path) -> Result<Value, DatastoreError> {
        self.guard()?;
        let state = lock(&self.state);
        read_wrapped(state.committed(), path, self.schema.as_ref())
    }

    /// Reads and decodes the document at `path`. `None` when nothing
    /// matches. List reads decode as sequences.
    pub fn read_as<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, DatastoreError> {
        let doc = self.read(path)?;
        let Value::Object(map) = doc else {
            return Ok(None);
        };
        let Some((_, inner)) = map.into_iter().next() else {
            return Ok(None);
        };
        serde_json::from_value(inner)
            .map(Some)
            .map_err(|source| DatastoreError::Decode {
                path: path.to_string(),
                source,
            })
    }

    /// Structurally merges a document at `path` into the working forest.
    ///
    /// The document may be wrapped the way [`read`](Self::read) returns it
    /// or be a bare fragment; the ancestor chain implied by `path` is
    /// reconstructed around it, with list keys injected as leaves. Fields
    /// absent from the document are left untouched.
    pub fn merge(&mut self, path: &Path, doc: Value) -> Result<(), DatastoreError> {
        self.guard()?;
        trace!(%path, "merge");
        if path.is_root() {
            let fragment = forest_from_json(doc)?;
            let mut state = lock(&self.state);
            for (module, root) in fragment {
                merge_into_forest(state.transaction_mut(), &module, root, self.schema.as_ref());
            }
            return Ok(());
        }
        let Some(module) = path.first_module_name().map(str::to_string) else {
            return Err(DatastoreError::MissingModule(path.to_string()));
        };
        let fragment = fragment_for_path(path, doc, self.schema.as_ref())?;
        let mut state = lock(&self.state);
        merge_into_forest(state.transaction_mut(), &module, fragment, self.schema.as_ref());
        Ok(())
    }

    /// [`merge`](Self::merge) for any serializable value.
    pub fn merge_as<T: Serialize>(&mut self, path: &Path, value: &T) -> Result<(), DatastoreError> {
        let doc = serde_json::to_value(value)?;
        self.merge(path, doc)
    }

    /// Deletes whatever `path` addresses from the working forest.
    ///
    /// Returns `Ok(false)` when nothing matched — probing for absent data
    /// is not an error. The root path clears the whole working forest; a
    /// depth-one path frees that module's entire root.
    pub fn delete(&mut self, path: &Path) -> Result<bool, DatastoreError> {
        self.guard()?;
        trace!(%path, "delete");
        let mut state = lock(&self.state);
        if path.is_root() {
            let had_roots = !state.nothing_in_transaction();
            state.free_transaction_roots();
            return Ok(had_roots);
        }
        let Some(module) = path.first_module_name().map(str::to_string) else {
            return Err(DatastoreError::MissingModule(path.to_string()));
        };
        if path.depth() == 1 {
            return Ok(state.free_transaction_root(&module));
        }
        let Some(root) = state.get_transaction_root_mut(&module) else {
            return Ok(false);
        };
        let removed = remove_at(root, path, self.schema.as_ref());
        if root.is_empty_container() {
            state.free_transaction_root(&module);
        }
        Ok(removed > 0)
    }

    /// Replace semantics: [`delete`](Self::delete) then
    /// [`merge`](Self::merge).
    pub fn overwrite(&mut self, path: &Path, doc: Value) -> Result<(), DatastoreError> {
        self.delete(path)?;
        self.merge(path, doc)
    }

    /// [`overwrite`](Self::overwrite) for any serializable value.
    pub fn overwrite_as<T: Serialize>(
        &mut self,
        path: &Path,
        value: &T,
    ) -> Result<(), DatastoreError> {
        let doc = serde_json::to_value(value)?;
        self.overwrite(path, doc)
    }

    /// Runs schema validation over every working root.
    ///
    /// Fails when nothing has been written, and aggregates every module's
    /// violation into one error. Operational datastores validate
    /// permissively, config datastores strictly.
    pub fn validate(&self) -> Result<(), DatastoreError> {
        self.guard()?;
        let state = lock(&self.state);
        if state.nothing_in_transaction() {
            return Err(DatastoreError::NothingToCommit);
        }
        let mode = self.kind.validation_mode();
        let mut failures = Vec::new();
        for (module, root) in state.transaction() {
            if let Err(violation) = self.schema.validate(module, root, mode) {
                failures.push(format!("{module}: {violation}"));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DatastoreError::Invalid(failures.join("; ")))
        }
    }

    /// Validates, then atomically promotes the working forest to committed
    /// and releases the single-writer slot.
    ///
    /// Nothing is promoted if validation fails; the transaction stays open.
    pub fn commit(&mut self) -> Result<(), DatastoreError> {
        self.validate()?;
        let mut state = lock(&self.state);
        let modules: Vec<String> = state.transaction().keys().cloned().collect();
        state.promote_transaction();
        state.transaction_underway = false;
        drop(state);
        self.finalized = true;
        debug!(?modules, "transaction committed");
        Ok(())
    }

    /// Discards the working forest and releases the single-writer slot.
    pub fn abort(&mut self) -> Result<(), DatastoreError> {
        self.guard()?;
        let mut state = lock(&self.state);
        state.free_transaction_roots();
        state.transaction_underway = false;
        drop(state);
        self.finalized = true;
        debug!("transaction aborted");
        Ok(())
    }

    /// The structural diff of the working forest against the committed
    /// forest, keyed by each change's full path.
    pub fn diff(&self) -> Result<BTreeMap<Path, DatastoreDiff>, DatastoreError> {
        self.guard()?;
        let state = lock(&self.state);
        Ok(diff_roots(&state.root_pairs(), self.schema.as_ref()))
    }

    /// [`diff`](Self::diff) routed over registered watch paths; see
    /// [`crate::subscription`].
    pub fn diff_routed(&self, registered: &[DiffPath]) -> Result<DiffResult, DatastoreError> {
        self.guard()?;
        let state = lock(&self.state);
        let raw = diff_roots(&state.root_pairs(), self.schema.as_ref());
        route(
            raw,
            registered,
            state.committed(),
            state.transaction(),
            self.schema.as_ref(),
        )
    }

    /// Pretty-printed JSON of the whole working forest, for logging.
    pub fn dump(&self) -> Result<String, DatastoreError> {
        self.guard()?;
        let state = lock(&self.state);
        Ok(serde_json::to_string_pretty(&forest_to_json(
            state.transaction(),
        ))?)
    }
}

impl Drop for DatastoreTransaction {
    /// Implicit abort: best-effort cleanup that never panics.
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        let mut state = lock(&self.state);
        state.free_transaction_roots();
        state.transaction_underway = false;
        drop(state);
        warn!("transaction dropped while open, rolled back");
    }
}
