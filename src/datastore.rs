// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The datastore façade: one tree store, at most one open transaction.

use crate::{
    document::read_wrapped,
    error::DatastoreError,
    path::Path,
    schema::{SchemaContext, ValidationMode},
    store::DatastoreState,
    transaction::DatastoreTransaction,
};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// What a datastore holds, and how strictly it validates.
///
/// An operational datastore mirrors whatever a device reports and validates
/// permissively; a config datastore holds intended state and validates
/// strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreKind {
    Operational,
    Config,
}

impl DatastoreKind {
    pub(crate) fn validation_mode(self) -> ValidationMode {
        match self {
            DatastoreKind::Operational => ValidationMode::Permissive,
            DatastoreKind::Config => ValidationMode::Strict,
        }
    }
}

/// A transactional, hierarchical document store.
///
/// Owns the committed and transaction forests and serializes access to a
/// single live [`DatastoreTransaction`]. Opening a second transaction while
/// one is live fails immediately — transactions never queue.
///
/// ```
/// use serde_json::json;
/// use yangstore::{Datastore, StaticSchema};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = StaticSchema::builder()
///     .list("/openconfig-interfaces:interfaces/interface", ["name"])
///     .build()?;
/// let store = Datastore::operational(schema);
///
/// let mut tx = store.new_tx()?;
/// tx.overwrite(&"/".parse()?, json!({
///     "openconfig-interfaces:interfaces": {
///         "interface": [ { "name": "0/1", "config": { "mtu": 1500 } } ]
///     }
/// }))?;
/// tx.commit()?;
///
/// let tx = store.new_tx()?;
/// let doc = tx.read(&"/openconfig-interfaces:interfaces/interface[name='0/1']/config".parse()?)?;
/// assert_eq!(doc, json!({ "openconfig-interfaces:config": { "mtu": 1500 } }));
/// # Ok(())
/// # }
/// ```
pub struct Datastore {
    kind: DatastoreKind,
    schema: Arc<dyn SchemaContext>,
    state: Arc<Mutex<DatastoreState>>,
}

impl Datastore {
    /// Creates a datastore of the given kind backed by `schema`.
    pub fn new(kind: DatastoreKind, schema: impl SchemaContext + 'static) -> Self {
        Datastore {
            kind,
            schema: Arc::new(schema),
            state: Arc::new(Mutex::new(DatastoreState::new())),
        }
    }

    /// An operational (device-reported state) datastore.
    pub fn operational(schema: impl SchemaContext + 'static) -> Self {
        Datastore::new(DatastoreKind::Operational, schema)
    }

    /// A config (intended state) datastore.
    pub fn config(schema: impl SchemaContext + 'static) -> Self {
        Datastore::new(DatastoreKind::Config, schema)
    }

    pub fn kind(&self) -> DatastoreKind {
        self.kind
    }

    /// Opens a transaction, duplicating every committed root into the
    /// working forest.
    ///
    /// Fails with [`DatastoreError::TransactionUnderway`] if a transaction
    /// is already open; no transaction object is constructed in that case.
    pub fn new_tx(&self) -> Result<DatastoreTransaction, DatastoreError> {
        {
            let mut state = lock(&self.state);
            if state.transaction_underway {
                return Err(DatastoreError::TransactionUnderway);
            }
            state.transaction_underway = true;
            state.duplicate_for_transaction();
        }
        debug!(kind = ?self.kind, "transaction opened");
        Ok(DatastoreTransaction::new(
            Arc::clone(&self.state),
            Arc::clone(&self.schema),
            self.kind,
        ))
    }

    /// Reads the committed side without holding the open transaction.
    /// Committed data is untouched until a commit, so this is safe while a
    /// transaction is live.
    pub fn read_committed(&self, path: &Path) -> Result<Value, DatastoreError> {
        let state = lock(&self.state);
        read_wrapped(state.committed(), path, self.schema.as_ref())
    }
}

/// Lock helper that survives poisoning: state mutations are small and never
/// leave the forests half-written.
pub(crate) fn lock(state: &Mutex<DatastoreState>) -> MutexGuard<'_, DatastoreState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
