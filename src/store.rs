// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Ownership of the committed and transaction forests.
//!
//! [`DatastoreState`] is the single mutable heart of a datastore: the
//! last-known-good ("committed") forest, the working-copy ("transaction")
//! forest, and the single-writer flag. Roots are keyed by module name and
//! iterated in name order, so diff output is reproducible. A missing module
//! is represented by absence, never by an error — callers treat "this module
//! was never written" as a valid state.

use crate::document::{Forest, Node};
use std::mem;

#[derive(Debug, Default)]
pub(crate) struct DatastoreState {
    committed: Forest,
    transaction: Forest,
    pub(crate) transaction_underway: bool,
}

impl DatastoreState {
    pub(crate) fn new() -> Self {
        DatastoreState::default()
    }

    /// Deep-copies every committed root into the transaction forest. Called
    /// once when a transaction opens; the two forests never share nodes.
    pub(crate) fn duplicate_for_transaction(&mut self) {
        self.transaction = self.committed.clone();
    }

    pub(crate) fn committed(&self) -> &Forest {
        &self.committed
    }

    pub(crate) fn transaction(&self) -> &Forest {
        &self.transaction
    }

    pub(crate) fn transaction_mut(&mut self) -> &mut Forest {
        &mut self.transaction
    }

    pub(crate) fn get_transaction_root_mut(&mut self, module: &str) -> Option<&mut Node> {
        self.transaction.get_mut(module)
    }

    /// Drops one module's transaction root. Returns whether it existed.
    pub(crate) fn free_transaction_root(&mut self, module: &str) -> bool {
        self.transaction.remove(module).is_some()
    }

    /// Drops the whole transaction forest.
    pub(crate) fn free_transaction_roots(&mut self) {
        self.transaction.clear();
    }

    /// Promotes the transaction forest to committed. The old committed
    /// roots are released first so at no point do three copies exist.
    pub(crate) fn promote_transaction(&mut self) {
        self.committed.clear();
        self.committed = mem::take(&mut self.transaction);
    }

    /// True iff no module has a transaction root (nothing was written, or
    /// everything was deleted).
    pub(crate) fn nothing_in_transaction(&self) -> bool {
        self.transaction.is_empty()
    }

    /// The union of module names on either side, each paired with its
    /// committed and transaction root, in module-name order. This is the
    /// iteration contract the diff engine consumes.
    pub(crate) fn root_pairs(&self) -> Vec<(&str, Option<&Node>, Option<&Node>)> {
        let mut modules: Vec<&str> = self
            .committed
            .keys()
            .chain(self.transaction.keys())
            .map(String::as_str)
            .collect();
        modules.sort_unstable();
        modules.dedup();
        modules
            .into_iter()
            .map(|m| {
                (
                    m,
                    self.committed.get(m),
                    self.transaction.get(m),
                )
            })
            .collect()
    }
}
