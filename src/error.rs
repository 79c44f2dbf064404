// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Error types surfaced by the datastore.
//!
//! Every failure is synchronous and carries a descriptive message; nothing in
//! this crate retries internally. "Not found" is deliberately *not* an error
//! for reads and deletes, so callers can probe optimistically — see
//! [`DatastoreTransaction::read`](crate::DatastoreTransaction::read) and
//! [`DatastoreTransaction::delete`](crate::DatastoreTransaction::delete).

use crate::path::PathParseError;
use thiserror::Error;

/// Failures produced by [`Datastore`](crate::Datastore) and
/// [`DatastoreTransaction`](crate::DatastoreTransaction) operations.
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// The transaction reached a terminal state; no further operation is
    /// accepted on it.
    #[error("transaction already committed or aborted")]
    TransactionFinalized,

    /// Another transaction is open on this datastore. Transactions never
    /// queue; the caller must retry after the current one finishes.
    #[error("a transaction is already underway on this datastore")]
    TransactionUnderway,

    /// `commit` or `validate` was invoked on a transaction whose working
    /// forest is empty.
    #[error("nothing to commit, the transaction is empty")]
    NothingToCommit,

    /// The operation needs a module-qualified path but the first segment
    /// carries no module prefix.
    #[error("path `{0}` does not name a module")]
    MissingModule(String),

    /// A read addressed more than one node. Queries must target a unique
    /// element.
    #[error("path `{path}` matches {matched} nodes, queries must target a unique element")]
    AmbiguousPath { path: String, matched: usize },

    /// The supplied document cannot be interpreted at the given path.
    #[error("document at `{path}` is not usable: {reason}")]
    MalformedDocument { path: String, reason: String },

    /// A JSON value does not map onto the tree model (for example an array
    /// mixing objects and scalars).
    #[error("unsupported document shape: {0}")]
    UnsupportedDocument(String),

    /// Schema validation rejected one or more transaction roots.
    #[error("validation failed: {0}")]
    Invalid(String),

    /// A typed read could not decode the document at the path.
    #[error("cannot decode document at `{path}`: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },

    /// A document could not be rendered to JSON.
    #[error("cannot render document: {0}")]
    Render(#[from] serde_json::Error),

    /// A path string could not be parsed.
    #[error(transparent)]
    Path(#[from] PathParseError),
}
