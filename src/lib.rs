// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # yangstore: A Transactional Datastore for YANG-Modelled Device State
//!
//! This crate implements the in-memory, tree-structured document store used
//! by network-device management gateways: per-module document forests with
//! snapshot isolation, structural diffing of a transaction against the last
//! committed state, and routing of those diffs onto application-registered
//! path subscriptions.
//!
//! ## Core Concepts
//!
//! - [`Path`]: a parsed, structured address such as
//!   `/openconfig-interfaces:interfaces/interface[name='0/2']/state`. Paths
//!   compare structurally, so different module-prefix spellings of the same
//!   logical address are equal.
//! - [`Datastore`]: owns two forests of per-module document trees — the
//!   durable "committed" forest and a working "transaction" forest — and
//!   hands out at most one live [`DatastoreTransaction`] at a time. A
//!   datastore is either [operational](Datastore::operational) (holds what
//!   a device reports, validated permissively) or
//!   [config](Datastore::config) (holds intent, validated strictly).
//! - [`DatastoreTransaction`]: the unit of work. Opening one deep-copies
//!   every committed root; reads, merges, deletes and overwrites act on the
//!   copy; [`commit`](DatastoreTransaction::commit) validates and promotes
//!   it in one logical step, [`abort`](DatastoreTransaction::abort)
//!   discards it, and dropping an open transaction rolls back.
//! - [`DatastoreDiff`]: one semantic change — `(before, after, type, path)`
//!   — produced by [`diff`](DatastoreTransaction::diff)ing the working
//!   forest against the committed one.
//! - [`DiffPath`] / [`DiffResult`]: registered watch paths and the result
//!   of [`diff_routed`](DatastoreTransaction::diff_routed), which re-scopes
//!   raw diffs to each watcher's granularity and reports unclaimed changes
//!   as unhandled.
//! - [`SchemaContext`]: the schema oracle the datastore consults for list
//!   detection, declared key order and validation. [`StaticSchema`] is a
//!   programmatic implementation; production gateways back it with a
//!   compiled model registry.
//!
//! Documents cross the API boundary as [`serde_json::Value`]s, wrapped the
//! way NETCONF-style gateways expect: a read of `.../state` returns
//! `{"<module>:state": {...}}`, and list entries render as single-element
//! arrays.
//!
//! ## Getting Started
//!
//! ```
//! use serde_json::json;
//! use yangstore::{Datastore, DiffPath, DiffType, StaticSchema};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = StaticSchema::builder()
//!     .list("/openconfig-interfaces:interfaces/interface", ["name"])
//!     .build()?;
//! let store = Datastore::operational(schema);
//!
//! // Commit an initial document.
//! let mut tx = store.new_tx()?;
//! tx.overwrite(&"/".parse()?, json!({
//!     "openconfig-interfaces:interfaces": {
//!         "interface": [
//!             { "name": "0/1", "state": { "oper-status": "DOWN" } }
//!         ]
//!     }
//! }))?;
//! tx.commit()?;
//!
//! // Change one leaf in a second transaction and inspect the diff.
//! let mut tx = store.new_tx()?;
//! tx.merge(
//!     &"/openconfig-interfaces:interfaces/interface[name='0/1']/state".parse()?,
//!     json!({ "openconfig-interfaces:state": { "oper-status": "UP" } }),
//! )?;
//!
//! let watch: yangstore::Path =
//!     "/openconfig-interfaces:interfaces/interface/state".parse()?;
//! let routed = tx.diff_routed(&[DiffPath::new(watch.clone(), false)])?;
//! let diffs = &routed.diffs[&watch];
//! assert_eq!(diffs[0].kind, DiffType::Update);
//! assert_eq!(
//!     diffs[0].before,
//!     json!({ "openconfig-interfaces:state": { "oper-status": "DOWN" } })
//! );
//! assert_eq!(
//!     diffs[0].after,
//!     json!({ "openconfig-interfaces:state": { "oper-status": "UP" } })
//! );
//!
//! tx.commit()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Contract
//!
//! The datastore is single-writer and synchronous. `new_tx` fails
//! immediately while a transaction is open — conflicting callers never
//! queue. Committed-side reads ([`Datastore::read_committed`]) are safe at
//! any time because committed roots are untouched until a commit, and the
//! two forests never share nodes: duplication at transaction start is a
//! deep copy, and promotion on commit transfers ownership wholesale.
//!
//! ## Scope of this Crate
//!
//! This crate is the datastore core only. It does not speak NETCONF or
//! gRPC, does not parse device CLIs, and does not compile YANG models —
//! schema knowledge arrives through the [`SchemaContext`] trait, and
//! transports live in the surrounding gateway.

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod datastore;
pub mod diff;
pub mod document;
pub mod error;
pub mod path;
pub mod schema;
mod store;
pub mod subscription;
pub mod transaction;

pub use datastore::{Datastore, DatastoreKind};
pub use diff::{DatastoreDiff, DiffType};
pub use document::{LeafValue, Node};
pub use error::DatastoreError;
pub use path::{Path, PathParseError, Segment};
pub use schema::{SchemaContext, SchemaViolation, StaticSchema, ValidationMode};
pub use subscription::{DiffPath, DiffResult};
pub use transaction::DatastoreTransaction;
