//! Hierarchical start-page store for Pane.
//!
//! Views hold stations, items and dummies; stations open child views; items
//! and the shared buckets own ordered link lists. Everything is persisted in
//! a flat [`KvStore`](pane_kv::KvStore) under the compound keys of
//! [`pane_keys`], and this crate keeps the records and their references
//! consistent.
//!
//! # Operations
//!
//! - Views and panes: create, rename, move, resize, icon, delete, reparent
//! - Links: add, rename, re-icon, move to trash, restore, purge
//! - Trash and pools: list, empty, pick an image as background or icon
//! - Whole store: init, recover, validate, export, import
//!
//! # Rules
//!
//! 1. Ids inside a collection are `max + 1`; gaps are never refilled.
//! 2. View ids come from one registry and are never reused while live.
//! 3. Deleting an item moves every link to the trash before anything goes.
//! 4. A station is deleted only when the view it opens is empty.
//! 5. Multi-step writes are journaled and completed by `recover` after a crash.

pub mod alloc;
pub mod config;
pub mod error;
pub mod export;
pub mod journal;
pub mod links;
pub mod objects;
pub mod pools;
pub mod records;
pub mod store;
pub mod validation;

pub use alloc::allocate_local_id;
pub use config::{DefaultIcons, PaneSize, SeedLink, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use export::{ExportDocument, ImportMode, EXPORT_FORMAT_VERSION};
pub use journal::{Step, WritePlan};
pub use links::IconTarget;
pub use objects::DeleteOutcome;
pub use pools::PickTarget;
pub use records::{Bucket, LinkRecord, Pane, PaneBase, PaneBody, Position, View, ViewRegistry};
pub use store::{HierarchicalStore, InitReport};
pub use validation::{StoreValidator, ValidationReport, Violation, ViolationKind};
