//! Flat key-value persistence for the Pane start-page store.
//!
//! The start-page store keeps every view, pane and link in one flat mapping
//! from string key to JSON value. This crate defines that persistence seam
//! and the backends that implement it.
//!
//! # Storage Backends
//!
//! All backends implement the [`KvStore`] trait:
//!
//! - [`InMemoryKv`] -- `BTreeMap`-based store for tests and embedding
//! - [`JsonFileKv`] -- single JSON document on disk, replaced atomically
//!
//! # Rules
//!
//! 1. Lookups are by exact key or "get all"; there is no query capability.
//! 2. Each call applies its whole batch; nothing spans two calls.
//! 3. Values are opaque JSON; the store never interprets them.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{KvError, KvResult};
pub use file::JsonFileKv;
pub use memory::InMemoryKv;
pub use traits::{Entries, KvStore};
