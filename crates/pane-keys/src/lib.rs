//! Key addressing for the Pane start-page store.
//!
//! The store is one flat mapping from string key to JSON record. There is no
//! index: the key itself encodes which view a pane lives in and which item or
//! bucket owns a link. This crate turns those strings into typed values and
//! back.
//!
//! # Key Types
//!
//! - [`ViewId`] -- a canvas
//! - [`PaneKey`] -- a station, item or dummy inside a view
//! - [`LinkKey`] / [`LinkOwner`] -- a link and the item or bucket that owns it
//! - [`BucketKey`] -- singleton buckets (`trash`, `gifs`, `history`, ...)
//! - [`StoreKey`] -- the sum of all of the above plus the reserved keys

pub mod error;
pub mod ids;
pub mod key;

pub use error::{KeyError, Result};
pub use ids::{BucketKey, LinkBucket, PaneKind, ViewId};
pub use key::{
    encode_link_key, encode_object_key, parse_owner_from_link_key, parse_root_from_object_key,
    KeyRoot, LinkKey, LinkOwner, PaneKey, StoreKey, JOURNAL_KEY, VIEW_REGISTRY_KEY,
};
