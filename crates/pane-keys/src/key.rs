//! Compound store keys.
//!
//! Every record in the flat store is addressed by a comma-separated key whose
//! shape encodes its relationships:
//!
//! ```text
//! <view>                       View
//! <view>,<local>,<s|i|d>       Station / Item / Dummy
//! <view>,<local>,i,<index>     Link owned by an item
//! gifs | backgrounds | trash   Link-owning buckets
//! <bucket>,<index>             Link owned by a bucket
//! bookmarks | history | ...    Panel buckets
//! lastStationViewId            View id registry
//! journal                      Pending write plan
//! ```
//!
//! Keys are parsed segment by segment into [`StoreKey`]; nothing is inferred
//! from record contents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, Result};
use crate::ids::{parse_number, BucketKey, LinkBucket, PaneKind, ViewId};

/// Reserved key holding the registry of allocated view ids.
pub const VIEW_REGISTRY_KEY: &str = "lastStationViewId";

/// Reserved key holding the in-flight write plan.
pub const JOURNAL_KEY: &str = "journal";

/// Address of a station, item or dummy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneKey {
    pub view: ViewId,
    pub local: u64,
    pub kind: PaneKind,
}

impl PaneKey {
    pub fn new(view: ViewId, local: u64, kind: PaneKind) -> Self {
        Self { view, local, kind }
    }

    pub fn station(view: ViewId, local: u64) -> Self {
        Self::new(view, local, PaneKind::Station)
    }

    pub fn item(view: ViewId, local: u64) -> Self {
        Self::new(view, local, PaneKind::Item)
    }

    pub fn dummy(view: ViewId, local: u64) -> Self {
        Self::new(view, local, PaneKind::Dummy)
    }
}

impl fmt::Display for PaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.view, self.local, self.kind.code())
    }
}

impl FromStr for PaneKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<StoreKey>()? {
            StoreKey::Pane(pane) => Ok(pane),
            _ => Err(KeyError::Malformed {
                key: s.to_string(),
                reason: "expected <view>,<local>,<s|i|d>".into(),
            }),
        }
    }
}

/// Something that owns an ordered link collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkOwner {
    /// An item pane.
    Item { view: ViewId, local: u64 },
    /// The trash or one of the shared pools.
    Bucket(LinkBucket),
}

impl LinkOwner {
    pub fn item(view: ViewId, local: u64) -> Self {
        LinkOwner::Item { view, local }
    }

    pub fn trash() -> Self {
        LinkOwner::Bucket(LinkBucket::Trash)
    }

    /// Owner for a pane key; only items own links.
    pub fn from_pane(key: PaneKey) -> Result<Self> {
        match key.kind {
            PaneKind::Item => Ok(LinkOwner::item(key.view, key.local)),
            _ => Err(KeyError::LinksNotSupported(key.to_string())),
        }
    }

    /// The pane key of an item owner.
    pub fn pane(&self) -> Option<PaneKey> {
        match *self {
            LinkOwner::Item { view, local } => Some(PaneKey::item(view, local)),
            LinkOwner::Bucket(_) => None,
        }
    }

    pub fn is_trash(&self) -> bool {
        matches!(self, LinkOwner::Bucket(LinkBucket::Trash))
    }

    /// The link at `index` under this owner.
    pub fn link(self, index: u64) -> LinkKey {
        LinkKey { owner: self, index }
    }

    /// First segment of the owner key: a view id or a bucket name.
    pub fn root(&self) -> KeyRoot {
        match *self {
            LinkOwner::Item { view, .. } => KeyRoot::View(view),
            LinkOwner::Bucket(bucket) => KeyRoot::Bucket(bucket.bucket()),
        }
    }

    /// The store key of the owner's own record.
    pub fn store_key(&self) -> StoreKey {
        match *self {
            LinkOwner::Item { view, local } => StoreKey::Pane(PaneKey::item(view, local)),
            LinkOwner::Bucket(bucket) => StoreKey::Bucket(bucket.bucket()),
        }
    }
}

impl fmt::Display for LinkOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkOwner::Item { view, local } => write!(f, "{view},{local},i"),
            LinkOwner::Bucket(bucket) => f.write_str(bucket.name()),
        }
    }
}

impl FromStr for LinkOwner {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<StoreKey>()? {
            StoreKey::Pane(pane) => LinkOwner::from_pane(pane),
            StoreKey::Bucket(bucket) => Ok(LinkOwner::Bucket(LinkBucket::try_from(bucket)?)),
            _ => Err(KeyError::LinksNotSupported(s.to_string())),
        }
    }
}

/// Address of a single link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkKey {
    pub owner: LinkOwner,
    pub index: u64,
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.owner, self.index)
    }
}

impl FromStr for LinkKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<StoreKey>()? {
            StoreKey::Link(link) => Ok(link),
            _ => Err(KeyError::NotALinkKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for LinkKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<LinkKey> for String {
    fn from(key: LinkKey) -> Self {
        key.to_string()
    }
}

/// First segment of a rooted key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyRoot {
    View(ViewId),
    Bucket(BucketKey),
}

impl fmt::Display for KeyRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRoot::View(view) => write!(f, "{view}"),
            KeyRoot::Bucket(bucket) => f.write_str(bucket.name()),
        }
    }
}

/// Any key in the flat store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StoreKey {
    View(ViewId),
    Pane(PaneKey),
    Link(LinkKey),
    Bucket(BucketKey),
    ViewRegistry,
    Journal,
}

impl StoreKey {
    /// First segment of the key, if the key belongs to a view or bucket.
    pub fn root(&self) -> Option<KeyRoot> {
        match self {
            StoreKey::View(view) => Some(KeyRoot::View(*view)),
            StoreKey::Pane(pane) => Some(KeyRoot::View(pane.view)),
            StoreKey::Link(link) => Some(link.owner.root()),
            StoreKey::Bucket(bucket) => Some(KeyRoot::Bucket(*bucket)),
            StoreKey::ViewRegistry | StoreKey::Journal => None,
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::View(view) => write!(f, "{view}"),
            StoreKey::Pane(pane) => write!(f, "{pane}"),
            StoreKey::Link(link) => write!(f, "{link}"),
            StoreKey::Bucket(bucket) => f.write_str(bucket.name()),
            StoreKey::ViewRegistry => f.write_str(VIEW_REGISTRY_KEY),
            StoreKey::Journal => f.write_str(JOURNAL_KEY),
        }
    }
}

impl FromStr for StoreKey {
    type Err = KeyError;

    fn from_str(key: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(KeyError::Empty);
        }
        let malformed = |reason: &str| KeyError::Malformed {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        let segments: Vec<&str> = key.split(',').collect();

        match segments.as_slice() {
            [single] => {
                if *single == VIEW_REGISTRY_KEY {
                    Ok(StoreKey::ViewRegistry)
                } else if *single == JOURNAL_KEY {
                    Ok(StoreKey::Journal)
                } else if let Some(bucket) = BucketKey::from_name(single) {
                    Ok(StoreKey::Bucket(bucket))
                } else {
                    Ok(StoreKey::View(ViewId::new(parse_number(key, single)?)))
                }
            }
            [bucket, index] => {
                let bucket = BucketKey::from_name(bucket)
                    .ok_or_else(|| malformed("two-segment keys must start with a bucket name"))?;
                let owner = LinkOwner::Bucket(LinkBucket::try_from(bucket)?);
                Ok(StoreKey::Link(owner.link(parse_number(key, index)?)))
            }
            [view, local, kind] => Ok(StoreKey::Pane(PaneKey {
                view: ViewId::new(parse_number(key, view)?),
                local: parse_number(key, local)?,
                kind: PaneKind::from_code(kind)?,
            })),
            [view, local, kind, index] => {
                let pane = PaneKey {
                    view: ViewId::new(parse_number(key, view)?),
                    local: parse_number(key, local)?,
                    kind: PaneKind::from_code(kind)?,
                };
                let owner = LinkOwner::from_pane(pane)?;
                Ok(StoreKey::Link(owner.link(parse_number(key, index)?)))
            }
            _ => Err(malformed("too many segments")),
        }
    }
}

impl TryFrom<String> for StoreKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<StoreKey> for String {
    fn from(key: StoreKey) -> Self {
        key.to_string()
    }
}

impl From<ViewId> for StoreKey {
    fn from(view: ViewId) -> Self {
        StoreKey::View(view)
    }
}

impl From<PaneKey> for StoreKey {
    fn from(pane: PaneKey) -> Self {
        StoreKey::Pane(pane)
    }
}

impl From<LinkKey> for StoreKey {
    fn from(link: LinkKey) -> Self {
        StoreKey::Link(link)
    }
}

impl From<BucketKey> for StoreKey {
    fn from(bucket: BucketKey) -> Self {
        StoreKey::Bucket(bucket)
    }
}

impl From<LinkBucket> for StoreKey {
    fn from(bucket: LinkBucket) -> Self {
        StoreKey::Bucket(bucket.bucket())
    }
}

/// `"<viewId>,<localId>,<kind>"`.
pub fn encode_object_key(view: ViewId, local: u64, kind: PaneKind) -> String {
    PaneKey::new(view, local, kind).to_string()
}

/// `"<ownerKey>,<linkIndex>"`.
pub fn encode_link_key(owner: &LinkOwner, index: u64) -> String {
    owner.link(index).to_string()
}

/// The owner of the link addressed by `key`.
pub fn parse_owner_from_link_key(key: &str) -> Result<LinkOwner> {
    key.parse::<LinkKey>().map(|link| link.owner)
}

/// The first segment of `key`: the view id of a pane or link, or a bucket name.
pub fn parse_root_from_object_key(key: &str) -> Result<KeyRoot> {
    key.parse::<StoreKey>()?
        .root()
        .ok_or_else(|| KeyError::Unrooted(key.to_string()))
}
