use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, Result};

/// Identifier of a View (a canvas of panes).
///
/// View ids are small non-negative integers. The root canvas is conventionally
/// view `0`; every other view is allocated when a station is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(u64);

impl ViewId {
    /// The root canvas.
    pub const ROOT: ViewId = ViewId(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id immediately after this one, if there is one.
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ViewId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        parse_number(s, s).map(Self)
    }
}

impl From<u64> for ViewId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The three kinds of pane that live inside a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaneKind {
    /// Navigates into a child view.
    Station,
    /// Owns an ordered collection of links.
    Item,
    /// Decoration only.
    Dummy,
}

impl PaneKind {
    pub const ALL: [PaneKind; 3] = [PaneKind::Station, PaneKind::Item, PaneKind::Dummy];

    /// The single-letter code used as the last segment of a pane key.
    pub fn code(self) -> &'static str {
        match self {
            PaneKind::Station => "s",
            PaneKind::Item => "i",
            PaneKind::Dummy => "d",
        }
    }

    /// Parse a single-letter kind code.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "s" => Ok(PaneKind::Station),
            "i" => Ok(PaneKind::Item),
            "d" => Ok(PaneKind::Dummy),
            other => Err(KeyError::UnknownKind(other.to_string())),
        }
    }

    /// Human-readable name, matching the record's `type` field.
    pub fn name(self) -> &'static str {
        match self {
            PaneKind::Station => "station",
            PaneKind::Item => "item",
            PaneKind::Dummy => "dummy",
        }
    }
}

impl fmt::Display for PaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaneKind {
    type Err = KeyError;

    /// Accepts either the key code (`i`) or the record name (`item`).
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "station" => Ok(PaneKind::Station),
            "item" => Ok(PaneKind::Item),
            "dummy" => Ok(PaneKind::Dummy),
            other => PaneKind::from_code(other),
        }
    }
}

/// Singleton buckets addressed by a fixed name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKey {
    Gifs,
    Backgrounds,
    Trash,
    Bookmarks,
    History,
    OpenTabs,
    ReadingList,
}

impl BucketKey {
    pub const ALL: [BucketKey; 7] = [
        BucketKey::Gifs,
        BucketKey::Backgrounds,
        BucketKey::Trash,
        BucketKey::Bookmarks,
        BucketKey::History,
        BucketKey::OpenTabs,
        BucketKey::ReadingList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BucketKey::Gifs => "gifs",
            BucketKey::Backgrounds => "backgrounds",
            BucketKey::Trash => "trash",
            BucketKey::Bookmarks => "bookmarks",
            BucketKey::History => "history",
            BucketKey::OpenTabs => "openTabs",
            BucketKey::ReadingList => "readingList",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        BucketKey::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Whether this bucket owns an addressable link collection.
    pub fn owns_links(self) -> bool {
        self.link_bucket().is_some()
    }

    pub fn link_bucket(self) -> Option<LinkBucket> {
        match self {
            BucketKey::Gifs => Some(LinkBucket::Gifs),
            BucketKey::Backgrounds => Some(LinkBucket::Backgrounds),
            BucketKey::Trash => Some(LinkBucket::Trash),
            _ => None,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The subset of buckets that own links: the trash and the two shared pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkBucket {
    Gifs,
    Backgrounds,
    Trash,
}

impl LinkBucket {
    pub const ALL: [LinkBucket; 3] = [LinkBucket::Gifs, LinkBucket::Backgrounds, LinkBucket::Trash];

    pub fn bucket(self) -> BucketKey {
        match self {
            LinkBucket::Gifs => BucketKey::Gifs,
            LinkBucket::Backgrounds => BucketKey::Backgrounds,
            LinkBucket::Trash => BucketKey::Trash,
        }
    }

    pub fn name(self) -> &'static str {
        self.bucket().name()
    }

    /// Whether this is one of the read-mostly shared pools.
    pub fn is_pool(self) -> bool {
        !matches!(self, LinkBucket::Trash)
    }
}

impl TryFrom<BucketKey> for LinkBucket {
    type Error = KeyError;

    fn try_from(bucket: BucketKey) -> Result<Self> {
        bucket
            .link_bucket()
            .ok_or_else(|| KeyError::LinksNotSupported(bucket.name().to_string()))
    }
}

impl fmt::Display for LinkBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a canonical decimal segment: digits only, no sign, no leading zeros.
pub(crate) fn parse_number(key: &str, segment: &str) -> Result<u64> {
    let invalid = || KeyError::InvalidNumber {
        key: key.to_string(),
        segment: segment.to_string(),
    };
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if segment.len() > 1 && segment.starts_with('0') {
        return Err(invalid());
    }
    segment.parse().map_err(|_| invalid())
}
