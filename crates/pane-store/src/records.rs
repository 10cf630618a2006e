//! Record types stored under each key shape.
//!
//! Field names follow the stored JSON layout (`faviconChrome`, `type`), so a
//! store written by the browser extension loads unchanged.

use pane_keys::{BucketKey, LinkBucket, LinkKey, PaneKey, PaneKind, StoreKey, ViewId};
use serde::{Deserialize, Serialize};

use crate::alloc::push_next;
use crate::error::{StoreError, StoreResult};

/// A canvas of panes.
///
/// `stations`, `items` and `dummies` are ordered sets of local ids; each id
/// must have a record at `<id>,<local>,<s|i|d>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: ViewId,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub stations: Vec<u64>,
    #[serde(default)]
    pub items: Vec<u64>,
    #[serde(default)]
    pub dummies: Vec<u64>,
    /// The view holding the station that opens this one. Used for "back".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ViewId>,
}

impl View {
    pub fn new(id: ViewId, background: impl Into<String>, parent: Option<ViewId>) -> Self {
        Self {
            id,
            background: background.into(),
            stations: Vec::new(),
            items: Vec::new(),
            dummies: Vec::new(),
            parent,
        }
    }

    pub fn members(&self, kind: PaneKind) -> &[u64] {
        match kind {
            PaneKind::Station => &self.stations,
            PaneKind::Item => &self.items,
            PaneKind::Dummy => &self.dummies,
        }
    }

    pub fn members_mut(&mut self, kind: PaneKind) -> &mut Vec<u64> {
        match kind {
            PaneKind::Station => &mut self.stations,
            PaneKind::Item => &mut self.items,
            PaneKind::Dummy => &mut self.dummies,
        }
    }

    /// Allocate the next local id for `kind` and append it.
    pub fn allocate(&mut self, kind: PaneKind) -> StoreResult<u64> {
        let scope = format!("{} {}", self.id, kind.name());
        push_next(self.members_mut(kind), scope)
    }

    /// Remove `local` from the `kind` membership. Returns whether it was listed.
    pub fn remove_member(&mut self, kind: PaneKind, local: u64) -> bool {
        let members = self.members_mut(kind);
        let before = members.len();
        members.retain(|&id| id != local);
        members.len() != before
    }

    pub fn contains(&self, key: &PaneKey) -> bool {
        key.view == self.id && self.members(key.kind).contains(&key.local)
    }

    /// Number of panes of every kind.
    pub fn pane_count(&self) -> usize {
        self.stations.len() + self.items.len() + self.dummies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pane_count() == 0
    }

    /// Keys of every member pane: stations, then items, then dummies.
    pub fn pane_keys(&self) -> Vec<PaneKey> {
        PaneKind::ALL
            .into_iter()
            .flat_map(|kind| {
                self.members(kind)
                    .iter()
                    .map(move |&local| PaneKey::new(self.id, local, kind))
            })
            .collect()
    }
}

/// Fields shared by every pane kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaneBase {
    /// Local id within the owning view.
    pub id: u64,
    /// The owning view.
    pub view: ViewId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// Kind-specific pane fields, tagged by the record's `type` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PaneBody {
    Station {
        /// The view this station opens.
        target: ViewId,
    },
    Item {
        #[serde(default)]
        links: Vec<u64>,
        #[serde(rename = "faviconChrome", default, skip_serializing_if = "Option::is_none")]
        favicon_chrome: Option<String>,
    },
    Dummy {},
}

/// A station, item or dummy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pane {
    #[serde(flatten)]
    pub base: PaneBase,
    #[serde(flatten)]
    pub body: PaneBody,
}

impl Pane {
    pub fn kind(&self) -> PaneKind {
        match self.body {
            PaneBody::Station { .. } => PaneKind::Station,
            PaneBody::Item { .. } => PaneKind::Item,
            PaneBody::Dummy {} => PaneKind::Dummy,
        }
    }

    /// The key this record lives under.
    pub fn key(&self) -> PaneKey {
        PaneKey::new(self.base.view, self.base.id, self.kind())
    }

    /// Target view of a station.
    pub fn target(&self) -> Option<ViewId> {
        match self.body {
            PaneBody::Station { target } => Some(target),
            _ => None,
        }
    }

    /// Link indices of an item.
    pub fn links(&self) -> Option<&[u64]> {
        match &self.body {
            PaneBody::Item { links, .. } => Some(links),
            _ => None,
        }
    }

    pub fn links_mut(&mut self) -> Option<&mut Vec<u64>> {
        match &mut self.body {
            PaneBody::Item { links, .. } => Some(links),
            _ => None,
        }
    }
}

/// A single URL + title + icon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Always equal to the record's own storage key.
    pub id: LinkKey,
    pub link: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub title: String,
    /// First segment of the owner key: a view id or a bucket name.
    #[serde(default)]
    pub view: String,
    #[serde(rename = "faviconChrome", default, skip_serializing_if = "Option::is_none")]
    pub favicon_chrome: Option<String>,
}

impl LinkRecord {
    /// A new link whose icon follows its URL.
    pub fn new(id: LinkKey, url: impl Into<String>, title: impl Into<String>) -> Self {
        let link = url.into();
        Self {
            id,
            icon: link.clone(),
            link,
            title: title.into(),
            view: id.owner.root().to_string(),
            favicon_chrome: None,
        }
    }

    /// This link's content re-addressed under `id`.
    pub fn copied_to(&self, id: LinkKey) -> Self {
        Self {
            id,
            link: self.link.clone(),
            icon: self.link.clone(),
            title: self.title.clone(),
            view: id.owner.root().to_string(),
            favicon_chrome: self.favicon_chrome.clone(),
        }
    }

    /// This exact link under a new address, custom icon included.
    pub fn moved_to(&self, id: LinkKey) -> Self {
        Self {
            id,
            view: id.owner.root().to_string(),
            ..self.clone()
        }
    }
}

/// A link-owning bucket: the trash or a shared pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: String,
    #[serde(default)]
    pub links: Vec<u64>,
}

impl Bucket {
    pub fn empty(bucket: LinkBucket) -> Self {
        Self {
            id: bucket.name().to_string(),
            links: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<LinkBucket> {
        BucketKey::from_name(&self.id).and_then(BucketKey::link_bucket)
    }
}

/// Every view id allocated so far, stored at `lastStationViewId`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewRegistry {
    ids: Vec<ViewId>,
}

impl ViewRegistry {
    /// A registry holding only the root view.
    pub fn seeded(root: ViewId) -> Self {
        Self { ids: vec![root] }
    }

    pub fn ids(&self) -> &[ViewId] {
        &self.ids
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.ids.contains(&id)
    }

    /// Register and return `max + 1`.
    pub fn allocate(&mut self) -> StoreResult<ViewId> {
        let next = match self.ids.iter().max() {
            None => ViewId::ROOT.checked_next(),
            Some(max) => max.checked_next(),
        }
        .ok_or_else(|| StoreError::IdSpaceExhausted {
            scope: StoreKey::ViewRegistry.to_string(),
        })?;
        self.ids.push(next);
        Ok(next)
    }

    /// Forget `id`. Returns whether it was registered.
    pub fn release(&mut self, id: ViewId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|&v| v != id);
        self.ids.len() != before
    }
}

/// Canvas coordinates for a new pane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
