//! Stations, items and dummies: creation, edits, reparenting and deletion.

use std::collections::HashSet;

use pane_keys::{LinkBucket, LinkKey, LinkOwner, PaneKey, PaneKind, StoreKey, ViewId};
use pane_kv::KvStore;
use tracing::{debug, info, warn};

use crate::alloc::push_next;
use crate::error::{StoreError, StoreResult};
use crate::journal::WritePlan;
use crate::records::{Bucket, LinkRecord, Pane, PaneBase, PaneBody, Position, View};
use crate::store::HierarchicalStore;

/// Result of [`HierarchicalStore::delete_object`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub key: PaneKey,
    /// Trash keys that received the deleted item's links, in link order.
    pub trashed: Vec<LinkKey>,
}

impl<K: KvStore> HierarchicalStore<K> {
    /// Create a pane of `kind` in view `root`.
    ///
    /// Stations also get a brand-new child view whose `parent` is `root`; its
    /// id comes from the view registry so it never collides with another
    /// view anywhere in the store.
    pub async fn create_object(
        &self,
        root: ViewId,
        kind: PaneKind,
        title: &str,
        position: Position,
    ) -> StoreResult<Pane> {
        let _op = self.lock().await;
        let mut view = self.view(root).await?;
        let local = view.allocate(kind)?;
        let key = PaneKey::new(root, local, kind);
        self.ensure_vacant(key).await?;

        let mut plan = WritePlan::new(format!("create {key}"));
        let body = match kind {
            PaneKind::Station => {
                let mut registry = self.view_registry().await?;
                let target = registry.allocate()?;
                self.ensure_vacant(target).await?;
                let child = View::new(target, self.config().default_background.clone(), Some(root));
                plan.put(target, &child)?;
                plan.put(StoreKey::ViewRegistry, &registry)?;
                PaneBody::Station { target }
            }
            PaneKind::Item => PaneBody::Item {
                links: Vec::new(),
                favicon_chrome: None,
            },
            PaneKind::Dummy => PaneBody::Dummy {},
        };

        let size = self.config().pane_size;
        let pane = Pane {
            base: PaneBase {
                id: local,
                view: root,
                title: title.to_string(),
                icon: self.config().icon_for(kind).to_string(),
                left: position.x,
                top: position.y,
                width: size.width,
                height: size.height,
            },
            body,
        };
        plan.put(key, &pane)?;
        plan.put(root, &view)?;
        self.commit(plan).await?;

        info!(%key, title, "created pane");
        Ok(pane)
    }

    pub async fn rename_object(&self, key: PaneKey, title: &str) -> StoreResult<Pane> {
        self.update_pane(key, "rename", |pane| pane.base.title = title.to_string())
            .await
    }

    /// Persist new canvas coordinates. No bounds are enforced.
    pub async fn move_object(&self, key: PaneKey, left: f64, top: f64) -> StoreResult<Pane> {
        self.update_pane(key, "move", |pane| {
            pane.base.left = left;
            pane.base.top = top;
        })
        .await
    }

    pub async fn resize_object(&self, key: PaneKey, width: f64, height: f64) -> StoreResult<Pane> {
        self.update_pane(key, "resize", |pane| {
            pane.base.width = width;
            pane.base.height = height;
        })
        .await
    }

    /// Replace a pane's icon. Links are untouched.
    pub async fn change_object_icon(&self, key: PaneKey, icon: &str) -> StoreResult<Pane> {
        self.update_pane(key, "change icon", |pane| pane.base.icon = icon.to_string())
            .await
    }

    pub async fn set_view_background(&self, id: ViewId, background: &str) -> StoreResult<View> {
        let _op = self.lock().await;
        let mut view = self.view(id).await?;
        view.background = background.to_string();
        let mut plan = WritePlan::new(format!("background {id}"));
        plan.put(id, &view)?;
        self.commit(plan).await?;
        debug!(view = %id, "changed background");
        Ok(view)
    }

    async fn update_pane<F>(&self, key: PaneKey, label: &str, edit: F) -> StoreResult<Pane>
    where
        F: FnOnce(&mut Pane) + Send,
    {
        let _op = self.lock().await;
        let mut pane = self.pane(key).await?;
        edit(&mut pane);
        let mut plan = WritePlan::new(format!("{label} {key}"));
        plan.put(key, &pane)?;
        self.commit(plan).await?;
        debug!(%key, op = label, "updated pane");
        Ok(pane)
    }

    /// Delete a pane.
    ///
    /// - Item: every link is copied into the trash, then the view forgets
    ///   the item, then the original link records and the item are removed.
    /// - Station: refused unless the target view is empty. The target view
    ///   and its registry entry go with the station.
    /// - Dummy: removed from its view.
    pub async fn delete_object(&self, key: PaneKey) -> StoreResult<DeleteOutcome> {
        let _op = self.lock().await;
        let pane = self.pane(key).await?;
        let mut parent = self.view(key.view).await?;
        if !parent.remove_member(key.kind, key.local) {
            warn!(%key, "deleting pane its view does not list");
        }

        let mut plan = WritePlan::new(format!("delete {key}"));
        let mut trashed = Vec::new();

        match &pane.body {
            PaneBody::Item { links, .. } => {
                let owner = LinkOwner::item(key.view, key.local);
                let mut trash: Bucket = self.require(LinkBucket::Trash).await?;
                let mut originals = Vec::with_capacity(links.len());
                for &index in links {
                    let link_key = owner.link(index);
                    let Some(record) = self.load::<LinkRecord>(link_key).await? else {
                        warn!(link = %link_key, "item lists a missing link; dropping reference");
                        continue;
                    };
                    let trash_key = LinkOwner::trash().link(push_next(&mut trash.links, LinkBucket::Trash)?);
                    self.ensure_vacant(trash_key).await?;
                    plan.put(trash_key, &record.copied_to(trash_key))?;
                    trashed.push(trash_key);
                    originals.push(link_key);
                }
                if !trashed.is_empty() {
                    plan.put(LinkBucket::Trash, &trash)?;
                }
                plan.put(key.view, &parent)?;
                for link_key in originals {
                    plan.delete(link_key);
                }
                plan.delete(key);
            }
            PaneBody::Station { target } => {
                let target_view = self.view(*target).await?;
                if !target_view.is_empty() {
                    warn!(%key, target = %target, panes = target_view.pane_count(), "refusing to delete non-empty station");
                    return Err(StoreError::PreconditionViolation(format!(
                        "station {key} opens view {target}, which still holds {} pane(s)",
                        target_view.pane_count()
                    )));
                }
                let mut registry = self.view_registry().await?;
                if !registry.release(*target) {
                    warn!(target = %target, "station target was not registered");
                }
                plan.put(key.view, &parent)?;
                plan.delete(key);
                plan.put(StoreKey::ViewRegistry, &registry)?;
                plan.delete(*target);
            }
            PaneBody::Dummy {} => {
                plan.put(key.view, &parent)?;
                plan.delete(key);
            }
        }

        self.commit(plan).await?;
        info!(%key, trashed = trashed.len(), "deleted pane");
        Ok(DeleteOutcome { key, trashed })
    }

    /// Move a pane into the view opened by `station`.
    pub async fn move_into_station(&self, key: PaneKey, station: PaneKey) -> StoreResult<Pane> {
        let _op = self.lock().await;
        let station_pane = self.pane(station).await?;
        let target = station_pane.target().ok_or_else(|| StoreError::WrongKind {
            key: station.to_string(),
            expected: "station",
            actual: station_pane.kind().name().to_string(),
        })?;
        self.reparent(key, target).await
    }

    /// Move a pane into view `dest`. The pane gets a fresh local id there;
    /// an item's links are re-addressed under its new key.
    pub async fn reparent_object(&self, key: PaneKey, dest: ViewId) -> StoreResult<Pane> {
        let _op = self.lock().await;
        self.reparent(key, dest).await
    }

    async fn reparent(&self, key: PaneKey, dest: ViewId) -> StoreResult<Pane> {
        let mut pane = self.pane(key).await?;
        if dest == key.view {
            return Ok(pane);
        }
        let mut source = self.view(key.view).await?;
        let mut dest_view = self.view(dest).await?;

        let mut target_view = None;
        if let Some(target) = pane.target() {
            if target == dest || self.ancestors(dest).await?.contains(&target) {
                return Err(StoreError::PreconditionViolation(format!(
                    "station {key} cannot move into its own view {target} or below it"
                )));
            }
            let mut view = self.view(target).await?;
            view.parent = Some(dest);
            target_view = Some(view);
        }

        let new_local = dest_view.allocate(key.kind)?;
        let new_key = PaneKey::new(dest, new_local, key.kind);
        self.ensure_vacant(new_key).await?;
        source.remove_member(key.kind, key.local);

        let mut plan = WritePlan::new(format!("reparent {key} -> {new_key}"));
        let mut stale_links = Vec::new();
        if let Some(links) = pane.links_mut() {
            let old_owner = LinkOwner::item(key.view, key.local);
            let new_owner = LinkOwner::item(dest, new_local);
            let mut kept = Vec::with_capacity(links.len());
            for &index in links.iter() {
                let old_key = old_owner.link(index);
                let Some(record) = self.load::<LinkRecord>(old_key).await? else {
                    warn!(link = %old_key, "item lists a missing link; dropping reference");
                    continue;
                };
                let moved_key = new_owner.link(index);
                self.ensure_vacant(moved_key).await?;
                plan.put(moved_key, &record.moved_to(moved_key))?;
                stale_links.push(old_key);
                kept.push(index);
            }
            *links = kept;
        }

        pane.base.id = new_local;
        pane.base.view = dest;
        plan.put(new_key, &pane)?;
        if let Some(view) = &target_view {
            plan.put(view.id, view)?;
        }
        plan.put(dest, &dest_view)?;
        plan.put(key.view, &source)?;
        for old_key in stale_links {
            plan.delete(old_key);
        }
        plan.delete(key);
        self.commit(plan).await?;

        info!(from = %key, to = %new_key, "reparented pane");
        Ok(pane)
    }

    /// Every pane of view `id`: stations, then items, then dummies, each in
    /// membership order.
    pub async fn children(&self, id: ViewId) -> StoreResult<Vec<Pane>> {
        let view = self.view(id).await?;
        let keys = view.pane_keys();
        let wanted: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let mut found = self.kv().get(&wanted).await?;

        keys.iter()
            .zip(wanted)
            .map(|(key, raw)| {
                let value = found.remove(&raw).ok_or_else(|| StoreError::missing(key))?;
                serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
                    key: raw,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// The view to go "back" to from `id`.
    pub async fn parent_of(&self, id: ViewId) -> StoreResult<Option<ViewId>> {
        Ok(self.view(id).await?.parent)
    }

    /// Parents of `id`, nearest first, up to the first view without one.
    ///
    /// Stops at the first repeated view so a corrupt parent cycle cannot loop.
    pub async fn ancestors(&self, id: ViewId) -> StoreResult<Vec<ViewId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.view(id).await?.parent;
        while let Some(parent) = current {
            if !seen.insert(parent) {
                warn!(view = %id, repeated = %parent, "parent chain loops");
                break;
            }
            chain.push(parent);
            current = match self.load::<View>(parent).await? {
                Some(view) => view.parent,
                None => None,
            };
        }
        Ok(chain)
    }
}
