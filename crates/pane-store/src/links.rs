//! Link collections owned by items, the trash and the shared pools.

use pane_keys::{LinkBucket, LinkKey, LinkOwner};
use pane_kv::KvStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alloc::push_next;
use crate::error::{StoreError, StoreResult};
use crate::journal::WritePlan;
use crate::records::{Bucket, LinkRecord, Pane};
use crate::store::HierarchicalStore;

/// Which field of a link [`HierarchicalStore::change_link_icon`] rewrites.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconTarget {
    /// The icon shown for the link.
    Icon,
    /// The URL the link opens.
    Link,
}

/// An owner record loaded for editing its link list.
pub(crate) struct LinkList {
    owner: LinkOwner,
    record: OwnerRecord,
    pub(crate) links: Vec<u64>,
}

enum OwnerRecord {
    Item(Pane),
    Bucket(Bucket),
}

impl LinkList {
    /// Append a fresh index and return its key.
    pub(crate) fn allocate(&mut self) -> StoreResult<LinkKey> {
        Ok(self.owner.link(push_next(&mut self.links, self.owner)?))
    }

    /// Drop `index` from the list. Returns whether it was listed.
    pub(crate) fn remove(&mut self, index: u64) -> bool {
        let before = self.links.len();
        self.links.retain(|&i| i != index);
        self.links.len() != before
    }

    /// Queue a write of the owner record carrying the edited list.
    pub(crate) fn stage(self, plan: &mut WritePlan) -> StoreResult<()> {
        match self.record {
            OwnerRecord::Item(mut pane) => {
                if let Some(links) = pane.links_mut() {
                    *links = self.links;
                }
                plan.put(pane.key(), &pane)?;
            }
            OwnerRecord::Bucket(mut bucket) => {
                bucket.links = self.links;
                plan.put(self.owner.store_key(), &bucket)?;
            }
        }
        Ok(())
    }
}

impl<K: KvStore> HierarchicalStore<K> {
    pub(crate) async fn link_list(&self, owner: LinkOwner) -> StoreResult<LinkList> {
        let (record, links) = match owner {
            LinkOwner::Item { .. } => {
                let key = owner.pane().ok_or_else(|| StoreError::missing(owner))?;
                let pane = self.pane(key).await?;
                let links = pane.links().map(<[u64]>::to_vec).unwrap_or_default();
                (OwnerRecord::Item(pane), links)
            }
            LinkOwner::Bucket(bucket) => {
                let record = self.bucket(bucket).await?;
                let links = record.links.clone();
                (OwnerRecord::Bucket(record), links)
            }
        };
        Ok(LinkList {
            owner,
            record,
            links,
        })
    }

    /// Append a new link to `owner`. Its icon starts out as its URL.
    pub async fn add_link(&self, owner: LinkOwner, url: &str, title: &str) -> StoreResult<LinkRecord> {
        let _op = self.lock().await;
        let mut list = self.link_list(owner).await?;
        let key = list.allocate()?;
        self.ensure_vacant(key).await?;

        let record = LinkRecord::new(key, url, title);
        let mut plan = WritePlan::new(format!("add link {key}"));
        plan.put(key, &record)?;
        list.stage(&mut plan)?;
        self.commit(plan).await?;

        info!(link = %key, url, "added link");
        Ok(record)
    }

    /// Move `link` out of `owner` and into the trash. Returns the trash key.
    ///
    /// A link already in the trash is removed for good instead.
    pub async fn remove_link(&self, owner: LinkOwner, link: LinkKey) -> StoreResult<LinkKey> {
        if link.owner != owner {
            return Err(StoreError::OwnerMismatch {
                owner: owner.to_string(),
                link: link.to_string(),
            });
        }
        if owner.is_trash() {
            self.remove_link_permanently(link).await?;
            return Ok(link);
        }

        let _op = self.lock().await;
        let mut list = self.link_list(owner).await?;
        if !list.remove(link.index) {
            return Err(StoreError::NotListed {
                owner: owner.to_string(),
                index: link.index,
            });
        }
        let record = self.link(link).await?;
        let mut trash = self.link_list(LinkOwner::trash()).await?;
        let trash_key = trash.allocate()?;
        self.ensure_vacant(trash_key).await?;

        let mut plan = WritePlan::new(format!("trash link {link}"));
        plan.put(trash_key, &record.copied_to(trash_key))?;
        trash.stage(&mut plan)?;
        list.stage(&mut plan)?;
        plan.delete(link);
        self.commit(plan).await?;

        info!(%link, trash = %trash_key, "moved link to trash");
        Ok(trash_key)
    }

    /// Delete a trash link for good.
    pub async fn remove_link_permanently(&self, link: LinkKey) -> StoreResult<()> {
        if !link.owner.is_trash() {
            return Err(StoreError::NotInTrash(link.to_string()));
        }
        let _op = self.lock().await;
        let mut trash = self.link_list(LinkOwner::trash()).await?;
        if !trash.remove(link.index) {
            if !self.exists(link).await? {
                return Err(StoreError::missing(link));
            }
            warn!(%link, "trash record was not listed; deleting it anyway");
        }

        let mut plan = WritePlan::new(format!("purge link {link}"));
        trash.stage(&mut plan)?;
        plan.delete(link);
        self.commit(plan).await?;

        info!(%link, "deleted link permanently");
        Ok(())
    }

    /// Move a trash link back under `to`, which must not be the trash.
    pub async fn restore_link(&self, link: LinkKey, to: LinkOwner) -> StoreResult<LinkRecord> {
        if !link.owner.is_trash() {
            return Err(StoreError::NotInTrash(link.to_string()));
        }
        if to.is_trash() {
            return Err(StoreError::PreconditionViolation(format!(
                "{link} is already in the trash"
            )));
        }

        let _op = self.lock().await;
        let mut trash = self.link_list(LinkOwner::trash()).await?;
        if !trash.remove(link.index) {
            return Err(StoreError::NotListed {
                owner: LinkBucket::Trash.to_string(),
                index: link.index,
            });
        }
        let record = self.link(link).await?;
        let mut dest = self.link_list(to).await?;
        let new_key = dest.allocate()?;
        self.ensure_vacant(new_key).await?;

        let restored = record.moved_to(new_key);
        let mut plan = WritePlan::new(format!("restore link {link}"));
        plan.put(new_key, &restored)?;
        dest.stage(&mut plan)?;
        trash.stage(&mut plan)?;
        plan.delete(link);
        self.commit(plan).await?;

        info!(%link, to = %new_key, "restored link");
        Ok(restored)
    }

    /// Rewrite the icon or the URL of a link.
    pub async fn change_link_icon(
        &self,
        link: LinkKey,
        target: IconTarget,
        url: &str,
    ) -> StoreResult<LinkRecord> {
        self.update_link(link, "change link icon", |record| match target {
            IconTarget::Icon => record.icon = url.to_string(),
            IconTarget::Link => record.link = url.to_string(),
        })
        .await
    }

    /// Make the icon follow the URL again.
    pub async fn reset_link_icon(&self, link: LinkKey) -> StoreResult<LinkRecord> {
        self.update_link(link, "reset link icon", |record| record.icon = record.link.clone())
            .await
    }

    pub async fn rename_link(&self, link: LinkKey, title: &str) -> StoreResult<LinkRecord> {
        self.update_link(link, "rename link", |record| record.title = title.to_string())
            .await
    }

    pub(crate) async fn update_link<F>(&self, link: LinkKey, label: &str, edit: F) -> StoreResult<LinkRecord>
    where
        F: FnOnce(&mut LinkRecord) + Send,
    {
        let _op = self.lock().await;
        let mut record = self.link(link).await?;
        edit(&mut record);
        let mut plan = WritePlan::new(format!("{label} {link}"));
        plan.put(link, &record)?;
        self.commit(plan).await?;
        debug!(%link, op = label, "updated link");
        Ok(record)
    }

    /// Every link of `owner`, in list order.
    pub async fn links_of(&self, owner: LinkOwner) -> StoreResult<Vec<LinkRecord>> {
        let list = self.link_list(owner).await?;
        let wanted: Vec<String> = list.links.iter().map(|&i| owner.link(i).to_string()).collect();
        let mut found = self.kv().get(&wanted).await?;

        wanted
            .into_iter()
            .map(|key| {
                let value = found.remove(&key).ok_or_else(|| StoreError::missing(&key))?;
                serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
                    key,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}
