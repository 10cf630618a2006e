//! The trash and the shared `gifs` / `backgrounds` pools.

use pane_keys::{LinkBucket, LinkKey, LinkOwner, PaneKey, ViewId};
use pane_kv::KvStore;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::journal::WritePlan;
use crate::records::LinkRecord;
use crate::store::HierarchicalStore;

/// Where [`HierarchicalStore::apply_background`] puts a pool image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickTarget {
    /// Becomes the view's background.
    ViewBackground(ViewId),
    /// Becomes a pane's icon.
    PaneIcon(PaneKey),
    /// Becomes a link's icon.
    LinkIcon(LinkKey),
}

impl<K: KvStore> HierarchicalStore<K> {
    /// Links of a shared pool, in list order.
    pub async fn pool_links(&self, pool: LinkBucket) -> StoreResult<Vec<LinkRecord>> {
        if !pool.is_pool() {
            return Err(StoreError::WrongKind {
                key: pool.to_string(),
                expected: "pool",
                actual: pool.name().to_string(),
            });
        }
        self.links_of(LinkOwner::Bucket(pool)).await
    }

    /// Links currently in the trash, in the order they were trashed.
    pub async fn trash_links(&self) -> StoreResult<Vec<LinkRecord>> {
        self.links_of(LinkOwner::trash()).await
    }

    /// Permanently delete every trash link. Returns how many were removed.
    ///
    /// The bucket is emptied before the records go, so an interruption can
    /// only leave unlisted records behind.
    pub async fn empty_trash(&self) -> StoreResult<usize> {
        let _op = self.lock().await;
        let mut trash = self.link_list(LinkOwner::trash()).await?;
        let doomed: Vec<LinkKey> = trash.links.drain(..).map(|i| LinkOwner::trash().link(i)).collect();

        let mut plan = WritePlan::new("empty trash");
        trash.stage(&mut plan)?;
        for key in &doomed {
            plan.delete(*key);
        }
        self.commit(plan).await?;

        info!(removed = doomed.len(), "emptied trash");
        Ok(doomed.len())
    }

    /// Use the image of pool link `pick` as a background or icon.
    pub async fn apply_background(&self, pick: LinkKey, target: PickTarget) -> StoreResult<()> {
        let pool = match pick.owner {
            LinkOwner::Bucket(bucket) if bucket.is_pool() => bucket,
            other => {
                return Err(StoreError::WrongKind {
                    key: pick.to_string(),
                    expected: "pool link",
                    actual: format!("link of {other}"),
                })
            }
        };
        let image = self.link(pick).await?.link;

        match target {
            PickTarget::ViewBackground(view) => {
                self.set_view_background(view, &image).await?;
            }
            PickTarget::PaneIcon(pane) => {
                self.change_object_icon(pane, &image).await?;
            }
            PickTarget::LinkIcon(link) => {
                self.update_link(link, "pick link icon", move |record| record.icon = image)
                    .await?;
            }
        }
        info!(%pick, pool = pool.name(), ?target, "applied pool image");
        Ok(())
    }
}
