use pane_keys::{BucketKey, LinkBucket, LinkKey, LinkOwner, PaneKey, StoreKey, ViewId};
use pane_kv::KvStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::journal::{apply_plan, pending_plan, replay_plan, WritePlan};
use crate::records::{Bucket, LinkRecord, Pane, View, ViewRegistry};

/// Views, panes and links layered over a flat key-value store.
///
/// Every mutating operation reads what it needs, computes a complete
/// [`WritePlan`], and applies it while holding the store's operation lock, so
/// one handle runs one operation chain at a time.
pub struct HierarchicalStore<K> {
    kv: K,
    config: StoreConfig,
    op_lock: Mutex<()>,
}

/// What [`HierarchicalStore::init`] had to create.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<String>,
}

impl InitReport {
    pub fn is_fresh(&self) -> bool {
        !self.created.is_empty()
    }
}

impl<K: KvStore> HierarchicalStore<K> {
    /// Wrap `kv` without touching it.
    pub fn new(kv: K, config: StoreConfig) -> Self {
        Self {
            kv,
            config,
            op_lock: Mutex::new(()),
        }
    }

    /// Wrap `kv` and finish any write plan an earlier run left behind.
    pub async fn open(kv: K, config: StoreConfig) -> StoreResult<Self> {
        let store = Self::new(kv, config);
        store.recover().await?;
        Ok(store)
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Replay a journaled plan left by an interrupted operation.
    ///
    /// Returns the label of the replayed plan, or `None` if nothing was
    /// pending.
    pub async fn recover(&self) -> StoreResult<Option<String>> {
        let _op = self.lock().await;
        let Some(plan) = pending_plan(&self.kv).await? else {
            return Ok(None);
        };
        warn!(plan = %plan.label, steps = plan.len(), "replaying interrupted write plan");
        replay_plan(&self.kv, &plan).await?;
        info!(plan = %plan.label, "recovered interrupted write plan");
        Ok(Some(plan.label))
    }

    /// Create the root view, the view registry, the trash and the seeded
    /// pools if they are missing. Safe to call on every start.
    pub async fn init(&self) -> StoreResult<InitReport> {
        let _op = self.lock().await;
        let mut plan = WritePlan::new("init");
        let mut report = InitReport::default();
        let root = self.config.root_view;

        if !self.exists(root).await? {
            plan.put(root, &View::new(root, self.config.default_background.clone(), None))?;
            report.created.push(root.to_string());
        }
        if !self.exists(StoreKey::ViewRegistry).await? {
            plan.put(StoreKey::ViewRegistry, &ViewRegistry::seeded(root))?;
            report.created.push(StoreKey::ViewRegistry.to_string());
        }
        if !self.exists(LinkBucket::Trash).await? {
            plan.put(LinkBucket::Trash, &Bucket::empty(LinkBucket::Trash))?;
            report.created.push(LinkBucket::Trash.to_string());
        }
        for (pool, seeds) in [
            (LinkBucket::Gifs, &self.config.seed_gifs),
            (LinkBucket::Backgrounds, &self.config.seed_backgrounds),
        ] {
            if self.exists(pool).await? {
                continue;
            }
            let mut bucket = Bucket::empty(pool);
            for seed in seeds {
                let index = crate::alloc::push_next(&mut bucket.links, pool)?;
                let key = LinkOwner::Bucket(pool).link(index);
                plan.put(key, &LinkRecord::new(key, seed.url.clone(), seed.title.clone()))?;
            }
            plan.put(pool, &bucket)?;
            report.created.push(pool.to_string());
        }

        self.commit(plan).await?;
        if report.is_fresh() {
            info!(created = ?report.created, "initialized store");
        }
        Ok(report)
    }

    // ---- Typed reads ----

    /// Load the view `id`.
    pub async fn view(&self, id: ViewId) -> StoreResult<View> {
        self.require(id).await
    }

    /// Load the pane at `key`.
    pub async fn pane(&self, key: PaneKey) -> StoreResult<Pane> {
        let pane: Pane = self.require(key).await?;
        if pane.kind() != key.kind {
            return Err(StoreError::WrongKind {
                key: key.to_string(),
                expected: key.kind.name(),
                actual: pane.kind().name().to_string(),
            });
        }
        Ok(pane)
    }

    /// Load the link at `key`.
    pub async fn link(&self, key: LinkKey) -> StoreResult<LinkRecord> {
        self.require(key).await
    }

    /// Load a link-owning bucket.
    pub async fn bucket(&self, bucket: LinkBucket) -> StoreResult<Bucket> {
        self.require(bucket).await
    }

    /// The view id registry, or a registry holding only the root view if none
    /// has been written yet.
    pub async fn view_registry(&self) -> StoreResult<ViewRegistry> {
        Ok(self
            .load(StoreKey::ViewRegistry)
            .await?
            .unwrap_or_else(|| ViewRegistry::seeded(self.config.root_view)))
    }

    /// Opaque state of a panel bucket (`bookmarks`, `history`, ...).
    pub async fn panel_state(&self, bucket: BucketKey) -> StoreResult<Option<Value>> {
        self.load(bucket).await
    }

    /// Replace the opaque state of a panel bucket.
    pub async fn set_panel_state(&self, bucket: BucketKey, state: Value) -> StoreResult<()> {
        if bucket.owns_links() {
            return Err(StoreError::WrongKind {
                key: bucket.to_string(),
                expected: "panel bucket",
                actual: "link bucket".into(),
            });
        }
        let _op = self.lock().await;
        let mut plan = WritePlan::new("set panel state");
        plan.put(bucket, &state)?;
        self.commit(plan).await
    }

    // ---- Internals shared by the operation modules ----

    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().await
    }

    pub(crate) async fn commit(&self, plan: WritePlan) -> StoreResult<()> {
        apply_plan(&self.kv, &plan).await
    }

    pub(crate) async fn exists(&self, key: impl Into<StoreKey>) -> StoreResult<bool> {
        Ok(self.kv.contains(&key.into().to_string()).await?)
    }

    /// Fail with [`StoreError::AllocationConflict`] if `key` is occupied.
    pub(crate) async fn ensure_vacant(&self, key: impl Into<StoreKey>) -> StoreResult<()> {
        let key = key.into();
        if self.exists(key).await? {
            warn!(%key, "allocated key already occupied");
            return Err(StoreError::AllocationConflict {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) async fn load<T: DeserializeOwned>(
        &self,
        key: impl Into<StoreKey>,
    ) -> StoreResult<Option<T>> {
        let key = key.into().to_string();
        match self.kv.get_one(&key).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key,
                    reason: e.to_string(),
                }),
        }
    }

    pub(crate) async fn require<T: DeserializeOwned>(&self, key: impl Into<StoreKey>) -> StoreResult<T> {
        let key = key.into();
        self.load(key).await?.ok_or_else(|| StoreError::missing(key))
    }
}

impl<K> std::fmt::Debug for HierarchicalStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchicalStore")
            .field("root_view", &self.config.root_view)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedLink;
    use pane_kv::InMemoryKv;
    use serde_json::json;

    fn store_with(config: StoreConfig) -> HierarchicalStore<InMemoryKv> {
        HierarchicalStore::new(InMemoryKv::new(), config)
    }

    #[tokio::test]
    async fn init_creates_root_registry_and_buckets() {
        let store = store_with(StoreConfig::default());
        let report = store.init().await.unwrap();
        assert_eq!(
            report.created,
            vec!["0", "lastStationViewId", "trash", "gifs", "backgrounds"]
        );

        let root = store.view(ViewId::ROOT).await.unwrap();
        assert!(root.is_empty());
        assert_eq!(root.parent, None);
        assert_eq!(store.view_registry().await.unwrap().ids(), &[ViewId::ROOT]);
        assert!(store.bucket(LinkBucket::Trash).await.unwrap().links.is_empty());
        assert!(store.kv().get_one("journal").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let store = store_with(StoreConfig::default());
        store.init().await.unwrap();
        let second = store.init().await.unwrap();
        assert!(!second.is_fresh());
    }

    #[tokio::test]
    async fn init_seeds_pools() {
        let config = StoreConfig {
            seed_gifs: vec![SeedLink::new("https://g/1.gif", "one"), SeedLink::new("https://g/2.gif", "two")],
            seed_backgrounds: vec![SeedLink::new("https://b/sky.jpg", "sky")],
            ..Default::default()
        };
        let store = store_with(config);
        store.init().await.unwrap();

        let gifs = store.bucket(LinkBucket::Gifs).await.unwrap();
        assert_eq!(gifs.links, vec![0, 1]);
        let second = store.link("gifs,1".parse().unwrap()).await.unwrap();
        assert_eq!(second.link, "https://g/2.gif");
        assert_eq!(second.view, "gifs");

        let bgs = store.bucket(LinkBucket::Backgrounds).await.unwrap();
        assert_eq!(bgs.links, vec![0]);
    }

    #[tokio::test]
    async fn missing_records_are_referential_errors() {
        let store = store_with(StoreConfig::default());
        let err = store.view(ViewId::new(9)).await.unwrap_err();
        assert!(matches!(err, StoreError::Referential { ref key } if key == "9"));
    }

    #[tokio::test]
    async fn pane_kind_must_match_key() {
        let store = store_with(StoreConfig::default());
        // A dummy record stored under an item key.
        store
            .kv()
            .set_one(
                "0,0,i",
                json!({"id": 0, "view": 0, "type": "dummy", "left": 0, "top": 0, "width": 1, "height": 1}),
            )
            .await
            .unwrap();
        let err = store.pane(PaneKey::item(ViewId::ROOT, 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::WrongKind { expected: "item", .. }));
    }

    #[tokio::test]
    async fn undecodable_record_is_corrupt() {
        let store = store_with(StoreConfig::default());
        store.kv().set_one("0", json!([1, 2])).await.unwrap();
        let err = store.view(ViewId::ROOT).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn panel_state_round_trip() {
        let store = store_with(StoreConfig::default());
        assert!(store.panel_state(BucketKey::History).await.unwrap().is_none());
        store
            .set_panel_state(BucketKey::History, json!({"left": 40, "visible": true}))
            .await
            .unwrap();
        assert_eq!(
            store.panel_state(BucketKey::History).await.unwrap(),
            Some(json!({"left": 40, "visible": true}))
        );
        assert!(store.set_panel_state(BucketKey::Trash, json!({})).await.is_err());
    }

    #[tokio::test]
    async fn registry_defaults_to_root() {
        let store = store_with(StoreConfig::default());
        assert_eq!(store.view_registry().await.unwrap().ids(), &[ViewId::ROOT]);
    }
}
