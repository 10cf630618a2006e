use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pane_keys::{LinkBucket, LinkOwner, PaneKind, ViewId};
use pane_kv::{Entries, InMemoryKv, JsonFileKv, KvError, KvResult, KvStore};
use pane_store::{HierarchicalStore, ImportMode, Position, StoreConfig, StoreError};

/// Backend that starts failing writes once its budget is spent.
struct FlakyKv {
    inner: InMemoryKv,
    armed: AtomicBool,
    budget: AtomicUsize,
}

impl FlakyKv {
    fn new() -> Self {
        Self {
            inner: InMemoryKv::new(),
            armed: AtomicBool::new(false),
            budget: AtomicUsize::new(0),
        }
    }

    fn fail_after(&self, writes: usize) {
        self.budget.store(writes, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    fn spend(&self) -> KvResult<()> {
        if !self.armed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(KvError::Rejected("injected write failure".into()));
        }
        self.budget.store(left - 1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl KvStore for FlakyKv {
    async fn get(&self, keys: &[String]) -> KvResult<Entries> {
        self.inner.get(keys).await
    }

    async fn get_all(&self) -> KvResult<Entries> {
        self.inner.get_all().await
    }

    async fn set(&self, entries: Entries) -> KvResult<()> {
        self.spend()?;
        self.inner.set(entries).await
    }

    async fn remove(&self, keys: &[String]) -> KvResult<()> {
        self.spend()?;
        self.inner.remove(keys).await
    }

    async fn clear(&self) -> KvResult<()> {
        self.spend()?;
        self.inner.clear().await
    }
}

async fn fresh() -> HierarchicalStore<InMemoryKv> {
    let store = HierarchicalStore::new(InMemoryKv::new(), StoreConfig::default());
    store.init().await.unwrap();
    store
}

/// An item in the root view holding `n` links.
async fn item_with_links<K: KvStore>(store: &HierarchicalStore<K>, n: usize) -> LinkOwner {
    let item = store
        .create_object(ViewId::ROOT, PaneKind::Item, "links", Position::default())
        .await
        .unwrap();
    let owner = LinkOwner::from_pane(item.key()).unwrap();
    for i in 0..n {
        store
            .add_link(owner, &format!("http://site{i}.example"), &format!("site {i}"))
            .await
            .unwrap();
    }
    owner
}

// ---------------------------------------------------------------------------
// Walkthroughs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn item_link_to_trash_walkthrough() {
    let store = fresh().await;
    let item = store
        .create_object(ViewId::ROOT, PaneKind::Item, "Test", Position::default())
        .await
        .unwrap();
    assert_eq!(item.key().to_string(), "0,0,i");

    let owner = LinkOwner::from_pane(item.key()).unwrap();
    let link = store.add_link(owner, "http://a.com", "A").await.unwrap();
    assert_eq!(link.id.to_string(), "0,0,i,0");
    assert_eq!(link.icon, "http://a.com");

    let trash_key = store.remove_link(owner, link.id).await.unwrap();
    assert_eq!(trash_key.to_string(), "trash,0");

    let copy = store.link(trash_key).await.unwrap();
    assert_eq!((copy.link.as_str(), copy.title.as_str()), ("http://a.com", "A"));
    assert!(!store.kv().contains("0,0,i,0").await.unwrap());
    assert_eq!(store.pane(item.key()).await.unwrap().links(), Some(&[][..]));
    assert!(store.validate().await.unwrap().is_valid());
}

#[tokio::test]
async fn sequential_links_get_sequential_indices() {
    let store = fresh().await;
    let owner = item_with_links(&store, 0).await;
    let first = store.add_link(owner, "http://1", "1").await.unwrap();
    let second = store.add_link(owner, "http://2", "2").await.unwrap();
    assert_eq!(first.id.index, 0);
    assert_eq!(second.id.index, 1);
}

#[tokio::test]
async fn nested_station_walkthrough() {
    let store = fresh().await;
    let outer = store
        .create_object(ViewId::ROOT, PaneKind::Station, "Projects", Position::new(10.0, 10.0))
        .await
        .unwrap();
    let outer_view = outer.target().unwrap();
    let inner = store
        .create_object(outer_view, PaneKind::Station, "Rust", Position::default())
        .await
        .unwrap();
    let inner_view = inner.target().unwrap();
    let item = store
        .create_object(inner_view, PaneKind::Item, "Docs", Position::default())
        .await
        .unwrap();
    assert_eq!(item.key().to_string(), format!("{inner_view},0,i"));
    assert_eq!(store.ancestors(inner_view).await.unwrap(), vec![outer_view, ViewId::ROOT]);

    // The outer station cannot go until its subtree is emptied bottom-up.
    assert!(store.delete_object(outer.key()).await.is_err());
    store.delete_object(item.key()).await.unwrap();
    store.delete_object(inner.key()).await.unwrap();
    store.delete_object(outer.key()).await.unwrap();

    assert!(store.view(ViewId::ROOT).await.unwrap().is_empty());
    assert_eq!(store.view_registry().await.unwrap().ids(), &[ViewId::ROOT]);
    assert!(store.validate().await.unwrap().is_valid());
}

// ---------------------------------------------------------------------------
// Cascades and guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn item_delete_moves_every_link_to_trash() {
    for n in 0..=5 {
        let store = fresh().await;
        // Something already in the trash so indices do not start at zero.
        let other = item_with_links(&store, 1).await;
        store.remove_link(other, other.link(0)).await.unwrap();

        let owner = item_with_links(&store, n).await;
        let originals = store.links_of(owner).await.unwrap();
        let outcome = store.delete_object(owner.pane().unwrap()).await.unwrap();

        assert_eq!(outcome.trashed.len(), n);
        let trash = store.bucket(LinkBucket::Trash).await.unwrap();
        assert_eq!(trash.links, (0..=n as u64).collect::<Vec<_>>());
        for (original, trash_key) in originals.iter().zip(&outcome.trashed) {
            let copy = store.link(*trash_key).await.unwrap();
            assert_eq!(copy.link, original.link);
            assert_eq!(copy.title, original.title);
            assert!(!store.kv().contains(&original.id.to_string()).await.unwrap());
        }
        assert!(!store.kv().contains(&owner.to_string()).await.unwrap());
        assert!(store.validate().await.unwrap().is_valid(), "n = {n}");
    }
}

#[tokio::test]
async fn station_guard_leaves_store_untouched() {
    let store = fresh().await;
    let station = store
        .create_object(ViewId::ROOT, PaneKind::Station, "Keep", Position::default())
        .await
        .unwrap();
    store
        .create_object(station.target().unwrap(), PaneKind::Dummy, "inside", Position::default())
        .await
        .unwrap();

    let before = serde_json::to_string(&store.kv().snapshot().unwrap()).unwrap();
    let err = store.delete_object(station.key()).await.unwrap_err();
    assert!(matches!(err, StoreError::PreconditionViolation(_)));
    let after = serde_json::to_string(&store.kv().snapshot().unwrap()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn trash_round_trip() {
    let store = fresh().await;
    let owner = item_with_links(&store, 2).await;
    let trash_key = store.remove_link(owner, owner.link(1)).await.unwrap();
    let restored = store.restore_link(trash_key, owner).await.unwrap();

    assert_eq!(restored.link, "http://site1.example");
    assert_eq!(restored.id, owner.link(1));
    assert!(store.trash_links().await.unwrap().is_empty());
    assert!(store.validate().await.unwrap().is_valid());
}

// ---------------------------------------------------------------------------
// Crash recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interrupted_delete_is_completed_by_recover() {
    // 3 trash copies, trash, view, 3 link deletes, item delete
    const PLAN_STEPS: usize = 9;

    let reference = fresh().await;
    let owner = item_with_links(&reference, 3).await;
    reference.delete_object(owner.pane().unwrap()).await.unwrap();
    let expected = reference.kv().snapshot().unwrap();

    for budget in 1..=PLAN_STEPS {
        let store = HierarchicalStore::new(FlakyKv::new(), StoreConfig::default());
        store.init().await.unwrap();
        let owner = item_with_links(&store, 3).await;

        store.kv().fail_after(budget);
        let err = store.delete_object(owner.pane().unwrap()).await.unwrap_err();
        match err {
            StoreError::PlanInterrupted { applied, total, .. } => {
                assert_eq!(applied, budget - 1);
                assert_eq!(total, PLAN_STEPS);
            }
            other => panic!("budget {budget}: unexpected error {other}"),
        }
        assert!(store.kv().contains("journal").await.unwrap());

        store.kv().disarm();
        let replayed = store.recover().await.unwrap();
        assert_eq!(replayed.as_deref(), Some("delete 0,0,i"));
        assert_eq!(store.kv().inner.snapshot().unwrap(), expected, "budget {budget}");
    }
}

#[tokio::test]
async fn open_replays_pending_plan() {
    let kv = FlakyKv::new();
    let store = HierarchicalStore::new(kv, StoreConfig::default());
    store.init().await.unwrap();
    let owner = item_with_links(&store, 1).await;
    store.kv().fail_after(2);
    assert!(store.remove_link(owner, owner.link(0)).await.is_err());
    store.kv().disarm();

    let entries = store.kv().inner.snapshot().unwrap();
    let reopened = HierarchicalStore::open(InMemoryKv::with_entries(entries), StoreConfig::default())
        .await
        .unwrap();
    assert!(reopened.validate().await.unwrap().is_valid());
    assert_eq!(reopened.trash_links().await.unwrap().len(), 1);
    assert_eq!(reopened.recover().await.unwrap(), None);
}

#[tokio::test]
async fn pending_plan_blocks_later_writes_until_recovered() {
    let store = HierarchicalStore::new(FlakyKv::new(), StoreConfig::default());
    store.init().await.unwrap();
    let owner = item_with_links(&store, 1).await;
    store.kv().fail_after(2);
    assert!(store.remove_link(owner, owner.link(0)).await.is_err());
    store.kv().disarm();
    let journal = store.kv().get_one("journal").await.unwrap();
    assert!(journal.is_some());

    let err = store
        .create_object(ViewId::ROOT, PaneKind::Dummy, "later", Position::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::PendingPlan { ref label } if label == "trash link 0,0,i,0"));
    assert_eq!(store.kv().get_one("journal").await.unwrap(), journal);

    assert_eq!(store.recover().await.unwrap().as_deref(), Some("trash link 0,0,i,0"));
    store
        .create_object(ViewId::ROOT, PaneKind::Dummy, "later", Position::default())
        .await
        .unwrap();
    assert_eq!(store.trash_links().await.unwrap().len(), 1);
    assert!(store.validate().await.unwrap().is_valid());
}

#[tokio::test]
async fn failed_import_keeps_existing_records() {
    let source = fresh().await;
    item_with_links(&source, 1).await;
    let doc = source.export().await.unwrap();

    let store = HierarchicalStore::new(FlakyKv::new(), StoreConfig::default());
    store.init().await.unwrap();
    item_with_links(&store, 2).await;
    let before = store.kv().inner.snapshot().unwrap();

    // The document write itself fails.
    store.kv().fail_after(0);
    assert!(store.import(doc.clone(), ImportMode::Validated).await.is_err());
    assert_eq!(store.kv().inner.snapshot().unwrap(), before);

    // The document lands but removing the keys it lacks fails.
    store.kv().fail_after(1);
    assert!(store.import(doc.clone(), ImportMode::Validated).await.is_err());
    let partial = store.kv().inner.snapshot().unwrap();
    assert!(before.keys().all(|key| partial.contains_key(key)));
    assert!(doc.entries.iter().all(|(key, value)| partial.get(key) == Some(value)));

    store.kv().disarm();
    store.import(doc.clone(), ImportMode::Validated).await.unwrap();
    assert_eq!(store.kv().inner.snapshot().unwrap(), doc.entries);
}

// ---------------------------------------------------------------------------
// Concurrency and persistence
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_get_distinct_indices() {
    let store = Arc::new(fresh().await);
    let owner = item_with_links(&*store, 0).await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.add_link(owner, &format!("http://{i}"), "x").await })
        })
        .collect();
    let mut indices = Vec::new();
    for task in tasks {
        indices.push(task.await.unwrap().unwrap().id.index);
    }
    indices.sort_unstable();
    assert_eq!(indices, (0..16).collect::<Vec<u64>>());
    assert!(store.validate().await.unwrap().is_valid());
}

#[tokio::test]
async fn file_backend_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panes.json");

    {
        let kv = JsonFileKv::open(&path).await.unwrap();
        let store = HierarchicalStore::open(kv, StoreConfig::default()).await.unwrap();
        store.init().await.unwrap();
        let owner = item_with_links(&store, 2).await;
        store.rename_object(owner.pane().unwrap(), "Reading").await.unwrap();
    }

    let kv = JsonFileKv::open(&path).await.unwrap();
    let store = HierarchicalStore::open(kv, StoreConfig::default()).await.unwrap();
    assert!(!store.init().await.unwrap().is_fresh());
    let children = store.children(ViewId::ROOT).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].base.title, "Reading");
    assert_eq!(store.links_of(LinkOwner::item(ViewId::ROOT, 0)).await.unwrap().len(), 2);
}
