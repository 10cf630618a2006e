//! Whole-store integrity checks.
//!
//! [`StoreValidator`] decodes every key and record, then checks that views,
//! panes, links and buckets reference each other consistently. It only
//! reports; nothing is repaired.

use std::collections::{BTreeMap, HashSet};

use pane_keys::{LinkBucket, LinkKey, LinkOwner, PaneKey, PaneKind, StoreKey, ViewId};
use pane_kv::{Entries, KvStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::records::{Bucket, LinkRecord, Pane, PaneBody, View, ViewRegistry};
use crate::store::HierarchicalStore;

/// Result of a whole-store integrity check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub key_count: usize,
    pub view_count: usize,
    pub pane_count: usize,
    pub link_count: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations of one kind.
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// The key whose record is at fault.
    pub key: String,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnparsableKey,
    CorruptRecord,
    /// A record's own id fields disagree with its key.
    KeyMismatch,
    /// A view lists a pane with no record.
    DanglingPane,
    /// A pane record its view does not list.
    OrphanPane,
    DuplicateMember,
    MissingParent,
    ParentCycle,
    /// A station whose target view has no record.
    MissingTarget,
    /// A station's target view names a different parent.
    ParentMismatch,
    UnregisteredView,
    /// A registry id with no view record.
    StaleRegistration,
    /// An owner lists a link index with no record.
    DanglingLink,
    /// A link record its owner does not list.
    OrphanLink,
    /// The root view, the registry, the trash or a pool is missing.
    MissingSingleton,
    /// An interrupted write plan is waiting for `recover`.
    PendingJournal,
}

/// Whole-store integrity validator. Reports problems and never fixes them.
pub struct StoreValidator;

#[derive(Default)]
struct Decoded {
    views: BTreeMap<ViewId, View>,
    panes: BTreeMap<PaneKey, Pane>,
    links: BTreeMap<LinkKey, LinkRecord>,
    buckets: BTreeMap<LinkBucket, Bucket>,
    registry: Option<ViewRegistry>,
}

impl StoreValidator {
    /// Validate a full snapshot of the store.
    pub fn validate(entries: &Entries, root: ViewId) -> ValidationReport {
        let mut violations = Vec::new();
        let decoded = decode(entries, &mut violations);

        check_singletons(&decoded, root, &mut violations);
        check_views(&decoded, entries, &mut violations);
        check_panes(&decoded, &mut violations);
        check_link_owners(&decoded, entries, &mut violations);
        check_links(&decoded, &mut violations);

        ValidationReport {
            key_count: entries.len(),
            view_count: decoded.views.len(),
            pane_count: decoded.panes.len(),
            link_count: decoded.links.len(),
            violations,
        }
    }
}

fn violation(
    violations: &mut Vec<Violation>,
    key: impl ToString,
    kind: ViolationKind,
    description: impl Into<String>,
) {
    violations.push(Violation {
        key: key.to_string(),
        kind,
        description: description.into(),
    });
}

fn decode(entries: &Entries, violations: &mut Vec<Violation>) -> Decoded {
    fn typed<T: DeserializeOwned>(
        raw: &str,
        value: &Value,
        violations: &mut Vec<Violation>,
    ) -> Option<T> {
        match serde_json::from_value(value.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                violation(violations, raw, ViolationKind::CorruptRecord, e.to_string());
                None
            }
        }
    }

    let mut decoded = Decoded::default();
    for (raw, value) in entries {
        let key: StoreKey = match raw.parse() {
            Ok(key) => key,
            Err(e) => {
                violation(violations, raw, ViolationKind::UnparsableKey, e.to_string());
                continue;
            }
        };
        match key {
            StoreKey::View(id) => {
                if let Some(view) = typed::<View>(raw, value, violations) {
                    decoded.views.insert(id, view);
                }
            }
            StoreKey::Pane(pane_key) => {
                if let Some(pane) = typed::<Pane>(raw, value, violations) {
                    decoded.panes.insert(pane_key, pane);
                }
            }
            StoreKey::Link(link_key) => {
                if let Some(link) = typed::<LinkRecord>(raw, value, violations) {
                    decoded.links.insert(link_key, link);
                }
            }
            StoreKey::Bucket(bucket) => {
                // Panel buckets hold opaque state.
                if let Some(link_bucket) = bucket.link_bucket() {
                    if let Some(record) = typed::<Bucket>(raw, value, violations) {
                        decoded.buckets.insert(link_bucket, record);
                    }
                }
            }
            StoreKey::ViewRegistry => {
                decoded.registry = typed::<ViewRegistry>(raw, value, violations);
            }
            StoreKey::Journal => violation(
                violations,
                raw,
                ViolationKind::PendingJournal,
                "an interrupted write plan has not been recovered",
            ),
        }
    }
    decoded
}

fn check_singletons(decoded: &Decoded, root: ViewId, violations: &mut Vec<Violation>) {
    if !decoded.views.contains_key(&root) {
        violation(violations, root, ViolationKind::MissingSingleton, "root view is missing");
    }
    if decoded.registry.is_none() {
        violation(
            violations,
            StoreKey::ViewRegistry,
            ViolationKind::MissingSingleton,
            "view id registry is missing",
        );
    }
    for bucket in LinkBucket::ALL {
        if !decoded.buckets.contains_key(&bucket) {
            violation(violations, bucket, ViolationKind::MissingSingleton, "bucket is missing");
        }
    }
    if let Some(registry) = &decoded.registry {
        for id in registry.ids() {
            if !decoded.views.contains_key(id) {
                violation(
                    violations,
                    StoreKey::ViewRegistry,
                    ViolationKind::StaleRegistration,
                    format!("view {id} is registered but has no record"),
                );
            }
        }
    }
}

fn check_views(decoded: &Decoded, entries: &Entries, violations: &mut Vec<Violation>) {
    for (&id, view) in &decoded.views {
        if view.id != id {
            violation(violations, id, ViolationKind::KeyMismatch, format!("record says view {}", view.id));
        }
        for kind in PaneKind::ALL {
            let mut seen = HashSet::new();
            for &local in view.members(kind) {
                let pane_key = PaneKey::new(id, local, kind);
                if !seen.insert(local) {
                    violation(violations, id, ViolationKind::DuplicateMember, format!("{pane_key} listed twice"));
                } else if !entries.contains_key(&pane_key.to_string()) {
                    violation(violations, id, ViolationKind::DanglingPane, format!("lists missing pane {pane_key}"));
                }
            }
        }
        if let Some(parent) = view.parent {
            if !decoded.views.contains_key(&parent) {
                violation(violations, id, ViolationKind::MissingParent, format!("parent view {parent} is missing"));
            }
        }
        if let Some(registry) = &decoded.registry {
            if !registry.contains(id) {
                violation(violations, id, ViolationKind::UnregisteredView, "view id is not in the registry");
            }
        }
        if let Some(repeated) = parent_cycle(decoded, id) {
            violation(
                violations,
                id,
                ViolationKind::ParentCycle,
                format!("parent chain returns to view {repeated}"),
            );
        }
    }
}

fn parent_cycle(decoded: &Decoded, start: ViewId) -> Option<ViewId> {
    let mut seen = HashSet::from([start]);
    let mut current = decoded.views.get(&start).and_then(|v| v.parent);
    while let Some(id) = current {
        if !seen.insert(id) {
            return Some(id);
        }
        current = decoded.views.get(&id).and_then(|v| v.parent);
    }
    None
}

fn check_panes(decoded: &Decoded, violations: &mut Vec<Violation>) {
    for (&key, pane) in &decoded.panes {
        if pane.key() != key {
            violation(violations, key, ViolationKind::KeyMismatch, format!("record says {}", pane.key()));
        }
        let listed = decoded
            .views
            .get(&key.view)
            .is_some_and(|view| view.members(key.kind).contains(&key.local));
        if !listed {
            violation(violations, key, ViolationKind::OrphanPane, format!("view {} does not list it", key.view));
        }

        match &pane.body {
            PaneBody::Station { target } => match decoded.views.get(target) {
                None => violation(violations, key, ViolationKind::MissingTarget, format!("target view {target} is missing")),
                Some(view) if view.parent != Some(key.view) => violation(
                    violations,
                    key,
                    ViolationKind::ParentMismatch,
                    format!("target view {target} names parent {:?}", view.parent.map(|p| p.get())),
                ),
                Some(_) => {}
            },
            PaneBody::Item { .. } | PaneBody::Dummy {} => {}
        }
    }
}

/// Every owner's link list must resolve.
fn check_link_owners(decoded: &Decoded, entries: &Entries, violations: &mut Vec<Violation>) {
    let item_lists = decoded.panes.iter().filter_map(|(key, pane)| {
        let links = pane.links()?;
        Some((LinkOwner::item(key.view, key.local), key.to_string(), links))
    });
    let bucket_lists = decoded
        .buckets
        .iter()
        .map(|(&bucket, record)| (LinkOwner::Bucket(bucket), bucket.to_string(), record.links.as_slice()));

    for (owner, owner_key, links) in item_lists.chain(bucket_lists) {
        let mut seen = HashSet::new();
        for &index in links {
            let link_key = owner.link(index);
            if !seen.insert(index) {
                violation(violations, &owner_key, ViolationKind::DuplicateMember, format!("{link_key} listed twice"));
            } else if !entries.contains_key(&link_key.to_string()) {
                violation(violations, &owner_key, ViolationKind::DanglingLink, format!("lists missing link {link_key}"));
            }
        }
    }
}

fn check_links(decoded: &Decoded, violations: &mut Vec<Violation>) {
    for (&key, link) in &decoded.links {
        if link.id != key {
            violation(violations, key, ViolationKind::KeyMismatch, format!("record says {}", link.id));
        }
        let listed = match key.owner {
            LinkOwner::Item { view, local } => decoded
                .panes
                .get(&PaneKey::item(view, local))
                .and_then(Pane::links)
                .is_some_and(|links| links.contains(&key.index)),
            LinkOwner::Bucket(bucket) => decoded
                .buckets
                .get(&bucket)
                .is_some_and(|b| b.links.contains(&key.index)),
        };
        if !listed {
            violation(violations, key, ViolationKind::OrphanLink, format!("{} does not list it", key.owner));
        }
    }
}

impl<K: KvStore> HierarchicalStore<K> {
    /// Check every record in the store.
    pub async fn validate(&self) -> StoreResult<ValidationReport> {
        let entries = self.kv().get_all().await?;
        let report = StoreValidator::validate(&entries, self.config().root_view);
        if report.is_valid() {
            debug!(keys = report.key_count, "store is consistent");
        } else {
            warn!(violations = report.violations.len(), "store has integrity violations");
        }
        Ok(report)
    }
}
