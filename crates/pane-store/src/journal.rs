//! Journaled write plans.
//!
//! A multi-step mutation (deleting an item with links, moving a link to the
//! trash, creating a station and its view) is first computed in full as an
//! ordered list of [`Step`]s. Every step carries its complete final value, so
//! replaying a step that already landed is harmless.
//!
//! Applying a plan:
//!
//! ```text
//! 1. set   journal = plan
//! 2. apply step 1 .. step N, one backend call each, in order
//! 3. remove journal
//! ```
//!
//! If the process stops between 1 and 3 the journal survives and
//! [`HierarchicalStore::recover`](crate::HierarchicalStore::recover) replays
//! the whole plan on next open. Plans put copies before the removals they
//! replace, so an interrupted plan can leave a duplicate but never a loss.

use pane_keys::StoreKey;
use pane_kv::{Entries, KvStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// One idempotent write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Step {
    Put { key: StoreKey, value: Value },
    Delete { key: StoreKey },
}

impl Step {
    pub fn key(&self) -> &StoreKey {
        match self {
            Step::Put { key, .. } | Step::Delete { key } => key,
        }
    }
}

/// An ordered list of writes that together form one store operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WritePlan {
    /// Short description used in logs and errors.
    pub label: String,
    pub steps: Vec<Step>,
}

impl WritePlan {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            steps: Vec::new(),
        }
    }

    /// Append a write of `record` at `key`.
    pub fn put<T: Serialize>(&mut self, key: impl Into<StoreKey>, record: &T) -> StoreResult<&mut Self> {
        let key = key.into();
        let value = serde_json::to_value(record).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.steps.push(Step::Put { key, value });
        Ok(self)
    }

    /// Append a removal of `key`.
    pub fn delete(&mut self, key: impl Into<StoreKey>) -> &mut Self {
        self.steps.push(Step::Delete { key: key.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Keys written or removed by this plan, in step order.
    pub fn touched_keys(&self) -> Vec<StoreKey> {
        self.steps.iter().map(|s| *s.key()).collect()
    }
}

/// Apply `plan` against `kv`, journaling it when it has more than one step.
///
/// Refused with [`StoreError::PendingPlan`] while an interrupted plan is still
/// journaled; that plan has to be completed by a replay first.
pub(crate) async fn apply_plan<K: KvStore + ?Sized>(kv: &K, plan: &WritePlan) -> StoreResult<()> {
    if plan.is_empty() {
        return Ok(());
    }
    if let Some(pending) = pending_plan(kv).await? {
        warn!(plan = %plan.label, pending = %pending.label, "refusing write while a plan is pending");
        return Err(StoreError::PendingPlan {
            label: pending.label,
        });
    }
    run_plan(kv, plan).await
}

/// Re-apply a plan read back from the journal.
pub(crate) async fn replay_plan<K: KvStore + ?Sized>(kv: &K, plan: &WritePlan) -> StoreResult<()> {
    run_plan(kv, plan).await?;
    // A one-step plan is never journaled by `run_plan`, so clear explicitly.
    kv.remove_one(&StoreKey::Journal.to_string()).await?;
    Ok(())
}

async fn run_plan<K: KvStore + ?Sized>(kv: &K, plan: &WritePlan) -> StoreResult<()> {
    let journaled = plan.len() > 1;
    if journaled {
        let record = serde_json::to_value(plan).map_err(|e| StoreError::Corrupt {
            key: StoreKey::Journal.to_string(),
            reason: e.to_string(),
        })?;
        kv.set_one(&StoreKey::Journal.to_string(), record).await?;
    }

    for (applied, step) in plan.steps.iter().enumerate() {
        if let Err(source) = apply_step(kv, step).await {
            warn!(
                plan = %plan.label,
                applied,
                total = plan.len(),
                error = %source,
                "write plan interrupted"
            );
            return Err(StoreError::PlanInterrupted {
                label: plan.label.clone(),
                applied,
                total: plan.len(),
                source,
            });
        }
        debug!(plan = %plan.label, step = applied, key = %step.key(), "applied step");
    }

    if journaled {
        kv.remove_one(&StoreKey::Journal.to_string()).await?;
    }
    Ok(())
}

async fn apply_step<K: KvStore + ?Sized>(kv: &K, step: &Step) -> Result<(), pane_kv::KvError> {
    match step {
        Step::Put { key, value } => {
            let mut entries = Entries::new();
            entries.insert(key.to_string(), value.clone());
            kv.set(entries).await
        }
        Step::Delete { key } => kv.remove_one(&key.to_string()).await,
    }
}

/// Read the pending plan, if an earlier run left one behind.
pub(crate) async fn pending_plan<K: KvStore + ?Sized>(kv: &K) -> StoreResult<Option<WritePlan>> {
    let key = StoreKey::Journal.to_string();
    match kv.get_one(&key).await? {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key,
                reason: e.to_string(),
            }),
    }
}
