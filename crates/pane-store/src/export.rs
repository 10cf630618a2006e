//! Whole-store export and import.

use chrono::{DateTime, Utc};
use pane_keys::StoreKey;
use pane_kv::{Entries, KvStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::HierarchicalStore;
use crate::validation::{StoreValidator, ValidationReport};

/// Document version written by [`HierarchicalStore::export`].
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Every record of a store, keyed exactly as stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub entries: Entries,
}

/// How [`HierarchicalStore::import`] treats integrity violations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImportMode {
    /// Refuse a document with any violation.
    #[default]
    Validated,
    /// Import anyway and return the violations.
    Forced,
}

impl<K: KvStore> HierarchicalStore<K> {
    /// Snapshot every record except a pending journal.
    pub async fn export(&self) -> StoreResult<ExportDocument> {
        let _op = self.lock().await;
        let mut entries = self.kv().get_all().await?;
        if entries.remove(&StoreKey::Journal.to_string()).is_some() {
            warn!("export skipped a pending write plan");
        }
        info!(keys = entries.len(), "exported store");
        Ok(ExportDocument {
            format_version: EXPORT_FORMAT_VERSION,
            exported_at: Utc::now(),
            entries,
        })
    }

    /// Replace the whole store with `doc`.
    ///
    /// The document is written in one batch before keys it does not carry are
    /// removed, so a failed import never loses the records already stored.
    /// Nothing is written if the document is refused.
    pub async fn import(&self, doc: ExportDocument, mode: ImportMode) -> StoreResult<ValidationReport> {
        if doc.format_version != EXPORT_FORMAT_VERSION {
            return Err(StoreError::InvalidImport(format!(
                "unsupported format version {} (expected {EXPORT_FORMAT_VERSION})",
                doc.format_version
            )));
        }
        if doc.entries.contains_key(&StoreKey::Journal.to_string()) {
            return Err(StoreError::InvalidImport(
                "document carries a pending write plan".into(),
            ));
        }

        let report = StoreValidator::validate(&doc.entries, self.config().root_view);
        if !report.is_valid() {
            match mode {
                ImportMode::Validated => {
                    let first = &report.violations[0];
                    warn!(violations = report.violations.len(), "refusing import");
                    return Err(StoreError::InvalidImport(format!(
                        "{} violation(s), first at {}: {}",
                        report.violations.len(),
                        first.key,
                        first.description
                    )));
                }
                ImportMode::Forced => {
                    warn!(violations = report.violations.len(), "forcing import of inconsistent document");
                }
            }
        }

        let _op = self.lock().await;
        let count = doc.entries.len();
        let stale: Vec<String> = self
            .kv()
            .get_all()
            .await?
            .into_keys()
            .filter(|key| !doc.entries.contains_key(key))
            .collect();
        self.kv().set(doc.entries).await?;
        if !stale.is_empty() {
            self.kv().remove(&stale).await?;
        }
        info!(keys = count, removed = stale.len(), exported_at = %doc.exported_at, "imported store");
        Ok(report)
    }
}
