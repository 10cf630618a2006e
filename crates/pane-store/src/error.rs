use pane_keys::KeyError;
use pane_kv::KvError;

/// Errors produced by hierarchical store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A referenced record (view, pane, bucket, link) does not exist.
    #[error("referenced record missing: {key}")]
    Referential { key: String },

    /// The operation was refused before any write happened.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// A freshly allocated key is already occupied by a stale record.
    #[error("allocation conflict: {key} is already occupied")]
    AllocationConflict { key: String },

    /// Every id after the largest one in `scope` is out of range.
    #[error("no ids left to allocate in {scope}")]
    IdSpaceExhausted { scope: String },

    /// The record at `key` is not the kind the operation needs.
    #[error("{key} is a {actual}, expected {expected}")]
    WrongKind {
        key: String,
        expected: &'static str,
        actual: String,
    },

    /// The link key does not belong to the stated owner.
    #[error("link {link} is not owned by {owner}")]
    OwnerMismatch { owner: String, link: String },

    /// The owner record does not list the link index.
    #[error("{owner} does not list link index {index}")]
    NotListed { owner: String, index: u64 },

    /// The operation only applies to links held in the trash.
    #[error("link {0} is not in the trash")]
    NotInTrash(String),

    /// A record exists but does not decode as its key says it should.
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// A journaled write plan stopped part way; `recover` completes it.
    #[error("write plan {label:?} interrupted after {applied} of {total} steps: {source}")]
    PlanInterrupted {
        label: String,
        applied: usize,
        total: usize,
        #[source]
        source: KvError,
    },

    /// An earlier plan is still journaled; `recover` must complete it first.
    #[error("write plan {label:?} is still pending; recover the store first")]
    PendingPlan { label: String },

    /// An import document was refused.
    #[error("invalid import: {0}")]
    InvalidImport(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Kv(#[from] KvError),
}

impl StoreError {
    pub(crate) fn missing(key: impl ToString) -> Self {
        StoreError::Referential {
            key: key.to_string(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
