use thiserror::Error;

/// Errors produced while parsing or constructing store keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("empty key")]
    Empty,

    #[error("malformed key {key:?}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("invalid number {segment:?} in key {key:?}")]
    InvalidNumber { key: String, segment: String },

    #[error("unknown pane kind {0:?} (expected s, i or d)")]
    UnknownKind(String),

    #[error("not a link key: {0}")]
    NotALinkKey(String),

    #[error("{0} cannot own links")]
    LinksNotSupported(String),

    #[error("key {0} has no root segment")]
    Unrooted(String),
}

/// Result alias for key operations.
pub type Result<T> = std::result::Result<T, KeyError>;
