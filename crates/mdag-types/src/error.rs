use thiserror::Error;

use crate::id::ContentId;

/// Errors produced by the DAG node layer.
///
/// `DagError` is `Clone` because a single failure is routinely delivered to
/// several observers: every promise waiting on the same identifier, or every
/// call made on a batch after it has failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DagError {
    /// The requested node is not present in the store.
    #[error("node not found: {0}")]
    NotFound(ContentId),

    /// The store rejected a write.
    #[error("store write failed: {0}")]
    Write(String),

    /// The store failed while reading.
    #[error("store read failed: {0}")]
    Read(String),

    /// The enclosing cancellation scope was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// No decoder is registered for the block's codec.
    #[error("unrecognized codec: {0:#x}")]
    UnknownCodec(u64),

    /// Path resolution was asked to follow an empty path.
    #[error("cannot resolve an empty path")]
    EmptyPath,

    /// The node has no link with the requested name.
    #[error("no link named {0:?}")]
    NoSuchLink(String),

    /// A block could not be decoded into a node.
    #[error("cannot decode {id}: {reason}")]
    Decode { id: ContentId, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DagError {
    /// Returns `true` if this error reports a missing node.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this error reports a cancelled scope.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result alias for DAG operations.
pub type DagResult<T> = Result<T, DagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_mentions_id() {
        let id = ContentId::raw(b"missing");
        let err = DagError::NotFound(id);
        assert!(err.is_not_found());
        assert!(!err.is_cancelled());
        assert!(err.to_string().contains(&id.to_hex()));
    }

    #[test]
    fn cancelled_is_detectable() {
        assert!(DagError::Cancelled.is_cancelled());
        assert!(!DagError::Write("disk full".into()).is_not_found());
    }

    #[test]
    fn unknown_codec_is_hex() {
        assert_eq!(
            DagError::UnknownCodec(0x55).to_string(),
            "unrecognized codec: 0x55"
        );
    }
}
