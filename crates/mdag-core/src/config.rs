use serde::{Deserialize, Serialize};

use mdag_types::{DagError, DagResult};

/// Default byte threshold: 8 MiB.
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 8 << 20;

/// Default node threshold.
///
/// Some backends open one file per node during a batched write, so this
/// also bounds file descriptor use.
pub const DEFAULT_MAX_BUFFERED_NODES: usize = 128;

/// Number of flushes allowed in flight by default: twice the available
/// hardware parallelism.
pub fn default_parallel_flushes() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

/// Configuration for a [`Batch`](crate::Batch).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Flush once the buffered payload exceeds this many bytes.
    pub max_buffered_bytes: usize,
    /// Flush once more than this many nodes are buffered.
    pub max_buffered_nodes: usize,
    /// Upper bound on flushes dispatched but not yet acknowledged.
    pub max_parallel_flushes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_buffered_bytes: DEFAULT_MAX_BUFFERED_BYTES,
            max_buffered_nodes: DEFAULT_MAX_BUFFERED_NODES,
            max_parallel_flushes: default_parallel_flushes(),
        }
    }
}

impl BatchConfig {
    pub fn with_max_buffered_bytes(mut self, bytes: usize) -> Self {
        self.max_buffered_bytes = bytes;
        self
    }

    pub fn with_max_buffered_nodes(mut self, nodes: usize) -> Self {
        self.max_buffered_nodes = nodes;
        self
    }

    pub fn with_max_parallel_flushes(mut self, flushes: usize) -> Self {
        self.max_parallel_flushes = flushes;
        self
    }

    /// Reject settings a batch cannot run with.
    pub fn validate(&self) -> DagResult<()> {
        if self.max_parallel_flushes == 0 {
            return Err(DagError::InvalidConfig(
                "max_parallel_flushes must be at least 1".into(),
            ));
        }
        if self.max_buffered_nodes == 0 {
            return Err(DagError::InvalidConfig(
                "max_buffered_nodes must be at least 1".into(),
            ));
        }
        if self.max_buffered_bytes == 0 {
            return Err(DagError::InvalidConfig(
                "max_buffered_bytes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.max_buffered_bytes, 8 * 1024 * 1024);
        assert_eq!(config.max_buffered_nodes, 128);
        assert!(config.max_parallel_flushes >= 2);
        assert_eq!(config.max_parallel_flushes % 2, 0);
        config.validate().expect("defaults should be valid");
    }

    #[test]
    fn builder_overrides() {
        let config = BatchConfig::default()
            .with_max_buffered_bytes(1024)
            .with_max_buffered_nodes(4)
            .with_max_parallel_flushes(3);
        assert_eq!(config.max_buffered_bytes, 1024);
        assert_eq!(config.max_buffered_nodes, 4);
        assert_eq!(config.max_parallel_flushes, 3);
    }

    #[test]
    fn zero_values_are_rejected() {
        let base = BatchConfig::default();
        for config in [
            base.clone().with_max_parallel_flushes(0),
            base.clone().with_max_buffered_nodes(0),
            base.with_max_buffered_bytes(0),
        ] {
            assert!(matches!(
                config.validate(),
                Err(DagError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn serde_roundtrip() {
        let config = BatchConfig::default().with_max_buffered_nodes(7);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: BatchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
