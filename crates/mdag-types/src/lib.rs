//! Foundation types for the Merkle DAG node layer.
//!
//! Every other `mdag` crate depends on `mdag-types`.
//!
//! # Key Types
//!
//! - [`ContentId`] — Codec-tagged BLAKE3 identifier of a node's encoding
//! - [`Link`] — Named, sized edge to another node
//! - [`Node`] — Immutable node trait, with [`RawNode`] and [`LinkedNode`]
//! - [`BlockDecoder`] — Codec-keyed registry turning [`Block`]s into nodes
//! - [`CancelScope`] — Hierarchical cancellation shared by batches and fetches
//! - [`DagError`] — The error type for the whole layer

pub mod codec;
pub mod error;
pub mod id;
pub mod link;
pub mod node;
pub mod scope;

pub use codec::{Block, BlockDecoder, DecodeFn};
pub use error::{DagError, DagResult};
pub use id::ContentId;
pub use link::Link;
pub use node::{LinkedNode, Node, NodeRef, NodeStat, RawNode};
pub use scope::CancelScope;
