//! Node store interfaces for the Merkle DAG node layer.
//!
//! The batching and fetching machinery in `mdag-core` never talks to a
//! concrete store; it consumes these traits:
//!
//! - [`NodeGetter`] -- single and streamed multi-node reads
//! - [`NodeAdder`] -- single and batched writes
//! - [`LinkGetter`] -- optional fast lookup of a node's link table
//! - [`DagService`] -- both, plus removal
//!
//! [`MemoryDag`] is a `HashMap`-backed implementation for tests and embedding.
//!
//! # Contract
//!
//! 1. Nodes are immutable; writing a node twice is a no-op.
//! 2. All methods may be called concurrently.
//! 3. `get_many` answers incrementally and in any order, and may close early.
//! 4. Every method honours the [`CancelScope`](mdag_types::CancelScope) it is given.

pub mod memory;
pub mod traits;

pub use memory::MemoryDag;
pub use traits::{DagService, LinkGetter, NodeAdder, NodeGetter, NodeOption};
