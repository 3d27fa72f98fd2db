//! Concurrency core of the Merkle DAG node layer.
//!
//! Two independent pieces sit on top of the store traits in `mdag-store`:
//!
//! - [`Batch`] -- buffers node writes and flushes them with bounded
//!   parallelism. The first failure is sticky.
//! - [`get_nodes`] / [`get_dag`] -- resolve a list of links with a single
//!   deduplicated fetch, handing back one [`NodePromise`] per requested
//!   position.
//!
//! [`copy_dag`] combines the two to copy a whole DAG between stores.

pub mod batch;
pub mod config;
pub mod copy;
pub mod fetch;
pub mod promise;

#[cfg(test)]
mod testing;

pub use batch::Batch;
pub use config::BatchConfig;
pub use copy::copy_dag;
pub use fetch::{find_links, get_dag, get_nodes};
pub use promise::NodePromise;
