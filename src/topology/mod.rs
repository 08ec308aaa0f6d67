//! Device topology: devices, links and the algorithms that walk them
//!
//! This module holds the graph-side half of the engine: the device/link data
//! model, an undirected adjacency index, hop-depth labeling, reachability and
//! weighted path search, and the `GraphStore` boundary the engine reads from.

pub mod depth;
pub mod graph;
pub mod model;
pub mod search;
pub mod store;

pub use depth::{compute_depths, DepthMap};
pub use graph::{Adjacent, AdjacencyIndex, TopologyGraph};
pub use model::{Device, Link, Path, PathAlgorithm, SearchMode, DEFAULT_LAYER};
pub use store::{CachingStore, GraphStore, InMemoryStore, TopologySnapshot};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Root not found: {0}")]
    RootNotFound(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("No path exists from {from} to {to}")]
    NoPathExists { from: String, to: String },

    /// The root is missing from a node set handed to an algorithm. This is an
    /// upstream bug, not a client mistake.
    #[error("Invalid root: {0} is not part of the supplied node set")]
    InvalidRoot(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Invalid weight {weight} on link {link}")]
    InvalidWeight { link: String, weight: f64 },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Graph store adapter failure, passed through untouched.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl TopologyError {
    /// Errors caused by the caller's input rather than by the engine or the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TopologyError::RootNotFound(_)
                | TopologyError::NodeNotFound(_)
                | TopologyError::GroupNotFound(_)
                | TopologyError::InvalidWeight { .. }
        )
    }

    /// Errors that should be reported to a client as an empty "not found" result.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TopologyError::RootNotFound(_)
                | TopologyError::NodeNotFound(_)
                | TopologyError::NoPathExists { .. }
                | TopologyError::GroupNotFound(_)
        )
    }
}
