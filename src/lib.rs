// Topolens - topology traversal and visual grouping engine

pub mod config;
pub mod topology;
pub mod visual;

pub use config::{EngineConfig, GroupingConfig, LayoutConfig};
pub use topology::{
    Device, GraphStore, InMemoryStore, Link, Path, PathAlgorithm, SearchMode, TopologyError,
};
pub use visual::{
    ConnectionClassification, Group, GroupCriterion, TopologyEngine, VisualEdge, VisualGraph,
    VisualNode,
};
