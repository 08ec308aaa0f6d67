//! Visual graph model
//!
//! A `VisualGraph` is what gets rendered: plain device nodes, synthetic
//! group nodes standing in for collapsed leaves, the edges between them and
//! a position per node. It is built fresh per request and never mutated in
//! place by the engine; expansion produces a new value.

pub mod cluster;
pub mod compose;
pub mod connections;
pub mod engine;
pub mod expand;
pub mod layout;
pub mod trace;

pub use cluster::{cluster_candidates, select_candidates, GroupIdAllocator};
pub use compose::{compose, Composition};
pub use connections::{classify_connections, ConnectionClassification, ConnectionInfo};
pub use engine::TopologyEngine;
pub use expand::{expand_group, Expansion, ExpansionAccumulator};
pub use layout::assign_positions;
pub use trace::{RecordingSink, TraceEvent, TraceSink};

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::topology::{Device, Link, TopologyError};

/// Structural type carried by synthetic group nodes.
pub const GROUP_KIND: &str = "group";

/// Port label used on the group side of a rewritten edge.
pub const GROUP_PORT: &str = "group";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Direction of a link relative to the layer hierarchy.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Source sits on a more upstream layer than the target.
    Uplink,
    Downlink,
    Peer,
}

impl ConnectionKind {
    pub fn classify(source_layer: u32, target_layer: u32) -> Self {
        match source_layer.cmp(&target_layer) {
            std::cmp::Ordering::Less => ConnectionKind::Uplink,
            std::cmp::Ordering::Greater => ConnectionKind::Downlink,
            std::cmp::Ordering::Equal => ConnectionKind::Peer,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VisualNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub hardware: String,
    pub layer: u32,
    /// Relative to the request that produced the graph; never stored.
    pub is_root: bool,
    /// Hop depth from the root, if the node was reachable in the extracted subgraph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(default)]
    pub position: Position,
}

impl VisualNode {
    pub fn from_device(device: &Device, root: &str, depth: Option<usize>) -> Self {
        Self {
            id: device.id.clone(),
            name: device.display_name().to_string(),
            kind: device.kind.clone(),
            hardware: device.hardware.clone(),
            layer: device.layer(),
            is_root: device.id == root,
            depth,
            position: Position::default(),
        }
    }

    /// Synthetic node for a group, placed on `layer` at its shallowest member's depth.
    pub fn for_group(group: &Group, layer: u32, depth: Option<usize>) -> Self {
        Self {
            id: group.id.clone(),
            name: group.label.clone(),
            kind: GROUP_KIND.to_string(),
            hardware: String::new(),
            layer,
            is_root: false,
            depth,
            position: Position::default(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == GROUP_KIND
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VisualEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub local_port: String,
    #[serde(default)]
    pub remote_port: String,
    pub weight: f64,
    pub connection: ConnectionKind,
}

impl VisualEdge {
    pub fn from_link(link: &Link, connection: ConnectionKind) -> Self {
        Self {
            id: link.id.clone(),
            source: link.source.clone(),
            target: link.target.clone(),
            local_port: link.local_port.clone(),
            remote_port: link.remote_port.clone(),
            weight: link.weight,
            connection,
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

    /// Endpoints as an unordered pair, for deduplicating parallel edges.
    pub fn endpoint_key(&self) -> (String, String) {
        pair_key(&self.source, &self.target)
    }
}

pub(crate) fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// What the members of a group have in common.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "criterion", content = "value", rename_all = "snake_case")]
pub enum GroupCriterion {
    Prefix(String),
    Type(String),
    /// Inclusive depth range.
    DepthBand { from: usize, to: usize },
}

impl GroupCriterion {
    /// Short tag used in generated group ids.
    pub fn tag(&self) -> &'static str {
        match self {
            GroupCriterion::Prefix(_) => "prefix",
            GroupCriterion::Type(_) => "type",
            GroupCriterion::DepthBand { .. } => "depth",
        }
    }

    pub fn label(&self, count: usize) -> String {
        match self {
            GroupCriterion::Prefix(prefix) => format!("{}* ({})", prefix, count),
            GroupCriterion::Type(kind) => format!("{} ({})", title_case(kind), count),
            GroupCriterion::DepthBand { from, to } if from == to => {
                format!("Depth-{} ({})", from, count)
            }
            GroupCriterion::DepthBand { from, to } => format!("Depth-{}-{} ({})", from, to, count),
        }
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A set of collapsed nodes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Group {
    pub id: String,
    pub label: String,
    pub criterion: GroupCriterion,
    pub members: Vec<String>,
    /// The minimum candidate depth in force when the group was formed.
    pub depth_threshold: usize,
    /// Edges with both endpoints in the group.
    pub internal_edges: usize,
    /// Ids of edges with exactly one endpoint in the group.
    pub external_edges: Vec<String>,
}

impl Group {
    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct TopologyStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_groups: usize,
    /// Node count per layer.
    pub layers: BTreeMap<u32, usize>,
}

impl TopologyStats {
    pub fn compute(nodes: &[VisualNode], edges: &[VisualEdge], groups: &[Group]) -> Self {
        let mut layers = BTreeMap::new();
        for node in nodes {
            *layers.entry(node.layer).or_insert(0) += 1;
        }
        Self {
            total_nodes: nodes.len(),
            total_edges: edges.len(),
            total_groups: groups.len(),
            layers,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VisualGraph {
    pub root: String,
    pub radius: usize,
    pub generated_at: DateTime<Utc>,
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
    pub groups: Vec<Group>,
    pub stats: TopologyStats,
}

impl VisualGraph {
    pub fn new(
        root: impl Into<String>,
        radius: usize,
        nodes: Vec<VisualNode>,
        edges: Vec<VisualEdge>,
        groups: Vec<Group>,
    ) -> Self {
        let stats = TopologyStats::compute(&nodes, &edges, &groups);
        Self {
            root: root.into(),
            radius,
            generated_at: Utc::now(),
            nodes,
            edges,
            groups,
            stats,
        }
    }

    pub fn node(&self, id: &str) -> Option<&VisualNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn edge_between(&self, a: &str, b: &str) -> Option<&VisualEdge> {
        self.edges
            .iter()
            .find(|e| (e.source == a && e.target == b) || (e.source == b && e.target == a))
    }

    /// Ids of plain (non-group) nodes.
    pub fn plain_node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|n| !n.is_group())
            .map(|n| n.id.as_str())
    }

    pub fn refresh_stats(&mut self) {
        self.stats = TopologyStats::compute(&self.nodes, &self.edges, &self.groups);
    }

    /// Check the structural invariants every rendered graph must hold:
    /// node ids are unique, every edge endpoint is a node, group member
    /// sets are pairwise disjoint, no member is also a plain node, and
    /// every group has its synthetic node.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(TopologyError::InvariantViolation(format!(
                    "duplicate node {}",
                    node.id
                )));
            }
        }

        for edge in &self.edges {
            for end in [&edge.source, &edge.target] {
                if !node_ids.contains(end.as_str()) {
                    return Err(TopologyError::InvariantViolation(format!(
                        "edge {} references missing node {}",
                        edge.id, end
                    )));
                }
            }
        }

        let mut owner: HashMap<&str, &str> = HashMap::new();
        for group in &self.groups {
            if !node_ids.contains(group.id.as_str()) {
                return Err(TopologyError::InvariantViolation(format!(
                    "group {} has no node",
                    group.id
                )));
            }
            for member in &group.members {
                if let Some(other) = owner.insert(member.as_str(), group.id.as_str()) {
                    return Err(TopologyError::InvariantViolation(format!(
                        "{} is a member of both {} and {}",
                        member, other, group.id
                    )));
                }
                if node_ids.contains(member.as_str()) {
                    return Err(TopologyError::InvariantViolation(format!(
                        "{} is both a plain node and a member of {}",
                        member, group.id
                    )));
                }
            }
        }

        Ok(())
    }

    /// SHA-256 over the graph's structural content. Independent of list
    /// order, positions and the generation timestamp.
    pub fn fingerprint(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for node in &self.nodes {
            lines.push(format!(
                "node\x1f{}\x1f{}\x1f{}\x1f{}",
                node.id, node.kind, node.name, node.layer
            ));
        }
        for edge in &self.edges {
            let (a, b) = edge.endpoint_key();
            lines.push(format!("edge\x1f{}\x1f{}\x1f{}", edge.id, a, b));
        }
        for group in &self.groups {
            let mut members = group.members.clone();
            members.sort();
            lines.push(format!("group\x1f{}\x1f{}", group.id, members.join(",")));
        }
        lines.sort();

        let mut hasher = Sha256::new();
        hasher.update(self.root.as_bytes());
        for line in &lines {
            hasher.update(b"\n");
            hasher.update(line.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
