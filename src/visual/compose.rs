//! Group compositor
//!
//! Replaces grouped nodes with one synthetic node per group and reroutes the
//! edges that crossed a group boundary onto it. Nodes that can only be
//! reached through grouped nodes ("shadow" nodes) are hidden along with
//! their edges until the group is expanded.

use std::collections::{HashMap, HashSet};

use super::{pair_key, ConnectionKind, Group, VisualEdge, VisualNode, GROUP_PORT};
use crate::topology::{compute_depths, AdjacencyIndex, TopologyError, DEFAULT_LAYER};

/// Result of composing groups into a node/edge set.
#[derive(Clone, Debug, Default)]
pub struct Composition {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
    pub shadow_nodes: Vec<String>,
    /// Edges rerouted onto a group node (after deduplication).
    pub rewritten_edges: usize,
    /// Edges dropped as internal, hidden or collapsed into an existing group edge.
    pub dropped_edges: usize,
}

/// Apply `groups` to `nodes`/`edges`.
///
/// The root is always kept. Node order is preserved with group nodes
/// appended in group order; edges keep their relative order.
pub fn compose(
    nodes: &[VisualNode],
    edges: &[VisualEdge],
    groups: &[Group],
    root: &str,
) -> Result<Composition, TopologyError> {
    let index = AdjacencyIndex::build(
        nodes.iter().map(|n| n.id.as_str()),
        edges.iter().map(|e| (e.source.as_str(), e.target.as_str())),
    );
    let depths = compute_depths(&index, root)?;

    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (g, group) in groups.iter().enumerate() {
        for member in &group.members {
            if member != root {
                owner.entry(member.as_str()).or_insert(g);
            }
        }
    }

    // Shadow nodes: deeper than every grouped node, and every neighbor grouped.
    let cutoff = owner.keys().filter_map(|id| depths.get(*id)).max().copied();
    let shadow: HashSet<&str> = match cutoff {
        None => HashSet::new(),
        Some(cutoff) => nodes
            .iter()
            .filter(|n| n.id != root && !owner.contains_key(n.id.as_str()))
            .filter(|n| depths.get(&n.id).is_some_and(|d| *d > cutoff))
            .filter(|n| {
                let neighbors = index.neighbor_ids(&n.id);
                !neighbors.is_empty() && neighbors.iter().all(|m| owner.contains_key(m))
            })
            .map(|n| n.id.as_str())
            .collect(),
    };

    let mut layers: HashMap<&str, u32> = HashMap::new();
    let mut out_nodes: Vec<VisualNode> = nodes
        .iter()
        .filter(|n| {
            n.id == root
                || (!owner.contains_key(n.id.as_str()) && !shadow.contains(n.id.as_str()))
        })
        .cloned()
        .collect();
    for node in &out_nodes {
        layers.insert(node.id.as_str(), node.layer);
    }

    let by_id: HashMap<&str, &VisualNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut group_nodes = Vec::with_capacity(groups.len());
    for group in groups {
        let members = group.members.iter().filter_map(|m| by_id.get(m.as_str()));
        let layer = members.clone().map(|n| n.layer).min().unwrap_or(DEFAULT_LAYER);
        let depth = members.filter_map(|n| n.depth).min();
        group_nodes.push(VisualNode::for_group(group, layer, depth));
    }
    for node in &group_nodes {
        layers.insert(node.id.as_str(), node.layer);
    }

    let visible = |id: &str| by_id.contains_key(id) && !shadow.contains(id);
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
    let mut out_edges = Vec::with_capacity(edges.len());
    let mut rewritten = 0;
    let mut dropped = 0;

    for edge in edges {
        let source_group = owner.get(edge.source.as_str()).map(|&g| groups[g].id.as_str());
        let target_group = owner.get(edge.target.as_str()).map(|&g| groups[g].id.as_str());

        let candidate = match (source_group, target_group) {
            (None, None) => {
                if visible(edge.source.as_str()) && visible(edge.target.as_str()) {
                    out_edges.push(edge.clone());
                } else {
                    dropped += 1;
                }
                continue;
            }
            (Some(a), Some(b)) if a == b => None,
            (Some(group), None) if visible(edge.target.as_str()) => {
                let mut e = edge.clone();
                e.id = format!("{}-{}", group, edge.target);
                e.source = group.to_string();
                e.local_port = GROUP_PORT.to_string();
                Some(e)
            }
            (None, Some(group)) if visible(edge.source.as_str()) => {
                let mut e = edge.clone();
                e.id = format!("{}-{}", edge.source, group);
                e.target = group.to_string();
                e.remote_port = GROUP_PORT.to_string();
                Some(e)
            }
            (Some(a), Some(b)) => {
                let mut e = edge.clone();
                e.id = format!("{}-{}", a, b);
                e.source = a.to_string();
                e.target = b.to_string();
                e.local_port = GROUP_PORT.to_string();
                e.remote_port = GROUP_PORT.to_string();
                Some(e)
            }
            _ => None,
        };

        match candidate {
            Some(mut e) if seen_pairs.insert(e.endpoint_key()) => {
                let source_layer = layers.get(e.source.as_str()).copied().unwrap_or_default();
                let target_layer = layers.get(e.target.as_str()).copied().unwrap_or_default();
                e.connection = ConnectionKind::classify(source_layer, target_layer);
                out_edges.push(e);
                rewritten += 1;
            }
            _ => dropped += 1,
        }
    }

    let mut shadow_nodes: Vec<String> = shadow.iter().map(|s| s.to_string()).collect();
    shadow_nodes.sort();
    out_nodes.extend(group_nodes);

    Ok(Composition {
        nodes: out_nodes,
        edges: out_edges,
        shadow_nodes,
        rewritten_edges: rewritten,
        dropped_edges: dropped,
    })
}

/// True if a rewritten edge between these endpoints is already present.
pub(crate) fn has_pair(edges: &[VisualEdge], a: &str, b: &str) -> bool {
    let key = pair_key(a, b);
    edges.iter().any(|e| e.endpoint_key() == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Device, Link};
    use crate::visual::{GroupCriterion, GROUP_KIND};

    fn node(id: &str, layer: u32, depth: usize) -> VisualNode {
        VisualNode::from_device(&Device::new(id, "switch").with_layer(layer), "root", Some(depth))
    }

    fn edge(id: &str, s: &str, t: &str) -> VisualEdge {
        VisualEdge::from_link(&Link::new(id, s, t), ConnectionKind::Peer)
    }

    fn group(id: &str, members: &[&str]) -> Group {
        Group {
            id: id.to_string(),
            label: format!("{} ({})", id, members.len()),
            criterion: GroupCriterion::Prefix("x-".into()),
            members: members.iter().map(|m| m.to_string()).collect(),
            depth_threshold: 2,
            internal_edges: 0,
            external_edges: Vec::new(),
        }
    }

    fn ids(nodes: &[VisualNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// root - d1 - {a1, a2}, root - d2 - a3, a1 - a2, a1 - leaf
    fn sample() -> (Vec<VisualNode>, Vec<VisualEdge>) {
        let nodes = vec![
            node("root", 1, 0),
            node("d1", 2, 1),
            node("d2", 2, 1),
            node("a1", 3, 2),
            node("a2", 3, 2),
            node("a3", 4, 2),
            node("leaf", 5, 3),
        ];
        let edges = vec![
            edge("r-d1", "root", "d1"),
            edge("r-d2", "root", "d2"),
            edge("d1-a1", "d1", "a1"),
            edge("d1-a2", "d1", "a2"),
            edge("d2-a3", "d2", "a3"),
            edge("a1-a2", "a1", "a2"),
            edge("a1-leaf", "a1", "leaf"),
        ];
        (nodes, edges)
    }

    #[test]
    fn test_compose_reroutes_and_dedups() {
        let (nodes, edges) = sample();
        let out = compose(&nodes, &edges, &[group("g", &["a1", "a2", "a3"])], "root").unwrap();

        assert_eq!(ids(&out.nodes), vec!["root", "d1", "d2", "g"]);
        let edge_ids: Vec<&str> = out.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(edge_ids, vec!["r-d1", "r-d2", "d1-g", "d2-g"]);
        assert_eq!(out.rewritten_edges, 2);
        // d1-a2 collapsed, a1-a2 internal, a1-leaf hidden
        assert_eq!(out.dropped_edges, 3);
        assert_eq!(out.shadow_nodes, vec!["leaf"]);

        let d1_g = &out.edges[2];
        assert_eq!(d1_g.remote_port, GROUP_PORT);
        assert_eq!(d1_g.target, "g");
    }

    #[test]
    fn test_group_node_takes_min_member_layer() {
        let (nodes, edges) = sample();
        let out = compose(&nodes, &edges, &[group("g", &["a1", "a2", "a3"])], "root").unwrap();
        let g = out.nodes.iter().find(|n| n.id == "g").unwrap();
        assert_eq!(g.kind, GROUP_KIND);
        assert_eq!(g.layer, 3);
        assert_eq!(g.depth, Some(2));
        let d1_g = out.edges.iter().find(|e| e.id == "d1-g").unwrap();
        assert_eq!(d1_g.connection, ConnectionKind::Uplink);
    }

    #[test]
    fn test_edges_between_groups_become_one_group_edge() {
        let (nodes, mut edges) = sample();
        edges.push(edge("a2-a3", "a2", "a3"));
        edges.push(edge("a3-a1", "a3", "a1"));
        let out = compose(
            &nodes,
            &edges,
            &[group("g1", &["a1", "a2"]), group("g2", &["a3"])],
            "root",
        )
        .unwrap();

        let between: Vec<&VisualEdge> = out
            .edges
            .iter()
            .filter(|e| e.touches("g1") && e.touches("g2"))
            .collect();
        assert_eq!(between.len(), 1);
        assert_eq!(between[0].id, "g1-g2");
    }

    #[test]
    fn test_node_with_plain_neighbor_is_not_shadowed() {
        let (nodes, mut edges) = sample();
        edges.push(edge("d2-leaf", "d2", "leaf"));
        let out = compose(&nodes, &edges, &[group("g", &["a1", "a2"])], "root").unwrap();
        assert!(out.shadow_nodes.is_empty());
        assert!(out.nodes.iter().any(|n| n.id == "leaf"));
        assert!(out.edges.iter().any(|e| e.id == "g-leaf"));
    }

    #[test]
    fn test_root_is_never_grouped() {
        let (nodes, edges) = sample();
        let out = compose(&nodes, &edges, &[group("g", &["root", "a1", "a2"])], "root").unwrap();
        assert!(out.nodes.iter().any(|n| n.id == "root"));
        assert!(out.edges.iter().any(|e| e.id == "r-d1"));
    }

    #[test]
    fn test_missing_root_is_invalid() {
        let (nodes, edges) = sample();
        let err = compose(&nodes, &edges, &[], "ghost").unwrap_err();
        assert!(matches!(err, TopologyError::InvalidRoot(_)));
    }

    #[test]
    fn test_output_has_no_dangling_edges() {
        let (nodes, edges) = sample();
        let out = compose(&nodes, &edges, &[group("g", &["a1", "a2", "a3"])], "root").unwrap();
        let present: HashSet<&str> = out.nodes.iter().map(|n| n.id.as_str()).collect();
        for e in &out.edges {
            assert!(present.contains(e.source.as_str()), "{}", e.id);
            assert!(present.contains(e.target.as_str()), "{}", e.id);
        }
        assert!(has_pair(&out.edges, "g", "d2"));
    }
}
