//! Breadth-first hop-depth labeling relative to a root

use std::collections::{BTreeMap, VecDeque};

use super::graph::AdjacencyIndex;
use super::TopologyError;

/// Node id -> hop count from the root. Unreachable nodes are absent.
pub type DepthMap = BTreeMap<String, usize>;

/// Label every node reachable from `root` with its hop count.
///
/// Edges are undirected. BFS layers are exact shortest hop counts, so the
/// result does not depend on the order in which neighbors are visited.
pub fn compute_depths(index: &AdjacencyIndex, root: &str) -> Result<DepthMap, TopologyError> {
    let root_pos = index
        .position(root)
        .ok_or_else(|| TopologyError::InvalidRoot(root.to_string()))?;

    let mut depth: Vec<Option<usize>> = vec![None; index.len()];
    depth[root_pos] = Some(0);
    let mut queue = VecDeque::from([root_pos]);

    while let Some(current) = queue.pop_front() {
        let next = depth[current].unwrap_or(0) + 1;
        for adjacent in index.adjacent(current) {
            if depth[adjacent.node].is_none() {
                depth[adjacent.node] = Some(next);
                queue.push_back(adjacent.node);
            }
        }
    }

    Ok(depth
        .into_iter()
        .enumerate()
        .filter_map(|(pos, d)| d.map(|d| (index.id(pos).to_string(), d)))
        .collect())
}
