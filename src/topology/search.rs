//! Reachability and weighted path search
//!
//! Both operate on a `TopologyGraph` already loaded from the store. Link
//! weights are assumed valid here; negative weights are rejected when links
//! enter a store.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};

use super::graph::TopologyGraph;
use super::model::{Device, Path, PathAlgorithm, SearchMode};
use super::TopologyError;

/// Devices reachable from `start` within `max_hops` (0 = unbounded),
/// excluding `start` itself, in traversal order.
///
/// BFS and DFS return the same set for the same bound. DFS re-enters a node
/// when it finds a shallower route to it, otherwise a deep first branch
/// could exhaust the hop budget before a short branch reaches the node.
pub fn reachable(
    graph: &TopologyGraph,
    start: &str,
    max_hops: usize,
    mode: SearchMode,
) -> Result<Vec<Device>, TopologyError> {
    let start_pos = graph
        .index()
        .position(start)
        .ok_or_else(|| TopologyError::NodeNotFound(start.to_string()))?;
    let limit = if max_hops == 0 { usize::MAX } else { max_hops };

    let order = match mode {
        SearchMode::Bfs => bfs_order(graph, start_pos, limit),
        SearchMode::Dfs => dfs_order(graph, start_pos, limit),
    };

    Ok(order
        .into_iter()
        .map(|pos| graph.device_at(pos).clone())
        .collect())
}

fn bfs_order(graph: &TopologyGraph, start: usize, limit: usize) -> Vec<usize> {
    let index = graph.index();
    let mut depth: Vec<Option<usize>> = vec![None; index.len()];
    depth[start] = Some(0);
    let mut queue = VecDeque::from([start]);
    let mut order = Vec::new();

    while let Some(current) = queue.pop_front() {
        let hops = depth[current].unwrap_or(0);
        if hops >= limit {
            continue;
        }
        for adjacent in index.adjacent(current) {
            if depth[adjacent.node].is_none() {
                depth[adjacent.node] = Some(hops + 1);
                order.push(adjacent.node);
                queue.push_back(adjacent.node);
            }
        }
    }

    order
}

fn dfs_order(graph: &TopologyGraph, start: usize, limit: usize) -> Vec<usize> {
    let index = graph.index();
    let mut best: Vec<Option<usize>> = vec![None; index.len()];
    best[start] = Some(0);
    let mut stack = vec![(start, 0usize)];
    let mut order = Vec::new();

    while let Some((current, hops)) = stack.pop() {
        // Stale entry: a shallower route was found after this was pushed.
        if best[current].is_some_and(|b| b < hops) || hops >= limit {
            continue;
        }
        // Reverse so the first neighbor is explored first.
        for adjacent in index.adjacent(current).iter().rev() {
            let next = hops + 1;
            match best[adjacent.node] {
                Some(b) if b <= next => {}
                previous => {
                    if previous.is_none() {
                        order.push(adjacent.node);
                    }
                    best[adjacent.node] = Some(next);
                    stack.push((adjacent.node, next));
                }
            }
        }
    }

    order
}

/// A path as positions into the graph's device and link arrays.
#[derive(Clone, Debug)]
struct RawPath {
    nodes: Vec<usize>,
    edges: Vec<usize>,
    cost: f64,
}

impl RawPath {
    fn same_route(&self, other: &RawPath) -> bool {
        self.nodes == other.nodes && self.edges == other.edges
    }
}

/// Heap entry. Lower cost pops first; equal costs pop in insertion order.
#[derive(PartialEq)]
struct State {
    cost: f64,
    seq: usize,
    node: usize,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra from `source` to `target` avoiding the banned nodes and edges.
/// A distance is only replaced by a strictly smaller one, so the first
/// discovered of several equal-cost routes wins.
fn dijkstra(
    graph: &TopologyGraph,
    source: usize,
    target: usize,
    banned_nodes: &HashSet<usize>,
    banned_edges: &HashSet<usize>,
) -> Option<RawPath> {
    let index = graph.index();
    let mut dist = vec![f64::INFINITY; index.len()];
    // (previous node, edge taken)
    let mut prev: Vec<Option<(usize, usize)>> = vec![None; index.len()];
    let mut settled = vec![false; index.len()];
    let mut heap = BinaryHeap::new();
    let mut seq = 0;

    dist[source] = 0.0;
    heap.push(State {
        cost: 0.0,
        seq,
        node: source,
    });

    while let Some(State { cost, node, .. }) = heap.pop() {
        if settled[node] {
            continue;
        }
        settled[node] = true;
        if node == target {
            break;
        }

        for adjacent in index.adjacent(node) {
            if settled[adjacent.node]
                || banned_edges.contains(&adjacent.edge)
                || banned_nodes.contains(&adjacent.node)
            {
                continue;
            }
            let next = cost + graph.link_at(adjacent.edge).weight;
            if next < dist[adjacent.node] {
                dist[adjacent.node] = next;
                prev[adjacent.node] = Some((node, adjacent.edge));
                seq += 1;
                heap.push(State {
                    cost: next,
                    seq,
                    node: adjacent.node,
                });
            }
        }
    }

    if !settled[target] {
        return None;
    }

    let mut nodes = vec![target];
    let mut edges = Vec::new();
    let mut current = target;
    while let Some((previous, edge)) = prev[current] {
        nodes.push(previous);
        edges.push(edge);
        current = previous;
    }
    nodes.reverse();
    edges.reverse();

    Some(RawPath {
        cost: path_cost(graph, &edges),
        nodes,
        edges,
    })
}

fn path_cost(graph: &TopologyGraph, edges: &[usize]) -> f64 {
    edges.iter().map(|&e| graph.link_at(e).weight).sum()
}

/// Yen's algorithm: up to `k` loopless paths in increasing cost order.
fn yen(graph: &TopologyGraph, source: usize, target: usize, k: usize) -> Vec<RawPath> {
    let mut accepted = Vec::new();
    let Some(first) = dijkstra(graph, source, target, &HashSet::new(), &HashSet::new()) else {
        return accepted;
    };
    accepted.push(first);
    let mut candidates: Vec<RawPath> = Vec::new();

    while accepted.len() < k {
        let Some(last) = accepted.last().cloned() else {
            break;
        };

        for i in 0..last.edges.len() {
            let spur = last.nodes[i];
            let root_nodes = &last.nodes[..=i];
            let root_edges = &last.edges[..i];

            let banned_edges: HashSet<usize> = accepted
                .iter()
                .filter(|p| {
                    p.edges.len() > i && p.nodes[..=i] == *root_nodes && p.edges[..i] == *root_edges
                })
                .map(|p| p.edges[i])
                .collect();
            let banned_nodes: HashSet<usize> = root_nodes[..i].iter().copied().collect();

            let Some(spur_path) = dijkstra(graph, spur, target, &banned_nodes, &banned_edges)
            else {
                continue;
            };

            let mut nodes = root_nodes[..i].to_vec();
            nodes.extend(spur_path.nodes);
            let mut edges = root_edges.to_vec();
            edges.extend(spur_path.edges);
            let candidate = RawPath {
                cost: path_cost(graph, &edges),
                nodes,
                edges,
            };

            let known = accepted
                .iter()
                .chain(candidates.iter())
                .any(|p| p.same_route(&candidate));
            if !known {
                candidates.push(candidate);
            }
        }

        // min_by keeps the earliest of equal candidates.
        let best = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.cost
                    .total_cmp(&b.cost)
                    .then_with(|| a.edges.len().cmp(&b.edges.len()))
            })
            .map(|(pos, _)| pos);

        match best {
            Some(pos) => accepted.push(candidates.remove(pos)),
            None => break,
        }
    }

    accepted
}

fn endpoints(
    graph: &TopologyGraph,
    from: &str,
    to: &str,
) -> Result<(usize, usize), TopologyError> {
    let index = graph.index();
    let source = index
        .position(from)
        .ok_or_else(|| TopologyError::NodeNotFound(from.to_string()))?;
    let target = index
        .position(to)
        .ok_or_else(|| TopologyError::NodeNotFound(to.to_string()))?;
    Ok((source, target))
}

fn to_path(graph: &TopologyGraph, raw: RawPath) -> Path {
    Path {
        devices: raw.nodes.iter().map(|&n| graph.device_at(n).clone()).collect(),
        links: raw.edges.iter().map(|&e| graph.link_at(e).clone()).collect(),
        total_cost: raw.cost,
        hop_count: raw.edges.len(),
    }
}

/// Minimum-total-weight path from `from` to `to`.
pub fn shortest_path(graph: &TopologyGraph, from: &str, to: &str) -> Result<Path, TopologyError> {
    let (source, target) = endpoints(graph, from, to)?;
    dijkstra(graph, source, target, &HashSet::new(), &HashSet::new())
        .map(|raw| to_path(graph, raw))
        .ok_or_else(|| TopologyError::NoPathExists {
            from: from.to_string(),
            to: to.to_string(),
        })
}

/// Up to `k` loopless paths ordered by increasing cost. Fewer than `k`
/// existing paths is not an error; `k == 0` is treated as 1.
pub fn k_shortest_paths(
    graph: &TopologyGraph,
    from: &str,
    to: &str,
    k: usize,
) -> Result<Vec<Path>, TopologyError> {
    let (source, target) = endpoints(graph, from, to)?;
    let paths = yen(graph, source, target, k.max(1));
    if paths.is_empty() {
        return Err(TopologyError::NoPathExists {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(paths.into_iter().map(|raw| to_path(graph, raw)).collect())
}

/// Dispatch on `algorithm`. Dijkstra always yields exactly one path.
pub fn find_paths(
    graph: &TopologyGraph,
    from: &str,
    to: &str,
    algorithm: PathAlgorithm,
) -> Result<Vec<Path>, TopologyError> {
    match algorithm {
        PathAlgorithm::Dijkstra => shortest_path(graph, from, to).map(|p| vec![p]),
        PathAlgorithm::KShortest { k } => k_shortest_paths(graph, from, to, k),
    }
}
