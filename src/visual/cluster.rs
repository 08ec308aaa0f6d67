//! Clustering engine: partition candidate nodes into groups
//!
//! Criteria run in a fixed order (prefix, type, depth band) and a node taken
//! by one criterion is no longer a candidate for the next, so the member sets
//! of the groups produced by one call never overlap.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::{Group, GroupCriterion, VisualEdge, VisualNode};
use crate::config::GroupingConfig;

/// Two names must share at least this many leading characters to cluster.
const MIN_SHARED_PREFIX: usize = 3;

const SEPARATORS: [char; 3] = ['-', '.', '_'];

/// Hands out `group-<tag>-<n>` ids, skipping any id already in use.
#[derive(Clone, Debug, Default)]
pub struct GroupIdAllocator {
    taken: HashSet<String>,
    next: HashMap<&'static str, usize>,
}

impl GroupIdAllocator {
    pub fn new<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken: existing.into_iter().map(Into::into).collect(),
            next: HashMap::new(),
        }
    }

    pub fn allocate(&mut self, tag: &'static str) -> String {
        let counter = self.next.entry(tag).or_insert(0);
        loop {
            let id = format!("group-{}-{}", tag, counter);
            *counter += 1;
            if self.taken.insert(id.clone()) {
                return id;
            }
        }
    }
}

/// Nodes eligible for grouping: not the root, not already a group, and at a
/// known depth of at least `max_depth`.
pub fn select_candidates<'a>(
    nodes: &'a [VisualNode],
    config: &GroupingConfig,
) -> Vec<&'a VisualNode> {
    nodes
        .iter()
        .filter(|n| !n.is_root && !n.is_group())
        .filter(|n| n.depth.is_some_and(|d| d >= config.max_depth))
        .collect()
}

/// Run every enabled criterion over `candidates`.
///
/// `edges` is only used for the internal/external edge accounting of each
/// group. Output order is deterministic for a given input.
pub fn cluster_candidates(
    candidates: &[&VisualNode],
    edges: &[VisualEdge],
    config: &GroupingConfig,
    ids: &mut GroupIdAllocator,
) -> Vec<Group> {
    let min_size = config.effective_min_group_size();
    let mut taken: HashSet<&str> = HashSet::new();
    let mut formed: Vec<(GroupCriterion, Vec<String>)> = Vec::new();

    if candidates.len() < min_size {
        return Vec::new();
    }

    if config.group_by_prefix {
        for (prefix, members) in prefix_clusters(candidates, min_size, config.prefix_min_len) {
            taken.extend(members.iter().copied());
            formed.push((GroupCriterion::Prefix(prefix), owned_ids(members)));
        }
    }

    if config.group_by_type {
        let remaining = remaining(candidates, &taken);
        for (kind, members) in type_clusters(&remaining, min_size) {
            taken.extend(members.iter().copied());
            formed.push((GroupCriterion::Type(kind.to_string()), owned_ids(members)));
        }
    }

    if config.group_by_depth {
        let remaining = remaining(candidates, &taken);
        let width = config.effective_band_width();
        for (band, members) in depth_clusters(&remaining, width, min_size) {
            let criterion = GroupCriterion::DepthBand {
                from: band * width,
                to: band * width + width - 1,
            };
            formed.push((criterion, owned_ids(members)));
        }
    }

    formed
        .into_iter()
        .map(|(criterion, members)| {
            let (internal_edges, external_edges) = edge_accounting(&members, edges);
            Group {
                id: ids.allocate(criterion.tag()),
                label: criterion.label(members.len()),
                criterion,
                members,
                depth_threshold: config.max_depth,
                internal_edges,
                external_edges,
            }
        })
        .collect()
}

fn remaining<'a>(candidates: &[&'a VisualNode], taken: &HashSet<&str>) -> Vec<&'a VisualNode> {
    candidates
        .iter()
        .filter(|n| !taken.contains(n.id.as_str()))
        .copied()
        .collect()
}

fn owned_ids(ids: Vec<&str>) -> Vec<String> {
    ids.into_iter().map(str::to_string).collect()
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// Longest prefix shared by every name, trimmed back to the last separator
/// so it reads as whole tokens.
fn representative_prefix(names: &[&str]) -> String {
    let Some((first, rest)) = names.split_first() else {
        return String::new();
    };
    let len = rest
        .iter()
        .fold(first.chars().count(), |len, name| len.min(common_prefix_len(first, name)));
    let prefix: String = first.chars().take(len).collect();

    match prefix.rfind(SEPARATORS) {
        Some(pos) => prefix[..=pos].to_string(),
        None => prefix,
    }
}

/// Prefix clusters as `(prefix, member ids)`, largest first.
///
/// Names are sorted first. Each unclustered name seeds a cluster, and every
/// later unclustered name joins if it shares `MIN_SHARED_PREFIX` characters
/// with any member already in it.
fn prefix_clusters<'a>(
    candidates: &[&'a VisualNode],
    min_size: usize,
    prefix_min_len: usize,
) -> Vec<(String, Vec<&'a str>)> {
    let mut named: Vec<(&str, &str)> = candidates
        .iter()
        .map(|n| (n.name.as_str(), n.id.as_str()))
        .collect();
    named.sort_unstable();

    let mut clustered = vec![false; named.len()];
    let mut clusters = Vec::new();

    for seed in 0..named.len() {
        if clustered[seed] {
            continue;
        }
        clustered[seed] = true;
        let mut members = vec![seed];

        for next in seed + 1..named.len() {
            if clustered[next] {
                continue;
            }
            let joins = members
                .iter()
                .any(|&m| common_prefix_len(named[m].0, named[next].0) >= MIN_SHARED_PREFIX);
            if joins {
                clustered[next] = true;
                members.push(next);
            }
        }

        if members.len() < min_size {
            continue;
        }
        let names: Vec<&str> = members.iter().map(|&m| named[m].0).collect();
        let prefix = representative_prefix(&names);
        if prefix.chars().count() < prefix_min_len {
            continue;
        }
        clusters.push((prefix, members.iter().map(|&m| named[m].1).collect()));
    }

    clusters.sort_by(|a: &(String, Vec<&str>), b| b.1.len().cmp(&a.1.len()));
    clusters
}

/// Type partitions of at least `min_size`, largest first, ties by type name.
fn type_clusters<'a>(
    candidates: &[&'a VisualNode],
    min_size: usize,
) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut by_kind: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for node in candidates {
        by_kind.entry(node.kind.as_str()).or_default().push(node.id.as_str());
    }

    let mut clusters: Vec<(&str, Vec<&str>)> = by_kind
        .into_iter()
        .filter(|(_, members)| members.len() >= min_size)
        .collect();
    clusters.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    clusters
}

/// Depth bands of `width` consecutive depths, shallowest band first.
fn depth_clusters<'a>(
    candidates: &[&'a VisualNode],
    width: usize,
    min_size: usize,
) -> Vec<(usize, Vec<&'a str>)> {
    let mut by_band: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for node in candidates {
        if let Some(depth) = node.depth {
            by_band.entry(depth / width).or_default().push(node.id.as_str());
        }
    }
    by_band
        .into_iter()
        .filter(|(_, members)| members.len() >= min_size)
        .collect()
}

/// `(internal edge count, external edge ids)` for a member set.
fn edge_accounting(members: &[String], edges: &[VisualEdge]) -> (usize, Vec<String>) {
    let set: HashSet<&str> = members.iter().map(String::as_str).collect();
    let mut internal = 0;
    let mut external = Vec::new();
    for edge in edges {
        match (set.contains(edge.source.as_str()), set.contains(edge.target.as_str())) {
            (true, true) => internal += 1,
            (true, false) | (false, true) => external.push(edge.id.clone()),
            (false, false) => {}
        }
    }
    (internal, external)
}
