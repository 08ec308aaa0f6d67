//! Group expander
//!
//! Turns one group back into real nodes. The members' neighborhoods are
//! re-read from the graph store, anything the current graph already shows
//! is left alone, and the newly revealed frontier is optionally clustered
//! again. The input graph is never modified; a new one is returned.

use std::collections::{HashMap, HashSet, VecDeque};

use super::cluster::{cluster_candidates, select_candidates, GroupIdAllocator};
use super::compose::{compose, has_pair};
use super::layout::assign_positions;
use super::{ConnectionKind, Group, VisualEdge, VisualGraph, VisualNode, GROUP_PORT};
use crate::config::{GroupingConfig, LayoutConfig};
use crate::topology::{compute_depths, AdjacencyIndex, Device, GraphStore, Link, TopologyError};

/// Devices and links discovered while exploring around group members,
/// deduplicated by id in discovery order.
#[derive(Clone, Debug, Default)]
pub struct ExpansionAccumulator {
    devices: Vec<Device>,
    device_ids: HashSet<String>,
    links: Vec<Link>,
    link_ids: HashSet<String>,
}

impl ExpansionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a device with this id was already collected.
    pub fn add_device(&mut self, device: Device) -> bool {
        if !self.device_ids.insert(device.id.clone()) {
            return false;
        }
        self.devices.push(device);
        true
    }

    pub fn add_link(&mut self, link: Link) -> bool {
        if !self.link_ids.insert(link.id.clone()) {
            return false;
        }
        self.links.push(link);
        true
    }

    pub fn contains_device(&self, id: &str) -> bool {
        self.device_ids.contains(id)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Breadth-first walk from `member` out to `depth` hops, collecting every
    /// device reached and every link seen on the way.
    ///
    /// Returns false, collecting nothing, if the member is gone from the store.
    pub async fn explore<S: GraphStore + ?Sized>(
        &mut self,
        store: &S,
        member: &str,
        depth: usize,
    ) -> Result<bool, TopologyError> {
        let Some(device) = store.device(member).await? else {
            return Ok(false);
        };
        self.add_device(device);

        let mut visited: HashSet<String> = HashSet::from([member.to_string()]);
        let mut queue = VecDeque::from([(member.to_string(), 0usize)]);

        while let Some((current, level)) = queue.pop_front() {
            for link in store.neighbors(&current).await? {
                let neighbor = link.other_end(&current).map(str::to_string);
                self.add_link(link);

                let Some(neighbor) = neighbor else { continue };
                if level >= depth || visited.contains(&neighbor) {
                    continue;
                }
                visited.insert(neighbor.clone());
                if let Some(device) = store.device(&neighbor).await? {
                    self.add_device(device);
                    queue.push_back((neighbor, level + 1));
                }
            }
        }

        Ok(true)
    }
}

/// Knobs for one expansion.
#[derive(Clone, Copy, Debug)]
pub struct ExpandOptions<'a> {
    pub grouping: &'a GroupingConfig,
    pub layout: &'a LayoutConfig,
    /// Hops explored around each member.
    pub depth: usize,
}

/// Outcome of expanding a group.
#[derive(Clone, Debug)]
pub struct Expansion {
    pub graph: VisualGraph,
    /// Nodes that were not in the input graph, before any regrouping.
    pub new_nodes: Vec<VisualNode>,
    pub new_edges: Vec<VisualEdge>,
    /// Ids of groups formed over the revealed frontier.
    pub regrouped: Vec<String>,
    /// Members explored: the requested ids followed by the rest of the group.
    pub explored_members: Vec<String>,
    /// Members that no longer exist in the store.
    pub skipped_members: Vec<String>,
}

/// Expand `group_id` in `current`.
///
/// `member_ids` chooses which members are explored first; the rest of the
/// group is always explored after them, since the group node disappears and
/// an unexplored member would have nowhere to appear. Fails with
/// `GroupNotFound` if the group is not in `current`, which includes a group
/// that was already expanded.
pub async fn expand_group<S: GraphStore + ?Sized>(
    store: &S,
    current: &VisualGraph,
    group_id: &str,
    member_ids: &[String],
    root: &str,
    options: ExpandOptions<'_>,
) -> Result<Expansion, TopologyError> {
    let group = current
        .group(group_id)
        .ok_or_else(|| TopologyError::GroupNotFound(group_id.to_string()))?;
    let mut members: Vec<String> = Vec::with_capacity(group.len());
    for id in member_ids.iter().chain(group.members.iter()) {
        if !members.contains(id) {
            members.push(id.clone());
        }
    }

    let mut acc = ExpansionAccumulator::new();
    let mut skipped_members = Vec::new();
    for member in &members {
        if !acc.explore(store, member, options.depth).await? {
            log::warn!("Skipping member {} of {}: not found in store", member, group_id);
            skipped_members.push(member.clone());
        }
    }

    let remaining_groups: Vec<Group> = current
        .groups
        .iter()
        .filter(|g| g.id != group_id)
        .cloned()
        .collect();
    let owner: HashMap<&str, &str> = remaining_groups
        .iter()
        .flat_map(|g| g.members.iter().map(move |m| (m.as_str(), g.id.as_str())))
        .collect();

    let base_nodes: Vec<VisualNode> = current
        .nodes
        .iter()
        .filter(|n| n.id != group_id)
        .cloned()
        .collect();
    let base_edges: Vec<VisualEdge> = current
        .edges
        .iter()
        .filter(|e| !e.touches(group_id))
        .cloned()
        .collect();

    let present: HashSet<&str> = base_nodes.iter().map(|n| n.id.as_str()).collect();
    let mut new_nodes: Vec<VisualNode> = acc
        .devices()
        .iter()
        .filter(|d| !present.contains(d.id.as_str()) && !owner.contains_key(d.id.as_str()))
        .map(|d| VisualNode::from_device(d, root, None))
        .collect();

    let layers: HashMap<&str, u32> = base_nodes
        .iter()
        .chain(new_nodes.iter())
        .map(|n| (n.id.as_str(), n.layer))
        .collect();
    let new_edges = splice_links(acc.links(), &base_edges, &layers, &owner);

    // Depths over the union of what stays and what was found.
    let index = AdjacencyIndex::build(
        base_nodes.iter().chain(new_nodes.iter()).map(|n| n.id.as_str()),
        base_edges
            .iter()
            .chain(new_edges.iter())
            .map(|e| (e.source.as_str(), e.target.as_str())),
    );
    let depths = compute_depths(&index, root)?;
    for node in &mut new_nodes {
        node.depth = depths.get(&node.id).copied();
    }

    let mut nodes: Vec<VisualNode> = base_nodes
        .into_iter()
        .chain(new_nodes.iter().cloned())
        .collect();
    let mut edges: Vec<VisualEdge> = base_edges
        .into_iter()
        .chain(new_edges.iter().cloned())
        .collect();
    let mut groups = remaining_groups;
    let mut regrouped = Vec::new();

    if options.grouping.enabled && options.grouping.any_criterion() {
        let frontier: Vec<VisualNode> = new_nodes
            .iter()
            .filter(|n| !group.contains(&n.id) && !members.contains(&n.id))
            .cloned()
            .collect();
        let candidates = select_candidates(&frontier, options.grouping);
        let mut ids = GroupIdAllocator::new(
            nodes
                .iter()
                .map(|n| n.id.clone())
                .chain(groups.iter().map(|g| g.id.clone()))
                .chain(std::iter::once(group_id.to_string())),
        );
        let formed = cluster_candidates(&candidates, &edges, options.grouping, &mut ids);
        if !formed.is_empty() {
            let composition = compose(&nodes, &edges, &formed, root)?;
            nodes = composition.nodes;
            edges = composition.edges;
            regrouped = formed.iter().map(|g| g.id.clone()).collect();
            groups.extend(formed);
        }
    }

    assign_positions(&mut nodes, options.layout);
    let graph = VisualGraph::new(current.root.clone(), current.radius, nodes, edges, groups);
    graph.validate()?;

    Ok(Expansion {
        graph,
        new_nodes,
        new_edges,
        regrouped,
        skipped_members,
        explored_members: members,
    })
}

/// Turn discovered links into edges for the spliced graph.
///
/// A link already shown (by id) is skipped. An endpoint hidden inside a
/// remaining group is rerouted to that group's node, deduplicated by
/// endpoint pair; a link with an endpoint that resolves to nothing visible
/// is dropped.
fn splice_links(
    links: &[Link],
    base_edges: &[VisualEdge],
    layers: &HashMap<&str, u32>,
    owner: &HashMap<&str, &str>,
) -> Vec<VisualEdge> {
    let mut shown: HashSet<&str> = base_edges.iter().map(|e| e.id.as_str()).collect();
    let mut spliced: Vec<VisualEdge> = Vec::new();

    let resolve = |id: &str| -> Option<(String, bool)> {
        if layers.contains_key(id) {
            Some((id.to_string(), false))
        } else {
            owner.get(id).map(|g| (g.to_string(), true))
        }
    };

    for link in links {
        if shown.contains(link.id.as_str()) {
            continue;
        }
        let (Some((source, source_moved)), Some((target, target_moved))) =
            (resolve(&link.source), resolve(&link.target))
        else {
            continue;
        };
        if source == target && (source_moved || target_moved) {
            continue;
        }

        let source_layer = layers.get(source.as_str()).copied().unwrap_or_default();
        let target_layer = layers.get(target.as_str()).copied().unwrap_or_default();
        let mut edge =
            VisualEdge::from_link(link, ConnectionKind::classify(source_layer, target_layer));

        if source_moved || target_moved {
            if has_pair(base_edges, &source, &target) || has_pair(&spliced, &source, &target) {
                continue;
            }
            edge.id = format!("{}-{}", source, target);
            if source_moved {
                edge.local_port = GROUP_PORT.to_string();
            }
            if target_moved {
                edge.remote_port = GROUP_PORT.to_string();
            }
            edge.source = source;
            edge.target = target;
        }

        shown.insert(link.id.as_str());
        spliced.push(edge);
    }

    spliced
}
