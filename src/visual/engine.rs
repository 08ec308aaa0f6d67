//! `TopologyEngine`: the four operations the service layer calls
//!
//! The engine owns a graph store and configuration, and holds no state
//! between calls. Every request builds its own depth map, candidate set
//! and visual graph, so concurrent requests need no locking.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use super::cluster::{cluster_candidates, select_candidates, GroupIdAllocator};
use super::compose::compose;
use super::connections::{classify_connections, ConnectionClassification};
use super::expand::{expand_group, ExpandOptions, Expansion};
use super::layout::assign_positions;
use super::trace::{TraceEvent, TraceSink};
use super::{ConnectionKind, VisualEdge, VisualGraph, VisualNode};
use crate::config::{EngineConfig, GroupingConfig};
use crate::topology::search;
use crate::topology::{
    Device, GraphStore, Path, PathAlgorithm, SearchMode, TopologyError, TopologyGraph,
};

/// Hops loaded around a device when classifying its connections: its
/// neighbors plus their uplinks, which the peer grouping check needs.
const CONNECTION_RADIUS: usize = 2;

pub struct TopologyEngine<S> {
    store: S,
    config: EngineConfig,
    trace: Option<Arc<dyn TraceSink>>,
}

impl<S: GraphStore> TopologyEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            trace: None,
        }
    }

    /// Attach a sink that receives a structured event for each step.
    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn emit(&self, event: TraceEvent) {
        log::debug!("{:?}", event);
        if let Some(sink) = &self.trace {
            sink.record(&event);
        }
    }

    /// Build the visual graph around `root`.
    ///
    /// A radius of 0 uses the configured default. Grouping only happens when
    /// `grouping.enabled` is set and at least one criterion is active.
    pub async fn extract_visual(
        &self,
        root: &str,
        radius: usize,
        grouping: &GroupingConfig,
    ) -> Result<VisualGraph, TopologyError> {
        let radius = self.config.radius_or_default(radius);
        let (devices, links) = self.store.subgraph(root, radius).await?;
        self.emit(TraceEvent::SubgraphExtracted {
            root: root.to_string(),
            radius,
            devices: devices.len(),
            links: links.len(),
        });

        let graph = TopologyGraph::from_parts(devices, links);
        let depths = graph.depths(root)?;

        let nodes: Vec<VisualNode> = graph
            .devices()
            .iter()
            .map(|d| VisualNode::from_device(d, root, depths.get(&d.id).copied()))
            .collect();
        let edges: Vec<VisualEdge> = graph
            .links()
            .iter()
            .map(|l| {
                let layer = |id: &str| graph.device(id).map(Device::layer).unwrap_or_default();
                let connection =
                    ConnectionKind::classify(layer(l.source.as_str()), layer(l.target.as_str()));
                VisualEdge::from_link(l, connection)
            })
            .collect();

        let (mut nodes, edges, groups) = if grouping.enabled && grouping.any_criterion() {
            let candidates = select_candidates(&nodes, grouping);
            let mut ids = GroupIdAllocator::new(nodes.iter().map(|n| n.id.clone()));
            let groups = cluster_candidates(&candidates, &edges, grouping, &mut ids);
            self.emit(TraceEvent::GroupsFormed {
                candidates: candidates.len(),
                groups: groups.iter().map(|g| g.id.clone()).collect(),
            });

            if groups.is_empty() {
                (nodes, edges, groups)
            } else {
                let composition = compose(&nodes, &edges, &groups, root)?;
                self.emit(TraceEvent::Composed {
                    hidden_members: groups.iter().map(|g| g.len()).sum(),
                    shadow_nodes: composition.shadow_nodes.clone(),
                    rewritten_edges: composition.rewritten_edges,
                    dropped_edges: composition.dropped_edges,
                });
                (composition.nodes, composition.edges, groups)
            }
        } else {
            (nodes, edges, Vec::new())
        };

        assign_positions(&mut nodes, &self.config.layout);
        let visual = VisualGraph::new(root, radius, nodes, edges, groups);
        visual.validate()?;
        Ok(visual)
    }

    /// Expand one group of `current`. See `visual::expand_group`.
    ///
    /// An `expand_depth` of 0 uses the configured default.
    pub async fn expand_group(
        &self,
        current: &VisualGraph,
        group_id: &str,
        member_ids: &[String],
        root: &str,
        grouping: &GroupingConfig,
        expand_depth: usize,
    ) -> Result<Expansion, TopologyError> {
        let options = ExpandOptions {
            grouping,
            layout: &self.config.layout,
            depth: self.config.expand_depth_or_default(expand_depth),
        };
        let expansion =
            expand_group(&self.store, current, group_id, member_ids, root, options).await?;

        self.emit(TraceEvent::GroupExpanded {
            group: group_id.to_string(),
            members: expansion.explored_members.len(),
            new_nodes: expansion.new_nodes.len(),
            new_edges: expansion.new_edges.len(),
        });
        if !expansion.regrouped.is_empty() {
            self.emit(TraceEvent::Regrouped {
                parent: group_id.to_string(),
                groups: expansion.regrouped.clone(),
            });
        }
        Ok(expansion)
    }

    /// Uplinks, downlinks and peers of one device, ports oriented from it.
    pub async fn device_connections(
        &self,
        device_id: &str,
    ) -> Result<ConnectionClassification, TopologyError> {
        if self.store.device(device_id).await?.is_none() {
            return Err(TopologyError::NodeNotFound(device_id.to_string()));
        }
        let (devices, links) = self.store.subgraph(device_id, CONNECTION_RADIUS).await?;
        Ok(classify_connections(device_id, &devices, &links))
    }

    /// Devices reachable from `start` within `max_hops` (0 = unbounded),
    /// excluding `start`.
    pub async fn find_reachable(
        &self,
        start: &str,
        max_hops: usize,
        mode: SearchMode,
    ) -> Result<Vec<Device>, TopologyError> {
        let graph = self.load_component(start, max_hops).await?;
        search::reachable(&graph, start, max_hops, mode)
    }

    /// Shortest path(s) from `from` to `to`. Dijkstra yields one path,
    /// `KShortest` up to `k` in increasing cost order.
    pub async fn find_shortest_path(
        &self,
        from: &str,
        to: &str,
        algorithm: PathAlgorithm,
    ) -> Result<Vec<Path>, TopologyError> {
        if self.store.device(to).await?.is_none() {
            return Err(TopologyError::NodeNotFound(to.to_string()));
        }
        let graph = self.load_component(from, 0).await?;
        if !graph.contains(to) {
            return Err(TopologyError::NoPathExists {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        search::find_paths(&graph, from, to, algorithm)
    }

    /// Pull the part of the graph within `max_hops` of `start` (0 = the
    /// whole connected component) out of the store.
    async fn load_component(
        &self,
        start: &str,
        max_hops: usize,
    ) -> Result<TopologyGraph, TopologyError> {
        let first = self
            .store
            .device(start)
            .await?
            .ok_or_else(|| TopologyError::NodeNotFound(start.to_string()))?;
        let limit = if max_hops == 0 { usize::MAX } else { max_hops };

        let mut seen_devices: HashSet<String> = HashSet::from([first.id.clone()]);
        let mut seen_links: HashSet<String> = HashSet::new();
        let mut devices = vec![first];
        let mut links = Vec::new();
        let mut queue = VecDeque::from([(start.to_string(), 0usize)]);

        while let Some((current, level)) = queue.pop_front() {
            if level >= limit {
                continue;
            }
            for link in self.store.neighbors(&current).await? {
                link.validate()?;
                let neighbor = link.other_end(&current).map(str::to_string);
                if seen_links.insert(link.id.clone()) {
                    links.push(link);
                }
                let Some(neighbor) = neighbor else { continue };
                if !seen_devices.insert(neighbor.clone()) {
                    continue;
                }
                if let Some(device) = self.store.device(&neighbor).await? {
                    devices.push(device);
                    queue.push_back((neighbor, level + 1));
                }
            }
        }

        log::debug!(
            "Loaded {} devices and {} links around {}",
            devices.len(),
            links.len(),
            start
        );
        Ok(TopologyGraph::from_parts(devices, links))
    }
}
