//! Undirected adjacency over string-keyed nodes
//!
//! Links are stored once but walked both ways. Rather than comparing both
//! endpoints at every traversal step, `AdjacencyIndex` assigns each node a
//! dense position and records, per node, the `(neighbor, edge)` pairs it
//! touches. The index is built once per operation in O(V + E).

use std::collections::{HashMap, HashSet};

use super::depth::{compute_depths, DepthMap};
use super::model::{Device, Link};
use super::TopologyError;

/// One half of an undirected edge, seen from the node that owns the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Adjacent {
    /// Position of the neighbor in the index.
    pub node: usize,
    /// Position of the edge in the edge sequence the index was built from.
    pub edge: usize,
}

/// Dense undirected adjacency index.
#[derive(Clone, Debug, Default)]
pub struct AdjacencyIndex {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
    adjacent: Vec<Vec<Adjacent>>,
}

impl AdjacencyIndex {
    /// Build from node ids and `(source, target)` pairs.
    ///
    /// Duplicate node ids keep their first position. An edge whose endpoints
    /// are not both known is skipped, but still consumes its edge position so
    /// `Adjacent::edge` always indexes the caller's edge slice.
    pub fn build<'a, N, E>(nodes: N, edges: E) -> Self
    where
        N: IntoIterator<Item = &'a str>,
        E: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut index = AdjacencyIndex::default();
        for id in nodes {
            if !index.positions.contains_key(id) {
                index.positions.insert(id.to_string(), index.ids.len());
                index.ids.push(id.to_string());
                index.adjacent.push(Vec::new());
            }
        }

        for (edge, (source, target)) in edges.into_iter().enumerate() {
            let (Some(&s), Some(&t)) = (index.positions.get(source), index.positions.get(target))
            else {
                continue;
            };
            index.adjacent[s].push(Adjacent { node: t, edge });
            if s != t {
                index.adjacent[t].push(Adjacent { node: s, edge });
            }
        }

        index
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn id(&self, position: usize) -> &str {
        &self.ids[position]
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn adjacent(&self, position: usize) -> &[Adjacent] {
        &self.adjacent[position]
    }

    /// Distinct neighbor ids of `id`, in first-seen order.
    pub fn neighbor_ids(&self, id: &str) -> Vec<&str> {
        let Some(position) = self.position(id) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.adjacent[position]
            .iter()
            .filter(|a| a.node != position && seen.insert(a.node))
            .map(|a| self.ids[a.node].as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// An in-memory slice of the device graph: devices, links and their index.
#[derive(Clone, Debug, Default)]
pub struct TopologyGraph {
    devices: Vec<Device>,
    links: Vec<Link>,
    index: AdjacencyIndex,
}

impl TopologyGraph {
    /// Assemble a graph, dropping duplicate devices/links (first one wins)
    /// and links that reference devices outside the set.
    pub fn from_parts(devices: Vec<Device>, links: Vec<Link>) -> Self {
        let mut seen_devices = HashSet::new();
        let devices: Vec<Device> = devices
            .into_iter()
            .filter(|d| seen_devices.insert(d.id.clone()))
            .collect();

        let mut seen_links = HashSet::new();
        let links: Vec<Link> = links
            .into_iter()
            .filter(|l| seen_devices.contains(&l.source) && seen_devices.contains(&l.target))
            .filter(|l| seen_links.insert(l.id.clone()))
            .collect();

        let index = AdjacencyIndex::build(
            devices.iter().map(|d| d.id.as_str()),
            links.iter().map(|l| (l.source.as_str(), l.target.as_str())),
        );

        Self {
            devices,
            links,
            index,
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn index(&self) -> &AdjacencyIndex {
        &self.index
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.index.position(id).map(|p| &self.devices[p])
    }

    pub fn device_at(&self, position: usize) -> &Device {
        &self.devices[position]
    }

    pub fn link_at(&self, edge: usize) -> &Link {
        &self.links[edge]
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Hop depth of every device reachable from `root`.
    pub fn depths(&self, root: &str) -> Result<DepthMap, TopologyError> {
        compute_depths(&self.index, root)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn into_parts(self) -> (Vec<Device>, Vec<Link>) {
        (self.devices, self.links)
    }
}
