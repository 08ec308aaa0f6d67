//! Graph store boundary
//!
//! The engine never owns device data; it reads it through `GraphStore`.
//! `InMemoryStore` is a deterministic adapter used by tests and the CLI, and
//! can be persisted as a JSON snapshot. `CachingStore` wraps any store with a
//! read-through subgraph cache.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::model::{Device, Link};
use super::TopologyError;

/// Read access to the device graph.
///
/// Calls may block on I/O. No timeout is imposed here; deadlines belong to
/// the caller.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Look up a single device.
    async fn device(&self, id: &str) -> Result<Option<Device>, TopologyError>;

    /// All links touching `id`, in either orientation.
    async fn neighbors(&self, id: &str) -> Result<Vec<Link>, TopologyError>;

    /// Devices within `radius` hops of `root` and the links among them.
    /// Fails with `RootNotFound` when the root does not exist.
    async fn subgraph(
        &self,
        root: &str,
        radius: usize,
    ) -> Result<(Vec<Device>, Vec<Link>), TopologyError>;
}

/// On-disk form of an `InMemoryStore`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TopologySnapshot {
    pub devices: Vec<Device>,
    pub links: Vec<Link>,
}

/// In-memory device graph.
///
/// Devices are kept sorted by id and links in insertion order, so every
/// query returns the same ordering for the same content.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    devices: BTreeMap<String, Device>,
    links: Vec<Link>,
    link_ids: HashSet<String>,
    /// device id -> positions in `links`
    incident: HashMap<String, Vec<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot, validating every link.
    pub fn from_snapshot(snapshot: TopologySnapshot) -> Result<Self, TopologyError> {
        let mut store = Self::new();
        for device in snapshot.devices {
            store.add_device(device);
        }
        for link in snapshot.links {
            store.add_link(link)?;
        }
        Ok(store)
    }

    /// Load a JSON snapshot from disk.
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let data = std::fs::read(path).map_err(|e| TopologyError::IoError(e.to_string()))?;
        let snapshot: TopologySnapshot = serde_json::from_slice(&data)
            .map_err(|e| TopologyError::DeserializationError(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }

    /// Write the store to disk as a JSON snapshot.
    pub fn save(&self, path: &Path) -> Result<(), TopologyError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TopologyError::IoError(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| TopologyError::SerializationError(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| TopologyError::IoError(e.to_string()))
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            devices: self.devices.values().cloned().collect(),
            links: self.links.clone(),
        }
    }

    /// Insert or replace a device. Returns true if it is new.
    pub fn add_device(&mut self, device: Device) -> bool {
        self.devices.insert(device.id.clone(), device).is_none()
    }

    /// Add a link. Returns false if a link with the same id already exists.
    pub fn add_link(&mut self, link: Link) -> Result<bool, TopologyError> {
        link.validate()?;
        if !self.link_ids.insert(link.id.clone()) {
            return Ok(false);
        }
        let position = self.links.len();
        self.incident
            .entry(link.source.clone())
            .or_default()
            .push(position);
        if link.target != link.source {
            self.incident
                .entry(link.target.clone())
                .or_default()
                .push(position);
        }
        self.links.push(link);
        Ok(true)
    }

    pub fn get_device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    fn incident_links(&self, id: &str) -> impl Iterator<Item = &Link> {
        self.incident
            .get(id)
            .into_iter()
            .flatten()
            .map(|&pos| &self.links[pos])
    }

    /// Breadth-first neighborhood of `root`, bounded by `radius` hops.
    /// Devices come back in discovery order with the root first.
    fn bounded_neighborhood(&self, root: &str, radius: usize) -> (Vec<Device>, Vec<Link>) {
        let mut depth: HashMap<&str, usize> = HashMap::from([(root, 0)]);
        let mut order = vec![root];
        let mut queue = VecDeque::from([root]);

        while let Some(current) = queue.pop_front() {
            let hops = depth[current];
            if hops >= radius {
                continue;
            }
            for link in self.incident_links(current) {
                let Some(neighbor) = link.other_end(current) else {
                    continue;
                };
                if !self.devices.contains_key(neighbor) || depth.contains_key(neighbor) {
                    continue;
                }
                depth.insert(neighbor, hops + 1);
                order.push(neighbor);
                queue.push_back(neighbor);
            }
        }

        let devices = order
            .iter()
            .filter_map(|id| self.devices.get(*id).cloned())
            .collect();
        let links = self
            .links
            .iter()
            .filter(|l| {
                depth.contains_key(l.source.as_str()) && depth.contains_key(l.target.as_str())
            })
            .cloned()
            .collect();
        (devices, links)
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn device(&self, id: &str) -> Result<Option<Device>, TopologyError> {
        Ok(self.devices.get(id).cloned())
    }

    async fn neighbors(&self, id: &str) -> Result<Vec<Link>, TopologyError> {
        Ok(self.incident_links(id).cloned().collect())
    }

    async fn subgraph(
        &self,
        root: &str,
        radius: usize,
    ) -> Result<(Vec<Device>, Vec<Link>), TopologyError> {
        if !self.devices.contains_key(root) {
            return Err(TopologyError::RootNotFound(root.to_string()));
        }
        Ok(self.bounded_neighborhood(root, radius))
    }
}

/// Read-through cache for `subgraph`, keyed by `(root, radius)`.
///
/// Entries live until `invalidate` is called; keeping them fresh is the
/// owner's job.
pub struct CachingStore<S> {
    inner: S,
    subgraphs: RwLock<HashMap<(String, usize), (Vec<Device>, Vec<Link>)>>,
}

impl<S: GraphStore> CachingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            subgraphs: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub async fn invalidate(&self) {
        self.subgraphs.write().await.clear();
    }

    pub async fn cached_entries(&self) -> usize {
        self.subgraphs.read().await.len()
    }
}

#[async_trait]
impl<S: GraphStore> GraphStore for CachingStore<S> {
    async fn device(&self, id: &str) -> Result<Option<Device>, TopologyError> {
        self.inner.device(id).await
    }

    async fn neighbors(&self, id: &str) -> Result<Vec<Link>, TopologyError> {
        self.inner.neighbors(id).await
    }

    async fn subgraph(
        &self,
        root: &str,
        radius: usize,
    ) -> Result<(Vec<Device>, Vec<Link>), TopologyError> {
        let key = (root.to_string(), radius);
        if let Some(hit) = self.subgraphs.read().await.get(&key) {
            return Ok(hit.clone());
        }

        let fetched = self.inner.subgraph(root, radius).await?;
        self.subgraphs.write().await.insert(key, fetched.clone());
        Ok(fetched)
    }
}
