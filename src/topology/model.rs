//! Device and link data model types
//!
//! A device is a node of the inventory graph; a link is an undirected
//! connection between two devices. Orientation of `source`/`target` is kept
//! only so ports read the right way round.

use serde::{Deserialize, Serialize};

use super::TopologyError;

/// Layer assumed for devices the classifier has not tagged (the server layer).
pub const DEFAULT_LAYER: u32 = 5;

fn default_weight() -> f64 {
    1.0
}

/// A device as seen by the engine.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Device {
    pub id: String,
    /// Structural type, e.g. `switch`, `router`, `server`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub hardware: String,
    /// Hierarchy layer assigned by the classifier. Lower is more upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<u32>,
}

impl Device {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: None,
            hardware: String::new(),
            layer: None,
        }
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_hardware(mut self, hardware: impl Into<String>) -> Self {
        self.hardware = hardware.into();
        self
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Effective layer; untagged devices sit on the server layer.
    pub fn layer(&self) -> u32 {
        self.layer.unwrap_or(DEFAULT_LAYER)
    }
}

/// An undirected link between two devices.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Link {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Non-negative cost, only consulted by path search.
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub local_port: String,
    #[serde(default)]
    pub remote_port: String,
}

impl Link {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            weight: default_weight(),
            local_port: String::new(),
            remote_port: String::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_ports(mut self, local: impl Into<String>, remote: impl Into<String>) -> Self {
        self.local_port = local.into();
        self.remote_port = remote.into();
        self
    }

    /// Reject weights path search cannot handle (negative, NaN, infinite).
    pub fn validate(&self) -> Result<(), TopologyError> {
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(TopologyError::InvalidWeight {
                link: self.id.clone(),
                weight: self.weight,
            });
        }
        Ok(())
    }

    pub fn touches(&self, device_id: &str) -> bool {
        self.source == device_id || self.target == device_id
    }

    /// The endpoint opposite `device_id`, or None if the link does not touch it.
    pub fn other_end(&self, device_id: &str) -> Option<&str> {
        if self.source == device_id {
            Some(&self.target)
        } else if self.target == device_id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Traversal order for reachability queries.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Bfs,
    Dfs,
}

/// Path search flavour.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", tag = "algorithm")]
pub enum PathAlgorithm {
    #[default]
    Dijkstra,
    /// Up to `k` loopless paths ordered by total cost.
    KShortest { k: usize },
}

/// A resolved path between two devices.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Path {
    pub devices: Vec<Device>,
    pub links: Vec<Link>,
    pub total_cost: f64,
    pub hop_count: usize,
}

impl Path {
    pub fn device_ids(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.id.as_str()).collect()
    }
}
