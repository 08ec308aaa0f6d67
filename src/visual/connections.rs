//! Per-device connection classification
//!
//! Lists a device's neighbors split by layer: uplinks sit on a more
//! upstream layer, downlinks further down, peers on the same layer. Ports
//! are oriented from the device being classified, whichever way round the
//! link is stored. A peer is flagged `is_same_group` when both devices
//! share at least one uplink.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::topology::{Device, Link};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConnectionInfo {
    pub device_id: String,
    pub device_name: String,
    #[serde(rename = "device_type")]
    pub device_kind: String,
    #[serde(default)]
    pub hardware: String,
    pub layer: u32,
    /// Port on the classified device.
    #[serde(default)]
    pub local_port: String,
    /// Port on the neighbor.
    #[serde(default)]
    pub remote_port: String,
    pub link_id: String,
    pub link_weight: f64,
    /// Only ever set on peers.
    #[serde(default)]
    pub is_same_group: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ConnectionClassification {
    pub uplinks: Vec<ConnectionInfo>,
    pub downlinks: Vec<ConnectionInfo>,
    pub peers: Vec<ConnectionInfo>,
}

impl ConnectionClassification {
    pub fn len(&self) -> usize {
        self.uplinks.len() + self.downlinks.len() + self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Links touching `device_id`, paired with the device at the other end.
/// Links whose far end is not in `devices` are skipped.
fn attached<'a>(
    device_id: &str,
    devices: &HashMap<&'a str, &'a Device>,
    links: &'a [Link],
) -> Vec<(&'a Link, &'a Device)> {
    links
        .iter()
        .filter_map(|link| {
            let other = link.other_end(device_id)?;
            let device = devices.get(other)?;
            Some((link, *device))
        })
        .collect()
}

/// Ids of the devices `device_id` connects up to, in link order.
pub fn uplink_devices<'a>(
    device_id: &str,
    devices: &HashMap<&'a str, &'a Device>,
    links: &'a [Link],
) -> Vec<&'a str> {
    let Some(device) = devices.get(device_id) else {
        return Vec::new();
    };
    let layer = device.layer();
    attached(device_id, devices, links)
        .into_iter()
        .filter(|(_, other)| other.layer() < layer)
        .map(|(_, other)| other.id.as_str())
        .collect()
}

/// Whether two devices hang off at least one common uplink.
pub fn shares_uplink(a: &str, b: &str, devices: &HashMap<&str, &Device>, links: &[Link]) -> bool {
    let upstream = uplink_devices(a, devices, links);
    uplink_devices(b, devices, links).iter().any(|id| upstream.contains(id))
}

/// Classify every connection of `device_id` within `devices`/`links`.
///
/// An unknown device yields an empty classification. Peer grouping only
/// sees the uplinks present in `links`, so callers should pass a
/// neighborhood of at least two hops.
pub fn classify_connections(
    device_id: &str,
    devices: &[Device],
    links: &[Link],
) -> ConnectionClassification {
    let by_id: HashMap<&str, &Device> = devices.iter().map(|d| (d.id.as_str(), d)).collect();
    let Some(device) = by_id.get(device_id) else {
        return ConnectionClassification::default();
    };
    let layer = device.layer();

    let mut classification = ConnectionClassification::default();
    for (link, other) in attached(device_id, &by_id, links) {
        // Ports are stored source-side first.
        let (local_port, remote_port) = if link.source == device_id {
            (&link.local_port, &link.remote_port)
        } else {
            (&link.remote_port, &link.local_port)
        };
        let mut info = ConnectionInfo {
            device_id: other.id.clone(),
            device_name: other.display_name().to_string(),
            device_kind: other.kind.clone(),
            hardware: other.hardware.clone(),
            layer: other.layer(),
            local_port: local_port.clone(),
            remote_port: remote_port.clone(),
            link_id: link.id.clone(),
            link_weight: link.weight,
            is_same_group: false,
        };

        match other.layer().cmp(&layer) {
            std::cmp::Ordering::Less => classification.uplinks.push(info),
            std::cmp::Ordering::Greater => classification.downlinks.push(info),
            std::cmp::Ordering::Equal => {
                info.is_same_group = shares_uplink(device_id, &other.id, &by_id, links);
                classification.peers.push(info);
            }
        }
    }
    classification
}
