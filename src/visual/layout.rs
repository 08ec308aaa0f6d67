//! Hierarchical coordinate assignment
//!
//! One row per populated layer, most upstream layer on top. Rows are
//! centered on x = 0 and keep node-list order left to right.

use std::collections::BTreeMap;

use super::{Position, VisualNode};
use crate::config::LayoutConfig;

pub fn assign_positions(nodes: &mut [VisualNode], config: &LayoutConfig) {
    let mut rows: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        rows.entry(node.layer).or_default().push(i);
    }

    for (row, members) in rows.values().enumerate() {
        let y = row as f64 * config.layer_spacing;
        let start_x = -((members.len() - 1) as f64 * config.node_spacing) / 2.0;
        for (slot, &i) in members.iter().enumerate() {
            nodes[i].position = Position {
                x: start_x + slot as f64 * config.node_spacing,
                y,
            };
        }
    }
}
