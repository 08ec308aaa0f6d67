//! Engine configuration
//!
//! Everything has a default; a JSON file only needs the fields it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::topology::TopologyError;

/// Environment variable naming a JSON config file for `EngineConfig::from_env`.
pub const CONFIG_ENV_VAR: &str = "TOPOLENS_CONFIG";

const DEFAULT_MIN_GROUP_SIZE: usize = 3;

/// Controls whether and how leaf nodes are collapsed into groups.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GroupingConfig {
    pub enabled: bool,
    pub min_group_size: usize,
    /// Only nodes at this depth or beyond are grouping candidates.
    pub max_depth: usize,
    pub group_by_prefix: bool,
    pub group_by_type: bool,
    pub group_by_depth: bool,
    pub prefix_min_len: usize,
    /// Number of consecutive depths folded into one depth band.
    pub depth_band_width: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            max_depth: 2,
            group_by_prefix: true,
            group_by_type: false,
            group_by_depth: false,
            prefix_min_len: 3,
            depth_band_width: 1,
        }
    }
}

impl GroupingConfig {
    /// Grouping switched on with every other knob at its default.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// A group of one is not a group; anything below two falls back to the default.
    pub fn effective_min_group_size(&self) -> usize {
        if self.min_group_size < 2 {
            DEFAULT_MIN_GROUP_SIZE
        } else {
            self.min_group_size
        }
    }

    pub fn effective_band_width(&self) -> usize {
        self.depth_band_width.max(1)
    }

    /// True if at least one clustering criterion would run.
    pub fn any_criterion(&self) -> bool {
        self.group_by_prefix || self.group_by_type || self.group_by_depth
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Vertical distance between layer rows.
    pub layer_spacing: f64,
    /// Horizontal distance between nodes in a row.
    pub node_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            layer_spacing: 150.0,
            node_spacing: 200.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Radius used when a request passes 0.
    pub default_radius: usize,
    /// Expansion depth used when a request passes 0.
    pub default_expand_depth: usize,
    pub layout: LayoutConfig,
    /// Baseline grouping for front ends to start from. Engine calls always
    /// take their grouping explicitly.
    pub grouping: GroupingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_radius: 3,
            default_expand_depth: 2,
            layout: LayoutConfig::default(),
            grouping: GroupingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let data = std::fs::read(path).map_err(|e| TopologyError::IoError(e.to_string()))?;
        serde_json::from_slice(&data)
            .map_err(|e| TopologyError::DeserializationError(e.to_string()))
    }

    /// Load from the file named by `TOPOLENS_CONFIG`, or defaults if it is unset.
    pub fn from_env() -> Result<Self, TopologyError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn radius_or_default(&self, radius: usize) -> usize {
        if radius == 0 {
            self.default_radius
        } else {
            radius
        }
    }

    pub fn expand_depth_or_default(&self, depth: usize) -> usize {
        if depth == 0 {
            self.default_expand_depth
        } else {
            depth
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_radius, 3);
        assert_eq!(config.default_expand_depth, 2);
        assert_eq!(config.layout.layer_spacing, 150.0);
        assert!(!config.grouping.enabled);
        assert!(config.grouping.group_by_prefix);
        assert_eq!(config.grouping.prefix_min_len, 3);
    }

    #[test]
    fn test_min_group_size_floor() {
        let mut grouping = GroupingConfig::enabled();
        grouping.min_group_size = 1;
        assert_eq!(grouping.effective_min_group_size(), 3);
        grouping.min_group_size = 2;
        assert_eq!(grouping.effective_min_group_size(), 2);
    }

    #[test]
    fn test_zero_means_default() {
        let config = EngineConfig::default();
        assert_eq!(config.radius_or_default(0), 3);
        assert_eq!(config.radius_or_default(5), 5);
        assert_eq!(config.expand_depth_or_default(0), 2);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"default_radius": 6, "grouping": {"enabled": true, "group_by_type": true}}"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.default_radius, 6);
        assert_eq!(config.default_expand_depth, 2);
        assert!(config.grouping.enabled);
        assert!(config.grouping.group_by_type);
        assert!(config.grouping.group_by_prefix);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/topolens.json")).unwrap_err();
        assert!(matches!(err, TopologyError::IoError(_)));
    }
}
