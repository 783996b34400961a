// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Trimming configuration: tolerances and iteration limits

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tolerances and thresholds used by every pass of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Triangle octree splits while a bucket holds more than this many triangles
    pub tri_leaf_size: usize,
    /// Node octree splits while a bucket holds more than this many nodes
    pub node_leaf_size: usize,
    /// Squared distance under which two nodes are merged
    pub merge_tol: f64,
    /// Snap distance used by the triangle splitter
    pub on_edge_tol: f64,
    /// Segment parameter treated as "at the end" during crossing resolution
    pub uv_min_tol: f64,
    /// Shortest intersection segment kept by the intersection engine
    pub min_segment_len: f64,
    /// Ray hit parameters closer than this are counted once
    pub ray_dedup_tol: f64,
    /// Squared endpoint distance for boundary-edge stitching
    pub share_edge_tol: f64,
    /// Triangles with an edge shorter than this are removed as degenerate
    pub degenerate_edge_len: f64,
    /// Needle detection: smallest allowed angle in degrees
    pub needle_min_angle: f64,
    /// Needle detection: short edge over sum of the other two
    pub needle_min_aspect: f64,
    /// Edge swap threshold in degrees
    pub swap_max_angle: f64,
    /// Needle/swap rounds run by the watertight check
    pub quality_iterations: usize,
    /// Upper bound on crossing-resolution restarts per triangle
    pub max_cross_iterations: usize,
    /// Largest model dimension while intersecting (0 disables scaling)
    pub scale_to: f64,
    /// Default slice count for mass properties
    pub mass_slices: usize,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            tri_leaf_size: 32,
            node_leaf_size: 64,
            merge_tol: 1.0e-12,
            on_edge_tol: 1.0e-5,
            uv_min_tol: 1.0e-3,
            min_segment_len: 1.0e-6,
            ray_dedup_tol: 1.0e-7,
            share_edge_tol: 1.0e-7,
            degenerate_edge_len: 1.0e-6,
            needle_min_angle: 2.0,
            needle_min_aspect: 0.005,
            swap_max_angle: 178.0,
            quality_iterations: 10,
            max_cross_iterations: 1000,
            scale_to: 1000.0,
            mass_slices: 20,
        }
    }
}

impl TrimConfig {
    /// Upper bound paired with [`Self::uv_min_tol`]
    pub fn uv_max_tol(&self) -> f64 {
        1.0 - self.uv_min_tol
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: TrimConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load `trim.toml` from the working directory if present, then apply
    /// `TRIM_*` environment overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from("trim.toml").exists() {
            Self::from_file("trim.toml")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("TRIM_MERGE_TOL") {
            self.merge_tol = v;
        }
        if let Some(v) = env_parse("TRIM_ON_EDGE_TOL") {
            self.on_edge_tol = v;
        }
        if let Some(v) = env_parse("TRIM_SCALE_TO") {
            self.scale_to = v;
        }
        if let Some(v) = env_parse("TRIM_MAX_CROSS_ITERATIONS") {
            self.max_cross_iterations = v;
        }
        if let Some(v) = env_parse("TRIM_MASS_SLICES") {
            self.mass_slices = v;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TrimConfig = toml::from_str("merge_tol = 1e-10\nmass_slices = 7\n").unwrap();
        assert_eq!(config.merge_tol, 1.0e-10);
        assert_eq!(config.mass_slices, 7);
        assert_eq!(config.tri_leaf_size, 32);
        assert_eq!(config.swap_max_angle, 178.0);
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let file = NamedTempFile::with_suffix(".toml")?;
        let mut config = TrimConfig::default();
        config.quality_iterations = 3;
        config.save(file.path())?;

        let loaded = TrimConfig::from_file(file.path())?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_uv_max_tol() {
        let config = TrimConfig::default();
        assert!((config.uv_max_tol() - 0.999).abs() < 1e-12);
    }
}
