use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::model::position::NodeMetrics;

const MAX_NODE_LIMIT: usize = 100_000;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigCommand {
    SetNodeWidth(f64),
    SetNodeHeight(f64),
    SetNodeGap(f64),
    SetRowGap(f64),
    SetMaxNodes(usize),
}

pub fn config_file() -> PathBuf { PathBuf::from("histree.toml") }

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    layout: LayoutSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct Config {
    pub layout: LayoutSettings,
}

/// Sizes of a stamp box and the spacing around it, in pixels, plus the
/// eviction limit.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    #[serde(default = "default_node_width")]
    pub node_width: f64,
    #[serde(default = "default_node_height")]
    pub node_height: f64,
    /// Horizontal gap between neighbouring stamps, also used as the left margin.
    #[serde(default = "default_node_gap")]
    pub node_gap: f64,
    /// Vertical gap between rows.
    #[serde(default = "default_row_gap")]
    pub row_gap: f64,
    /// Live stamps kept before the oldest ones are evicted.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            node_width: default_node_width(),
            node_height: default_node_height(),
            node_gap: default_node_gap(),
            row_gap: default_row_gap(),
            max_nodes: default_max_nodes(),
        }
    }
}

impl LayoutSettings {
    pub fn metrics(&self) -> NodeMetrics {
        NodeMetrics {
            node_width: self.node_width,
            node_height: self.node_height,
            node_gap: self.node_gap,
            row_gap: self.row_gap,
        }
    }

    /// Applies a runtime setter. Returns whether anything changed.
    pub fn apply(&mut self, command: &ConfigCommand) -> bool {
        let before = self.clone();
        match *command {
            ConfigCommand::SetNodeWidth(width) => self.node_width = width,
            ConfigCommand::SetNodeHeight(height) => self.node_height = height,
            ConfigCommand::SetNodeGap(gap) => self.node_gap = gap,
            ConfigCommand::SetRowGap(gap) => self.row_gap = gap,
            ConfigCommand::SetMaxNodes(max) => self.max_nodes = max,
        }
        *self != before
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(self.node_width > 0.0) {
            issues.push(format!("node_width must be positive, got {}", self.node_width));
        }
        if !(self.node_height > 0.0) {
            issues.push(format!("node_height must be positive, got {}", self.node_height));
        }
        if !(self.node_gap >= 0.0) {
            issues.push(format!("node_gap must be non-negative, got {}", self.node_gap));
        }
        if !(self.row_gap >= 0.0) {
            issues.push(format!("row_gap must be non-negative, got {}", self.row_gap));
        }
        if self.max_nodes < 2 {
            issues.push(format!("max_nodes must be at least 2, got {}", self.max_nodes));
        }
        if self.max_nodes > MAX_NODE_LIMIT {
            issues.push(format!(
                "max_nodes should not exceed {} for performance reasons",
                MAX_NODE_LIMIT
            ));
        }

        issues
    }
}

fn default_node_width() -> f64 { 40.0 }

fn default_node_height() -> f64 { 24.0 }

fn default_node_gap() -> f64 { 10.0 }

fn default_row_gap() -> f64 { 16.0 }

fn default_max_nodes() -> usize { 256 }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> { Self::load(path)?.checked() }

    pub fn parse(buf: &str) -> anyhow::Result<Config> { Self::deserialize(buf)?.checked() }

    /// Reads a config file without checking its values, so every issue can
    /// be reported through [`Config::validate`].
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::deserialize(&buf)
    }

    fn deserialize(buf: &str) -> anyhow::Result<Config> {
        let file: ConfigFile = match toml::from_str(buf) {
            Ok(file) => file,
            Err(e) => bail!("{e}"),
        };
        Ok(Config { layout: file.layout })
    }

    fn checked(self) -> anyhow::Result<Config> {
        let issues = self.validate();
        if !issues.is_empty() {
            bail!("invalid configuration:\n  {}", issues.join("\n  "));
        }
        Ok(self)
    }

    /// Save the current config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let config_file = ConfigFile { layout: self.layout.clone() };
        let toml_string = toml::to_string_pretty(&config_file)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> { self.layout.validate() }
}
