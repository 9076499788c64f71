use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::agent::AgentRole;

/// Main configuration structure for Prometheus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Message bus configuration
    #[serde(default)]
    pub bus: BusConfig,

    /// Agent runtime configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Safety interlock configuration
    #[serde(default)]
    pub interlock: InterlockConfig,

    /// Supervision tree shape
    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    /// Task monitoring configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Message bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BusConfig {
    /// Bounded queue length per receiver
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

const fn default_queue_capacity() -> usize {
    1000
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Agent runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Deadline applied to every task action; 0 disables it
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

const fn default_task_timeout_secs() -> u64 {
    600
}

impl RuntimeConfig {
    pub const fn task_timeout(&self) -> Option<Duration> {
        if self.task_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.task_timeout_secs))
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

/// Safety interlock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InterlockConfig {
    /// When false, audits are advisory only
    #[serde(default = "default_true")]
    pub veto_enabled: bool,

    /// Risk bands used to grade check readings
    #[serde(default)]
    pub thresholds: RiskThresholds,
}

const fn default_true() -> bool {
    true
}

impl Default for InterlockConfig {
    fn default() -> Self {
        Self {
            veto_enabled: true,
            thresholds: RiskThresholds::default(),
        }
    }
}

/// Ascending risk thresholds in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskThresholds {
    #[serde(default = "default_low")]
    pub low: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_high")]
    pub high: f64,
    #[serde(default = "default_critical")]
    pub critical: f64,
}

const fn default_low() -> f64 {
    0.3
}

const fn default_medium() -> f64 {
    0.6
}

const fn default_high() -> f64 {
    0.8
}

const fn default_critical() -> f64 {
    0.9
}

impl RiskThresholds {
    /// Thresholds are within [0, 1] and strictly ascending.
    pub fn is_ascending(&self) -> bool {
        let bands = [self.low, self.medium, self.high, self.critical];
        bands.iter().all(|t| (0.0..=1.0).contains(t)) && bands.windows(2).all(|w| w[0] < w[1])
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: default_low(),
            medium: default_medium(),
            high: default_high(),
            critical: default_critical(),
        }
    }
}

/// One supervisor -> subordinate edge of the supervision tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEdge {
    pub parent: AgentRole,
    pub child: AgentRole,
}

impl HierarchyEdge {
    pub const fn new(parent: AgentRole, child: AgentRole) -> Self {
        Self { parent, child }
    }
}

/// Supervision tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HierarchyConfig {
    #[serde(default = "default_edges")]
    pub edges: Vec<HierarchyEdge>,
}

fn default_edges() -> Vec<HierarchyEdge> {
    vec![
        HierarchyEdge::new(AgentRole::Coordinator, AgentRole::Architect),
        HierarchyEdge::new(AgentRole::Coordinator, AgentRole::Explorer),
        HierarchyEdge::new(AgentRole::Coordinator, AgentRole::Overseer),
        HierarchyEdge::new(AgentRole::Architect, AgentRole::Reasoner),
    ]
}

impl HierarchyConfig {
    /// Every role mentioned by an edge, parents before their children.
    pub fn roles(&self) -> Vec<AgentRole> {
        let mut roles = Vec::new();
        for edge in &self.edges {
            for role in [edge.parent, edge.child] {
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }
        roles
    }

    /// Roles that appear as a parent but never as a child.
    pub fn roots(&self) -> Vec<AgentRole> {
        self.roles()
            .into_iter()
            .filter(|r| !self.edges.iter().any(|e| e.child == *r))
            .collect()
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            edges: default_edges(),
        }
    }
}

/// Task monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitorConfig {
    /// In-progress tasks not updated for this long are reported as stuck
    #[serde(default = "default_stuck_after_secs")]
    pub stuck_after_secs: u64,
}

const fn default_stuck_after_secs() -> u64 {
    3600
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stuck_after_secs: default_stuck_after_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
