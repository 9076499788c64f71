//! Supervision tree display.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use super::Swarm;
use crate::adapters::probes::BaselineProbe;
use crate::cli::output::{output, render_hierarchy, CommandOutput};
use crate::domain::models::Config;
use crate::services::HierarchyNode;

#[derive(Debug, Serialize)]
pub struct HierarchyOutput {
    pub roots: Vec<HierarchyNode>,
}

impl CommandOutput for HierarchyOutput {
    fn to_human(&self) -> String {
        if self.roots.is_empty() {
            return "No agents configured.".to_string();
        }
        render_hierarchy(&self.roots).trim_end().to_string()
    }
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let swarm = Swarm::new(config, Arc::new(BaselineProbe));
    let result = swarm
        .manager
        .setup_hierarchy()
        .await
        .context("failed to build the supervision hierarchy");
    let roots = swarm.manager.hierarchy_structure().await;
    swarm.shutdown().await;
    result?;

    output(&HierarchyOutput { roots }, json_mode);
    Ok(())
}
