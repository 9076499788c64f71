//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::audit::AuditArgs;

#[derive(Parser)]
#[command(name = "prometheus")]
#[command(about = "Prometheus - supervised research agent swarm", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .prometheus/
    #[arg(short, long, global = true, env = "PROMETHEUS_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the canonical hierarchy and run one task per specialist
    Demo,

    /// Run a safety audit against one agent
    Audit(AuditArgs),

    /// Show the supervision tree
    Hierarchy,
}
