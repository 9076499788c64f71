//! Output formatting utilities for the CLI.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use crate::services::HierarchyNode;

const TREE_BRANCH: &str = "├── ";
const TREE_LAST: &str = "└── ";
const TREE_PIPE: &str = "│   ";
const TREE_SPACE: &str = "    ";

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to at most `max_len` characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Borderless table with upper-cased headers.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Box-drawing rendering of the supervision forest.
pub fn render_hierarchy(roots: &[HierarchyNode]) -> String {
    let mut out = String::new();
    for root in roots {
        render_node(root, "", true, true, &mut out);
    }
    out
}

fn render_node(node: &HierarchyNode, prefix: &str, is_root: bool, is_last: bool, out: &mut String) {
    let connector = match (is_root, is_last) {
        (true, _) => "",
        (false, true) => TREE_LAST,
        (false, false) => TREE_BRANCH,
    };
    let state = if node.is_active { "active" } else { "stopped" };
    out.push_str(&format!(
        "{prefix}{connector}{} ({}) [{}] {state}\n",
        node.name,
        node.role,
        node.agent_id.short()
    ));

    let child_prefix = match (is_root, is_last) {
        (true, _) => String::new(),
        (false, true) => format!("{prefix}{TREE_SPACE}"),
        (false, false) => format!("{prefix}{TREE_PIPE}"),
    };
    for (i, child) in node.children.iter().enumerate() {
        render_node(child, &child_prefix, false, i + 1 == node.children.len(), out);
    }
}
