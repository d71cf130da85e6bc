//! Deterministic column/row layout for the delegation tree.
//!
//! Nodes are grouped into depth columns and spaced on a fixed row step.
//! After the seed pass, exactly four relax/compact iterations pull
//! parents toward their children's span and re-pack each column onto the
//! uniform grid. Every pass is a pure function from the previous position
//! map to a new one, so re-running layout on the same tree produces
//! byte-identical output with no jitter between refreshes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tree::{NodeId, NodeRole, TreeNode};

// =============================================================================
// LAYOUT CONSTANTS
// =============================================================================

/// Default node size
pub const NODE_WIDTH: f32 = 160.0;
pub const NODE_HEIGHT: f32 = 70.0;

/// Spacing between nodes
pub const H_GAP: f32 = 40.0;
pub const V_GAP: f32 = 120.0;

/// Canvas padding on all sides
pub const PADDING: f32 = 24.0;

/// Relax/compact iterations. Fixed, not until-convergence.
const RELAX_ITERATIONS: usize = 4;

/// Layout metrics. `Default` carries the fixed rendering constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    pub h_gap: f32,
    pub v_gap: f32,
    pub padding: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: NODE_WIDTH,
            node_height: NODE_HEIGHT,
            h_gap: H_GAP,
            v_gap: V_GAP,
            padding: PADDING,
        }
    }
}

impl LayoutConfig {
    /// Vertical distance between adjacent rows in a column.
    pub fn row_step(&self) -> f32 {
        self.node_height + (self.v_gap * 0.35).max(16.0)
    }
}

/// Top-left position of one node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Overall canvas extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

/// Computed positions plus the canvas that contains them.
#[derive(Debug, Clone)]
pub struct Layout {
    pub positions: HashMap<NodeId, Point>,
    pub canvas: CanvasSize,
}

/// Per-node facts the passes need, captured once in DFS preorder.
struct NodeMeta {
    id: NodeId,
    depth: usize,
    children: Vec<NodeId>,
    is_root: bool,
}

/// Compute positions and canvas size for a tree with depths assigned.
pub fn compute_layout(root: &TreeNode, config: &LayoutConfig) -> Layout {
    let meta = collect_meta(root);
    let columns = depth_columns(&meta);

    let mut positions = seed_pass(&columns, config);
    for _ in 0..RELAX_ITERATIONS {
        positions = relax_pass(&positions, &meta);
        positions = compact_pass(&positions, &columns, config);
    }

    let canvas = canvas_size(&positions, config);
    Layout { positions, canvas }
}

fn collect_meta(root: &TreeNode) -> Vec<NodeMeta> {
    root.dfs()
        .into_iter()
        .map(|node| NodeMeta {
            id: node.id.clone(),
            depth: node.depth,
            children: node.children.iter().map(|c| c.id.clone()).collect(),
            is_root: node.role == NodeRole::RootAuthor,
        })
        .collect()
}

/// Group node ids by depth; DFS preorder within each column.
fn depth_columns(meta: &[NodeMeta]) -> Vec<Vec<NodeId>> {
    let max_depth = meta.iter().map(|m| m.depth).max().unwrap_or(0);
    let mut columns = vec![Vec::new(); max_depth + 1];
    for m in meta {
        columns[m.depth].push(m.id.clone());
    }
    columns
}

/// Seed pass: uniform rows per column, columns spaced by node width.
fn seed_pass(columns: &[Vec<NodeId>], config: &LayoutConfig) -> HashMap<NodeId, Point> {
    let row_step = config.row_step();
    let mut positions = HashMap::new();
    for (depth, column) in columns.iter().enumerate() {
        let x = config.padding + depth as f32 * (config.node_width + config.h_gap);
        for (index, id) in column.iter().enumerate() {
            positions.insert(
                id.clone(),
                Point {
                    x,
                    y: config.padding + index as f32 * row_step,
                },
            );
        }
    }
    positions
}

/// Fraction of the first-to-last-child span a parent sits at. Wide
/// fan-outs bias the parent upward instead of centering it.
fn span_bias(child_count: usize) -> f32 {
    match child_count {
        0 | 1 => 0.0,
        2 => 0.45,
        3 => 0.4,
        4..=6 => 0.34,
        _ => 0.28,
    }
}

/// Relax: parents take a y derived from their children's current span.
/// Reads only the previous snapshot, writes a fresh map.
fn relax_pass(prev: &HashMap<NodeId, Point>, meta: &[NodeMeta]) -> HashMap<NodeId, Point> {
    let mut next = prev.clone();
    for node in meta {
        let (Some(first_child), Some(last_child)) =
            (node.children.first(), node.children.last())
        else {
            continue;
        };
        let (Some(first), Some(last)) = (prev.get(first_child), prev.get(last_child)) else {
            continue;
        };
        let y = if node.is_root {
            (first.y + last.y) / 2.0
        } else {
            first.y + (last.y - first.y) * span_bias(node.children.len())
        };
        if let Some(point) = next.get_mut(&node.id) {
            point.y = y;
        }
    }
    next
}

/// Compact: re-pack each column onto the uniform row grid, shifting the
/// whole column to the mean of what relax asked for (clamped to padding).
/// Preserves DFS order and spacing within the column.
fn compact_pass(
    prev: &HashMap<NodeId, Point>,
    columns: &[Vec<NodeId>],
    config: &LayoutConfig,
) -> HashMap<NodeId, Point> {
    let row_step = config.row_step();
    let mut next = prev.clone();
    for column in columns {
        let offsets: Vec<f32> = column
            .iter()
            .enumerate()
            .filter_map(|(index, id)| prev.get(id).map(|p| p.y - index as f32 * row_step))
            .collect();
        if offsets.is_empty() {
            continue;
        }
        let baseline =
            (offsets.iter().sum::<f32>() / offsets.len() as f32).max(config.padding);
        for (index, id) in column.iter().enumerate() {
            if let Some(point) = next.get_mut(id) {
                point.y = baseline + index as f32 * row_step;
            }
        }
    }
    next
}

fn canvas_size(positions: &HashMap<NodeId, Point>, config: &LayoutConfig) -> CanvasSize {
    let mut max_x: f32 = 0.0;
    let mut max_y: f32 = 0.0;
    for point in positions.values() {
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    CanvasSize {
        width: max_x + config.node_width + config.padding,
        height: max_y + config.node_height + config.padding,
    }
}
