use serde::Serialize;

use crate::model::position::{NodeMetrics, Position};
use crate::model::rows::RowIndex;
use crate::model::tree::{HistoryTree, StampId};

/// Diagram size in pixels, for scrolling.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

/// The stamps, their rows and the metrics that turn positions into pixels.
/// Every layout primitive runs against this.
pub struct Board {
    pub tree: HistoryTree,
    pub rows: RowIndex,
    pub metrics: NodeMetrics,
}

impl Board {
    pub fn new(metrics: NodeMetrics) -> Self {
        Board {
            tree: HistoryTree::new(),
            rows: RowIndex::new(),
            metrics,
        }
    }

    pub fn pos(&self, stamp: StampId) -> Position { self.tree.map.position(stamp) }

    pub fn left_of(&self, stamp: StampId) -> Option<StampId> {
        self.rows.left_of(&self.tree.map, stamp)
    }

    pub fn right_of(&self, stamp: StampId) -> Option<StampId> {
        self.rows.right_of(&self.tree.map, stamp)
    }

    /// Where `parent` belongs given its children, or `None` for a leaf.
    pub fn center_of_children(&self, parent: StampId) -> Option<Position> {
        let map = &self.tree.map;
        let first = parent.first_child(map)?;
        let last = parent.last_child(map)?;
        Some(Position::midpoint(self.pos(first), self.pos(last)))
    }

    pub fn pixel_x(&self, stamp: StampId) -> f64 { self.pos(stamp).pixels(&self.metrics) }

    pub fn pixel_y(&self, stamp: StampId) -> f64 {
        self.metrics.row_y(self.tree.map[stamp].row)
    }

    /// Right edge of the widest row plus a trailing gap, and the height of
    /// every row stacked with its gaps.
    pub fn extent(&self) -> Extent {
        if self.rows.is_empty() {
            return Extent::default();
        }
        let m = &self.metrics;
        let width = (0..self.rows.len())
            .filter_map(|row| self.rows.rightmost(row))
            .map(|stamp| self.pixel_x(stamp) + m.node_width + m.node_gap)
            .fold(0.0, f64::max);
        let height = self.rows.len() as f64 * (m.node_height + m.row_gap) + m.row_gap;
        Extent { width, height }
    }
}
