use tracing::trace;

use super::board::Board;
use super::compaction::ShiftFlags;
use crate::model::position::Position;
use crate::model::tree::{Stamp, StampId};

impl Board {
    /// Moves `stamp` right to `to`. Nothing happens unless `to` is right of
    /// where the stamp already is.
    pub fn shift_right(&mut self, stamp: StampId, to: Position, flags: ShiftFlags) {
        let m = self.metrics;
        let delta = to - self.pos(stamp);
        if !delta.is_positive(&m) {
            return;
        }
        trace!(?stamp, ?delta, ?flags, "shift right");
        self.tree.map.set_position(stamp, to);

        if flags.contains(ShiftFlags::SHIFT_CHILDREN) {
            // Right to left, so each child only ever meets a sibling that
            // has already moved.
            let children: Vec<_> = stamp.children_rev(&self.tree.map).collect();
            for child in children {
                let to = self.pos(child) + delta;
                self.shift_right(child, to, ShiftFlags::SHIFT_CHILDREN | ShiftFlags::NEIGHBORS);
            }
        }

        if flags.contains(ShiftFlags::SHIFT_PARENT)
            && let Some(parent) = stamp.parent(&self.tree.map)
        {
            let map = &self.tree.map;
            let edge = parent.first_child(map) == Some(stamp) || parent.last_child(map) == Some(stamp);
            if edge {
                self.pull_parent_right(parent);
            }
        }

        if flags.contains(ShiftFlags::NEIGHBORS) {
            self.push_neighbors_right(stamp);
        }
    }

    /// Walks right along the row pushing every neighbour that sits closer
    /// than one step. The first neighbour with enough room ends the walk,
    /// after its parent is checked for centring.
    pub fn push_neighbors_right(&mut self, stamp: StampId) {
        let m = self.metrics;
        let mut left = stamp;
        while let Some(right) = self.right_of(left) {
            let min = self.pos(left) + Position::STEP;
            if !self.pos(right).is_left_of(min, &m) {
                if let Some(parent) = right.parent(&self.tree.map) {
                    self.pull_parent_right(parent);
                }
                break;
            }
            self.shift_right(right, min, ShiftFlags::SHIFT_CHILDREN | ShiftFlags::SHIFT_PARENT);
            left = right;
        }
    }

    fn pull_parent_right(&mut self, parent: StampId) {
        let m = self.metrics;
        if let Some(center) = self.center_of_children(parent)
            && self.pos(parent).is_left_of(center, &m)
        {
            self.shift_right(parent, center, ShiftFlags::SHIFT_PARENT | ShiftFlags::NEIGHBORS);
        }
    }

    /// Column a new child of `parent` takes in the row below it: after its
    /// existing children, otherwise before the first stamp whose parent sits
    /// right of `parent`. Parentless stamps in the row never decide it.
    pub fn insertion_column(&self, parent: StampId) -> usize {
        let map = &self.tree.map;
        if let Some(last) = parent.last_child(map) {
            return map[last].column + 1;
        }
        let anchor = map[parent].column;
        let row = self.rows.row(map[parent].row + 1);
        row.iter()
            .position(|&s| s.parent(map).is_some_and(|p| map[p].column > anchor))
            .unwrap_or(row.len())
    }

    /// Where a new stamp starts before compaction: one step after its
    /// previous sibling, on top of its parent when it is the first child, or
    /// after the row's last stamp for a new root.
    pub fn provisional_position(&self, parent: Option<StampId>) -> Position {
        let map = &self.tree.map;
        match parent {
            Some(parent) => match parent.last_child(map) {
                Some(sibling) => self.pos(sibling) + Position::STEP,
                None => self.pos(parent),
            },
            None => match self.rows.rightmost(0) {
                Some(last) => self.pos(last) + Position::STEP,
                None => Position::MARGIN,
            },
        }
    }

    /// Adds a stamp under `parent` (or as a new root) and tightens the layout
    /// around it.
    pub fn place_new_stamp(&mut self, parent: Option<StampId>, step: u64, order: u64) -> StampId {
        let m = self.metrics;
        let (row, column) = match parent {
            Some(parent) => (self.tree.map[parent].row + 1, self.insertion_column(parent)),
            None => (0, self.rows.row(0).len()),
        };
        let mut stamp = Stamp::new(step, order);
        stamp.position = self.provisional_position(parent);

        let id = self.tree.mk_stamp(stamp);
        if let Some(parent) = parent {
            self.tree.push_back(id, parent);
        }
        self.rows.insert(&mut self.tree.map, id, row, column);

        match self.left_of(id) {
            Some(left) if self.pos(id).is_left_of(self.pos(left) + Position::STEP, &m) => {
                let to = self.pos(left) + Position::STEP;
                self.shift_right(id, to, ShiftFlags::SHIFT_PARENT | ShiftFlags::NEIGHBORS);
            }
            _ => self.push_neighbors_right(id),
        }
        if let Some(parent) = parent {
            self.recenter(parent);
        }

        let room = self.pos(id) - Position::MARGIN;
        self.shift_left(
            id,
            room,
            ShiftFlags::CHECK_PARENT | ShiftFlags::SHIFT_PARENT | ShiftFlags::NEIGHBORS,
        );
        if let Some(parent) = parent
            && let Some(first) = parent.first_child(&self.tree.map)
            && first != id
        {
            let room = self.pos(first) - Position::MARGIN;
            self.shift_left(first, room, ShiftFlags::SUBTREE | ShiftFlags::NEIGHBORS);
        }
        id
    }
}
