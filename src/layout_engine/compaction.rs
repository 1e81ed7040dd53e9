use bitflags::bitflags;
use tracing::trace;

use super::board::Board;
use crate::model::position::Position;
use crate::model::tree::StampId;

bitflags! {
    /// Which stamps coupled to a shifted stamp are checked and moved with it.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct ShiftFlags: u8 {
        /// Children may not be pushed into their own left neighbours.
        const CHECK_CHILDREN = 1 << 0;
        /// The parent must be able to follow to stay centred.
        const CHECK_PARENT   = 1 << 1;
        /// Translate the whole subtree instead of the stamp alone.
        const SHIFT_CHILDREN = 1 << 2;
        /// Recentre the parent after the move.
        const SHIFT_PARENT   = 1 << 3;
        /// Pass the same leftward pressure on to the right neighbours.
        const NEIGHBORS      = 1 << 4;

        const SUBTREE = Self::CHECK_CHILDREN.bits()
            | Self::CHECK_PARENT.bits()
            | Self::SHIFT_CHILDREN.bits()
            | Self::SHIFT_PARENT.bits();
    }
}

impl Board {
    /// How far `evaluated` may move left, at most `proposed`, when `target`
    /// is the stamp actually being shifted. Takes the most restrictive of the
    /// neighbour, children and parent limits.
    pub fn max_left_shift(
        &self,
        target: StampId,
        evaluated: StampId,
        proposed: Position,
        flags: ShiftFlags,
    ) -> Position {
        let m = &self.metrics;
        let map = &self.tree.map;
        let here = self.pos(evaluated);
        let mut distance = proposed;

        match self.left_of(evaluated) {
            Some(left) if left.descends_from(target, map) => {}
            Some(left) => {
                distance = distance.min_by(here - self.pos(left) - Position::STEP, m);
            }
            None => distance = distance.min_by(here - Position::MARGIN, m),
        }
        if !distance.is_positive(m) {
            return Position::ZERO;
        }

        if flags.contains(ShiftFlags::CHECK_CHILDREN) {
            let child_flags = flags - (ShiftFlags::CHECK_PARENT | ShiftFlags::SHIFT_PARENT);
            for child in evaluated.children(map) {
                distance =
                    distance.min_by(self.max_left_shift(target, child, distance, child_flags), m);
                if !distance.is_positive(m) {
                    return Position::ZERO;
                }
            }
        }

        if flags.contains(ShiftFlags::CHECK_PARENT)
            && let Some(parent) = evaluated.parent(map)
        {
            // Only the first child drags its parent the full distance; any
            // later child moves the centre by half.
            let first = parent.first_child(map) == Some(evaluated);
            let pull = if first { distance } else { distance * 0.5 };
            let allowed = self.max_left_shift(parent, parent, pull, ShiftFlags::CHECK_PARENT);
            let limit = if first { allowed } else { allowed * 2.0 };
            distance = distance.min_by(limit, m);
            if !distance.is_positive(m) {
                return Position::ZERO;
            }
        }

        distance
    }

    /// Moves `target` left by as much of `proposed` as the layout allows and
    /// returns the distance actually moved.
    pub fn shift_left(&mut self, target: StampId, proposed: Position, flags: ShiftFlags) -> Position {
        let m = self.metrics;
        let distance = self.max_left_shift(target, target, proposed, flags);
        let parent = target.parent(&self.tree.map);

        if !distance.is_positive(&m) {
            // A target that cannot move still gets its parent reconciled.
            if flags.contains(ShiftFlags::SHIFT_PARENT)
                && let Some(parent) = parent
            {
                self.recenter(parent);
            }
            return Position::ZERO;
        }

        trace!(?target, ?distance, ?flags, "shift left");
        if flags.contains(ShiftFlags::SHIFT_CHILDREN) {
            self.translate_subtree(target, -distance);
        } else {
            self.translate(target, -distance);
        }

        if flags.contains(ShiftFlags::SHIFT_PARENT)
            && let Some(parent) = parent
        {
            self.recenter(parent);
        }

        // Every neighbour shifts with its parent checked and recentred, not
        // only the last one, so no parent is left off centre mid-walk.
        if flags.contains(ShiftFlags::NEIGHBORS) {
            let mut next = self.right_of(target);
            while let Some(right) = next {
                let moved = self.shift_left(right, distance, ShiftFlags::SUBTREE);
                if !moved.is_positive(&m) {
                    break;
                }
                next = self.right_of(right);
            }
        }

        distance
    }

    /// Puts `parent` back over the middle of its children. Moving left may
    /// be blocked; the children then move right by whatever is missing.
    pub fn recenter(&mut self, parent: StampId) {
        let m = self.metrics;
        let Some(center) = self.center_of_children(parent) else {
            return;
        };
        let here = self.pos(parent);

        if here.is_left_of(center, &m) {
            self.shift_right(parent, center, ShiftFlags::SHIFT_PARENT | ShiftFlags::NEIGHBORS);
        } else if center.is_left_of(here, &m) {
            let wanted = here - center;
            let moved = self.shift_left(
                parent,
                wanted,
                ShiftFlags::CHECK_PARENT | ShiftFlags::SHIFT_PARENT | ShiftFlags::NEIGHBORS,
            );
            let deficit = wanted - moved;
            if deficit.is_positive(&m) {
                trace!(?parent, ?deficit, "parent blocked, pushing children right");
                let children: Vec<_> = parent.children_rev(&self.tree.map).collect();
                for child in children {
                    let to = self.pos(child) + deficit;
                    self.shift_right(child, to, ShiftFlags::SHIFT_CHILDREN | ShiftFlags::NEIGHBORS);
                }
            }
        }
    }

    pub(super) fn translate(&mut self, stamp: StampId, delta: Position) {
        let to = self.pos(stamp) + delta;
        self.tree.map.set_position(stamp, to);
    }

    pub(super) fn translate_subtree(&mut self, stamp: StampId, delta: Position) {
        let subtree: Vec<_> = stamp.traverse_postorder(&self.tree.map).collect();
        for id in subtree {
            self.translate(id, delta);
        }
    }
}
