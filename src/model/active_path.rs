use crate::model::tree::{StampId, StampMap};

/// Root-to-frontier chain of stamps that decides the default redo target.
///
/// Rebuilt when an edit lands under the current stamp or the user picks a
/// stamp by hand, but left alone while stepping with undo and redo, so redo
/// keeps offering the same branch.
#[derive(Default, Debug, Clone)]
pub struct ActivePath {
    stamps: Vec<StampId>,
}

impl ActivePath {
    pub fn new() -> Self { Self::default() }

    /// Rebuilds the path through `current`: every ancestor from the root
    /// down, then single-child links until a stamp with zero or several
    /// children.
    pub fn reconfigure(&mut self, map: &StampMap, current: StampId) {
        self.stamps.clear();
        self.stamps.extend(current.ancestors(map));
        self.stamps.reverse();
        let mut frontier = current;
        while let (Some(first), Some(last)) = (frontier.first_child(map), frontier.last_child(map))
        {
            if first != last {
                break;
            }
            self.stamps.push(first);
            frontier = first;
        }
    }

    pub fn invalidate(&mut self) { self.stamps.clear(); }

    pub fn is_valid(&self) -> bool { !self.stamps.is_empty() }

    pub fn contains(&self, stamp: StampId) -> bool { self.stamps.contains(&stamp) }

    pub fn as_slice(&self) -> &[StampId] { &self.stamps }

    /// The stamp after `current` on the path, if any.
    pub fn redo_target(&self, current: StampId) -> Option<StampId> {
        let idx = self.stamps.iter().position(|&s| s == current)?;
        self.stamps.get(idx + 1).copied()
    }

    pub fn can_redo(&self, current: StampId) -> bool { self.redo_target(current).is_some() }
}
