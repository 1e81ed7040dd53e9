use std::ops::{Index, IndexMut};

use slotmap::SlotMap;

use super::position::Position;

/// History forest. Usually a single tree, but evicting or deleting a stamp
/// leaves its children behind as parentless roots.
pub struct HistoryTree {
    pub map: StampMap,
}

impl Default for HistoryTree {
    fn default() -> Self { Self::new() }
}

impl HistoryTree {
    pub fn new() -> Self { HistoryTree { map: StampMap::new() } }

    /// Adds a parentless stamp to the forest.
    pub fn mk_stamp(&mut self, stamp: Stamp) -> StampId {
        self.map.map.insert(Stamp {
            parent: None,
            prev_sibling: None,
            next_sibling: None,
            first_child: None,
            last_child: None,
            ..stamp
        })
    }

    /// Appends `child` as the last (rightmost, newest) child of `parent`.
    #[track_caller]
    pub fn push_back(&mut self, child: StampId, parent: StampId) {
        assert!(child.parent(&self.map).is_none(), "push_back on attached stamp {child:?}");
        assert_ne!(child, parent, "stamp cannot be its own parent");
        child.link_under_back(parent, &mut self.map);
    }

    /// Unlinks a stamp from its parent. Its children stay attached to it.
    #[track_caller]
    pub fn detach(&mut self, stamp: StampId) {
        if stamp.parent(&self.map).is_some() {
            self.map.unlink(stamp);
        }
    }

    /// Detaches every child, leaving each one a root of its own subtree.
    #[track_caller]
    pub fn orphan_children(&mut self, stamp: StampId) -> Vec<StampId> {
        let children: Vec<_> = stamp.children(&self.map).collect();
        for &child in &children {
            self.detach(child);
        }
        children
    }

    /// Removes a detached, childless stamp from the forest.
    #[track_caller]
    pub fn remove(&mut self, stamp: StampId) -> Stamp {
        assert!(
            stamp.parent(&self.map).is_none() && stamp.is_leaf(&self.map),
            "remove called on linked stamp {stamp:?}"
        );
        self.map.map.remove(stamp).expect("remove called on unknown stamp")
    }
}

/// Arena holding every live stamp.
pub struct StampMap {
    map: SlotMap<StampId, Stamp>,
}

impl StampMap {
    fn new() -> StampMap { StampMap { map: SlotMap::default() } }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn contains(&self, id: StampId) -> bool { self.map.contains_key(id) }

    pub fn iter(&self) -> impl Iterator<Item = (StampId, &Stamp)> + '_ { self.map.iter() }

    pub fn position(&self, id: StampId) -> Position { self.map[id].position }

    pub fn set_position(&mut self, id: StampId, position: Position) {
        self.map[id].position = position;
    }
}

impl Index<StampId> for StampMap {
    type Output = Stamp;

    fn index(&self, index: StampId) -> &Self::Output { &self.map[index] }
}

impl IndexMut<StampId> for StampMap {
    fn index_mut(&mut self, index: StampId) -> &mut Self::Output { &mut self.map[index] }
}

slotmap::new_key_type! {
    /// Identifies a stamp somewhere in the forest.
    pub struct StampId;
}

/// One edit in the diagram.
#[derive(Default, PartialEq, Debug, Clone)]
pub struct Stamp {
    parent: Option<StampId>,
    prev_sibling: Option<StampId>,
    next_sibling: Option<StampId>,
    first_child: Option<StampId>,
    last_child: Option<StampId>,
    /// Depth level in the row index. Renumbered when a shallower row empties.
    pub row: usize,
    /// Index within the row, left to right.
    pub column: usize,
    /// Number of edits since the board was created. Never renumbered.
    pub step: u64,
    /// Strictly increasing creation id.
    pub order: u64,
    pub position: Position,
    pub marked_for_eviction: bool,
}

impl Stamp {
    pub fn new(step: u64, order: u64) -> Self {
        Stamp { step, order, ..Stamp::default() }
    }
}

impl StampId {
    #[track_caller]
    pub fn parent(self, map: &StampMap) -> Option<StampId> { map.map[self].parent }

    #[track_caller]
    pub fn children(self, map: &StampMap) -> impl Iterator<Item = StampId> + '_ {
        ChildIterator { cur: map.map[self].first_child, map }
    }

    #[track_caller]
    pub fn children_rev(self, map: &StampMap) -> impl Iterator<Item = StampId> + '_ {
        ChildRevIterator { cur: map.map[self].last_child, map }
    }

    /// `None` for a leaf; callers must not assume a child exists.
    #[track_caller]
    pub fn first_child(self, map: &StampMap) -> Option<StampId> { map.map[self].first_child }

    /// `None` for a leaf; callers must not assume a child exists.
    #[track_caller]
    pub fn last_child(self, map: &StampMap) -> Option<StampId> { map.map[self].last_child }

    #[track_caller]
    pub fn next_sibling(self, map: &StampMap) -> Option<StampId> { map.map[self].next_sibling }

    #[track_caller]
    pub fn prev_sibling(self, map: &StampMap) -> Option<StampId> { map.map[self].prev_sibling }

    #[track_caller]
    pub fn is_leaf(self, map: &StampMap) -> bool { map.map[self].first_child.is_none() }

    /// Iterates from this stamp up to its root, including itself.
    #[track_caller]
    pub fn ancestors(self, map: &StampMap) -> impl Iterator<Item = StampId> + '_ {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let stamp = next;
            next = stamp.and_then(|s| map.map[s].parent);
            stamp
        })
    }

    /// Whether `ancestor` is this stamp or one of its ancestors.
    #[track_caller]
    pub fn descends_from(self, ancestor: StampId, map: &StampMap) -> bool {
        self.ancestors(map).any(|s| s == ancestor)
    }

    #[track_caller]
    pub fn root(self, map: &StampMap) -> StampId {
        self.ancestors(map).last().unwrap_or(self)
    }

    #[track_caller]
    pub fn traverse_postorder(self, map: &StampMap) -> impl Iterator<Item = StampId> + '_ {
        PostorderTraversal::new(map, self)
    }

    fn link_under_back(self, parent: StampId, map: &mut StampMap) {
        let prev_child = {
            let parent_stamp = &mut map.map[parent];
            parent_stamp.first_child.get_or_insert(self);
            parent_stamp.last_child.replace(self)
        };
        map.map[self].parent = Some(parent);
        if let Some(prev) = prev_child {
            map.map[prev].next_sibling = Some(self);
            map.map[self].prev_sibling = Some(prev);
        }
    }
}

impl StampMap {
    #[track_caller]
    fn unlink(&mut self, id: StampId) {
        let Stamp { prev_sibling, next_sibling, parent, .. } = self.map[id];
        if let Some(prev) = prev_sibling {
            self.map[prev].next_sibling = next_sibling;
        }
        if let Some(next) = next_sibling {
            self.map[next].prev_sibling = prev_sibling;
        }
        if let Some(parent) = parent {
            let parent_stamp = &mut self.map[parent];
            if parent_stamp.first_child == Some(id) {
                parent_stamp.first_child = next_sibling;
            }
            if parent_stamp.last_child == Some(id) {
                parent_stamp.last_child = prev_sibling;
            }
        }
        let stamp = &mut self.map[id];
        stamp.prev_sibling = None;
        stamp.next_sibling = None;
        stamp.parent = None;
    }
}

struct ChildIterator<'a> {
    cur: Option<StampId>,
    map: &'a StampMap,
}

impl<'a> Iterator for ChildIterator<'a> {
    type Item = StampId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = self.map.map[id].next_sibling;
        Some(id)
    }
}

struct ChildRevIterator<'a> {
    cur: Option<StampId>,
    map: &'a StampMap,
}

impl<'a> Iterator for ChildRevIterator<'a> {
    type Item = StampId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = self.map.map[id].prev_sibling;
        Some(id)
    }
}

struct PostorderTraversal<'a> {
    cur: Option<StampId>,
    top: StampId,
    map: &'a StampMap,
}

impl<'a> PostorderTraversal<'a> {
    fn new(map: &'a StampMap, root: StampId) -> Self {
        Self {
            top: root,
            cur: Some(Self::descend_left(root, map)),
            map,
        }
    }

    fn descend_left(mut stamp: StampId, map: &'a StampMap) -> StampId {
        while let Some(child) = stamp.first_child(map) {
            stamp = child;
        }
        stamp
    }
}

impl<'a> Iterator for PostorderTraversal<'a> {
    type Item = StampId;

    fn next(&mut self) -> Option<Self::Item> {
        let stamp = self.cur?;
        self.cur = None;
        if stamp != self.top {
            if let Some(next) = stamp.next_sibling(self.map) {
                self.cur = Some(Self::descend_left(next, self.map));
            } else {
                self.cur = stamp.parent(self.map);
            }
        }
        Some(stamp)
    }
}
