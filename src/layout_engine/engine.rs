use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use tracing::{debug, info, trace};

use super::board::{Board, Extent};
use super::compaction::ShiftFlags;
use super::error::HistoryError;
use crate::common::collections::HashMap;
use crate::common::config::{ConfigCommand, LayoutSettings};
use crate::model::active_path::ActivePath;
use crate::model::fifo::CreationFifo;
use crate::model::position::Position;
use crate::model::tree::StampId;

/// External edit record attached to a stamp. The engine never looks inside
/// `snapshot`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit<T> {
    pub kind: String,
    pub snapshot: T,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryCommand<T> {
    Edit {
        kind: String,
        #[serde(default)]
        snapshot: T,
    },
    Undo,
    Redo,
    MakeCurrent {
        order: u64,
    },
    Select {
        order: Option<u64>,
    },
    Delete {
        order: u64,
    },
    DeleteSubtree {
        order: u64,
    },
    Configure(ConfigCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Drop the stamp from the creation FIFO. Eviction pops it itself.
    pub remove_from_fifo: bool,
    /// Deleting the current stamp first undoes to its parent. Otherwise the
    /// current stamp is only marked and goes once it stops being current.
    pub undo_if_current: bool,
}

impl DeleteOptions {
    /// A delete the user asked for.
    pub const USER: Self = DeleteOptions {
        remove_from_fifo: true,
        undo_if_current: true,
    };
    /// A delete that only makes room.
    pub const MAKE_ROOM: Self = DeleteOptions {
        remove_from_fifo: true,
        undo_if_current: false,
    };
}

/// What changed, for whoever draws the diagram.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventResponse {
    pub created: Option<StampId>,
    /// Creation orders of stamps deleted on request.
    pub removed: Vec<u64>,
    /// Creation orders of stamps dropped to stay under the node limit.
    pub evicted: Vec<u64>,
    pub repaint: bool,
    pub extent: Extent,
}

/// Render view of one live stamp.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StampView {
    #[serde(skip)]
    pub id: StampId,
    pub order: u64,
    pub parent: Option<u64>,
    pub step: u64,
    pub row: usize,
    pub column: usize,
    pub x: i32,
    pub y: i32,
    pub kind: String,
    pub current: bool,
    pub selected: bool,
    pub marked: bool,
}

/// Branching edit history laid out as a compact tree diagram.
///
/// Every mutation leaves the diagram free of overlaps, with each parent
/// centred over its children and nothing left of the margin. Layout repair
/// is local to the stamps a change touches.
pub struct LayoutEngine<T> {
    board: Board,
    settings: LayoutSettings,
    fifo: CreationFifo,
    path: ActivePath,
    edits: SecondaryMap<StampId, Edit<T>>,
    orders: HashMap<u64, StampId>,
    current: Option<StampId>,
    selected: Option<StampId>,
    /// Stamps deleted to make room while they were current.
    deferred: Vec<StampId>,
    next_order: u64,
    extent: Extent,
}

impl<T> LayoutEngine<T> {
    pub fn new(settings: LayoutSettings) -> Self {
        LayoutEngine {
            board: Board::new(settings.metrics()),
            settings,
            fifo: CreationFifo::new(),
            path: ActivePath::new(),
            edits: SecondaryMap::new(),
            orders: HashMap::default(),
            current: None,
            selected: None,
            deferred: Vec::new(),
            next_order: 0,
            extent: Extent::default(),
        }
    }

    pub fn settings(&self) -> &LayoutSettings { &self.settings }

    pub fn board(&self) -> &Board { &self.board }

    pub fn current(&self) -> Option<StampId> { self.current }

    pub fn selected(&self) -> Option<StampId> { self.selected }

    pub fn len(&self) -> usize { self.fifo.len() }

    pub fn is_empty(&self) -> bool { self.fifo.is_empty() }

    pub fn extent(&self) -> Extent { self.extent }

    pub fn active_path(&self) -> &[StampId] { self.path.as_slice() }

    pub fn stamp_by_order(&self, order: u64) -> Option<StampId> { self.orders.get(&order).copied() }

    pub fn edit(&self, stamp: StampId) -> Option<&Edit<T>> { self.edits.get(stamp) }

    pub fn can_undo(&self) -> bool {
        self.current.is_some_and(|c| c.parent(&self.board.tree.map).is_some())
    }

    pub fn can_redo(&self) -> bool { self.current.is_some_and(|c| self.path.can_redo(c)) }

    /// Label of the edit an undo would revert.
    pub fn undo_kind(&self) -> Option<&str> {
        let current = self.current.filter(|_| self.can_undo())?;
        self.edits.get(current).map(|e| e.kind.as_str())
    }

    /// Label of the edit a redo would reapply.
    pub fn redo_kind(&self) -> Option<&str> {
        self.edits.get(self.redo_target()?).map(|e| e.kind.as_str())
    }

    fn redo_target(&self) -> Option<StampId> { self.path.redo_target(self.current?) }

    /// Records a new edit as a child of the current stamp, or as a new root
    /// when there is none, and makes it current and selected.
    pub fn insert_edit(&mut self, kind: impl Into<String>, snapshot: T) -> EventResponse {
        let parent = self.current;
        let step = parent.map_or(0, |p| self.board.tree.map[p].step + 1);
        let order = self.next_order;
        self.next_order += 1;

        let stamp = self.board.place_new_stamp(parent, step, order);
        let kind = kind.into();
        debug!(order, step, ?parent, %kind, "Inserted stamp");
        self.edits.insert(stamp, Edit { kind, snapshot });
        self.orders.insert(order, stamp);
        self.fifo.push(stamp);
        self.current = Some(stamp);
        self.selected = Some(stamp);

        let evicted = self.evict_overflow(stamp);
        self.path.reconfigure(&self.board.tree.map, stamp);
        self.finish(Some(stamp), Vec::new(), evicted)
    }

    /// Deletes a single stamp. Its children stay where they are as roots of
    /// their own histories.
    pub fn delete_stamp(&mut self, stamp: StampId, options: DeleteOptions) -> EventResponse {
        let mut removed = Vec::new();
        self.remove_one(stamp, options, &mut removed);
        self.finish(None, removed, Vec::new())
    }

    /// Deletes `stamp` and everything below it, deepest first.
    pub fn delete_subtree(&mut self, stamp: StampId) -> EventResponse {
        let doomed: Vec<_> = stamp.traverse_postorder(&self.board.tree.map).collect();
        let mut removed = Vec::new();
        for stamp in doomed {
            self.remove_one(stamp, DeleteOptions::USER, &mut removed);
        }
        self.finish(None, removed, Vec::new())
    }

    /// Steps the current stamp back to its parent. The active path is kept
    /// so redo offers the same branch again.
    pub fn undo(&mut self) -> EventResponse {
        let Some(parent) = self.current.and_then(|c| c.parent(&self.board.tree.map)) else {
            return self.unchanged();
        };
        self.current = Some(parent);
        self.finish(None, Vec::new(), Vec::new())
    }

    pub fn redo(&mut self) -> EventResponse {
        let Some(target) = self.redo_target() else {
            return self.unchanged();
        };
        self.current = Some(target);
        self.finish(None, Vec::new(), Vec::new())
    }

    /// Jumps to a stamp picked by hand. It also becomes the selection and
    /// the active path is rebuilt through it.
    pub fn set_current(&mut self, stamp: StampId) -> EventResponse {
        self.current = Some(stamp);
        self.selected = Some(stamp);
        self.path.reconfigure(&self.board.tree.map, stamp);
        self.finish(None, Vec::new(), Vec::new())
    }

    pub fn select(&mut self, stamp: Option<StampId>) -> EventResponse {
        if self.selected == stamp {
            return self.unchanged();
        }
        self.selected = stamp;
        EventResponse {
            repaint: true,
            extent: self.extent,
            ..Default::default()
        }
    }

    /// Replaces the sizes and node limit. Positions are kept in node and gap
    /// units, so only the pixel conversion changes. Over-limit stamps are
    /// marked here and evicted by the next insertion.
    pub fn apply_settings(&mut self, settings: &LayoutSettings) -> EventResponse {
        if *settings == self.settings {
            return self.unchanged();
        }
        let metrics_changed = settings.metrics() != self.board.metrics;
        info!(?settings, "Layout settings changed");
        self.settings = settings.clone();
        self.board.metrics = settings.metrics();
        let marks_changed = self.refresh_marks();
        self.extent = self.board.extent();
        EventResponse {
            repaint: metrics_changed || marks_changed,
            extent: self.extent,
            ..Default::default()
        }
    }

    pub fn set_max_nodes(&mut self, max_nodes: usize) -> EventResponse {
        let settings = LayoutSettings { max_nodes, ..self.settings.clone() };
        self.apply_settings(&settings)
    }

    /// Runs one command, rejecting requests whose preconditions do not hold.
    pub fn handle_command(
        &mut self,
        command: HistoryCommand<T>,
    ) -> Result<EventResponse, HistoryError> {
        debug!(command = command_name(&command), "Handling command");
        match command {
            HistoryCommand::Edit { kind, snapshot } => Ok(self.insert_edit(kind, snapshot)),
            HistoryCommand::Undo => {
                if !self.can_undo() {
                    return Err(HistoryError::NothingToUndo);
                }
                Ok(self.undo())
            }
            HistoryCommand::Redo => {
                if !self.can_redo() {
                    return Err(HistoryError::NothingToRedo);
                }
                Ok(self.redo())
            }
            HistoryCommand::MakeCurrent { order } => {
                let stamp = self.lookup(order)?;
                Ok(self.set_current(stamp))
            }
            HistoryCommand::Select { order } => {
                let stamp = order.map(|o| self.lookup(o)).transpose()?;
                Ok(self.select(stamp))
            }
            HistoryCommand::Delete { order } => {
                let stamp = self.deletable(order)?;
                Ok(self.delete_stamp(stamp, DeleteOptions::USER))
            }
            HistoryCommand::DeleteSubtree { order } => {
                let stamp = self.deletable(order)?;
                Ok(self.delete_subtree(stamp))
            }
            HistoryCommand::Configure(cmd) => {
                let mut settings = self.settings.clone();
                if !settings.apply(&cmd) {
                    return Ok(self.unchanged());
                }
                let issues = settings.validate();
                if !issues.is_empty() {
                    return Err(HistoryError::InvalidSettings(issues.join("; ")));
                }
                Ok(self.apply_settings(&settings))
            }
        }
    }

    fn lookup(&self, order: u64) -> Result<StampId, HistoryError> {
        self.stamp_by_order(order).ok_or(HistoryError::UnknownStamp(order))
    }

    fn deletable(&self, order: u64) -> Result<StampId, HistoryError> {
        let stamp = self.lookup(order)?;
        let map = &self.board.tree.map;
        if self.current.is_some_and(|c| c.root(map) == stamp) {
            return Err(HistoryError::RootOfCurrent(order));
        }
        Ok(stamp)
    }

    pub fn stamp_view(&self, stamp: StampId) -> StampView {
        let map = &self.board.tree.map;
        let m = &self.board.metrics;
        let s = &map[stamp];
        StampView {
            id: stamp,
            order: s.order,
            parent: stamp.parent(map).map(|p| map[p].order),
            step: s.step,
            row: s.row,
            column: s.column,
            x: s.position.to_pixels(m.node_width, m.node_gap),
            y: self.board.pixel_y(stamp).round() as i32,
            kind: self.edits.get(stamp).map(|e| e.kind.clone()).unwrap_or_default(),
            current: self.current == Some(stamp),
            selected: self.selected == Some(stamp),
            marked: s.marked_for_eviction,
        }
    }

    /// Every live stamp, oldest first.
    pub fn stamps(&self) -> Vec<StampView> {
        self.fifo.iter().map(|s| self.stamp_view(s)).collect()
    }

    pub fn draw_tree(&self) -> String {
        let map = &self.board.tree.map;
        let mut out = String::new();
        for row in self.board.rows.iter() {
            for &root in row.iter().filter(|s| s.parent(map).is_none()) {
                let tree = self.get_ascii_tree(root);
                let _ = ascii_tree::write_tree(&mut out, &tree);
            }
        }
        out
    }

    fn get_ascii_tree(&self, stamp: StampId) -> ascii_tree::Tree {
        let view = self.stamp_view(stamp);
        let mut desc = format!("#{} {} step={} x={}", view.order, view.kind, view.step, view.x);
        if view.current {
            desc.push_str(" [current]");
        }
        if view.marked {
            desc.push_str(" [marked]");
        }
        let children: Vec<_> =
            stamp.children(&self.board.tree.map).map(|c| self.get_ascii_tree(c)).collect();
        if children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            ascii_tree::Tree::Node(desc, children)
        }
    }

    fn unchanged(&self) -> EventResponse {
        EventResponse { extent: self.extent, ..Default::default() }
    }

    fn remove_one(&mut self, stamp: StampId, options: DeleteOptions, removed: &mut Vec<u64>) {
        if self.selected == Some(stamp) {
            self.selected = None;
        }
        if self.current == Some(stamp) {
            if !options.undo_if_current {
                debug!(?stamp, "Current stamp marked for eviction");
                self.board.tree.map[stamp].marked_for_eviction = true;
                if !self.deferred.contains(&stamp) {
                    self.deferred.push(stamp);
                }
                return;
            }
            self.current = stamp.parent(&self.board.tree.map);
        }

        let map = &self.board.tree.map;
        let parent = stamp.parent(map);
        let right = self.board.right_of(stamp);
        let order = map[stamp].order;

        self.board.tree.detach(stamp);
        let orphans = self.board.tree.orphan_children(stamp);
        self.board.rows.remove(&mut self.board.tree.map, stamp);
        self.board.tree.remove(stamp);
        self.edits.remove(stamp);
        self.orders.remove(&order);
        self.deferred.retain(|&s| s != stamp);
        if options.remove_from_fifo {
            self.fifo.remove(stamp);
        }
        if self.path.contains(stamp) {
            self.path.invalidate();
        }
        debug!(order, ?parent, orphans = orphans.len(), "Removed stamp");
        removed.push(order);

        let board = &mut self.board;
        if let Some(&first) = orphans.first() {
            let room = board.pos(first) - Position::MARGIN;
            board.shift_left(
                first,
                room,
                ShiftFlags::CHECK_CHILDREN | ShiftFlags::SHIFT_CHILDREN | ShiftFlags::NEIGHBORS,
            );
        }
        if let Some(parent) = parent {
            if parent.is_leaf(&board.tree.map) {
                let room = board.pos(parent) - Position::MARGIN;
                board.shift_left(
                    parent,
                    room,
                    ShiftFlags::CHECK_PARENT | ShiftFlags::SHIFT_PARENT | ShiftFlags::NEIGHBORS,
                );
            } else {
                board.recenter(parent);
            }
        }
        if let Some(right) = right {
            let room = board.pos(right) - Position::MARGIN;
            board.shift_left(right, room, ShiftFlags::SUBTREE | ShiftFlags::NEIGHBORS);
        }
    }

    /// Eviction candidates in creation order: every stamp off the path from
    /// the root to `tip`. Ancestors of `tip` are never evicted, so the live
    /// count may stay above the limit while the path alone exceeds it.
    fn eviction_order(&self, tip: StampId) -> Vec<StampId> {
        let map = &self.board.tree.map;
        self.fifo
            .iter()
            .filter(|&s| !tip.descends_from(s, map))
            .collect()
    }

    fn evict_overflow(&mut self, new: StampId) -> Vec<u64> {
        let overflow = self.fifo.len().saturating_sub(self.settings.max_nodes);
        if overflow == 0 {
            return Vec::new();
        }
        let victims: Vec<_> = self.eviction_order(new).into_iter().take(overflow).collect();
        if victims.len() < overflow {
            debug!(short = overflow - victims.len(), "Only path stamps left, staying over the limit");
        }
        let mut evicted = Vec::new();
        for victim in victims {
            self.fifo.remove(victim);
            self.remove_one(
                victim,
                DeleteOptions { remove_from_fifo: false, ..DeleteOptions::MAKE_ROOM },
                &mut evicted,
            );
        }
        debug!(?evicted, "Evicted stamps over the limit");
        evicted
    }

    /// Marks exactly the stamps the next insertion under the current stamp
    /// would evict. Returns whether any mark changed.
    fn refresh_marks(&mut self) -> bool {
        let overflow = (self.fifo.len() + 1).saturating_sub(self.settings.max_nodes);
        let doomed = match self.current {
            _ if overflow == 0 => Vec::new(),
            Some(current) => self.eviction_order(current),
            None => self.fifo.iter().collect(),
        };
        let doomed = &doomed[..overflow.min(doomed.len())];

        let mut changed = false;
        let stamps: Vec<_> = self.fifo.iter().collect();
        for stamp in stamps {
            let marked = doomed.contains(&stamp) || self.deferred.contains(&stamp);
            let slot = &mut self.board.tree.map[stamp].marked_for_eviction;
            changed |= *slot != marked;
            *slot = marked;
        }
        changed
    }

    fn finish(&mut self, created: Option<StampId>, removed: Vec<u64>, mut evicted: Vec<u64>) -> EventResponse {
        let ready: Vec<_> =
            self.deferred.iter().copied().filter(|&s| Some(s) != self.current).collect();
        for stamp in ready {
            self.remove_one(stamp, DeleteOptions::MAKE_ROOM, &mut evicted);
        }
        if !self.path.is_valid()
            && let Some(current) = self.current
        {
            self.path.reconfigure(&self.board.tree.map, current);
        }
        self.refresh_marks();
        self.extent = self.board.extent();
        trace!("Tree:\n{}", self.draw_tree().trim());
        EventResponse {
            created,
            removed,
            evicted,
            repaint: true,
            extent: self.extent,
        }
    }
}

fn command_name<T>(command: &HistoryCommand<T>) -> &'static str {
    match command {
        HistoryCommand::Edit { .. } => "edit",
        HistoryCommand::Undo => "undo",
        HistoryCommand::Redo => "redo",
        HistoryCommand::MakeCurrent { .. } => "make_current",
        HistoryCommand::Select { .. } => "select",
        HistoryCommand::Delete { .. } => "delete",
        HistoryCommand::DeleteSubtree { .. } => "delete_subtree",
        HistoryCommand::Configure(_) => "configure",
    }
}
