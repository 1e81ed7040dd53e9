use super::tree::{StampId, StampMap};

/// Stamps grouped by depth, each row ordered left to right.
///
/// Every stamp's `row` and `column` fields mirror its slot here. Rows never
/// stay empty: removing the last stamp of a row drops the row and pulls every
/// deeper row up by one.
#[derive(Default, Debug, Clone)]
pub struct RowIndex {
    rows: Vec<Vec<StampId>>,
}

impl RowIndex {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn row(&self, row: usize) -> &[StampId] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &[StampId]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Places `stamp` at (`row`, `column`), creating the row when it is the
    /// first stamp at that depth. Later entries shift one column right. A
    /// branch grafted after an undo lands in an existing shallower row, so
    /// only the deepest row is ever created here.
    pub fn insert(&mut self, map: &mut StampMap, stamp: StampId, row: usize, column: usize) {
        assert!(row <= self.rows.len(), "row {row} skips a depth level");
        if row == self.rows.len() {
            self.rows.push(Vec::new());
        }
        let entries = &mut self.rows[row];
        let column = column.min(entries.len());
        entries.insert(column, stamp);
        for (col, &id) in entries.iter().enumerate().skip(column) {
            map[id].row = row;
            map[id].column = col;
        }
    }

    /// Removes `stamp` from its row. Returns whether the row vanished.
    pub fn remove(&mut self, map: &mut StampMap, stamp: StampId) -> bool {
        let Some((row, column)) = self.locate(map, stamp) else {
            return false;
        };
        let entries = &mut self.rows[row];
        entries.remove(column);
        for (col, &id) in entries.iter().enumerate().skip(column) {
            map[id].column = col;
        }
        if !entries.is_empty() {
            return false;
        }
        self.rows.remove(row);
        self.renumber_rows_from(map, row);
        true
    }

    pub fn left_of(&self, map: &StampMap, stamp: StampId) -> Option<StampId> {
        let (row, column) = self.locate(map, stamp)?;
        column.checked_sub(1).map(|c| self.rows[row][c])
    }

    pub fn right_of(&self, map: &StampMap, stamp: StampId) -> Option<StampId> {
        let (row, column) = self.locate(map, stamp)?;
        self.rows[row].get(column + 1).copied()
    }

    pub fn rightmost(&self, row: usize) -> Option<StampId> {
        self.rows.get(row).and_then(|entries| entries.last().copied())
    }

    fn locate(&self, map: &StampMap, stamp: StampId) -> Option<(usize, usize)> {
        let Slot { row, column } = Slot::of(map, stamp);
        (self.rows.get(row)?.get(column) == Some(&stamp)).then_some((row, column))
    }

    fn renumber_rows_from(&self, map: &mut StampMap, from: usize) {
        for (row, entries) in self.rows.iter().enumerate().skip(from) {
            for &id in entries {
                map[id].row = row;
            }
        }
    }
}

/// Slot of a stamp as recorded on the stamp itself.
struct Slot {
    row: usize,
    column: usize,
}

impl Slot {
    fn of(map: &StampMap, id: StampId) -> Self {
        let stamp = &map[id];
        Slot { row: stamp.row, column: stamp.column }
    }
}
