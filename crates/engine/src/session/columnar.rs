//! Per-digit answer state for columnar questions.

use practice_core::model::Question;

/// Identifies one cell of the columnar grids for keypad focus routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnarSlot {
    Operand { row: usize, index: usize },
    Result { index: usize },
}

/// Mutable working copy of a columnar question's digit grids.
///
/// The source grids are kept alongside the working copies: a cell is
/// user-fillable exactly when its source value is `None`, and fixed digits
/// can never be overwritten or cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnarGrid {
    source_operands: Vec<Vec<Option<u8>>>,
    source_result: Vec<Option<u8>>,
    operands: Vec<Vec<Option<u8>>>,
    result: Vec<Option<u8>>,
    active: Option<ColumnarSlot>,
}

impl ColumnarGrid {
    /// Builds the working grids from a columnar question, focusing the first
    /// blank. Returns `None` for non-columnar questions or missing grids.
    #[must_use]
    pub fn from_question(question: &Question) -> Option<Self> {
        if !question.is_columnar() {
            return None;
        }
        let operands = question.columnar_operands.clone()?;
        let result = question.columnar_result_placeholders.clone()?;
        let mut grid = Self {
            source_operands: operands.clone(),
            source_result: result.clone(),
            operands,
            result,
            active: None,
        };
        grid.active = grid.first_blank();
        Some(grid)
    }

    #[must_use]
    pub fn active(&self) -> Option<ColumnarSlot> {
        self.active
    }

    /// Focuses `slot` if it names a user-fillable cell; `None` clears focus.
    pub fn set_active(&mut self, slot: Option<ColumnarSlot>) {
        match slot {
            Some(slot) if self.is_fillable(slot) => self.active = Some(slot),
            Some(_) => {}
            None => self.active = None,
        }
    }

    #[must_use]
    pub fn operands(&self) -> &[Vec<Option<u8>>] {
        &self.operands
    }

    #[must_use]
    pub fn result(&self) -> &[Option<u8>] {
        &self.result
    }

    /// Writes a digit into `slot`.
    ///
    /// Fixed cells and cells that already hold a value are left untouched
    /// and the call is a no-op returning `false`. After a successful write
    /// the focus auto-advances to the next blank in scan order, or clears
    /// when no blank remains.
    pub fn write_digit(&mut self, slot: ColumnarSlot, digit: u8) -> bool {
        if digit > 9 || !self.is_fillable(slot) || self.cell(slot).is_some() {
            return false;
        }
        *self.cell_mut(slot) = Some(digit);
        self.active = self.next_blank_after(slot);
        true
    }

    /// Restores every user-filled cell to blank and refocuses the first one.
    /// Fixed cells are untouched.
    pub fn clear(&mut self) {
        for (row, source_row) in self.operands.iter_mut().zip(&self.source_operands) {
            for (cell, source) in row.iter_mut().zip(source_row) {
                if source.is_none() {
                    *cell = None;
                }
            }
        }
        for (cell, source) in self.result.iter_mut().zip(&self.source_result) {
            if source.is_none() {
                *cell = None;
            }
        }
        self.active = self.first_blank();
    }

    /// True when every user-fillable cell holds a digit.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.scan_order().all(|slot| self.cell(slot).is_some())
    }

    /// Operand grids with any remaining blank coerced to 0, for the wire
    /// payload. Callers should gate on [`Self::is_complete`] first.
    #[must_use]
    pub fn filled_operands(&self) -> Vec<Vec<u8>> {
        self.operands
            .iter()
            .map(|row| row.iter().map(|cell| cell.unwrap_or(0)).collect())
            .collect()
    }

    /// Result digits with any remaining blank coerced to 0.
    #[must_use]
    pub fn filled_result(&self) -> Vec<u8> {
        self.result.iter().map(|cell| cell.unwrap_or(0)).collect()
    }

    /// The first user-fillable cell that is still blank, in scan order.
    #[must_use]
    pub fn first_blank(&self) -> Option<ColumnarSlot> {
        self.scan_order().find(|slot| self.cell(*slot).is_none())
    }

    /// The next blank after `slot` in scan order (operand rows top-to-bottom,
    /// each left-to-right, then the result cells), wrapping to earlier
    /// blanks before giving up.
    #[must_use]
    pub fn next_blank_after(&self, slot: ColumnarSlot) -> Option<ColumnarSlot> {
        let order: Vec<ColumnarSlot> = self.scan_order().collect();
        let position = order.iter().position(|candidate| *candidate == slot);
        if let Some(position) = position {
            for candidate in &order[position + 1..] {
                if self.cell(*candidate).is_none() {
                    return Some(*candidate);
                }
            }
        }
        self.first_blank()
    }

    fn is_fillable(&self, slot: ColumnarSlot) -> bool {
        match slot {
            ColumnarSlot::Operand { row, index } => self
                .source_operands
                .get(row)
                .and_then(|cells| cells.get(index))
                .is_some_and(Option::is_none),
            ColumnarSlot::Result { index } => self
                .source_result
                .get(index)
                .is_some_and(Option::is_none),
        }
    }

    fn cell(&self, slot: ColumnarSlot) -> Option<u8> {
        match slot {
            ColumnarSlot::Operand { row, index } => {
                self.operands.get(row).and_then(|cells| cells.get(index)).copied().flatten()
            }
            ColumnarSlot::Result { index } => self.result.get(index).copied().flatten(),
        }
    }

    fn cell_mut(&mut self, slot: ColumnarSlot) -> &mut Option<u8> {
        match slot {
            ColumnarSlot::Operand { row, index } => &mut self.operands[row][index],
            ColumnarSlot::Result { index } => &mut self.result[index],
        }
    }

    /// User-fillable slots in keypad scan order.
    fn scan_order(&self) -> impl Iterator<Item = ColumnarSlot> + '_ {
        let operands = self
            .source_operands
            .iter()
            .enumerate()
            .flat_map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .filter(|(_, source)| source.is_none())
                    .map(move |(index, _)| ColumnarSlot::Operand { row, index })
            });
        let result = self
            .source_result
            .iter()
            .enumerate()
            .filter(|(_, source)| source.is_none())
            .map(|(index, _)| ColumnarSlot::Result { index });
        operands.chain(result)
    }
}
