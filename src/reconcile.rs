//! Keeps movement lines and their running totals consistent with the
//! source lines of the bound record.
use super::error::LineError;
use super::record::{MovementLine, SourceLineItem};
use super::validator::{is_number, parse_quantity};

/// Reference id the backend returns for an unset reference.
pub const BLANK_REFERENCE_SENTINEL: char = '0';

/// Derived totals. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregate {
    pub line_count: usize,
    pub max_movt_id: u32,
    pub total: f64,
    pub total_inc_tax: f64,
}

#[derive(Debug, Clone, Default)]
pub struct LineBook {
    sources: Vec<SourceLineItem>,
    lines: Vec<MovementLine>,
    aggregate: Aggregate,
    max_issued_id: u32, // never decreases within a session
    dirty: bool,
}

impl LineBook {
    /// Starts a book for freshly bound sources, with any movements the record already carries.
    pub fn new(sources: Vec<SourceLineItem>, lines: Vec<MovementLine>) -> Self {
        let mut book = Self {
            sources,
            lines,
            ..Self::default()
        };
        book.recompute();
        book.dirty = false;
        book
    }
    pub fn sources(&self) -> &[SourceLineItem] {
        &self.sources
    }
    pub fn lines(&self) -> &[MovementLine] {
        &self.lines
    }
    /// Direct access for validation passes, which only touch value states.
    pub fn lines_mut(&mut self) -> &mut [MovementLine] {
        &mut self.lines
    }
    pub fn aggregate(&self) -> Aggregate {
        self.aggregate
    }
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
    fn next_id(&self) -> Result<u32, LineError> {
        self.max_issued_id
            .checked_add(1)
            .ok_or(LineError::IdsExhausted)
    }

    /// Appends an empty line and returns its id
    pub fn add_line(&mut self) -> Result<u32, LineError> {
        let id = self.next_id()?;
        self.lines.push(MovementLine::new(id));
        self.recompute();
        Ok(id)
    }

    /// Appends a copy of the line at `index` with a fresh id and no
    /// reference, quantity or asset flag.
    pub fn copy_line(&mut self, index: usize) -> Result<u32, LineError> {
        let source = self
            .lines
            .get(index)
            .ok_or(LineError::NoSuchLine(index))?;

        let id = self.next_id()?;
        let mut copy = source.clone();
        copy.movt_id = id;
        copy.po_item.clear();
        copy.entry_qnt.clear();
        copy.is_asset = false;

        self.lines.push(copy);
        self.recompute();
        Ok(id)
    }

    pub fn delete_line(&mut self, index: usize) -> Result<MovementLine, LineError> {
        if index >= self.lines.len() {
            return Err(LineError::NoSuchLine(index));
        }
        let removed = self.lines.remove(index);
        self.recompute();
        Ok(removed)
    }

    /// Applies an edit to one line and recomputes.
    pub fn edit_line<F>(&mut self, index: usize, edit: F) -> Result<(), LineError>
    where
        F: FnOnce(&mut MovementLine),
    {
        let line = self
            .lines
            .get_mut(index)
            .ok_or(LineError::NoSuchLine(index))?;
        edit(line);
        self.recompute();
        Ok(())
    }

    pub fn set_reference(&mut self, index: usize, po_item: &str) -> Result<(), LineError> {
        self.edit_line(index, |line| line.po_item = po_item.to_string())
    }

    pub fn set_quantity(&mut self, index: usize, entry_qnt: &str) -> Result<(), LineError> {
        self.edit_line(index, |line| line.entry_qnt = entry_qnt.to_string())
    }

    /// Swaps in the canonical lines returned by a dry run.
    pub fn replace_lines(&mut self, lines: Vec<MovementLine>) {
        self.lines = lines;
        self.recompute();
    }

    /// Lines as they go on the wire: non-numeric quantities become `"0"`.
    pub fn submission_lines(&self) -> Vec<MovementLine> {
        self.lines
            .iter()
            .cloned()
            .map(|mut line| {
                if !is_number(&line.entry_qnt) {
                    line.entry_qnt = "0".to_string();
                }
                line
            })
            .collect()
    }

    /// First source line with the given id. Source ids are unique.
    pub fn source_for(&self, po_item: &str) -> Option<&SourceLineItem> {
        self.sources.iter().find(|source| source.po_item == po_item)
    }

    /// Re-derives line totals, asset flags and the aggregate, and marks the
    /// book dirty. Unmatched or non-numeric lines contribute zero.
    pub fn recompute(&mut self) {
        let mut total = 0.0;
        let mut total_inc_tax = 0.0;
        let mut max_id = self.max_issued_id;

        for line in self.lines.iter_mut() {
            max_id = max_id.max(line.movt_id);

            let Some(source) = self.sources.iter().find(|s| s.po_item == line.po_item) else {
                continue;
            };
            line.is_asset = source.is_asset;

            let quantity = parse_quantity(&line.entry_qnt).unwrap_or(0.0);
            let line_total = source.net_price * quantity;
            let line_tax = line_total * source.tax_rate;

            total += line_total;
            total_inc_tax += line_total + line_tax;
        }

        self.max_issued_id = max_id;
        self.aggregate = Aggregate {
            line_count: self.lines.len(),
            max_movt_id: max_id,
            total,
            total_inc_tax,
        };
        self.dirty = true;
    }
}

/// Maps backend sentinels back to blanks for editing: an all-zero reference
/// and a zero quantity.
pub fn normalize_canonical(lines: Vec<MovementLine>) -> Vec<MovementLine> {
    lines
        .into_iter()
        .map(|mut line| {
            if !line.po_item.is_empty()
                && line.po_item.chars().all(|c| c == BLANK_REFERENCE_SENTINEL)
            {
                line.po_item.clear();
            }
            if parse_quantity(&line.entry_qnt) == Some(0.0) {
                line.entry_qnt.clear();
            }
            line
        })
        .collect()
}
