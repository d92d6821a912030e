//! Sparse spreadsheet grid shared by all tabular decoders
//!
//! Rows and cells are keyed by their zero-based index. A row or cell that is
//! not stored is absent, which is different from a stored blank cell.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::number_format;

/// Raw value of a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Numeric value (dates are serial numbers)
    Number(f64),
    /// Text value
    Text(String),
    /// Boolean value
    Boolean(bool),
    /// Error value such as `#DIV/0!`
    Error(String),
    /// A stored cell without a value
    Blank,
}

/// A cell with its value and display format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    /// Number format code applied to numeric values
    pub format: Option<String>,
}

impl Cell {
    /// Create a cell from a value without a display format
    pub fn new(value: CellValue) -> Self {
        Self { value, format: None }
    }

    /// Create a text cell
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(CellValue::Text(text.into()))
    }

    /// Create a numeric cell
    pub fn number(value: f64) -> Self {
        Self::new(CellValue::Number(value))
    }

    /// Set the display format
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// The text a spreadsheet would display for this cell
    pub fn display_text(&self) -> String {
        match &self.value {
            CellValue::Number(n) => number_format::format_number(
                *n,
                self.format.as_deref().unwrap_or(number_format::GENERAL),
            ),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Blank => String::new(),
        }
    }
}

/// A row of cells keyed by column index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    cells: BTreeMap<usize, Cell>,
}

impl SheetRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cell, replacing any previous one in the same column
    pub fn set_cell(&mut self, column: usize, cell: Cell) {
        self.cells.insert(column, cell);
    }

    pub fn cell(&self, column: usize) -> Option<&Cell> {
        self.cells.get(&column)
    }

    /// Index of the first stored cell
    pub fn first_column(&self) -> Option<usize> {
        self.cells.keys().next().copied()
    }

    /// Index of the last stored cell
    pub fn last_column(&self) -> Option<usize> {
        self.cells.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Stored cells in column order
    pub fn cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells.iter().map(|(col, cell)| (*col, cell))
    }
}

/// A worksheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    rows: BTreeMap<usize, SheetRow>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
        }
    }

    /// Store a row, replacing any previous one at the same index
    pub fn insert_row(&mut self, index: usize, row: SheetRow) {
        self.rows.insert(index, row);
    }

    /// Store a cell, creating its row if needed
    pub fn set_cell(&mut self, row: usize, column: usize, cell: Cell) {
        self.rows.entry(row).or_default().set_cell(column, cell);
    }

    pub fn row(&self, index: usize) -> Option<&SheetRow> {
        self.rows.get(&index)
    }

    /// Index of the last stored row
    pub fn last_row_index(&self) -> Option<usize> {
        self.rows.keys().next_back().copied()
    }

    /// Number of stored rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A decoded workbook; delimited text decodes to a single sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet
    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.sheets.push(sheet);
        self
    }

    /// The first sheet in workbook order
    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }
}

/// Spreadsheet column letter for a zero-based column index (0 -> A, 26 -> AA)
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Zero-based column index for a column letter, ignoring case
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let value = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(value)?;
    }
    Some(index - 1)
}
