//! Legacy and OpenDocument spreadsheet parser (xls, xlsb, ods)
//!
//! These containers are read through calamine, which does not expose the
//! number format of a cell. Numbers render with the General format and
//! date-typed cells with an ISO date.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::error::{MailMergeError, Result};
use crate::sheet::{Cell, CellValue, Sheet, SheetRow, Workbook};

/// Format used for date cells that carry no time of day
const DATE_FORMAT: &str = "yyyy-mm-dd";
/// Format used for date cells with a time of day
const DATE_TIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Spreadsheet parser backed by calamine
#[derive(Debug, Default)]
pub struct WorkbookParser;

impl WorkbookParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse the first sheet of a workbook file
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Workbook> {
        let path = path.as_ref();
        let mut workbook = open_workbook_auto(path)?;

        let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
            return Ok(Workbook::new());
        };

        let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
            MailMergeError::Xlsx(format!("Failed to read sheet '{}': {}", sheet_name, e))
        })?;

        Ok(Workbook::new().with_sheet(sheet_from_range(sheet_name, &range)))
    }
}

/// Convert a calamine range into a sparse sheet
fn sheet_from_range(name: String, range: &Range<Data>) -> Sheet {
    let mut sheet = Sheet::new(name);
    let Some((start_row, start_col)) = range.start() else {
        return sheet;
    };

    for (row_offset, cells) in range.rows().enumerate() {
        let mut row = SheetRow::new();
        for (col_offset, data) in cells.iter().enumerate() {
            if let Some(cell) = cell_from_data(data) {
                row.set_cell(start_col as usize + col_offset, cell);
            }
        }
        // A row of empty cells is only padding inside the range
        if !row.is_empty() {
            sheet.insert_row(start_row as usize + row_offset, row);
        }
    }

    sheet
}

fn cell_from_data(data: &Data) -> Option<Cell> {
    let cell = match data {
        Data::Empty => return None,
        Data::String(s) => Cell::text(s.clone()),
        Data::Int(n) => Cell::number(*n as f64),
        Data::Float(n) => Cell::number(*n),
        Data::Bool(b) => Cell::new(CellValue::Boolean(*b)),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            let format = if serial.fract() == 0.0 {
                DATE_FORMAT
            } else {
                DATE_TIME_FORMAT
            };
            Cell::number(serial).with_format(format)
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.clone()),
        Data::Error(e) => Cell::new(CellValue::Error(e.to_string())),
    };
    Some(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;

    fn display(data: &Data) -> Option<String> {
        cell_from_data(data).map(|cell| cell.display_text())
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(display(&Data::Empty), None);
        assert_eq!(display(&Data::String("Alice".into())).as_deref(), Some("Alice"));
        assert_eq!(display(&Data::Int(30)).as_deref(), Some("30"));
        assert_eq!(display(&Data::Float(2.5)).as_deref(), Some("2.5"));
        assert_eq!(display(&Data::Bool(false)).as_deref(), Some("FALSE"));
        assert_eq!(
            display(&Data::Error(CellErrorType::Div0)).as_deref(),
            Some("#DIV/0!")
        );
    }

    #[test]
    fn test_numbers_carry_no_display_format() {
        let cell = cell_from_data(&Data::Float(3.0)).unwrap();
        assert_eq!(cell.format, None);
        assert_eq!(cell.display_text(), "3");
    }

    #[test]
    fn test_range_offsets_and_empty_rows() {
        let mut range = Range::new((1, 2), (3, 3));
        range.set_value((1, 2), Data::String("name".into()));
        range.set_value((1, 3), Data::String("age".into()));
        range.set_value((3, 2), Data::String("Bob".into()));

        let sheet = sheet_from_range("Sheet1".into(), &range);
        assert!(sheet.row(0).is_none());
        assert!(sheet.row(2).is_none());

        let header = sheet.row(1).unwrap();
        assert_eq!(header.first_column(), Some(2));
        assert_eq!(header.last_column(), Some(3));
        assert_eq!(sheet.row(3).unwrap().cell(2).unwrap().display_text(), "Bob");
    }

    #[test]
    fn test_empty_range() {
        let range: Range<Data> = Range::empty();
        assert_eq!(sheet_from_range("Sheet1".into(), &range).row_count(), 0);
    }

    #[test]
    fn test_missing_file() {
        assert!(WorkbookParser::new().parse_file("/nonexistent/data.ods").is_err());
    }
}
