//! CSV parser for mail merge data sources

use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::sheet::{Cell, Sheet, SheetRow, Workbook};

/// CSV parser configuration
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Delimiter character
    pub delimiter: char,
    /// Quote character
    pub quote: char,
    /// Whether to trim whitespace from values
    pub trim_whitespace: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            trim_whitespace: false,
        }
    }
}

impl CsvConfig {
    /// Create a new CSV config with comma delimiter
    pub fn comma() -> Self {
        Self::default()
    }

    /// Create a new CSV config with semicolon delimiter
    pub fn semicolon() -> Self {
        Self {
            delimiter: ';',
            ..Default::default()
        }
    }

    /// Create a new CSV config with tab delimiter
    pub fn tab() -> Self {
        Self {
            delimiter: '\t',
            ..Default::default()
        }
    }

    /// Set the delimiter
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the quote character
    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    /// Set whether to trim whitespace
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim_whitespace = trim;
        self
    }
}

/// CSV parser producing a single-sheet workbook
///
/// Every line is a row, so the first line is row 0. Blank lines leave their
/// row absent and empty fields leave their cell absent. All cells are text.
pub struct CsvParser {
    config: CsvConfig,
}

impl CsvParser {
    /// Create a new CSV parser with default configuration
    pub fn new() -> Self {
        Self {
            config: CsvConfig::default(),
        }
    }

    /// Create a new CSV parser with custom configuration
    pub fn with_config(config: CsvConfig) -> Self {
        Self { config }
    }

    /// Parse a CSV file
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Workbook> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("csv")
            .to_string();
        self.parse_reader(file, name)
    }

    /// Parse CSV from a string
    pub fn parse_string(&self, data: &str, name: impl Into<String>) -> Result<Workbook> {
        self.parse_reader(data.as_bytes(), name.into())
    }

    /// Parse CSV from any reader
    fn parse_reader<R: Read>(&self, reader: R, name: String) -> Result<Workbook> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter as u8)
            .quote(self.config.quote as u8)
            .has_headers(false)
            .trim(if self.config.trim_whitespace {
                csv::Trim::All
            } else {
                csv::Trim::None
            })
            .flexible(true) // Allow records with varying number of fields
            .from_reader(reader);

        let mut sheet = Sheet::new(name);
        let mut next_line = 1u64;
        let mut row_index = 0usize;

        for result in csv_reader.records() {
            let record = result?;

            // The reader skips blank lines; each one is an absent row
            if let Some(position) = record.position() {
                row_index += position.line().saturating_sub(next_line) as usize;
                next_line = position.line();
            }
            let embedded_newlines: usize = record.iter().map(|f| f.matches('\n').count()).sum();
            next_line += 1 + embedded_newlines as u64;

            let mut row = SheetRow::new();
            for (column, field) in record.iter().enumerate() {
                if !field.is_empty() {
                    row.set_cell(column, Cell::text(field));
                }
            }
            sheet.insert_row(row_index, row);
            row_index += 1;
        }

        tracing::debug!(rows = sheet.row_count(), "Parsed CSV data");
        Ok(Workbook::new().with_sheet(sheet))
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Detect the delimiter used in a CSV file
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let delimiters = [',', ';', '\t', '|'];
    let mut best_delimiter = ',';
    let mut best_count = 0;

    for &delim in &delimiters {
        let count = first_line.matches(delim).count();
        if count > best_count {
            best_count = count;
            best_delimiter = delim;
        }
    }

    best_delimiter
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(workbook: &Workbook, row: usize, column: usize) -> Option<String> {
        workbook.first_sheet()?.row(row)?.cell(column).map(Cell::display_text)
    }

    #[test]
    fn test_parse_simple_csv() {
        let csv_data = "name,age,city\nAlice,30,New York\nBob,25,Los Angeles";
        let wb = CsvParser::new().parse_string(csv_data, "test").unwrap();

        assert_eq!(wb.first_sheet().unwrap().row_count(), 3);
        assert_eq!(text(&wb, 0, 2).as_deref(), Some("city"));
        assert_eq!(text(&wb, 2, 0).as_deref(), Some("Bob"));
    }

    #[test]
    fn test_parse_semicolon_delimiter() {
        let csv_data = "name;age\nAlice;30";
        let wb = CsvParser::with_config(CsvConfig::semicolon())
            .parse_string(csv_data, "test")
            .unwrap();
        assert_eq!(text(&wb, 1, 1).as_deref(), Some("30"));
    }

    #[test]
    fn test_parse_tab_delimiter() {
        let csv_data = "name\tage\nAlice\t30";
        let wb = CsvParser::with_config(CsvConfig::tab())
            .parse_string(csv_data, "test")
            .unwrap();
        assert_eq!(text(&wb, 1, 0).as_deref(), Some("Alice"));
    }

    #[test]
    fn test_parse_with_quotes() {
        let csv_data = r#"name,address
"Alice Smith","123 Main St, Apt 4"
"Bob ""The Builder""",456 Oak Ave"#;
        let wb = CsvParser::new().parse_string(csv_data, "test").unwrap();

        assert_eq!(text(&wb, 1, 1).as_deref(), Some("123 Main St, Apt 4"));
        assert_eq!(text(&wb, 2, 0).as_deref(), Some("Bob \"The Builder\""));
    }

    #[test]
    fn test_blank_lines_are_absent_rows() {
        let csv_data = "name\nAlice\n\nBob\n";
        let wb = CsvParser::new().parse_string(csv_data, "test").unwrap();
        let sheet = wb.first_sheet().unwrap();

        assert!(sheet.row(1).is_some());
        assert!(sheet.row(2).is_none());
        assert_eq!(text(&wb, 3, 0).as_deref(), Some("Bob"));
    }

    #[test]
    fn test_multiline_field_keeps_row_numbers() {
        let csv_data = "name,note\nAlice,\"line one\nline two\"\nBob,short";
        let wb = CsvParser::new().parse_string(csv_data, "test").unwrap();
        let sheet = wb.first_sheet().unwrap();

        assert_eq!(sheet.row_count(), 3);
        assert_eq!(text(&wb, 1, 1).as_deref(), Some("line one\nline two"));
        assert_eq!(text(&wb, 2, 0).as_deref(), Some("Bob"));
    }

    #[test]
    fn test_empty_fields_are_absent_cells() {
        let csv_data = "a,b,c\n1,,3";
        let wb = CsvParser::new().parse_string(csv_data, "test").unwrap();
        let row = wb.first_sheet().unwrap().row(1).unwrap();

        assert!(row.cell(1).is_none());
        assert_eq!(row.last_column(), Some(2));
    }

    #[test]
    fn test_whitespace_trimming() {
        let csv_data = "name,age\n  Alice  ,  30  ";
        let wb = CsvParser::with_config(CsvConfig::default().with_trim(true))
            .parse_string(csv_data, "test")
            .unwrap();
        assert_eq!(text(&wb, 1, 0).as_deref(), Some("Alice"));

        let wb = CsvParser::new().parse_string(csv_data, "test").unwrap();
        assert_eq!(text(&wb, 1, 0).as_deref(), Some("  Alice  "));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c,d"), ',');
        assert_eq!(detect_delimiter("a;b;c;d"), ';');
        assert_eq!(detect_delimiter("a\tb\tc\td"), '\t');
        assert_eq!(detect_delimiter("a|b|c|d"), '|');
        assert_eq!(detect_delimiter(""), ',');
    }

    #[test]
    fn test_empty_input() {
        let wb = CsvParser::new().parse_string("", "test").unwrap();
        assert_eq!(wb.first_sheet().unwrap().row_count(), 0);
    }
}
